//! Node file parsing and rendering.
//!
//! A node file is a markdown document: a level-1 title followed by level-2
//! sections recognised by heading text (`Purpose`, `Classification`,
//! `Content`, `Relationships`, `Metadata`, `Change History`). Unknown
//! sections are kept verbatim. Parsing never fails: defects are recorded on
//! the node (missing classification dimensions, malformed relationship
//! lines) and surfaced later by the checker.
//!
//! Free-text bodies (purpose, content, unknown sections) are written with a
//! backslash in front of any line that would otherwise read as a section
//! heading or an unterminated code fence, and the backslash is dropped again
//! on load, so whatever text a node holds survives a save.

use crate::core::node::{ChangeRecord, Classification, Metadata, Node, Section};
use crate::core::relationship::{Relationship, normalize_type_label};
use regex::Regex;
use std::sync::LazyLock;

const PURPOSE: &str = "purpose";
const CLASSIFICATION: &str = "classification";
const CONTENT: &str = "content";
const RELATIONSHIPS: &str = "relationships";
const METADATA: &str = "metadata";
const CHANGE_HISTORY: &str = "change history";

/// Field separators accepted between target, type and description.
static REL_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+(?:—|–|--|-)\s+").expect("separator regex"));

static MD_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[[^\]]*\]\(([^)]+)\)$").expect("link regex"));

static WIKI_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[\[([^\]|]+)(?:\|[^\]]*)?\]\]$").expect("wiki link regex"));

struct RawSection {
    heading: String,
    lines: Vec<String>,
}

impl RawSection {
    fn body(&self) -> String {
        self.lines.join("\n").trim().to_string()
    }
}

fn is_fence(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("```") || t.starts_with("~~~")
}

/// Lines `split_sections` treats as structure outside a fence.
fn is_structural(line: &str) -> bool {
    line.starts_with("## ") || is_fence(line)
}

/// Escape a free-text body for writing inside a section.
///
/// Outside code fences, `## ` lines, fence openers with no closer below them,
/// and lines that already look escaped get one leading `\`. Fenced blocks
/// that close are written as is.
fn escape_body(body: &str) -> String {
    let lines: Vec<&str> = body.lines().collect();
    let mut out = Vec::with_capacity(lines.len());
    let mut in_fence = false;
    for (i, line) in lines.iter().enumerate() {
        if in_fence {
            if is_fence(line) {
                in_fence = false;
            }
            out.push(line.to_string());
            continue;
        }
        let literal = line.trim_start_matches('\\');
        let escape = if literal.len() != line.len() {
            is_structural(literal)
        } else if line.starts_with("## ") {
            true
        } else if is_fence(line) {
            let closed = lines[i + 1..].iter().any(|l| is_fence(l));
            in_fence = closed;
            !closed
        } else {
            false
        };
        if escape {
            out.push(format!("\\{}", line));
        } else {
            out.push(line.to_string());
        }
    }
    out.join("\n")
}

/// Inverse of `escape_body`.
fn unescape_body(body: &str) -> String {
    let mut out = Vec::new();
    let mut in_fence = false;
    for line in body.lines() {
        if is_fence(line) {
            in_fence = !in_fence;
        } else if !in_fence {
            if let Some(rest) = line.strip_prefix('\\') {
                if is_structural(rest.trim_start_matches('\\')) {
                    out.push(rest);
                    continue;
                }
            }
        }
        out.push(line);
    }
    out.join("\n")
}

/// Split `text` into its title and level-2 sections, ignoring headings inside code fences.
fn split_sections(text: &str) -> (Option<String>, Vec<RawSection>) {
    let mut title = None;
    let mut sections: Vec<RawSection> = Vec::new();
    let mut in_fence = false;

    for line in text.lines() {
        if is_fence(line) {
            in_fence = !in_fence;
        }
        if !in_fence {
            if let Some(h) = line.strip_prefix("## ") {
                sections.push(RawSection {
                    heading: h.trim().to_string(),
                    lines: Vec::new(),
                });
                continue;
            }
            if title.is_none() && sections.is_empty() {
                if let Some(t) = line.strip_prefix("# ") {
                    title = Some(t.trim().to_string());
                    continue;
                }
            }
        }
        if let Some(current) = sections.last_mut() {
            current.lines.push(line.to_string());
        } else if !line.trim().is_empty() {
            tracing::debug!(line, "ignoring text before first section");
        }
    }

    (title, sections)
}

fn strip_bullet(line: &str) -> Option<&str> {
    let t = line.trim();
    t.strip_prefix("- ")
        .or_else(|| t.strip_prefix("* "))
        .or_else(|| t.strip_prefix("+ "))
        .map(str::trim)
}

/// Parse a `Key: value` line, tolerating bullets and bold markup
/// (`- **Domain:** runtime`, `**Location**: ./ctx`). Keys come back lowercased.
pub fn parse_field_line(line: &str) -> Option<(String, String)> {
    let body = strip_bullet(line).unwrap_or_else(|| line.trim());
    let (key, value) = body.split_once(':')?;
    let key = key.replace(['*', '_'], "").trim().to_ascii_lowercase();
    if key.is_empty() {
        return None;
    }
    let value = value.trim().trim_start_matches('*').trim().to_string();
    Some((key, value))
}

fn parse_classification(lines: &[String]) -> Classification {
    let mut c = Classification::default();
    for (key, value) in lines.iter().filter_map(|l| parse_field_line(l)) {
        match key.as_str() {
            "domain" => {
                if !value.is_empty() {
                    c.domain = Some(value);
                }
            }
            "stability" => match value.parse() {
                Ok(v) => c.stability = Some(v),
                Err(e) => tracing::debug!(error = %e, "unparsable stability"),
            },
            "abstraction" => match value.parse() {
                Ok(v) => c.abstraction = Some(v),
                Err(e) => tracing::debug!(error = %e, "unparsable abstraction"),
            },
            "confidence" => match value.parse() {
                Ok(v) => c.confidence = Some(v),
                Err(e) => tracing::debug!(error = %e, "unparsable confidence"),
            },
            _ => {}
        }
    }
    c
}

/// Resolve `path` against the directory of `source_id`, folding `.` and `..`.
/// `..` past the node root is kept, which leaves the target dangling.
fn resolve_relative(source_id: &str, path: &str) -> String {
    let mut parts: Vec<&str> = match source_id.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Reduce a link-ish target declared by `source_id` to a node id.
///
/// Markdown links are file links, so `[x](../foo/bar.md)` from `runtime/overview`
/// becomes `foo/bar`; a leading `/` makes them root-relative. Wiki links and bare
/// ids are already node ids: `[[foo/bar]]`, `./foo/bar.md` and `` `foo/bar` ``
/// all become `foo/bar`.
pub fn normalize_target(source_id: &str, raw: &str) -> String {
    let raw = raw.trim().trim_matches('`');
    let (inner, is_file_link) = if let Some(c) = MD_LINK.captures(raw) {
        (c[1].to_string(), true)
    } else if let Some(c) = WIKI_LINK.captures(raw) {
        (c[1].to_string(), false)
    } else {
        (raw.to_string(), false)
    };
    let inner = inner.trim();
    let inner = inner.split('#').next().unwrap_or(inner);
    let inner = inner.strip_suffix(".md").unwrap_or(inner);
    if is_file_link && !inner.starts_with('/') {
        resolve_relative(source_id, inner)
    } else {
        inner.trim_start_matches("./").trim_start_matches('/').to_string()
    }
}

/// Parse one relationship line. `None` means the line is a declaration that could not be read.
pub fn parse_relationship_line(source_id: &str, line: &str) -> Option<Relationship> {
    let body = strip_bullet(line)?;
    let parts: Vec<&str> = REL_SEPARATOR.splitn(body, 3).collect();
    if parts.len() < 2 {
        return None;
    }
    let target = normalize_target(source_id, parts[0]);
    let rel_type = normalize_type_label(parts[1]);
    if target.is_empty() || rel_type.is_empty() {
        return None;
    }
    let description = parts.get(2).map(|d| d.trim()).unwrap_or("");
    Some(Relationship {
        target,
        rel_type,
        description: description.to_string(),
    })
}

fn parse_relationships(source_id: &str, lines: &[String]) -> (Vec<Relationship>, Vec<String>) {
    let mut relationships = Vec::new();
    let mut malformed = Vec::new();
    for line in lines {
        if strip_bullet(line).is_none() {
            continue;
        }
        match parse_relationship_line(source_id, line) {
            Some(r) => relationships.push(r),
            None => malformed.push(line.trim().to_string()),
        }
    }
    (relationships, malformed)
}

fn parse_metadata(lines: &[String]) -> Metadata {
    let mut m = Metadata::default();
    for (key, value) in lines.iter().filter_map(|l| parse_field_line(l)) {
        match key.as_str() {
            "created" | "created at" => m.created_at = value,
            "last updated" | "updated" | "updated at" => m.updated_at = value,
            "updated by" => m.updated_by = value,
            _ => {}
        }
    }
    m
}

fn parse_change_history(lines: &[String]) -> Vec<ChangeRecord> {
    lines
        .iter()
        .filter_map(|l| strip_bullet(l))
        .map(|entry| match entry.split_once(':') {
            Some((date, description)) => ChangeRecord {
                date: date.replace('*', "").trim().to_string(),
                description: description.trim().to_string(),
            },
            None => ChangeRecord {
                date: String::new(),
                description: entry.to_string(),
            },
        })
        .collect()
}

/// Parse a node file. `id` is used as the title fallback when the file has no `# ` heading.
pub fn parse_node(id: &str, text: &str) -> Node {
    let (title, sections) = split_sections(text);

    let mut node = Node {
        id: id.to_string(),
        title: title.unwrap_or_else(|| id.rsplit('/').next().unwrap_or(id).to_string()),
        purpose: String::new(),
        classification: Classification::default(),
        content: String::new(),
        relationships: Vec::new(),
        metadata: Metadata::default(),
        change_history: Vec::new(),
        extra_sections: Vec::new(),
        malformed_relationships: Vec::new(),
    };

    let mut seen: Vec<&'static str> = Vec::new();
    for section in &sections {
        let key = match section.heading.to_ascii_lowercase().as_str() {
            PURPOSE => Some(PURPOSE),
            CLASSIFICATION => Some(CLASSIFICATION),
            CONTENT => Some(CONTENT),
            RELATIONSHIPS => Some(RELATIONSHIPS),
            METADATA => Some(METADATA),
            CHANGE_HISTORY => Some(CHANGE_HISTORY),
            _ => None,
        };
        // A repeated known heading is kept as free-form text rather than merged.
        let key = key.filter(|k| !seen.contains(k));
        match key {
            Some(PURPOSE) => node.purpose = unescape_body(&section.body()),
            Some(CLASSIFICATION) => node.classification = parse_classification(&section.lines),
            Some(CONTENT) => node.content = unescape_body(&section.body()),
            Some(RELATIONSHIPS) => {
                let (rels, malformed) = parse_relationships(id, &section.lines);
                node.relationships = rels;
                node.malformed_relationships = malformed;
            }
            Some(METADATA) => node.metadata = parse_metadata(&section.lines),
            Some(CHANGE_HISTORY) => node.change_history = parse_change_history(&section.lines),
            _ => node.extra_sections.push(Section {
                heading: section.heading.clone(),
                body: unescape_body(&section.body()),
            }),
        }
        if let Some(k) = key {
            seen.push(k);
        }
    }

    if !node.malformed_relationships.is_empty() {
        tracing::debug!(
            node = id,
            count = node.malformed_relationships.len(),
            "malformed relationship lines"
        );
    }
    node
}

fn push_section(md: &mut String, heading: &str, body: &str) {
    md.push_str("## ");
    md.push_str(heading);
    md.push_str("\n\n");
    if !body.is_empty() {
        md.push_str(body);
        md.push_str("\n\n");
    }
}

pub fn render_relationship_line(r: &Relationship) -> String {
    if r.description.is_empty() {
        format!("- {} — {}", r.target, r.rel_type)
    } else {
        format!("- {} — {} — {}", r.target, r.rel_type, r.description)
    }
}

pub fn render_node(node: &Node) -> String {
    let mut md = String::new();
    md.push_str(&format!("# {}\n\n", node.title));

    push_section(&mut md, "Purpose", &escape_body(&node.purpose));

    let c = &node.classification;
    let mut class_lines = Vec::new();
    if let Some(d) = &c.domain {
        class_lines.push(format!("- **Domain:** {}", d));
    }
    if let Some(s) = c.stability {
        class_lines.push(format!("- **Stability:** {}", s));
    }
    if let Some(a) = c.abstraction {
        class_lines.push(format!("- **Abstraction:** {}", a));
    }
    if let Some(cf) = c.confidence {
        class_lines.push(format!("- **Confidence:** {}", cf));
    }
    push_section(&mut md, "Classification", &class_lines.join("\n"));

    push_section(&mut md, "Content", &escape_body(&node.content));

    for s in &node.extra_sections {
        push_section(&mut md, &s.heading, &escape_body(&s.body));
    }

    let rel_lines: Vec<String> = node
        .relationships
        .iter()
        .map(render_relationship_line)
        .chain(node.malformed_relationships.iter().cloned())
        .collect();
    push_section(&mut md, "Relationships", &rel_lines.join("\n"));

    let m = &node.metadata;
    let meta = format!(
        "- **Created:** {}\n- **Last Updated:** {}\n- **Updated By:** {}",
        m.created_at, m.updated_at, m.updated_by
    );
    push_section(&mut md, "Metadata", &meta);

    let history: Vec<String> = node
        .change_history
        .iter()
        .map(|h| {
            if h.date.is_empty() {
                format!("- {}", h.description)
            } else {
                format!("- {}: {}", h.date, h.description)
            }
        })
        .collect();
    push_section(&mut md, "Change History", &history.join("\n"));

    let trimmed_len = md.trim_end().len();
    md.truncate(trimmed_len);
    md.push('\n');
    md
}
