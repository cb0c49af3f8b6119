//! Compact terminal rendering for validate and node listings.

use colored::Colorize;

/// Collapse whitespace and bound length for one-line display.
pub fn compact_line(input: &str, max_chars: usize) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    let preview: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", preview)
    } else {
        preview
    }
}

/// Up to `max_items` messages joined with ` | `, with a `(+N more)` tail.
pub fn preview_messages(messages: &[String], max_items: usize, max_chars: usize) -> String {
    let shown = messages
        .iter()
        .take(max_items)
        .map(|m| compact_line(m, max_chars))
        .collect::<Vec<_>>()
        .join(" | ");
    match messages.len().saturating_sub(max_items) {
        0 => shown,
        more => format!("{} (+{} more)", shown, more),
    }
}

pub fn gate_line(gate: &str, defects: usize) -> String {
    if defects == 0 {
        format!("validate: gate {} {}", gate, "pass".green())
    } else {
        format!(
            "validate: gate {} {} ({})",
            gate,
            "fail".red().bold(),
            defects
        )
    }
}

/// `✓`/`✗` marker for a node's classification state in listings.
pub fn classification_marker(complete: bool) -> String {
    if complete {
        "✓".green().to_string()
    } else {
        "✗".yellow().to_string()
    }
}
