//! Shared date and id helpers for node metadata, change history and ledger entries.

use serde_json::Value as JsonValue;
use ulid::Ulid;

/// Calendar date in the `YYYY-MM-DD` form used by node metadata and change history.
pub fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

pub fn new_entry_id() -> String {
    Ulid::new().to_string()
}

/// Response envelope for `--format json` command output.
pub fn command_envelope(cmd: &str, status: &str, extra: JsonValue) -> JsonValue {
    let mut base = serde_json::json!({
        "cmd": cmd,
        "status": status,
        "date": today(),
    });
    if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    base
}
