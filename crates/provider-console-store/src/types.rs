//! Domain types persisted by the credential store.

use serde::{Deserialize, Serialize};

/// Number of characters of the original code kept in [`CredentialRecord::code_preview`].
pub const CODE_PREVIEW_CHARS: usize = 20;

/// How long, in seconds, a metadata record counts as evidence of authentication.
pub const FRESHNESS_WINDOW_SECS: f64 = 24.0 * 60.0 * 60.0;

/// A regular file inside the configuration directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialFile {
    /// Base name of the file.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
}

impl CredentialFile {
    /// Create a new file entry.
    #[must_use]
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }

    /// Returns true if the file has any content.
    #[must_use]
    pub const fn is_non_empty(&self) -> bool {
        self.size > 0
    }
}

/// Metadata describing the last successful authentication.
///
/// Written to `auth_info.json` whenever a method succeeds. The record never
/// contains the full authentication code, only its length and a short preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Unix timestamp (fractional seconds) of the authentication.
    pub timestamp: f64,
    /// Name of the method that succeeded.
    pub method: String,
    /// Length of the submitted code, in characters.
    pub code_length: usize,
    /// First characters of the code, followed by `...` when truncated.
    pub code_preview: String,
    /// Always true for records written by the resolver.
    pub success: bool,
    /// Files present in the configuration directory when the record was written.
    #[serde(default)]
    pub files_created: Vec<CredentialFile>,
}

impl CredentialRecord {
    /// Build a success record for `code` authenticated via `method`.
    #[must_use]
    pub fn success(
        code: &str,
        method: impl Into<String>,
        timestamp: f64,
        files_created: Vec<CredentialFile>,
    ) -> Self {
        Self {
            timestamp,
            method: method.into(),
            code_length: code.chars().count(),
            code_preview: preview(code, CODE_PREVIEW_CHARS),
            success: true,
            files_created,
        }
    }

    /// Returns true if the record is younger than `window_secs` at `now_secs`.
    ///
    /// The boundary is exclusive: a record exactly `window_secs` old is stale.
    #[must_use]
    pub fn is_fresh(&self, now_secs: f64, window_secs: f64) -> bool {
        self.success && now_secs - self.timestamp < window_secs
    }
}

/// Returns the first `max_chars` characters of `code`, with `...` appended when cut.
#[must_use]
pub fn preview(code: &str, max_chars: usize) -> String {
    match code.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &code[..cut]),
        None => code.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_long_codes() {
        assert_eq!(preview("abcdefghijklmnopqrstuvwxyz", 20), "abcdefghijklmnopqrst...");
        assert_eq!(preview("short", 20), "short");
        assert_eq!(preview("exactly-twenty-chars", 20), "exactly-twenty-chars");
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let code = "é".repeat(25);
        assert_eq!(preview(&code, 20), format!("{}...", "é".repeat(20)));
    }

    #[test]
    fn success_record_never_holds_full_code() {
        let code = "A".repeat(64);
        let record = CredentialRecord::success(&code, "direct_binary", 100.0, vec![]);

        assert_eq!(record.code_length, 64);
        assert_eq!(record.code_preview, format!("{}...", "A".repeat(20)));
        assert!(record.success);

        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains(&code));
    }

    #[test]
    fn freshness_boundary_is_exclusive() {
        let record = CredentialRecord::success("code", "manual_fallback", 1_000.0, vec![]);

        assert!(record.is_fresh(1_000.0 + FRESHNESS_WINDOW_SECS - 1.0, FRESHNESS_WINDOW_SECS));
        assert!(!record.is_fresh(1_000.0 + FRESHNESS_WINDOW_SECS, FRESHNESS_WINDOW_SECS));
        assert!(!record.is_fresh(1_000.0 + FRESHNESS_WINDOW_SECS + 1.0, FRESHNESS_WINDOW_SECS));
    }

    #[test]
    fn record_parses_without_file_list() {
        let json = r#"{"timestamp":5.5,"method":"m","code_length":3,"code_preview":"abc","success":true}"#;
        let record: CredentialRecord = serde_json::from_str(json).unwrap();
        assert!(record.files_created.is_empty());
        assert!((record.timestamp - 5.5).abs() < f64::EPSILON);
    }
}
