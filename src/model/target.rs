use serde::{Deserialize, Serialize};

/// Scheme added to targets given without one.
pub const DEFAULT_SCHEME: &str = "http://";

/// A URL or hostname submitted for analysis.
///
/// Targets are trimmed and given a default scheme on construction and
/// never change afterward.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    /// Normalizes `raw` into a target. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        if has_scheme(trimmed) {
            Some(Self(trimmed.to_string()))
        } else {
            Some(Self(format!("{}{}", DEFAULT_SCHEME, trimmed)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn has_scheme(s: &str) -> bool {
    match s.find("://") {
        Some(pos) if pos > 0 => s[..pos]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.'),
        _ => false,
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Target {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
