use serde::Deserialize;

/// Input-sanitization configuration
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct SanitizeConfig {
    /// Maximum length kept per string field, characters
    /// Longer values are truncated, not rejected
    /// Default: 10000
    #[serde(default = "default_max_field_len")]
    pub max_field_len: usize,
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self { max_field_len: default_max_field_len() }
    }
}

fn default_max_field_len() -> usize {
    10_000
}
