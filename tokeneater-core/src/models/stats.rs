//! Per-model token totals.

use serde::{Deserialize, Serialize};

/// Token total for one model family/version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelTokenStats {
    /// Short display name (e.g. "Sonnet 4.6").
    pub model_name: String,
    /// Input, output, and cache tokens combined.
    pub total_tokens: u64,
}

impl ModelTokenStats {
    /// Creates a stats entry.
    pub fn new(model_name: impl Into<String>, total_tokens: u64) -> Self {
        Self {
            model_name: model_name.into(),
            total_tokens,
        }
    }
}

/// Shortens a model id for display.
///
/// `claude-sonnet-4-6-20251101` becomes `Sonnet 4.6`. Ids outside the
/// opus/sonnet/haiku families are returned unchanged.
pub fn short_model_name(id: &str) -> String {
    let lower = id.to_lowercase();

    let family = if lower.contains("opus") {
        "Opus"
    } else if lower.contains("sonnet") {
        "Sonnet"
    } else if lower.contains("haiku") {
        "Haiku"
    } else {
        return id.to_string();
    };

    let version = lower
        .split('-')
        .skip(2)
        .filter(|part| !(part.len() == 8 && part.chars().all(|c| c.is_ascii_digit())))
        .collect::<Vec<_>>()
        .join(".");

    if version.is_empty() {
        family.to_string()
    } else {
        format!("{family} {version}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_model_name() {
        assert_eq!(short_model_name("claude-sonnet-4-6-20251101"), "Sonnet 4.6");
        assert_eq!(short_model_name("claude-opus-4-1"), "Opus 4.1");
        assert_eq!(short_model_name("claude-haiku"), "Haiku");
        assert_eq!(short_model_name("gpt-4o"), "gpt-4o");
    }
}
