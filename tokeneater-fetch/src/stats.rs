//! Per-model token totals from the Claude CLI's `~/.claude.json`.

use std::collections::HashMap;
use std::path::PathBuf;

use serde_json::Value;
use tokeneater_core::{ModelTokenStats, short_model_name};
use tracing::{debug, warn};

const TOKEN_FIELDS: [&str; 4] = [
    "inputTokens",
    "outputTokens",
    "cacheReadInputTokens",
    "cacheCreationInputTokens",
];

/// Reads `projects.*.lastModelUsage` and totals tokens per model.
#[derive(Debug, Clone)]
pub struct ModelStatsReader {
    path: Option<PathBuf>,
}

impl Default for ModelStatsReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelStatsReader {
    /// Reads from `~/.claude.json`.
    pub fn new() -> Self {
        Self {
            path: dirs::home_dir().map(|h| h.join(".claude.json")),
        }
    }

    /// Reads from a specific file.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Returns totals sorted by descending token count.
    ///
    /// Any read or parse failure yields an empty list.
    pub async fn read(&self) -> Vec<ModelTokenStats> {
        let Some(path) = &self.path else {
            return Vec::new();
        };

        let content = match tokio::fs::read(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read model stats");
                return Vec::new();
            }
        };

        match serde_json::from_slice::<Value>(&content) {
            Ok(json) => {
                let stats = totals(&json);
                debug!(models = stats.len(), "Model stats read");
                stats
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Model stats file is not valid JSON");
                Vec::new()
            }
        }
    }
}

fn totals(json: &Value) -> Vec<ModelTokenStats> {
    let Some(projects) = json.get("projects").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut totals: HashMap<String, u64> = HashMap::new();
    let usages = projects
        .values()
        .filter_map(|project| project.get("lastModelUsage")?.as_object());

    for model_usage in usages {
        for (model_id, usage) in model_usage {
            let tokens: u64 = TOKEN_FIELDS
                .iter()
                .filter_map(|field| usage.get(*field)?.as_u64())
                .sum();
            *totals.entry(short_model_name(model_id)).or_default() += tokens;
        }
    }

    let mut stats: Vec<ModelTokenStats> = totals
        .into_iter()
        .filter(|(_, tokens)| *tokens > 0)
        .map(|(name, tokens)| ModelTokenStats::new(name, tokens))
        .collect();
    stats.sort_by(|a, b| {
        b.total_tokens
            .cmp(&a.total_tokens)
            .then_with(|| a.model_name.cmp(&b.model_name))
    });
    stats
}
