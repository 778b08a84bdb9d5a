//! Text output formatting with progress bars and colors.

use chrono::{DateTime, Local, Utc};
use tokeneater_core::{
    BucketKind, ModelTokenStats, PacingResult, PacingZone, UsageBucket, UsageLevel,
    UsageSnapshot, UsageThresholds,
};
use tokeneater_fetch::ConnectionTestResult;
use tokeneater_store::Settings;
use tokeneater_sync::{DisplayEntry, ErrorState, format_countdown};

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";

// Progress bar characters
const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

/// Display label for a bucket.
pub fn bucket_label(kind: BucketKind) -> &'static str {
    match kind {
        BucketKind::FiveHour => "Session",
        BucketKind::SevenDay => "Weekly",
        BucketKind::SevenDaySonnet => "Sonnet",
        BucketKind::SevenDayOpus => "Opus",
        BucketKind::SevenDayOauthApps => "Apps",
        BucketKind::SevenDayCowork => "Cowork",
    }
}

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    bar_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            bar_width: 10,
        }
    }

    /// Formats what a display surface would show.
    pub fn format_entry(&self, entry: &DisplayEntry) -> String {
        let mut lines = vec![self.bold("TokenEater")];

        let Some(snapshot) = &entry.snapshot else {
            let reason = entry.error.as_deref().unwrap_or("no data");
            lines.push(self.dim(&capitalize(reason)));
            if reason == tokeneater_sync::NOT_CONFIGURED {
                lines.push("Run `tokeneater check` after signing in.".to_string());
            }
            return lines.join("\n");
        };

        lines.push(self.format_usage(
            snapshot,
            entry.pacing.as_ref(),
            entry.thresholds,
            entry.date,
        ));

        if !entry.model_stats.is_empty() {
            lines.push(String::new());
            lines.push(self.format_model_stats(&entry.model_stats));
        }

        if let Some(fetched_at) = entry.fetched_at {
            let synced = format!("Updated {}", format_local(fetched_at));
            lines.push(String::new());
            if entry.is_stale {
                lines.push(format!("{} {}", self.dim(&synced), self.yellow("(stale)")));
            } else {
                lines.push(self.dim(&synced));
            }
        }

        lines.join("\n")
    }

    /// Formats every bucket present in a snapshot, plus pacing.
    pub fn format_usage(
        &self,
        snapshot: &UsageSnapshot,
        pacing: Option<&PacingResult>,
        thresholds: UsageThresholds,
        now: DateTime<Utc>,
    ) -> String {
        let mut lines: Vec<String> = BucketKind::ALL
            .iter()
            .filter_map(|&kind| {
                snapshot
                    .bucket(kind)
                    .map(|bucket| self.format_bucket(bucket, bucket_label(kind), thresholds, now))
            })
            .collect();

        if lines.is_empty() {
            lines.push(self.dim("No usage reported"));
        }

        if let Some(pacing) = pacing {
            lines.push(self.format_pacing(pacing));
        }

        lines.join("\n")
    }

    /// Formats one bucket with a progress bar and reset countdown.
    fn format_bucket(
        &self,
        bucket: &UsageBucket,
        label: &str,
        thresholds: UsageThresholds,
        now: DateTime<Utc>,
    ) -> String {
        let level = UsageLevel::from_percent(bucket.utilization, thresholds);
        let bar = self.progress_bar(bucket.utilization, level);
        let pct = self.color_for_level(level, &format!("{:>3}%", bucket.whole_percent()));

        let mut result = format!("{:<8} {} {}", format!("{label}:"), bar, pct);
        if let Some(resets_at) = bucket.resets_at {
            let countdown = format_countdown(now, resets_at);
            result.push_str(&format!("  {}", self.dim(&format!("resets in {countdown}"))));
        }
        result
    }

    /// Formats a progress bar filled by used percent.
    pub fn progress_bar(&self, percent_used: f64, level: UsageLevel) -> String {
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let filled = ((percent_used.clamp(0.0, 100.0) / 100.0) * self.bar_width as f64).round()
            as usize;
        let empty = self.bar_width.saturating_sub(filled);

        let bar = format!(
            "{}{}",
            BAR_FULL.to_string().repeat(filled),
            BAR_EMPTY.to_string().repeat(empty)
        );

        self.color_for_level(level, &bar)
    }

    fn format_pacing(&self, pacing: &PacingResult) -> String {
        let zone = pacing.zone.to_string();
        let zone = match pacing.zone {
            PacingZone::Chill => self.green(&zone),
            PacingZone::OnTrack => self.cyan(&zone),
            PacingZone::Hot => self.red(&zone),
        };
        format!(
            "{:<8} {} {}",
            "Pacing:",
            zone,
            self.dim(&format!("({:+.0} pts vs linear)", pacing.delta))
        )
    }

    /// Formats per-model token totals.
    pub fn format_model_stats(&self, stats: &[ModelTokenStats]) -> String {
        let mut lines = vec![self.dim("Tokens by model:")];
        for stat in stats {
            lines.push(format!(
                "  {:<12} {}",
                stat.model_name,
                format_number(stat.total_tokens)
            ));
        }
        lines.join("\n")
    }

    /// Formats a connection test outcome.
    pub fn format_connection(&self, result: &ConnectionTestResult) -> String {
        if result.success {
            format!("{} {}", self.green("✓"), result.message)
        } else {
            format!("{} {}", self.red("✗"), result.message)
        }
    }

    /// Formats the last sync outcome.
    pub fn format_error_state(&self, state: &ErrorState) -> Option<String> {
        let message = state.message()?;
        Some(match state {
            ErrorState::Network(_) => self.yellow(&message),
            _ => self.red(&message),
        })
    }

    /// Formats the settings.
    pub fn format_settings(&self, settings: &Settings) -> String {
        let proxy = if settings.proxy.enabled {
            format!("socks5 {}:{}", settings.proxy.host, settings.proxy.port)
        } else {
            "off".to_string()
        };

        [
            self.bold("TokenEater Configuration"),
            "─".repeat(40),
            String::new(),
            format!(
                "Thresholds:      warning {}%, critical {}%",
                settings.thresholds.warning_percent, settings.thresholds.critical_percent
            ),
            format!("Poll interval:   {}s", settings.poll_interval_secs),
            format!("Display refresh: {}s", settings.display_interval_secs),
            format!("Stale after:     {}s", settings.stale_budget_secs),
            format!("Proxy:           {proxy}"),
            format!("Notifications:   {}", on_off(settings.notifications_enabled)),
        ]
        .join("\n")
    }

    // ========================================================================
    // Color/style helpers
    // ========================================================================

    fn color_for_level(&self, level: UsageLevel, text: &str) -> String {
        match level {
            UsageLevel::Green => self.green(text),
            UsageLevel::Orange => self.yellow(text),
            UsageLevel::Red => self.red(text),
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }
}

#[allow(clippy::cast_precision_loss)]
fn format_number(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

fn format_local(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M").to_string()
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================
