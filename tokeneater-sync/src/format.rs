//! Text for alerts and status lines.
//!
//! Bodies depend on the level, on whether the metric is the session window or
//! a weekly one, and, for session warnings, on the weekly pacing zone. When
//! the reset time is unknown or already past, a generic body is used.

use chrono::{DateTime, Local, Utc};
use tokeneater_core::{MetricType, PacingZone, UsageLevel, UsageThresholds};

/// Formats the time left until `target`: `45min`, `2h 5min`, `1d 3h`.
///
/// A target at or before `now` gives `now`.
pub fn format_countdown(now: DateTime<Utc>, target: DateTime<Utc>) -> String {
    let seconds = (target - now).num_seconds();
    if seconds <= 0 {
        return "now".to_string();
    }

    let total_minutes = seconds / 60;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 24 {
        format!("{}d {}h", hours / 24, hours % 24)
    } else if hours > 0 {
        format!("{hours}h {minutes}min")
    } else {
        format!("{minutes}min")
    }
}

/// Local wall-clock time, `14:05`.
pub fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M").to_string()
}

/// Local day and time, `Tue Jun 10, 14:05`.
pub fn format_date_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%a %b %-d, %H:%M").to_string()
}

fn future_reset(resets_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    resets_at.filter(|at| *at > now)
}

/// Alert title: `⚠️ Session — 72%`.
pub fn alert_title(level: UsageLevel, label: &str, percent: i64) -> String {
    let marker = match level {
        UsageLevel::Green => "\u{1f7e2}",
        UsageLevel::Orange => "\u{26a0}\u{fe0f}",
        UsageLevel::Red => "\u{1f534}",
    };
    format!("{marker} {label} \u{2014} {percent}%")
}

/// Body for an escalation to `level`. Green has no escalation body.
pub fn escalation_body(
    metric_type: MetricType,
    level: UsageLevel,
    resets_at: Option<DateTime<Utc>>,
    pacing: Option<PacingZone>,
    thresholds: UsageThresholds,
    now: DateTime<Utc>,
) -> String {
    let Some(resets_at) = future_reset(resets_at, now) else {
        return fallback_escalation(level, thresholds);
    };

    match (level, metric_type) {
        (UsageLevel::Orange, MetricType::Session) => {
            let countdown = format_countdown(now, resets_at);
            let time = format_time(resets_at);
            match pacing.unwrap_or(PacingZone::OnTrack) {
                PacingZone::Chill => format!(
                    "Resets in {countdown} ({time}). Your weekly pace is relaxed, no need to slow down."
                ),
                PacingZone::OnTrack => format!(
                    "Resets in {countdown} ({time}). Your weekly pace is on track."
                ),
                PacingZone::Hot => format!(
                    "Resets in {countdown} ({time}). You are ahead of your weekly pace, consider easing off."
                ),
            }
        }
        (UsageLevel::Orange, MetricType::Weekly) => format!(
            "Weekly usage is climbing. Resets {}.",
            format_date_time(resets_at)
        ),
        (UsageLevel::Red, MetricType::Session) => format!(
            "Almost at the session limit. Resets in {} ({}).",
            format_countdown(now, resets_at),
            format_time(resets_at)
        ),
        (UsageLevel::Red, MetricType::Weekly) => format!(
            "Almost at the weekly limit. Resets {}.",
            format_date_time(resets_at)
        ),
        (UsageLevel::Green, _) => fallback_escalation(level, thresholds),
    }
}

fn fallback_escalation(level: UsageLevel, thresholds: UsageThresholds) -> String {
    match level {
        UsageLevel::Orange => format!(
            "Usage passed {}%. Keep an eye on it.",
            thresholds.warning_percent
        ),
        UsageLevel::Red => "Usage limit nearly reached.".to_string(),
        UsageLevel::Green => String::new(),
    }
}

/// Body for a return to green.
pub fn recovery_body(
    metric_type: MetricType,
    resets_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> String {
    let Some(resets_at) = future_reset(resets_at, now) else {
        return "Usage is back to normal.".to_string();
    };

    match metric_type {
        MetricType::Session => format!(
            "Back to normal. Session resets at {}.",
            format_time(resets_at)
        ),
        MetricType::Weekly => format!(
            "Back to normal. Weekly window resets {}.",
            format_date_time(resets_at)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_countdown() {
        let now = now();
        assert_eq!(format_countdown(now, now + Duration::minutes(45)), "45min");
        assert_eq!(format_countdown(now, now + Duration::seconds(20)), "0min");
        assert_eq!(
            format_countdown(now, now + Duration::minutes(2 * 60 + 5)),
            "2h 5min"
        );
        assert_eq!(format_countdown(now, now + Duration::hours(3)), "3h 0min");
        assert_eq!(format_countdown(now, now + Duration::hours(27)), "1d 3h");
        assert_eq!(format_countdown(now, now - Duration::minutes(1)), "now");
    }

    #[test]
    fn test_date_time_differs_across_days() {
        let now = now();
        assert_ne!(format_date_time(now), format_date_time(now + Duration::days(3)));
        assert!(!format_time(now).is_empty());
    }

    #[test]
    fn test_titles() {
        assert_eq!(
            alert_title(UsageLevel::Orange, "Session", 65),
            "\u{26a0}\u{fe0f} Session \u{2014} 65%"
        );
        assert!(alert_title(UsageLevel::Red, "Weekly", 90).starts_with('\u{1f534}'));
    }

    #[test]
    fn test_escalation_routing() {
        let now = now();
        let reset = Some(now + Duration::hours(2));
        let t = UsageThresholds::default();

        let chill = escalation_body(MetricType::Session, UsageLevel::Orange, reset, Some(PacingZone::Chill), t, now);
        let hot = escalation_body(MetricType::Session, UsageLevel::Orange, reset, Some(PacingZone::Hot), t, now);
        let weekly = escalation_body(MetricType::Weekly, UsageLevel::Orange, reset, None, t, now);
        assert_ne!(chill, hot);
        assert_ne!(chill, weekly);
        assert!(hot.contains("2h 0min"));

        let red_session = escalation_body(MetricType::Session, UsageLevel::Red, reset, None, t, now);
        let red_weekly = escalation_body(MetricType::Weekly, UsageLevel::Red, reset, None, t, now);
        assert_ne!(red_session, red_weekly);

        assert!(escalation_body(MetricType::Session, UsageLevel::Green, reset, None, t, now).is_empty());
    }

    #[test]
    fn test_escalation_fallback_without_future_reset() {
        let now = now();
        let t = UsageThresholds::default();
        let missing = escalation_body(MetricType::Session, UsageLevel::Orange, None, None, t, now);
        let past = escalation_body(
            MetricType::Session,
            UsageLevel::Orange,
            Some(now - Duration::hours(1)),
            None,
            t,
            now,
        );
        assert_eq!(missing, past);
        assert!(missing.contains("60%"));
    }

    #[test]
    fn test_recovery_routing() {
        let now = now();
        let reset = Some(now + Duration::hours(5));
        let session = recovery_body(MetricType::Session, reset, now);
        let weekly = recovery_body(MetricType::Weekly, reset, now);
        assert_ne!(session, weekly);
        assert_ne!(session, recovery_body(MetricType::Session, None, now));
        assert_eq!(
            recovery_body(MetricType::Session, None, now),
            recovery_body(MetricType::Weekly, Some(now - Duration::minutes(1)), now)
        );
    }
}
