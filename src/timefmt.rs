// Relative-time labels for listing cards and moderation rows.

use chrono::{DateTime, Utc};

/// Elapsed-hours threshold under which a listing still gets the "new" badge.
const NEW_BADGE_HOURS: i64 = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativeTime {
    pub text: String,
    pub is_new: bool,
}

/// Formats a timestamp against the current wall clock. Never memoize the
/// result; the label depends on "now".
pub fn format_relative_time(ts: DateTime<Utc>) -> RelativeTime {
    format_relative_time_at(ts, Utc::now())
}

pub fn format_relative_time_at(ts: DateTime<Utc>, now: DateTime<Utc>) -> RelativeTime {
    let elapsed = (now - ts).num_seconds().max(0);
    let is_new = elapsed / 3600 < NEW_BADGE_HOURS;

    let mins = elapsed / 60;
    let hours = elapsed / 3600;
    let days = elapsed / 86_400;

    let text = if elapsed < 60 {
        "Just now".to_string()
    } else if mins < 60 {
        unit_ago(mins, "min")
    } else if hours < 24 {
        unit_ago(hours, "hour")
    } else if days < 7 {
        unit_ago(days, "day")
    } else if days < 28 {
        unit_ago(days / 7, "week")
    } else if days / 30 < 12 {
        unit_ago((days / 30).max(1), "month")
    } else {
        unit_ago((days / 365).max(1), "year")
    };

    RelativeTime { text, is_new }
}

fn unit_ago(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(elapsed: Duration) -> RelativeTime {
        let now = Utc::now();
        format_relative_time_at(now - elapsed, now)
    }

    #[test]
    fn buckets_at_boundaries() {
        assert_eq!(at(Duration::seconds(0)).text, "Just now");
        assert_eq!(at(Duration::seconds(59)).text, "Just now");
        assert_eq!(at(Duration::seconds(60)).text, "1 min ago");
        assert_eq!(at(Duration::minutes(59)).text, "59 mins ago");
        assert_eq!(at(Duration::minutes(60)).text, "1 hour ago");
        assert_eq!(at(Duration::hours(23)).text, "23 hours ago");
        assert_eq!(at(Duration::hours(24)).text, "1 day ago");
        assert_eq!(at(Duration::days(6)).text, "6 days ago");
        assert_eq!(at(Duration::days(7)).text, "1 week ago");
        assert_eq!(at(Duration::days(27)).text, "3 weeks ago");
        // A 4-week-old entry already reads as a month.
        assert_eq!(at(Duration::days(28)).text, "1 month ago");
    }

    #[test]
    fn months_and_years() {
        assert_eq!(at(Duration::days(30)).text, "1 month ago");
        assert_eq!(at(Duration::days(359)).text, "11 months ago");
        assert_eq!(at(Duration::days(400)).text, "1 year ago");
        assert_eq!(at(Duration::days(800)).text, "2 years ago");
    }

    #[test]
    fn new_badge_boundary() {
        // 5h59m is still new, 6h00m is not.
        assert!(at(Duration::minutes(5 * 60 + 59)).is_new);
        assert!(!at(Duration::hours(6)).is_new);
        // Independent of the text bucket: a 5-hour-old listing shows an
        // hours label and is still new.
        let five = at(Duration::hours(5));
        assert_eq!(five.text, "5 hours ago");
        assert!(five.is_new);
    }

    #[test]
    fn future_timestamps_clamp_to_just_now() {
        let now = Utc::now();
        let r = format_relative_time_at(now + Duration::minutes(5), now);
        assert_eq!(r.text, "Just now");
        assert!(r.is_new);
    }

    #[test]
    fn bucket_index_is_monotonic() {
        fn bucket(text: &str) -> usize {
            for (i, unit) in ["Just now", "min", "hour", "day", "week", "month", "year"]
                .iter()
                .enumerate()
            {
                if text.contains(unit) {
                    return i;
                }
            }
            panic!("unexpected label: {}", text);
        }

        let mut last = 0;
        for secs in (0..86_400 * 800).step_by(1800) {
            let b = bucket(&at(Duration::seconds(secs)).text);
            assert!(b >= last, "bucket regressed at {}s", secs);
            last = b;
        }
    }
}
