//! Relative due-date rules attached to saved lists.
//!
//! A rule is an optional signed shift followed by an optional anchor:
//!
//! ```text
//! now
//! +2d
//! -30m
//! end of day | eod
//! end of week | eow
//! end of month | eom
//! +1w end of week
//! ```
//!
//! Shift units are `m` (minutes), `h` (hours), `d` (days) and `w` (weeks).
//! Anchors snap to `23:59:59` UTC of the last day of the period; weeks end on
//! Sunday.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, Months, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    EndOfDay,
    EndOfWeek,
    EndOfMonth,
}

/// A parsed relative due-date rule.
///
/// Serializes as its normalized rule text (lowercase, single spaces).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DueOffset {
    shift: TimeDelta,
    anchor: Option<Anchor>,
    rule: String,
}

impl DueOffset {
    /// Resolve the rule against `now`.
    #[must_use]
    pub fn resolve(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let shifted = now.checked_add_signed(self.shift).unwrap_or(now);
        let Some(anchor) = self.anchor else {
            return shifted;
        };

        let date = shifted.date_naive();
        let last_day = match anchor {
            Anchor::EndOfDay => Some(date),
            Anchor::EndOfWeek => {
                let remaining = 6 - date.weekday().num_days_from_monday();
                date.checked_add_days(Days::new(u64::from(remaining)))
            }
            Anchor::EndOfMonth => date
                .with_day(1)
                .and_then(|first| first.checked_add_months(Months::new(1)))
                .and_then(|next| next.pred_opt()),
        };

        last_day
            .and_then(|day| day.and_hms_opt(23, 59, 59))
            .map_or(shifted, |end| end.and_utc())
    }

    /// The normalized rule text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.rule
    }
}

fn invalid(raw: &str, reason: &str) -> CoreError {
    CoreError::Validation(format!("invalid due offset '{raw}': {reason}"))
}

fn looks_like_shift(token: &str) -> bool {
    token
        .chars()
        .next()
        .is_some_and(|c| c == '+' || c == '-' || c.is_ascii_digit())
}

fn parse_shift(raw: &str, token: &str) -> Result<TimeDelta, CoreError> {
    let (negative, body) = match token.as_bytes().first() {
        Some(b'+') => (false, &token[1..]),
        Some(b'-') => (true, &token[1..]),
        _ => (false, token),
    };
    if body.len() < 2 || !body.is_ascii() {
        return Err(invalid(raw, "shift needs an amount and a unit"));
    }

    let (amount, unit) = body.split_at(body.len() - 1);
    let amount: i64 = amount
        .parse()
        .map_err(|_| invalid(raw, &format!("'{amount}' is not a number")))?;
    let amount = if negative { -amount } else { amount };

    let delta = match unit {
        "m" => TimeDelta::try_minutes(amount),
        "h" => TimeDelta::try_hours(amount),
        "d" => TimeDelta::try_days(amount),
        "w" => TimeDelta::try_weeks(amount),
        other => return Err(invalid(raw, &format!("unknown unit '{other}'"))),
    };
    delta.ok_or_else(|| invalid(raw, "shift out of range"))
}

impl FromStr for DueOffset {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let rule = raw
            .split_whitespace()
            .map(str::to_ascii_lowercase)
            .collect::<Vec<_>>()
            .join(" ");
        if rule.is_empty() {
            return Err(invalid(raw, "empty rule"));
        }
        if rule == "now" {
            return Ok(Self {
                shift: TimeDelta::zero(),
                anchor: None,
                rule,
            });
        }

        let (shift, rest) = match rule.split_once(' ') {
            Some((first, rest)) if looks_like_shift(first) => (parse_shift(raw, first)?, rest),
            None if looks_like_shift(&rule) => (parse_shift(raw, &rule)?, ""),
            _ => (TimeDelta::zero(), rule.as_str()),
        };

        let anchor = match rest {
            "" => None,
            "end of day" | "eod" => Some(Anchor::EndOfDay),
            "end of week" | "eow" => Some(Anchor::EndOfWeek),
            "end of month" | "eom" => Some(Anchor::EndOfMonth),
            other => return Err(invalid(raw, &format!("unknown anchor '{other}'"))),
        };

        Ok(Self {
            shift,
            anchor,
            rule,
        })
    }
}

impl TryFrom<String> for DueOffset {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DueOffset> for String {
    fn from(value: DueOffset) -> Self {
        value.rule
    }
}

impl fmt::Display for DueOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    /// Wednesday 2026-03-11 10:15:00 UTC.
    fn wednesday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 11, 10, 15, 0).unwrap()
    }

    #[rstest]
    #[case("now", (2026, 3, 11, 10, 15, 0))]
    #[case("+2h", (2026, 3, 11, 12, 15, 0))]
    #[case("-15m", (2026, 3, 11, 10, 0, 0))]
    #[case("+1d", (2026, 3, 12, 10, 15, 0))]
    #[case("end of day", (2026, 3, 11, 23, 59, 59))]
    #[case("EOD", (2026, 3, 11, 23, 59, 59))]
    #[case("end of week", (2026, 3, 15, 23, 59, 59))]
    #[case("eom", (2026, 3, 31, 23, 59, 59))]
    #[case("+1d end of day", (2026, 3, 12, 23, 59, 59))]
    #[case("+1w  End  of  Week", (2026, 3, 22, 23, 59, 59))]
    fn resolves_rules(#[case] rule: &str, #[case] expected: (i32, u32, u32, u32, u32, u32)) {
        let offset: DueOffset = rule.parse().unwrap();
        let (y, mo, d, h, mi, s) = expected;
        assert_eq!(
            offset.resolve(wednesday()),
            Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
        );
    }

    #[rstest]
    #[case("")]
    #[case("tomorrow")]
    #[case("+5y")]
    #[case("+d")]
    #[case("+1d end of year")]
    #[case("+xd")]
    fn rejects_invalid_rules(#[case] rule: &str) {
        let err = rule.parse::<DueOffset>().unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)), "{err}");
    }

    #[test]
    fn end_of_month_handles_december() {
        let offset: DueOffset = "eom".parse().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 12, 3, 8, 0, 0).unwrap();
        assert_eq!(
            offset.resolve(now),
            Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 59).unwrap()
        );
    }

    #[test]
    fn end_of_week_on_sunday_is_same_day() {
        let offset: DueOffset = "eow".parse().unwrap();
        let sunday = Utc.with_ymd_and_hms(2026, 3, 15, 1, 0, 0).unwrap();
        assert_eq!(
            offset.resolve(sunday),
            Utc.with_ymd_and_hms(2026, 3, 15, 23, 59, 59).unwrap()
        );
    }

    #[test]
    fn serializes_as_normalized_rule() {
        let offset: DueOffset = "  +1D   End of Day ".parse().unwrap();
        assert_eq!(offset.as_str(), "+1d end of day");
        assert_eq!(serde_json::to_string(&offset).unwrap(), "\"+1d end of day\"");

        let back: DueOffset = serde_json::from_str("\"+1d end of day\"").unwrap();
        assert_eq!(back, offset);
        assert!(serde_json::from_str::<DueOffset>("\"someday\"").is_err());
    }
}
