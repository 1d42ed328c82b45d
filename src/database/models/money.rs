use bigdecimal::{BigDecimal, RoundingMode};
use chrono::{DateTime, Utc};

/// Round half away from zero to two decimals.
pub fn round2(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(2, RoundingMode::HalfUp)
}

pub fn zero() -> BigDecimal {
    BigDecimal::from(0).with_scale(2)
}

/// Hours between start and end from whole minutes, never negative.
pub fn planned_hours(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> BigDecimal {
    let minutes = (ends_at - starts_at).num_minutes();
    if minutes <= 0 {
        return zero();
    }
    round2(&(BigDecimal::from(minutes) / BigDecimal::from(60)))
}

/// `hours * rate` rounded, or `None` when no rate is known.
pub fn line_total(hours: &BigDecimal, rate: Option<&BigDecimal>) -> Option<BigDecimal> {
    rate.map(|rate| round2(&(hours * rate)))
}

pub fn sum<'a>(values: impl IntoIterator<Item = &'a BigDecimal>) -> BigDecimal {
    values
        .into_iter()
        .fold(zero(), |total, value| round2(&(total + value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn dec(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round2(&dec("2.345")), dec("2.35"));
        assert_eq!(round2(&dec("-2.345")), dec("-2.35"));
        assert_eq!(round2(&dec("2.344")), dec("2.34"));
    }

    #[test]
    fn planned_hours_uses_whole_minutes() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();

        assert_eq!(planned_hours(start, start + Duration::minutes(450)), dec("7.50"));
        assert_eq!(planned_hours(start, start + Duration::minutes(20)), dec("0.33"));
        assert_eq!(
            planned_hours(start, start + Duration::seconds(119)),
            dec("0.02")
        );
    }

    #[test]
    fn planned_hours_is_never_negative() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();

        assert_eq!(planned_hours(start, start - Duration::hours(2)), zero());
    }

    #[test]
    fn line_total_keeps_missing_rate_missing() {
        assert_eq!(line_total(&dec("7.5"), None), None);
        assert_eq!(line_total(&dec("7.5"), Some(&dec("150.25"))), Some(dec("1126.88")));
    }
}
