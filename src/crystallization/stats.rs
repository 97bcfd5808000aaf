//! Registry statistics, computed on demand from the canonical records

use crate::models::{CrystallizationStats, CrystallizationStatus, CrystallizedTest};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;

/// Compute statistics as of `now` (UTC calendar days)
pub fn compute_stats<'a>(
    tests: impl IntoIterator<Item = &'a CrystallizedTest>,
    now: DateTime<Utc>,
) -> CrystallizationStats {
    let mut by_status: BTreeMap<CrystallizationStatus, usize> = CrystallizationStatus::ALL
        .into_iter()
        .map(|status| (status, 0))
        .collect();

    let today = now.date_naive();
    let mut total = 0;
    let mut quality_sum = 0.0;
    let mut locked = 0;
    let mut crystallized_today = 0;
    let mut crystallized_days: Vec<NaiveDate> = Vec::new();

    for test in tests {
        total += 1;
        quality_sum += test.review.quality_score;
        *by_status.entry(test.status).or_insert(0) += 1;

        if test.locked {
            locked += 1;
        }

        if test.status == CrystallizationStatus::Crystallized {
            if let Some(at) = test.crystallized_at {
                let day = at.date_naive();
                if day == today {
                    crystallized_today += 1;
                }
                crystallized_days.push(day);
            }
        }
    }

    let average_quality_score = if total == 0 {
        0.0
    } else {
        quality_sum / total as f64
    };

    CrystallizationStats {
        total,
        under_review: by_status[&CrystallizationStatus::UnderReview],
        needing_changes: by_status[&CrystallizationStatus::NeedsChanges],
        by_status,
        average_quality_score,
        crystallized_today,
        locked,
        crystallization_rate: crystallization_rate(&crystallized_days),
    }
}

/// Crystallizations per calendar day over the earliest-to-latest span
///
/// Zero when the crystallizations cover fewer than two calendar days.
fn crystallization_rate(days: &[NaiveDate]) -> f64 {
    let (Some(first), Some(last)) = (days.iter().min(), days.iter().max()) else {
        return 0.0;
    };

    let span = (*last - *first).num_days() + 1;
    if span < 2 {
        return 0.0;
    }

    days.len() as f64 / span as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn test_with(status: CrystallizationStatus, score: f64) -> CrystallizedTest {
        let mut test = CrystallizedTest::new(
            format!("{}-{score}.spec.ts", status.name()),
            "S-1",
            "sha256:00",
            Utc::now(),
        );
        test.status = status;
        test.review.quality_score = score;
        test
    }

    fn crystallized_at(at: DateTime<Utc>) -> CrystallizedTest {
        let mut test = test_with(CrystallizationStatus::Crystallized, 80.0);
        test.crystallized_at = Some(at);
        test.locked = true;
        test
    }

    #[test]
    fn test_empty_registry() {
        let stats = compute_stats(std::iter::empty(), Utc::now());
        assert_eq!(stats.total, 0);
        assert_eq!(stats.average_quality_score, 0.0);
        assert_eq!(stats.crystallization_rate, 0.0);
        assert_eq!(stats.by_status.len(), 6);
        assert!(stats.by_status.values().all(|&n| n == 0));
    }

    #[test]
    fn test_counts_and_average() {
        let tests = vec![
            test_with(CrystallizationStatus::UnderReview, 60.0),
            test_with(CrystallizationStatus::UnderReview, 80.0),
            test_with(CrystallizationStatus::NeedsChanges, 40.0),
            test_with(CrystallizationStatus::Generated, 0.0),
        ];
        let stats = compute_stats(&tests, Utc::now());

        assert_eq!(stats.total, 4);
        assert_eq!(stats.under_review, 2);
        assert_eq!(stats.needing_changes, 1);
        assert_eq!(stats.count(CrystallizationStatus::Generated), 1);
        assert_eq!(stats.average_quality_score, 45.0);
    }

    #[test]
    fn test_crystallized_today_uses_utc_day() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let tests = vec![
            crystallized_at(Utc.with_ymd_and_hms(2026, 3, 10, 0, 5, 0).unwrap()),
            crystallized_at(Utc.with_ymd_and_hms(2026, 3, 9, 23, 55, 0).unwrap()),
        ];
        let stats = compute_stats(&tests, now);
        assert_eq!(stats.crystallized_today, 1);
        assert_eq!(stats.locked, 2);
    }

    #[test]
    fn test_rate_zero_within_single_day() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 18, 0, 0).unwrap();
        let tests = vec![
            crystallized_at(now - Duration::hours(5)),
            crystallized_at(now - Duration::hours(1)),
        ];
        assert_eq!(compute_stats(&tests, now).crystallization_rate, 0.0);
    }

    #[test]
    fn test_rate_over_span_of_days() {
        let first = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let tests = vec![
            crystallized_at(first),
            crystallized_at(first + Duration::days(1)),
            crystallized_at(first + Duration::days(3)),
            crystallized_at(first + Duration::days(3)),
        ];
        // 4 crystallizations over March 1..=4
        let stats = compute_stats(&tests, first + Duration::days(3));
        assert_eq!(stats.crystallization_rate, 1.0);
    }

    #[test]
    fn test_deprecated_crystallizations_not_counted() {
        let mut test = crystallized_at(Utc::now());
        test.status = CrystallizationStatus::Deprecated;
        let stats = compute_stats(&[test], Utc::now());
        assert_eq!(stats.crystallized_today, 0);
        assert_eq!(stats.count(CrystallizationStatus::Deprecated), 1);
    }
}
