use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::{AssignmentRecord, GradeSummary, RawAssignment};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GradeError {
    /// Nothing counts towards the denominator, so there is no grade yet.
    #[error("course has no graded assignments")]
    NoGradedAssignments,
    #[error("malformed {field} `{value}`: {reason}")]
    MalformedInput {
        field: &'static str,
        value: String,
        reason: String,
    },
}

impl GradeError {
    pub fn kind(&self) -> &'static str {
        match self {
            GradeError::NoGradedAssignments => "no_graded_assignments",
            GradeError::MalformedInput { .. } => "malformed_input",
        }
    }

    fn malformed(field: &'static str, value: impl ToString, reason: &str) -> Self {
        GradeError::MalformedInput {
            field,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl TryFrom<&RawAssignment> for AssignmentRecord {
    type Error = GradeError;

    fn try_from(raw: &RawAssignment) -> Result<Self, Self::Error> {
        let possible = raw.points_possible.trim();
        if possible.is_empty() {
            return Err(GradeError::malformed(
                "points_possible",
                possible,
                "value is required",
            ));
        }
        let points_possible = parse_points("points_possible", possible)?;
        if points_possible.is_sign_negative() && !points_possible.is_zero() {
            return Err(GradeError::malformed(
                "points_possible",
                possible,
                "must not be negative",
            ));
        }

        let points_received = match raw.points_received.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(received) => Some(parse_points("points_received", received)?),
        };

        Ok(AssignmentRecord {
            points_possible,
            points_received,
        })
    }
}

/// Points are stored as NUMERIC(9, 2).
const POINTS_SCALE: u32 = 2;
const POINTS_LIMIT: i64 = 10_000_000;

fn parse_points(field: &'static str, value: &str) -> Result<Decimal, GradeError> {
    let points = Decimal::from_str(value)
        .map_err(|err| GradeError::malformed(field, value, &err.to_string()))?;

    if points.normalize().scale() > POINTS_SCALE {
        return Err(GradeError::malformed(field, value, "more than two decimal places"));
    }
    if points.abs() >= Decimal::from(POINTS_LIMIT) {
        return Err(GradeError::malformed(field, value, "must be below 10000000"));
    }

    Ok(points)
}

/// An assignment counts as graded only when it carries a positive score.
///
/// A recorded score of exactly zero is treated the same as "not yet
/// graded": it adds nothing to either total and bumps the ungraded count.
pub fn is_graded(record: &AssignmentRecord) -> bool {
    matches!(record.points_received, Some(received) if received > Decimal::ZERO)
}

pub fn aggregate(records: &[AssignmentRecord]) -> Result<GradeSummary, GradeError> {
    let (total_earned, total_possible, ungraded_count) = records.iter().try_fold(
        (Decimal::ZERO, Decimal::ZERO, 0usize),
        |(earned, possible, ungraded), record| {
            if record.points_possible.is_sign_negative() && !record.points_possible.is_zero() {
                return Err(GradeError::malformed(
                    "points_possible",
                    record.points_possible,
                    "must not be negative",
                ));
            }

            match record.points_received {
                Some(received) if is_graded(record) => {
                    let earned = earned
                        .checked_add(received)
                        .ok_or_else(|| GradeError::malformed("points_received", received, "sum overflows"))?;
                    let possible = possible.checked_add(record.points_possible).ok_or_else(|| {
                        GradeError::malformed("points_possible", record.points_possible, "sum overflows")
                    })?;
                    Ok((earned, possible, ungraded))
                }
                _ => Ok((earned, possible, ungraded + 1)),
            }
        },
    )?;

    if total_possible.is_zero() {
        return Err(GradeError::NoGradedAssignments);
    }

    let percent = total_earned
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|scaled| scaled.checked_div(total_possible))
        .ok_or_else(|| GradeError::malformed("points_received", total_earned, "grade overflows"))?;
    let final_grade = percent
        .to_f64()
        .ok_or_else(|| GradeError::malformed("points_received", percent, "grade is not representable"))?;

    tracing::debug!(
        assignments = records.len(),
        ungraded = ungraded_count,
        %total_earned,
        %total_possible,
        "aggregated course grade"
    );

    Ok(GradeSummary {
        final_grade,
        final_grade_string: format_percent(percent),
        ungraded_count,
        total_earned,
        total_possible,
    })
}

/// Parses every record first; one malformed record fails the whole call.
pub fn aggregate_raw(raw: &[RawAssignment]) -> Result<GradeSummary, GradeError> {
    let records = raw
        .iter()
        .map(AssignmentRecord::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    aggregate(&records)
}

/// Two decimal places, midpoints rounded away from zero.
pub fn format_percent(percent: Decimal) -> String {
    let rounded = percent.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.2}%", rounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    fn record(possible: &str, received: Option<&str>) -> AssignmentRecord {
        AssignmentRecord {
            points_possible: dec(possible),
            points_received: received.map(dec),
        }
    }

    fn raw(possible: &str, received: Option<&str>) -> RawAssignment {
        RawAssignment {
            points_possible: possible.to_string(),
            points_received: received.map(str::to_string),
        }
    }

    #[test]
    fn excludes_ungraded_points_from_denominator() {
        let summary = aggregate(&[record("10", Some("8")), record("20", None)]).unwrap();
        assert_eq!(summary.total_earned, dec("8"));
        assert_eq!(summary.total_possible, dec("10"));
        assert!((summary.final_grade - 80.0).abs() < 1e-9);
        assert_eq!(summary.final_grade_string, "80.00%");
        assert_eq!(summary.ungraded_count, 1);
    }

    #[test]
    fn all_graded_is_plain_percentage() {
        let records = [
            record("50", Some("45")),
            record("25.5", Some("20.25")),
            record("100", Some("88")),
        ];
        let summary = aggregate(&records).unwrap();
        let expected = 100.0 * (45.0 + 20.25 + 88.0) / (50.0 + 25.5 + 100.0);
        assert!((summary.final_grade - expected).abs() < 1e-9);
        assert_eq!(summary.ungraded_count, 0);
    }

    #[test]
    fn empty_course_has_no_grade() {
        assert_eq!(aggregate(&[]), Err(GradeError::NoGradedAssignments));
    }

    #[test]
    fn all_ungraded_has_no_grade() {
        let records = [record("10", None), record("30", None)];
        assert_eq!(aggregate(&records), Err(GradeError::NoGradedAssignments));
    }

    #[test]
    fn zero_score_counts_as_ungraded() {
        assert!(!is_graded(&record("10", Some("0"))));
        assert_eq!(
            aggregate(&[record("10", Some("0"))]),
            Err(GradeError::NoGradedAssignments)
        );

        let summary = aggregate(&[record("10", Some("0")), record("10", Some("5"))]).unwrap();
        assert_eq!(summary.ungraded_count, 1);
        assert_eq!(summary.final_grade_string, "50.00%");
    }

    #[test]
    fn graded_with_zero_possible_has_no_grade() {
        assert_eq!(
            aggregate(&[record("0", Some("3"))]),
            Err(GradeError::NoGradedAssignments)
        );
    }

    #[test]
    fn counts_partition_the_input() {
        let records = [
            record("10", Some("10")),
            record("10", None),
            record("10", Some("0")),
            record("10", Some("-2")),
            record("10", Some("7.5")),
        ];
        let graded = records.iter().filter(|r| is_graded(r)).count();
        let summary = aggregate(&records).unwrap();
        assert_eq!(graded, 2);
        assert_eq!(summary.ungraded_count + graded, records.len());
    }

    #[test]
    fn repeating_fraction_rounds_to_two_places() {
        let summary = aggregate(&[record("3", Some("1"))]).unwrap();
        assert_eq!(summary.final_grade_string, "33.33%");
        assert!((summary.final_grade - 100.0 / 3.0).abs() < 1e-9);

        let summary = aggregate(&[record("3", Some("2"))]).unwrap();
        assert_eq!(summary.final_grade_string, "66.67%");
    }

    #[test]
    fn midpoint_rounds_away_from_zero() {
        assert_eq!(format_percent(dec("0.125")), "0.13%");
        assert_eq!(format_percent(dec("12.345")), "12.35%");
        assert_eq!(format_percent(dec("12.344")), "12.34%");
        assert_eq!(format_percent(dec("100")), "100.00%");

        let summary = aggregate(&[record("800", Some("1"))]).unwrap();
        assert_eq!(summary.final_grade_string, "0.13%");
    }

    #[test]
    fn rejects_negative_possible_points() {
        let err = aggregate(&[record("-5", Some("3"))]).unwrap_err();
        assert_eq!(err.kind(), "malformed_input");
    }

    #[test]
    fn parses_raw_points() {
        let parsed = AssignmentRecord::try_from(&raw(" 12.50 ", Some(""))).unwrap();
        assert_eq!(parsed.points_possible, dec("12.5"));
        assert_eq!(parsed.points_received, None);

        let parsed = AssignmentRecord::try_from(&raw("10", Some("9"))).unwrap();
        assert_eq!(parsed.points_received, Some(dec("9")));
    }

    #[test]
    fn non_numeric_points_are_malformed() {
        let err = aggregate_raw(&[raw("10", Some("8")), raw("10", Some("eight"))]).unwrap_err();
        match err {
            GradeError::MalformedInput { field, value, .. } => {
                assert_eq!(field, "points_received");
                assert_eq!(value, "eight");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = AssignmentRecord::try_from(&raw("", None)).unwrap_err();
        assert_eq!(err.kind(), "malformed_input");

        let err = AssignmentRecord::try_from(&raw("ten", None)).unwrap_err();
        assert!(err.to_string().contains("points_possible"));
    }

    #[test]
    fn points_must_fit_storage_precision() {
        let err = AssignmentRecord::try_from(&raw("10000000", Some("5"))).unwrap_err();
        assert!(err.to_string().contains("points_possible"));
        assert_eq!(err.kind(), "malformed_input");

        let err = AssignmentRecord::try_from(&raw("10", Some("9.999"))).unwrap_err();
        assert!(err.to_string().contains("points_received"));

        let err = AssignmentRecord::try_from(&raw("10", Some("-10000000"))).unwrap_err();
        assert_eq!(err.kind(), "malformed_input");

        let parsed = AssignmentRecord::try_from(&raw("9999999.99", Some("10.500"))).unwrap();
        assert_eq!(parsed.points_possible, dec("9999999.99"));
        assert_eq!(parsed.points_received, Some(dec("10.5")));
    }

    #[test]
    fn overflowing_totals_are_malformed() {
        let err = aggregate(&[
            record("0", Some("1")),
            AssignmentRecord {
                points_possible: Decimal::MAX,
                points_received: Some(Decimal::MAX),
            },
            AssignmentRecord {
                points_possible: Decimal::MAX,
                points_received: Some(Decimal::MAX),
            },
        ])
        .unwrap_err();
        assert_eq!(err.kind(), "malformed_input");
        assert!(err.to_string().contains("sum overflows"));

        let err = aggregate(&[AssignmentRecord {
            points_possible: Decimal::MAX,
            points_received: Some(Decimal::MAX),
        }])
        .unwrap_err();
        assert!(err.to_string().contains("grade overflows"));
    }

    #[test]
    fn summary_serializes_response_fields() {
        let summary = aggregate(&[record("10", Some("8")), record("20", None)]).unwrap();
        let body = serde_json::to_value(&summary).unwrap();
        assert_eq!(body["final_grade"], 80.0);
        assert_eq!(body["final_grade_string"], "80.00%");
        assert_eq!(body["number_of_ungraded_assignments"], 1);
        assert_eq!(body["total_points_earned"], 8.0);
        assert_eq!(body["total_points_possible"], 10.0);
    }
}
