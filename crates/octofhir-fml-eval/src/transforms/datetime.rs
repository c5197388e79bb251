//! dateOp

use crate::engine::{Execution, Frame, Scope};
use crate::error::{EvalResult, TransformError};
use crate::value::Item;
use chrono::{DateTime, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime};
use octofhir_fml_ast::Parameter;
use octofhir_fml_types::PrimitiveValue;

/// A parsed temporal value, remembering how it was written
#[derive(Debug, Clone, Copy, PartialEq)]
enum Temporal {
    Date(NaiveDate),
    /// Local date-time and the offset it was written with, if any
    DateTime(NaiveDateTime, Option<FixedOffset>),
}

impl Temporal {
    fn parse(text: &str) -> Option<Self> {
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return Some(Self::Date(date));
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(Self::DateTime(dt.naive_local(), Some(*dt.offset())));
        }
        NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|dt| Self::DateTime(dt, None))
    }

    fn date(&self) -> NaiveDate {
        match self {
            Self::Date(date) => *date,
            Self::DateTime(dt, _) => dt.date(),
        }
    }

    fn shift(self, amount: i64, unit: &str) -> Option<Self> {
        let months = |n: i64| Months::new(n.unsigned_abs() as u32);
        let by_months = |date: NaiveDateTime, n: i64| {
            if n >= 0 {
                date.checked_add_months(months(n))
            } else {
                date.checked_sub_months(months(n))
            }
        };
        let by_duration = |date: NaiveDateTime, d: Duration| date.checked_add_signed(d);
        let apply = |dt: NaiveDateTime| match unit.trim_end_matches('s') {
            "year" => by_months(dt, amount.checked_mul(12)?),
            "month" => by_months(dt, amount),
            "week" => by_duration(dt, Duration::try_weeks(amount)?),
            "day" => by_duration(dt, Duration::try_days(amount)?),
            "hour" => by_duration(dt, Duration::try_hours(amount)?),
            "minute" => by_duration(dt, Duration::try_minutes(amount)?),
            "second" => by_duration(dt, Duration::try_seconds(amount)?),
            _ => None,
        };
        match self {
            Self::Date(date) => {
                let shifted = apply(date.and_time(NaiveTime::MIN))?;
                Some(Self::Date(shifted.date()))
            }
            Self::DateTime(dt, offset) => Some(Self::DateTime(apply(dt)?, offset)),
        }
    }

    fn to_value(self) -> PrimitiveValue {
        match self {
            Self::Date(date) => PrimitiveValue::Date(date.format("%Y-%m-%d").to_string()),
            Self::DateTime(dt, None) => PrimitiveValue::DateTime(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            Self::DateTime(dt, Some(offset)) => match dt.and_local_timezone(offset).single() {
                Some(zoned) => PrimitiveValue::DateTime(zoned.to_rfc3339()),
                None => PrimitiveValue::DateTime(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            },
        }
    }
}

/// Parse `text` as a `date`, `dateTime` or `time` value
pub(super) fn parse_temporal(type_name: &str, text: &str) -> Option<PrimitiveValue> {
    match type_name {
        "date" => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .map(|_| PrimitiveValue::Date(text.to_string())),
        "time" => NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
            .ok()
            .map(|_| PrimitiveValue::Time(text.to_string())),
        _ => match Temporal::parse(text)? {
            Temporal::DateTime(..) => Some(PrimitiveValue::DateTime(text.to_string())),
            Temporal::Date(_) => None,
        },
    }
}

impl Execution<'_, '_> {
    /// `dateOp(value, operation, argument)`
    ///
    /// Operations: `date` and `time` extract a part of a date-time;
    /// `add` and `subtract` shift by `"<n> <unit>"`.
    pub(super) fn date_op(
        &self,
        frame: Frame<'_>,
        scope: &Scope,
        source: &Parameter,
        operation: &Parameter,
        argument: Option<&Parameter>,
    ) -> EvalResult<Option<Item>> {
        let Some(text) = self.parameter_text(frame, scope, source)? else {
            return Ok(None);
        };
        let operation = self.required_text(frame, scope, operation, "dateOp")?;
        let temporal = Temporal::parse(&text).ok_or_else(|| {
            TransformError::invalid_argument("dateOp", format!("'{text}' is not a date or date-time"))
        })?;
        let value = match operation.as_str() {
            "date" => PrimitiveValue::Date(temporal.date().format("%Y-%m-%d").to_string()),
            "time" => match temporal {
                Temporal::DateTime(dt, _) => PrimitiveValue::Time(dt.time().format("%H:%M:%S").to_string()),
                Temporal::Date(_) => return Ok(None),
            },
            "add" | "subtract" => {
                let argument = match argument {
                    Some(parameter) => self.required_text(frame, scope, parameter, "dateOp")?,
                    None => {
                        return Err(TransformError::invalid_argument(
                            "dateOp",
                            format!("{operation} needs an amount such as '3 days'"),
                        ));
                    }
                };
                let (amount, unit) = parse_amount(&argument).ok_or_else(|| {
                    TransformError::invalid_argument("dateOp", format!("'{argument}' is not an amount"))
                })?;
                let amount = if operation == "subtract" { -amount } else { amount };
                temporal
                    .shift(amount, unit)
                    .ok_or_else(|| {
                        TransformError::invalid_argument("dateOp", format!("cannot shift by '{argument}'"))
                    })?
                    .to_value()
            }
            other => {
                return Err(TransformError::invalid_argument(
                    "dateOp",
                    format!("unknown operation {other}"),
                ));
            }
        };
        Ok(Some(Item::primitive(value)))
    }
}

/// `"3 days"` as `(3, "days")`
fn parse_amount(text: &str) -> Option<(i64, &str)> {
    let (amount, unit) = text.trim().split_once(char::is_whitespace)?;
    Some((amount.parse().ok()?, unit.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2024-01-31", 1, "month", "2024-02-29")]
    #[case("2024-01-31", -1, "days", "2024-01-30")]
    #[case("2023-03-01", 1, "year", "2024-03-01")]
    fn test_shift_dates(#[case] start: &str, #[case] amount: i64, #[case] unit: &str, #[case] expected: &str) {
        let shifted = Temporal::parse(start).unwrap().shift(amount, unit).unwrap();
        assert_eq!(shifted.to_value(), PrimitiveValue::Date(expected.into()));
    }

    #[test]
    fn test_shift_keeps_offset() {
        let shifted = Temporal::parse("2024-05-01T10:00:00+02:00")
            .unwrap()
            .shift(3, "hours")
            .unwrap();
        assert_eq!(shifted.to_value(), PrimitiveValue::DateTime("2024-05-01T13:00:00+02:00".into()));
    }

    #[test]
    fn test_parse_temporal() {
        assert_eq!(parse_temporal("date", "2024-02-30"), None);
        assert_eq!(
            parse_temporal("dateTime", "2024-02-03T04:05:06Z"),
            Some(PrimitiveValue::DateTime("2024-02-03T04:05:06Z".into()))
        );
        assert_eq!(parse_amount("2 weeks"), Some((2, "weeks")));
    }
}
