use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::date::{self, DateError, DatePolicy, RangeViolation};
use crate::ledger::{round_cents, Transaction};

/// Number of columns in a delimited transaction line.
pub(crate) const DELIMITED_FIELDS: usize = 5;

/// Where a raw record came from inside its file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Location {
    /// 1-based line number in a delimited file (the header is line 1).
    Line(u64),
    /// 1-based position of the object in a structured file's array.
    Element(usize),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line(line) => write!(f, "line number {}", line),
            Self::Element(index) => write!(f, "element {}", index),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Shape {
    Delimited(Vec<String>),
    Object(Value),
}

/// One undecoded record, as yielded by the file readers.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RawRecord {
    pub location: Location,
    pub shape: Shape,
}

impl fmt::Display for RawRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.shape {
            Shape::Delimited(fields) => write!(f, "{}", fields.join(",")),
            Shape::Object(value) => write!(f, "{}", value),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub(crate) enum RecordError {
    #[error("{reason}")]
    MalformedRecord { reason: String },
    #[error("while parsing '{raw}': {source}")]
    Date { raw: String, source: DateError },
    #[error("'{0}' is not a number")]
    NonNumericAmount(String),
    #[error("'{0}' is too large to be an amount")]
    AmountOutOfRange(String),
}

impl RecordError {
    fn malformed(reason: impl Into<String>) -> RecordError {
        RecordError::MalformedRecord {
            reason: reason.into(),
        }
    }
}

/// A record that passed validation. `date_warnings` carries range violations
/// tolerated under [`DatePolicy::Lenient`].
#[derive(Debug, PartialEq)]
pub(crate) struct ParsedRecord {
    pub transaction: Transaction,
    pub date_warnings: Vec<RangeViolation>,
}

/// Field names of the structured-object format.
#[derive(Debug, Deserialize)]
struct ObjectRecord {
    #[serde(rename = "Date")]
    date: String,

    #[serde(rename = "FromAccount")]
    from_account: String,

    #[serde(rename = "ToAccount")]
    to_account: String,

    #[serde(rename = "Narrative")]
    narrative: String,

    /// A JSON number or a numeric string; anything else is not an amount.
    #[serde(rename = "Amount")]
    amount: Value,
}

fn amount_text(amount: Value) -> Result<String, RecordError> {
    match amount {
        Value::Number(number) => Ok(number.to_string()),
        Value::String(text) => Ok(text),
        other => Err(RecordError::NonNumericAmount(other.to_string())),
    }
}

/// Turns raw records from one file into transactions. Nothing is applied to
/// the ledger here.
pub(crate) struct RecordParser {
    today: NaiveDate,
    policy: DatePolicy,
    origin_file: String,
}

impl RecordParser {
    pub fn new(today: NaiveDate, policy: DatePolicy, origin_file: impl Into<String>) -> RecordParser {
        RecordParser {
            today,
            policy,
            origin_file: origin_file.into(),
        }
    }

    pub fn origin_file(&self) -> &str {
        &self.origin_file
    }

    pub fn parse(&self, raw: RawRecord) -> Result<ParsedRecord, RecordError> {
        match raw.shape {
            Shape::Delimited(fields) => {
                let [date, origin, to, narrative, amount]: [String; DELIMITED_FIELDS] =
                    fields.try_into().map_err(|fields: Vec<String>| {
                        RecordError::malformed(format!(
                            "the line contains {} columns instead of {}",
                            fields.len(),
                            DELIMITED_FIELDS
                        ))
                    })?;
                let date = date::validate(&date, self.today, self.policy)
                    .map_err(|source| RecordError::Date { raw: date, source })?;
                self.assemble(date, origin, to, narrative, &amount)
            }
            Shape::Object(value) => {
                let record: ObjectRecord = serde_json::from_value(value)
                    .map_err(|err| RecordError::malformed(format!("the object is not a transaction: {}", err)))?;
                let date = date::validate_calendar(&record.date, self.today, self.policy)
                    .map_err(|source| RecordError::Date {
                        raw: record.date,
                        source,
                    })?;
                let amount = amount_text(record.amount)?;
                self.assemble(date, record.from_account, record.to_account, record.narrative, &amount)
            }
        }
    }

    fn assemble(
        &self,
        date: date::ValidatedDate,
        origin: String,
        to: String,
        narrative: String,
        amount: &str,
    ) -> Result<ParsedRecord, RecordError> {
        let amount = parse_amount(amount)?;
        if origin.trim().is_empty() || to.trim().is_empty() {
            return Err(RecordError::malformed("a party name is empty"));
        }

        Ok(ParsedRecord {
            transaction: Transaction {
                date: date.date,
                origin,
                to,
                narrative,
                amount,
                origin_file: Some(self.origin_file.clone()),
            },
            date_warnings: date.warnings,
        })
    }
}

/// Parses a decimal amount, accepting scientific notation, rounded to cents.
pub(crate) fn parse_amount(raw: &str) -> Result<Decimal, RecordError> {
    let trimmed = raw.trim();
    if let Ok(amount) = Decimal::from_str(trimmed) {
        return Ok(round_cents(amount));
    }

    let non_numeric = || RecordError::NonNumericAmount(raw.to_string());
    let (mantissa, exponent) = trimmed
        .split_once(|c| c == 'e' || c == 'E')
        .ok_or_else(non_numeric)?;
    let mantissa = Decimal::from_str(mantissa).map_err(|_| non_numeric())?;
    let exponent: i64 = exponent.parse().map_err(|_| non_numeric())?;

    scale_by_power_of_ten(mantissa, exponent)
        .map(round_cents)
        .ok_or_else(|| RecordError::AmountOutOfRange(raw.to_string()))
}

/// `value * 10^exponent`, or `None` when it doesn't fit in a `Decimal`.
/// Values that shrink below half a cent come back as zero.
fn scale_by_power_of_ten(mut value: Decimal, exponent: i64) -> Option<Decimal> {
    let ten = Decimal::from(10);
    let half_cent = Decimal::new(5, 3);
    for _ in 0..exponent.unsigned_abs() {
        if exponent > 0 {
            if value.is_zero() {
                break;
            }
            value = value.checked_mul(ten)?;
        } else {
            if value.abs() < half_cent {
                return Some(Decimal::ZERO);
            }
            value /= ten;
        }
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parser() -> RecordParser {
        RecordParser::new(
            NaiveDate::from_ymd_opt(2021, 6, 20).unwrap(),
            DatePolicy::Strict,
            "transactions.csv",
        )
    }

    fn line(fields: &[&str]) -> RawRecord {
        RawRecord {
            location: Location::Line(2),
            shape: Shape::Delimited(fields.iter().map(|f| f.to_string()).collect()),
        }
    }

    fn object(value: Value) -> RawRecord {
        RawRecord {
            location: Location::Element(1),
            shape: Shape::Object(value),
        }
    }

    #[test]
    fn parses_delimited_line() {
        let parsed = parser()
            .parse(line(&["1/1/2014", "Jon A", "Sarah T", "Pokemon Training", "7.8"]))
            .unwrap();

        assert_eq!(
            parsed.transaction,
            Transaction {
                date: NaiveDate::from_ymd_opt(2014, 1, 1).unwrap(),
                origin: "Jon A".into(),
                to: "Sarah T".into(),
                narrative: "Pokemon Training".into(),
                amount: Decimal::new(78, 1),
                origin_file: Some("transactions.csv".into()),
            }
        );
        assert!(parsed.date_warnings.is_empty());
    }

    #[test]
    fn wrong_column_count() {
        let err = parser()
            .parse(line(&["1/1/2014", "Jon A", "Sarah T", "7.8"]))
            .unwrap_err();
        assert_eq!(
            err,
            RecordError::malformed("the line contains 4 columns instead of 5")
        );

        let err = parser()
            .parse(line(&["1/1/2014", "Jon A", "Sarah T", "Lunch", "with", "7.8"]))
            .unwrap_err();
        assert!(matches!(err, RecordError::MalformedRecord { .. }));
    }

    #[test]
    fn non_numeric_amount() {
        let err = parser()
            .parse(line(&["1/1/2014", "Jon A", "Sarah T", "Lunch", "seven"]))
            .unwrap_err();
        assert_eq!(err, RecordError::NonNumericAmount("seven".into()));
        assert_eq!(err.to_string(), "'seven' is not a number");
    }

    #[test]
    fn bad_date_is_reported_with_raw_value() {
        let err = parser()
            .parse(line(&["29/2/2021", "Jon A", "Sarah T", "Lunch", "1"]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "while parsing '29/2/2021': day number is not in the correct range"
        );
    }

    #[test]
    fn empty_party_name_is_malformed() {
        let err = parser()
            .parse(line(&["1/1/2014", "", "Sarah T", "Lunch", "1"]))
            .unwrap_err();
        assert!(matches!(err, RecordError::MalformedRecord { .. }));
    }

    #[test]
    fn amounts_are_rounded_to_cents() {
        assert_eq!(parse_amount("1.005").unwrap(), Decimal::new(101, 2));
        assert_eq!(parse_amount("-2.344").unwrap(), Decimal::new(-234, 2));
        assert_eq!(parse_amount(" 12 ").unwrap(), Decimal::new(12, 0));
        assert_eq!(parse_amount("1.5e2").unwrap(), Decimal::new(150, 0));
        assert!(parse_amount("").is_err());
        assert!(parse_amount("12abc").is_err());
    }

    #[test]
    fn scientific_amounts_beyond_decimal_precision() {
        assert_eq!(parse_amount("1e-300"), Ok(Decimal::ZERO));
        assert_eq!(parse_amount("-4.2E-30"), Ok(Decimal::ZERO));
        assert_eq!(parse_amount("6e-3"), Ok(Decimal::new(1, 2)));
        assert_eq!(parse_amount("1.2345678901234567890123456789e-1"), Ok(Decimal::new(12, 2)));
        assert_eq!(parse_amount("0e400"), Ok(Decimal::ZERO));
        assert_eq!(
            parse_amount("1e300"),
            Err(RecordError::AmountOutOfRange("1e300".into()))
        );
        assert_eq!(
            parse_amount("1e"),
            Err(RecordError::NonNumericAmount("1e".into()))
        );
        assert_eq!(
            parse_amount("e5"),
            Err(RecordError::NonNumericAmount("e5".into()))
        );
    }

    #[test]
    fn parses_object_with_numeric_amount() {
        let parsed = parser()
            .parse(object(json!({
                "Date": "2018-01-01T00:00:00",
                "FromAccount": "Frank LN",
                "ToAccount": "Jon A",
                "Narrative": "Cinema tickets",
                "Amount": 23.1
            })))
            .unwrap();

        assert_eq!(parsed.transaction.date, NaiveDate::from_ymd_opt(2018, 1, 1).unwrap());
        assert_eq!(parsed.transaction.origin, "Frank LN");
        assert_eq!(parsed.transaction.to, "Jon A");
        assert_eq!(parsed.transaction.amount, Decimal::new(231, 1));
    }

    #[test]
    fn parses_object_with_string_amount() {
        let parsed = parser()
            .parse(object(json!({
                "Date": "2018-01-01",
                "FromAccount": "Frank LN",
                "ToAccount": "Jon A",
                "Narrative": "Cinema tickets",
                "Amount": "4.50"
            })))
            .unwrap();
        assert_eq!(parsed.transaction.amount, Decimal::new(45, 1));
    }

    #[test]
    fn object_amount_that_is_not_a_number_or_string() {
        let amounts = [
            (json!(null), "null"),
            (json!(true), "true"),
            (json!({"value": 1}), r#"{"value":1}"#),
        ];
        for (amount, shown) in amounts {
            let err = parser()
                .parse(object(json!({
                    "Date": "2018-01-01",
                    "FromAccount": "Frank LN",
                    "ToAccount": "Jon A",
                    "Narrative": "Cinema tickets",
                    "Amount": amount
                })))
                .unwrap_err();
            assert_eq!(err, RecordError::NonNumericAmount(shown.into()));
        }
    }

    #[test]
    fn object_with_tiny_scientific_amount() {
        let parsed = parser()
            .parse(object(json!({
                "Date": "2018-01-01",
                "FromAccount": "Frank LN",
                "ToAccount": "Jon A",
                "Narrative": "Rounding dust",
                "Amount": 1e-300
            })))
            .unwrap();
        assert_eq!(parsed.transaction.amount, Decimal::ZERO);
    }

    #[test]
    fn object_missing_field_is_malformed() {
        let err = parser()
            .parse(object(json!({
                "Date": "2018-01-01",
                "FromAccount": "Frank LN",
                "Amount": 1
            })))
            .unwrap_err();
        assert!(matches!(err, RecordError::MalformedRecord { .. }));
    }

    #[test]
    fn object_unparseable_date() {
        let err = parser()
            .parse(object(json!({
                "Date": "not a date",
                "FromAccount": "Frank LN",
                "ToAccount": "Jon A",
                "Narrative": "Cinema tickets",
                "Amount": 1
            })))
            .unwrap_err();
        assert_eq!(
            err,
            RecordError::Date {
                raw: "not a date".into(),
                source: DateError::Malformed
            }
        );
    }

    #[test]
    fn lenient_policy_keeps_record_with_warnings() {
        let parser = RecordParser::new(
            NaiveDate::from_ymd_opt(2021, 6, 20).unwrap(),
            DatePolicy::Lenient,
            "transactions.csv",
        );
        let parsed = parser
            .parse(line(&["31/4/2015", "Jon A", "Sarah T", "Lunch", "1"]))
            .unwrap();
        assert_eq!(parsed.transaction.date, NaiveDate::from_ymd_opt(2015, 5, 1).unwrap());
        assert_eq!(parsed.date_warnings, vec![RangeViolation::Day]);
    }

    #[test]
    fn raw_record_display() {
        assert_eq!(line(&["a", "b"]).to_string(), "a,b");
        assert_eq!(Location::Line(4).to_string(), "line number 4");
        assert_eq!(Location::Element(2).to_string(), "element 2");
    }
}
