use crate::model::Amount;
use crate::report::ReportResult;
use chrono::{NaiveDateTime, NaiveTime, Timelike as _};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("Report total {total} does not match the breakdown sum {sum}")]
    InconsistentTotal { total: Amount, sum: Amount },

    #[error("Report count {count} does not match the breakdown count {sum}")]
    InconsistentCount { count: usize, sum: usize },
}

/// Presentation form of a report. Serializes as `{total, count, breakdown}`, in that order.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Response {
    pub total: Amount,
    pub count: usize,
    pub breakdown: Vec<BreakdownEntry>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BreakdownEntry {
    pub key: String,
    pub amount: Amount,
}

/// Map a [`ReportResult`] to a [`Response`] without recomputing anything.
pub fn assemble(result: &ReportResult) -> Result<Response, AssembleError> {
    let sum: Amount = result.breakdown().iter().map(|group| group.amount).sum();
    if sum != result.total() {
        return Err(AssembleError::InconsistentTotal {
            total: result.total(),
            sum,
        });
    }

    let sum: usize = result.breakdown().iter().map(|group| group.count).sum();
    if sum != result.count() {
        return Err(AssembleError::InconsistentCount {
            count: result.count(),
            sum,
        });
    }

    let breakdown = result
        .breakdown()
        .iter()
        .map(|group| BreakdownEntry {
            key: group.key.clone(),
            amount: group.amount,
        })
        .collect();

    Ok(Response {
        total: result.total(),
        count: result.count(),
        breakdown,
    })
}

impl Response {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Write the CSV header
        writeln!(f, r#""Key","Amount""#)?;

        for entry in &self.breakdown {
            writeln!(
                f,
                r#""{key}","{amount}""#,
                key = entry.key.replace('"', "\"\""),
                amount = entry.amount,
            )?;
        }

        writeln!(f, r#""Total","{total}""#, total = self.total)
    }
}

/// Report file name for a run started at `now`, e.g. `report_20240105_121000.json`.
pub fn default_report_path(now: NaiveDateTime) -> PathBuf {
    PathBuf::from(now.format("report_%Y%m%d_%H%M%S.json").to_string())
}

/// Salutation for the local time of day.
pub fn greeting(time: NaiveTime) -> &'static str {
    match time.hour() {
        5..=11 => "Good morning",
        12..=17 => "Good afternoon",
        18..=21 => "Good evening",
        _ => "Good night",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Currency;
    use crate::report::GroupTotal;
    use similar_asserts::assert_eq;

    fn amount(s: &str) -> Amount {
        s.parse().unwrap()
    }

    fn group(key: &str, value: &str, count: usize) -> GroupTotal {
        GroupTotal {
            key: key.to_string(),
            amount: amount(value),
            count,
        }
    }

    fn result() -> ReportResult {
        ReportResult::from_parts(
            Currency::USD,
            amount("140.50"),
            3,
            vec![group("food", "150", 2), group("fees", "-9.50", 1)],
        )
    }

    #[test]
    fn test_assemble_keeps_order() {
        let response = assemble(&result()).unwrap();

        assert_eq!(response.total, amount("140.50"));
        assert_eq!(response.count, 3);
        let keys: Vec<_> = response.breakdown.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, ["food", "fees"]);
    }

    #[test]
    fn test_json_field_order() {
        let response = assemble(&result()).unwrap();
        let json = serde_json::to_string(&response).unwrap();

        assert_eq!(
            json,
            r#"{"total":140.5,"count":3,"breakdown":[{"key":"food","amount":150.0},{"key":"fees","amount":-9.5}]}"#
        );
    }

    #[test]
    fn test_empty_report() {
        let empty = ReportResult::from_parts(Currency::USD, Amount::ZERO, 0, vec![]);
        let response = assemble(&empty).unwrap();
        let json: serde_json::Value = serde_json::from_str(&response.to_json_pretty().unwrap()).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"total": 0.0, "count": 0, "breakdown": []})
        );
    }

    #[test]
    fn test_malformed_result() {
        let bad_total = ReportResult::from_parts(
            Currency::USD,
            amount("1"),
            1,
            vec![group("food", "2", 1)],
        );
        assert!(matches!(
            assemble(&bad_total),
            Err(AssembleError::InconsistentTotal { .. })
        ));

        let bad_count = ReportResult::from_parts(
            Currency::USD,
            amount("2"),
            5,
            vec![group("food", "2", 1)],
        );
        assert!(matches!(
            assemble(&bad_count),
            Err(AssembleError::InconsistentCount { count: 5, sum: 1 })
        ));
    }

    #[test]
    fn test_display() {
        let response = assemble(&result()).unwrap();

        assert_eq!(
            response.to_string(),
            concat!(
                "\"Key\",\"Amount\"\n",
                "\"food\",\"150.00\"\n",
                "\"fees\",\"-9.50\"\n",
                "\"Total\",\"140.50\"\n",
            )
        );
    }

    #[test]
    fn test_default_report_path() {
        let now = NaiveDateTime::parse_from_str("2024-01-05 12:10:03", "%F %T").unwrap();
        assert_eq!(
            default_report_path(now),
            PathBuf::from("report_20240105_121003.json")
        );
    }

    #[test]
    fn test_greeting() {
        let at = |hour, min| NaiveTime::from_hms_opt(hour, min, 0).unwrap();

        assert_eq!(greeting(at(4, 59)), "Good night");
        assert_eq!(greeting(at(5, 0)), "Good morning");
        assert_eq!(greeting(at(11, 59)), "Good morning");
        assert_eq!(greeting(at(12, 0)), "Good afternoon");
        assert_eq!(greeting(at(17, 30)), "Good afternoon");
        assert_eq!(greeting(at(18, 0)), "Good evening");
        assert_eq!(greeting(at(21, 59)), "Good evening");
        assert_eq!(greeting(at(22, 0)), "Good night");
        assert_eq!(greeting(at(0, 0)), "Good night");
    }
}
