use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::{debug, info};
use serde::Deserialize;

use crate::error::{EngineError, EngineResult};
use crate::models::VisitRecord;

pub const REQUIRED_COLUMNS: [&str; 11] = [
    "meetingDate",
    "Darkstore",
    "traderName",
    "traderId",
    "buyerName",
    "buyerid",
    "buyerPhone",
    "currentLatitude",
    "currentLongitude",
    "selfie",
    "verificationDoc",
];

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "meetingDate")]
    meeting_date: Option<String>,
    #[serde(rename = "Darkstore")]
    darkstore: Option<String>,
    #[serde(rename = "traderName")]
    trader_name: Option<String>,
    #[serde(rename = "traderId")]
    trader_id: Option<String>,
    #[serde(rename = "buyerName")]
    buyer_name: Option<String>,
    #[serde(rename = "buyerid")]
    buyer_id: Option<String>,
    #[serde(rename = "buyerPhone")]
    buyer_phone: Option<String>,
    #[serde(rename = "currentLatitude")]
    latitude: Option<String>,
    #[serde(rename = "currentLongitude")]
    longitude: Option<String>,
    selfie: Option<String>,
    #[serde(rename = "verificationDoc")]
    verification_doc: Option<String>,
    #[serde(default)]
    remarks: Option<String>,
}

impl From<CsvRow> for VisitRecord {
    fn from(row: CsvRow) -> Self {
        VisitRecord {
            buyer_id: clean_text(row.buyer_id),
            buyer_name: non_blank(row.buyer_name),
            buyer_phone: row.buyer_phone.as_deref().map(digits_only).unwrap_or_default(),
            trader_id: clean_text(row.trader_id),
            trader_name: clean_text(row.trader_name),
            site_name: clean_text(row.darkstore),
            visited_at: row.meeting_date.as_deref().and_then(parse_timestamp),
            latitude: row.latitude.as_deref().and_then(parse_coordinate),
            longitude: row.longitude.as_deref().and_then(parse_coordinate),
            selfie: row.selfie.as_deref().and_then(clean_image_ref),
            verification_doc: row.verification_doc.as_deref().and_then(clean_image_ref),
            remarks: non_blank(row.remarks),
        }
    }
}

fn clean_text(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Parses a coordinate, returning `None` for anything that is not a number.
pub fn parse_coordinate(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Strips bracket and quote artifacts from an image reference. Empty means absent.
pub fn clean_image_ref(value: &str) -> Option<String> {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '"' | '\''))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

pub fn check_headers(headers: &csv::StringRecord) -> EngineResult<()> {
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|column| !headers.iter().any(|header| header.trim() == **column))
        .map(|column| column.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(EngineError::Schema { missing })
    }
}

/// Reads visit records from CSV. Fails on missing columns; malformed values
/// inside a row are cleaned or left empty for the engine to judge.
pub fn parse_visits<R: Read>(input: R) -> EngineResult<Vec<VisitRecord>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(input);
    check_headers(reader.headers()?)?;

    let mut visits = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        visits.push(VisitRecord::from(row));
    }
    debug!("Parsed {} visit rows", visits.len());
    Ok(visits)
}

pub fn read_visits(path: &Path) -> EngineResult<Vec<VisitRecord>> {
    let file = std::fs::File::open(path)?;
    let visits = parse_visits(file)?;
    info!("Loaded {} visits from {}", visits.len(), path.display());
    Ok(visits)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "meetingDate,Darkstore,traderName,traderId,buyerName,buyerid,buyerPhone,currentLatitude,currentLongitude,selfie,verificationDoc,remarks";

    #[test]
    fn parses_and_cleans_rows() {
        let csv = format!(
            "{HEADER}\n2024-03-05 10:15:00, HSR Layout ,Asha,T1, Raj Traders ,B1,+91 98765-43210,12.9700,77.5900,\"[\"\"https://cdn.example/s.jpg\"\"]\",[],called back\n"
        );
        let visits = parse_visits(csv.as_bytes()).unwrap();
        assert_eq!(visits.len(), 1);
        let visit = &visits[0];
        assert_eq!(visit.site_name, "HSR Layout");
        assert_eq!(visit.buyer_name.as_deref(), Some("Raj Traders"));
        assert_eq!(visit.buyer_phone, "919876543210");
        assert_eq!(visit.latitude, Some(12.97));
        assert_eq!(visit.selfie.as_deref(), Some("https://cdn.example/s.jpg"));
        assert_eq!(visit.verification_doc, None);
        assert_eq!(visit.remarks.as_deref(), Some("called back"));
        assert!(visit.visited_at.is_some());
    }

    #[test]
    fn remarks_column_is_optional() {
        let header = HEADER.trim_end_matches(",remarks");
        let csv = format!("{header}\n2024-03-05,HSR,Asha,T1,Raj,B1,1,12.97,77.59,,\n");
        let visits = parse_visits(csv.as_bytes()).unwrap();
        assert_eq!(visits[0].remarks, None);
    }

    #[test]
    fn missing_columns_fail_with_schema_error() {
        let csv = "meetingDate,buyerid\n2024-03-05,B1\n";
        match parse_visits(csv.as_bytes()) {
            Err(EngineError::Schema { missing }) => {
                assert_eq!(missing.len(), 9);
                assert!(missing.contains(&"currentLatitude".to_string()));
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn unparsable_values_become_empty() {
        let csv = format!("{HEADER}\nnot a date,HSR,Asha,T1,,B1,nan,abc,77.59,,,\n");
        let visits = parse_visits(csv.as_bytes()).unwrap();
        let visit = &visits[0];
        assert_eq!(visit.visited_at, None);
        assert_eq!(visit.latitude, None);
        assert_eq!(visit.longitude, Some(77.59));
        assert_eq!(visit.buyer_name, None);
        assert_eq!(visit.buyer_phone, "");
    }

    #[test]
    fn timestamp_formats() {
        assert!(parse_timestamp("2024-03-05T10:15:00+05:30").is_some());
        assert!(parse_timestamp("2024-03-05T10:15:00").is_some());
        assert!(parse_timestamp("05/03/2024 10:15").is_some());
        let date_only = parse_timestamp("2024-03-05").unwrap();
        assert_eq!(date_only.to_string(), "2024-03-05 00:00:00");
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn image_refs_drop_artifacts() {
        assert_eq!(clean_image_ref("[]"), None);
        assert_eq!(clean_image_ref("''"), None);
        assert_eq!(clean_image_ref("[\"a.jpg\"]").as_deref(), Some("a.jpg"));
    }
}
