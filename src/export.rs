//! JSON export of extracted records.

use std::io::Write;

use serde_json::Value;

use crate::extract::Record;

/// Writes `records` as a pretty-printed JSON array of field maps.
///
/// # Errors
///
/// Returns a serialization or IO error from `serde_json`.
pub fn write_json<W: Write>(records: &[Record], writer: W) -> Result<(), serde_json::Error> {
    let rows = records
        .iter()
        .map(|record| record.to_fields().map(Value::Object))
        .collect::<Result<Vec<_>, _>>()?;
    serde_json::to_writer_pretty(writer, &rows)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::extract::{SAMPLE_XML, parse_document};

    fn sample_record() -> Record {
        let raw = parse_document(SAMPLE_XML).unwrap();
        let captured = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        Record::build_at(raw, captured).unwrap()
    }

    #[test]
    fn test_empty_export_is_empty_array() {
        let mut out = Vec::new();
        write_json(&[], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "[]");
    }

    #[test]
    fn test_export_matches_field_mapping() {
        let record = sample_record();
        let mut out = Vec::new();
        write_json(std::slice::from_ref(&record), &mut out).unwrap();

        let parsed: Vec<Value> = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0], Value::Object(record.to_fields().unwrap()));
        assert_eq!(parsed[0]["act_id"], "39826591-9877419-21034890");
        assert_eq!(parsed[0]["data_captura"], "2024-01-02T08:30:00");
    }
}
