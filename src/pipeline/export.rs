//! Record export: flatten the template and serialise it as CSV.
//!
//! Every `(section, key)` slot becomes one record, populated or not. Records
//! are ordered by key with a stable sort, so two sections sharing a key keep
//! their section order. That key order is the canonical output order.

use crate::error::FormScanError;
use crate::schema::SectionTemplate;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Column names of the record file, in order.
pub const HEADER: [&str; 3] = ["Section", "Key", "Value"];

/// One row of the record file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub section: String,
    pub key: String,
    pub value: Option<String>,
}

/// Flatten `template` into key-sorted records.
pub fn export(template: &SectionTemplate) -> Vec<ExportRecord> {
    let mut records: Vec<ExportRecord> = template
        .sections()
        .iter()
        .flat_map(|section| {
            section.fields().iter().map(move |slot| ExportRecord {
                section: section.name.clone(),
                key: slot.key.clone(),
                value: slot.value.clone(),
            })
        })
        .collect();
    // `sort_by` is stable: equal keys stay in flatten order.
    records.sort_by(|a, b| a.key.cmp(&b.key));
    records
}

/// Write records as CSV (header row first) to any writer.
///
/// Unset values are written as empty fields; embedded commas, quotes and
/// newlines are quoted.
pub fn write_csv<W: Write>(records: &[ExportRecord], writer: W) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(HEADER)?;
    for record in records {
        csv_writer.write_record([
            record.section.as_str(),
            record.key.as_str(),
            record.value.as_deref().unwrap_or(""),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Render records to an in-memory UTF-8 CSV document.
pub fn to_csv_bytes(records: &[ExportRecord]) -> Result<Vec<u8>, FormScanError> {
    let mut buf = Vec::new();
    write_csv(records, &mut buf)
        .map_err(|e| FormScanError::Internal(format!("CSV serialisation failed: {e}")))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SectionSchema;

    #[test]
    fn rows_sorted_by_key_regardless_of_schema_order() {
        static SCHEMA: [SectionSchema; 1] = [SectionSchema {
            name: "Personal Details",
            fields: &["Last Name:", "First Name:"],
        }];
        let mut t = SectionTemplate::new(&SCHEMA).expect("valid schema");
        t.set_value("Personal Details", "Last Name:", "Doe");
        t.set_value("Personal Details", "First Name:", "Alice");

        let keys: Vec<_> = export(&t).into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec!["First Name:", "Last Name:"]);
    }

    #[test]
    fn unpopulated_slots_are_exported() {
        let records = export(&SectionTemplate::loan_application());
        assert_eq!(records.len(), 12);
        assert!(records.iter().all(|r| r.value.is_none()));
        assert_eq!(records[0].key, "Date of Birth:");
        assert_eq!(records[11].key, "Start Date:");
    }

    #[test]
    fn equal_keys_keep_section_order() {
        static SCHEMA: [SectionSchema; 2] = [
            SectionSchema { name: "Zeta", fields: &["Name:"] },
            SectionSchema { name: "Alpha", fields: &["Name:", "Age:"] },
        ];
        let t = SectionTemplate::new(&SCHEMA).expect("valid schema");
        let rows: Vec<_> = export(&t)
            .into_iter()
            .map(|r| (r.section, r.key))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("Alpha".to_string(), "Age:".to_string()),
                ("Zeta".to_string(), "Name:".to_string()),
                ("Alpha".to_string(), "Name:".to_string()),
            ]
        );
    }

    #[test]
    fn csv_has_header_and_quotes_delimiters() {
        let records = vec![
            ExportRecord {
                section: "Loan Details".into(),
                key: "Loan Amount:".into(),
                value: Some("$10,000".into()),
            },
            ExportRecord {
                section: "Loan Details".into(),
                key: "Monthly Payment:".into(),
                value: None,
            },
        ];
        let text = String::from_utf8(to_csv_bytes(&records).expect("csv")).expect("utf-8");
        assert_eq!(
            text,
            "Section,Key,Value\n\
             Loan Details,Loan Amount:,\"$10,000\"\n\
             Loan Details,Monthly Payment:,\n"
        );
    }

    #[test]
    fn empty_record_set_still_has_header() {
        let text = String::from_utf8(to_csv_bytes(&[]).expect("csv")).expect("utf-8");
        assert_eq!(text, "Section,Key,Value\n");
    }
}
