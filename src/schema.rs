//! Section schema and the per-section field template.
//!
//! The schema is code-defined and fixed: each section owns an ordered list of
//! field keys (label text exactly as printed on the form, trailing colon
//! included). A [`SectionTemplate`] is built from a schema once, has its values
//! filled in by [`crate::pipeline::populate`], and is read by the exporter.
//! Keys are never added or removed after construction, only values change.

use crate::error::FormScanError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Title and main-marker payload of the built-in form.
pub const FORM_TITLE: &str = "Operating Loan Application";

/// Static description of one section: its name and its field keys in print order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSchema {
    pub name: &'static str,
    pub fields: &'static [&'static str],
}

/// The built-in loan application schema.
pub static LOAN_APPLICATION: [SectionSchema; 3] = [
    SectionSchema {
        name: "Personal Details",
        fields: &[
            "First Name:",
            "Last Name:",
            "Date of Birth:",
            "Social Security Number:",
        ],
    },
    SectionSchema {
        name: "Employment History",
        fields: &["Employer Name:", "Job Title:", "Start Date:", "End Date:"],
    },
    SectionSchema {
        name: "Loan Details",
        fields: &[
            "Loan Amount:",
            "Interest Rate:",
            "Repayment Term:",
            "Monthly Payment:",
        ],
    },
];

/// A decoded marker payload, classified against a template.
///
/// Payload equality is an exact string match. Sections of a caller-supplied
/// template that are not built in are [`SectionId::Custom`]; payloads the
/// template does not know are surfaced as [`SectionId::Unknown`] so the
/// caller can report them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionId {
    PersonalDetails,
    EmploymentHistory,
    LoanDetails,
    Custom(String),
    Unknown(String),
}

impl SectionId {
    pub const KNOWN: [SectionId; 3] = [
        SectionId::PersonalDetails,
        SectionId::EmploymentHistory,
        SectionId::LoanDetails,
    ];

    /// Classify against the built-in loan application.
    pub fn from_payload(payload: &str) -> Self {
        match payload {
            "Personal Details" => SectionId::PersonalDetails,
            "Employment History" => SectionId::EmploymentHistory,
            "Loan Details" => SectionId::LoanDetails,
            other => SectionId::Unknown(other.to_string()),
        }
    }

    /// Section name as it appears in the template and on the marker.
    pub fn name(&self) -> &str {
        match self {
            SectionId::PersonalDetails => LOAN_APPLICATION[0].name,
            SectionId::EmploymentHistory => LOAN_APPLICATION[1].name,
            SectionId::LoanDetails => LOAN_APPLICATION[2].name,
            SectionId::Custom(name) | SectionId::Unknown(name) => name,
        }
    }

    pub fn schema(&self) -> Option<&'static SectionSchema> {
        match self {
            SectionId::PersonalDetails => Some(&LOAN_APPLICATION[0]),
            SectionId::EmploymentHistory => Some(&LOAN_APPLICATION[1]),
            SectionId::LoanDetails => Some(&LOAN_APPLICATION[2]),
            SectionId::Custom(_) | SectionId::Unknown(_) => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, SectionId::Unknown(_))
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One field slot: a fixed key and its extracted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSlot {
    pub key: String,
    pub value: Option<String>,
}

/// The slots of one section, in schema order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionFields {
    pub name: String,
    fields: Vec<FieldSlot>,
}

impl SectionFields {
    pub fn fields(&self) -> &[FieldSlot] {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&FieldSlot> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of slots holding a value.
    pub fn filled(&self) -> usize {
        self.fields.iter().filter(|f| f.value.is_some()).count()
    }
}

/// Ordered sections, each mapping fixed field keys to nullable values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionTemplate {
    sections: Vec<SectionFields>,
}

impl SectionTemplate {
    /// Build an empty template from a schema.
    ///
    /// Rejects repeated section names, repeated keys within a section, and
    /// empty keys. Two sections may share a key.
    pub fn new(schema: &[SectionSchema]) -> Result<Self, FormScanError> {
        let mut names = HashSet::new();
        for section in schema {
            if !names.insert(section.name) {
                return Err(FormScanError::InvalidSchema(format!(
                    "section {:?} is defined twice",
                    section.name
                )));
            }
            let mut keys = HashSet::new();
            for key in section.fields {
                if key.is_empty() {
                    return Err(FormScanError::InvalidSchema(format!(
                        "section {:?} has an empty field key",
                        section.name
                    )));
                }
                if !keys.insert(*key) {
                    return Err(FormScanError::InvalidSchema(format!(
                        "section {:?} repeats field key {:?}",
                        section.name, key
                    )));
                }
            }
        }
        Ok(Self::from_schema(schema))
    }

    /// Empty template for the built-in loan application.
    pub fn loan_application() -> Self {
        Self::from_schema(&LOAN_APPLICATION)
    }

    fn from_schema(schema: &[SectionSchema]) -> Self {
        let sections = schema
            .iter()
            .map(|s| SectionFields {
                name: s.name.to_string(),
                fields: s
                    .fields
                    .iter()
                    .map(|k| FieldSlot {
                        key: (*k).to_string(),
                        value: None,
                    })
                    .collect(),
            })
            .collect();
        Self { sections }
    }

    pub fn sections(&self) -> &[SectionFields] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Option<&SectionFields> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn contains_section(&self, name: &str) -> bool {
        self.section(name).is_some()
    }

    /// Classify a marker payload against this template's sections.
    ///
    /// Built-in sections keep their variant only while the template contains
    /// them; other template sections come back as [`SectionId::Custom`].
    pub fn section_id(&self, payload: &str) -> SectionId {
        if !self.contains_section(payload) {
            return SectionId::Unknown(payload.to_string());
        }
        match SectionId::from_payload(payload) {
            SectionId::Unknown(name) => SectionId::Custom(name),
            id => id,
        }
    }

    /// Current value of `section`/`key`, if the slot exists and is set.
    pub fn value(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)?.get(key)?.value.as_deref()
    }

    /// Replace the value of an existing slot.
    ///
    /// Returns `false` without touching the template when the section or the
    /// key is not part of the schema.
    pub fn set_value(&mut self, section: &str, key: &str, value: impl Into<String>) -> bool {
        let Some(slot) = self
            .sections
            .iter_mut()
            .find(|s| s.name == section)
            .and_then(|s| s.fields.iter_mut().find(|f| f.key == key))
        else {
            return false;
        };
        slot.value = Some(value.into());
        true
    }

    /// Total number of field slots across all sections.
    pub fn field_count(&self) -> usize {
        self.sections.iter().map(|s| s.fields.len()).sum()
    }
}

impl Default for SectionTemplate {
    fn default() -> Self {
        Self::loan_application()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loan_application_has_three_sections_of_four() {
        let t = SectionTemplate::loan_application();
        assert_eq!(t.sections().len(), 3);
        assert_eq!(t.field_count(), 12);
        assert!(t.sections().iter().all(|s| s.filled() == 0));
        assert_eq!(t.sections()[1].name, "Employment History");
    }

    #[test]
    fn set_value_never_adds_keys() {
        let mut t = SectionTemplate::loan_application();
        assert!(!t.set_value("Personal Details", "Employer Name:", "Acme"));
        assert!(!t.set_value("Unknown", "First Name:", "Alice"));
        assert_eq!(t.field_count(), 12);
        assert!(t.set_value("Personal Details", "First Name:", "Alice"));
        assert_eq!(t.value("Personal Details", "First Name:"), Some("Alice"));
    }

    #[test]
    fn schema_rejects_duplicates() {
        static DUP_SECTION: [SectionSchema; 2] = [
            SectionSchema { name: "A", fields: &["x:"] },
            SectionSchema { name: "A", fields: &["y:"] },
        ];
        static DUP_KEY: [SectionSchema; 1] = [SectionSchema {
            name: "A",
            fields: &["x:", "x:"],
        }];
        assert!(matches!(
            SectionTemplate::new(&DUP_SECTION),
            Err(FormScanError::InvalidSchema(_))
        ));
        assert!(matches!(
            SectionTemplate::new(&DUP_KEY),
            Err(FormScanError::InvalidSchema(_))
        ));
    }

    #[test]
    fn shared_keys_across_sections_are_allowed() {
        static SHARED: [SectionSchema; 2] = [
            SectionSchema { name: "Applicant", fields: &["Name:"] },
            SectionSchema { name: "Co-applicant", fields: &["Name:"] },
        ];
        let t = SectionTemplate::new(&SHARED).expect("valid schema");
        assert_eq!(t.field_count(), 2);
    }

    #[test]
    fn section_ids_classify_payloads_exactly() {
        assert_eq!(
            SectionId::from_payload("Loan Details"),
            SectionId::LoanDetails
        );
        assert_eq!(
            SectionId::from_payload("loan details"),
            SectionId::Unknown("loan details".into())
        );
        for id in SectionId::KNOWN {
            assert_eq!(SectionId::from_payload(id.name()), id);
            assert!(id.schema().is_some());
        }
    }

    #[test]
    fn template_sections_are_never_unknown() {
        static SCHEMA: [SectionSchema; 2] = [
            SectionSchema {
                name: "Vehicle",
                fields: &["Plate:"],
            },
            SectionSchema {
                name: "Loan Details",
                fields: &["Loan Amount:"],
            },
        ];
        let template = SectionTemplate::new(&SCHEMA).expect("schema");
        assert_eq!(
            template.section_id("Vehicle"),
            SectionId::Custom("Vehicle".into())
        );
        assert!(template.section_id("Vehicle").is_known());
        assert_eq!(template.section_id("Loan Details"), SectionId::LoanDetails);
        assert_eq!(
            template.section_id("Personal Details"),
            SectionId::Unknown("Personal Details".into())
        );
    }
}
