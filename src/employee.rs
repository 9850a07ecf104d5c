//! Employee records as the export pipeline sees them: read-only identity,
//! contact data and image references, plus the lifecycle status that decides
//! which workflow action is currently legal.

use serde::{Deserialize, Serialize};

/// The one role that gets field-staff card layouts.
pub const FIELD_ROLE: &str = "Field Officer";

/// Both historical spellings of the dual-card subtype.
pub const DUAL_SUBTYPE_ALIASES: [&str; 2] = ["Reprocessor", "Repossessor"];

/// Lifecycle status. Ordered: a status only ever moves forward.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Status {
    #[default]
    Rendered,
    Approved,
    #[serde(rename = "SentToPOC")]
    SentToPoc,
    Completed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Rendered => "Rendered",
            Status::Approved => "Approved",
            Status::SentToPoc => "SentToPOC",
            Status::Completed => "Completed",
        }
    }

    /// Forward, non-skipping transitions only.
    ///
    /// `Completed` is reachable from `Approved` (card handed over directly)
    /// as well as from `SentToPOC`.
    pub fn can_advance_to(&self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::Rendered, Status::Approved)
                | (Status::Approved, Status::SentToPoc)
                | (Status::Approved, Status::Completed)
                | (Status::SentToPoc, Status::Completed)
        )
    }
}

/// How the role/subtype pair maps onto card layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleClass {
    Standard,
    Field,
    FieldDual,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// One employee. Mutated by the intake form; never by the export pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub id: u64,
    /// Printed as a barcode on the front.
    pub id_number: String,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub last_name: String,
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub role_subtype: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub emergency: EmergencyContact,
    /// The original upload.
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub ai_photo_url: Option<String>,
    #[serde(default)]
    pub signature_url: Option<String>,
    #[serde(default)]
    pub status: Status,
}

impl EmployeeRecord {
    pub fn role_class(&self) -> RoleClass {
        if !self.position.trim().eq_ignore_ascii_case(FIELD_ROLE) {
            return RoleClass::Standard;
        }
        let dual = self.role_subtype.as_deref().is_some_and(|subtype| {
            DUAL_SUBTYPE_ALIASES
                .iter()
                .any(|alias| subtype.trim().eq_ignore_ascii_case(alias))
        });
        if dual {
            RoleClass::FieldDual
        } else {
            RoleClass::Field
        }
    }

    /// First line of the printed name: first name plus middle initial.
    pub fn name_line_one(&self) -> String {
        let first = self.first_name.trim();
        match non_blank(&self.middle_name).and_then(|m| m.chars().next()) {
            Some(initial) => format!("{first} {}.", initial.to_uppercase()),
            None => first.to_string(),
        }
    }

    /// Second line of the printed name: last name plus suffix.
    pub fn name_line_two(&self) -> String {
        let last = self.last_name.trim();
        match non_blank(&self.suffix) {
            Some(suffix) => format!("{last} {suffix}"),
            None => last.to_string(),
        }
    }

    pub fn full_name(&self) -> String {
        let one = self.name_line_one();
        let two = self.name_line_two();
        format!("{one} {two}").trim().to_string()
    }

    /// Photo for portrait fronts: the AI-generated one when present.
    pub fn preferred_photo(&self) -> Option<&str> {
        non_blank(&self.ai_photo_url).or_else(|| non_blank(&self.photo_url))
    }

    pub fn original_photo(&self) -> Option<&str> {
        non_blank(&self.photo_url)
    }
}

/// `Some` only for values that carry visible content.
pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
