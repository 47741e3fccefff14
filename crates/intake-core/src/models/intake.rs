//! Intake record (questionnaire submission) models.

use serde::{Deserialize, Serialize};

/// A submitted intake questionnaire, locally authoritative.
///
/// May exist without a linked order and vice versa; linkage is best-effort by
/// shared key or subject identity number, not a foreign key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntakeRecord {
    /// Local auto-increment id; 0 until inserted
    pub id: i64,
    /// Back-reference to an order via the shared key, when known
    pub shared_key: Option<String>,
    pub subject_id: String,
    pub first_name: String,
    pub last_name: String,
    pub employer_code: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub sex: Option<String>,
    pub age: Option<i64>,
    // Health flags
    pub diabetes: bool,
    pub hypertension: bool,
    pub hearing_loss: bool,
    pub vision_impairment: bool,
    // Family history flags
    pub family_diabetes: bool,
    pub family_hypertension: bool,
    pub family_cancer: bool,
    pub observations: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl IntakeRecord {
    /// Create a new record with required fields.
    pub fn new(subject_id: String, first_name: String, last_name: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: 0,
            shared_key: None,
            subject_id,
            first_name,
            last_name,
            employer_code: None,
            phone: None,
            email: None,
            sex: None,
            age: None,
            diabetes: false,
            hypertension: false,
            hearing_loss: false,
            vision_impairment: false,
            family_diabetes: false,
            family_hypertension: false,
            family_cancer: false,
            observations: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Look up a health flag by its configured name. Unknown names yield
    /// `None` so a misspelled notification rule cannot silently match.
    pub fn flag(&self, name: &str) -> Option<bool> {
        match name {
            "diabetes" => Some(self.diabetes),
            "hypertension" => Some(self.hypertension),
            "hearing_loss" => Some(self.hearing_loss),
            "vision_impairment" => Some(self.vision_impairment),
            "family_diabetes" => Some(self.family_diabetes),
            "family_hypertension" => Some(self.family_hypertension),
            "family_cancer" => Some(self.family_cancer),
            _ => None,
        }
    }
}

/// Partial update of an intake record. Same COALESCE merge rules as
/// [`crate::models::OrderPatch`]: absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakePatch {
    pub shared_key: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub employer_code: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub sex: Option<String>,
    pub age: Option<i64>,
    pub diabetes: Option<bool>,
    pub hypertension: Option<bool>,
    pub hearing_loss: Option<bool>,
    pub vision_impairment: Option<bool>,
    pub family_diabetes: Option<bool>,
    pub family_hypertension: Option<bool>,
    pub family_cancer: Option<bool>,
    pub observations: Option<String>,
}
