//! Portal users as seen by the messaging core.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserType {
    Doctor,
    #[serde(alias = "Medical Student")]
    MedicalStudent,
    Recruiter,
    #[serde(alias = "Educational Institute")]
    EducationalInstitute,
}

/// Values that mark a name field as "not really filled in".
const PLACEHOLDER_NAMES: &[&str] = &["n/a", "na", "null", "undefined", "unknown", "-"];

/// Whether `value` is empty or one of the placeholder sentinels.
pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || PLACEHOLDER_NAMES
            .iter()
            .any(|sentinel| trimmed.eq_ignore_ascii_case(sentinel))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, alias = "name")]
    pub display_name: String,
    pub user_type: UserType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, user_type: UserType) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            user_type,
            organization_name: None,
            photo_url: None,
        }
    }

    pub fn with_organization(mut self, organization_name: impl Into<String>) -> Self {
        self.organization_name = Some(organization_name.into());
        self
    }

    /// Name shown in listings, or `None` if the user should not be listed at all.
    ///
    /// Recruiters are listed only under a filled-in organization name.
    pub fn resolve_display_name(&self) -> Option<&str> {
        let name = match self.user_type {
            UserType::Recruiter => self.organization_name.as_deref()?,
            _ => self.display_name.as_str(),
        };

        if is_placeholder(name) {
            None
        } else {
            Some(name.trim())
        }
    }
}
