use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::countries;
use crate::error::AppError;
use crate::mailer::is_valid_email;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invite {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub state: String,
    pub country: String,
    pub affiliation: String,
    pub inviter: String,
    pub optional_groups: Vec<String>,
    pub login_names: Option<Vec<String>>,
    pub created_at: String,
}

impl Invite {
    /// Whether `login_name` is one of the candidates offered after OTP verification.
    pub fn offers_login_name(&self, login_name: &str) -> bool {
        self.login_names
            .as_ref()
            .is_some_and(|names| names.iter().any(|n| n == login_name))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateInvite {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub state: String,
    pub country: String,
    pub affiliation: String,
    #[serde(default)]
    pub optional_groups: Vec<String>,
}

impl CreateInvite {
    /// Trims every field, lower-cases the email and upper-cases the country code.
    /// Duplicate group keys are dropped, first occurrence wins.
    pub fn normalized(self) -> Self {
        let mut optional_groups: Vec<String> = Vec::with_capacity(self.optional_groups.len());
        for group in self.optional_groups {
            let group = group.trim().to_string();
            if !group.is_empty() && !optional_groups.contains(&group) {
                optional_groups.push(group);
            }
        }

        Self {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            state: self.state.trim().to_string(),
            country: self.country.trim().to_uppercase(),
            affiliation: self.affiliation.trim().to_string(),
            optional_groups,
        }
    }

    pub fn validate(&self, affiliations: &BTreeMap<String, String>) -> Result<(), AppError> {
        let incomplete = self.first_name.is_empty()
            || self.last_name.is_empty()
            || self.email.is_empty()
            || self.state.is_empty()
            || self.country.is_empty()
            || self.affiliation.is_empty();
        if incomplete
            || !is_valid_email(&self.email)
            || countries::find(&self.country).is_none()
        {
            return Err(AppError::BadRequest(
                "Please complete the form fully".to_string(),
            ));
        }

        if !affiliations.contains_key(&self.affiliation) {
            return Err(AppError::BadRequest("unknown affiliation".to_string()));
        }

        Ok(())
    }
}
