use serde::Serialize;

/// The authenticated user creating or managing invites.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sponsor {
    /// Directory login of the sponsor (the OIDC `preferred_username`).
    pub identity: String,
    pub groups: Vec<String>,
}

impl Sponsor {
    pub fn is_member_of(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}
