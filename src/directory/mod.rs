pub mod groups;
pub mod provision;
pub mod rpc;
pub mod session;

use async_trait::async_trait;
use reqwest::Certificate;
use serde_json::json;

use crate::config::DirectoryConfig;
use crate::models::group::OptionalGroup;
use crate::models::invite::Invite;
use crate::models::sponsor::Sponsor;
use rpc::{find_count, SubRequest};
use session::DirectorySession;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory login rejected with status {status}")]
    Auth { status: u16 },

    #[error("directory rpc error: {message}")]
    Rpc { message: String },

    #[error("directory transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("directory returned status {status}")]
    Status { status: u16 },

    #[error("malformed directory response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("directory configuration: {0}")]
    Config(String),

    #[error("unexpected directory data: {0}")]
    InvalidRecord(String),
}

/// The identity directory as seen by invite and activation flows.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Whether an account already uses `email`.
    async fn email_exists(&self, email: &str) -> Result<bool, DirectoryError>;

    /// The subset of `names` not taken by any account, in input order.
    async fn available_login_names(&self, names: &[String]) -> Result<Vec<String>, DirectoryError>;

    /// Optional groups the sponsor may put an invitee in.
    async fn grantable_groups(
        &self,
        sponsor: &Sponsor,
        catalog: &[OptionalGroup],
    ) -> Result<Vec<OptionalGroup>, DirectoryError>;

    /// Creates the account for `invite` and returns its initial password.
    async fn create_user(&self, invite: &Invite, login_name: &str)
        -> Result<String, DirectoryError>;
}

/// FreeIPA / Red Hat IdM over its session JSON-RPC API.
///
/// Every operation logs in on a fresh session; nothing is shared between calls.
pub struct IdmDirectory {
    config: DirectoryConfig,
    ca_cert: Option<Certificate>,
}

impl IdmDirectory {
    pub fn new(config: DirectoryConfig) -> Result<Self, DirectoryError> {
        let ca_cert = match &config.ca_cert_path {
            Some(path) => {
                let pem = std::fs::read(path).map_err(|e| {
                    DirectoryError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                Some(Certificate::from_pem(&pem)?)
            }
            None => None,
        };

        Ok(Self { config, ca_cert })
    }

    async fn session(&self) -> Result<DirectorySession, DirectoryError> {
        let session = DirectorySession::new(
            &self.config.host,
            self.ca_cert.as_ref(),
            self.config.timeout,
        )?;
        session
            .login(&self.config.username, &self.config.password)
            .await?;
        Ok(session)
    }
}

#[async_trait]
impl Directory for IdmDirectory {
    async fn email_exists(&self, email: &str) -> Result<bool, DirectoryError> {
        let session = self.session().await?;
        let result = session
            .call(
                "user_find",
                json!([]),
                json!({ "all": true, "sizelimit": 1, "mail": [email] }),
            )
            .await?;

        let count = find_count(&result)
            .ok_or_else(|| DirectoryError::InvalidRecord("user_find without count".to_string()))?;
        Ok(count != 0)
    }

    async fn available_login_names(&self, names: &[String]) -> Result<Vec<String>, DirectoryError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let session = self.session().await?;
        let requests: Vec<SubRequest> = names
            .iter()
            .map(|name| {
                SubRequest::new(
                    "user_find",
                    json!([]),
                    json!({ "all": true, "sizelimit": 1, "pkey_only": true, "uid": name }),
                )
            })
            .collect();

        let batch = session.batch_call(&requests).await?;
        let mut available = Vec::new();
        for (name, outcome) in names.iter().zip(batch.results) {
            let item = outcome.map_err(|message| DirectoryError::Rpc {
                message: format!("user_find {name}: {message}"),
            })?;
            let count = find_count(&item).ok_or_else(|| {
                DirectoryError::InvalidRecord(format!("user_find {name} without count"))
            })?;
            if count == 0 {
                available.push(name.clone());
            }
        }
        Ok(available)
    }

    async fn grantable_groups(
        &self,
        sponsor: &Sponsor,
        catalog: &[OptionalGroup],
    ) -> Result<Vec<OptionalGroup>, DirectoryError> {
        if !catalog.iter().any(|g| g.member_manager) {
            // Nothing to ask the directory; skip the login.
            return Ok(groups::membership_grants(sponsor, catalog)
                .into_iter()
                .cloned()
                .collect());
        }

        let session = self.session().await?;
        groups::grantable_groups(&session, sponsor, catalog).await
    }

    async fn create_user(
        &self,
        invite: &Invite,
        login_name: &str,
    ) -> Result<String, DirectoryError> {
        let session = self.session().await?;
        provision::provision(&session, &self.config, invite, login_name).await
    }
}
