//! Invitee self-activation: email, one-time code, login name, account.
//!
//! ```text
//! Invited --request_otp--> OtpSent --verify_otp--> OtpVerified --finalize_account--> Provisioned
//!            ^      |
//!            +------+ resend, subject to the email cooldown
//! ```
//!
//! Only `OtpVerified` and `Provisioned` are carried by the sealed activation
//! cookie; earlier steps exist only as store rows.

pub mod flash;
pub mod session;

use crate::db::Store;
use crate::directory::Directory;
use crate::email_rate;
use crate::error::AppError;
use crate::login_name;
use crate::mailer::{is_valid_email, Mailer};
use crate::otp;
use flash::{FlashStore, ProvisionedAccount};
use session::ActivationSession;

pub const INVALID_OTP_MESSAGE: &str = "Your OTP code has expired or is invalid";

#[derive(Debug, Clone, PartialEq)]
pub struct OtpRequested {
    pub email: String,
    /// An invite exists but the cooldown held back the email.
    pub email_not_resent: bool,
}

#[derive(Debug, Clone)]
pub struct OtpVerified {
    pub invite_id: String,
    pub login_names: Vec<String>,
    pub session: ActivationSession,
}

/// Collaborators for one activation step.
pub struct Activation<'a> {
    pub store: &'a dyn Store,
    pub directory: &'a dyn Directory,
    pub mailer: &'a dyn Mailer,
    pub flashes: &'a FlashStore,
    pub login_redirect: &'a str,
}

impl Activation<'_> {
    /// Sends a code to `email` when it has a live invite and the cooldown
    /// allows. The outcome looks the same whether or not an invite exists.
    pub async fn request_otp(&self, email: &str) -> Result<OtpRequested, AppError> {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(AppError::BadRequest(
                "Please enter a valid email address".to_string(),
            ));
        }

        let invited = self.store.find_invite_by_email(&email).await?.is_some();
        let mut email_not_resent = false;
        if invited {
            if email_rate::try_reserve(self.store, &email).await? {
                let code = otp::issue(self.store, &email).await?;
                self.mailer.send_otp_email(&email, code).await?;
            } else {
                email_not_resent = true;
            }
        } else {
            tracing::debug!("otp requested without a live invite");
        }

        Ok(OtpRequested {
            email,
            email_not_resent,
        })
    }

    /// Checks the code, offers login names and opens the activation session.
    /// The code is consumed on success.
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<OtpVerified, AppError> {
        let email = email.trim().to_lowercase();
        let invalid = || AppError::BadRequest(INVALID_OTP_MESSAGE.to_string());

        let invite_id = otp::validate(self.store, &email, code)
            .await?
            .ok_or_else(invalid)?;
        let invite = self
            .store
            .find_invite_by_id(&invite_id)
            .await?
            .ok_or_else(invalid)?;

        let login_names =
            login_name::login_options(self.directory, &invite.first_name, &invite.last_name)
                .await?;
        self.store.set_login_names(&invite.id, &login_names).await?;

        let session = ActivationSession::verified(&email, code.trim(), &invite.id);
        otp::claim(self.store, &email, code).await?;
        tracing::info!(invite_id = %invite.id, options = login_names.len(), "otp verified");

        Ok(OtpVerified {
            invite_id: invite.id,
            login_names,
            session,
        })
    }

    /// Provisions the directory account for `invite_id` as `login_name`.
    ///
    /// Every session or parameter mismatch yields [`AppError::SecurityCheck`]
    /// before the directory is contacted. The credential is left in the flash
    /// store for a single read.
    pub async fn finalize_account(
        &self,
        session: Option<&ActivationSession>,
        invite_id: &str,
        login_name: &str,
    ) -> Result<(), AppError> {
        let Some(invite) = self.store.find_invite_by_id(invite_id).await? else {
            tracing::warn!(invite_id, "finalize for unknown invite");
            return Err(AppError::SecurityCheck);
        };

        if !session.is_some_and(|s| s.authorizes(&invite)) {
            tracing::warn!(invite_id, "activation session check failed");
            return Err(AppError::SecurityCheck);
        }
        if !invite.offers_login_name(login_name) {
            tracing::warn!(invite_id, login_name, "login name was not offered");
            return Err(AppError::SecurityCheck);
        }

        let taken = self.directory.email_exists(&invite.email).await?
            || self
                .directory
                .available_login_names(&[login_name.to_string()])
                .await?
                .is_empty();
        if taken {
            return Err(AppError::Conflict(format!(
                "Your account already exists, please login at: {}",
                self.login_redirect
            )));
        }

        let password = self.directory.create_user(&invite, login_name).await?;

        // The account exists now. A failed delete leaves a stale invite that
        // can be removed again later.
        if let Err(e) = self.store.delete_invite_by_email(&invite.email).await {
            tracing::error!(invite_id, "invite not deleted after provisioning: {e:?}");
        }

        self.flashes.put(
            &invite.id,
            ProvisionedAccount {
                first_name: invite.first_name.clone(),
                login_name: login_name.to_string(),
                password,
            },
        );
        tracing::info!(invite_id, login_name, "account provisioned");
        Ok(())
    }

    /// Hands out the provisioned credential once, to the session that
    /// finished provisioning.
    pub fn take_credential(
        &self,
        session: Option<&ActivationSession>,
        invite_id: &str,
    ) -> Result<ProvisionedAccount, AppError> {
        if !session.is_some_and(|s| s.provisioned_for(invite_id)) {
            return Err(AppError::SecurityCheck);
        }
        self.flashes
            .take(invite_id)
            .ok_or_else(|| AppError::NotFound("nothing to show for this activation".to_string()))
    }
}
