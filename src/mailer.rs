use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::{Address, Message};

use crate::config::SiteConfig;
use crate::models::invite::Invite;
use crate::models::otp::OtpCode;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid email address {address}: {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("send failed: {0}")]
    Send(String),
}

/// Accepts bare addresses only (`user@example.com`, no display name).
pub fn is_valid_email(email: &str) -> bool {
    email.parse::<Address>().is_ok()
}

/// A rendered plain-text email, before addressing.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub subject: String,
    pub body: String,
}

fn footer(site: &SiteConfig) -> String {
    let mut footer = format!("\n--\n{} | {}\n", site.site_name, site.tenant_name);
    if !site.link_service_provider.is_empty() {
        footer.push_str(&format!("Service provider: {}\n", site.link_service_provider));
    }
    if !site.link_privacy_policy.is_empty() {
        footer.push_str(&format!("Privacy policy: {}\n", site.link_privacy_policy));
    }
    footer
}

pub fn render_otp(site: &SiteConfig, code: OtpCode) -> OutgoingMail {
    OutgoingMail {
        subject: format!("{} Activation Code", site.tenant_name),
        body: format!(
            "Your activation code is {code}.\n\nEnter it on the {} page to continue.\n{}",
            site.site_name,
            footer(site)
        ),
    }
}

pub fn render_invite(site: &SiteConfig, invite: &Invite) -> OutgoingMail {
    OutgoingMail {
        subject: format!("{} Invite", site.tenant_name),
        body: format!(
            "Hello {},\n\n{} has invited you to create a {} account.\n\
             Visit {} and enter this email address to begin activation.\n{}",
            invite.first_name,
            invite.inviter,
            site.tenant_name,
            site.public_url,
            footer(site)
        ),
    }
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse::<Mailbox>().map_err(|e| MailError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

/// Addresses a rendered mail into a full RFC 5322 message.
pub fn build_message(from: &str, to: &str, mail: &OutgoingMail) -> Result<Message, MailError> {
    Ok(Message::builder()
        .from(mailbox(from)?)
        .to(mailbox(to)?)
        .subject(mail.subject.clone())
        .header(ContentType::TEXT_PLAIN)
        .body(mail.body.clone())?)
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_otp_email(&self, to: &str, code: OtpCode) -> Result<(), MailError>;
    async fn send_invite_email(&self, to: &str, invite: &Invite) -> Result<(), MailError>;
}

/// Builds every message and writes it to the log instead of a transport.
pub struct LogMailer {
    site: SiteConfig,
    /// Print OTP codes in the clear. Development only.
    reveal_codes: bool,
}

impl LogMailer {
    pub fn new(site: SiteConfig, reveal_codes: bool) -> Self {
        Self { site, reveal_codes }
    }

    fn deliver(&self, to: &str, mail: &OutgoingMail) -> Result<(), MailError> {
        let message = build_message(&self.site.email_from, to, mail)?;
        tracing::info!(
            to,
            subject = %mail.subject,
            bytes = message.formatted().len(),
            "email queued"
        );
        Ok(())
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_otp_email(&self, to: &str, code: OtpCode) -> Result<(), MailError> {
        self.deliver(to, &render_otp(&self.site, code))?;
        if self.reveal_codes {
            tracing::warn!(to, %code, "dev mode otp");
        }
        Ok(())
    }

    async fn send_invite_email(&self, to: &str, invite: &Invite) -> Result<(), MailError> {
        self.deliver(to, &render_invite(&self.site, invite))
    }
}
