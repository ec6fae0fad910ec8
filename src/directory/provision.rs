use rand::rngs::OsRng;
use rand::Rng;
use serde_json::{json, Value};

use super::rpc::SubRequest;
use super::session::DirectorySession;
use super::DirectoryError;
use crate::config::DirectoryConfig;
use crate::countries;
use crate::models::invite::Invite;

/// Initial password handed to the invitee: three blocks of three capitals.
pub fn random_credential() -> String {
    let mut rng = OsRng;
    (0..3)
        .map(|_| {
            (0..3)
                .map(|_| char::from(rng.gen_range(b'A'..=b'Z')))
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn initial(s: &str) -> String {
    s.chars().next().map(|c| c.to_uppercase().collect()).unwrap_or_default()
}

/// Options for `user_add`.
pub fn user_add_options(
    invite: &Invite,
    config: &DirectoryConfig,
    password: &str,
) -> Result<Value, DirectoryError> {
    let country = countries::find(&invite.country).ok_or_else(|| {
        DirectoryError::InvalidRecord(format!("unknown country code {}", invite.country))
    })?;

    let cn = format!("{} {}", invite.first_name, invite.last_name);
    let gecos = if config.gecos_details {
        format!("{cn} ({} {})", invite.country, invite.affiliation)
    } else {
        cn.clone()
    };

    Ok(json!({
        "all": true,
        "cn": cn,
        "displayname": cn,
        "gecos": gecos,
        "givenname": invite.first_name,
        "sn": invite.last_name,
        "initials": format!("{}{}", initial(&invite.first_name), initial(&invite.last_name)),
        "mail": [invite.email],
        "st": format!("{}, {}", invite.state, country.name),
        "userpassword": password,
        "manager": invite.inviter,
        "pager": [country.alpha2],
    }))
}

/// Requested optional groups followed by the configured defaults, deduplicated.
pub fn memberships(invite: &Invite, config: &DirectoryConfig) -> Vec<String> {
    let mut groups: Vec<String> = Vec::new();
    for group in invite.optional_groups.iter().chain(&config.add_groups) {
        if !group.is_empty() && !groups.contains(group) {
            groups.push(group.clone());
        }
    }
    groups
}

/// Creates the account and adds it to its groups. Returns the initial password.
///
/// Group additions that the directory rejects individually are logged and
/// skipped; the account already exists at that point.
pub async fn provision(
    session: &DirectorySession,
    config: &DirectoryConfig,
    invite: &Invite,
    login_name: &str,
) -> Result<String, DirectoryError> {
    let password = random_credential();
    let options = user_add_options(invite, config, &password)?;
    session.call("user_add", json!([login_name]), options).await?;
    tracing::info!(login_name, invite_id = %invite.id, "directory account created");

    let groups = memberships(invite, config);
    let requests: Vec<SubRequest> = groups
        .iter()
        .map(|g| SubRequest::new("group_add_member", json!([g]), json!({ "user": [login_name] })))
        .collect();

    let batch = session.batch_call(&requests).await?;
    for (group, outcome) in groups.iter().zip(&batch.results) {
        if let Err(message) = outcome {
            tracing::warn!(login_name, group = %group, "group membership not added: {message}");
        }
    }

    Ok(password)
}
