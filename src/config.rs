use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::group::{self, OptionalGroup};

/// Text and links shown to invitees and sponsors.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub site_name: String,
    pub tenant_name: String,
    /// Base URL invitees are sent to.
    pub public_url: String,
    pub login_redirect: String,
    pub link_service_provider: String,
    pub link_privacy_policy: String,
    pub email_from: String,
}

/// Connection details for the identity directory.
#[derive(Clone)]
pub struct DirectoryConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub ca_cert_path: Option<PathBuf>,
    /// Groups every provisioned account joins.
    pub add_groups: Vec<String>,
    /// Append "(COUNTRY AFFILIATION)" to the gecos field.
    pub gecos_details: bool,
    pub timeout: Duration,
}

/// Headers the authenticating proxy sets for the signed-in sponsor.
#[derive(Debug, Clone)]
pub struct SponsorHeaders {
    pub user_header: String,
    pub groups_header: String,
}

pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub session_key: String,
    pub dev_mode: bool,
    pub activation_ttl_secs: u64,
    pub site: SiteConfig,
    pub directory: DirectoryConfig,
    pub optional_groups: Vec<OptionalGroup>,
    /// Affiliation key to display name.
    pub affiliations: BTreeMap<String, String>,
    pub sponsor: SponsorHeaders,
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    pub fn from_env() -> Self {
        let session_key =
            std::env::var("IDCLAIM_SESSION_KEY").expect("IDCLAIM_SESSION_KEY is required");

        let directory = DirectoryConfig {
            host: std::env::var("IDM_HOST")
                .expect("IDM_HOST is required")
                .trim_end_matches('/')
                .to_string(),
            username: std::env::var("IDM_USERNAME").expect("IDM_USERNAME is required"),
            password: std::env::var("IDM_PASSWORD").expect("IDM_PASSWORD is required"),
            ca_cert_path: std::env::var("IDM_CACERT_PATH")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            add_groups: split_list(&var_or("IDM_ADD_GROUP", "")),
            gecos_details: flag("IDM_GECOS"),
            timeout: Duration::from_secs(
                std::env::var("IDM_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
        };

        let optional_groups = match std::env::var("IDCLAIM_OPTIONAL_GROUPS") {
            Ok(raw) if !raw.trim().is_empty() => group::parse_catalog(&raw)
                .expect("IDCLAIM_OPTIONAL_GROUPS must be a JSON object of group entries"),
            _ => Vec::new(),
        };

        let affiliations = match std::env::var("IDCLAIM_AFFILIATIONS") {
            Ok(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)
                .expect("IDCLAIM_AFFILIATIONS must be a JSON object of key to display name"),
            _ => BTreeMap::from([("affiliate".to_string(), "Affiliate".to_string())]),
        };

        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            database_url: var_or("DATABASE_URL", "sqlite:idclaim.db?mode=rwc"),
            session_key,
            dev_mode: flag("IDCLAIM_DEV_MODE"),
            activation_ttl_secs: 28800,
            site: SiteConfig {
                site_name: var_or("IDCLAIM_SITE_NAME", "Account Activation"),
                tenant_name: var_or("IDCLAIM_TENANT_NAME", "Organization"),
                public_url: var_or("IDCLAIM_PUBLIC_URL", "http://localhost:8080"),
                login_redirect: var_or("IDCLAIM_LOGIN_REDIRECT", ""),
                link_service_provider: var_or("IDCLAIM_LINK_SERVICE_PROVIDER", ""),
                link_privacy_policy: var_or("IDCLAIM_LINK_PRIVACY_POLICY", ""),
                email_from: var_or("IDCLAIM_EMAIL_FROM", "noreply@localhost"),
            },
            directory,
            optional_groups,
            affiliations,
            sponsor: SponsorHeaders {
                user_header: var_or("IDCLAIM_SPONSOR_USER_HEADER", "x-forwarded-preferred-username")
                    .to_lowercase(),
                groups_header: var_or("IDCLAIM_SPONSOR_GROUPS_HEADER", "x-forwarded-groups")
                    .to_lowercase(),
            },
        }
    }

    pub fn optional_group(&self, key: &str) -> Option<&OptionalGroup> {
        self.optional_groups.iter().find(|g| g.key == key)
    }
}
