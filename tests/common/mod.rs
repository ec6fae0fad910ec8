#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Form, Json, Router};
use http::{Method, Request};
use serde_json::{json, Value};
use sqlx::SqlitePool;

use idclaim::config::{Config, DirectoryConfig, SiteConfig, SponsorHeaders};
use idclaim::db::{self, SqliteStore, Store};
use idclaim::directory::IdmDirectory;
use idclaim::mailer::{MailError, Mailer};
use idclaim::models::group::OptionalGroup;
use idclaim::models::invite::{CreateInvite, Invite};
use idclaim::models::otp::OtpCode;
use idclaim::routes;
use idclaim::state::AppState;

pub const IPA_USER: &str = "svc-idclaim";
pub const IPA_PASSWORD: &str = "directory-secret";
pub const LOGIN_REDIRECT: &str = "https://login.example.com";

// ---------------------------------------------------------------------------
// Mock directory
// ---------------------------------------------------------------------------

/// One command the mock directory executed, batch sub-commands included.
#[derive(Debug, Clone)]
pub struct IpaCall {
    pub method: String,
    pub args: Value,
    pub options: Value,
}

#[derive(Default)]
pub struct IpaState {
    /// (uid, mail) of existing accounts.
    pub users: Vec<(String, String)>,
    /// group_show records keyed by CN.
    pub groups: HashMap<String, Value>,
    pub calls: Vec<IpaCall>,
    pub logins: usize,
}

/// In-process stand-in for the directory's session JSON-RPC API.
#[derive(Clone, Default)]
pub struct MockIpa {
    pub state: Arc<Mutex<IpaState>>,
}

impl MockIpa {
    pub fn add_user(&self, uid: &str, mail: &str) {
        self.state
            .lock()
            .unwrap()
            .users
            .push((uid.to_string(), mail.to_string()));
    }

    pub fn add_group(&self, cn: &str, managers: &[&str], manager_groups: &[&str], members: &[&str]) {
        self.state.lock().unwrap().groups.insert(
            cn.to_string(),
            json!({
                "cn": [cn],
                "membermanager_user": managers,
                "membermanager_group": manager_groups,
                "member_user": members,
            }),
        );
    }

    pub fn calls(&self) -> Vec<IpaCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.method).collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls().iter().filter(|c| c.method == method).count()
    }

    pub fn logins(&self) -> usize {
        self.state.lock().unwrap().logins
    }

    pub fn has_user(&self, uid: &str) -> bool {
        self.state.lock().unwrap().users.iter().any(|(u, _)| u == uid)
    }

    /// Binds on an ephemeral port and returns the base URL.
    pub async fn spawn(&self) -> String {
        let app = Router::new()
            .route("/ipa/session/login_password", post(login))
            .route("/ipa/session/json", post(rpc))
            .with_state(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://127.0.0.1:{}", addr.port())
    }
}

async fn login(
    State(ipa): State<MockIpa>,
    Form(form): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    let ok = form.get("user").map(String::as_str) == Some(IPA_USER)
        && form.get("password").map(String::as_str) == Some(IPA_PASSWORD);
    if !ok {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ipa.state.lock().unwrap().logins += 1;
    (
        [(SET_COOKIE, "ipa_session=mock; Path=/ipa; HttpOnly")],
        "",
    )
        .into_response()
}

async fn rpc(State(ipa): State<MockIpa>, Json(body): Json<Value>) -> Json<Value> {
    let method = body["method"].as_str().unwrap_or_default().to_string();
    let args = body["params"][0].clone();
    let options = body["params"][1].clone();

    let mut state = ipa.state.lock().unwrap();
    match execute(&mut state, &method, args, options) {
        Ok(result) => Json(json!({ "result": result, "error": null, "id": 0 })),
        Err(message) => Json(json!({
            "result": null,
            "error": { "code": 4001, "message": message, "name": "NotFound" },
            "id": 0,
        })),
    }
}

fn execute(state: &mut IpaState, method: &str, args: Value, options: Value) -> Result<Value, String> {
    state.calls.push(IpaCall {
        method: method.to_string(),
        args: args.clone(),
        options: options.clone(),
    });

    match method {
        "batch" => {
            let subs = args.as_array().cloned().unwrap_or_default();
            let results: Vec<Value> = subs
                .iter()
                .map(|sub| {
                    let method = sub["method"].as_str().unwrap_or_default();
                    let args = sub["params"][0].clone();
                    let options = sub["params"][1].clone();
                    match execute(state, method, args, options) {
                        Ok(mut item) => {
                            item["error"] = Value::Null;
                            item
                        }
                        Err(message) => json!({ "error": message, "error_code": 4001 }),
                    }
                })
                .collect();
            Ok(json!({ "count": results.len(), "results": results }))
        }
        "user_find" => {
            let count = if let Some(mail) = options["mail"][0].as_str() {
                state.users.iter().filter(|(_, m)| m == mail).count()
            } else {
                let uid = options["uid"].as_str().unwrap_or_default();
                state.users.iter().filter(|(u, _)| u == uid).count()
            };
            Ok(json!({ "count": count, "result": [], "truncated": false, "summary": null }))
        }
        "group_show" => {
            let cn = args[0].as_str().unwrap_or_default();
            match state.groups.get(cn) {
                Some(record) => Ok(json!({ "result": record, "value": cn, "summary": null })),
                None => Err(format!("{cn}: group not found")),
            }
        }
        "user_add" => {
            let uid = args[0].as_str().unwrap_or_default().to_string();
            if state.users.iter().any(|(u, _)| *u == uid) {
                return Err(format!("user with name \"{uid}\" already exists"));
            }
            let mail = options["mail"][0].as_str().unwrap_or_default().to_string();
            state.users.push((uid.clone(), mail));
            Ok(json!({ "result": { "uid": [uid] }, "value": uid, "summary": "Added user" }))
        }
        "group_add_member" => {
            let cn = args[0].as_str().unwrap_or_default();
            if !state.groups.contains_key(cn) {
                return Err(format!("{cn}: group not found"));
            }
            Ok(json!({ "completed": 1, "failed": { "member": { "user": [] } }, "result": {} }))
        }
        other => Err(format!("unknown command: {other}")),
    }
}

// ---------------------------------------------------------------------------
// Recording mailer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SentMail {
    Otp { to: String, code: String },
    Invite { to: String, invite_id: String },
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<SentMail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn otp_count(&self, email: &str) -> usize {
        self.sent()
            .iter()
            .filter(|m| matches!(m, SentMail::Otp { to, .. } if to == email))
            .count()
    }

    pub fn last_code(&self, email: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|m| match m {
            SentMail::Otp { to, code } if to == email => Some(code),
            _ => None,
        })
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_otp_email(&self, to: &str, code: OtpCode) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(SentMail::Otp {
            to: to.to_string(),
            code: code.to_string(),
        });
        Ok(())
    }

    async fn send_invite_email(&self, to: &str, invite: &Invite) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(SentMail::Invite {
            to: to.to_string(),
            invite_id: invite.id.clone(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Test server
// ---------------------------------------------------------------------------

pub fn optional_group(key: &str, required: &str, member_manager: bool) -> OptionalGroup {
    OptionalGroup {
        key: key.to_string(),
        display_name: key.to_uppercase(),
        required_group: required.to_string(),
        member_manager,
    }
}

/// Catalog used by default: one membership-gated and one manager-gated group.
pub fn default_catalog() -> Vec<OptionalGroup> {
    vec![
        optional_group("vpn-users", "staff", false),
        optional_group("lab-members", "", true),
    ]
}

pub fn test_config(ipa_url: &str, catalog: Vec<OptionalGroup>) -> Config {
    Config {
        port: 0,
        database_url: "sqlite::memory:".to_string(),
        session_key: "test-session-key".to_string(),
        dev_mode: true,
        activation_ttl_secs: 28_800,
        site: SiteConfig {
            site_name: "Account Activation".to_string(),
            tenant_name: "Example U".to_string(),
            public_url: "http://activate.test".to_string(),
            login_redirect: LOGIN_REDIRECT.to_string(),
            link_service_provider: "https://example.com".to_string(),
            link_privacy_policy: "https://example.com/privacy".to_string(),
            email_from: "noreply@example.com".to_string(),
        },
        directory: DirectoryConfig {
            host: ipa_url.to_string(),
            username: IPA_USER.to_string(),
            password: IPA_PASSWORD.to_string(),
            ca_cert_path: None,
            add_groups: vec!["ipausers".to_string()],
            gecos_details: false,
            timeout: Duration::from_secs(5),
        },
        optional_groups: catalog,
        affiliations: BTreeMap::from([
            ("affiliate".to_string(), "Affiliate".to_string()),
            ("guest".to_string(), "Guest".to_string()),
        ]),
        sponsor: SponsorHeaders {
            user_header: "x-forwarded-preferred-username".to_string(),
            groups_header: "x-forwarded-groups".to_string(),
        },
    }
}

/// Full application over an in-memory database, a mock directory and a
/// recording mailer. Each instance is isolated, safe for parallel tests.
pub struct TestServer {
    pub state: AppState,
    pub pool: SqlitePool,
    pub ipa: MockIpa,
    pub mailer: Arc<RecordingMailer>,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::with_catalog(default_catalog()).await
    }

    pub async fn with_catalog(catalog: Vec<OptionalGroup>) -> Self {
        let pool = db::create_pool("sqlite::memory:")
            .await
            .expect("failed to create test pool");

        let ipa = MockIpa::default();
        ipa.add_group("ipausers", &[], &[], &[]);
        ipa.add_group("vpn-users", &[], &[], &[]);
        ipa.add_group("lab-members", &["alice"], &["lab-admins"], &[]);
        ipa.add_group("lab-admins", &[], &[], &["carol"]);
        let ipa_url = ipa.spawn().await;

        let config = test_config(&ipa_url, catalog);
        let directory =
            IdmDirectory::new(config.directory.clone()).expect("failed to build directory");
        let mailer = Arc::new(RecordingMailer::default());

        let state = AppState::new(
            config,
            Arc::new(SqliteStore::new(pool.clone())),
            Arc::new(directory),
            mailer.clone(),
        );

        Self {
            state,
            pool,
            ipa,
            mailer,
        }
    }

    /// Returns an Axum Router wired to this server's state for `oneshot()` calls.
    pub fn router(&self) -> axum::Router {
        routes::router(self.state.clone())
    }

    pub fn store(&self) -> &dyn Store {
        self.state.store.as_ref()
    }

    /// Stores an invite for `email` sponsored by `inviter`, bypassing the HTTP layer.
    pub async fn create_invite(&self, email: &str, inviter: &str) -> Invite {
        let input = CreateInvite {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: email.to_string(),
            state: "Ontario".to_string(),
            country: "CAN".to_string(),
            affiliation: "affiliate".to_string(),
            optional_groups: vec!["vpn-users".to_string()],
        };
        self.store()
            .create_invite(&input, inviter)
            .await
            .expect("failed to create test invite")
    }
}

// ---------------------------------------------------------------------------
// Request builder helpers
// ---------------------------------------------------------------------------

/// Build an unauthenticated request with a JSON body.
pub fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Build a JSON request carrying an activation cookie.
pub fn cookie_json_request(method: Method, uri: &str, cookie: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("Cookie", cookie)
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

pub fn cookie_request(method: Method, uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Cookie", cookie)
        .body(Body::empty())
        .unwrap()
}

/// Build a request as the proxy would forward it for a signed-in sponsor.
pub fn sponsor_request(
    method: Method,
    uri: &str,
    sponsor: &str,
    groups: &str,
    body: Option<&Value>,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-preferred-username", sponsor)
        .header("x-forwarded-groups", groups);
    match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// The `name=value` part of the activation cookie a response set.
pub fn activation_cookie(response: &axum::response::Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("IDCLAIM_ACTIVATION="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

/// Parse a response body into a `serde_json::Value`.
pub async fn parse_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
