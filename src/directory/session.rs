use std::time::Duration;

use reqwest::header::{ACCEPT, REFERER};
use reqwest::{Certificate, Client};
use serde_json::{json, Value};

use super::rpc::{BatchEnvelope, BatchResult, RpcRequest, RpcResponse, SubRequest, API_VERSION};
use super::DirectoryError;

/// One authenticated conversation with the directory.
///
/// The login cookie lives in the client's jar, so a session is only useful to
/// the operation that opened it.
pub struct DirectorySession {
    client: Client,
    host: String,
}

impl DirectorySession {
    pub fn new(
        host: &str,
        ca_cert: Option<&Certificate>,
        timeout: Duration,
    ) -> Result<Self, DirectoryError> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .user_agent(concat!("idclaim/", env!("CARGO_PKG_VERSION")));
        if let Some(cert) = ca_cert {
            builder = builder.add_root_certificate(cert.clone());
        }

        Ok(Self {
            client: builder.build()?,
            host: host.trim_end_matches('/').to_string(),
        })
    }

    fn referer(&self) -> String {
        format!("{}/ipa", self.host)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<(), DirectoryError> {
        let url = format!("{}/ipa/session/login_password", self.host);
        let resp = self
            .client
            .post(&url)
            .header(REFERER, self.referer())
            .header(ACCEPT, "text/plain")
            .form(&[("user", username), ("password", password)])
            .send()
            .await?;

        if !resp.status().is_success() {
            tracing::warn!("directory login for {username} failed: {}", resp.status());
            return Err(DirectoryError::Auth {
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }

    /// Issues one command and returns its `result` member.
    pub async fn call(
        &self,
        method: &str,
        args: Value,
        options: Value,
    ) -> Result<Value, DirectoryError> {
        let url = format!("{}/ipa/session/json", self.host);
        let request = RpcRequest {
            method,
            params: json!([args, options]),
            id: 0,
        };

        let resp = self
            .client
            .post(&url)
            .header(REFERER, self.referer())
            .header(ACCEPT, "application/json")
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DirectoryError::Status {
                status: status.as_u16(),
            });
        }

        let body = resp.bytes().await?;
        let envelope: RpcResponse = serde_json::from_slice(&body)?;
        if let Some(error) = envelope.error {
            tracing::warn!(method, code = ?error.code, name = ?error.name, "directory rpc error: {}", error.message);
            return Err(DirectoryError::Rpc {
                message: error.message,
            });
        }

        Ok(envelope.result.unwrap_or(Value::Null))
    }

    /// Runs every sub-request in a single `batch` round trip. An empty slice
    /// makes no remote call.
    pub async fn batch_call(&self, requests: &[SubRequest]) -> Result<BatchResult, DirectoryError> {
        if requests.is_empty() {
            return Ok(BatchResult::default());
        }

        let result = self
            .call(
                "batch",
                serde_json::to_value(requests)?,
                json!({ "version": API_VERSION }),
            )
            .await?;
        let envelope: BatchEnvelope = serde_json::from_value(result)?;

        if envelope.results.len() != requests.len() {
            return Err(DirectoryError::InvalidRecord(format!(
                "batch returned {} results for {} requests",
                envelope.results.len(),
                requests.len()
            )));
        }

        Ok(BatchResult::from_envelope(envelope))
    }
}
