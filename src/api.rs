//! Result submission workflow (client side of `POST /api/send`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Final round outcome as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Lose,
}

/// JSON body of `POST /api/send`. A `win` payload is only valid with both
/// `code` and `username`; the server rejects anything less.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub status: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl SubmissionPayload {
    pub fn win(code: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            status: Outcome::Win,
            code: Some(code.into()),
            username: Some(username.into()),
        }
    }

    pub fn lose(username: Option<String>) -> Self {
        Self {
            status: Outcome::Lose,
            code: None,
            username,
        }
    }
}

/// Server verdict on a submission. `reason` carries machine-readable
/// failure causes such as `chat_not_found`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SendOutcome {
    pub fn success() -> Self {
        Self {
            ok: true,
            error: None,
            reason: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            reason: None,
        }
    }
}

pub const NETWORK_ERROR: &str = "network_error";

/// Delivers a round result to the backend. Implementations never fail
/// outward; every transport or protocol problem becomes a `SendOutcome`
/// with `ok == false`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResultSender: Send + Sync {
    async fn send_result(&self, payload: &SubmissionPayload) -> SendOutcome;
}

/// `ResultSender` over HTTP, posting to `{base_url}/api/send`.
pub struct HttpResultSender {
    client: reqwest::Client,
    base_url: String,
}

impl HttpResultSender {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/send", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ResultSender for HttpResultSender {
    async fn send_result(&self, payload: &SubmissionPayload) -> SendOutcome {
        let response = match self.client.post(self.endpoint()).json(payload).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("failed to reach result endpoint: {e}");
                return SendOutcome::failure(NETWORK_ERROR);
            }
        };

        let status = response.status();
        if !status.is_success() {
            // The error body carries `error`/`reason`; fall back to the
            // HTTP status text when it doesn't parse.
            return match response.json::<SendOutcome>().await {
                Ok(mut outcome) => {
                    outcome.ok = false;
                    if outcome.error.is_none() {
                        outcome.error = Some(status.to_string());
                    }
                    outcome
                }
                Err(_) => SendOutcome::failure(status.to_string()),
            };
        }

        match response.json::<SendOutcome>().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("result endpoint returned an unreadable body: {e}");
                SendOutcome::failure(NETWORK_ERROR)
            }
        }
    }
}
