//! Slack Web API client for the `rtm.connect` handshake.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use repobot_core::truncate_for_error;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::retry_helpers::{
    is_invalid_auth_error, is_retryable_slack_status, is_retryable_transport_error,
    parse_retry_after, retry_delay,
};

#[derive(Debug, Clone, Deserialize)]
struct SlackRtmConnectResponse {
    ok: bool,
    url: Option<String>,
    team: Option<SlackRtmTeam>,
    #[serde(rename = "self")]
    bot: Option<SlackRtmSelf>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackRtmTeam {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackRtmSelf {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

/// Websocket URL and identity returned by a successful `rtm.connect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct RtmSessionGrant {
    pub(super) url: String,
    pub(super) team_id: Option<String>,
    pub(super) team_name: Option<String>,
    pub(super) bot_user_id: Option<String>,
    pub(super) bot_name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub(super) enum RtmConnectError {
    #[error("slack rejected the rtm credentials: {0}")]
    InvalidAuth(String),
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

#[derive(Clone)]
pub(super) struct SlackApiClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl SlackApiClient {
    pub(super) fn new(
        api_base: String,
        token: String,
        request_timeout_ms: u64,
        retry_max_attempts: usize,
        retry_base_delay_ms: u64,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("repobot-slack-rtm"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create slack api client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
            retry_max_attempts: retry_max_attempts.max(1),
            retry_base_delay_ms: retry_base_delay_ms.max(1),
        })
    }

    pub(super) async fn connect_rtm(&self) -> std::result::Result<RtmSessionGrant, RtmConnectError> {
        let response: SlackRtmConnectResponse = self
            .request_json("rtm.connect", || {
                self.http
                    .post(format!("{}/rtm.connect", self.api_base))
                    .bearer_auth(&self.token)
            })
            .await?;

        if !response.ok {
            let code = response
                .error
                .unwrap_or_else(|| "unknown error".to_string());
            if is_invalid_auth_error(&code) {
                return Err(RtmConnectError::InvalidAuth(code));
            }
            return Err(anyhow!("slack rtm.connect failed: {code}").into());
        }

        let url = response
            .url
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("slack rtm.connect did not return url"))?;
        let (team_id, team_name) = match response.team {
            Some(team) => (Some(team.id), team.name),
            None => (None, None),
        };
        let (bot_user_id, bot_name) = match response.bot {
            Some(bot) => (Some(bot.id), bot.name),
            None => (None, None),
        };
        Ok(RtmSessionGrant {
            url,
            team_id,
            team_name,
            bot_user_id,
            bot_name,
        })
    }

    async fn request_json<T, F>(&self, operation: &str, mut builder: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = builder()
                .header(
                    "x-repobot-retry-attempt",
                    attempt.saturating_sub(1).to_string(),
                )
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<T>()
                            .await
                            .with_context(|| format!("failed to decode slack {operation}"));
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if attempt < self.retry_max_attempts
                        && is_retryable_slack_status(status.as_u16())
                    {
                        tracing::debug!(
                            operation,
                            attempt,
                            status = status.as_u16(),
                            "retrying slack api request"
                        );
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }

                    bail!(
                        "slack api {operation} failed with status {}: {}",
                        status.as_u16(),
                        truncate_for_error(&body, 800)
                    );
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(error)
                        .with_context(|| format!("slack api {operation} request failed"));
                }
            }
        }
    }
}
