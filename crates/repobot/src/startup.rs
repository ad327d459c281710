use std::time::Duration;

use anyhow::{Context, Result};
use repobot_cli::Cli;
use repobot_github::{GithubClientConfig, GithubRepositoryClient};
use repobot_slack_runtime::{
    run_event_dispatcher, spawn_rtm_connection, DispatcherExit, EventDispatcherConfig,
    RtmConnectionConfig,
};

const RTM_EVENT_BUFFER: usize = 256;

pub(crate) fn build_rtm_connection_config(cli: &Cli) -> RtmConnectionConfig {
    RtmConnectionConfig {
        api_base: cli.slack_api_base.clone(),
        token: cli.slack_token.clone(),
        request_timeout_ms: cli.slack_request_timeout_ms,
        retry_max_attempts: cli.slack_retry_max_attempts,
        retry_base_delay_ms: cli.slack_retry_base_delay_ms,
        ping_interval: Duration::from_millis(cli.ping_interval_ms),
        reconnect_delay: Duration::from_millis(cli.reconnect_delay_ms),
        event_buffer: RTM_EVENT_BUFFER,
    }
}

pub(crate) fn build_dispatcher_config(cli: &Cli) -> EventDispatcherConfig {
    EventDispatcherConfig {
        max_chunk_chars: cli.chunk_max_chars,
        chunk_delay: Duration::from_millis(cli.chunk_delay_ms),
    }
}

/// Connects to Slack and serves `!gh` commands until the run ends.
pub(crate) async fn run_bot(cli: &Cli) -> Result<()> {
    let github = GithubRepositoryClient::new(GithubClientConfig {
        api_base: cli.github_api_base.clone(),
    })?;
    let mut connection = spawn_rtm_connection(build_rtm_connection_config(cli))
        .context("failed to start slack rtm connection")?;
    tracing::info!(slack_api_base = %cli.slack_api_base, "repobot starting");

    let exit = run_event_dispatcher(
        build_dispatcher_config(cli),
        github,
        connection.handle.clone(),
        &mut connection.events,
    )
    .await;

    connection.task.abort();
    match exit {
        DispatcherExit::InvalidAuth => {
            tracing::error!(exit = exit.as_str(), "repobot stopped: invalid credentials");
        }
        DispatcherExit::StreamClosed => {
            tracing::info!(exit = exit.as_str(), "repobot stopped");
        }
    }
    Ok(())
}
