//! Sequential consumer of RTM events that answers `!gh <user>` commands.

use std::{ops::ControlFlow, time::Duration};

use repobot_core::{split_into_chunks, SLACK_MESSAGE_MAX_CHARS};
use repobot_github::GithubRepositoryClient;
use tokio::sync::mpsc;

use crate::{
    command::parse_repository_command,
    slack_rtm::{RtmEvent, RtmHandle, RtmMessage},
};

const DEFAULT_CHUNK_DELAY: Duration = Duration::from_secs(1);

/// Fire-and-forget outbound message primitive.
pub trait OutgoingMessageSink {
    fn send_message(&self, channel_id: &str, text: &str);
}

impl OutgoingMessageSink for RtmHandle {
    fn send_message(&self, channel_id: &str, text: &str) {
        RtmHandle::send_message(self, channel_id, text);
    }
}

#[derive(Debug, Clone)]
pub struct EventDispatcherConfig {
    pub max_chunk_chars: usize,
    /// Pause before each report chunk; keeps one destination under ~1 msg/s.
    pub chunk_delay: Duration,
}

impl Default for EventDispatcherConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: SLACK_MESSAGE_MAX_CHARS,
            chunk_delay: DEFAULT_CHUNK_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherExit {
    InvalidAuth,
    StreamClosed,
}

impl DispatcherExit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidAuth => "invalid_auth",
            Self::StreamClosed => "stream_closed",
        }
    }
}

pub struct EventDispatcher<S> {
    config: EventDispatcherConfig,
    github: GithubRepositoryClient,
    sink: S,
}

impl<S: OutgoingMessageSink> EventDispatcher<S> {
    pub fn new(config: EventDispatcherConfig, github: GithubRepositoryClient, sink: S) -> Self {
        Self {
            config,
            github,
            sink,
        }
    }

    /// Drains `events` one at a time until invalid auth or stream end.
    pub async fn run(&self, events: &mut mpsc::Receiver<RtmEvent>) -> DispatcherExit {
        while let Some(event) = events.recv().await {
            if let ControlFlow::Break(exit) = self.handle_event(event).await {
                return exit;
            }
        }
        tracing::info!("rtm event stream closed");
        DispatcherExit::StreamClosed
    }

    pub async fn handle_event(&self, event: RtmEvent) -> ControlFlow<DispatcherExit> {
        tracing::debug!(kind = event.kind(), "event received");
        match event {
            RtmEvent::Hello => {}
            RtmEvent::Connecting { attempt } => {
                tracing::info!(attempt, "connecting to slack rtm");
            }
            RtmEvent::Connected(info) => {
                tracing::info!(
                    team_id = info.team_id.as_deref().unwrap_or("unknown"),
                    team_name = info.team_name.as_deref().unwrap_or("unknown"),
                    bot_user_id = info.bot_user_id.as_deref().unwrap_or("unknown"),
                    bot_name = info.bot_name.as_deref().unwrap_or("unknown"),
                    connection_count = info.connection_count,
                    "connected to slack rtm"
                );
            }
            RtmEvent::Message(message) => self.handle_message(&message).await,
            RtmEvent::PresenceChange { user, presence } => {
                tracing::info!(user = %user, presence = %presence, "presence change");
            }
            RtmEvent::LatencyReport { latency } => {
                tracing::info!(latency_ms = latency.as_millis() as u64, "current latency");
            }
            RtmEvent::TransportError { message } => {
                tracing::warn!(error = %message, "rtm transport error");
            }
            RtmEvent::Disconnected { reason } => {
                tracing::warn!(reason = %reason, "disconnected from slack rtm");
            }
            RtmEvent::InvalidAuth { error } => {
                tracing::error!(error = %error, "invalid slack credentials");
                return ControlFlow::Break(DispatcherExit::InvalidAuth);
            }
            RtmEvent::Other { kind, payload } => {
                tracing::debug!(kind = %kind, payload = %payload, "unexpected rtm event");
            }
        }
        ControlFlow::Continue(())
    }

    async fn handle_message(&self, message: &RtmMessage) {
        let Some(command) = parse_repository_command(&message.text) else {
            return;
        };
        let channel_id = message.channel_id.as_str();
        tracing::info!(
            channel_id,
            user = %command.user,
            requested_by = message.user_id.as_deref().unwrap_or("unknown"),
            message_ts = message.ts.as_deref().unwrap_or("unknown"),
            "repository report requested"
        );

        self.sink.send_message(
            channel_id,
            &format!("Fetching github repositories for {}...", command.user),
        );

        let report = self.github.build_report(&command.user).await;
        let chunks = split_into_chunks(&report, self.config.max_chunk_chars);
        let chunk_count = chunks.len();
        for chunk in chunks {
            tokio::time::sleep(self.config.chunk_delay).await;
            self.sink.send_message(channel_id, chunk);
        }
        tracing::info!(
            channel_id,
            user = %command.user,
            chunks = chunk_count,
            "repository report delivered"
        );
    }
}

/// Runs the dispatcher loop over `events`, replying through `sink`.
pub async fn run_event_dispatcher<S: OutgoingMessageSink>(
    config: EventDispatcherConfig,
    github: GithubRepositoryClient,
    sink: S,
    events: &mut mpsc::Receiver<RtmEvent>,
) -> DispatcherExit {
    EventDispatcher::new(config, github, sink).run(events).await
}
