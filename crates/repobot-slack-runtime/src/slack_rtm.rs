//! Slack RTM connection task that owns the websocket and feeds an event stream.
//!
//! The task performs the `rtm.connect` handshake, keeps the socket alive with
//! pings, reconnects with backoff, and converts frames into [`RtmEvent`]s. It
//! stops after an invalid-credentials handshake or once the event receiver is
//! dropped.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};

mod retry_helpers;
mod rtm_frames;
mod slack_api_client;

use retry_helpers::retry_delay;
use rtm_frames::{parse_rtm_frame, render_outgoing_message_frame, render_ping_frame, RtmFrame};
use slack_api_client::{RtmConnectError, RtmSessionGrant, SlackApiClient};

/// Unanswered pings tolerated before the session is treated as dead.
const MAX_UNANSWERED_PINGS: usize = 3;

type RtmSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtmConnectionInfo {
    pub team_id: Option<String>,
    pub team_name: Option<String>,
    pub bot_user_id: Option<String>,
    pub bot_name: Option<String>,
    pub connection_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtmMessage {
    pub channel_id: String,
    pub user_id: Option<String>,
    pub text: String,
    pub ts: Option<String>,
}

/// Inbound events delivered to the dispatcher, one per handled frame or
/// connection state change.
#[derive(Debug, Clone, PartialEq)]
pub enum RtmEvent {
    Hello,
    Connecting { attempt: usize },
    Connected(RtmConnectionInfo),
    Message(RtmMessage),
    PresenceChange { user: String, presence: String },
    LatencyReport { latency: Duration },
    TransportError { message: String },
    Disconnected { reason: String },
    InvalidAuth { error: String },
    Other { kind: String, payload: Value },
}

impl RtmEvent {
    pub fn kind(&self) -> &str {
        match self {
            Self::Hello => "hello",
            Self::Connecting { .. } => "connecting",
            Self::Connected(_) => "connected",
            Self::Message(_) => "message",
            Self::PresenceChange { .. } => "presence_change",
            Self::LatencyReport { .. } => "latency_report",
            Self::TransportError { .. } => "transport_error",
            Self::Disconnected { .. } => "disconnected",
            Self::InvalidAuth { .. } => "invalid_auth",
            Self::Other { kind, .. } => kind.as_str(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RtmConnectionConfig {
    pub api_base: String,
    pub token: String,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
    pub ping_interval: Duration,
    pub reconnect_delay: Duration,
    pub event_buffer: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct OutgoingMessage {
    channel_id: String,
    text: String,
}

/// Cloneable send side of the RTM connection.
#[derive(Debug, Clone)]
pub struct RtmHandle {
    outgoing_tx: mpsc::UnboundedSender<OutgoingMessage>,
}

impl RtmHandle {
    /// Queues `text` for delivery to `channel_id`. Delivery is best effort.
    pub fn send_message(&self, channel_id: &str, text: &str) {
        let queued = self.outgoing_tx.send(OutgoingMessage {
            channel_id: channel_id.to_string(),
            text: text.to_string(),
        });
        if queued.is_err() {
            tracing::debug!(channel_id, "rtm connection closed; dropping outgoing message");
        }
    }
}

/// A running connection task plus the handles used to talk to it.
pub struct RtmConnection {
    pub handle: RtmHandle,
    pub events: mpsc::Receiver<RtmEvent>,
    pub task: tokio::task::JoinHandle<()>,
}

/// Spawns the background task that owns the Slack RTM connection.
pub fn spawn_rtm_connection(config: RtmConnectionConfig) -> Result<RtmConnection> {
    let client = SlackApiClient::new(
        config.api_base.clone(),
        config.token.clone(),
        config.request_timeout_ms,
        config.retry_max_attempts,
        config.retry_base_delay_ms,
    )?;
    let (events_tx, events) = mpsc::channel(config.event_buffer.max(1));
    let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();

    let manager = RtmConnectionManager {
        config,
        client,
        events_tx,
        outgoing_rx,
        outgoing_open: true,
        next_frame_id: 0,
        connection_count: 0,
    };
    let task = tokio::spawn(manager.run());

    Ok(RtmConnection {
        handle: RtmHandle { outgoing_tx },
        events,
        task,
    })
}

#[derive(Debug)]
enum SessionEnd {
    Reconnect(String),
    ReceiverClosed,
}

struct RtmConnectionManager {
    config: RtmConnectionConfig,
    client: SlackApiClient,
    events_tx: mpsc::Sender<RtmEvent>,
    outgoing_rx: mpsc::UnboundedReceiver<OutgoingMessage>,
    outgoing_open: bool,
    next_frame_id: u64,
    connection_count: usize,
}

impl RtmConnectionManager {
    async fn run(mut self) {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            if !self.emit(RtmEvent::Connecting { attempt }).await {
                return;
            }

            let grant = match self.client.connect_rtm().await {
                Ok(grant) => grant,
                Err(RtmConnectError::InvalidAuth(error)) => {
                    tracing::error!(error = %error, "slack rtm credentials rejected");
                    let _ = self.emit(RtmEvent::InvalidAuth { error }).await;
                    return;
                }
                Err(RtmConnectError::Transport(error)) => {
                    let message = format!("{error:#}");
                    tracing::warn!(attempt, error = %message, "slack rtm.connect failed");
                    if !self.emit(RtmEvent::TransportError { message }).await {
                        return;
                    }
                    if !self.wait_before_reconnect(attempt).await {
                        return;
                    }
                    continue;
                }
            };

            let stream = match connect_async(grant.url.as_str()).await {
                Ok((stream, _response)) => stream,
                Err(error) => {
                    let message = format!("failed to connect slack rtm websocket: {error}");
                    tracing::warn!(attempt, error = %message, "slack rtm websocket open failed");
                    if !self.emit(RtmEvent::TransportError { message }).await {
                        return;
                    }
                    if !self.wait_before_reconnect(attempt).await {
                        return;
                    }
                    continue;
                }
            };

            match self.run_session(stream, &grant).await {
                Ok(SessionEnd::ReceiverClosed) => return,
                Ok(SessionEnd::Reconnect(reason)) => {
                    attempt = 0;
                    if !self.emit(RtmEvent::Disconnected { reason }).await {
                        return;
                    }
                }
                Err(error) => {
                    let message = format!("{error:#}");
                    if !self
                        .emit(RtmEvent::TransportError {
                            message: message.clone(),
                        })
                        .await
                    {
                        return;
                    }
                    if !self.emit(RtmEvent::Disconnected { reason: message }).await {
                        return;
                    }
                }
            }

            if !self.wait_before_reconnect(attempt.max(1)).await {
                return;
            }
        }
    }

    /// Returns false once nobody is listening for events anymore.
    async fn emit(&self, event: RtmEvent) -> bool {
        self.events_tx.send(event).await.is_ok()
    }

    async fn wait_before_reconnect(&self, attempt: usize) -> bool {
        let delay = retry_delay(
            self.config.reconnect_delay.as_millis() as u64,
            attempt,
            None,
        );
        tokio::select! {
            _ = self.events_tx.closed() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    fn next_frame_id(&mut self) -> u64 {
        self.next_frame_id = self.next_frame_id.saturating_add(1);
        self.next_frame_id
    }

    async fn run_session(
        &mut self,
        stream: RtmSocket,
        grant: &RtmSessionGrant,
    ) -> Result<SessionEnd> {
        let (mut sink, mut source) = stream.split();

        self.connection_count = self.connection_count.saturating_add(1);
        let connected = RtmEvent::Connected(RtmConnectionInfo {
            team_id: grant.team_id.clone(),
            team_name: grant.team_name.clone(),
            bot_user_id: grant.bot_user_id.clone(),
            bot_name: grant.bot_name.clone(),
            connection_count: self.connection_count,
        });
        if !self.emit(connected).await {
            return Ok(SessionEnd::ReceiverClosed);
        }

        let events_tx = self.events_tx.clone();
        let ping_interval = self.config.ping_interval.max(Duration::from_millis(1));
        let mut ping_timer =
            tokio::time::interval_at(tokio::time::Instant::now() + ping_interval, ping_interval);
        let mut pending_pings = HashMap::<u64, Instant>::new();

        loop {
            tokio::select! {
                _ = events_tx.closed() => {
                    return Ok(SessionEnd::ReceiverClosed);
                }
                maybe_message = source.next() => {
                    let Some(message_result) = maybe_message else {
                        return Ok(SessionEnd::Reconnect("rtm websocket stream ended".to_string()));
                    };
                    let message = message_result.context("failed reading slack rtm websocket message")?;
                    let text = match message {
                        WsMessage::Text(text) => text.as_str().to_string(),
                        WsMessage::Binary(bytes) => String::from_utf8(bytes.to_vec())
                            .context("invalid utf-8 slack rtm payload")?,
                        WsMessage::Close(frame) => {
                            let reason = frame
                                .map(|frame| format!("rtm websocket closed: {}", frame.reason.as_str()))
                                .unwrap_or_else(|| "rtm websocket closed".to_string());
                            return Ok(SessionEnd::Reconnect(reason));
                        }
                        WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => continue,
                    };
                    let frame = match parse_rtm_frame(&text) {
                        Ok(frame) => frame,
                        Err(error) => {
                            tracing::warn!(error = %format!("{error:#}"), "skipping undecodable rtm frame");
                            continue;
                        }
                    };
                    if matches!(frame, RtmFrame::Goodbye) {
                        return Ok(SessionEnd::Reconnect("server sent goodbye".to_string()));
                    }
                    let Some(event) = event_for_frame(frame, grant, &mut pending_pings) else {
                        continue;
                    };
                    if !self.emit(event).await {
                        return Ok(SessionEnd::ReceiverClosed);
                    }
                }
                maybe_outgoing = self.outgoing_rx.recv(), if self.outgoing_open => {
                    let Some(outgoing) = maybe_outgoing else {
                        self.outgoing_open = false;
                        continue;
                    };
                    let id = self.next_frame_id();
                    let frame = render_outgoing_message_frame(id, &outgoing.channel_id, &outgoing.text);
                    sink.send(WsMessage::Text(frame.into()))
                        .await
                        .context("failed to send slack rtm message")?;
                    tracing::debug!(id, channel_id = %outgoing.channel_id, "rtm message sent");
                }
                _ = ping_timer.tick() => {
                    if pending_pings.len() >= MAX_UNANSWERED_PINGS {
                        return Ok(SessionEnd::Reconnect("rtm heartbeat timed out".to_string()));
                    }
                    let id = self.next_frame_id();
                    pending_pings.insert(id, Instant::now());
                    sink.send(WsMessage::Text(render_ping_frame(id).into()))
                        .await
                        .context("failed to send slack rtm ping")?;
                }
            }
        }
    }
}

fn event_for_frame(
    frame: RtmFrame,
    grant: &RtmSessionGrant,
    pending_pings: &mut HashMap<u64, Instant>,
) -> Option<RtmEvent> {
    match frame {
        RtmFrame::Hello => Some(RtmEvent::Hello),
        RtmFrame::Message {
            channel_id,
            user_id,
            text,
            ts,
            subtype,
        } => {
            if user_id.is_some() && user_id == grant.bot_user_id {
                tracing::debug!(channel_id = %channel_id, "ignoring self-authored rtm message");
                return None;
            }
            if let Some(subtype) = subtype {
                tracing::debug!(channel_id = %channel_id, subtype = %subtype, "rtm message subtype");
            }
            Some(RtmEvent::Message(RtmMessage {
                channel_id,
                user_id,
                text,
                ts,
            }))
        }
        RtmFrame::PresenceChange { user, presence } => {
            Some(RtmEvent::PresenceChange { user, presence })
        }
        RtmFrame::Pong { reply_to } => {
            let sent = pending_pings.remove(&reply_to);
            pending_pings.retain(|id, _| *id > reply_to);
            sent.map(|sent| RtmEvent::LatencyReport {
                latency: sent.elapsed(),
            })
        }
        RtmFrame::Error { code, message } => Some(RtmEvent::TransportError {
            message: match code {
                Some(code) => format!("rtm error {code}: {message}"),
                None => message,
            },
        }),
        RtmFrame::Reply { reply_to, ok } => {
            tracing::debug!(reply_to, ok, "rtm reply acknowledged");
            None
        }
        RtmFrame::Goodbye => None,
        RtmFrame::Other { kind, payload } => Some(RtmEvent::Other { kind, payload }),
    }
}
