//! Slack RTM runtime for the `!gh` repository report bot.
//!
//! Owns the websocket connection task, the inbound event model, the command
//! recognizer, and the sequential dispatcher that turns commands into paced
//! chat replies.

pub mod command;
pub mod dispatcher;
pub mod slack_rtm;

pub use command::{parse_repository_command, RepositoryCommand};
pub use dispatcher::{
    run_event_dispatcher, DispatcherExit, EventDispatcher, EventDispatcherConfig,
    OutgoingMessageSink,
};
pub use slack_rtm::{
    spawn_rtm_connection, RtmConnection, RtmConnectionConfig, RtmConnectionInfo, RtmEvent,
    RtmHandle, RtmMessage,
};
