//! Foundational text utilities shared across repobot crates.
//!
//! Provides the character-bounded chunker used for outbound chat delivery and
//! the truncation helper used when embedding remote error bodies in messages.

pub mod chunking;
pub mod text_utils;

pub use chunking::{split_into_chunks, SLACK_MESSAGE_MAX_CHARS};
pub use text_utils::truncate_for_error;
