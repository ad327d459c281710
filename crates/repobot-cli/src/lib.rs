//! CLI argument model and value validation for the repobot binary.
//!
//! Every flag also reads from an environment variable so the bot can run from
//! a plain `SLACK_TOKEN=... repobot` invocation.

pub mod cli_args;

pub use cli_args::Cli;
