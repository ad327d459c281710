use clap::Parser;

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_non_empty_token(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("token must not be empty".to_string());
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Parser)]
#[command(
    name = "repobot",
    about = "Slack bot that answers `!gh <user>` with the user's GitHub repositories by stars",
    version
)]
pub struct Cli {
    #[arg(
        long = "slack-token",
        env = "SLACK_TOKEN",
        hide_env_values = true,
        value_parser = parse_non_empty_token,
        help = "Slack bot token used for the RTM connection (xoxb-...)"
    )]
    pub slack_token: String,

    #[arg(
        long = "slack-api-base",
        env = "REPOBOT_SLACK_API_BASE",
        default_value = "https://slack.com/api",
        help = "Slack Web API base URL"
    )]
    pub slack_api_base: String,

    #[arg(
        long = "github-api-base",
        env = "REPOBOT_GITHUB_API_BASE",
        default_value = "https://api.github.com",
        help = "GitHub REST API base URL"
    )]
    pub github_api_base: String,

    #[arg(
        long = "chunk-max-chars",
        env = "REPOBOT_CHUNK_MAX_CHARS",
        default_value_t = 4_000,
        value_parser = parse_positive_usize,
        help = "Maximum characters per posted report message"
    )]
    pub chunk_max_chars: usize,

    #[arg(
        long = "chunk-delay-ms",
        env = "REPOBOT_CHUNK_DELAY_MS",
        default_value_t = 1_000,
        help = "Pause before each report chunk to respect the channel rate limit"
    )]
    pub chunk_delay_ms: u64,

    #[arg(
        long = "ping-interval-ms",
        env = "REPOBOT_PING_INTERVAL_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "Interval between RTM heartbeat pings"
    )]
    pub ping_interval_ms: u64,

    #[arg(
        long = "reconnect-delay-ms",
        env = "REPOBOT_RECONNECT_DELAY_MS",
        default_value_t = 1_000,
        help = "Base delay before reconnecting after connection errors"
    )]
    pub reconnect_delay_ms: u64,

    #[arg(
        long = "slack-request-timeout-ms",
        env = "REPOBOT_SLACK_REQUEST_TIMEOUT_MS",
        default_value_t = 10_000,
        value_parser = parse_positive_u64,
        help = "Timeout for Slack Web API requests"
    )]
    pub slack_request_timeout_ms: u64,

    #[arg(
        long = "slack-retry-max-attempts",
        env = "REPOBOT_SLACK_RETRY_MAX_ATTEMPTS",
        default_value_t = 4,
        value_parser = parse_positive_usize,
        help = "Maximum attempts for retryable slack api failures (429/5xx/transport)"
    )]
    pub slack_retry_max_attempts: usize,

    #[arg(
        long = "slack-retry-base-delay-ms",
        env = "REPOBOT_SLACK_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        help = "Base backoff delay in milliseconds for slack api retries"
    )]
    pub slack_retry_base_delay_ms: u64,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{parse_positive_u64, parse_positive_usize, Cli};

    #[test]
    fn unit_positive_parsers_reject_zero_and_garbage() {
        assert_eq!(parse_positive_usize("4000"), Ok(4_000));
        assert!(parse_positive_usize("0").is_err());
        assert!(parse_positive_usize("-1").is_err());
        assert_eq!(parse_positive_u64("30000"), Ok(30_000));
        assert!(parse_positive_u64("0").is_err());
    }

    #[test]
    fn functional_cli_applies_defaults_with_token_flag() {
        let cli = Cli::try_parse_from(["repobot", "--slack-token", "xoxb-test"]).expect("parse");
        assert_eq!(cli.slack_token, "xoxb-test");
        assert_eq!(cli.slack_api_base, "https://slack.com/api");
        assert_eq!(cli.github_api_base, "https://api.github.com");
        assert_eq!(cli.chunk_max_chars, 4_000);
        assert_eq!(cli.chunk_delay_ms, 1_000);
        assert_eq!(cli.ping_interval_ms, 30_000);
        assert_eq!(cli.slack_retry_max_attempts, 4);
    }

    #[test]
    fn regression_cli_rejects_blank_token_and_zero_chunk_size() {
        assert!(Cli::try_parse_from(["repobot", "--slack-token", "   "]).is_err());
        assert!(Cli::try_parse_from([
            "repobot",
            "--slack-token",
            "xoxb-test",
            "--chunk-max-chars",
            "0"
        ])
        .is_err());
    }
}
