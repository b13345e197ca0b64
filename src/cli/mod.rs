use clap::{ Parser, Subcommand };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    // --- Conversation Store Args ---
    /// Conversation store type (memory, redis)
    #[arg(long, env = "STORE_TYPE", default_value = "memory")]
    pub store_type: String,

    /// Conversation store host endpoint (e.g., redis://127.0.0.1:6379)
    #[arg(long, env = "STORE_HOST", default_value = "redis://127.0.0.1:6379")]
    pub store_host: String,

    /// Prefix for Redis message keys and insert channels.
    #[arg(long, env = "STORE_REDIS_PREFIX", default_value = "mechamind:messages:")]
    pub store_redis_prefix: String,

    // --- Inference Gateway Args ---
    /// Base URL of the inference backend serving /chat and /predict.
    #[arg(long, env = "GATEWAY_URL", default_value = "http://localhost:8000")]
    pub gateway_url: String,

    /// Request timeout in seconds for gateway calls.
    #[arg(
        long,
        env = "GATEWAY_TIMEOUT_SECS",
        default_value = "30",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub gateway_timeout_secs: u64,

    // --- Session Args ---
    /// Identity of the signed-in user. Without it, messages cannot be sent.
    #[arg(long, env = "USER_ID")]
    pub user_id: Option<String>,

    // --- Status Poller Args ---
    /// Interval between status predictions, in milliseconds.
    #[arg(
        long,
        env = "STATUS_INTERVAL_MS",
        default_value = "2000",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub status_interval_ms: u64,
}

#[derive(Subcommand, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Command {
    /// Converse with the assistant (default).
    #[default]
    Chat,
    /// Show the live diagnostics prediction.
    Status,
}

impl Args {
    pub fn command(&self) -> Command {
        self.command.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_chat_against_local_backend() {
        let args = Args::try_parse_from(["mechamind", "--store-type", "memory"]).unwrap();
        assert_eq!(args.command(), Command::Chat);
        assert_eq!(args.status_interval_ms, 2000);
    }

    #[test]
    fn parses_status_subcommand() {
        let args = Args::try_parse_from(["mechamind", "--user-id", "u1", "status"]).unwrap();
        assert_eq!(args.command(), Command::Status);
        assert_eq!(args.user_id.as_deref(), Some("u1"));
    }

    #[test]
    fn rejects_zero_interval_and_timeout() {
        assert!(Args::try_parse_from(["mechamind", "--status-interval-ms", "0", "status"]).is_err());
        assert!(Args::try_parse_from(["mechamind", "--gateway-timeout-secs", "0"]).is_err());

        let args = Args::try_parse_from([
            "mechamind",
            "--status-interval-ms",
            "1",
            "--gateway-timeout-secs",
            "1",
        ]).unwrap();
        assert_eq!(args.status_interval_ms, 1);
        assert_eq!(args.gateway_timeout_secs, 1);
    }
}
