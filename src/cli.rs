use std::path::PathBuf;

use clap::Parser;

use crate::config::{Config, CONFIG_PATH};

#[derive(Parser, Debug)]
#[command(name = "roomchat")]
#[command(version)]
#[command(about = "A terminal client for multi-room chat servers")]
pub struct Args {
    /// Chat server base URL (http or https)
    #[arg(long)]
    pub server: Option<String>,

    /// Display name; with --room, skips the landing prompts
    #[arg(long, short)]
    pub name: Option<String>,

    /// Room code to open directly
    #[arg(long, short)]
    pub room: Option<String>,

    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    pub config: PathBuf,

    /// Keep the session (rooms, history) in this JSON file
    #[arg(long)]
    pub session_file: Option<PathBuf>,

    /// How long a typing notice stays visible, in milliseconds
    #[arg(long)]
    pub typing_timeout_ms: Option<u64>,

    /// Timeout for HTTP requests, in milliseconds (default: none)
    #[arg(long)]
    pub request_timeout_ms: Option<u64>,

    /// Discard any saved session in --session-file before starting
    #[arg(long)]
    pub new_session: bool,

    /// Write the effective configuration to --config and exit
    #[arg(long)]
    pub write_config: bool,

    /// Log debug output to stderr
    #[arg(long, short)]
    pub verbose: bool,
}

/// Apply command-line overrides on top of the file configuration.
pub fn apply_overrides(args: &Args, mut config: Config) -> Config {
    if let Some(server) = &args.server {
        config.server.url = server.clone();
    }
    if let Some(ms) = args.request_timeout_ms {
        config.server.request_timeout_ms = Some(ms);
    }
    if let Some(name) = &args.name {
        config.client.username = Some(name.clone());
    }
    if let Some(ms) = args.typing_timeout_ms {
        config.client.typing_timeout_ms = ms;
    }
    if let Some(path) = &args.session_file {
        config.client.session_file = Some(path.clone());
    }
    config
}

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter(verbose: bool) -> &'static str {
    if verbose {
        "roomchat=debug"
    } else {
        "roomchat=warn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SERVER_URL;

    #[test]
    fn test_args_parse_minimal() {
        let args = Args::parse_from(["roomchat"]);
        assert!(args.server.is_none());
        assert!(args.name.is_none());
        assert!(args.room.is_none());
        assert_eq!(args.config, PathBuf::from("roomchat.toml"));
        assert!(!args.write_config);
        assert!(!args.new_session);
        assert!(!args.verbose);
    }

    #[test]
    fn test_args_parse_full() {
        let args = Args::parse_from([
            "roomchat",
            "--server",
            "https://chat.example.com",
            "--name",
            "alice",
            "--room",
            "abc123",
            "--config",
            "other.toml",
            "--session-file",
            "s.json",
            "--typing-timeout-ms",
            "750",
            "--request-timeout-ms",
            "3000",
            "--new-session",
            "--verbose",
        ]);
        assert_eq!(args.server.as_deref(), Some("https://chat.example.com"));
        assert_eq!(args.name.as_deref(), Some("alice"));
        assert_eq!(args.room.as_deref(), Some("abc123"));
        assert_eq!(args.config, PathBuf::from("other.toml"));
        assert_eq!(args.session_file, Some(PathBuf::from("s.json")));
        assert_eq!(args.typing_timeout_ms, Some(750));
        assert_eq!(args.request_timeout_ms, Some(3000));
        assert!(args.new_session);
        assert!(args.verbose);
    }

    #[test]
    fn test_args_short_flags() {
        let args = Args::parse_from(["roomchat", "-n", "bob", "-r", "xyz", "-v"]);
        assert_eq!(args.name.as_deref(), Some("bob"));
        assert_eq!(args.room.as_deref(), Some("xyz"));
        assert!(args.verbose);
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let args = Args::parse_from([
            "roomchat",
            "--server",
            "http://other:9000",
            "--name",
            "carol",
            "--typing-timeout-ms",
            "100",
        ]);
        let cfg = apply_overrides(&args, Config::default());
        assert_eq!(cfg.server.url, "http://other:9000");
        assert_eq!(cfg.client.username.as_deref(), Some("carol"));
        assert_eq!(cfg.client.typing_timeout_ms, 100);
    }

    #[test]
    fn test_no_overrides_keeps_file_values() {
        let args = Args::parse_from(["roomchat"]);
        let mut file = Config::default();
        file.client.username = Some("dave".into());
        let cfg = apply_overrides(&args, file.clone());
        assert_eq!(cfg, file);
        assert_eq!(cfg.server.url, DEFAULT_SERVER_URL);
    }

    #[test]
    fn test_default_log_filter() {
        assert_eq!(default_log_filter(false), "roomchat=warn");
        assert_eq!(default_log_filter(true), "roomchat=debug");
    }
}
