//! CLI argument definitions for the `portal` binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Reinsurance portal service gateway tools.
#[derive(Parser, Debug)]
#[command(name = "portal", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Runtime environment: production or non-production.
    #[arg(short = 'e', long = "environment")]
    pub environment: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload documents to object storage.
    Upload {
        /// Files to upload, processed in the order given.
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        bucket: Option<String>,
        #[arg(long)]
        prefix: Option<String>,
        /// Size limit per file in megabytes.
        #[arg(long = "max-size-mb")]
        max_size_mb: Option<f64>,
        #[arg(long)]
        user: Option<String>,
    },
    /// Talk to the conversational agent. Reads stdin when no message is given.
    Chat {
        #[arg(short = 'm', long = "message")]
        messages: Vec<String>,
    },
    /// Translate a piece of text.
    Translate {
        text: String,
        #[arg(long, default_value = "auto")]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Print a signed retrieval URL for an object.
    SignedUrl {
        bucket: String,
        key: String,
        /// Expiry in seconds; defaults to the configured value.
        #[arg(long)]
        expiry: Option<u64>,
    },
    /// Queue operations.
    #[command(subcommand)]
    Queue(QueueCommand),
}

#[derive(Subcommand, Debug)]
pub enum QueueCommand {
    /// Send a message body.
    Send { queue_url: String, body: String },
    /// Long-poll for messages and delete the ones received.
    Receive {
        queue_url: String,
        #[arg(long, default_value_t = 1)]
        max: u32,
        #[arg(long, default_value_t = 0)]
        wait: u32,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > PORTAL_CONFIG env var > ~/.portal/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("PORTAL_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the tracing filter. `RUST_LOG` is checked by the caller first.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

fn default_config_path() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".portal").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upload() {
        let args = CliArgs::try_parse_from([
            "portal", "upload", "a.pdf", "b.png", "--bucket", "docs", "--max-size-mb", "2.5",
        ])
        .unwrap();
        match args.command {
            Command::Upload {
                files,
                bucket,
                max_size_mb,
                ..
            } => {
                assert_eq!(files, vec![PathBuf::from("a.pdf"), PathBuf::from("b.png")]);
                assert_eq!(bucket.as_deref(), Some("docs"));
                assert_eq!(max_size_mb, Some(2.5));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_queue_receive_defaults() {
        let args = CliArgs::try_parse_from(["portal", "queue", "receive", "claims"]).unwrap();
        match args.command {
            Command::Queue(QueueCommand::Receive { max, wait, .. }) => {
                assert_eq!(max, 1);
                assert_eq!(wait, 0);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_upload_requires_files() {
        assert!(CliArgs::try_parse_from(["portal", "upload"]).is_err());
    }

    #[test]
    fn test_log_level_flag_overrides_config() {
        let args =
            CliArgs::try_parse_from(["portal", "-l", "debug", "chat", "-m", "hi"]).unwrap();
        assert_eq!(args.resolve_log_level("info"), "debug");
        let args = CliArgs::try_parse_from(["portal", "chat"]).unwrap();
        assert_eq!(args.resolve_log_level("warn"), "warn");
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let args = CliArgs::try_parse_from(["portal", "-c", "/tmp/p.toml", "chat"]).unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/p.toml"));
    }
}
