use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

/// Headless recording control channel
#[derive(Parser, Debug, Clone)]
#[command(name = "record-relay", version)]
#[command(about = "HTTP control channel for a headless recorder")]
pub struct Args {
    /// Address to bind to (all interfaces by default)
    #[arg(long, env = "RECORD_RELAY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "RECORD_RELAY_PORT", default_value_t = 8080)]
    pub port: u16,

    /// File the recorder writes to
    #[arg(short, long, env = "RECORD_RELAY_OUTPUT", default_value = "recording.mkv")]
    pub output: PathBuf,

    /// Start recording before accepting connections
    #[arg(long)]
    pub start_recording: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub output: PathBuf,
    pub start_recording: bool,
}

impl TryFrom<Args> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let addr = format!("{}:{}", args.host, args.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", args.host, args.port))?;
        Ok(Self {
            addr,
            output: args.output,
            start_recording: args.start_recording,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_all_interfaces() {
        let args = Args::try_parse_from(["record-relay"]).unwrap();
        let config = ServerConfig::try_from(args).unwrap();
        assert_eq!(config.addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.output, PathBuf::from("recording.mkv"));
        assert!(!config.start_recording);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "record-relay",
            "--host",
            "127.0.0.1",
            "-p",
            "9000",
            "--output",
            "/tmp/x.mkv",
            "--start-recording",
        ])
        .unwrap();
        let config = ServerConfig::try_from(args).unwrap();
        assert_eq!(config.addr, "127.0.0.1:9000".parse().unwrap());
        assert!(config.start_recording);
    }

    #[test]
    fn bad_host_is_an_error() {
        let args = Args::try_parse_from(["record-relay", "--host", "not a host"]).unwrap();
        assert!(ServerConfig::try_from(args).is_err());
    }
}
