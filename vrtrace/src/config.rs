use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

use crate::protocol::{ProtocolConfig, DEFAULT_MAX_MESSAGE_SIZE};

/// Default depth of the capture event channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 360;

/// How decoded records are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON document per line.
    #[default]
    Json,
    /// Indented JSON.
    Pretty,
}

/// Application configuration, loadable from CLI or YAML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Largest string, binary or list size accepted from the wire.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: i32,

    /// Capacity of the bounded channel between producers and the tracer.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Quiet mode (suppress non-error logs).
    #[serde(default)]
    pub quiet: bool,

    #[serde(default)]
    pub output: OutputFormat,
}

fn default_max_message_size() -> i32 {
    DEFAULT_MAX_MESSAGE_SIZE
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            channel_capacity: default_channel_capacity(),
            quiet: false,
            output: OutputFormat::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.max_message_size >= 0,
            "max_message_size must not be negative, got {}",
            self.max_message_size
        );
        anyhow::ensure!(self.channel_capacity > 0, "channel_capacity must be positive");
        Ok(())
    }

    /// Merge CLI args into config (CLI takes precedence).
    pub fn merge_cli(&mut self, cli: &CliArgs) {
        if cli.max_message_size != DEFAULT_MAX_MESSAGE_SIZE {
            self.max_message_size = cli.max_message_size;
        }
        if cli.channel_capacity != DEFAULT_CHANNEL_CAPACITY {
            self.channel_capacity = cli.channel_capacity;
        }
        if cli.quiet {
            self.quiet = true;
        }
        if let Some(output) = cli.output {
            self.output = output;
        }
    }

    pub fn protocol_config(&self) -> ProtocolConfig {
        ProtocolConfig {
            max_message_size: self.max_message_size,
        }
    }
}

/// vrtrace: vRouter Sandesh codec and kernel tracer
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    /// Path to YAML config file.
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Largest size prefix accepted when decoding Sandesh.
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_MESSAGE_SIZE,
          value_parser = clap::value_parser!(i32).range(0..))]
    pub max_message_size: i32,

    /// Capacity of the capture event channel.
    #[arg(long, global = true, default_value_t = DEFAULT_CHANNEL_CAPACITY,
          value_parser = parse_capacity)]
    pub channel_capacity: usize,

    /// Quiet mode (suppress non-error logs).
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Output format for decoded records.
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Decode a raw kernel struct capture.
    DecodeRaw {
        /// Struct name, e.g. vr_interface_req.
        #[arg(long = "struct")]
        struct_name: String,
        file: PathBuf,
        /// Dump every layout slot as `[name, value]` instead of the typed record.
        #[arg(long)]
        fields: bool,
    },
    /// Decode a Sandesh payload; a vr_response header is decoded like any other struct.
    DecodeSandesh {
        file: PathBuf,
        /// Treat the file as a netlink reply and strip the attribute header.
        #[arg(long)]
        response: bool,
    },
    /// Push a capture replay file through the tracer.
    Replay { file: PathBuf },
}

fn parse_capacity(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("channel capacity must be positive".into()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cli(args: &[&str]) -> CliArgs {
        let mut argv = vec!["vrtrace"];
        argv.extend_from_slice(args);
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_message_size, 100 * 1024 * 1024);
        assert_eq!(config.channel_capacity, 360);
        assert_eq!(config.output, OutputFormat::Json);
        assert_eq!(config.protocol_config(), ProtocolConfig::default());
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "channel_capacity: 16\noutput: pretty").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.channel_capacity, 16);
        assert_eq!(config.output, OutputFormat::Pretty);
        assert_eq!(config.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
        assert!(!config.quiet);
    }

    #[test]
    fn test_from_file_rejects_bad_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "channel_capacity: 0").unwrap();
        assert!(Config::from_file(file.path()).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_message_size: -1").unwrap();
        assert!(Config::from_file(file.path()).is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut config = Config {
            channel_capacity: 16,
            max_message_size: 4096,
            ..Config::default()
        };

        // Flags left at their defaults keep the file's values.
        config.merge_cli(&cli(&["replay", "cap.bin"]));
        assert_eq!(config.channel_capacity, 16);
        assert_eq!(config.max_message_size, 4096);

        config.merge_cli(&cli(&["-q", "--channel-capacity", "8", "-o", "pretty", "replay", "cap.bin"]));
        assert_eq!(config.channel_capacity, 8);
        assert_eq!(config.output, OutputFormat::Pretty);
        assert!(config.quiet);
    }

    #[test]
    fn test_subcommands() {
        let args = cli(&["decode-raw", "--struct", "vr_mpls_req", "mpls.bin"]);
        assert!(matches!(
            args.command,
            Command::DecodeRaw { ref struct_name, .. } if struct_name == "vr_mpls_req"
        ));

        let args = cli(&["decode-sandesh", "--response", "reply.bin", "--max-message-size", "64"]);
        assert!(matches!(args.command, Command::DecodeSandesh { response: true, .. }));
        assert_eq!(args.max_message_size, 64);

        assert!(CliArgs::try_parse_from(["vrtrace", "--channel-capacity", "0", "replay", "x"]).is_err());
    }
}
