use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "transcript-relay",
    about = "Transcript Relay - Fetch YouTube transcripts, falling back to public relays when blocked",
    version,
    long_about = "Retrieves YouTube caption transcripts and returns them as chunked JSON. When YouTube blocks the service's own address, the request is retried through public HTTP relays gathered from free proxy lists. Run it as an HTTP service or fetch a single transcript from the command line."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Configuration file (defaults to ./config.yaml, then the user config directory)
    #[arg(short, long, global = true, value_name = "FILE", env = "TRANSCRIPT_RELAY_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP service
    Serve {
        /// Address to bind (overrides server.bind_addr)
        #[arg(short, long, value_name = "ADDR", env = "TRANSCRIPT_RELAY_BIND")]
        bind: Option<String>,
    },

    /// Fetch one transcript and print or save the shaped result
    Fetch {
        /// Video id or YouTube URL
        #[arg(value_name = "VIDEO_OR_URL")]
        video: String,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Single-line JSON instead of pretty-printed
        #[arg(long)]
        compact: bool,
    },

    /// Refresh the relay pool and list what was collected
    Relays {
        /// Probe this many random relays against the target site
        #[arg(short, long, value_name = "COUNT", default_value = "0")]
        test: usize,
    },

    /// Show or initialize the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Write the default configuration to the config path
        #[arg(long)]
        init: bool,
    },
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// The full JSON response document
    Json,
    /// Timestamped chunk text
    Text,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Text => write!(f, "text"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_fetch_options() {
        let cli = Cli::try_parse_from([
            "transcript-relay",
            "fetch",
            "https://youtu.be/dQw4w9WgXcQ",
            "--format",
            "text",
            "--compact",
        ])
        .unwrap();

        match cli.command {
            Commands::Fetch { video, format, compact, output } => {
                assert_eq!(video, "https://youtu.be/dQw4w9WgXcQ");
                assert!(matches!(format, OutputFormat::Text));
                assert!(compact);
                assert!(output.is_none());
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from(["transcript-relay", "relays", "--test", "3", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Relays { test: 3 }));
    }
}
