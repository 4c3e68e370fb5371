//! Command line interface for `decaptcha`, built on clap.
//!
//! Defines the [`Cli`] struct with [`Command`] subcommands (decode,
//! providers) and the global flags (--config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::DEFAULT_PATH;

/// decaptcha: decodes CAPTCHA images through a fallback chain of solving services.
#[derive(Debug, Parser)]
#[command(name = "decaptcha", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the configuration file.
    #[arg(long, global = true, default_value = DEFAULT_PATH)]
    pub config: PathBuf,

    /// Enables debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Decodes one CAPTCHA image.
    Decode {
        /// Image file to decode.
        image: PathBuf,

        /// Prints a JSON report instead of text.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Only tries these providers (repeatable).
        #[arg(long = "only", value_name = "NAME")]
        only: Vec<String>,

        /// Gives up after this many seconds.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Lets a human answer on stdin through the channel_friend relay.
        #[arg(long, default_value_t = false)]
        operator: bool,

        /// Asks whether the answer was right and reports it when it was not.
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },

    /// Lists the configured provider chain with its timing.
    Providers,
}
