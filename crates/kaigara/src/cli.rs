//! Command-line arguments for both binaries.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kai_config::ConfigArgs;
use kai_logstream::DEFAULT_TAIL_PATTERN;

/// Default secrets file for `kai dump` and `kai save`.
pub const DEFAULT_SECRETS_FILE: &str = "outputs.yaml";

/// Runs a command with its secrets and restarts it when they change.
#[derive(Parser, Debug, Clone)]
#[command(name = "kaigara")]
#[command(version, about, long_about = None)]
pub struct KaigaraCli {
    /// Configuration.
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Command to supervise, followed by its arguments.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Kaigara operator CLI.
#[derive(Parser, Debug, Clone)]
#[command(name = "kai")]
#[command(version, about, long_about = None)]
pub struct KaiCli {
    /// Configuration.
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: KaiCommands,
}

/// `kai` subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum KaiCommands {
    /// Print every entry, decrypted, and save it to a file.
    Dump {
        /// Destination file.
        #[arg(short, long, default_value = DEFAULT_SECRETS_FILE)]
        output: PathBuf,
    },

    /// Load entries from a file written by `dump`.
    Save {
        /// Source file.
        #[arg(short, long, default_value = DEFAULT_SECRETS_FILE)]
        file: PathBuf,
    },

    /// Delete entries matching `app.scope.var`.
    ///
    /// Any segment may be `all`; `all` scopes means public, private and
    /// secret.
    Del {
        /// Pattern to delete.
        pattern: String,
    },

    /// Print the merged environment of the configured apps, or one value.
    Env {
        /// Variable to print.
        name: Option<String>,
    },

    /// Follow published log lines.
    Tail {
        /// Channel pattern to subscribe to.
        #[arg(short, long, default_value = DEFAULT_TAIL_PATTERN)]
        channel: String,

        /// Prefix each line with its channel.
        #[arg(short = 's', long)]
        show_channel: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kaigara_keeps_child_flags() {
        let cli = KaigaraCli::try_parse_from([
            "kaigara",
            "--app-names",
            "peatio",
            "rails",
            "server",
            "-p",
            "3000",
        ])
        .expect("parse");
        assert_eq!(cli.command, vec!["rails", "server", "-p", "3000"]);
        assert_eq!(cli.config.app_names, Some(vec!["peatio".to_string()]));
    }

    #[test]
    fn kaigara_requires_a_command() {
        assert!(KaigaraCli::try_parse_from(["kaigara"]).is_err());
    }

    #[test]
    fn kai_parses_subcommands() {
        let cli = KaiCli::try_parse_from(["kai", "dump"]).expect("parse");
        assert_eq!(
            cli.command,
            KaiCommands::Dump {
                output: PathBuf::from(DEFAULT_SECRETS_FILE)
            }
        );

        let cli = KaiCli::try_parse_from(["kai", "save", "-f", "in.json"]).expect("parse");
        assert_eq!(
            cli.command,
            KaiCommands::Save {
                file: PathBuf::from("in.json")
            }
        );

        let cli = KaiCli::try_parse_from(["kai", "del", "all.secret.all"]).expect("parse");
        assert_eq!(
            cli.command,
            KaiCommands::Del {
                pattern: "all.secret.all".to_string()
            }
        );

        let cli = KaiCli::try_parse_from(["kai", "env", "PORT"]).expect("parse");
        assert_eq!(
            cli.command,
            KaiCommands::Env {
                name: Some("PORT".to_string())
            }
        );
    }

    #[test]
    fn kai_tail_defaults_to_every_log_channel() {
        let cli = KaiCli::try_parse_from(["kai", "tail"]).expect("parse");
        assert_eq!(
            cli.command,
            KaiCommands::Tail {
                channel: "log.*".to_string(),
                show_channel: false
            }
        );
    }

    #[test]
    fn global_flags_precede_the_subcommand() {
        let cli = KaiCli::try_parse_from(["kai", "--deployment-id", "opendax", "env"])
            .expect("parse");
        assert_eq!(cli.config.deployment_id.as_deref(), Some("opendax"));
    }
}
