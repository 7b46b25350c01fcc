//! Command line interface built on clap.
//!
//! Defines [`Cli`] with the [`Command`] subcommands (run, demo, check) and
//! the global flags (--config, --seed, --verbose).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::store::Variant;

/// Concurrent TAs marking exams against a shared rubric.
#[derive(Debug, Parser)]
#[command(name = "ta-marking", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to ./ta-marking.toml when present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// RNG seed, for reproducible schedules.
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Enables debug diagnostics on stderr.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Store implementation selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VariantArg {
    /// Rubric, exam and print locks.
    Locked,
    /// No locks; races are possible.
    #[cfg(feature = "racy")]
    Racy,
}

impl From<VariantArg> for Variant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Locked => Variant::Locked,
            #[cfg(feature = "racy")]
            VariantArg::Racy => Variant::Racy,
        }
    }
}

/// Options shared by the commands that start a run.
#[derive(Debug, Clone, Args)]
pub struct RunOpts {
    /// Number of TAs (at least 2); defaults to the configured `workers`.
    #[arg(long, short = 'n')]
    pub tas: Option<usize>,

    /// Which store to run against.
    #[arg(long, value_enum, default_value_t = VariantArg::Locked)]
    pub variant: VariantArg,

    /// Print the run report as JSON after the summary.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Multiplier on every simulated delay (0.1 runs ten times faster).
    #[arg(long)]
    pub time_scale: Option<f64>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Marks the exams in the list against the rubric.
    Run {
        /// Rubric file: five lines of "<question>, <grade>".
        #[arg(long)]
        rubric: PathBuf,

        /// Exam list file: one exam-file path per line.
        #[arg(long)]
        exams: PathBuf,

        #[command(flatten)]
        opts: RunOpts,
    },

    /// Runs the built-in scenario: rubric 1..5 at A, exams 0001 then 9999.
    Demo {
        #[command(flatten)]
        opts: RunOpts,
    },

    /// Loads and validates the input files without marking anything.
    Check {
        #[arg(long)]
        rubric: PathBuf,

        #[arg(long)]
        exams: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from([
            "ta-marking",
            "run",
            "--tas",
            "3",
            "--rubric",
            "rubric.txt",
            "--exams",
            "exams.txt",
        ]);
        match cli.command {
            Command::Run {
                rubric,
                exams,
                opts,
            } => {
                assert_eq!(rubric, PathBuf::from("rubric.txt"));
                assert_eq!(exams, PathBuf::from("exams.txt"));
                assert_eq!(opts.tas, Some(3));
                assert_eq!(opts.variant, VariantArg::Locked);
                assert!(!opts.json);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "ta-marking",
            "--seed",
            "42",
            "--config",
            "custom.toml",
            "--verbose",
            "demo",
            "--json",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.seed, Some(42));
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        match cli.command {
            Command::Demo { opts } => assert!(opts.json),
            _ => panic!("expected Demo command"),
        }
    }

    #[cfg(feature = "racy")]
    #[test]
    fn cli_parses_racy_variant() {
        let cli = Cli::parse_from(["ta-marking", "demo", "--variant", "racy", "-n", "4"]);
        match cli.command {
            Command::Demo { opts } => {
                assert_eq!(Variant::from(opts.variant), Variant::Racy);
                assert_eq!(opts.tas, Some(4));
            }
            _ => panic!("expected Demo command"),
        }
    }

    #[test]
    fn cli_parses_check_subcommand() {
        let cli = Cli::parse_from([
            "ta-marking",
            "check",
            "--rubric",
            "r.txt",
            "--exams",
            "e.txt",
        ]);
        assert!(matches!(cli.command, Command::Check { .. }));
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
