use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod demo;
mod utils;

use cmd::{ExecArgs, ListArgs, ReplArgs, Session};

/// devconsole - developer console host
///
/// Command layout:
///   devconsole repl                              interactive session on stdin
///   devconsole exec <LINE>... [--background]     run lines and exit
///   devconsole list <commands|convars> [--json]  show what is registered
///
/// Global flags / env:
///   -v / -vv            Increase log verbosity (RUST_LOG overrides)
///   -q / --quiet        Errors only
///   -c / --config PATH  Convar file (.cfg, .yaml, .json); DEVCONSOLE_CONFIG as fallback
///   --admin             Start the session with the admin capability
///
/// Examples:
///   devconsole exec "physics.gravity 3 | physics.jump 2"
///   devconsole exec "cd render" "quality high | stats"
///   devconsole --admin exec "admin.kick bob afk" --json
///   devconsole -c autoexec.cfg repl
#[derive(Parser, Debug)]
#[command(
    name = "devconsole",
    version,
    author,
    about = "devconsole - typed commands and convars behind a line-oriented console",
    propagate_version = true,
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Silence all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Convar file loaded at start (and saved on repl exit)
    #[arg(short = 'c', long = "config", global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Run with the admin capability
    #[arg(long, global = true)]
    admin: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive console session
    Repl(ReplArgs),

    /// Run console lines and exit
    Exec(ExecArgs),

    /// List registered commands or convars
    List(ListArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = utils::derive_level(cli.verbose, cli.quiet);
    utils::init_logging(level);

    // CLI flag > DEVCONSOLE_CONFIG env
    let config = cli.config.clone().or_else(|| {
        std::env::var("DEVCONSOLE_CONFIG")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
    });

    let session = Session::open(cli.admin, config)?;

    match cli.command {
        Commands::Repl(args) => cmd::execute_repl(args, &session),
        Commands::Exec(args) => cmd::execute_exec(args, &session),
        Commands::List(args) => cmd::execute_list(args, &session),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "devconsole",
            "exec",
            "help",
            "--admin",
            "-vv",
            "-c",
            "a.cfg",
        ])
        .unwrap();
        assert!(cli.admin);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("a.cfg")));
        match cli.command {
            Commands::Exec(args) => assert_eq!(args.lines, vec!["help"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn exec_requires_a_line() {
        assert!(Cli::try_parse_from(["devconsole", "exec"]).is_err());
    }
}
