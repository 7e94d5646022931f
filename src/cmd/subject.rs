/*!
Subject enum for the `list` subcommand.

Variants:
  commands (every command the session may reach)
  convars  (every convar)
*/

use std::fmt;

/// What `list` enumerates.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Subject {
    /// Commands visible to the session capability
    #[value(alias = "command", alias = "cmds")]
    Commands,
    /// All convars with their current values
    #[value(alias = "convar", alias = "cvars")]
    Convars,
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Subject::Commands => "commands",
            Subject::Convars => "convars",
        })
    }
}
