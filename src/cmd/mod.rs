/*!
Subcommand modules for the `devconsole` binary.

Layout:
  src/cmd/
    mod.rs          (this file)
    subject.rs      (Subject enum for `list`)
    shared.rs       (Session: loaded console + capability + config path)
    format.rs       (table / colour helpers, TerminalSink)
    repl.rs         (ReplArgs + execute_repl)
    exec.rs         (ExecArgs + execute_exec)
    list.rs         (ListArgs + execute_list)

Conventions:
  - Each subcommand module exposes exactly one public `execute_*` function
    taking its args and the `Session`, returning `anyhow::Result<()>`.
  - Argument structs derive `clap::Args` and are kept minimal.
*/

pub mod exec;
pub mod format;
pub mod list;
pub mod repl;
pub mod shared;
pub mod subject;

pub use exec::{ExecArgs, execute_exec};
pub use list::{ListArgs, execute_list};
pub use repl::{ReplArgs, execute_repl};
pub use shared::Session;
