/*!
`repl.rs`

Interactive session over stdin. The prompt shows the current category
(`$>` at root). `quit`/`exit` or EOF leave the loop; with `--config` the
convar file is applied on start and written back on exit.
*/

use std::io::{self, BufRead, Write};

use anyhow::{Context as _, Result};
use clap::Args;
use devconsole::{Console, Context};

use crate::cmd::format::{Role, StyleOptions, TerminalSink, banner, color};
use crate::cmd::shared::Session;

/// CLI arguments for `devconsole repl`
#[derive(Args, Debug, Default)]
pub struct ReplArgs {
    /// Skip the start-up banner
    #[arg(long)]
    pub no_banner: bool,
}

/// Entry point for the repl subcommand.
pub fn execute_repl(args: ReplArgs, session: &Session) -> Result<()> {
    let style = StyleOptions::detect();
    let mut ctx = session.context(TerminalSink::new(style.clone()));
    let applied = session.load_config(&mut ctx)?;

    if !args.no_banner {
        let subtitle = format!(
            "capability={} • {applied} convar(s) from config • `help` lists commands, `quit` exits",
            session.capability
        );
        println!("{}", banner("devconsole", Some(subtitle.as_str()), &style));
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let lines = run(stdin.lock(), &mut stdout, &session.console, &mut ctx, &style)?;
    tracing::debug!(lines, "repl finished");

    if let Some(path) = &session.config {
        let saved = session
            .save_config()
            .with_context(|| format!("failed to save convars to {}", path.display()))?;
        tracing::debug!(saved, file = %path.display(), "convars saved");
    }
    Ok(())
}

/// Read-dispatch loop. Returns the number of lines dispatched.
pub fn run(
    mut input: impl BufRead,
    output: &mut impl Write,
    console: &Console,
    ctx: &mut Context,
    style: &StyleOptions,
) -> Result<usize> {
    let mut line = String::new();
    let mut count = 0;
    loop {
        write!(output, "{}", prompt(ctx.category(), style))?;
        output.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            break;
        }
        let trimmed = line.trim();
        if matches!(trimmed, "quit" | "exit") {
            break;
        }
        if trimmed.is_empty() {
            continue;
        }
        count += 1;
        // only strict-mode execution errors come back here; report them like the rest
        if let Err(e) = console.dispatch(ctx, trimmed) {
            ctx.error(e.to_string());
        }
    }
    Ok(count)
}

fn prompt(category: &str, style: &StyleOptions) -> String {
    let scope = if category.is_empty() { "$" } else { category };
    format!("{} ", color(Role::Primary, format!("{scope}>"), style))
}
