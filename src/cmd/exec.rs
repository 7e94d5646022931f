/*!
`exec.rs`

Implements the `exec` subcommand: run one or more console lines against a
fresh session, then exit. Lines share one context, so `cd` carries over.

  devconsole exec "physics.gravity 3" "physics.jump 2 3"
  devconsole exec --background "spawn box 4 | render.stats"
  devconsole --admin exec "admin.kick bob spamming" --json

`--background` hands each line to the tokio blocking pool and awaits it
before the next one starts.

JSON Output:
{
  "status": "ok" | "error",
  "elapsed_ms": 3,
  "lines": [ { "line": "...", "executed": 2, "failed": [ { "kind": "not_found", "message": "..." } ], "aborted": null } ],
  "messages": [ { "level": "info", "text": "..." } ]
}

The process exits non-zero when any invocation failed.
*/

use std::time::Instant;

use anyhow::{Context as _, Result, bail};
use clap::Args;
use devconsole::{BufferSink, Context, DispatchError, Outcome};
use serde::Serialize;

use crate::cmd::format::{StyleOptions, TerminalSink};
use crate::cmd::shared::Session;

/// CLI arguments for `devconsole exec <LINE>...`
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Console lines to run, in order
    #[arg(required = true, value_name = "LINE")]
    pub lines: Vec<String>,

    /// Dispatch on the tokio blocking pool
    #[arg(long)]
    pub background: bool,

    /// Output JSON instead of human-readable text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct Failure {
    kind: &'static str,
    message: String,
}

impl From<&DispatchError> for Failure {
    fn from(e: &DispatchError) -> Self {
        Failure {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// What happened to one input line.
#[derive(Debug, Serialize)]
struct LineReport {
    line: String,
    executed: usize,
    failed: Vec<Failure>,
    /// Set when strict mode stopped the line early.
    aborted: Option<Failure>,
}

impl LineReport {
    fn new(line: &str, result: Result<Vec<Outcome>, DispatchError>) -> Self {
        let mut report = LineReport {
            line: line.to_string(),
            executed: 0,
            failed: Vec::new(),
            aborted: None,
        };
        match result {
            Ok(outcomes) => {
                for outcome in &outcomes {
                    match outcome {
                        Outcome::Failed(e) => report.failed.push(e.into()),
                        _ => report.executed += 1,
                    }
                }
            }
            Err(e) => report.aborted = Some((&e).into()),
        }
        report
    }

    fn is_ok(&self) -> bool {
        self.failed.is_empty() && self.aborted.is_none()
    }
}

/// Entry point for the exec subcommand.
pub fn execute_exec(args: ExecArgs, session: &Session) -> Result<()> {
    let started = Instant::now();
    let buffer = BufferSink::new();
    let mut ctx = if args.json {
        session.context(buffer.clone())
    } else {
        session.context(TerminalSink::new(StyleOptions::detect()))
    };
    session.load_config(&mut ctx)?;

    let reports = if args.background {
        run_background(session, ctx, &args.lines)?
    } else {
        run_inline(session, &mut ctx, &args.lines)
    };
    let failures = reports.iter().filter(|r| !r.is_ok()).count();

    if args.json {
        let out = serde_json::json!({
            "status": if failures == 0 { "ok" } else { "error" },
            "elapsed_ms": started.elapsed().as_millis() as u64,
            "lines": &reports,
            "messages": buffer.messages(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&out).unwrap_or_else(|_| out.to_string())
        );
    } else {
        for report in &reports {
            // strict-mode errors were not reported by the dispatcher
            if let Some(aborted) = &report.aborted {
                eprintln!("{}", aborted.message);
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} line(s) had failures", reports.len());
    }
    Ok(())
}

fn run_inline(session: &Session, ctx: &mut Context, lines: &[String]) -> Vec<LineReport> {
    lines
        .iter()
        .map(|line| LineReport::new(line, session.console.dispatch(ctx, line)))
        .collect()
}

fn run_background(session: &Session, ctx: Context, lines: &[String]) -> Result<Vec<LineReport>> {
    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    rt.block_on(async {
        let mut ctx = ctx;
        let mut reports = Vec::with_capacity(lines.len());
        for line in lines {
            let (returned, result) = session
                .console
                .dispatch_detached(ctx, line.clone())
                .await
                .context("dispatch task failed")?;
            ctx = returned;
            reports.push(LineReport::new(line, result));
        }
        Ok::<_, anyhow::Error>(reports)
    })
}
