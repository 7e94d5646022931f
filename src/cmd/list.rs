/*!
`list.rs`

Implements the `list` subcommand.

  - commands : every command the session capability can reach (filters applied)
  - convars  : every convar with its type, value and default

JSON Output Shape (commands):
{
  "status": "ok",
  "subject": "commands",
  "capability": "default",
  "count": 2,
  "commands": [
    { "name": "physics.jump", "usage": "...", "capability": "default",
      "description": "...", "params": [ { "name": "height", "type": "float", "default": null, "variadic": false } ] }
  ]
}

JSON Output Shape (convars):
{
  "status": "ok",
  "subject": "convars",
  "count": 1,
  "convars": [ { "name": "physics.gravity", "type": "float", "value": 9.81, "default": 9.81, "description": "..." } ]
}
*/

use anyhow::Result;
use clap::Args;
use devconsole::{Command, Convar, TracingSink};

use crate::cmd::format::{Role, StyleOptions, TableOpts, banner, color, emoji, table};
use crate::cmd::shared::Session;
use crate::cmd::subject::Subject;

/// CLI arguments for `devconsole list <subject>`
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Subject to list (commands|convars)
    pub subject: Subject,

    /// Output JSON instead of human-readable text
    #[arg(long)]
    pub json: bool,
}

/// Entry point for the list subcommand.
pub fn execute_list(args: ListArgs, session: &Session) -> Result<()> {
    let mut ctx = session.context(TracingSink);
    session.load_config(&mut ctx)?;
    let style = StyleOptions::detect();
    let out = match (args.subject, args.json) {
        (Subject::Commands, true) => commands_json(session).to_string(),
        (Subject::Convars, true) => convars_json(session).to_string(),
        (Subject::Commands, false) => commands_table(session, &style),
        (Subject::Convars, false) => convars_table(session, &style),
    };
    println!("{out}");
    Ok(())
}

fn command_json(c: &Command) -> serde_json::Value {
    let params: Vec<_> = c
        .params()
        .iter()
        .map(|p| {
            serde_json::json!({
                "name": p.name(),
                "type": p.kind().to_string(),
                "default": p.default_value(),
                "variadic": p.is_variadic(),
            })
        })
        .collect();
    serde_json::json!({
        "name": c.qualified_name(),
        "usage": c.usage(),
        "capability": c.capability().name(),
        "description": c.description(),
        "params": params,
    })
}

fn convar_json(c: &Convar) -> serde_json::Value {
    serde_json::json!({
        "name": c.qualified_name(),
        "type": c.kind().to_string(),
        "value": c.value(),
        "default": c.default_value(),
        "description": c.description(),
    })
}

pub fn commands_json(session: &Session) -> serde_json::Value {
    let visible = session.console.visible_commands(&session.capability);
    let items: Vec<_> = visible.iter().map(|c| command_json(c)).collect();
    serde_json::json!({
        "status": "ok",
        "subject": "commands",
        "capability": session.capability.name(),
        "count": items.len(),
        "commands": items,
    })
}

pub fn convars_json(session: &Session) -> serde_json::Value {
    let items: Vec<_> = session
        .console
        .convars()
        .iter()
        .map(|c| convar_json(c))
        .collect();
    serde_json::json!({
        "status": "ok",
        "subject": "convars",
        "count": items.len(),
        "convars": items,
    })
}

fn commands_table(session: &Session, style: &StyleOptions) -> String {
    let visible = session.console.visible_commands(&session.capability);
    let rows: Vec<Vec<String>> = visible
        .iter()
        .enumerate()
        .map(|(idx, c)| {
            let params = c
                .params()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            vec![
                (idx + 1).to_string(),
                c.qualified_name().to_string(),
                if params.is_empty() { "-".into() } else { params },
                c.description().replace('\n', " "),
            ]
        })
        .collect();
    let header = banner(
        format!("{} Commands ({})", emoji("list", style), rows.len()).trim_start(),
        Some(format!("capability={}", session.capability).as_str()),
        style,
    );
    let body = table(
        &["#", "NAME", "PARAMS", "DESCRIPTION"],
        &rows,
        TableOpts::default(),
        style,
    );
    format!("{header}\n{body}")
}

fn convars_table(session: &Session, style: &StyleOptions) -> String {
    let convars = session.console.convars();
    let rows: Vec<Vec<String>> = convars
        .iter()
        .map(|c| {
            let value = c.value().to_string();
            let value = if c.is_default() {
                value
            } else {
                color(Role::Success, value, style)
            };
            vec![
                c.qualified_name().to_string(),
                c.kind().to_string(),
                value,
                c.default_value().to_string(),
                c.description().to_string(),
            ]
        })
        .collect();
    let header = banner(
        format!("{} Convars ({})", emoji("var", style), rows.len()).trim_start(),
        None,
        style,
    );
    let body = table(
        &["NAME", "TYPE", "VALUE", "DEFAULT", "DESCRIPTION"],
        &rows,
        TableOpts::default(),
        style,
    );
    let hint = color(Role::Dim, "Use `devconsole exec \"name value\"` to change one", style);
    format!("{header}\n{body}\n\n{} {hint}", emoji("info", style))
}
