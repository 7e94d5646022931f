//! Commands and convars every console ships with.
//!
//! All live in the root category, so from inside a category they are reached
//! with an absolute name (`$help`).

use std::sync::Arc;

use super::command::{CommandDecl, Invocation, Param};
use super::context::Context;
use super::convar::{Convar, ConvarDecl};
use super::error::DispatchError;
use super::value::ValueKind;
use super::{Declarations, ECHO_CONVAR, STRICT_CONVAR};

pub(super) fn declarations() -> Declarations {
    Declarations::new()
        .convar(
            ConvarDecl::boolean(toggle_name(STRICT_CONVAR), false)
                .category("console")
                .description("Return execution errors to the caller instead of reporting them"),
        )
        .convar(
            ConvarDecl::boolean(toggle_name(ECHO_CONVAR), false)
                .category("console")
                .description("Echo every received line before running it"),
        )
        .command(
            CommandDecl::new("help", help)
                .description("List available commands, or describe one")
                .param(Param::optional("command", ValueKind::Text, "")),
        )
        .command(
            CommandDecl::new("cd", cd)
                .description("Show or change the current category ('..' goes up, '$' to root)")
                .param(Param::optional("category", ValueKind::Text, "")),
        )
        .command(
            CommandDecl::new("get", get)
                .description("Print a convar")
                .param(Param::required("name", ValueKind::Text)),
        )
        .command(
            CommandDecl::new("set", set)
                .description("Assign a convar from text")
                .param(Param::required("name", ValueKind::Text))
                .param(Param::required("value", ValueKind::Text)),
        )
        .command(
            CommandDecl::new("reset", reset)
                .description("Restore a convar's default value")
                .param(Param::required("name", ValueKind::Text)),
        )
        .command(
            CommandDecl::new("cvars", cvars)
                .description("List convars, optionally filtered by qualified-name prefix")
                .param(Param::optional("prefix", ValueKind::Text, "")),
        )
        .command(
            CommandDecl::new("echo", echo)
                .description("Print the arguments")
                .param(Param::variadic("text")),
        )
}

fn toggle_name(qualified: &str) -> &str {
    qualified.rsplit('.').next().unwrap_or(qualified)
}

fn not_found(name: impl Into<String>) -> anyhow::Error {
    DispatchError::NotFound { name: name.into() }.into()
}

fn lookup(ctx: &Context, inv: &Invocation<'_>, name: &str) -> anyhow::Result<Arc<Convar>> {
    inv.console()
        .resolve_convar(name, ctx.category())
        .ok_or_else(|| not_found(name))
}

fn help(ctx: &mut Context, inv: &Invocation<'_>) -> anyhow::Result<()> {
    let console = inv.console();
    let wanted = inv.text(0)?;
    if wanted.is_empty() {
        let visible = console.visible_commands(ctx.capability());
        let width = visible
            .iter()
            .map(|c| c.qualified_name().len())
            .max()
            .unwrap_or(0);
        for command in visible {
            ctx.info(format!(
                "{:<width$}  {}",
                command.qualified_name(),
                command.description()
            ));
        }
        return Ok(());
    }

    let qualified = match wanted.strip_prefix('$') {
        Some(abs) => abs.to_string(),
        None => super::tokenize::qualify(ctx.category(), wanted),
    };
    match console
        .command(&qualified)
        .or_else(|| console.command(wanted.trim_start_matches('$')))
        .filter(|c| c.permits(ctx.capability()))
    {
        Some(command) => {
            ctx.info(command.usage());
            if !command.description().is_empty() {
                ctx.info(format!("  {}", command.description()));
            }
            Ok(())
        }
        None => Err(not_found(qualified)),
    }
}

fn cd(ctx: &mut Context, inv: &Invocation<'_>) -> anyhow::Result<()> {
    let target = inv.text(0)?.trim();
    let next = match target {
        "" => {
            let shown = match ctx.category() {
                "" => "$".to_string(),
                current => current.to_string(),
            };
            ctx.info(shown);
            return Ok(());
        }
        "$" => String::new(),
        ".." => match ctx.category().rsplit_once('.') {
            Some((parent, _)) => parent.to_string(),
            None => String::new(),
        },
        abs if abs.starts_with('$') => abs[1..].to_ascii_lowercase(),
        rel => super::tokenize::qualify(ctx.category(), rel).to_ascii_lowercase(),
    };
    if !next.is_empty() && !inv.console().categories(ctx.capability()).contains(&next) {
        return Err(not_found(next));
    }
    ctx.set_category(&next)?;
    Ok(())
}

fn get(ctx: &mut Context, inv: &Invocation<'_>) -> anyhow::Result<()> {
    let convar = lookup(ctx, inv, inv.text(0)?)?;
    ctx.info(format!("{} = {}", convar.qualified_name(), convar.value()));
    Ok(())
}

fn set(ctx: &mut Context, inv: &Invocation<'_>) -> anyhow::Result<()> {
    let convar = lookup(ctx, inv, inv.text(0)?)?;
    // a bad value has already zeroed the convar
    let value = convar
        .assign(inv.text(1)?)
        .map_err(|source| DispatchError::Conversion {
            command: convar.qualified_name().to_string(),
            param: convar.name().to_string(),
            source,
        })?;
    ctx.info(format!("{} = {value}", convar.qualified_name()));
    Ok(())
}

fn reset(ctx: &mut Context, inv: &Invocation<'_>) -> anyhow::Result<()> {
    let convar = lookup(ctx, inv, inv.text(0)?)?;
    convar.reset();
    ctx.info(format!("{} = {}", convar.qualified_name(), convar.value()));
    Ok(())
}

fn cvars(ctx: &mut Context, inv: &Invocation<'_>) -> anyhow::Result<()> {
    let prefix = inv.text(0)?.to_ascii_lowercase();
    for convar in inv.console().convars() {
        if !convar.qualified_name().starts_with(&prefix) {
            continue;
        }
        let marker = if convar.is_default() { "" } else { " *" };
        ctx.info(format!(
            "{} ({}) = {}{marker}",
            convar.qualified_name(),
            convar.kind(),
            convar.value()
        ));
    }
    Ok(())
}

fn echo(ctx: &mut Context, inv: &Invocation<'_>) -> anyhow::Result<()> {
    ctx.info(inv.rest().join(" "));
    Ok(())
}
