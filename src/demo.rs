//! Sample declarations the binary registers in place of a real host.
//!
//! physics.*  - float/int convars, commands with optional and enum params
//! render.*   - enum convar, a convar bound to host-owned atomic state
//! admin.*    - commands only the elevated capability can see

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::bail;
use devconsole::{
    Bound, Capability, CommandDecl, ConvarDecl, Declarations, EnumType, Filter, Param, ValueKind,
};

fn quality() -> EnumType {
    EnumType::new("quality", ["low", "medium", "high"])
}

fn shape() -> EnumType {
    EnumType::new("shape", ["box", "sphere", "capsule"])
}

pub fn declarations() -> Declarations {
    let vsync = Arc::new(AtomicBool::new(true));
    let vsync_reader = Arc::clone(&vsync);

    Declarations::new()
        .convar(
            ConvarDecl::float("gravity", 9.81)
                .category("physics")
                .description("Downward acceleration in m/s^2"),
        )
        .convar(
            ConvarDecl::integer("substeps", 4)
                .category("physics")
                .description("Solver iterations per frame"),
        )
        .convar(
            ConvarDecl::choice("quality", quality(), "medium")
                .category("render")
                .description("Overall render quality preset"),
        )
        .convar(
            ConvarDecl::boolean("vsync", true)
                .category("render")
                .description("Wait for vertical blank")
                .backed_by(Bound::atomic_bool(vsync)),
        )
        .convar(ConvarDecl::text("motd", "welcome").description("Message of the day"))
        .command(
            CommandDecl::new("jump", |ctx, inv| {
                let height = inv.float(0)?;
                let times = inv.integer(1)?;
                let gravity = inv
                    .console()
                    .convar("physics.gravity")
                    .and_then(|c| c.value().as_float())
                    .unwrap_or(9.81);
                if gravity <= 0.0 {
                    bail!("cannot jump with gravity {gravity}");
                }
                let airtime = 2.0 * (2.0 * height / gravity).sqrt();
                ctx.info(format!("jump {height}m x{times} ({airtime:.2}s airtime each)"));
                Ok(())
            })
            .category("physics")
            .description("Jump to a height, optionally several times")
            .param(Param::required("height", ValueKind::Float))
            .param(Param::optional("times", ValueKind::Integer, 1_i64)),
        )
        .command(
            CommandDecl::new("spawn", |ctx, inv| {
                let kind = inv.variant(0)?;
                let count = inv.integer(1)?;
                ctx.info(format!("spawned {count} {kind}(s)"));
                Ok(())
            })
            .category("physics")
            .description("Spawn rigid bodies")
            .param(Param::required("shape", ValueKind::Enum(shape())))
            .param(Param::optional("count", ValueKind::Integer, 1_i64)),
        )
        .command(
            CommandDecl::new("stats", move |ctx, inv| {
                let quality = inv
                    .console()
                    .convar("render.quality")
                    .map(|c| c.value().to_string())
                    .unwrap_or_default();
                let vsync = vsync_reader.load(Ordering::Relaxed);
                ctx.info(format!("quality={quality} vsync={vsync}"));
                Ok(())
            })
            .category("render")
            .description("Show current render settings"),
        )
        .command(
            CommandDecl::new("kick", |ctx, inv| {
                let player = inv.text(0)?;
                let reason = inv.rest().join(" ");
                if reason.is_empty() {
                    ctx.info(format!("kicked {player}"));
                } else {
                    ctx.info(format!("kicked {player}: {reason}"));
                }
                Ok(())
            })
            .category("admin")
            .description("Disconnect a player")
            .requires(Capability::ADMIN)
            .param(Param::required("player", ValueKind::Text))
            .param(Param::variadic("reason")),
        )
        .command(
            CommandDecl::new("godmode", |ctx, inv| {
                let on = inv.boolean(0)?;
                ctx.info(format!("godmode {}", if on { "on" } else { "off" }));
                Ok(())
            })
            .category("admin")
            .description("Toggle invulnerability (not for admins on live servers)")
            .param(Param::optional("enabled", ValueKind::Boolean, true))
            .filter(Filter::deny([Capability::ADMIN])),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use devconsole::{BufferSink, Console, Context};

    fn console() -> Console {
        let console = Console::new();
        console.load(declarations()).unwrap();
        console
    }

    #[test]
    fn demo_declarations_register() {
        let console = console();
        assert!(console.command("physics.jump").is_some());
        assert!(console.convar("render.vsync").is_some());
    }

    #[test]
    fn bound_convar_feeds_command() {
        let console = console();
        let sink = BufferSink::new();
        let mut ctx = Context::standard(sink.clone());
        console
            .dispatch(&mut ctx, "render.vsync off | render.quality HIGH | render.stats")
            .unwrap();
        assert_eq!(sink.texts(), vec!["quality=high vsync=false"]);
    }

    #[test]
    fn admin_commands_hidden_from_default() {
        let console = console();
        let sink = BufferSink::new();
        let mut ctx = Context::standard(sink.clone());
        console.dispatch(&mut ctx, "admin.kick bob").unwrap();
        assert_eq!(sink.texts(), vec!["not found: admin.kick"]);

        let sink = BufferSink::new();
        let mut ctx = Context::admin(sink.clone());
        console.dispatch(&mut ctx, "cd admin | kick bob afk too long").unwrap();
        assert_eq!(sink.texts(), vec!["kicked bob: afk too long"]);
    }
}
