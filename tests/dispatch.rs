//! End-to-end dispatch behaviour through the public API.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use devconsole::{
    BufferSink, Bound, Capability, CommandDecl, Console, Context, ConvarDecl, Declarations,
    DispatchError, Filter, Level, Outcome, Param, RegistrationError, Value, ValueKind,
};
use rstest::{fixture, rstest};

type Calls = Arc<Mutex<Vec<Vec<String>>>>;

/// Records the rendered value of every bound argument (defaults resolved).
fn recorder(name: &str, calls: &Calls) -> CommandDecl {
    let calls = Arc::clone(calls);
    CommandDecl::new(name, move |_ctx, inv| {
        let seen = (0..inv.args().len())
            .map(|i| inv.value(i).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        calls.lock().unwrap().push(seen);
        Ok(())
    })
}

struct Harness {
    console: Arc<Console>,
    calls: Calls,
    sink: BufferSink,
    ctx: Context,
}

impl Harness {
    fn run(&mut self, line: &str) -> Vec<Outcome> {
        self.console.dispatch(&mut self.ctx, line).unwrap()
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    fn errors(&self) -> Vec<String> {
        self.sink
            .messages()
            .into_iter()
            .filter(|m| m.level == Level::Error)
            .map(|m| m.text)
            .collect()
    }
}

#[fixture]
fn harness() -> Harness {
    let calls: Calls = Arc::default();
    let decls = Declarations::new()
        .convar(ConvarDecl::integer("speed", 5))
        .convar(ConvarDecl::float("radius", 2.5).category("physics"))
        .convar(ConvarDecl::float("radius", 7.0))
        .command(
            recorder("jump", &calls)
                .category("physics")
                .param(Param::required("height", ValueKind::Float))
                .param(Param::optional("times", ValueKind::Integer, 1_i64))
                .param(Param::optional("loud", ValueKind::Boolean, false)),
        )
        .command(recorder("jump", &calls).param(Param::required("label", ValueKind::Text)))
        .command(recorder("greet", &calls).param(Param::required("who", ValueKind::Text)))
        .command(recorder("run", &calls).param(Param::required("speed", ValueKind::Integer)))
        .command(
            recorder("say", &calls)
                .param(Param::required("channel", ValueKind::Text))
                .param(Param::variadic("words")),
        )
        .command(
            recorder("ban", &calls)
                .category("admin")
                .requires(Capability::ADMIN)
                .param(Param::required("who", ValueKind::Text)),
        )
        .command(CommandDecl::new("boom", |_, _| anyhow::bail!("kaboom")))
        .command(CommandDecl::new("panic", |_, _| panic!("handler blew up")));
    let console = Arc::new(Console::new());
    assert!(console.load(decls).unwrap());
    let sink = BufferSink::new();
    let ctx = Context::standard(sink.clone());
    Harness {
        console,
        calls,
        sink,
        ctx,
    }
}

#[rstest]
fn unknown_name_reports_not_found(mut harness: Harness) {
    let outcomes = harness.run("teleport 1 2");
    assert!(matches!(
        &outcomes[..],
        [Outcome::Failed(DispatchError::NotFound { name })] if name == "teleport"
    ));
    assert_eq!(harness.errors(), vec!["not found: teleport"]);
    assert!(harness.calls().is_empty());
}

#[rstest]
fn privileged_command_looks_missing(mut harness: Harness) {
    harness.run("admin.ban eve");
    harness.run("admin.nothing eve");
    let errors = harness.errors();
    assert_eq!(errors[0], "not found: admin.ban");
    assert_eq!(errors[1], "not found: admin.nothing");
    assert!(harness.calls().is_empty());

    let sink = BufferSink::new();
    let mut admin = Context::admin(sink.clone());
    harness.console.dispatch(&mut admin, "admin.ban eve").unwrap();
    assert_eq!(harness.calls(), vec![vec!["eve".to_string()]]);
    assert!(sink.messages().is_empty());
}

#[rstest]
#[case("physics.jump", 0, None)]
#[case("physics.jump 2", 1, Some(vec!["2", "1", "false"]))]
#[case("physics.jump 2 3", 2, Some(vec!["2", "3", "false"]))]
#[case("physics.jump 2 3 yes", 3, Some(vec!["2", "3", "true"]))]
#[case("physics.jump 2 3 yes extra", 4, None)]
fn arity_and_defaults(
    mut harness: Harness,
    #[case] line: &str,
    #[case] given: usize,
    #[case] bound: Option<Vec<&str>>,
) {
    harness.run(line);
    match bound {
        Some(expected) => {
            assert_eq!(harness.calls(), vec![expected]);
            assert!(harness.errors().is_empty());
        }
        None => {
            assert!(harness.calls().is_empty());
            let errors = harness.errors();
            assert_eq!(errors.len(), 1);
            assert!(errors[0].contains("parameter count mismatch"), "{}", errors[0]);
            assert!(errors[0].contains(&format!("got {given}")));
        }
    }
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(7)]
fn variadic_observes_every_token(mut harness: Harness, #[case] n: usize) {
    let words: Vec<String> = (0..n).map(|i| format!("w{i}")).collect();
    harness.run(&format!("say all {}", words.join(" ")));
    let calls = harness.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0][0], "all");
    assert_eq!(calls[0][1], words.join(" "));
}

#[rstest]
fn variadic_values_keep_their_order(harness: Harness) {
    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = Arc::clone(&seen);
    harness
        .console
        .register_command(
            CommandDecl::new("collect", move |_, inv| {
                sink.lock().unwrap().extend(inv.rest().iter().cloned());
                Ok(())
            })
            .param(Param::variadic("items")),
        )
        .unwrap();
    let mut ctx = Context::standard(BufferSink::new());
    harness
        .console
        .dispatch(&mut ctx, r#"collect c "b a" a"#)
        .unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["c", "b a", "a"]);
}

#[rstest]
fn quoted_argument_is_one_token(mut harness: Harness) {
    harness.run(r#"greet "hello world""#);
    assert_eq!(harness.calls(), vec![vec!["hello world".to_string()]]);
}

#[rstest]
fn convar_substitution(mut harness: Harness) {
    harness.run("run {speed}");
    assert_eq!(harness.calls(), vec![vec!["5".to_string()]]);

    harness.run("run {missing}");
    assert_eq!(harness.calls().len(), 1);
}

#[rstest]
#[case("run {missing}")]
#[case("greet {missing}")]
#[case("greet {$missing}")]
fn missing_substitution_skips_the_segment(mut harness: Harness, #[case] line: &str) {
    let outcomes = harness.run(&format!("{line} | greet after"));
    assert!(matches!(
        &outcomes[..],
        [Outcome::Failed(DispatchError::Substitution { .. }), Outcome::Executed(_)]
    ));
    assert_eq!(harness.errors().len(), 1);
    assert!(harness.errors()[0].starts_with("convar substitution failed: "));
    assert_eq!(harness.calls(), vec![vec!["after".to_string()]]);
}

#[rstest]
fn substitution_resolves_category_first(mut harness: Harness) {
    harness.run("cd physics | $greet {radius} | $greet {$radius} | $greet {speed}");
    let seen: Vec<String> = harness.calls().into_iter().flatten().collect();
    assert_eq!(seen, vec!["2.5", "7", "5"]);
}

#[rstest]
fn quoted_braces_are_literal(mut harness: Harness) {
    harness.run(r#"greet "{speed}""#);
    assert_eq!(harness.calls(), vec![vec!["{speed}".to_string()]]);
}

#[rstest]
fn root_marker_and_scope_reset(mut harness: Harness) {
    harness.ctx.set_category("physics").unwrap();
    harness.run("jump 4");
    harness.run("$jump top");
    assert_eq!(
        harness.calls(),
        vec![
            vec!["4".to_string(), "1".to_string(), "false".to_string()],
            vec!["top".to_string()]
        ]
    );
    assert_eq!(harness.ctx.category(), "physics");

    let outcomes = harness.run("$");
    assert!(matches!(&outcomes[..], [Outcome::ScopeReset]));
    assert_eq!(harness.ctx.category(), "");
    assert_eq!(harness.calls().len(), 2);
}

#[rstest]
fn command_names_ignore_case_but_arguments_do_not(mut harness: Harness) {
    harness.run(r#"GREET MixedCase | Physics.JUMP 1"#);
    let calls = harness.calls();
    assert_eq!(calls[0], vec!["MixedCase".to_string()]);
    assert_eq!(calls[1][0], "1");
}

#[rstest]
fn bad_convar_text_zeroes_and_reports(mut harness: Harness) {
    let outcomes = harness.run("speed abc");
    assert!(matches!(&outcomes[..], [Outcome::Failed(DispatchError::Conversion { .. })]));
    assert_eq!(
        harness.console.convar("speed").unwrap().value(),
        Value::Integer(0)
    );
    assert_eq!(harness.errors().len(), 1);
    assert!(harness.errors()[0].contains("cannot convert 'abc' to int"));
}

#[rstest]
fn convar_read_and_write_through_lines(mut harness: Harness) {
    harness.run("speed 9 | speed | physics.radius");
    assert_eq!(
        harness.sink.texts(),
        vec!["speed = 9", "physics.radius = 2.5"]
    );
    harness.run("speed 1 2");
    assert!(harness.errors()[0].contains("expected 0..1, got 2"));
}

#[rstest]
fn failing_segments_do_not_stop_siblings(mut harness: Harness) {
    let outcomes = harness.run("nope | boom | panic | run 3 | run x | greet ok");
    let ok: Vec<bool> = outcomes.iter().map(Outcome::is_success).collect();
    assert_eq!(ok, vec![false, false, false, true, false, true]);
    assert_eq!(harness.errors().len(), 4);
    assert!(harness.errors()[1].contains("kaboom"));
    assert!(harness.errors()[2].contains("handler blew up"));
    assert_eq!(harness.calls().len(), 2);
}

#[rstest]
fn strict_mode_propagates_execution_errors(mut harness: Harness) {
    harness.run("console.strict true");
    let err = harness.console.dispatch(&mut harness.ctx, "greet a | boom | greet b");
    assert!(matches!(err, Err(DispatchError::Execution { .. })));
    assert_eq!(harness.calls().len(), 1);
    assert!(harness.errors().is_empty());

    // other failure kinds are still reported, not raised
    let outcomes = harness.run("nope");
    assert!(!outcomes[0].is_success());
}

#[rstest]
#[case(false)]
#[case(true)]
fn set_with_bad_value_zeroes_and_reports_once(mut harness: Harness, #[case] strict: bool) {
    if strict {
        harness.run("console.strict true");
    }
    let outcomes = harness.run("set speed abc | greet after");
    match &outcomes[..] {
        [Outcome::Failed(err), Outcome::Executed(_)] => assert_eq!(err.kind(), "conversion"),
        other => panic!("unexpected outcomes {other:?}"),
    }
    assert_eq!(
        harness.console.convar("speed").unwrap().value(),
        Value::Integer(0)
    );
    assert_eq!(harness.errors().len(), 1);
    assert!(harness.errors()[0].contains("cannot convert 'abc' to int"));
    assert_eq!(harness.calls().len(), 1);
}

#[rstest]
#[case("get nothing", "not found: nothing")]
#[case("set nothing 1", "not found: nothing")]
#[case("reset nothing", "not found: nothing")]
#[case("cd nowhere", "not found: nowhere")]
#[case("help admin.ban", "not found: admin.ban")]
#[case("help teleport", "not found: teleport")]
fn builtin_lookups_report_not_found(
    mut harness: Harness,
    #[case] line: &str,
    #[case] expected: &str,
) {
    for strict in [false, true] {
        harness.console.set_convar(&mut harness.ctx, "$console.strict", &strict.to_string());
        harness.sink.take();
        let outcomes = harness.run(&format!("{line} | greet after"));
        match &outcomes[..] {
            [Outcome::Failed(err), Outcome::Executed(_)] => assert_eq!(err.kind(), "not_found"),
            other => panic!("unexpected outcomes {other:?}"),
        }
        assert_eq!(harness.errors(), vec![expected.to_string()]);
    }
    assert_eq!(harness.calls().len(), 2);
}

#[rstest]
fn echo_mode_repeats_input(mut harness: Harness) {
    harness.run("console.echo on");
    harness.run("  greet you  ");
    let messages = harness.sink.messages();
    assert_eq!(messages[0].level, Level::Echo);
    assert_eq!(messages[0].text, "> greet you");
}

#[rstest]
fn blank_lines_are_noops(mut harness: Harness) {
    assert!(harness.run("   ").is_empty());
    assert!(harness.run(" | \n ").is_empty());
    assert!(harness.sink.messages().is_empty());
}

#[rstest]
fn second_load_is_ignored(harness: Harness) {
    let before: Vec<String> = harness
        .console
        .commands()
        .iter()
        .map(|c| c.qualified_name().to_string())
        .collect();
    let again = Declarations::new().command(CommandDecl::new("extra", |_, _| Ok(())));
    assert!(!harness.console.load(again).unwrap());
    let after: Vec<String> = harness
        .console
        .commands()
        .iter()
        .map(|c| c.qualified_name().to_string())
        .collect();
    assert_eq!(before, after);
}

#[test]
fn duplicate_names_fail_the_whole_load() {
    let console = Console::new();
    let decls = Declarations::new()
        .convar(ConvarDecl::integer("speed", 1))
        .command(CommandDecl::new("SPEED", |_, _| Ok(())));
    assert_eq!(
        console.load(decls).unwrap_err(),
        RegistrationError::Duplicate {
            name: "speed".into()
        }
    );
    assert!(!console.is_loaded());
    assert!(console.convars().is_empty());
}

#[test]
fn filters_gate_by_runtime_capability() {
    let moderator = Capability::new("moderator", 50);
    let console = Console::new();
    console.register_capability(moderator.clone()).unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    console
        .load(Declarations::new().command(
            CommandDecl::new("mute", move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .requires(moderator.clone())
            .filter(Filter::allow([moderator.clone()])),
        ))
        .unwrap();

    for (capability, expected) in [
        (Capability::DEFAULT, 0),
        (Capability::ADMIN, 0),
        (moderator.clone(), 1),
    ] {
        let sink = BufferSink::new();
        let mut ctx = Context::new(capability, sink.clone());
        console.dispatch(&mut ctx, "mute").unwrap();
        assert_eq!(hits.swap(0, Ordering::SeqCst), expected);
        if expected == 0 {
            assert_eq!(sink.texts(), vec!["not found: mute"]);
        }
    }
}

#[test]
fn bound_convar_reads_host_state() {
    let cell = Arc::new(AtomicI64::new(3));
    let console = Console::new();
    console
        .load(Declarations::new().convar(
            ConvarDecl::integer("lives", 0)
                .category("game")
                .backed_by(Bound::atomic_i64(Arc::clone(&cell))),
        ))
        .unwrap();
    let sink = BufferSink::new();
    let mut ctx = Context::standard(sink.clone());
    cell.store(8, Ordering::SeqCst);
    console.dispatch(&mut ctx, "game.lives | game.lives 2").unwrap();
    assert_eq!(sink.texts(), vec!["game.lives = 8"]);
    assert_eq!(cell.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn detached_dispatch_returns_context() {
    let console = Arc::new(Console::new());
    console
        .load(
            Declarations::new().convar(ConvarDecl::float("gravity", 9.8).category("physics")),
        )
        .unwrap();
    let sink = BufferSink::new();
    let ctx = Context::standard(sink.clone());
    let (ctx, result) = console
        .dispatch_detached(ctx, "cd physics | gravity 1.5")
        .await
        .unwrap();
    assert!(result.unwrap().iter().all(Outcome::is_success));
    assert_eq!(ctx.category(), "physics");
    assert_eq!(
        console.convar("physics.gravity").unwrap().value(),
        Value::Float(1.5)
    );
}
