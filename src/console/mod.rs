/*!
Console core: registry, dispatcher and the pieces they are built from.

Data flows one way:

  raw line -> segments -> tokens -> resolved name -> convar substitution
           -> lookup -> capability/filter check -> bind -> execute

Layout:
  tokenize.rs  (segment/token splitting, `$` root markers, name resolution)
  value.rs     (value kinds + the text coercion rule)
  convar.rs    (convars, backings, ConvarStore)
  access.rs    (Capability variants, Filter rule sets)
  context.rs   (Context session handle, OutputSink implementations)
  command.rs   (CommandDecl validation, Param binding, Invocation)
  builtins.rs  (help / cd / get / set / reset / cvars / echo, strict + echo toggles)
  error.rs     (DispatchError / RegistrationError taxonomy)

Every dispatch-time failure is reported to the context's sink as exactly one
message; the dispatcher then moves on to the next `|` segment. The only
exception is an execution error while `console.strict` is on, which is
returned to the caller instead.
*/

pub mod access;
mod builtins;
pub mod command;
pub mod context;
pub mod convar;
pub mod error;
pub mod tokenize;
pub mod value;

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use access::Capability;
use command::{Command, CommandDecl};
use context::{Context, Level, Message};
use convar::{Convar, ConvarDecl, ConvarStore};
use error::{DispatchError, RegistrationError};
use tokenize::{NameRef, Token};

/// Convar that makes execution errors propagate out of [`Console::dispatch`].
pub const STRICT_CONVAR: &str = "console.strict";

/// Convar that echoes each received line to the sink before parsing.
pub const ECHO_CONVAR: &str = "console.echo";

/// Declarations supplied by a discovery collaborator at load time.
#[derive(Default)]
pub struct Declarations {
    pub commands: Vec<CommandDecl>,
    pub convars: Vec<ConvarDecl>,
}

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn command(mut self, decl: CommandDecl) -> Self {
        self.commands.push(decl);
        self
    }

    pub fn convar(mut self, decl: ConvarDecl) -> Self {
        self.convars.push(decl);
        self
    }
}

/// What happened to one `|` segment.
#[derive(Debug)]
pub enum Outcome {
    /// A command ran to completion.
    Executed(String),
    /// A convar was printed.
    ConvarRead(String),
    /// A convar was assigned.
    ConvarWritten(String),
    /// A lone `$` reset the category scope.
    ScopeReset,
    /// Rejected or failed; already reported to the sink.
    Failed(DispatchError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::Failed(_))
    }
}

/// Check a declared name and category; returns the lowercased qualified name.
pub(crate) fn validate_identity(name: &str, category: &str) -> Result<String, RegistrationError> {
    let invalid = |name: &str, reason| RegistrationError::InvalidName {
        name: name.to_string(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid(name, "name is empty"));
    }
    if name.contains('.') {
        return Err(invalid(name, "name may not contain '.'; use a category"));
    }
    context::check_path(name).map_err(|reason| invalid(name, reason))?;
    context::check_path(category).map_err(|reason| invalid(category, reason))?;
    Ok(tokenize::qualify(category, name).to_ascii_lowercase())
}

#[derive(Clone, Default)]
struct Registry {
    commands: HashMap<String, Arc<Command>>,
    convars: ConvarStore,
}

impl Registry {
    fn add_command(&mut self, command: Command) -> Result<Arc<Command>, RegistrationError> {
        let key = command.qualified_name().to_string();
        if self.commands.contains_key(&key) || self.convars.contains(&key) {
            return Err(RegistrationError::Duplicate { name: key });
        }
        tracing::debug!(command = %key, capability = %command.capability(), "registered command");
        let command = Arc::new(command);
        self.commands.insert(key, Arc::clone(&command));
        Ok(command)
    }

    fn add_convar(&mut self, decl: ConvarDecl) -> Result<Arc<Convar>, RegistrationError> {
        let convar = Arc::new(Convar::from_decl(decl)?);
        let key = convar.qualified_name();
        if self.commands.contains_key(key) {
            return Err(RegistrationError::Duplicate {
                name: key.to_string(),
            });
        }
        self.convars.insert(Arc::clone(&convar))?;
        Ok(convar)
    }

    fn apply(
        &mut self,
        decls: Declarations,
        known: &[Capability],
    ) -> Result<(), RegistrationError> {
        for decl in decls.convars {
            self.add_convar(decl)?;
        }
        for decl in decls.commands {
            self.add_command(Command::from_decl(decl, known)?)?;
        }
        Ok(())
    }
}

/// The command/convar registry plus the line dispatcher.
///
/// Populated once by [`Console::load`]; until then [`Console::dispatch`] is a
/// no-op. Shareable across threads (`Arc<Console>`); lookups clone the entry
/// out of the registry so callables may re-enter the console.
pub struct Console {
    registry: RwLock<Registry>,
    capabilities: RwLock<Vec<Capability>>,
    loaded: AtomicBool,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    /// An empty, unloaded console knowing the `default` and `admin` variants.
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            capabilities: RwLock::new(vec![Capability::DEFAULT, Capability::ADMIN]),
            loaded: AtomicBool::new(false),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make a custom capability variant known. Commands may only require
    /// variants the console knows about.
    pub fn register_capability(&self, capability: Capability) -> Result<(), RegistrationError> {
        let mut known = self
            .capabilities
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if known.iter().any(|c| c.name() == capability.name()) {
            return Err(RegistrationError::Duplicate {
                name: capability.name().to_string(),
            });
        }
        known.push(capability);
        Ok(())
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        self.capabilities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// One-time load: built-ins plus `decls`, validated as a whole.
    ///
    /// Returns `Ok(true)` when this call populated the registry and
    /// `Ok(false)` when the console was already loaded (the declarations are
    /// dropped). On error nothing is registered and the console stays unloaded.
    pub fn load(&self, decls: Declarations) -> Result<bool, RegistrationError> {
        let mut registry = self.write();
        if self.loaded.load(Ordering::Acquire) {
            tracing::debug!("console already loaded; ignoring declarations");
            return Ok(false);
        }
        let known = self.capabilities();
        let mut staged = registry.clone();
        staged.apply(builtins::declarations(), &known)?;
        staged.apply(decls, &known)?;
        tracing::info!(
            commands = staged.commands.len(),
            convars = staged.convars.len(),
            "console loaded"
        );
        *registry = staged;
        self.loaded.store(true, Ordering::Release);
        Ok(true)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Add a command after load.
    pub fn register_command(&self, decl: CommandDecl) -> Result<Arc<Command>, RegistrationError> {
        let command = Command::from_decl(decl, &self.capabilities())?;
        self.write().add_command(command)
    }

    /// Add a convar after load.
    pub fn register_convar(&self, decl: ConvarDecl) -> Result<Arc<Convar>, RegistrationError> {
        self.write().add_convar(decl)
    }

    /// Exact lookup by qualified name (case-insensitive).
    pub fn command(&self, qualified: &str) -> Option<Arc<Command>> {
        self.read()
            .commands
            .get(&qualified.to_ascii_lowercase())
            .cloned()
    }

    /// Exact lookup by qualified name (case-insensitive).
    pub fn convar(&self, qualified: &str) -> Option<Arc<Convar>> {
        self.read().convars.get(qualified).cloned()
    }

    /// Convar lookup from `category`: `category.name`, then bare `name`;
    /// `$name` is absolute.
    pub fn resolve_convar(&self, name: &str, category: &str) -> Option<Arc<Convar>> {
        self.read().convars.resolve(name, category).cloned()
    }

    /// All commands ordered by qualified name.
    pub fn commands(&self) -> Vec<Arc<Command>> {
        let mut all: Vec<_> = self.read().commands.values().cloned().collect();
        all.sort_by(|a, b| a.qualified_name().cmp(b.qualified_name()));
        all
    }

    /// Commands a session of `capability` may reach.
    pub fn visible_commands(&self, capability: &Capability) -> Vec<Arc<Command>> {
        self.commands()
            .into_iter()
            .filter(|c| c.permits(capability))
            .collect()
    }

    /// All convars ordered by qualified name.
    pub fn convars(&self) -> Vec<Arc<Convar>> {
        self.read().convars.iter().cloned().collect()
    }

    /// Every category prefix that holds a convar or a command `capability` may reach.
    pub fn categories(&self, capability: &Capability) -> BTreeSet<String> {
        let registry = self.read();
        let commands = registry
            .commands
            .values()
            .filter(|c| c.permits(capability))
            .map(|c| c.category());
        let convars = registry.convars.iter().map(|c| c.category());
        let mut out = BTreeSet::new();
        for category in commands.chain(convars).filter(|c| !c.is_empty()) {
            let mut prefix = String::new();
            for segment in category.split('.') {
                if !prefix.is_empty() {
                    prefix.push('.');
                }
                prefix.push_str(segment);
                out.insert(prefix.clone());
            }
        }
        out
    }

    /// Assign a convar from text, resolving `name` against the context's
    /// category. Failures are reported to `ctx`; returns success.
    pub fn set_convar(&self, ctx: &mut Context, name: &str, text: &str) -> bool {
        let Some(convar) = self.resolve_convar(name, ctx.category()) else {
            ctx.error(
                DispatchError::NotFound {
                    name: name.to_string(),
                }
                .to_string(),
            );
            return false;
        };
        convar::assign_reporting(&convar, ctx, text)
    }

    fn flag(&self, name: &str) -> bool {
        self.convar(name)
            .and_then(|c| c.value().as_bool())
            .unwrap_or(false)
    }

    pub fn strict(&self) -> bool {
        self.flag(STRICT_CONVAR)
    }

    pub fn echo(&self) -> bool {
        self.flag(ECHO_CONVAR)
    }

    /// Bind `tokens` to `command` and run it for `ctx`.
    ///
    /// No access check and no reporting happen here; [`Console::dispatch`]
    /// does both.
    pub fn invoke(
        &self,
        command: &Command,
        ctx: &mut Context,
        tokens: &[String],
    ) -> Result<(), DispatchError> {
        command.execute(self, ctx, tokens)
    }

    /// Run every `|`-separated segment of `line`, left to right.
    ///
    /// Each failure is reported to the context and recorded as
    /// [`Outcome::Failed`]; processing continues with the next segment. With
    /// `console.strict` on, an execution error is returned instead and the
    /// rest of the line is skipped.
    pub fn dispatch(&self, ctx: &mut Context, line: &str) -> Result<Vec<Outcome>, DispatchError> {
        if !self.is_loaded() {
            tracing::debug!("dispatch before load ignored");
            return Ok(Vec::new());
        }
        let segments = tokenize::parse_line(line);
        if segments.is_empty() {
            return Ok(Vec::new());
        }
        if self.echo() {
            ctx.emit(Message::new(Level::Echo, format!("> {}", line.trim())));
        }

        let mut outcomes = Vec::with_capacity(segments.len());
        for tokens in &segments {
            let Some((head, rest)) = tokens.split_first() else {
                continue;
            };
            match self.run_segment(ctx, head, rest) {
                Ok(outcome) => outcomes.push(outcome),
                Err(err @ DispatchError::Execution { .. }) if self.strict() => {
                    tracing::debug!(error = %err, "strict mode: propagating execution error");
                    return Err(err);
                }
                Err(err) => {
                    tracing::debug!(kind = err.kind(), error = %err, "segment failed");
                    ctx.error(err.to_string());
                    outcomes.push(Outcome::Failed(err));
                }
            }
        }
        Ok(outcomes)
    }

    /// [`Console::dispatch`] on the tokio blocking pool. The context travels
    /// with the job and comes back with the outcome.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch_detached(
        self: &Arc<Self>,
        mut ctx: Context,
        line: impl Into<String>,
    ) -> tokio::task::JoinHandle<(Context, Result<Vec<Outcome>, DispatchError>)> {
        let console = Arc::clone(self);
        let line = line.into();
        tokio::task::spawn_blocking(move || {
            let result = console.dispatch(&mut ctx, &line);
            (ctx, result)
        })
    }

    fn run_segment(
        &self,
        ctx: &mut Context,
        head: &Token,
        rest: &[Token],
    ) -> Result<Outcome, DispatchError> {
        let name = NameRef::parse(&head.text);
        let Some(qualified) = name.resolve(ctx.category()) else {
            ctx.reset_category();
            return Ok(Outcome::ScopeReset);
        };
        let args = self.substitute(ctx, rest)?;

        if let Some(command) = self.command(&qualified) {
            if !command.permits(ctx.capability()) {
                tracing::debug!(command = %qualified, capability = %ctx.capability(), "access denied");
                return Err(DispatchError::NotFound { name: qualified });
            }
            command.execute(self, ctx, &args)?;
            return Ok(Outcome::Executed(command.qualified_name().to_string()));
        }

        let convar = match name {
            NameRef::Absolute(n) => self.convar(n),
            NameRef::Relative(n) => self.resolve_convar(n, ctx.category()),
            NameRef::ResetScope => None,
        };
        match convar {
            Some(convar) => self.access_convar(ctx, &convar, &args),
            None => Err(DispatchError::NotFound { name: qualified }),
        }
    }

    /// `name` prints, `name value` assigns.
    fn access_convar(
        &self,
        ctx: &mut Context,
        convar: &Convar,
        args: &[String],
    ) -> Result<Outcome, DispatchError> {
        let qualified = convar.qualified_name().to_string();
        match args {
            [] => {
                ctx.info(format!("{qualified} = {}", convar.value()));
                Ok(Outcome::ConvarRead(qualified))
            }
            [text] => match convar.assign(text) {
                Ok(_) => Ok(Outcome::ConvarWritten(qualified)),
                Err(source) => Err(DispatchError::Conversion {
                    command: qualified,
                    param: convar.name().to_string(),
                    source,
                }),
            },
            _ => Err(DispatchError::ArityMismatch {
                command: qualified,
                expected: "0..1".to_string(),
                got: args.len(),
            }),
        }
    }

    /// Replace `{name}` tokens with convar values. The first unknown name
    /// fails the whole segment.
    fn substitute(&self, ctx: &Context, tokens: &[Token]) -> Result<Vec<String>, DispatchError> {
        tokens
            .iter()
            .map(|token| {
                let Some(name) = token.substitution() else {
                    return Ok(token.text.clone());
                };
                self.resolve_convar(name, ctx.category())
                    .map(|convar| convar.value().to_string())
                    .ok_or_else(|| DispatchError::Substitution {
                        name: name.to_string(),
                    })
            })
            .collect()
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.read();
        f.debug_struct("Console")
            .field("loaded", &self.is_loaded())
            .field("commands", &registry.commands.len())
            .field("convars", &registry.convars.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::command::Param;
    use crate::console::context::BufferSink;
    use crate::console::value::ValueKind;
    use std::sync::Mutex;

    fn recording(log: &Arc<Mutex<Vec<String>>>) -> CommandDecl {
        let log = Arc::clone(log);
        CommandDecl::new("jump", move |_ctx, inv| {
            log.lock().unwrap().push(format!("jump {}", inv.float(0)?));
            Ok(())
        })
        .category("physics")
        .param(Param::required("height", ValueKind::Float))
    }

    #[test]
    fn load_is_one_shot() {
        let console = Console::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        assert!(console.load(Declarations::new().command(recording(&log))).unwrap());
        let before = console.commands().len();
        assert!(!console.load(Declarations::new().command(recording(&log))).unwrap());
        assert_eq!(console.commands().len(), before);
    }

    #[test]
    fn failed_load_registers_nothing() {
        let console = Console::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let decls = Declarations::new()
            .command(recording(&log))
            .command(recording(&log));
        let err = console.load(decls).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::Duplicate {
                name: "physics.jump".into()
            }
        );
        assert!(!console.is_loaded());
        assert!(console.commands().is_empty());
    }

    #[test]
    fn dispatch_before_load_is_noop() {
        let console = Console::new();
        let sink = BufferSink::new();
        let mut ctx = Context::standard(sink.clone());
        let outcomes = console.dispatch(&mut ctx, "help").unwrap();
        assert!(outcomes.is_empty());
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn command_and_convar_share_one_namespace() {
        let console = Console::new();
        console.load(Declarations::new()).unwrap();
        let err = console
            .register_convar(ConvarDecl::integer("help", 1))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Duplicate { .. }));
    }

    #[test]
    fn categories_include_every_prefix() {
        let console = Console::new();
        console
            .load(Declarations::new().convar(ConvarDecl::integer("depth", 1).category("render.shadow")))
            .unwrap();
        let cats = console.categories(&Capability::DEFAULT);
        assert!(cats.contains("render"));
        assert!(cats.contains("render.shadow"));
        assert!(cats.contains("console"));
    }

    #[test]
    fn invoke_skips_access_checks_and_reporting() {
        let console = Console::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        console
            .load(Declarations::new().command(recording(&log).requires(Capability::ADMIN)))
            .unwrap();
        let jump = console.command("PHYSICS.JUMP").unwrap();
        let sink = BufferSink::new();
        let mut ctx = Context::standard(sink.clone());
        console.invoke(&jump, &mut ctx, &["1.5".to_string()]).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["jump 1.5"]);

        let err = console.invoke(&jump, &mut ctx, &[]).unwrap_err();
        assert_eq!(err.kind(), "arity_mismatch");
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn set_convar_resolves_from_context_category() {
        let console = Console::new();
        console
            .load(Declarations::new().convar(ConvarDecl::integer("steps", 4).category("physics")))
            .unwrap();
        let sink = BufferSink::new();
        let mut ctx = Context::standard(sink.clone())
            .with_category("physics")
            .unwrap();
        assert!(console.set_convar(&mut ctx, "steps", "8"));
        assert_eq!(
            console.resolve_convar("steps", "physics").unwrap().value(),
            crate::console::value::Value::Integer(8)
        );
        assert!(!console.set_convar(&mut ctx, "missing", "1"));
        assert!(sink.contains(Level::Error, "not found: missing"));
    }

    #[test]
    fn custom_capability_must_be_known_before_use() {
        let console = Console::new();
        let moderator = Capability::new("moderator", 50);
        console.register_capability(moderator.clone()).unwrap();
        assert!(console.register_capability(moderator.clone()).is_err());
        console.load(Declarations::new()).unwrap();
        console
            .register_command(CommandDecl::new("mute", |_, _| Ok(())).requires(moderator.clone()))
            .unwrap();
        let sees_mute = |cap: &Capability| {
            console
                .visible_commands(cap)
                .iter()
                .any(|c| c.name() == "mute")
        };
        assert!(!sees_mute(&Capability::DEFAULT));
        assert!(sees_mute(&moderator));
        assert!(sees_mute(&Capability::ADMIN));
    }
}
