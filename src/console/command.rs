//! Command declarations, validation and argument binding.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use anyhow::anyhow;

use super::Console;
use super::access::{self, Capability, Filter};
use super::context::Context;
use super::error::{DispatchError, RegistrationError};
use super::value::{Value, ValueKind, coerce, normalise};

/// The callable behind a command. The invocation context always comes first.
///
/// Returning a [`DispatchError`] (through `?` or `.into()`) reports the
/// failure with that kind instead of as an execution error.
pub type Handler =
    Arc<dyn Fn(&mut Context, &Invocation<'_>) -> anyhow::Result<()> + Send + Sync>;

/// One declared parameter (the leading context is implicit).
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    name: String,
    kind: ValueKind,
    default: Option<Value>,
    variadic: bool,
}

impl Param {
    pub fn required(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            variadic: false,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ValueKind, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            default: Some(default.into()),
            variadic: false,
        }
    }

    /// Trailing parameter that receives every remaining token verbatim.
    pub fn variadic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ValueKind::List,
            default: None,
            variadic: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_optional(&self) -> bool {
        self.default.is_some()
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.variadic {
            return write!(f, "[{}...]", self.name);
        }
        match &self.default {
            Some(d) => write!(f, "[{}:{}={}]", self.name, self.kind, d),
            None => write!(f, "<{}:{}>", self.name, self.kind),
        }
    }
}

/// Plain-data command declaration, as handed over by a discovery collaborator.
pub struct CommandDecl {
    name: String,
    description: String,
    category: String,
    params: Vec<Param>,
    capability: Capability,
    filter: Option<Filter>,
    handler: Handler,
}

impl CommandDecl {
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Context, &Invocation<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: String::new(),
            category: String::new(),
            params: Vec::new(),
            capability: Capability::DEFAULT,
            filter: None,
            handler: Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Least-privileged capability allowed to invoke the command.
    pub fn requires(mut self, capability: Capability) -> Self {
        self.capability = capability;
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// A validated, registered command. Immutable once built.
pub struct Command {
    name: String,
    description: String,
    category: String,
    qualified: String,
    params: Vec<Param>,
    capability: Capability,
    filter: Option<Filter>,
    handler: Handler,
}

impl Command {
    /// Validate a declaration against the console's known capability variants.
    /// Uniqueness is checked by the registry.
    pub(crate) fn from_decl(
        decl: CommandDecl,
        known: &[Capability],
    ) -> Result<Self, RegistrationError> {
        let qualified = super::validate_identity(&decl.name, &decl.category)?;

        if !known.contains(&decl.capability) {
            return Err(RegistrationError::UnknownCapability {
                command: qualified,
                capability: decl.capability.name().to_string(),
            });
        }

        let variadic_count = decl.params.iter().filter(|p| p.variadic).count();
        if variadic_count > 1 {
            return Err(RegistrationError::MultipleVariadic { command: qualified });
        }
        let mut seen_optional = false;
        let count = decl.params.len();
        let mut params = Vec::with_capacity(count);
        for (idx, param) in decl.params.into_iter().enumerate() {
            if param.variadic {
                if idx + 1 != count {
                    return Err(RegistrationError::VariadicNotLast {
                        command: qualified,
                        param: param.name,
                    });
                }
                params.push(param);
                continue;
            }
            if let ValueKind::Enum(ty) = &param.kind
                && ty.variants().is_empty()
            {
                return Err(RegistrationError::EmptyEnum {
                    owner: qualified,
                    type_name: ty.name().to_string(),
                });
            }
            match param.default.clone() {
                Some(default) => {
                    seen_optional = true;
                    let Some(default) = normalise(&param.kind, default) else {
                        return Err(RegistrationError::DefaultMismatch {
                            owner: qualified,
                            param: param.name,
                            expected: param.kind.to_string(),
                        });
                    };
                    params.push(Param {
                        default: Some(default),
                        ..param
                    });
                }
                None if seen_optional => {
                    return Err(RegistrationError::RequiredAfterOptional {
                        command: qualified,
                        param: param.name,
                    });
                }
                None => params.push(param),
            }
        }

        if let Some(filter) = &decl.filter
            && !filter.permits(&decl.capability)
        {
            return Err(RegistrationError::SelfRejectingFilter {
                command: qualified,
                capability: decl.capability.name().to_string(),
            });
        }

        Ok(Self {
            name: decl.name,
            description: decl.description,
            category: decl.category.to_ascii_lowercase(),
            qualified,
            params,
            capability: decl.capability,
            filter: decl.filter,
            handler: decl.handler,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Whether a session of `caller` capability may reach this command.
    pub fn permits(&self, caller: &Capability) -> bool {
        access::permits(&self.capability, self.filter.as_ref(), caller)
    }

    /// `name <a:int> [b:float=1] [rest...]`
    pub fn usage(&self) -> String {
        let mut out = self.qualified.clone();
        for p in &self.params {
            out.push(' ');
            out.push_str(&p.to_string());
        }
        out
    }

    fn fixed_params(&self) -> &[Param] {
        match self.params.last() {
            Some(last) if last.variadic => &self.params[..self.params.len() - 1],
            _ => &self.params,
        }
    }

    fn has_variadic(&self) -> bool {
        self.params.last().is_some_and(|p| p.variadic)
    }

    /// Accepted token counts, rendered for messages.
    pub fn arity(&self) -> String {
        let fixed = self.fixed_params();
        let required = fixed.iter().filter(|p| !p.is_optional()).count();
        if self.has_variadic() {
            format!("{required}+")
        } else if required == fixed.len() {
            required.to_string()
        } else {
            format!("{required}..{}", fixed.len())
        }
    }

    /// Map argument tokens onto the declared parameters.
    ///
    /// Omitted optional parameters bind to [`Arg::Default`]; a trailing
    /// variadic parameter receives every remaining token as a list.
    pub fn bind(&self, tokens: &[String]) -> Result<Vec<Arg>, DispatchError> {
        let fixed = self.fixed_params();
        let required = fixed.iter().filter(|p| !p.is_optional()).count();
        let too_many = !self.has_variadic() && tokens.len() > fixed.len();
        if tokens.len() < required || too_many {
            return Err(DispatchError::ArityMismatch {
                command: self.qualified.clone(),
                expected: self.arity(),
                got: tokens.len(),
            });
        }

        let mut args = Vec::with_capacity(self.params.len());
        for (idx, param) in fixed.iter().enumerate() {
            let Some(token) = tokens.get(idx) else {
                args.push(Arg::Default);
                continue;
            };
            let value = coerce(token, &param.kind).map_err(|source| DispatchError::Conversion {
                command: self.qualified.clone(),
                param: param.name.clone(),
                source,
            })?;
            args.push(Arg::Given(value));
        }
        if self.has_variadic() {
            let rest = tokens.get(fixed.len()..).unwrap_or_default();
            args.push(Arg::Given(Value::List(rest.to_vec())));
        }
        Ok(args)
    }

    /// Bind `tokens` and run the callable. A [`DispatchError`] returned by the
    /// callable keeps its kind; any other error or a panic comes back as
    /// [`DispatchError::Execution`].
    pub(crate) fn execute(
        &self,
        console: &Console,
        ctx: &mut Context,
        tokens: &[String],
    ) -> Result<(), DispatchError> {
        let args = self.bind(tokens)?;
        let invocation = Invocation {
            console,
            command: self,
            args,
        };
        tracing::debug!(command = %self.qualified, args = tokens.len(), "invoking command");
        let result = catch_unwind(AssertUnwindSafe(|| (self.handler)(ctx, &invocation)))
            .unwrap_or_else(|payload| Err(anyhow!("panicked: {}", panic_message(&*payload))));
        result.map_err(|error| match error.downcast::<DispatchError>() {
            Ok(typed) => typed,
            Err(error) => DispatchError::Execution {
                command: self.qualified.clone(),
                error,
            },
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload")
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("qualified", &self.qualified)
            .field("params", &self.params)
            .field("capability", &self.capability)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

/// A bound argument slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Given(Value),
    /// Not supplied; the parameter's declared default applies.
    Default,
}

/// Everything a callable sees besides its context.
pub struct Invocation<'a> {
    console: &'a Console,
    command: &'a Command,
    args: Vec<Arg>,
}

impl<'a> Invocation<'a> {
    pub fn console(&self) -> &'a Console {
        self.console
    }

    pub fn command(&self) -> &'a Command {
        self.command
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    pub fn is_defaulted(&self, idx: usize) -> bool {
        matches!(self.args.get(idx), Some(Arg::Default))
    }

    /// Value at `idx`, with the default marker resolved.
    pub fn value(&self, idx: usize) -> Option<&Value> {
        match self.args.get(idx)? {
            Arg::Given(v) => Some(v),
            Arg::Default => self.command.params.get(idx)?.default.as_ref(),
        }
    }

    fn type_error(&self, idx: usize, want: &str) -> anyhow::Error {
        let name = self
            .command
            .params
            .get(idx)
            .map_or("<missing>", |p| p.name.as_str());
        anyhow!(
            "argument {idx} ('{name}') of '{}' is not a {want}",
            self.command.qualified
        )
    }

    pub fn integer(&self, idx: usize) -> anyhow::Result<i64> {
        self.value(idx)
            .and_then(Value::as_integer)
            .ok_or_else(|| self.type_error(idx, "int"))
    }

    pub fn float(&self, idx: usize) -> anyhow::Result<f64> {
        self.value(idx)
            .and_then(Value::as_float)
            .ok_or_else(|| self.type_error(idx, "float"))
    }

    pub fn boolean(&self, idx: usize) -> anyhow::Result<bool> {
        self.value(idx)
            .and_then(Value::as_bool)
            .ok_or_else(|| self.type_error(idx, "bool"))
    }

    /// Text argument or enum variant name.
    pub fn text(&self, idx: usize) -> anyhow::Result<&str> {
        self.value(idx)
            .and_then(Value::as_str)
            .ok_or_else(|| self.type_error(idx, "string"))
    }

    /// Canonical enum variant name.
    pub fn variant(&self, idx: usize) -> anyhow::Result<&str> {
        match self.value(idx) {
            Some(Value::Enum(name)) => Ok(name),
            _ => Err(self.type_error(idx, "enum variant")),
        }
    }

    /// Tokens captured by the trailing variadic parameter; empty if none.
    pub fn rest(&self) -> &[String] {
        match self.args.last() {
            Some(Arg::Given(Value::List(items))) if self.command.has_variadic() => items,
            _ => &[],
        }
    }
}

impl fmt::Debug for Invocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("command", &self.command.qualified)
            .field("args", &self.args)
            .finish()
    }
}
