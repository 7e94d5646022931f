//! Convars: named, typed, mutable runtime variables.
//!
//! A convar's value lives in a pluggable [`ConvarBacking`]: a free-standing
//! [`Slot`] or a [`Bound`] getter/setter pair over state the host owns (for
//! instance a `static` atomic). The store itself adds no synchronisation
//! around assignments; concurrent writers to one convar must serialise
//! themselves.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::context::Context;
use super::error::{ConversionError, DispatchError, RegistrationError};
use super::tokenize::qualify;
use super::value::{EnumType, Value, ValueKind, coerce, normalise};

/// Where a convar's current value is kept.
pub trait ConvarBacking: Send + Sync {
    /// The explicitly assigned value, or `None` when the default applies.
    fn load(&self) -> Option<Value>;

    fn store(&self, value: Value);

    /// Return to the default value.
    fn reset(&self, default: &Value) {
        self.store(default.clone());
    }
}

/// Free-standing typed slot. Empty until first assignment.
#[derive(Debug, Default)]
pub struct Slot {
    value: Mutex<Option<Value>>,
}

impl Slot {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConvarBacking for Slot {
    fn load(&self) -> Option<Value> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store(&self, value: Value) {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    fn reset(&self, _default: &Value) {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

type Getter = Box<dyn Fn() -> Value + Send + Sync>;
type Setter = Box<dyn Fn(Value) + Send + Sync>;

/// Getter/setter pair bound to state owned elsewhere.
pub struct Bound {
    get: Getter,
    set: Setter,
}

impl Bound {
    pub fn new(
        get: impl Fn() -> Value + Send + Sync + 'static,
        set: impl Fn(Value) + Send + Sync + 'static,
    ) -> Self {
        Self {
            get: Box::new(get),
            set: Box::new(set),
        }
    }

    pub fn atomic_bool(cell: Arc<AtomicBool>) -> Self {
        let reader = Arc::clone(&cell);
        Self::new(
            move || Value::Boolean(reader.load(Ordering::Relaxed)),
            move |v| {
                if let Some(b) = v.as_bool() {
                    cell.store(b, Ordering::Relaxed);
                }
            },
        )
    }

    pub fn atomic_i64(cell: Arc<AtomicI64>) -> Self {
        let reader = Arc::clone(&cell);
        Self::new(
            move || Value::Integer(reader.load(Ordering::Relaxed)),
            move |v| {
                if let Some(n) = v.as_integer() {
                    cell.store(n, Ordering::Relaxed);
                }
            },
        )
    }
}

impl ConvarBacking for Bound {
    fn load(&self) -> Option<Value> {
        Some((self.get)())
    }

    fn store(&self, value: Value) {
        (self.set)(value)
    }
}

impl fmt::Debug for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Bound { .. }")
    }
}

/// Plain-data convar declaration, as handed over by a discovery collaborator.
pub struct ConvarDecl {
    name: String,
    description: String,
    category: String,
    kind: ValueKind,
    default: Value,
    backing: Option<Box<dyn ConvarBacking>>,
}

impl ConvarDecl {
    pub fn new(name: impl Into<String>, kind: ValueKind, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            category: String::new(),
            kind,
            default: default.into(),
            backing: None,
        }
    }

    pub fn integer(name: impl Into<String>, default: i64) -> Self {
        Self::new(name, ValueKind::Integer, default)
    }

    pub fn float(name: impl Into<String>, default: f64) -> Self {
        Self::new(name, ValueKind::Float, default)
    }

    pub fn boolean(name: impl Into<String>, default: bool) -> Self {
        Self::new(name, ValueKind::Boolean, default)
    }

    pub fn text(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Text, default.into())
    }

    pub fn choice(name: impl Into<String>, ty: EnumType, default: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Enum(ty), Value::Enum(default.into()))
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn backed_by(mut self, backing: impl ConvarBacking + 'static) -> Self {
        self.backing = Some(Box::new(backing));
        self
    }

    pub fn qualified_name(&self) -> String {
        qualify(&self.category, &self.name).to_ascii_lowercase()
    }
}

/// A registered convar.
pub struct Convar {
    name: String,
    description: String,
    category: String,
    qualified: String,
    kind: ValueKind,
    default: Value,
    backing: Box<dyn ConvarBacking>,
}

impl Convar {
    /// Validate a declaration. Uniqueness is checked by the owning store.
    pub(crate) fn from_decl(decl: ConvarDecl) -> Result<Self, RegistrationError> {
        let qualified = super::validate_identity(&decl.name, &decl.category)?;
        if let ValueKind::Enum(ty) = &decl.kind
            && ty.variants().is_empty()
        {
            return Err(RegistrationError::EmptyEnum {
                owner: qualified,
                type_name: ty.name().to_string(),
            });
        }
        let default = normalise(&decl.kind, decl.default).ok_or_else(|| {
            RegistrationError::DefaultMismatch {
                owner: qualified.clone(),
                param: decl.name.clone(),
                expected: decl.kind.to_string(),
            }
        })?;
        Ok(Self {
            name: decl.name,
            description: decl.description,
            category: decl.category.to_ascii_lowercase(),
            qualified,
            kind: decl.kind,
            default,
            backing: decl.backing.unwrap_or_else(|| Box::new(Slot::new())),
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

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    /// Current value; the default when nothing has been assigned.
    pub fn value(&self) -> Value {
        self.backing.load().unwrap_or_else(|| self.default.clone())
    }

    /// Assign a typed value. Integers widen into float convars and
    /// enum variants are matched by name.
    pub fn set_value(&self, value: impl Into<Value>) -> Result<(), ConversionError> {
        let value = value.into();
        match normalise(&self.kind, value.clone()) {
            Some(v) => {
                self.backing.store(v);
                Ok(())
            }
            None => Err(ConversionError {
                token: value.to_string(),
                expected: self.kind.to_string(),
            }),
        }
    }

    /// Assign from text. On a conversion failure the convar is driven to its
    /// type's zero value and the failure is returned for reporting.
    pub fn assign(&self, text: &str) -> Result<Value, ConversionError> {
        match coerce(text, &self.kind) {
            Ok(v) => {
                self.backing.store(v.clone());
                Ok(v)
            }
            Err(e) => {
                self.backing.store(self.kind.zero());
                Err(e)
            }
        }
    }

    pub fn reset(&self) {
        self.backing.reset(&self.default);
    }

    pub fn is_default(&self) -> bool {
        self.value() == self.default
    }
}

impl fmt::Debug for Convar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Convar")
            .field("qualified", &self.qualified)
            .field("kind", &self.kind)
            .field("value", &self.value())
            .finish_non_exhaustive()
    }
}

/// Assign `text` to `convar`, reporting a conversion failure to `ctx`.
pub(crate) fn assign_reporting(convar: &Convar, ctx: &mut Context, text: &str) -> bool {
    match convar.assign(text) {
        Ok(_) => true,
        Err(source) => {
            tracing::warn!(convar = convar.qualified_name(), error = %source, "convar reset to zero value");
            ctx.error(
                DispatchError::Conversion {
                    command: convar.qualified_name().to_string(),
                    param: convar.name().to_string(),
                    source,
                }
                .to_string(),
            );
            false
        }
    }
}

/// Convars keyed by lowercased qualified name.
#[derive(Clone, Default)]
pub struct ConvarStore {
    vars: HashMap<String, Arc<Convar>>,
}

impl ConvarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a declaration.
    pub fn register(&mut self, decl: ConvarDecl) -> Result<Arc<Convar>, RegistrationError> {
        let convar = Arc::new(Convar::from_decl(decl)?);
        self.insert(Arc::clone(&convar))?;
        Ok(convar)
    }

    pub(crate) fn insert(&mut self, convar: Arc<Convar>) -> Result<(), RegistrationError> {
        let key = convar.qualified_name().to_string();
        if self.vars.contains_key(&key) {
            return Err(RegistrationError::Duplicate { name: key });
        }
        tracing::debug!(convar = %key, "registered convar");
        self.vars.insert(key, convar);
        Ok(())
    }

    /// Exact lookup by qualified name (case-insensitive).
    pub fn get(&self, qualified: &str) -> Option<&Arc<Convar>> {
        self.vars.get(&qualified.to_ascii_lowercase())
    }

    /// Resolve `name` as seen from `category`.
    ///
    /// A leading `$` makes the name absolute. Otherwise `category.name` is
    /// tried first, then the bare `name`.
    pub fn resolve(&self, name: &str, category: &str) -> Option<&Arc<Convar>> {
        if let Some(absolute) = name.strip_prefix('$') {
            return self.get(absolute);
        }
        if !category.is_empty()
            && let Some(found) = self.get(&qualify(category, name))
        {
            return Some(found);
        }
        self.get(name)
    }

    /// Read a value by name from `category`; `None` if unresolved.
    pub fn value(&self, name: &str, category: &str) -> Option<Value> {
        self.resolve(name, category).map(|c| c.value())
    }

    /// Assign from text, resolving `name` against the context's category.
    /// Every failure is reported to `ctx` rather than returned.
    pub fn set(&self, ctx: &mut Context, name: &str, text: &str) -> bool {
        let Some(convar) = self.resolve(name, ctx.category()) else {
            ctx.error(
                DispatchError::NotFound {
                    name: name.to_string(),
                }
                .to_string(),
            );
            return false;
        };
        assign_reporting(convar, ctx, text)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// All convars ordered by qualified name.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Convar>> {
        let mut all: Vec<_> = self.vars.values().collect();
        all.sort_by(|a, b| a.qualified_name().cmp(b.qualified_name()));
        all.into_iter()
    }

    pub fn contains(&self, qualified: &str) -> bool {
        self.get(qualified).is_some()
    }
}

impl fmt::Debug for ConvarStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
