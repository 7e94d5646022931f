//! Invocation sessions and their output channel.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use super::access::Capability;
use super::error::InvalidCategory;

/// Severity of a console message; rendering is up to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    /// Input echoed back while `console.echo` is on.
    Echo,
    Warning,
    Error,
}

/// One reported outcome or line of command output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub level: Level,
    pub text: String,
}

impl Message {
    pub fn new(level: Level, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Destination for everything a session reports.
pub trait OutputSink: Send {
    fn emit(&mut self, message: Message);
}

impl<F> OutputSink for F
where
    F: FnMut(&Message) + Send,
{
    fn emit(&mut self, message: Message) {
        self(&message)
    }
}

/// Collects messages in memory. Clones share the same buffer, so one handle
/// can go into a [`Context`] while another is inspected.
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    messages: Arc<Mutex<Vec<Message>>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn messages(&self) -> Vec<Message> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.text).collect()
    }

    /// Drain the buffer.
    pub fn take(&self) -> Vec<Message> {
        std::mem::take(&mut *self.messages.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// True if any message at `level` contains `needle`.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.messages()
            .iter()
            .any(|m| m.level == level && m.text.contains(needle))
    }
}

impl OutputSink for BufferSink {
    fn emit(&mut self, message: Message) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }
}

/// Forwards messages to `tracing` under the `devconsole::output` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl OutputSink for TracingSink {
    fn emit(&mut self, message: Message) {
        match message.level {
            Level::Info | Level::Echo => {
                tracing::info!(target: "devconsole::output", "{}", message.text)
            }
            Level::Warning => tracing::warn!(target: "devconsole::output", "{}", message.text),
            Level::Error => tracing::error!(target: "devconsole::output", "{}", message.text),
        }
    }
}

/// Check that `path` is empty or a dot-separated list of identifier segments.
pub(crate) fn check_path(path: &str) -> Result<(), &'static str> {
    if path.is_empty() {
        return Ok(());
    }
    for segment in path.split('.') {
        if segment.is_empty() {
            return Err("empty segment");
        }
        if !segment
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            return Err("segments may only contain letters, digits, '_' and '-'");
        }
    }
    Ok(())
}

/// A per-session handle: category scope, capability and output sink.
pub struct Context {
    category: String,
    capability: Capability,
    sink: Box<dyn OutputSink>,
}

impl Context {
    pub fn new(capability: Capability, sink: impl OutputSink + 'static) -> Self {
        Self {
            category: String::new(),
            capability,
            sink: Box::new(sink),
        }
    }

    /// Least-privileged session.
    pub fn standard(sink: impl OutputSink + 'static) -> Self {
        Self::new(Capability::DEFAULT, sink)
    }

    /// Elevated session.
    pub fn admin(sink: impl OutputSink + 'static) -> Self {
        Self::new(Capability::ADMIN, sink)
    }

    pub fn with_category(mut self, category: &str) -> Result<Self, InvalidCategory> {
        self.set_category(category)?;
        Ok(self)
    }

    /// Current scope; empty means root.
    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn set_category(&mut self, category: &str) -> Result<(), InvalidCategory> {
        let category = category.trim();
        check_path(category).map_err(|reason| InvalidCategory {
            category: category.to_string(),
            reason,
        })?;
        self.category = category.to_ascii_lowercase();
        Ok(())
    }

    pub fn reset_category(&mut self) {
        self.category.clear();
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    pub fn emit(&mut self, message: Message) {
        self.sink.emit(message);
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.emit(Message::new(Level::Info, text));
    }

    pub fn warn(&mut self, text: impl Into<String>) {
        self.emit(Message::new(Level::Warning, text));
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.emit(Message::new(Level::Error, text));
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("category", &self.category)
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}
