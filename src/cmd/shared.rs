/*!
shared.rs - state every subcommand starts from.

  - Session::open: console loaded with the demo declarations, session capability, config path
  - Session::context: a fresh invocation context with the session capability
  - load_config / save_config: optional convar file round trip
*/

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use devconsole::{Capability, Console, Context, OutputSink, persist};

use crate::demo;

pub struct Session {
    pub console: Arc<Console>,
    pub capability: Capability,
    pub config: Option<PathBuf>,
}

impl Session {
    pub fn open(admin: bool, config: Option<PathBuf>) -> Result<Self> {
        let console = Arc::new(Console::new());
        console
            .load(demo::declarations())
            .context("failed to register console declarations")?;
        let capability = if admin {
            Capability::ADMIN
        } else {
            Capability::DEFAULT
        };
        tracing::debug!(%capability, config = ?config, "session opened");
        Ok(Self {
            console,
            capability,
            config,
        })
    }

    pub fn context(&self, sink: impl OutputSink + 'static) -> Context {
        Context::new(self.capability.clone(), sink)
    }

    /// Apply the config file, if one is set and exists. Returns values applied.
    pub fn load_config(&self, ctx: &mut Context) -> Result<usize> {
        match &self.config {
            Some(path) if path.exists() => persist::load(path, &self.console, ctx),
            Some(path) => {
                tracing::debug!(file = %path.display(), "config file not present yet");
                Ok(0)
            }
            None => Ok(0),
        }
    }

    /// Write convars back to the config file, if one is set.
    pub fn save_config(&self) -> Result<usize> {
        match &self.config {
            Some(path) => persist::save(path, &self.console),
            None => Ok(0),
        }
    }
}
