//! Capability variants and per-command filters.
//!
//! A session's capability is compared against a command's declared minimum
//! by rank; an optional [`Filter`] then allows or denies specific variants by
//! name. Either check failing is reported to the caller as "not found".

use std::borrow::Cow;
use std::fmt;

/// A privilege level a context belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Capability {
    name: Cow<'static, str>,
    rank: u16,
}

impl Capability {
    /// The least-privileged variant every session satisfies.
    pub const DEFAULT: Capability = Capability {
        name: Cow::Borrowed("default"),
        rank: 0,
    };

    /// The elevated variant.
    pub const ADMIN: Capability = Capability {
        name: Cow::Borrowed("admin"),
        rank: 100,
    };

    /// A custom variant. Names compare case-insensitively, so they are lowercased.
    pub fn new(name: impl AsRef<str>, rank: u16) -> Self {
        Self {
            name: Cow::Owned(name.as_ref().trim().to_ascii_lowercase()),
            rank,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rank(&self) -> u16 {
        self.rank
    }

    /// True when a session of this capability may reach commands requiring `required`.
    pub fn satisfies(&self, required: &Capability) -> bool {
        self.rank >= required.rank
    }
}

impl Default for Capability {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Only the listed variants may invoke the command.
    Allow,
    /// Every variant except the listed ones may invoke the command.
    Deny,
}

/// Allow/deny rule set keyed by capability name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    mode: FilterMode,
    names: Vec<String>,
}

impl Filter {
    pub fn allow<I: IntoIterator<Item = Capability>>(capabilities: I) -> Self {
        Self::build(FilterMode::Allow, capabilities)
    }

    pub fn deny<I: IntoIterator<Item = Capability>>(capabilities: I) -> Self {
        Self::build(FilterMode::Deny, capabilities)
    }

    fn build<I: IntoIterator<Item = Capability>>(mode: FilterMode, capabilities: I) -> Self {
        Self {
            mode,
            names: capabilities
                .into_iter()
                .map(|c| c.name().to_string())
                .collect(),
        }
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    /// Evaluate the rule set for a caller's runtime capability.
    pub fn permits(&self, capability: &Capability) -> bool {
        let listed = self.names.iter().any(|n| n == capability.name());
        match self.mode {
            FilterMode::Allow => listed,
            FilterMode::Deny => !listed,
        }
    }
}

/// Whether a caller of `caller` capability may invoke a command that requires
/// `required` and carries `filter`.
pub fn permits(required: &Capability, filter: Option<&Filter>, caller: &Capability) -> bool {
    caller.satisfies(required) && filter.is_none_or(|f| f.permits(caller))
}
