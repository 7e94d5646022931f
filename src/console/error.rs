//! Error taxonomy for the console core.
//!
//! Dispatch-time failures ([`DispatchError`]) are always reported through the
//! caller's output sink and never unwind past the dispatcher, except for
//! [`DispatchError::Execution`] when strict mode is on. Registration failures
//! ([`RegistrationError`]) are programming errors and are returned to the
//! loader straight away.

use thiserror::Error;

/// A token could not be coerced into the requested value type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert '{token}' to {expected}")]
pub struct ConversionError {
    /// The offending token, verbatim.
    pub token: String,
    /// Human-readable name of the target type.
    pub expected: String,
}

/// A category scope that is not a valid dotted path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid category '{category}': {reason}")]
pub struct InvalidCategory {
    /// The rejected category text.
    pub category: String,
    /// What is wrong with it.
    pub reason: &'static str,
}

/// Failures raised while resolving, binding or running one invocation.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Unknown qualified name, or a command the caller may not reach.
    #[error("not found: {name}")]
    NotFound {
        /// The resolved qualified name that was looked up.
        name: String,
    },

    /// Too few (or too many) tokens for the declared parameter list.
    #[error("parameter count mismatch for '{command}': expected {expected}, got {got}")]
    ArityMismatch {
        /// Qualified name of the command or convar.
        command: String,
        /// Accepted arity, rendered for humans (`2`, `1..3`, `1+`).
        expected: String,
        /// Number of argument tokens supplied.
        got: usize,
    },

    /// An argument token did not convert to its parameter type.
    #[error("invalid value for parameter '{param}' of '{command}': {source}")]
    Conversion {
        /// Qualified name of the command or convar.
        command: String,
        /// Parameter (or convar) name.
        param: String,
        /// Underlying conversion failure.
        #[source]
        source: ConversionError,
    },

    /// A `{name}` reference named no convar.
    #[error("convar substitution failed: {name} is not defined")]
    Substitution {
        /// The name between the braces.
        name: String,
    },

    /// The bound callable itself returned an error.
    #[error("error executing '{command}': {error:#}")]
    Execution {
        /// Qualified name of the command.
        command: String,
        /// Error returned by the callable, with its context chain.
        error: anyhow::Error,
    },
}

impl DispatchError {
    /// Short machine-friendly label for the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::NotFound { .. } => "not_found",
            DispatchError::ArityMismatch { .. } => "arity_mismatch",
            DispatchError::Conversion { .. } => "conversion",
            DispatchError::Substitution { .. } => "substitution",
            DispatchError::Execution { .. } => "execution",
        }
    }
}

/// A malformed command or convar declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// Another command or convar already owns this qualified name.
    #[error("duplicate definition: '{name}' is already registered")]
    Duplicate {
        /// The colliding qualified name.
        name: String,
    },

    /// Name or category is empty, contains whitespace or reserved characters.
    #[error("invalid name '{name}': {reason}")]
    InvalidName {
        /// The offending name or category.
        name: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// The declared context capability is not known to the console.
    #[error("'{command}' requires unknown capability '{capability}'")]
    UnknownCapability {
        /// Qualified command name.
        command: String,
        /// Capability name as declared.
        capability: String,
    },

    /// A variadic parameter appears before the last position.
    #[error("'{command}': variadic parameter '{param}' must be the last parameter")]
    VariadicNotLast {
        /// Qualified command name.
        command: String,
        /// Offending parameter.
        param: String,
    },

    /// More than one variadic parameter was declared.
    #[error("'{command}' declares more than one variadic parameter")]
    MultipleVariadic {
        /// Qualified command name.
        command: String,
    },

    /// A required parameter follows an optional one.
    #[error("'{command}': required parameter '{param}' follows an optional parameter")]
    RequiredAfterOptional {
        /// Qualified command name.
        command: String,
        /// Offending parameter.
        param: String,
    },

    /// A default value does not have the parameter's (or convar's) type.
    #[error("'{owner}': default for '{param}' is not a valid {expected}")]
    DefaultMismatch {
        /// Qualified command or convar name.
        owner: String,
        /// Parameter name (or the convar name).
        param: String,
        /// Expected type name.
        expected: String,
    },

    /// An enumeration type was declared without variants.
    #[error("'{owner}': enum type '{type_name}' has no variants")]
    EmptyEnum {
        /// Qualified command or convar name.
        owner: String,
        /// The enum type name.
        type_name: String,
    },

    /// The filter denies the command's own minimum capability.
    #[error("'{command}': filter denies its own required capability '{capability}'")]
    SelfRejectingFilter {
        /// Qualified command name.
        command: String,
        /// The required capability the filter rejects.
        capability: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_single_line() {
        let errors = [
            DispatchError::NotFound { name: "physics.jump".into() },
            DispatchError::ArityMismatch {
                command: "jump".into(),
                expected: "1..2".into(),
                got: 0,
            },
            DispatchError::Substitution { name: "speed".into() },
        ];
        for e in errors {
            assert!(!e.to_string().contains('\n'), "{e}");
        }
    }

    #[test]
    fn execution_message_includes_cause_chain() {
        let error = anyhow::anyhow!("disk full").context("writing save");
        let err = DispatchError::Execution {
            command: "save".into(),
            error,
        };
        let msg = err.to_string();
        assert!(msg.contains("writing save"));
        assert!(msg.contains("disk full"));
        assert_eq!(err.kind(), "execution");
    }
}
