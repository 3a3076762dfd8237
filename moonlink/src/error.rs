//! Crate-level error types that do not belong to the actor runtime.
//!
//! Actor call failures live in [`ActorError`](crate::actors::ActorError);
//! this module holds input validation and startup configuration errors.

/// Bad input to the URL normalizer.
///
/// User-correctable and never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The input was missing, empty, or whitespace-only.
    #[error("the URL is null or empty (parameter `{parameter}`)")]
    EmptyInput {
        /// Name of the offending parameter.
        parameter: &'static str,
    },
}

/// The process cannot derive an unambiguous network identity.
///
/// Fatal at startup: the node must not join a cluster with a guessed
/// address or port.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// An exposed-ports list was declared with fewer than two ports.
    #[error("expected at least 2 exposed ports (peer, client), found {found}")]
    InsufficientPorts {
        /// Number of ports actually declared.
        found: usize,
    },

    /// A port value could not be parsed.
    #[error("invalid port in `{source_name}`: {value:?}")]
    InvalidPort {
        /// The signal or setting the value came from.
        source_name: String,
        /// The raw value.
        value: String,
    },

    /// An IP address value could not be parsed.
    #[error("invalid IP address in `{source_name}`: {value:?}")]
    InvalidAddress {
        /// The signal or setting the value came from.
        source_name: String,
        /// The raw value.
        value: String,
    },

    /// No bootstrap signal applied to this environment.
    #[error(
        "no usable network signal: set platform variables, exposed ports, \
         an [endpoint] section, or MOONLINK_ENVIRONMENT=Development"
    )]
    NoUsableSignal,
}
