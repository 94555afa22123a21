use thiserror::Error;

/// Reasons a PAC script is rejected by [`crate::ProxyResolver::compile`].
///
/// A rejected script never replaces the one that is already loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("script of {actual} bytes exceeds the {limit} byte limit")]
    TooLarge { limit: usize, actual: usize },
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("uncaught exception while loading script: {0}")]
    Exception(String),
    #[error("script does not define a FindProxyForURL function")]
    MissingEntryPoint,
    #[error("failed to prepare script context: {0}")]
    Setup(String),
}

/// Failure of a single [`crate::ProxyResolver::evaluate`] call.
///
/// None of these invalidate the loaded script.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("no PAC script is loaded")]
    NoScriptLoaded,
    #[error("script fault: {0}")]
    RuntimeFault(String),
    #[error("FindProxyForURL returned {found} instead of a string")]
    BadReturnType { found: String },
}

/// Failure reported by a [`crate::HostBindings`] capability.
///
/// The engine surfaces these to the script as thrown `Error` values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("host {0} could not be resolved")]
    NotFound(String),
    #[error("{0}")]
    Unavailable(String),
}
