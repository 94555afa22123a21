use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

/// Area of the engine a log event or diagnostic originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacDomain {
    Runtime,
    Compile,
    Evaluate,
    Binding,
    Script,
}

impl PacDomain {
    pub fn as_str(self) -> &'static str {
        match self {
            PacDomain::Runtime => "pac.runtime",
            PacDomain::Compile => "pac.compile",
            PacDomain::Evaluate => "pac.evaluate",
            PacDomain::Binding => "pac.binding",
            PacDomain::Script => "pac.script",
        }
    }
}

impl fmt::Display for PacDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver for notifications raised while a script runs.
///
/// `on_alert` carries the text a script passed to `alert()`; `on_error`
/// carries compile and runtime failure descriptions. Both are
/// fire-and-forget and are only invoked from the thread holding the
/// interpreter guard.
pub trait DiagnosticsSink {
    fn on_alert(&self, message: &str);
    fn on_error(&self, message: &str);
}

impl<T: DiagnosticsSink + ?Sized> DiagnosticsSink for Rc<T> {
    fn on_alert(&self, message: &str) {
        (**self).on_alert(message)
    }

    fn on_error(&self, message: &str) {
        (**self).on_error(message)
    }
}

impl<T: DiagnosticsSink + ?Sized> DiagnosticsSink for Arc<T> {
    fn on_alert(&self, message: &str) {
        (**self).on_alert(message)
    }

    fn on_error(&self, message: &str) {
        (**self).on_error(message)
    }
}

/// Forwards script diagnostics to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn on_alert(&self, message: &str) {
        info!(domain = %PacDomain::Script, "{message}");
    }

    fn on_error(&self, message: &str) {
        warn!(domain = %PacDomain::Script, "{message}");
    }
}

/// Keeps every notification in memory, in arrival order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    alerts: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear(&self) {
        self.alerts.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.errors.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl DiagnosticsSink for CollectingSink {
    fn on_alert(&self, message: &str) {
        self.alerts.lock().unwrap_or_else(PoisonError::into_inner).push(message.to_string());
    }

    fn on_error(&self, message: &str) {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner).push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collecting_sink_keeps_order() {
        let sink = Arc::new(CollectingSink::new());
        let shared: Arc<dyn DiagnosticsSink> = sink.clone();
        shared.on_alert("first");
        shared.on_error("broken");
        shared.on_alert("second");
        assert_eq!(sink.alerts(), vec!["first".to_string(), "second".to_string()]);
        assert_eq!(sink.errors(), vec!["broken".to_string()]);
        sink.clear();
        assert!(sink.alerts().is_empty());
    }

    #[test]
    fn domain_labels_are_dotted() {
        assert_eq!(PacDomain::Binding.to_string(), "pac.binding");
        assert_eq!(PacDomain::Runtime.as_str(), "pac.runtime");
    }
}
