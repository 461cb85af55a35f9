//! Severity routing: decides whether formatted diagnostics surface as build
//! errors or build warnings. The policy is build-wide.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityPolicy {
    /// Deliver every diagnostic as a warning instead of an error.
    pub warn_only: bool,
}

impl SeverityPolicy {
    pub fn new(warn_only: bool) -> Self {
        Self { warn_only }
    }

    pub fn severity(&self) -> Severity {
        if self.warn_only {
            Severity::Warning
        } else {
            Severity::Error
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutedDiagnostics {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl RoutedDiagnostics {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// Split formatted diagnostics into errors and warnings. Text is never altered
/// and nothing is dropped.
pub fn route(formatted: Vec<String>, policy: &SeverityPolicy) -> RoutedDiagnostics {
    match policy.severity() {
        Severity::Error => RoutedDiagnostics {
            errors: formatted,
            warnings: vec![],
        },
        Severity::Warning => RoutedDiagnostics {
            errors: vec![],
            warnings: formatted,
        },
    }
}
