//! Validation reporting.
//!
//! Validation collects every issue instead of stopping at the first one, so
//! the CLI can show a complete report.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Issue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks construction
    Error,
    /// Reported but allowed
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// One validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted path of the offending field, e.g. `failover.maxFailovers`
    pub field: String,
    /// What is wrong
    pub message: String,
    /// Severity
    pub severity: Severity,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// All issues found in a configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Issues in the order they were found
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Create an empty report
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error
    pub fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.push(field, message, Severity::Error);
    }

    /// Record a warning
    pub fn warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.push(field, message, Severity::Warning);
    }

    fn push(&mut self, field: impl Into<String>, message: impl Into<String>, severity: Severity) {
        self.issues.push(ValidationIssue {
            field: field.into(),
            message: message.into(),
            severity,
        });
    }

    /// Append another report, prefixing its field paths
    pub fn merge(&mut self, prefix: &str, other: Self) {
        for mut issue in other.issues {
            if !prefix.is_empty() {
                issue.field = format!("{prefix}.{}", issue.field);
            }
            self.issues.push(issue);
        }
    }

    /// Errors only
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    /// Warnings only
    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }

    /// Check if there are any errors
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Check if there are no issues at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let errors: Vec<String> = self.errors().map(ToString::to_string).collect();
        if errors.is_empty() {
            write!(f, "no errors")
        } else {
            write!(f, "{}", errors.join("; "))
        }
    }
}
