//! Structured record of failures seen during a run

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::VisionaryError;

/// Failure category. Variants are ordered by increasing severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    Timeout,
    Device,
    ProtocolViolation,
    Authentication,
    Configuration,
    Connectivity,
}

impl From<&VisionaryError> for FailureKind {
    fn from(error: &VisionaryError) -> Self {
        match error {
            VisionaryError::Connection { .. } => FailureKind::Connectivity,
            VisionaryError::Timeout { .. } => FailureKind::Timeout,
            VisionaryError::Protocol { .. } | VisionaryError::TruncatedPayload { .. } => {
                FailureKind::ProtocolViolation
            }
            VisionaryError::Device { .. } => FailureKind::Device,
            VisionaryError::Authentication { .. } => FailureKind::Authentication,
            VisionaryError::InvalidCommand { .. }
            | VisionaryError::Config { .. }
            | VisionaryError::File { .. } => FailureKind::Configuration,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Device => "device error",
            FailureKind::ProtocolViolation => "protocol violation",
            FailureKind::Authentication => "authentication",
            FailureKind::Configuration => "configuration",
            FailureKind::Connectivity => "connectivity",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    /// Where the failure happened, e.g. the command or operation name
    pub context: String,
    pub occurrences: u32,
}

/// Ordered list of distinct failures.
///
/// Recording the same kind and context again bumps its occurrence count, so a
/// failure repeated every frame stays one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureLog {
    failures: Vec<Failure>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: FailureKind, context: impl Into<String>) {
        let context = context.into();
        match self.failures.iter_mut().find(|f| f.kind == kind && f.context == context) {
            Some(existing) => existing.occurrences = existing.occurrences.saturating_add(1),
            None => self.failures.push(Failure { kind, context, occurrences: 1 }),
        }
    }

    pub fn record_error(&mut self, context: impl Into<String>, error: &VisionaryError) {
        self.record(FailureKind::from(error), context);
    }

    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    /// Most severe kind recorded, `None` when the log is empty.
    pub fn most_severe(&self) -> Option<FailureKind> {
        self.failures.iter().map(|f| f.kind).max()
    }

    pub fn total_occurrences(&self) -> u64 {
        self.failures.iter().map(|f| u64::from(f.occurrences)).sum()
    }

    /// Append the entries of another log, merging duplicates.
    pub fn merge(&mut self, other: FailureLog) {
        for failure in other.failures {
            match self
                .failures
                .iter_mut()
                .find(|f| f.kind == failure.kind && f.context == failure.context)
            {
                Some(existing) => {
                    existing.occurrences = existing.occurrences.saturating_add(failure.occurrences)
                }
                None => self.failures.push(failure),
            }
        }
    }
}

impl fmt::Display for FailureLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failures.is_empty() {
            return f.write_str("no failures");
        }
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{} in {} (x{})", failure.kind, failure.context, failure.occurrences)?;
        }
        Ok(())
    }
}
