//! Process status tracking.
//!
//! Every process and publish carries a tri-state outcome plus a
//! "not started" marker. Statuses are totally ordered so a chain of
//! processes reduces to its worst member.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when building a status from a raw code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    #[error("status code {0} is outside the range -1 to 2")]
    OutOfRange(i64),
}

/// Outcome of a process or publish.
///
/// Ordering follows the integer codes, so `min` picks the worst outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
#[repr(i8)]
pub enum ProcessStatus {
    /// `process()` has not been called yet
    #[default]
    NotStarted = -1,

    /// The process failed
    Failed = 0,

    /// The process completed with warnings
    Warning = 1,

    /// The process succeeded
    Succeeded = 2,
}

impl ProcessStatus {
    /// Integer code of this status.
    pub fn code(self) -> i8 {
        self as i8
    }

    /// Build a status from its integer code, rejecting anything outside -1..=2.
    pub fn from_code(code: i64) -> Result<Self, StatusError> {
        match code {
            -1 => Ok(ProcessStatus::NotStarted),
            0 => Ok(ProcessStatus::Failed),
            1 => Ok(ProcessStatus::Warning),
            2 => Ok(ProcessStatus::Succeeded),
            other => Err(StatusError::OutOfRange(other)),
        }
    }

    /// Reduce a sequence of statuses to its worst member.
    ///
    /// An empty sequence means nothing ran, so it reduces to `NotStarted`.
    pub fn aggregate<I>(statuses: I) -> ProcessStatus
    where
        I: IntoIterator<Item = ProcessStatus>,
    {
        statuses.into_iter().min().unwrap_or(ProcessStatus::NotStarted)
    }

    /// True for `Warning` and `Succeeded`.
    pub fn is_success(self) -> bool {
        self >= ProcessStatus::Warning
    }

    /// True once the process has produced an outcome.
    pub fn is_finished(self) -> bool {
        self != ProcessStatus::NotStarted
    }

    pub fn label(self) -> &'static str {
        match self {
            ProcessStatus::NotStarted => "not started",
            ProcessStatus::Failed => "failed",
            ProcessStatus::Warning => "succeeded with warnings",
            ProcessStatus::Succeeded => "succeeded",
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<ProcessStatus> for i8 {
    fn from(status: ProcessStatus) -> Self {
        status.code()
    }
}

impl TryFrom<i8> for ProcessStatus {
    type Error = StatusError;

    fn try_from(code: i8) -> Result<Self, Self::Error> {
        ProcessStatus::from_code(code as i64)
    }
}

/// A single message recorded while a process ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// `Warning` or `Failed`
    pub severity: ProcessStatus,

    pub message: String,
}

/// Status plus the diagnostics that produced it.
///
/// Every recorded diagnostic is logged under the report's target, so
/// each component owns its own log channel.
#[derive(Debug, Clone)]
pub struct StatusReport {
    target: &'static str,
    status: ProcessStatus,
    diagnostics: Vec<Diagnostic>,
}

impl StatusReport {
    /// Create a report that logs under `target`.
    pub fn new(target: &'static str) -> Self {
        Self {
            target,
            status: ProcessStatus::NotStarted,
            diagnostics: Vec::new(),
        }
    }

    pub fn target(&self) -> &'static str {
        self.target
    }

    pub fn status(&self) -> ProcessStatus {
        self.status
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Messages of every diagnostic, oldest first.
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.diagnostics.iter().map(|d| d.message.as_str())
    }

    /// Clear previous results before a new run.
    pub fn begin(&mut self) {
        self.status = ProcessStatus::NotStarted;
        self.diagnostics.clear();
    }

    /// Record a warning. The final status is capped at `Warning`.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!(target: self.target, "{}", message);
        self.diagnostics.push(Diagnostic {
            severity: ProcessStatus::Warning,
            message,
        });
    }

    /// Record a failure and mark the report `Failed`.
    pub fn fail(&mut self, message: impl Into<String>) -> ProcessStatus {
        let message = message.into();
        log::error!(target: self.target, "{}", message);
        self.diagnostics.push(Diagnostic {
            severity: ProcessStatus::Failed,
            message,
        });
        self.status = ProcessStatus::Failed;
        self.status
    }

    /// Close the run: the status becomes the worst recorded diagnostic,
    /// or `Succeeded` when nothing was recorded.
    pub fn finish(&mut self) -> ProcessStatus {
        self.status = ProcessStatus::aggregate(
            std::iter::once(ProcessStatus::Succeeded)
                .chain(self.diagnostics.iter().map(|d| d.severity)),
        );
        self.status
    }

    /// Assign a status directly, e.g. one aggregated from sub-processes.
    pub fn set(&mut self, status: ProcessStatus) -> ProcessStatus {
        self.status = status;
        self.status
    }

    /// Assign a status from a raw code.
    pub fn set_code(&mut self, code: i64) -> Result<ProcessStatus, StatusError> {
        let status = ProcessStatus::from_code(code)?;
        Ok(self.set(status))
    }

    /// Copy the diagnostics of a sub-process into this report.
    pub fn absorb(&mut self, other: &StatusReport) {
        self.diagnostics.extend(other.diagnostics.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_follows_codes() {
        assert!(ProcessStatus::NotStarted < ProcessStatus::Failed);
        assert!(ProcessStatus::Failed < ProcessStatus::Warning);
        assert!(ProcessStatus::Warning < ProcessStatus::Succeeded);
        assert_eq!(ProcessStatus::Warning.code(), 1);
    }

    #[test]
    fn test_default_is_not_started() {
        assert_eq!(ProcessStatus::default(), ProcessStatus::NotStarted);
        assert!(!ProcessStatus::default().is_finished());
    }

    #[test]
    fn test_aggregate_is_minimum() {
        use ProcessStatus::*;
        assert_eq!(ProcessStatus::aggregate([Succeeded, Warning]), Warning);
        assert_eq!(ProcessStatus::aggregate([Failed, Succeeded]), Failed);
        assert_eq!(ProcessStatus::aggregate([Succeeded, Succeeded]), Succeeded);
        assert_eq!(ProcessStatus::aggregate([Warning, Failed, Succeeded]), Failed);
        assert_eq!(ProcessStatus::aggregate(Vec::new()), NotStarted);
    }

    #[test]
    fn test_out_of_range_code_rejected() {
        assert_eq!(ProcessStatus::from_code(3), Err(StatusError::OutOfRange(3)));
        assert_eq!(ProcessStatus::from_code(-2), Err(StatusError::OutOfRange(-2)));
        assert_eq!(ProcessStatus::try_from(2i8), Ok(ProcessStatus::Succeeded));

        let mut report = StatusReport::new("test");
        assert!(report.set_code(7).is_err());
        assert_eq!(report.status(), ProcessStatus::NotStarted);
    }

    #[test]
    fn test_serde_uses_codes() {
        let json = serde_json::to_string(&ProcessStatus::Warning).unwrap();
        assert_eq!(json, "1");

        let parsed: ProcessStatus = serde_json::from_str("0").unwrap();
        assert_eq!(parsed, ProcessStatus::Failed);

        assert!(serde_json::from_str::<ProcessStatus>("5").is_err());
    }

    #[test]
    fn test_report_lifecycle() {
        let mut report = StatusReport::new("test");
        assert_eq!(report.status(), ProcessStatus::NotStarted);

        report.begin();
        report.warn("path derived from scene");
        assert_eq!(report.finish(), ProcessStatus::Warning);
        assert_eq!(report.diagnostics().len(), 1);

        report.begin();
        assert_eq!(report.finish(), ProcessStatus::Succeeded);
        assert!(report.diagnostics().is_empty());

        report.begin();
        report.warn("minor");
        assert_eq!(report.fail("root missing"), ProcessStatus::Failed);
        assert_eq!(report.finish(), ProcessStatus::Failed);
        assert_eq!(report.messages().collect::<Vec<_>>(), vec!["minor", "root missing"]);
    }
}
