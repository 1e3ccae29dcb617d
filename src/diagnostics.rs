// ABOUTME: Diagnostics accumulator for non-fatal warnings during a run.
// ABOUTME: Collects degradations that shouldn't fail the run but must surface.

use parking_lot::Mutex;

use crate::topology::MergeWarning;

/// Collects non-fatal warnings during orchestrator operations. Shared by
/// reference across concurrent deploy tasks.
#[derive(Default)]
pub struct Diagnostics {
    warnings: Mutex<Vec<Warning>>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.lock().push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings.lock().clone()
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.lock().is_empty()
    }
}

/// A non-fatal warning collected during a run.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// A merge degradation, currently always a port reassignment.
    pub fn merge(warning: &MergeWarning) -> Self {
        Self {
            kind: WarningKind::PortReassigned,
            message: warning.to_string(),
        }
    }

    /// A post-deploy or on-error hook that failed.
    pub fn hook_failure(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::HookFailure,
            message: message.into(),
        }
    }

    /// Failed to cleanly disconnect an SSH session.
    pub fn ssh_disconnect(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::SshDisconnect,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// The merger moved a service off its requested port.
    PortReassigned,
    /// A non-fatal lifecycle hook failed.
    HookFailure,
    /// Failed to cleanly disconnect SSH session.
    SshDisconnect,
}
