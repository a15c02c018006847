//! Existing-target policy resolution.
//! Pure decision: given whether the target exists and the configured policy,
//! say what the store pipeline must do before writing.

use crate::config::ConflictPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Write normally (create or truncate).
    ProceedWrite,
    /// Leave the target as-is and report success.
    SkipAsSuccess,
    /// Abort with a conflict error; nothing is written.
    Fail,
    /// Relocate the existing target, then write.
    MoveThenProceed,
    /// Open in append mode (creates the file when missing).
    AppendAtEnd,
    /// Truncate the existing target and write.
    OverrideTruncate,
}

impl Action {
    /// Whether the write must open the target in append mode.
    pub fn appends(self) -> bool {
        self == Action::AppendAtEnd
    }
}

pub fn resolve(target_exists: bool, policy: ConflictPolicy) -> Action {
    if !target_exists {
        return match policy {
            ConflictPolicy::Append => Action::AppendAtEnd,
            _ => Action::ProceedWrite,
        };
    }
    match policy {
        ConflictPolicy::Ignore => Action::SkipAsSuccess,
        ConflictPolicy::Fail => Action::Fail,
        ConflictPolicy::Move => Action::MoveThenProceed,
        ConflictPolicy::Append => Action::AppendAtEnd,
        ConflictPolicy::Override => Action::OverrideTruncate,
    }
}
