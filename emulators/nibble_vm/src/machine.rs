use crate::error::Fault;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum Status {
    Running,
    Halted(HaltReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    /// The program reached its own end condition.
    Finished,
    Fault(Fault),
}

impl Status {
    pub fn is_running(&self) -> bool {
        matches!(self, Status::Running)
    }

    pub fn is_halted(&self) -> bool {
        !self.is_running()
    }

    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Status::Halted(HaltReason::Fault(fault)) => Some(fault),
            _ => None,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Running => f.write_str("running"),
            Status::Halted(HaltReason::Finished) => f.write_str("halted (finished)"),
            Status::Halted(HaltReason::Fault(fault)) => write!(f, "halted ({fault})"),
        }
    }
}

/// A steppable machine. `step` performs exactly one transition; once halted
/// it keeps returning the same status without touching state.
pub trait Machine {
    type Snapshot: Clone + Serialize;

    fn step(&mut self) -> Status;

    fn status(&self) -> &Status;

    /// Power-on state with the loaded program kept.
    fn reset(&mut self);

    fn snapshot(&self) -> Self::Snapshot;
}
