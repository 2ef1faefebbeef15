//! Loops around [`Machine::step`]. Timing and presentation stay with the
//! caller; these helpers only bound how many steps are taken.

use crate::machine::{HaltReason, Machine, Status};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Halted { reason: HaltReason, steps: u64 },
    /// The budget ran out while the machine was still running.
    BudgetExceeded { steps: u64 },
}

impl RunOutcome {
    pub fn steps(&self) -> u64 {
        match self {
            RunOutcome::Halted { steps, .. } | RunOutcome::BudgetExceeded { steps } => *steps,
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            RunOutcome::Halted {
                reason: HaltReason::Fault(_),
                ..
            }
        )
    }
}

/// Step until the machine halts or `max_steps` transitions were made.
pub fn run<M: Machine>(machine: &mut M, max_steps: u64) -> RunOutcome {
    if let Status::Halted(reason) = machine.status() {
        return RunOutcome::Halted {
            reason: reason.clone(),
            steps: 0,
        };
    }
    for taken in 1..=max_steps {
        if let Status::Halted(reason) = machine.step() {
            return RunOutcome::Halted {
                reason,
                steps: taken,
            };
        }
    }
    tracing::debug!(max_steps, "step budget exhausted");
    RunOutcome::BudgetExceeded { steps: max_steps }
}

/// Lazy snapshot sequence: the current state first, then one snapshot per
/// step until halt or until `max_steps` steps were taken.
pub struct Trace<'a, M: Machine> {
    machine: &'a mut M,
    remaining: u64,
    started: bool,
}

pub fn trace<M: Machine>(machine: &mut M, max_steps: u64) -> Trace<'_, M> {
    Trace {
        machine,
        remaining: max_steps,
        started: false,
    }
}

impl<M: Machine> Iterator for Trace<'_, M> {
    type Item = M::Snapshot;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.started = true;
            return Some(self.machine.snapshot());
        }
        if self.remaining == 0 || self.machine.status().is_halted() {
            return None;
        }
        self.remaining -= 1;
        self.machine.step();
        Some(self.machine.snapshot())
    }
}
