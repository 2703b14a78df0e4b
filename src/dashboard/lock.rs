//! Mutual exclusion over the mutating grid operations

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use log::debug;
use serde::{Deserialize, Serialize};

/// A user-triggered call that changes remote state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Stop,
    Cancel,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Create => "create",
            Operation::Stop => "stop",
            Operation::Cancel => "cancel",
        };
        f.write_str(s)
    }
}

/// Current value of the operation lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockState {
    Idle,
    Create,
    Stop,
    Cancel,
}

impl From<Operation> for LockState {
    fn from(op: Operation) -> Self {
        match op {
            Operation::Create => LockState::Create,
            Operation::Stop => LockState::Stop,
            Operation::Cancel => LockState::Cancel,
        }
    }
}

impl LockState {
    pub fn operation(&self) -> Option<Operation> {
        match self {
            LockState::Idle => None,
            LockState::Create => Some(Operation::Create),
            LockState::Stop => Some(Operation::Stop),
            LockState::Cancel => Some(Operation::Cancel),
        }
    }
}

/// Allows at most one mutating operation in flight.
///
/// `begin`/`end` are the raw transitions; `try_acquire` hands out a guard
/// that returns the lock to idle when dropped, so early returns, `?`,
/// panics and dropped futures all release it.
#[derive(Debug)]
pub struct OperationLock {
    state: Mutex<LockState>,
}

impl Default for OperationLock {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationLock {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LockState::Idle),
        }
    }

    // Nothing panics while holding the slot; recover the value if it ever does.
    fn slot(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Transition `idle -> op`. Returns false if anything else is in flight.
    pub fn begin(&self, op: Operation) -> bool {
        let mut state = self.slot();
        if *state != LockState::Idle {
            debug!("Refusing {} while {:?} is in flight", op, *state);
            return false;
        }
        *state = op.into();
        true
    }

    /// Return to idle unconditionally
    pub fn end(&self) {
        *self.slot() = LockState::Idle;
    }

    pub fn state(&self) -> LockState {
        *self.slot()
    }

    pub fn is_idle(&self) -> bool {
        self.state() == LockState::Idle
    }

    /// Scoped form of `begin`
    pub fn try_acquire(&self, op: Operation) -> Option<OperationGuard<'_>> {
        if self.begin(op) {
            Some(OperationGuard { lock: self, op })
        } else {
            None
        }
    }
}

/// Holds the lock for one operation; releases on drop
#[derive(Debug)]
pub struct OperationGuard<'a> {
    lock: &'a OperationLock,
    op: Operation,
}

impl OperationGuard<'_> {
    pub fn operation(&self) -> Operation {
        self.op
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.lock.end();
    }
}
