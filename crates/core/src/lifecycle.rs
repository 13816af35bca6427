//! Open/close lifecycle labels
//!
//! ```text
//! Openable ──► Opening ──► Opened ──► Closing ──► Closed ──► Destroyed
//!    │            │          │                      ▲  │
//!    │            ▼          └──────────────────────┘  │
//!    │        Openable                                 ▼
//!    └──────────────────► Opened                   Openable
//! ```
//!
//! `Destroyed` is strictly terminal.

use serde::{Deserialize, Serialize};

/// Lifecycle state of an idempotently opened resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Never opened, or returned after a failed open
    Openable,
    /// Open action in progress
    Opening,
    /// Open action succeeded
    Opened,
    /// Close action in progress
    Closing,
    /// Close action finished
    Closed,
    /// Permanently retired
    Destroyed,
}

impl LifecycleState {
    /// Every lifecycle state
    pub const ALL: [LifecycleState; 6] = [
        LifecycleState::Openable,
        LifecycleState::Opening,
        LifecycleState::Opened,
        LifecycleState::Closing,
        LifecycleState::Closed,
        LifecycleState::Destroyed,
    ];

    /// States reachable from this one
    pub fn successors(&self) -> &'static [LifecycleState] {
        use LifecycleState::*;
        match self {
            Openable => &[Opening, Opened],
            Opening => &[Opened, Openable],
            Opened => &[Closing, Closed],
            Closing => &[Closed],
            Closed => &[Destroyed, Openable],
            Destroyed => &[],
        }
    }

    /// Check if no transition leaves this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Destroyed)
    }

    /// Check if the resource is usable (opened, not yet closing)
    pub fn is_open(&self) -> bool {
        matches!(self, LifecycleState::Opened)
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Openable => "Openable",
            LifecycleState::Opening => "Opening",
            LifecycleState::Opened => "Opened",
            LifecycleState::Closing => "Closing",
            LifecycleState::Closed => "Closed",
            LifecycleState::Destroyed => "Destroyed",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
