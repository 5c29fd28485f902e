//! Lifecycle state machine and host signals.

use serde::{Deserialize, Serialize};

/// Worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    /// No lifecycle signal received yet.
    Uninitialized,
    /// Install in progress; the shell is being prefetched into staging.
    Installing,
    /// Shell staged, waiting for activation.
    Installed,
    /// Activation in progress; the main cache is being reconciled.
    Activating,
    /// Reconciled and controlling clients.
    Ready,
    /// Install or activation failed; cache state may have been wiped.
    Failed,
}

impl Default for WorkerState {
    fn default() -> Self {
        Self::Uninitialized
    }
}

impl WorkerState {
    /// Check if the worker reached the serving state.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Recognized host message payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMessage {
    /// Force immediate activation of a pending instance.
    SkipWaiting,
    /// Fill the main cache with every manifest resource not yet present.
    DownloadOffline,
}

impl HostMessage {
    /// Parse a raw message payload; unrecognized payloads are `None`.
    pub fn parse(payload: &str) -> Option<Self> {
        match payload {
            "skipWaiting" => Some(Self::SkipWaiting),
            "downloadOffline" => Some(Self::DownloadOffline),
            _ => None,
        }
    }
}

/// Events emitted on the engine's channel for the host to react to.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// Lifecycle state changed.
    StateChange {
        from: WorkerState,
        to: WorkerState,
    },
    /// The pending instance asks the host to activate it without waiting.
    SkipWaiting,
    /// Reconciliation completed and the worker took control of clients.
    Claimed,
    /// Reconciliation failed and cache state was wiped.
    ReconcileFailed { reason: String },
}
