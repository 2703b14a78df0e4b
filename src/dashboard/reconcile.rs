//! Merging polled status payloads into canonical running state

use log::warn;

use super::errors::ApiError;
use super::types::{GridStatus, StatusResponse};

/// Canonical running state after applying one status payload
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub is_running: bool,
    pub status: Option<GridStatus>,
}

/// Merge a status payload into the current snapshot.
///
/// A running payload with a snapshot replaces the current one verbatim,
/// embedded balance and orders included. A stopped payload is a hard reset:
/// nothing of the previous snapshot survives.
pub fn reconcile(current: Option<&GridStatus>, response: StatusResponse) -> Reconciled {
    let is_running = response.is_running();

    if !is_running {
        return Reconciled {
            is_running: false,
            status: None,
        };
    }

    match response.grid_status {
        Some(mut snapshot) => {
            snapshot.is_running = true;
            Reconciled {
                is_running: true,
                status: Some(snapshot),
            }
        }
        None => {
            warn!("Service reports a running grid without a snapshot; keeping the previous one");
            Reconciled {
                is_running: true,
                status: current.cloned(),
            }
        }
    }
}

/// Whether a fetch belongs to the first load or to routine refreshing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Initial,
    Routine,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorDisposition {
    Show(String),
    Suppress,
}

/// Decide whether a read failure reaches the operator.
///
/// Everything is shown during the first load. Afterwards only application
/// errors whose message differs from the one on screen are shown, so
/// network blips never flap the banner.
pub fn poll_error_disposition(
    phase: PollPhase,
    err: &ApiError,
    displayed: Option<&str>,
) -> ErrorDisposition {
    match phase {
        PollPhase::Initial => ErrorDisposition::Show(err.user_message()),
        PollPhase::Routine => match err.application_message() {
            Some(message) if displayed != Some(message.as_str()) => ErrorDisposition::Show(message),
            _ => ErrorDisposition::Suppress,
        },
    }
}
