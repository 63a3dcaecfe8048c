//! Error taxonomy shared by the provisioning workflow and the session
//! controller.
//!
//! Nothing here is retried automatically: a failed call surfaces immediately
//! with the variant that names which collaborator broke.

use crate::session::SessionState;
use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Network failure or non-2xx response from the backend API.
    #[error("{method} {url} failed: {message}")]
    Transport {
        method: String,
        url: String,
        message: String,
    },

    /// The synthesis pipeline reported a fatal error for this space.
    #[error("pipeline failed: {0}")]
    Pipeline(String),

    /// No layout proposals arrived within the decision-phase deadline.
    #[error("no layout proposals within {waited:?}")]
    DecisionTimeout { waited: Duration },

    /// Malformed caller input, detected before any network activity.
    #[error("{0}")]
    Precondition(String),

    /// A command was issued against a session outside the ready state.
    #[error("session is {state}, not ready")]
    SessionNotReady { state: SessionState },

    /// The workspace surface did not finish loading within the deadline.
    #[error("navigation to {url} timed out after {timeout:?}")]
    NavigationTimeout { url: String, timeout: Duration },

    /// The surface loaded but never flipped its readiness flag.
    #[error("readiness flag {flag:?} never became true within {timeout:?}")]
    HandshakeTimeout { flag: String, timeout: Duration },

    /// Browser engine or devtools-protocol failure underneath the session
    /// controller.
    #[error("automation failed: {0}")]
    Automation(String),
}
