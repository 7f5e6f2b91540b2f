//! Tunable knobs for opening a session with a PLC.

use std::time::Duration;

/// Default initial PDU-size hint sent in the Connect Request TSAP
/// parameters, before Communication Setup negotiates the real value.
pub(crate) const INITIAL_PDU_SIZE_HINT: u32 = 1024;

/// Default PDU length requested during Communication Setup.
pub(crate) const DEFAULT_PDU_LENGTH_REQUESTED: u16 = 1920;

/// Default TCP connect timeout.
pub(crate) const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(3);

/// Default per-request deadline enforced by the [`crate::executor::Executor`].
pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);

/// Configuration used while opening a [`crate::S7Client`] session.
///
/// The defaults mirror the values spec.md's Scenario A exercises and the
/// teacher's previous hard-coded constants; override only what you need.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// How long to wait for the initial TCP connect before giving up.
    pub connection_timeout: Duration,
    /// Default deadline for a single `perform` call on the executor, used
    /// whenever a request isn't given an explicit deadline.
    pub request_timeout: Duration,
    /// PDU length requested from the PLC during Communication Setup.
    pub pdu_length_requested: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            pdu_length_requested: DEFAULT_PDU_LENGTH_REQUESTED,
        }
    }
}
