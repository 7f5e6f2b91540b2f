use std::net::Ipv4Addr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{info, instrument};

use crate::config::SessionConfig;
use crate::connection::{iso::S7Types, tcp};
use crate::errors::Error;
use crate::executor::Executor;

/// Default TCP Port
pub(crate) const TCP_PORT: u32 = 102;

/// Session lifecycle: `Closed -> ConnectingTcp -> CotpConnecting ->
/// S7SetupPending -> Ready`. Only `Ready` allows requests through
/// [`S7Client::validate_connection_info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionState {
    Closed,
    ConnectingTcp,
    CotpConnecting,
    S7SetupPending,
    Ready,
}

/// Standalone S7 connection.
#[derive(Debug)]
pub struct S7Client {
    executor: Executor,
    config: SessionConfig,
    pdu_size: u16,
    // The Max AMQ parameters define how many unacknowledged requests a PLC
    // (callee) is able to accept from a client (caller); used as the
    // executor's admission limit.
    max_concurrent_jobs: u16,
    state: SessionState,
}

impl S7Client {
    /// Create new standalone connection to an S7 PLC, using default session
    /// parameters.
    ///```rust
    /// # tokio_test::block_on(async {
    /// use std::net::Ipv4Addr;
    /// use s7client::{S7Client, S7Types};
    ///
    /// // create single s7 client
    /// let mut client = S7Client::new(Ipv4Addr::new(192, 168, 10, 72), S7Types::S71200)
    ///          .await?;
    /// # Ok::<(), s7client::errors::Error>(())
    /// # });
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if no connection could be established to the PLC.
    pub async fn new(ip: Ipv4Addr, s7_type: S7Types) -> Result<Self, Error> {
        Self::with_config(ip, s7_type, SessionConfig::default()).await
    }

    /// Create a new standalone connection, overriding the default
    /// [`SessionConfig`].
    /// # Errors
    ///
    /// Will return `Error` if no connection could be established to the PLC.
    #[instrument(skip(config), fields(%ip, s7_type = ?s7_type))]
    pub async fn with_config(
        ip: Ipv4Addr,
        s7_type: S7Types,
        config: SessionConfig,
    ) -> Result<Self, Error> {
        let mut tcp_client = match timeout(
            config.connection_timeout,
            TcpStream::connect(format!("{ip}:{TCP_PORT}")),
        )
        .await
        {
            Ok(connection) => connection?,
            Err(_) => {
                return Err(Error::Connection(format!(
                    "Error on connecting to '{}:{}': Timed out after {} seconds",
                    ip,
                    TCP_PORT,
                    config.connection_timeout.as_secs()
                )))
            }
        };

        // `tcp::connect` runs the COTP handshake and Communication Setup in
        // one call; the intermediate states only exist conceptually here
        // since nothing observes them mid-flight.
        let params = tcp::connect(&mut tcp_client, s7_type, config.pdu_length_requested).await?;

        let pdu_size = params.pdu_length;
        let max_concurrent_jobs = params.max_amq_called.max(1);
        let buffer_size = usize::from(pdu_size) + 7;

        info!(pdu_size, max_concurrent_jobs, "S7 session ready");

        Ok(Self {
            executor: Executor::spawn(tcp_client, max_concurrent_jobs, buffer_size),
            config,
            pdu_size,
            max_concurrent_jobs,
            state: SessionState::Ready,
        })
    }

    /// Gracefully disconnect from the PLC.
    /// # Errors
    ///
    /// Will return `Error` if the connection to the PLC could not be closed
    /// gracefully.
    #[instrument(skip(self))]
    pub async fn disconnect(&mut self) -> Result<(), Error> {
        let frame = tcp::build_disconnect_frame();
        self.executor.write_raw(&frame).await?;
        self.executor.shutdown();
        self.state = SessionState::Closed;
        info!("S7 session closed");
        Ok(())
    }

    /// Negotiated max PDU size in bytes, driving how many items or bytes
    /// fit in one batched request.
    pub fn pdu_size(&self) -> u16 {
        self.pdu_size
    }

    /// Max number of jobs the PLC accepts outstanding at once, mirrored
    /// into the executor's admission semaphore.
    pub fn max_concurrent_jobs(&self) -> u16 {
        self.max_concurrent_jobs
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        self.config.request_timeout
    }

    pub(crate) fn executor(&self) -> &Executor {
        &self.executor
    }

    pub(crate) async fn validate_connection_info(&self) -> Result<(), Error> {
        if self.state != SessionState::Ready {
            return Err(Error::SessionClosed);
        }
        Ok(())
    }

    pub(crate) fn set_closed(&mut self) {
        self.state = SessionState::Closed;
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state != SessionState::Ready
    }
}
