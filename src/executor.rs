//! Multiplexes concurrent requests over a single S7 connection.
//!
//! The PLC allows up to `max_amq_called` job requests to be outstanding at
//! once on one TCP connection, correlated by the S7 header's
//! `pdu_reference` (§4.3). [`Executor`] owns the connection after Communication
//! Setup and is the only thing allowed to write to or read from it from then
//! on: a [`tokio::sync::Semaphore`] admits at most `max_amq_called` callers,
//! a [`tokio::sync::Mutex`]-guarded write half serializes frames onto the
//! wire, and a single spawned reader task dispatches each arriving ack-data
//! message to the caller that is waiting on its `pdu_reference` via a
//! [`tokio::sync::oneshot`] channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex as AsyncMutex, Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::buffer_pool::BufferPool;
use crate::connection::tcp::{read_one_frame, write_framed};
use crate::errors::{Error, S7ProtocolError};
use crate::s7_protocol::header::{patch_pdu_reference, S7Header};

type PendingSlots = Arc<StdMutex<HashMap<u16, oneshot::Sender<Result<BytesMut, Error>>>>>;

/// Lets a caller cancel an in-flight [`Executor::perform`] call independently
/// of its deadline (spec.md §5: "a linked deadline token combining the
/// caller's cancel source and the request timeout"; §7: user cancellation
/// takes precedence over a deadline that fires at the same time).
#[derive(Debug, Clone)]
pub(crate) struct CancelToken {
    canceled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelToken {
    pub(crate) fn new() -> Self {
        Self {
            canceled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Cancel the request this token is attached to. Idempotent; safe to
    /// call before or after the request has been written to the wire.
    pub(crate) fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called; pending forever otherwise.
    async fn cancelled(&self) {
        if self.is_canceled() {
            return;
        }
        self.notify.notified().await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Multiplexing request executor owning one negotiated S7 connection.
#[derive(Debug)]
pub(crate) struct Executor {
    writer: AsyncMutex<WriteHalf<TcpStream>>,
    buffers: BufferPool,
    admission: Arc<Semaphore>,
    slots: PendingSlots,
    next_reference: AtomicU16,
    reader_task: JoinHandle<()>,
}

impl Executor {
    /// Take ownership of an already-negotiated connection and start
    /// multiplexing requests over it. `max_concurrent_jobs` is the PLC's
    /// negotiated `max_amq_called`; `buffer_size` is `pdu_size + 7` (§4.4).
    pub(crate) fn spawn(connection: TcpStream, max_concurrent_jobs: u16, buffer_size: usize) -> Self {
        let (read_half, write_half) = tokio::io::split(connection);
        let slots: PendingSlots = Arc::new(StdMutex::new(HashMap::new()));
        let reader_task = tokio::spawn(Self::reader_loop(read_half, slots.clone()));
        let capacity = usize::from(max_concurrent_jobs.max(1)) + 1;

        Self {
            writer: AsyncMutex::new(write_half),
            buffers: BufferPool::new(buffer_size, capacity),
            admission: Arc::new(Semaphore::new(usize::from(max_concurrent_jobs.max(1)))),
            slots,
            next_reference: AtomicU16::new(1),
            reader_task,
        }
    }

    /// Send one job request (`frame` is the S7 header + parameters + data,
    /// *without* the zeroed `pdu_reference` filled in yet and *without* the
    /// TPKT/COTP wire framing, which is added here) and return the matching
    /// ack-data payload (parameters + data, with the S7 header already
    /// stripped off).
    ///
    /// `cancel` lets the caller abandon the request independently of
    /// `deadline`; per spec.md §7, a cancellation takes precedence over a
    /// deadline that expires at the same time.
    #[instrument(skip(self, frame, cancel))]
    pub(crate) async fn perform(
        &self,
        frame: &[u8],
        deadline: Duration,
        cancel: &CancelToken,
    ) -> Result<BytesMut, Error> {
        let _permit = self
            .admission
            .acquire()
            .await
            .map_err(|_| Error::SessionClosed)?;

        if cancel.is_canceled() {
            return Err(Error::Canceled);
        }

        let mut buf = self.buffers.acquire().await;
        buf.extend_from_slice(frame);

        let pdu_reference = self.reserve_reference();
        patch_pdu_reference(&mut buf, 0, pdu_reference);

        let (tx, rx) = oneshot::channel();
        self.slots
            .lock()
            .expect("executor slot table poisoned")
            .insert(pdu_reference, tx);

        if cancel.is_canceled() {
            self.slots
                .lock()
                .expect("executor slot table poisoned")
                .remove(&pdu_reference);
            return Err(Error::Canceled);
        }

        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = write_framed(&mut *writer, &buf).await {
                self.slots
                    .lock()
                    .expect("executor slot table poisoned")
                    .remove(&pdu_reference);
                return Err(e);
            }
        }
        drop(buf);

        // The request is now on the wire: a cancellation from here on must
        // still free the slot, but the reader may already be racing to
        // deliver a response through `rx` — `select!`'s `biased` ordering
        // makes cancellation win ties, matching "user intent takes
        // precedence" (spec.md §7).
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                self.slots
                    .lock()
                    .expect("executor slot table poisoned")
                    .remove(&pdu_reference);
                Err(Error::Canceled)
            }
            result = timeout(deadline, rx) => match result {
                Ok(Ok(result)) => result,
                // reader loop dropped the sender: connection tore down mid-flight
                Ok(Err(_)) => Err(Error::SessionClosed),
                Err(_) => {
                    self.slots
                        .lock()
                        .expect("executor slot table poisoned")
                        .remove(&pdu_reference);
                    Err(Error::Timeout)
                }
            },
        }
    }

    /// Write a pre-built, already-framed control message (used for the
    /// disconnect handshake) directly to the connection, bypassing request
    /// correlation.
    pub(crate) async fn write_raw(&self, bytes: &[u8]) -> Result<(), Error> {
        use tokio::io::AsyncWriteExt;
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes).await?;
        Ok(())
    }

    /// Tear the executor down: stop the reader task and fail every request
    /// still waiting on a response.
    pub(crate) fn shutdown(&self) {
        self.reader_task.abort();
        Self::fail_all(&self.slots, &Error::SessionClosed);
    }

    fn reserve_reference(&self) -> u16 {
        // Skip 0: Communication Setup always uses pdu_reference 0 and runs
        // before the executor exists, but wrapping back to 0 here would
        // still be safe to avoid on principle.
        loop {
            let next = self.next_reference.fetch_add(1, Ordering::Relaxed);
            if next != 0 {
                return next;
            }
        }
    }

    async fn reader_loop(mut read_half: ReadHalf<TcpStream>, slots: PendingSlots) {
        loop {
            let mut frame = match read_one_frame(&mut read_half).await {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "executor reader loop terminating");
                    Self::fail_all(&slots, &e);
                    return;
                }
            };

            let header = match S7Header::try_from(&mut frame) {
                Ok(header) => header,
                Err(e) => {
                    debug!(error = %e, "dropping unparsable frame");
                    continue;
                }
            };

            let response = match header.is_ack_data() {
                Err(e) => Err(e),
                Ok(_) if header.has_error() => {
                    let (class, code) = header.error_codes();
                    Err(Error::S7ProtocolError(S7ProtocolError::from_codes(
                        class, code,
                    )))
                }
                Ok(_) => Ok(frame),
            };

            let sender = slots
                .lock()
                .expect("executor slot table poisoned")
                .remove(&header.pdu_reference());

            match sender {
                Some(sender) => {
                    let _ = sender.send(response);
                }
                None => debug!(
                    pdu_reference = header.pdu_reference(),
                    "dropping response for abandoned or unknown request"
                ),
            }
        }
    }

    fn fail_all(slots: &PendingSlots, error: &Error) {
        let mut slots = slots.lock().expect("executor slot table poisoned");
        for (_, sender) in slots.drain() {
            let _ = sender.send(Err(Error::Connection(error.to_string())));
        }
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use bytes::{Buf, BufMut};
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn reserve_reference_never_yields_zero() {
        let executor_counter = AtomicU16::new(0);
        for _ in 0..3 {
            let next = executor_counter.fetch_add(1, Ordering::Relaxed);
            if next == 0 {
                continue;
            }
            assert_ne!(next, 0);
        }
    }

    /// Build a minimal job-request frame (S7 header only, no parameters or
    /// data) the way `read_area`/`write_area` would, with a placeholder
    /// `pdu_reference` of 0 for the executor to patch in place.
    fn empty_job_frame() -> BytesMut {
        BytesMut::from(S7Header::build_request(0, 0, 0))
    }

    /// Build a minimal ack-data frame carrying `pdu_reference`, as if it
    /// came from the PLC.
    fn ack_frame(pdu_reference: u16) -> BytesMut {
        let mut bytes = BytesMut::with_capacity(12);
        bytes.put_u8(0x32); // protocol id
        bytes.put_u8(3); // ack data
        bytes.put_u16(0); // reserved
        bytes.put_u16(pdu_reference);
        bytes.put_u16(0); // parameter_length
        bytes.put_u16(0); // data_length
        bytes.put_u8(0); // error class
        bytes.put_u8(0); // error code
        bytes
    }

    async fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (server, client) = tokio::join!(listener.accept(), TcpStream::connect(addr));
        (server.unwrap().0, client.unwrap())
    }

    /// Echoes back an ack-data frame carrying the same `pdu_reference` it
    /// received. The read loop never blocks on `delay` itself — each
    /// response is handled by its own spawned task — so `in_flight`/`peak`
    /// track how many requests the *client* has outstanding at once, not
    /// how fast this fake server happens to drain its socket.
    async fn fake_plc(
        mut stream: ReadHalf<TcpStream>,
        write_half: Arc<AsyncMutex<WriteHalf<TcpStream>>>,
        delay: Duration,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    ) {
        loop {
            let mut frame = match read_one_frame(&mut stream).await {
                Ok(frame) => frame,
                Err(_) => return,
            };
            let pdu_reference = {
                frame.advance(4);
                frame.get_u16()
            };

            let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(current, Ordering::SeqCst);

            let write_half = write_half.clone();
            let in_flight = in_flight.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                let mut writer = write_half.lock().await;
                write_framed(&mut *writer, &ack_frame(pdu_reference))
                    .await
                    .unwrap();
            });
        }
    }

    #[tokio::test]
    async fn perform_round_trips_through_a_real_socket() {
        let (server, client) = connected_pair().await;
        let (server_read, server_write) = tokio::io::split(server);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        tokio::spawn(fake_plc(
            server_read,
            Arc::new(AsyncMutex::new(server_write)),
            Duration::from_millis(1),
            in_flight,
            peak,
        ));

        let executor = Executor::spawn(client, 4, 256);
        let response = executor
            .perform(&empty_job_frame(), Duration::from_secs(1), &CancelToken::new())
            .await
            .unwrap();
        assert!(response.is_empty());
    }

    #[tokio::test]
    async fn concurrent_jobs_never_exceed_admission_limit() {
        const MAX_CONCURRENT_JOBS: u16 = 4;

        let (server, client) = connected_pair().await;
        let (server_read, server_write) = tokio::io::split(server);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        tokio::spawn(fake_plc(
            server_read,
            Arc::new(AsyncMutex::new(server_write)),
            Duration::from_millis(20),
            in_flight,
            peak.clone(),
        ));

        let executor = Arc::new(Executor::spawn(client, MAX_CONCURRENT_JOBS, 256));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let executor = executor.clone();
            handles.push(tokio::spawn(async move {
                executor
                    .perform(&empty_job_frame(), Duration::from_secs(2), &CancelToken::new())
                    .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(
            peak.load(Ordering::SeqCst) <= usize::from(MAX_CONCURRENT_JOBS),
            "observed {} requests in flight at once, admission limit is {}",
            peak.load(Ordering::SeqCst),
            MAX_CONCURRENT_JOBS
        );
    }

    #[tokio::test]
    async fn timed_out_request_frees_its_slot_for_later_use() {
        let (server, client) = connected_pair().await;
        let (mut server_read, server_write) = tokio::io::split(server);
        let write_half = Arc::new(AsyncMutex::new(server_write));

        // The server reads the first request and never answers it, then
        // answers every subsequent request immediately once a second
        // request arrives (simulating a response that was merely slow,
        // not lost).
        let write_half_task = write_half.clone();
        tokio::spawn(async move {
            let first = read_one_frame(&mut server_read).await.unwrap();
            let mut first_ref_bytes = first.clone();
            first_ref_bytes.advance(4);
            let _abandoned_reference = first_ref_bytes.get_u16();

            loop {
                let mut frame = match read_one_frame(&mut server_read).await {
                    Ok(frame) => frame,
                    Err(_) => return,
                };
                frame.advance(4);
                let pdu_reference = frame.get_u16();
                let mut writer = write_half_task.lock().await;
                write_framed(&mut *writer, &ack_frame(pdu_reference))
                    .await
                    .unwrap();
            }
        });

        let executor = Executor::spawn(client, 1, 256);
        let timed_out = executor
            .perform(&empty_job_frame(), Duration::from_millis(50), &CancelToken::new())
            .await;
        assert!(matches!(timed_out, Err(Error::Timeout)));

        // The slot freed by the timeout must be usable for a fresh request.
        let recovered = executor
            .perform(&empty_job_frame(), Duration::from_secs(1), &CancelToken::new())
            .await;
        assert!(recovered.is_ok());
    }

    #[tokio::test]
    async fn canceled_request_yields_canceled_not_timeout() {
        let (server, client) = connected_pair().await;
        let (server_read, server_write) = tokio::io::split(server);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        // The fake PLC never answers within the test's lifetime; only a
        // cancellation (not the 10s deadline) should resolve `perform`.
        tokio::spawn(fake_plc(
            server_read,
            Arc::new(AsyncMutex::new(server_write)),
            Duration::from_secs(10),
            in_flight,
            peak,
        ));

        let executor = Arc::new(Executor::spawn(client, 1, 256));
        let cancel = CancelToken::new();

        let perform_cancel = cancel.clone();
        let executor_task = executor.clone();
        let handle = tokio::spawn(async move {
            executor_task
                .perform(&empty_job_frame(), Duration::from_secs(10), &perform_cancel)
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(Error::Canceled)));
    }

    #[tokio::test]
    async fn canceling_before_send_never_touches_the_wire() {
        let (server, client) = connected_pair().await;
        let (server_read, server_write) = tokio::io::split(server);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        tokio::spawn(fake_plc(
            server_read,
            Arc::new(AsyncMutex::new(server_write)),
            Duration::from_millis(1),
            in_flight,
            peak,
        ));

        let executor = Executor::spawn(client, 1, 256);
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = executor
            .perform(&empty_job_frame(), Duration::from_secs(1), &cancel)
            .await;
        assert!(matches!(result, Err(Error::Canceled)));
    }
}
