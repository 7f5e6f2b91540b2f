//! Reusable transmit buffers sized from the negotiated session parameters
//! (§4.4): avoids a fresh heap allocation for every outgoing request frame
//! under sustained load.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex as StdMutex};

use bytes::BytesMut;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A pool of buffers with `buffer_size`-byte capacity. Capacity (buffer
/// count) is fixed at construction time; acquiring from an empty pool waits
/// until a buffer is released.
#[derive(Debug)]
pub(crate) struct BufferPool {
    admission: Arc<Semaphore>,
    free: Arc<StdMutex<Vec<BytesMut>>>,
}

impl BufferPool {
    /// Build a pool of `capacity` buffers, each with `buffer_size` bytes of
    /// reserved capacity.
    pub(crate) fn new(buffer_size: usize, capacity: usize) -> Self {
        let free = (0..capacity)
            .map(|_| BytesMut::with_capacity(buffer_size))
            .collect();

        Self {
            admission: Arc::new(Semaphore::new(capacity)),
            free: Arc::new(StdMutex::new(free)),
        }
    }

    /// Acquire an empty buffer, blocking (asynchronously) while the pool is
    /// exhausted.
    pub(crate) async fn acquire(&self) -> PooledBuffer {
        let permit = self
            .admission
            .clone()
            .acquire_owned()
            .await
            .expect("buffer pool semaphore is never closed");

        let mut buf = {
            let mut free = self.free.lock().expect("buffer pool free-list poisoned");
            free.pop()
                .expect("semaphore admitted more holders than buffers exist")
        };
        buf.clear();

        PooledBuffer {
            buf: Some(buf),
            free: self.free.clone(),
            _permit: permit,
        }
    }
}

/// An owned buffer checked out of a [`BufferPool`]; returned to the pool on
/// drop.
#[derive(Debug)]
pub(crate) struct PooledBuffer {
    buf: Option<BytesMut>,
    free: Arc<StdMutex<Vec<BytesMut>>>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledBuffer {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        self.buf.as_ref().expect("buffer taken before drop")
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut BytesMut {
        self.buf.as_mut().expect("buffer taken before drop")
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.free
                .lock()
                .expect("buffer pool free-list poisoned")
                .push(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_blocks_when_exhausted() {
        use std::time::Duration;

        let pool = BufferPool::new(16, 1);
        let first = pool.acquire().await;
        assert_eq!(first.capacity(), 16);

        // pool is exhausted: a second acquire must not resolve until `first` drops.
        assert!(tokio::time::timeout(Duration::from_millis(50), pool.acquire())
            .await
            .is_err());

        drop(first);
        let mut second = tokio::time::timeout(Duration::from_millis(50), pool.acquire())
            .await
            .expect("buffer released back to the pool");
        second.extend_from_slice(&[1, 2, 3]);
        assert_eq!(&second[..], &[1, 2, 3]);
    }

    #[tokio::test]
    async fn capacity_matches_max_concurrent_jobs_plus_one() {
        let pool = BufferPool::new(8, 3);
        let a = pool.acquire().await;
        let b = pool.acquire().await;
        let c = pool.acquire().await;
        assert_eq!(a.capacity() + b.capacity() + c.capacity(), 24);
    }
}
