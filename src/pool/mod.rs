//! Bounded client pool with optional ramp-up.
//!
//! Slots are preallocated to the maximum size; only indices of
//! successfully connected handles circulate through the free list. The
//! semaphore's permit count always equals the free-list length, so an
//! acquired permit guarantees a poppable index, and the holder of an index
//! has exclusive use of the handle stored at it.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::sync::{watch, Semaphore};

use crate::client::KvClient;
use crate::config::{PoolSizing, RunConfig};
use crate::errors::Error;

pub struct ClientPool {
    slots: Vec<Mutex<Option<KvClient>>>,
    free: Mutex<Vec<usize>>,
    permits: Semaphore,
    size: AtomicUsize,
    disconnects: AtomicU64,
    config: RunConfig,
}

impl ClientPool {
    /// Build the pool and establish the initial batch of connections. A
    /// run cannot start with zero handles, so a fully failed batch is
    /// fatal.
    pub async fn connect(config: &RunConfig) -> Result<Arc<ClientPool>, Error> {
        let max = config.pool.max_size();
        let pool = Arc::new(ClientPool {
            slots: (0..max).map(|_| Mutex::new(None)).collect(),
            free: Mutex::new(Vec::with_capacity(max)),
            permits: Semaphore::new(0),
            size: AtomicUsize::new(0),
            disconnects: AtomicU64::new(0),
            config: config.clone(),
        });
        let (connected, last_error) = pool.grow(config.pool.initial_size()).await;
        if connected == 0 {
            return Err(last_error.unwrap_or(Error::ShuttingDown));
        }
        debug!("pool ready with {connected} connections");
        Ok(pool)
    }

    /// Current number of successfully connected handles.
    pub fn len(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Connection failures observed since the last drain; folded into the
    /// interval counters by one worker per group.
    pub fn take_disconnects(&self) -> u64 {
        self.disconnects.swap(0, Ordering::Relaxed)
    }

    /// Suspend until a handle is free, then lend it out exclusively. The
    /// lease returns the handle on every exit path, including errors.
    pub async fn acquire(self: &Arc<Self>) -> PooledClient {
        let permit = self
            .permits
            .acquire()
            .await
            .expect("pool semaphore is never closed");
        permit.forget();
        let index = self
            .free
            .lock()
            .pop()
            .expect("free list holds one index per permit");
        let client = self.slots[index]
            .lock()
            .take()
            .expect("free index points at a connected slot");
        PooledClient {
            pool: Arc::clone(self),
            index,
            client: Some(client),
        }
    }

    /// Add up to `n` handles, connecting concurrently. Each failed
    /// connection is retried once; a handle that fails twice is dropped
    /// and counted as a disconnect.
    pub async fn grow(self: &Arc<Self>, n: usize) -> (usize, Option<Error>) {
        let room = self.slots.len().saturating_sub(self.len());
        let n = n.min(room);
        let attempts =
            futures::future::join_all((0..n).map(|_| self.connect_with_retry())).await;

        let mut connected = 0;
        let mut last_error = None;
        for attempt in attempts {
            match attempt {
                Ok(client) => {
                    let index = self.size.fetch_add(1, Ordering::AcqRel);
                    *self.slots[index].lock() = Some(client);
                    self.free.lock().push(index);
                    self.permits.add_permits(1);
                    connected += 1;
                }
                Err(e) => {
                    self.disconnects.fetch_add(1, Ordering::Relaxed);
                    warn!("dropping pool connection: {e}");
                    last_error = Some(e);
                }
            }
        }
        (connected, last_error)
    }

    async fn connect_with_retry(&self) -> Result<KvClient, Error> {
        match KvClient::connect(&self.config).await {
            Ok(client) => Ok(client),
            Err(first) => {
                debug!("connection failed, retrying once: {first}");
                KvClient::connect(&self.config).await
            }
        }
    }
}

/// Grow the pool on the configured schedule until it reaches its target
/// size. Runs concurrently with the workload; workers are already
/// processing on the initial batch.
pub async fn run_ramp(pool: Arc<ClientPool>, mut shutdown: watch::Receiver<bool>) {
    let PoolSizing::Ramp {
        end,
        per_ramp,
        interval,
        ..
    } = pool.config.pool
    else {
        return;
    };

    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    while pool.len() < end {
        tokio::select! {
            _ = ticker.tick() => {
                pool.grow(per_ramp).await;
            }
            _ = shutdown.changed() => return,
        }
    }
    info!("client ramp complete: {} connections", pool.len());
}

/// Exclusive lease on one pool handle.
pub struct PooledClient {
    pool: Arc<ClientPool>,
    index: usize,
    client: Option<KvClient>,
}

impl Deref for PooledClient {
    type Target = KvClient;
    fn deref(&self) -> &KvClient {
        self.client.as_ref().expect("client present until drop")
    }
}

impl DerefMut for PooledClient {
    fn deref_mut(&mut self) -> &mut KvClient {
        self.client.as_mut().expect("client present until drop")
    }
}

impl Drop for PooledClient {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        *self.pool.slots[self.index].lock() = Some(client);
        self.pool.free.lock().push(self.index);
        self.pool.permits.add_permits(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::args::Args;
    use clap::Parser;

    fn unreachable_config() -> RunConfig {
        let args = Args::try_parse_from([
            "valkey-bench",
            "--host",
            "127.0.0.1",
            "--port",
            "1",
            "--clients",
            "2",
            "--connection-timeout",
            "200",
            "--single-process",
        ])
        .unwrap();
        RunConfig::from_args(&args).unwrap()
    }

    #[tokio::test]
    async fn fully_failed_initial_batch_is_fatal() {
        let err = ClientPool::connect(&unreachable_config()).await.err();
        assert!(err.is_some(), "connecting to a closed port must fail");
    }
}
