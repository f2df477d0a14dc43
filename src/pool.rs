//! Bounded per-endpoint connection pool.
//!
//! A `Pool` owns up to `capacity` `Connection`s for one `EndpointKey`. Its
//! slot array never shrinks: a slot, once populated, stays populated for
//! the Pool's lifetime, and a capacity `Semaphore` is the sole gate on how
//! many leases can be outstanding at once.

use std::sync::Arc;

use rustls::ClientConfig;
use tokio::sync::{Mutex, Semaphore};
use tracing::debug;

use crate::connection::{Connection, ConnectionState};
use crate::endpoint::EndpointKey;
use crate::error::Result;

pub struct Pool {
    endpoint: EndpointKey,
    slots: Vec<Mutex<Option<Arc<ConnectionState>>>>,
    semaphore: Arc<Semaphore>,
    tls_config: Option<Arc<ClientConfig>>,
}

impl Pool {
    pub fn new(endpoint: EndpointKey, capacity: usize, tls_config: Option<Arc<ClientConfig>>) -> Self {
        assert!(capacity > 0, "pool capacity must be nonzero");
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Mutex::new(None));
        debug!(endpoint = %endpoint, capacity, "created pool");
        Self {
            endpoint,
            slots,
            semaphore: Arc::new(Semaphore::new(capacity)),
            tls_config,
        }
    }

    pub fn endpoint(&self) -> &EndpointKey {
        &self.endpoint
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Leases a Connection, suspending until both a capacity permit and a
    /// claimable slot are available.
    ///
    /// Algorithm:
    /// 1. Acquire one permit from the capacity semaphore.
    /// 2. Scan the slot array for a Connection whose lease flag is false;
    ///    atomically claim it.
    /// 3. If none is free but an empty slot exists, populate it with a
    ///    freshly constructed (not-yet-dialed) Connection and claim that.
    ///
    /// Because `permits_available + leased_count == capacity` and slots
    /// are never vacated, holding a permit guarantees step 2 or step 3
    /// succeeds — the loop below cannot fall through.
    pub async fn acquire(&self) -> Result<Connection> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("pool semaphore is never closed while the Pool is alive");

        for slot in &self.slots {
            let mut guard = slot.lock().await;
            match guard.as_ref() {
                Some(state) if state.try_lease() => {
                    let state = state.clone();
                    return Ok(Connection::new_leased(state, permit));
                }
                Some(_) => continue,
                None => {
                    let state = ConnectionState::new(&self.endpoint, self.tls_config.clone());
                    let claimed = state.try_lease();
                    debug_assert!(claimed, "freshly constructed connection is never pre-leased");
                    *guard = Some(state.clone());
                    return Ok(Connection::new_leased(state, permit));
                }
            }
        }

        unreachable!("a held permit guarantees a free or claimable slot exists")
    }

    /// Number of slots that have ever been populated. Monotonically
    /// non-decreasing for the Pool's lifetime.
    pub async fn stats(&self) -> usize {
        let mut count = 0;
        for slot in &self.slots {
            if slot.lock().await.is_some() {
                count += 1;
            }
        }
        count
    }
}
