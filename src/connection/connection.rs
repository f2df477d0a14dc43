//! `Connection`: the pool-resident transport handle and the per-lease
//! guard handed out to callers.
//!
//! `ConnectionState` holds the persistent, pool-resident state (lease
//! flag, dial counter, transport). `Connection` is the RAII lease handle
//! returned by `Pool::acquire` — it wraps a shared `Arc<ConnectionState>`
//! plus the `OwnedSemaphorePermit` that must be returned exactly once, on
//! release or drop.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use rustls::ClientConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{Mutex, OwnedSemaphorePermit};
use tracing::trace;

use crate::connection::stream::Transport;
use crate::endpoint::{EndpointKey, Scheme};
use crate::error::Result;

pub(crate) struct ConnectionState {
    host: Box<str>,
    port: u16,
    scheme: Scheme,
    tls_config: Option<Arc<ClientConfig>>,
    transport: Mutex<Option<Transport>>,
    leased: AtomicBool,
    dial_count: AtomicU64,
}

impl ConnectionState {
    pub(crate) fn new(endpoint: &EndpointKey, tls_config: Option<Arc<ClientConfig>>) -> Arc<Self> {
        Arc::new(Self {
            host: endpoint.host().into(),
            port: endpoint.port(),
            scheme: endpoint.scheme(),
            tls_config,
            transport: Mutex::new(None),
            leased: AtomicBool::new(false),
            dial_count: AtomicU64::new(0),
        })
    }

    /// Atomically claims this connection for a new lease. Returns `true`
    /// iff this call performed the false -> true transition.
    pub(crate) fn try_lease(&self) -> bool {
        self.leased
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn mark_released(&self) {
        self.leased.store(false, Ordering::Release);
    }

    async fn ensure_dialed(&self) -> Result<()> {
        let mut guard = self.transport.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        let transport = match (self.scheme, &self.tls_config) {
            (Scheme::Https, Some(config)) => {
                Transport::dial_tls(&self.host, self.port, config.clone()).await?
            }
            _ => Transport::dial_tcp(&self.host, self.port).await?,
        };
        let dials = self.dial_count.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(host = %self.host, port = self.port, dials, "dialed connection");
        *guard = Some(transport);
        Ok(())
    }

    async fn send(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_dialed().await?;
        let mut guard = self.transport.lock().await;
        let transport = guard.as_mut().expect("ensure_dialed populated the transport");
        let outcome: std::io::Result<()> = async {
            transport.write_all(bytes).await?;
            transport.flush().await
        }
        .await;
        match outcome {
            Ok(()) => Ok(()),
            Err(err) => {
                *guard = None;
                Err(err.into())
            }
        }
    }

    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_dialed().await?;
        let mut guard = self.transport.lock().await;
        let transport = guard.as_mut().expect("ensure_dialed populated the transport");
        match transport.read(buf).await {
            Ok(0) => {
                // Peer closed the connection; the next send must re-dial.
                *guard = None;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(err) => {
                *guard = None;
                Err(err.into())
            }
        }
    }

    fn dial_count(&self) -> u64 {
        self.dial_count.load(Ordering::Acquire)
    }
}

/// A leased `Connection`, exclusively owned by the request driving it.
///
/// Dropping a `Connection` (or calling [`Connection::release`] explicitly)
/// clears the lease flag and returns the capacity permit to the owning
/// `Pool`. This makes release unconditional across cancellation and error
/// paths: whichever way the holder's task exits, the `Drop` impl runs.
pub struct Connection {
    state: Arc<ConnectionState>,
    permit: Option<OwnedSemaphorePermit>,
}

impl Connection {
    pub(crate) fn new_leased(state: Arc<ConnectionState>, permit: OwnedSemaphorePermit) -> Self {
        Self {
            state,
            permit: Some(permit),
        }
    }

    /// Writes `bytes` to the transport, dialing it first if necessary.
    pub async fn send(&self, bytes: &[u8]) -> Result<()> {
        self.state.send(bytes).await
    }

    /// Reads up to `buf.len()` bytes. `Ok(0)` means the peer closed the
    /// connection.
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.state.read(buf).await
    }

    /// Number of times the underlying transport has been (re)dialed.
    pub fn dial_count(&self) -> u64 {
        self.state.dial_count()
    }

    /// Releases the lease, returning the Connection to its Pool. Calling
    /// this a second time (or dropping afterward) is a no-op: the permit
    /// has already been taken.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.permit.take().is_some() {
            self.state.mark_released();
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.release_inner();
    }
}
