//! Replays the pending queue once connectivity comes back.

use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::transport::{Request, Transport, TransportError};
use crate::cache::{DocumentStore, PendingOperation, PendingQueue};
use crate::connectivity::ConnectivityMonitor;
use crate::error::StorageResult;

/// State of the replayer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
  Idle,
  Draining,
}

/// What a drain run did.
#[derive(Debug, Clone)]
pub enum DrainOutcome {
  /// Another run was in progress; this trigger was coalesced into it.
  AlreadyDraining,
  /// Every operation in the snapshot was replayed.
  Drained { replayed: usize },
  /// An operation failed. It and everything after it stay queued.
  Halted {
    replayed: usize,
    sequence: u64,
    error: TransportError,
  },
}

impl PendingOperation {
  /// The network call that replays this operation.
  pub fn to_request(&self) -> Request {
    Request {
      method: self.mutation.into(),
      url: self.url.clone(),
      query: self.query.clone(),
      body: Some(self.payload.clone()),
    }
  }
}

/// Drains the pending queue against the network, strictly in FIFO order.
///
/// Draining only trims the queue. The cache already reflects every queued
/// operation, so it is never touched here.
pub struct Replayer<T: Transport, S: DocumentStore> {
  transport: Arc<T>,
  queue: Arc<PendingQueue<S>>,
  draining: AtomicBool,
}

/// Resets the draining flag however the run ends.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
  fn drop(&mut self) {
    self.0.store(false, Ordering::SeqCst);
  }
}

impl<T: Transport, S: DocumentStore + 'static> Replayer<T, S> {
  pub fn new(transport: Arc<T>, queue: Arc<PendingQueue<S>>) -> Self {
    Self {
      transport,
      queue,
      draining: AtomicBool::new(false),
    }
  }

  pub fn state(&self) -> ReplayState {
    if self.draining.load(Ordering::SeqCst) {
      ReplayState::Draining
    } else {
      ReplayState::Idle
    }
  }

  /// Run one drain over the operations queued right now.
  ///
  /// Operations appended while the run is in progress are left for the next
  /// run. Storage failures abort the run and are returned.
  pub async fn drain(&self) -> StorageResult<DrainOutcome> {
    if self
      .draining
      .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
      .is_err()
    {
      debug!("drain already in progress");
      return Ok(DrainOutcome::AlreadyDraining);
    }
    let _guard = DrainGuard(&self.draining);

    let snapshot = self.queue.list()?;
    if !snapshot.is_empty() {
      info!(count = snapshot.len(), "replaying pending operations");
    }

    let mut replayed = 0;
    for operation in snapshot {
      match self.transport.request(&operation.to_request()).await {
        Ok(response) => {
          self.queue.remove(operation.sequence)?;
          replayed += 1;
          debug!(
            sequence = operation.sequence,
            status = response.status,
            "replayed pending operation"
          );
        }
        Err(error) => {
          warn!(
            sequence = operation.sequence,
            error = %error,
            replayed,
            "replay halted, keeping remaining operations queued"
          );
          return Ok(DrainOutcome::Halted {
            replayed,
            sequence: operation.sequence,
            error,
          });
        }
      }
    }

    Ok(DrainOutcome::Drained { replayed })
  }

  /// Spawn the task that drains on every disconnected -> connected edge.
  ///
  /// Each drain runs in its own task so an edge that arrives mid-drain is
  /// coalesced rather than queued behind it. Abort the handle to unsubscribe.
  pub fn spawn(self: Arc<Self>, monitor: ConnectivityMonitor) -> JoinHandle<()> {
    let mut transitions = Box::pin(monitor.transitions());

    tokio::spawn(async move {
      while let Some(connected) = transitions.next().await {
        if !connected {
          continue;
        }

        let replayer = Arc::clone(&self);
        tokio::spawn(async move {
          match replayer.drain().await {
            Ok(outcome) => debug!(?outcome, "drain finished"),
            Err(e) => warn!(error = %e, "drain aborted by storage failure"),
          }
        });
      }
    })
  }
}
