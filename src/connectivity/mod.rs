//! Connectivity state and its transition feed.
//!
//! The feed side ([`ConnectivitySender`]) is driven by whatever knows about
//! the network: the HTTP [`probe`], a platform callback, or a test. The read
//! side ([`ConnectivityMonitor`]) answers "connected right now?" and hands out
//! streams of transitions.

pub mod probe;

use futures::Stream;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Transitions buffered per subscriber before it starts lagging.
const TRANSITION_BUFFER: usize = 64;

struct Shared {
  connected: Mutex<bool>,
  events: broadcast::Sender<bool>,
}

/// Create a connected sender/monitor pair with the given initial state.
pub fn channel(initially_connected: bool) -> (ConnectivitySender, ConnectivityMonitor) {
  let (events, _) = broadcast::channel(TRANSITION_BUFFER);
  let shared = Arc::new(Shared {
    connected: Mutex::new(initially_connected),
    events,
  });

  (
    ConnectivitySender {
      shared: Arc::clone(&shared),
    },
    ConnectivityMonitor { shared },
  )
}

/// Feed side of the connectivity signal.
#[derive(Clone)]
pub struct ConnectivitySender {
  shared: Arc<Shared>,
}

impl ConnectivitySender {
  /// Report the current connectivity.
  ///
  /// A value equal to the current state is dropped, so subscribers never see
  /// two identical transitions in a row. Returns whether the state changed.
  pub fn set(&self, connected: bool) -> bool {
    let mut current = self
      .shared
      .connected
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    if *current == connected {
      return false;
    }
    *current = connected;

    info!(connected, "connectivity changed");
    // No subscribers is fine
    let _ = self.shared.events.send(connected);
    true
  }
}

/// Read side of the connectivity signal.
#[derive(Clone)]
pub struct ConnectivityMonitor {
  shared: Arc<Shared>,
}

impl ConnectivityMonitor {
  /// Point-in-time connectivity.
  pub fn is_connected_now(&self) -> bool {
    *self
      .shared
      .connected
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }

  /// Stream of connectivity changes from now on.
  ///
  /// `true` means the endpoint became reachable, `false` unreachable. Each
  /// call subscribes afresh; the stream ends once every sender and monitor
  /// sharing this state has been dropped.
  pub fn transitions(&self) -> impl Stream<Item = bool> + Send + 'static {
    let rx = self.shared.events.subscribe();

    futures::stream::unfold(rx, |mut rx| async move {
      loop {
        match rx.recv().await {
          Ok(connected) => return Some((connected, rx)),
          Err(RecvError::Lagged(skipped)) => {
            warn!(skipped, "connectivity subscriber lagged");
          }
          Err(RecvError::Closed) => return None,
        }
      }
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use futures::StreamExt;

  #[test]
  fn test_initial_state() {
    let (_tx, monitor) = channel(false);
    assert!(!monitor.is_connected_now());

    let (_tx, monitor) = channel(true);
    assert!(monitor.is_connected_now());
  }

  #[tokio::test]
  async fn test_duplicates_suppressed() {
    let (tx, monitor) = channel(false);
    let mut transitions = Box::pin(monitor.transitions());

    assert!(!tx.set(false));
    assert!(tx.set(true));
    assert!(!tx.set(true));
    assert!(tx.set(false));
    assert!(tx.set(true));

    let seen: Vec<bool> = transitions.by_ref().take(3).collect().await;
    assert_eq!(seen, vec![true, false, true]);
    assert!(monitor.is_connected_now());
  }

  #[tokio::test]
  async fn test_stream_starts_at_subscription() {
    let (tx, monitor) = channel(false);
    tx.set(true);

    let transitions = monitor.transitions();
    tx.set(false);
    tx.set(true);

    let seen: Vec<bool> = transitions.take(2).collect().await;
    assert_eq!(seen, vec![false, true]);
  }
}
