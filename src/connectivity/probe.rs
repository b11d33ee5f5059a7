//! Reachability probe that feeds a [`ConnectivitySender`].

use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

use super::ConnectivitySender;

/// Check whether `url` answers at all.
///
/// Any HTTP response counts as reachable, whatever its status: the question
/// is whether the network path works, not whether the resource exists.
pub async fn check(client: &reqwest::Client, url: &Url) -> bool {
  match client.head(url.clone()).send().await {
    Ok(response) => {
      debug!(status = %response.status(), %url, "probe reached endpoint");
      true
    }
    Err(e) => {
      debug!(error = %e, %url, "probe failed");
      false
    }
  }
}

/// Spawn a task that probes `url` every `interval` and reports the result.
///
/// The first probe runs immediately. Abort the returned handle to stop.
pub fn spawn_probe(
  sender: ConnectivitySender,
  url: Url,
  interval: Duration,
  timeout: Duration,
) -> reqwest::Result<JoinHandle<()>> {
  let client = reqwest::Client::builder().timeout(timeout).build()?;

  Ok(tokio::spawn(async move {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
      ticker.tick().await;
      sender.set(check(&client, &url).await);
    }
  }))
}
