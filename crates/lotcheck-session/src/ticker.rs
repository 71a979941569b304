//! Elapsed-time ticker for the wizard display.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

const TICK: Duration = Duration::from_secs(1);

/// Publishes the time elapsed since start once per second.
///
/// Must be created inside a tokio runtime. Dropping the ticker cancels its
/// background task.
#[derive(Debug)]
pub struct ElapsedTicker {
  elapsed: watch::Receiver<Duration>,
  cancel: CancellationToken,
  handle: JoinHandle<()>,
}

impl ElapsedTicker {
  pub fn start() -> Self {
    let started = Instant::now();
    let (sender, elapsed) = watch::channel(Duration::ZERO);
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let handle = tokio::spawn(async move {
      let mut interval = time::interval_at(started + TICK, TICK);
      loop {
        tokio::select! {
          _ = token.cancelled() => break,
          at = interval.tick() => {
            if sender.send(at - started).is_err() {
              break;
            }
          }
        }
      }
    });

    Self {
      elapsed,
      cancel,
      handle,
    }
  }

  /// Elapsed time as of the last tick.
  pub fn elapsed(&self) -> Duration {
    *self.elapsed.borrow()
  }

  /// Watch elapsed-time updates.
  pub fn subscribe(&self) -> watch::Receiver<Duration> {
    self.elapsed.clone()
  }

  /// Stop ticking. The last published value is kept.
  pub fn stop(&self) {
    self.cancel.cancel();
  }

  pub fn is_running(&self) -> bool {
    !self.cancel.is_cancelled() && !self.handle.is_finished()
  }
}

impl Drop for ElapsedTicker {
  fn drop(&mut self) {
    self.cancel.cancel();
  }
}

/// Format a duration as `<m>m<ss>s`.
pub fn format_elapsed(elapsed: Duration) -> String {
  let secs = elapsed.as_secs();
  format!("{}m{:02}s", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_format_elapsed() {
    assert_eq!(format_elapsed(Duration::ZERO), "0m00s");
    assert_eq!(format_elapsed(Duration::from_secs(125)), "2m05s");
    assert_eq!(format_elapsed(Duration::from_millis(59_900)), "0m59s");
    assert_eq!(format_elapsed(Duration::from_secs(3600)), "60m00s");
  }

  #[tokio::test(start_paused = true)]
  async fn test_ticks_once_per_second() {
    let ticker = ElapsedTicker::start();
    assert_eq!(ticker.elapsed(), Duration::ZERO);

    time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(ticker.elapsed(), Duration::from_secs(3));
    assert!(ticker.is_running());
  }

  #[tokio::test(start_paused = true)]
  async fn test_stop_freezes_elapsed() {
    let ticker = ElapsedTicker::start();
    time::sleep(Duration::from_millis(2500)).await;
    ticker.stop();

    time::sleep(Duration::from_secs(5)).await;
    assert_eq!(ticker.elapsed(), Duration::from_secs(2));
    assert!(!ticker.is_running());
  }

  #[tokio::test(start_paused = true)]
  async fn test_drop_cancels_task() {
    let ticker = ElapsedTicker::start();
    let mut updates = ticker.subscribe();
    let token = ticker.cancel.clone();
    drop(ticker);

    assert!(token.is_cancelled());
    time::sleep(Duration::from_secs(3)).await;
    assert!(!updates.has_changed().unwrap_or(false));
  }
}
