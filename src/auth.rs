//! Credentials and the authentication-failure channel.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Environment variables checked by [`EnvToken`], in order.
pub const TOKEN_ENV_VARS: [&str; 2] = ["REQCACHE_TOKEN", "GITHUB_TOKEN"];

/// Supplies the bearer token for outgoing requests.
///
/// The token is opaque here; it is copied into the Authorization header
/// and never inspected.
pub trait CredentialProvider: Send + Sync {
  fn token(&self) -> Option<String>;
}

/// No credentials: requests go out unauthenticated.
pub struct Anonymous;

impl CredentialProvider for Anonymous {
  fn token(&self) -> Option<String> {
    None
  }
}

/// A fixed token.
pub struct StaticToken(pub String);

impl CredentialProvider for StaticToken {
  fn token(&self) -> Option<String> {
    Some(self.0.clone())
  }
}

/// Token read from the environment on every request.
///
/// Checks REQCACHE_TOKEN first, then GITHUB_TOKEN as fallback.
#[derive(Default)]
pub struct EnvToken;

impl CredentialProvider for EnvToken {
  fn token(&self) -> Option<String> {
    TOKEN_ENV_VARS
      .iter()
      .find_map(|name| std::env::var(name).ok())
      .filter(|token| !token.is_empty())
  }
}

/// Message published when credentials were rejected. Carries no data;
/// receivers are expected to re-check the active credential themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthFailure;

/// Publish/subscribe channel for [`AuthFailure`].
#[derive(Clone)]
pub struct AuthFailureSignal {
  sender: broadcast::Sender<AuthFailure>,
}

impl Default for AuthFailureSignal {
  fn default() -> Self {
    Self::new()
  }
}

impl AuthFailureSignal {
  pub fn new() -> Self {
    let (sender, _) = broadcast::channel(16);
    Self { sender }
  }

  /// Receive every failure published from now on.
  pub fn subscribe(&self) -> broadcast::Receiver<AuthFailure> {
    self.sender.subscribe()
  }

  /// Run `handler` for each published failure until the returned
  /// [`Subscription`] is disposed or dropped. Must be called inside a
  /// tokio runtime.
  pub fn on_failure<F>(&self, handler: F) -> Subscription
  where
    F: Fn() + Send + 'static,
  {
    let mut rx = self.sender.subscribe();
    let task = tokio::spawn(async move {
      loop {
        match rx.recv().await {
          Ok(AuthFailure) => handler(),
          // Skipped messages still count once each
          Err(broadcast::error::RecvError::Lagged(skipped)) => {
            for _ in 0..skipped {
              handler();
            }
          }
          Err(broadcast::error::RecvError::Closed) => break,
        }
      }
    });

    Subscription { task }
  }

  /// Notify subscribers. Returns how many receivers got the message.
  pub fn publish(&self) -> usize {
    self.sender.send(AuthFailure).unwrap_or(0)
  }

  pub fn subscriber_count(&self) -> usize {
    self.sender.receiver_count()
  }
}

/// Handle to a handler registered with [`AuthFailureSignal::on_failure`].
pub struct Subscription {
  task: JoinHandle<()>,
}

impl Subscription {
  /// Stop delivering failures to the handler.
  pub fn dispose(self) {
    drop(self);
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    self.task.abort();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  #[tokio::test]
  async fn test_publish_reaches_receiver() {
    let signal = AuthFailureSignal::new();
    let mut rx = signal.subscribe();

    assert_eq!(signal.publish(), 1);
    assert_eq!(rx.recv().await.unwrap(), AuthFailure);
    assert!(rx.try_recv().is_err());
  }

  #[test]
  fn test_publish_without_subscribers() {
    let signal = AuthFailureSignal::new();
    assert_eq!(signal.publish(), 0);
  }

  #[tokio::test]
  async fn test_handler_runs_until_disposed() {
    let signal = AuthFailureSignal::new();
    let count = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&count);

    let subscription = signal.on_failure(move || {
      counter.fetch_add(1, Ordering::SeqCst);
    });

    signal.publish();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    subscription.dispose();
    tokio::time::sleep(Duration::from_millis(20)).await;
    signal.publish();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_handler_counts_every_failure_past_channel_capacity() {
    let signal = AuthFailureSignal::new();
    let count = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&count);

    let _subscription = signal.on_failure(move || {
      counter.fetch_add(1, Ordering::SeqCst);
    });

    // The handler task can't run until we yield, so its receiver lags.
    for _ in 0..40 {
      signal.publish();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(count.load(Ordering::SeqCst), 40);
  }

  #[test]
  fn test_static_token_is_verbatim() {
    let provider = StaticToken("  abc ".to_string());
    assert_eq!(provider.token().as_deref(), Some("  abc "));
    assert_eq!(Anonymous.token(), None);
  }
}
