//! Write-side counterpart to [`Query`](crate::query::Query).
//!
//! A `Mutation<V, R>` runs one request per `mutate(vars)` call and moves through
//! idle -> submitting -> settled. Results are picked up by `poll()` from the UI loop.

use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationState<R> {
  Idle,
  Submitting,
  Success(R),
  Error(String),
}

impl<R> MutationState<R> {
  pub fn error(&self) -> Option<&str> {
    match self {
      MutationState::Error(e) => Some(e),
      _ => None,
    }
  }
}

type BoxFuture<R> = Pin<Box<dyn Future<Output = Result<R, String>> + Send>>;

type MutateFn<V, R> = Box<dyn Fn(V) -> BoxFuture<R> + Send + Sync>;

pub struct Mutation<V, R> {
  state: MutationState<R>,
  mutate_fn: MutateFn<V, R>,
  receiver: Option<mpsc::UnboundedReceiver<Result<R, String>>>,
}

impl<V: Send + 'static, R: Clone + Send + 'static> Mutation<V, R> {
  pub fn new<F, Fut>(mutate_fn: F) -> Self
  where
    F: Fn(V) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, String>> + Send + 'static,
  {
    Self {
      state: MutationState::Idle,
      mutate_fn: Box::new(move |vars| Box::pin(mutate_fn(vars))),
      receiver: None,
    }
  }

  pub fn state(&self) -> &MutationState<R> {
    &self.state
  }

  /// Start the request. A result still pending from an earlier call is dropped;
  /// that request runs to completion regardless.
  pub fn mutate(&mut self, vars: V) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = MutationState::Submitting;

    let future = (self.mutate_fn)(vars);
    tokio::spawn(async move {
      let _ = tx.send(future.await);
    });
  }

  /// Returns the outcome once, on the poll where the request settles.
  pub fn poll(&mut self) -> Option<Result<R, String>> {
    let receiver = self.receiver.as_mut()?;

    let outcome = match receiver.try_recv() {
      Ok(outcome) => outcome,
      Err(mpsc::error::TryRecvError::Empty) => return None,
      Err(mpsc::error::TryRecvError::Disconnected) => Err("Mutation was cancelled".to_string()),
    };

    self.receiver = None;
    self.state = match &outcome {
      Ok(data) => MutationState::Success(data.clone()),
      Err(e) => MutationState::Error(e.clone()),
    };
    Some(outcome)
  }

  /// Back to idle, forgetting the last outcome.
  pub fn reset(&mut self) {
    self.receiver = None;
    self.state = MutationState::Idle;
  }
}

impl<V, R: std::fmt::Debug> std::fmt::Debug for Mutation<V, R> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Mutation")
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  async fn settle<V: Send + 'static, R: Clone + Send + 'static>(
    mutation: &mut Mutation<V, R>,
  ) -> Result<R, String> {
    for _ in 0..50 {
      if let Some(outcome) = mutation.poll() {
        return outcome;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("mutation did not settle");
  }

  #[tokio::test]
  async fn test_success_settles_once() {
    let mut mutation = Mutation::new(|n: i32| async move { Ok::<_, String>(n * 2) });
    assert_eq!(mutation.state(), &MutationState::Idle);

    mutation.mutate(21);
    assert_eq!(mutation.state(), &MutationState::Submitting);

    assert_eq!(settle(&mut mutation).await, Ok(42));
    assert_eq!(mutation.state(), &MutationState::Success(42));
    assert_eq!(mutation.poll(), None);
  }

  #[tokio::test]
  async fn test_error_is_inert_value() {
    let mut mutation: Mutation<(), ()> = Mutation::new(|_| async { Err("nope".to_string()) });
    mutation.mutate(());

    assert_eq!(settle(&mut mutation).await, Err("nope".to_string()));
    assert_eq!(mutation.state().error(), Some("nope"));

    mutation.reset();
    assert_eq!(mutation.state(), &MutationState::Idle);
  }
}
