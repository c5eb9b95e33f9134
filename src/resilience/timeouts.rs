//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap connect attempts and health probes with a deadline
//! - Keep "deadline elapsed" distinct from the operation's own error
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities, so paused test time applies
//! - A timed-out future is dropped; nothing keeps running behind it

use std::future::Future;
use std::time::Duration;

/// Outcome of a deadline-bounded fallible operation that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bounded<E> {
    /// The deadline elapsed first.
    Elapsed(Duration),
    /// The operation finished with its own error.
    Failed(E),
}

/// Run `fut`, failing with [`Bounded::Elapsed`] once `deadline` passes.
pub async fn within<F, T, E>(deadline: Duration, fut: F) -> Result<T, Bounded<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(Bounded::Failed(e)),
        Err(_) => Err(Bounded::Elapsed(deadline)),
    }
}
