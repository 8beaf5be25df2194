//! Cross-cutting traits.

mod cancellation;

pub use cancellation::{Cancellable, CancellationToken};
