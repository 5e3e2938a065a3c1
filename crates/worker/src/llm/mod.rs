pub mod adapter;
pub mod executor;
pub mod mock;
pub mod remote;
pub mod types;

use std::future::Future;
use std::pin::Pin;

pub use types::LlmError;

/// A single text-completion call. Object-safe via manual future boxing,
/// matching the callable-trait shape the rest of this workspace uses for
/// swappable provider backends.
pub trait LlmProvider: Send + Sync {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>>;
}
