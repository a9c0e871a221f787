//! Asynchronous accessory name resolution
//!
//! Names come from the backing item and may take a while (or forever) to
//! resolve. The resolution future is shared: every caller waits on the same
//! result, and once started it keeps running in the background even when a
//! caller gives up waiting.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};

use super::types::AccessoryId;
use crate::{Error, Result};

type NameFuture = Shared<BoxFuture<'static, std::result::Result<String, String>>>;

/// Outcome of a bounded wait on an accessory name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameResolution {
    /// Name is known
    Resolved(String),

    /// Still resolving when the wait ran out
    Pending,

    /// Resolution completed with an error
    Failed(String),
}

impl NameResolution {
    /// The resolved name, if any
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Resolved(name) => Some(name),
            Self::Pending | Self::Failed(_) => None,
        }
    }
}

impl std::fmt::Display for NameResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resolved(name) => write!(f, "{name}"),
            Self::Pending => write!(f, "<unknown>"),
            Self::Failed(reason) => write!(f, "<error: {reason}>"),
        }
    }
}

/// Handle to an accessory's name
pub struct AccessoryName {
    future: NameFuture,
    started: AtomicBool,
}

impl AccessoryName {
    /// A name that is already known
    pub fn fixed(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            future: futures::future::ready(Ok::<_, String>(name)).boxed().shared(),
            started: AtomicBool::new(true),
        }
    }

    /// A name produced by a future
    ///
    /// The future is not polled until the first call to [`Self::resolve`].
    /// A panic inside it is reported as a failed resolution.
    pub fn resolving<F>(future: F) -> Self
    where
        F: Future<Output = Result<String>> + Send + 'static,
    {
        let future = AssertUnwindSafe(future)
            .catch_unwind()
            .map(|outcome| match outcome {
                Ok(Ok(name)) => Ok(name),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err("name resolver panicked".to_string()),
            })
            .boxed()
            .shared();

        Self {
            future,
            started: AtomicBool::new(false),
        }
    }

    /// Wait up to `wait` for the name
    ///
    /// The first call spawns the resolution onto the runtime so it makes
    /// progress independently of any waiter. Timing out abandons the wait,
    /// not the resolution.
    ///
    /// # Errors
    ///
    /// Returns `Error::ResolutionTimeout` if the name is still pending after
    /// `wait`, or `Error::ResolutionFailed` if resolution failed
    pub async fn resolve(&self, accessory: AccessoryId, wait: Duration) -> Result<String> {
        if !self.started.swap(true, Ordering::AcqRel) {
            let driver = self.future.clone();
            tokio::spawn(async move {
                let _ = driver.await;
            });
        }

        match tokio::time::timeout(wait, self.future.clone()).await {
            Ok(Ok(name)) => Ok(name),
            Ok(Err(reason)) => Err(Error::ResolutionFailed {
                accessory: accessory.to_string(),
                reason,
            }),
            Err(_) => Err(Error::ResolutionTimeout {
                accessory: accessory.to_string(),
                after: wait,
            }),
        }
    }

    /// The name if resolution already finished successfully, without waiting
    #[must_use]
    pub fn peek(&self) -> Option<String> {
        self.future.peek().and_then(|r| r.as_ref().ok().cloned())
    }
}

impl std::fmt::Debug for AccessoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessoryName")
            .field("resolved", &self.peek())
            .finish_non_exhaustive()
    }
}
