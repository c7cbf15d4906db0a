//! Injected logging capability.
//!
//! A [`Logger`] carries an optional [`tracing::Dispatch`]. When one is set,
//! everything the router logs (its serve loop, per-request tasks and the
//! [`crate::middleware::logger`] middleware) is emitted into it.
//!
//! Without one, events go to whatever subscriber is the current default for
//! the calling thread, normally the global subscriber installed by the
//! application. This crate never installs or replaces a global subscriber.

use std::future::Future;
use tracing::instrument::{WithDispatch, WithSubscriber};
use tracing::Dispatch;

/// Logging capability handed to a router.
#[derive(Debug, Clone, Default)]
pub struct Logger {
    dispatch: Option<Dispatch>,
}

impl Logger {
    /// Log into the given subscriber.
    #[must_use]
    pub fn new(dispatch: impl Into<Dispatch>) -> Self {
        Self {
            dispatch: Some(dispatch.into()),
        }
    }

    /// Log into the caller's current default subscriber.
    #[must_use]
    pub fn fallback() -> Self {
        Self::default()
    }

    /// Check if this logger uses the fallback subscriber.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.dispatch.is_none()
    }

    /// Run `f` with this logger's subscriber as the default.
    pub fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }

    /// Attach this logger's subscriber to a future.
    ///
    /// The fallback attaches the subscriber current at the call site, so
    /// spawned tasks keep logging where their spawner did.
    pub fn instrument<F: Future>(&self, future: F) -> WithDispatch<F> {
        match &self.dispatch {
            Some(dispatch) => future.with_subscriber(dispatch.clone()),
            None => future.with_current_subscriber(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    struct CountEvents(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for CountEvents {
        fn on_event(&self, _event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// A logger whose subscriber counts every event it receives.
    pub(crate) fn counting_logger() -> (Logger, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(CountEvents(Arc::clone(&count)));
        (Logger::new(subscriber), count)
    }

    #[test]
    fn test_in_scope_uses_injected_subscriber() {
        let (log, count) = counting_logger();
        log.in_scope(|| tracing::info!("inside"));
        tracing::info!("outside");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fallback_has_no_dispatch() {
        assert!(Logger::fallback().is_fallback());
        assert!(!counting_logger().0.is_fallback());
    }
}
