//! One-shot completion continuations
//!
//! A [`CompletionThunk`] is handed to the connection engine in place of an
//! observer object. The engine may clone it, signal it from any thread, and
//! even signal it more than once; only the first `resolve`/`reject` wins and
//! every later call is ignored. The winner is decided by a compare-and-swap on
//! an atomic flag, so racing completions on different worker threads are safe.

use crate::diagnostics::{Diagnostic, DiagnosticSink, Operation};
use crate::error::RtcError;
use parking_lot::Mutex;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;

type SuccessFn<T> = Box<dyn FnOnce(T) + Send + 'static>;
type FailureFn<E> = Box<dyn FnOnce(E) + Send + 'static>;

/// Error types a thunk can surface to the diagnostic sink
pub trait FailureReport: Send + 'static {
    fn diagnostic(&self, operation: Operation) -> Diagnostic;
}

impl FailureReport for RtcError {
    fn diagnostic(&self, operation: Operation) -> Diagnostic {
        Diagnostic::Negotiation {
            operation,
            error: self.clone(),
        }
    }
}

impl FailureReport for Infallible {
    fn diagnostic(&self, _operation: Operation) -> Diagnostic {
        match *self {}
    }
}

struct ThunkInner<T, E> {
    operation: Operation,
    settled: AtomicBool,
    on_success: Mutex<Option<SuccessFn<T>>>,
    on_failure: Mutex<Option<FailureFn<E>>>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl<T, E> ThunkInner<T, E> {
    /// Claim the single completion slot. Only one caller ever sees `true`.
    fn commit(&self) -> bool {
        self.settled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl<T, E> Drop for ThunkInner<T, E> {
    fn drop(&mut self) {
        if !*self.settled.get_mut() {
            trace!(
                operation = %self.operation,
                "Completion dropped before the engine signalled a result"
            );
        }
    }
}

/// Shared, exactly-once success/failure continuation pair
pub struct CompletionThunk<T, E = RtcError> {
    inner: Arc<ThunkInner<T, E>>,
}

impl<T, E> Clone for CompletionThunk<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> std::fmt::Debug for CompletionThunk<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionThunk")
            .field("operation", &self.inner.operation)
            .field("settled", &self.inner.settled.load(Ordering::Acquire))
            .finish()
    }
}

impl<T, E> CompletionThunk<T, E>
where
    T: Send + 'static,
    E: FailureReport,
{
    /// Create a thunk wired to both continuations
    pub fn new<S, F>(
        operation: Operation,
        diagnostics: Arc<dyn DiagnosticSink>,
        on_success: S,
        on_failure: F,
    ) -> Self
    where
        S: FnOnce(T) + Send + 'static,
        F: FnOnce(E) + Send + 'static,
    {
        Self::from_parts(
            operation,
            diagnostics,
            Some(Box::new(on_success)),
            Some(Box::new(on_failure)),
        )
    }

    /// Create a thunk where either continuation may be absent
    pub fn from_parts(
        operation: Operation,
        diagnostics: Arc<dyn DiagnosticSink>,
        on_success: Option<SuccessFn<T>>,
        on_failure: Option<FailureFn<E>>,
    ) -> Self {
        Self {
            inner: Arc::new(ThunkInner {
                operation,
                settled: AtomicBool::new(false),
                on_success: Mutex::new(on_success),
                on_failure: Mutex::new(on_failure),
                diagnostics,
            }),
        }
    }

    /// A thunk with no continuations; failures are still reported
    pub fn detached(operation: Operation, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        Self::from_parts(operation, diagnostics, None, None)
    }

    /// Complete successfully. Returns `false` if the thunk was already settled.
    pub fn resolve(&self, value: T) -> bool {
        if !self.inner.commit() {
            trace!(operation = %self.inner.operation, "Ignoring redundant resolve");
            return false;
        }

        let callback = self.inner.on_success.lock().take();
        drop(self.inner.on_failure.lock().take());

        if let Some(callback) = callback {
            callback(value);
        }
        true
    }

    /// Complete with an error. The failure is reported to the diagnostic sink
    /// before the failure continuation runs. Returns `false` if the thunk was
    /// already settled.
    pub fn reject(&self, error: E) -> bool {
        if !self.inner.commit() {
            trace!(operation = %self.inner.operation, "Ignoring redundant reject");
            return false;
        }

        self.inner
            .diagnostics
            .report(error.diagnostic(self.inner.operation));

        let callback = self.inner.on_failure.lock().take();
        drop(self.inner.on_success.lock().take());

        if let Some(callback) = callback {
            callback(error);
        }
        true
    }

    /// Complete from a `Result`
    pub fn complete(&self, result: Result<T, E>) -> bool {
        match result {
            Ok(value) => self.resolve(value),
            Err(error) => self.reject(error),
        }
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.inner.settled.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn operation(&self) -> Operation {
        self.inner.operation
    }
}
