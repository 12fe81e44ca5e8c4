//! Deferred submit.
//!
//! A submit request is buffered until the form's aggregate validity is
//! known, then exactly one of its two callbacks runs. Editing the form in
//! between abandons the request.

use std::fmt;

use log::{debug, trace};

/// Callback invoked with the submit decision.
pub type SubmitCallback = Box<dyn FnOnce() + Send>;

/// A decided submit, ready to run.
///
/// The gate never runs callbacks itself; the owner runs the action once it
/// has released its own locks, so the callback may talk to the form again.
pub struct SubmitAction {
    valid: bool,
    callback: SubmitCallback,
}

impl SubmitAction {
    /// Whether the valid branch was chosen.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Run the chosen callback.
    pub fn run(self) {
        (self.callback)();
    }
}

impl fmt::Debug for SubmitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitAction").field("valid", &self.valid).finish()
    }
}

struct PendingSubmit {
    on_valid: SubmitCallback,
    on_invalid: SubmitCallback,
}

impl PendingSubmit {
    fn decide(self, valid: bool) -> SubmitAction {
        debug!("Submit resolved as {}", if valid { "valid" } else { "invalid" });
        SubmitAction {
            valid,
            callback: if valid { self.on_valid } else { self.on_invalid },
        }
    }
}

/// `Idle` or `Pending(on_valid, on_invalid)`.
#[derive(Default)]
pub struct SubmitGate {
    pending: Option<PendingSubmit>,
}

impl SubmitGate {
    /// Create an idle gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a submit given the current aggregate validity.
    ///
    /// Decides at once when `validity` is known; otherwise the request waits
    /// (replacing any earlier pending one) for
    /// [`notify_validity_changed`](Self::notify_validity_changed).
    pub fn request_submit<V, I>(
        &mut self,
        on_valid: V,
        on_invalid: I,
        validity: Option<bool>,
    ) -> Option<SubmitAction>
    where
        V: FnOnce() + Send + 'static,
        I: FnOnce() + Send + 'static,
    {
        if self.pending.take().is_some() {
            trace!("Replacing pending submit");
        }
        let pending = PendingSubmit {
            on_valid: Box::new(on_valid),
            on_invalid: Box::new(on_invalid),
        };
        match validity {
            Some(valid) => Some(pending.decide(valid)),
            None => {
                trace!("Submit waiting for validation to settle");
                self.pending = Some(pending);
                None
            }
        }
    }

    /// Decide the pending submit if `validity` is known.
    pub fn notify_validity_changed(&mut self, validity: Option<bool>) -> Option<SubmitAction> {
        let valid = validity?;
        self.pending.take().map(|pending| pending.decide(valid))
    }

    /// Abandon the pending submit without calling either callback. Returns
    /// whether anything was pending.
    pub fn cancel(&mut self) -> bool {
        let cancelled = self.pending.take().is_some();
        if cancelled {
            debug!("Pending submit cancelled");
        }
        cancelled
    }

    /// Check if a submit is waiting.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl fmt::Debug for SubmitGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitGate")
            .field("pending", &self.is_pending())
            .finish()
    }
}
