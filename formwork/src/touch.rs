//! Tracks which fields the user has interacted with.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::event::FieldEventKind;

/// Touch tracker shared between a registry and its units.
pub type SharedTracker = Arc<Mutex<FieldTouchTracker>>;

/// Records, per field, whether it has been changed, blurred or submitted.
///
/// A field is *touched* once it appears in any of the three sets.
#[derive(Debug, Clone, Default)]
pub struct FieldTouchTracker {
    changed: BTreeSet<String>,
    blurred: BTreeSet<String>,
    submitted: BTreeSet<String>,
}

impl FieldTouchTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty tracker ready to be shared.
    pub fn shared() -> SharedTracker {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Record an interaction with `fields`.
    ///
    /// `Reset` is a no-op here: the owner decides what to clear and calls
    /// [`reset`](Self::reset).
    pub fn record_event<'a, I>(&mut self, kind: FieldEventKind, fields: I)
    where
        I: IntoIterator<Item = &'a String>,
    {
        let set = match kind {
            FieldEventKind::Change => &mut self.changed,
            FieldEventKind::Blur => &mut self.blurred,
            FieldEventKind::Submit => &mut self.submitted,
            FieldEventKind::Reset => return,
        };
        set.extend(fields.into_iter().cloned());
    }

    /// Check if a field has received any change, blur or submit.
    pub fn is_touched(&self, field: &str) -> bool {
        self.changed.contains(field) || self.blurred.contains(field) || self.submitted.contains(field)
    }

    /// Check if every field in `fields` has been touched.
    pub fn all_touched<'a, I>(&self, fields: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        fields.into_iter().all(|f| self.is_touched(f))
    }

    /// Check if the user has left the field at least once (blur or submit).
    pub fn has_settled(&self, field: &str) -> bool {
        self.blurred.contains(field) || self.submitted.contains(field)
    }

    /// Forget interactions with `fields`, or with every field when `None`.
    pub fn reset(&mut self, fields: Option<&[String]>) {
        match fields {
            None => {
                self.changed.clear();
                self.blurred.clear();
                self.submitted.clear();
            }
            Some(fields) => {
                for field in fields {
                    self.changed.remove(field);
                    self.blurred.remove(field);
                    self.submitted.remove(field);
                }
            }
        }
    }
}
