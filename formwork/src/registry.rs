//! Per-form orchestration of validation units.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex};

use log::{debug, trace};
use serde::Serialize;
use uuid::Uuid;

use crate::config::{
    DestroyCallback, FormConfig, NormalizedForm, TypingDebounce, ValidationCallback,
    ValidationConfig,
};
use crate::error::ConfigurationError;
use crate::event::{FieldEvent, FieldEventKind};
use crate::result::{ValidationData, aggregate_validity};
use crate::rule::{FailurePolicy, RuleEvaluator};
use crate::submit::SubmitGate;
use crate::sync::lock;
use crate::touch::{FieldTouchTracker, SharedTracker};
use crate::unit::{UnitOptions, ValidationUnit};

/// Unique identifier of one form instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FormId(Uuid);

impl FormId {
    /// Create a new unique form ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for FormId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Latest emission of one unit. `instance` tells a re-added unit apart from
/// the one it replaced under the same name.
#[derive(Debug, Default)]
struct Snapshot {
    instance: u64,
    seq: u64,
    data: ValidationData,
}

#[derive(Default)]
struct Callbacks {
    on_validation: Option<ValidationCallback>,
    on_destroy: Option<DestroyCallback>,
}

/// State shared between a registry and the listeners of its units.
///
/// Lock order: `gate` before `snapshots`. Callbacks run with no lock held.
struct FormHub {
    id: FormId,
    snapshots: Mutex<BTreeMap<String, Snapshot>>,
    gate: Mutex<SubmitGate>,
    callbacks: Mutex<Callbacks>,
}

impl FormHub {
    fn validity(&self) -> Option<bool> {
        let snapshots = lock(&self.snapshots);
        aggregate_validity(snapshots.values().map(|s| &s.data.result))
    }

    fn receive(&self, instance: u64, name: &str, seq: u64, data: &ValidationData) {
        {
            let mut snapshots = lock(&self.snapshots);
            let Some(snapshot) = snapshots
                .get_mut(name)
                .filter(|snapshot| snapshot.instance == instance)
            else {
                trace!("[{}] Ignoring emission of removed validation '{}'", self.id, name);
                return;
            };
            if seq <= snapshot.seq {
                trace!("[{}] Ignoring out-of-order emission of '{}'", self.id, name);
                return;
            }
            snapshot.seq = seq;
            snapshot.data = data.clone();
        }

        let on_validation = lock(&self.callbacks).on_validation.clone();
        if let Some(on_validation) = on_validation {
            on_validation(name, data);
        }
        self.settle_submit();
    }

    fn settle_submit(&self) {
        let action = {
            let mut gate = lock(&self.gate);
            if !gate.is_pending() {
                return;
            }
            gate.notify_validity_changed(self.validity())
        };
        if let Some(action) = action {
            action.run();
        }
    }
}

/// Orchestrates the validation units of one form.
///
/// The UI hands over a fresh [`FormConfig`] on every render through
/// [`reconfigure`](Self::reconfigure); the registry diffs it against the
/// running units, creating, updating or destroying them. Snapshots flow back
/// through the `on_validation` callback and feed aggregate validity and the
/// submit gate.
///
/// Units run their timers on the ambient tokio runtime.
pub struct ValidationRegistry {
    id: FormId,
    units: BTreeMap<String, ValidationUnit>,
    fields: Vec<String>,
    typing: TypingDebounce,
    policy: FailurePolicy,
    tracker: SharedTracker,
    next_instance: u64,
    hub: Arc<FormHub>,
}

impl ValidationRegistry {
    /// Create a registry and its units from the first configuration.
    pub fn new(config: FormConfig) -> Result<Self, ConfigurationError> {
        let form = config.normalize()?;
        let id = FormId::new();
        let mut registry = Self {
            id,
            units: BTreeMap::new(),
            fields: Vec::new(),
            typing: form.typing,
            policy: form.failure_policy,
            tracker: FieldTouchTracker::shared(),
            next_instance: 0,
            hub: Arc::new(FormHub {
                id,
                snapshots: Mutex::new(BTreeMap::new()),
                gate: Mutex::new(SubmitGate::new()),
                callbacks: Mutex::new(Callbacks::default()),
            }),
        };
        debug!("[{}] Form created with {} validations", id, form.validations.len());
        registry.apply(form)?;
        Ok(registry)
    }

    /// Apply the configuration of a new render.
    ///
    /// Every fatal condition is checked before anything changes, so on error
    /// the running units are untouched.
    pub fn reconfigure(&mut self, config: FormConfig) -> Result<(), ConfigurationError> {
        let form = config.normalize()?;
        if form.typing != self.typing {
            return Err(ConfigurationError::TypingDebounceChanged);
        }
        if form.failure_policy != self.policy {
            return Err(ConfigurationError::FailurePolicyChanged);
        }
        for (name, config) in &form.validations {
            if let Some(unit) = self.units.get(name) {
                unit.check_update(config)?;
            }
        }
        self.apply(form)
    }

    fn apply(&mut self, form: NormalizedForm) -> Result<(), ConfigurationError> {
        {
            let mut callbacks = lock(&self.hub.callbacks);
            callbacks.on_validation = form.on_validation;
            callbacks.on_destroy = form.on_destroy;
        }
        self.fields = form.fields;

        let mut changed = false;
        let mut configured = BTreeSet::new();
        for (name, config) in form.validations {
            configured.insert(name.clone());
            match self.units.get(&name) {
                Some(unit) => changed |= unit.update(config)?,
                None => {
                    self.create_unit(name, config);
                    changed = true;
                }
            }
        }

        let removed: Vec<String> = self
            .units
            .keys()
            .filter(|name| !configured.contains(*name))
            .cloned()
            .collect();
        for name in removed {
            self.remove_unit(&name);
            changed = true;
        }

        if changed && lock(&self.hub.gate).cancel() {
            debug!("[{}] Validation set changed, pending submit dropped", self.id);
        }
        Ok(())
    }

    fn create_unit(&mut self, name: String, config: ValidationConfig) {
        self.next_instance += 1;
        let instance = self.next_instance;
        // The snapshot must exist before the unit can emit into it.
        lock(&self.hub.snapshots).insert(
            name.clone(),
            Snapshot {
                instance,
                ..Snapshot::default()
            },
        );

        let hub = Arc::downgrade(&self.hub);
        let options = UnitOptions {
            typing: self.typing,
            evaluator: RuleEvaluator::new(self.policy),
            listener: None,
        }
        .listener(move |name, seq, data| {
            if let Some(hub) = hub.upgrade() {
                hub.receive(instance, name, seq, data);
            }
        });

        debug!("[{}] Adding validation '{}'", self.id, name);
        let unit = ValidationUnit::new(name.clone(), config, Arc::clone(&self.tracker), options);
        self.units.insert(name, unit);
    }

    fn remove_unit(&mut self, name: &str) {
        let snapshot = lock(&self.hub.snapshots).remove(name);
        if let Some(unit) = self.units.remove(name) {
            unit.destroy();
        }
        debug!("[{}] Removed validation '{}'", self.id, name);

        let on_destroy = lock(&self.hub.callbacks).on_destroy.clone();
        if let (Some(on_destroy), Some(snapshot)) = (on_destroy, snapshot) {
            on_destroy(name, &snapshot.data);
        }
    }

    /// Report a field interaction.
    ///
    /// Omitted fields mean every configured field of the form, or every field
    /// any validation refers to when the form declares none. `change` and
    /// `reset` abandon a pending submit.
    pub fn dispatch_field_event(&self, event: FieldEvent) -> Result<(), ConfigurationError> {
        if let Some(debounce) = event.debounce
            && event.kind != FieldEventKind::Change
        {
            return Err(ConfigurationError::EventDebounceNotAllowed {
                kind: event.kind,
                debounce,
            });
        }
        self.forward(event);
        Ok(())
    }

    fn forward(&self, mut event: FieldEvent) {
        let whole_form = event.fields.is_none();
        let fields = match event.fields.take() {
            Some(fields) => fields,
            None => self.all_fields(),
        };
        trace!("[{}] {} event for {:?}", self.id, event.kind, fields);

        if matches!(event.kind, FieldEventKind::Change | FieldEventKind::Reset)
            && lock(&self.hub.gate).cancel()
        {
            debug!("[{}] Pending submit abandoned by {} event", self.id, event.kind);
        }

        {
            let mut tracker = lock(&self.tracker);
            match event.kind {
                FieldEventKind::Reset if whole_form => tracker.reset(None),
                FieldEventKind::Reset => tracker.reset(Some(fields.as_slice())),
                kind => tracker.record_event(kind, &fields),
            }
        }

        event.fields = Some(fields);
        for unit in self.units.values() {
            unit.handle_event(&event);
        }
    }

    fn all_fields(&self) -> Vec<String> {
        if !self.fields.is_empty() {
            return self.fields.clone();
        }
        let mut fields = BTreeSet::new();
        for unit in self.units.values() {
            fields.extend(unit.config().fields.all().cloned());
        }
        fields.into_iter().collect()
    }

    /// Tri-state AND over every validation's latest result.
    pub fn aggregate_validity(&self) -> Option<bool> {
        self.hub.validity()
    }

    /// Latest snapshot of every validation.
    pub fn validation_data(&self) -> BTreeMap<String, ValidationData> {
        lock(&self.hub.snapshots)
            .iter()
            .map(|(name, snapshot)| (name.clone(), snapshot.data.clone()))
            .collect()
    }

    /// Latest snapshot of one validation.
    pub fn data(&self, name: &str) -> Option<ValidationData> {
        lock(&self.hub.snapshots)
            .get(name)
            .map(|snapshot| snapshot.data.clone())
    }

    /// Names of the configured validations.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    /// A running unit.
    pub fn unit(&self, name: &str) -> Option<&ValidationUnit> {
        self.units.get(name)
    }

    /// Identifier of this form instance.
    pub fn form_id(&self) -> FormId {
        self.id
    }

    /// Call `on_valid` or `on_invalid` once aggregate validity is known.
    ///
    /// Runs the callback immediately if validity is already known.
    pub fn request_submit<V, I>(&self, on_valid: V, on_invalid: I)
    where
        V: FnOnce() + Send + 'static,
        I: FnOnce() + Send + 'static,
    {
        let action = {
            let mut gate = lock(&self.hub.gate);
            gate.request_submit(on_valid, on_invalid, self.hub.validity())
        };
        if let Some(action) = action {
            action.run();
        }
    }

    /// Mark every field submitted, then [`request_submit`](Self::request_submit).
    pub fn submit<V, I>(&self, on_valid: V, on_invalid: I)
    where
        V: FnOnce() + Send + 'static,
        I: FnOnce() + Send + 'static,
    {
        self.forward(FieldEvent::submit());
        self.request_submit(on_valid, on_invalid);
    }

    /// Abandon the pending submit. Returns whether one was pending.
    pub fn cancel_submit(&self) -> bool {
        lock(&self.hub.gate).cancel()
    }

    /// Check if a submit is waiting for validation to settle.
    pub fn is_submitting(&self) -> bool {
        lock(&self.hub.gate).is_pending()
    }

    /// Destroy every unit and drop the pending submit. No callback fires
    /// afterwards.
    pub fn shutdown(&mut self) {
        if self.units.is_empty() {
            return;
        }
        lock(&self.hub.snapshots).clear();
        for unit in self.units.values() {
            unit.destroy();
        }
        self.units.clear();
        lock(&self.hub.gate).cancel();
        debug!("[{}] Form shut down", self.id);
    }
}

impl Drop for ValidationRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ValidationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationRegistry")
            .field("id", &self.id)
            .field("units", &self.units.keys().collect::<Vec<_>>())
            .field("fields", &self.fields)
            .finish()
    }
}
