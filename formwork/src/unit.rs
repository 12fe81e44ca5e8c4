//! Lifecycle of one named validation.
//!
//! A [`ValidationUnit`] owns two independent debounced pipelines:
//!
//! - **result**: rules are re-evaluated (debounced by the validation's
//!   debounce) whenever their definitions or arguments change. Every
//!   evaluation carries a generation number; a result whose generation is no
//!   longer current is dropped, so a slow stale evaluation never overwrites
//!   fresher state.
//! - **visibility**: a change to a `depends_on` field hides the result at
//!   once and schedules a recompute after the typing debounce; blur, submit
//!   and reset recompute immediately.
//!
//! The merged [`ValidationData`] is pushed to the unit's listener only when
//! it differs from the previous snapshot.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, trace};
use tokio::task::JoinHandle;

use crate::config::{TypingDebounce, ValidationConfig};
use crate::debounce::Debouncer;
use crate::error::ConfigurationError;
use crate::event::{FieldEvent, FieldEventKind};
use crate::result::{ValidationData, ValidationResult};
use crate::rule::{Evaluation, RuleEvaluator};
use crate::sync::lock;
use crate::touch::SharedTracker;

/// Receives `(validation name, emission sequence, snapshot)`.
///
/// The sequence number strictly increases per unit, so a receiver can drop
/// an emission that arrives after a newer one.
pub type UnitListener = Arc<dyn Fn(&str, u64, &ValidationData) + Send + Sync>;

/// Settings a unit keeps for its whole life.
#[derive(Clone, Default)]
pub struct UnitOptions {
    /// How long to hide the result after an edit.
    pub typing: TypingDebounce,
    /// Evaluator (and with it the failure policy).
    pub evaluator: RuleEvaluator,
    /// Where snapshots go.
    pub listener: Option<UnitListener>,
}

impl UnitOptions {
    /// Set the listener.
    pub fn listener<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, u64, &ValidationData) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for UnitOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOptions")
            .field("typing", &self.typing)
            .field("evaluator", &self.evaluator)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

/// What a unit is currently waiting for. Both can be true at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitActivity {
    /// An evaluation is debounced or in flight.
    pub awaiting_result: bool,
    /// A visibility recompute is debounced.
    pub awaiting_visibility: bool,
}

impl UnitActivity {
    /// Check if nothing is pending.
    pub fn is_idle(&self) -> bool {
        !self.awaiting_result && !self.awaiting_visibility
    }
}

struct Emission {
    seq: u64,
    data: ValidationData,
}

struct UnitState {
    config: ValidationConfig,
    data: ValidationData,
    /// `depends_on` fields edited within the current typing window.
    typing: BTreeSet<String>,
    generation: u64,
    seq: u64,
    evaluation: Option<JoinHandle<()>>,
    destroyed: bool,
}

struct UnitShared {
    name: String,
    typing_debounce: TypingDebounce,
    evaluator: RuleEvaluator,
    tracker: SharedTracker,
    listener: Option<UnitListener>,
    results: Debouncer,
    visibility: Debouncer,
    state: Mutex<UnitState>,
}

impl UnitShared {
    fn commit(
        state: &mut UnitState,
        result: Option<ValidationResult>,
        show: Option<bool>,
    ) -> Option<Emission> {
        if state.destroyed {
            return None;
        }
        let mut next = state.data.clone();
        if let Some(result) = result {
            next.result = result;
        }
        if let Some(show) = show {
            next.show = show;
        }
        if next == state.data {
            return None;
        }
        state.data = next.clone();
        state.seq += 1;
        Some(Emission {
            seq: state.seq,
            data: next,
        })
    }

    fn emit(&self, emission: Option<Emission>) {
        if let (Some(emission), Some(listener)) = (emission, &self.listener) {
            listener(&self.name, emission.seq, &emission.data);
        }
    }

    fn invalidate(state: &mut UnitState) {
        state.generation += 1;
        if let Some(task) = state.evaluation.take() {
            task.abort();
        }
    }

    fn visible(&self, state: &UnitState) -> bool {
        state.typing.is_empty() && lock(&self.tracker).all_touched(&state.config.fields.need_touch)
    }

    fn typing_delay(&self, edited: &[String]) -> Duration {
        let tracker = lock(&self.tracker);
        if edited.iter().all(|f| tracker.has_settled(f)) {
            self.typing_debounce.after_blur
        } else {
            self.typing_debounce.before_blur
        }
    }

    fn request_evaluation(self: &Arc<Self>) {
        let delay = {
            let mut state = lock(&self.state);
            if state.destroyed {
                return;
            }
            Self::invalidate(&mut state);
            state.config.debounce
        };
        trace!("Scheduling evaluation of '{}' in {:?}", self.name, delay);
        let unit = Arc::downgrade(self);
        self.results.schedule(delay, move || {
            if let Some(unit) = unit.upgrade() {
                unit.run_evaluation();
            }
        });
    }

    fn run_evaluation(self: &Arc<Self>) {
        let (generation, rules) = {
            let mut state = lock(&self.state);
            if state.destroyed {
                return;
            }
            Self::invalidate(&mut state);
            (state.generation, state.config.rules.clone())
        };

        match self.evaluator.evaluate(&rules) {
            Evaluation::Ready(result) => self.apply_result(generation, result),
            Evaluation::Deferred(fut) => {
                let unit = Arc::downgrade(self);
                let task = tokio::spawn(async move {
                    let result = fut.await;
                    if let Some(unit) = unit.upgrade() {
                        unit.apply_result(generation, result);
                    }
                });
                let mut state = lock(&self.state);
                if state.destroyed || state.generation != generation {
                    task.abort();
                } else {
                    state.evaluation = Some(task);
                }
            }
        }
    }

    fn apply_result(&self, generation: u64, result: ValidationResult) {
        let emission = {
            let mut state = lock(&self.state);
            if state.destroyed || state.generation != generation {
                debug!("Discarding stale result for '{}'", self.name);
                return;
            }
            state.evaluation = None;
            Self::commit(&mut state, Some(result), None)
        };
        self.emit(emission);
    }

    fn settle_visibility(&self) {
        let emission = {
            let mut state = lock(&self.state);
            if state.destroyed {
                return;
            }
            state.typing.clear();
            let show = self.visible(&state);
            Self::commit(&mut state, None, Some(show))
        };
        self.emit(emission);
    }

    fn handle_change(self: &Arc<Self>, event: &FieldEvent) {
        let (emission, delay) = {
            let mut state = lock(&self.state);
            if state.destroyed {
                return;
            }
            let edited: Vec<String> = state
                .config
                .fields
                .depends_on
                .iter()
                .filter(|f| event.fields.as_ref().is_none_or(|fields| fields.contains(f)))
                .cloned()
                .collect();
            if edited.is_empty() {
                // A change outside `depends_on` can still complete the touch gate.
                if !event.touches(state.config.fields.need_touch.iter()) {
                    return;
                }
                let show = self.visible(&state);
                (Self::commit(&mut state, None, Some(show)), None)
            } else {
                self.begin_typing(&mut state, event, edited)
            }
        };

        self.emit(emission);
        if let Some(delay) = delay {
            let unit = Arc::downgrade(self);
            self.visibility.schedule(delay, move || {
                if let Some(unit) = unit.upgrade() {
                    unit.settle_visibility();
                }
            });
        }
    }

    /// Hide the result while `edited` fields are being typed into, unless the
    /// typing window is zero. Returns the emission and the window to wait.
    fn begin_typing(
        &self,
        state: &mut UnitState,
        event: &FieldEvent,
        edited: Vec<String>,
    ) -> (Option<Emission>, Option<Duration>) {
        let delay = event.debounce.unwrap_or_else(|| self.typing_delay(&edited));
        if delay.is_zero() {
            // No typing window: recompute in place instead of hiding first.
            for field in &edited {
                state.typing.remove(field);
            }
            let show = self.visible(state);
            (Self::commit(state, None, Some(show)), None)
        } else {
            state.typing.extend(edited);
            (Self::commit(state, None, Some(false)), Some(delay))
        }
    }

    fn handle_pause(&self, event: &FieldEvent) {
        let emission = {
            let mut state = lock(&self.state);
            if state.destroyed || !event.touches(state.config.fields.all()) {
                return;
            }
            match &event.fields {
                Some(fields) => {
                    for field in fields {
                        state.typing.remove(field);
                    }
                }
                None => state.typing.clear(),
            }
            if state.typing.is_empty() {
                self.visibility.cancel();
            }
            let show = self.visible(&state);
            Self::commit(&mut state, None, Some(show))
        };
        self.emit(emission);
    }
}

/// Fatal checks for replacing `current` with `next`.
fn check_update(
    name: &str,
    current: &ValidationConfig,
    next: &ValidationConfig,
) -> Result<(), ConfigurationError> {
    if current.debounce != next.debounce {
        return Err(ConfigurationError::DebounceChanged {
            validation: name.to_string(),
            previous: current.debounce,
            requested: next.debounce,
        });
    }
    for rule in &next.rules {
        if let Some(old) = current.rules.iter().find(|r| r.name() == rule.name())
            && !old.func().same_fn(rule.func())
        {
            return Err(ConfigurationError::RuleFunctionChanged {
                validation: name.to_string(),
                rule: rule.name().to_string(),
            });
        }
    }
    Ok(())
}

/// One named validation: its rules, field groups and debounce policy.
///
/// Dropping the unit destroys it.
pub struct ValidationUnit {
    shared: Arc<UnitShared>,
}

impl ValidationUnit {
    /// Create a unit seeded with a pending, hidden snapshot and schedule its
    /// first evaluation.
    pub fn new(
        name: impl Into<String>,
        config: ValidationConfig,
        tracker: SharedTracker,
        options: UnitOptions,
    ) -> Self {
        let shared = Arc::new(UnitShared {
            name: name.into(),
            typing_debounce: options.typing,
            evaluator: options.evaluator,
            tracker,
            listener: options.listener,
            results: Debouncer::new(),
            visibility: Debouncer::new(),
            state: Mutex::new(UnitState {
                config,
                data: ValidationData::seed(),
                typing: BTreeSet::new(),
                generation: 0,
                seq: 0,
                evaluation: None,
                destroyed: false,
            }),
        });
        debug!("Validation unit '{}' created", shared.name);
        shared.request_evaluation();
        Self { shared }
    }

    /// Validation name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Current snapshot.
    pub fn data(&self) -> ValidationData {
        lock(&self.shared.state).data.clone()
    }

    /// Current configuration.
    pub fn config(&self) -> ValidationConfig {
        lock(&self.shared.state).config.clone()
    }

    /// What the unit is waiting for.
    pub fn activity(&self) -> UnitActivity {
        let state = lock(&self.shared.state);
        let in_flight = state.evaluation.as_ref().is_some_and(|task| !task.is_finished());
        UnitActivity {
            awaiting_result: in_flight || self.shared.results.is_pending(),
            awaiting_visibility: self.shared.visibility.is_pending(),
        }
    }

    /// Check whether `config` may replace the current configuration.
    pub fn check_update(&self, config: &ValidationConfig) -> Result<(), ConfigurationError> {
        let state = lock(&self.shared.state);
        check_update(&self.shared.name, &state.config, config)
    }

    /// Replace the configuration.
    ///
    /// Fails if a rule kept its name but changed its function, or if the
    /// debounce changed. Returns `true` when the rules or their arguments
    /// changed and a re-evaluation was scheduled.
    pub fn update(&self, config: ValidationConfig) -> Result<bool, ConfigurationError> {
        let (emission, rules_changed) = {
            let mut state = lock(&self.shared.state);
            check_update(&self.shared.name, &state.config, &config)?;
            if state.destroyed {
                return Ok(false);
            }

            let rules_changed = !state.config.same_rules(&config);
            let fields_changed = state.config.fields != config.fields;
            state.config = config;

            if rules_changed {
                UnitShared::invalidate(&mut state);
            }
            let result = rules_changed.then_some(ValidationResult::Pending);
            let show = fields_changed.then(|| self.shared.visible(&state));
            (UnitShared::commit(&mut state, result, show), rules_changed)
        };

        self.shared.emit(emission);
        if rules_changed {
            trace!("Rules of '{}' changed", self.shared.name);
            self.shared.request_evaluation();
        }
        Ok(rules_changed)
    }

    /// React to a field interaction.
    ///
    /// `change` on a `depends_on` field hides the result until the typing
    /// debounce elapses. `blur`, `submit` and `reset` on any of the unit's
    /// fields end the typing window and recompute visibility immediately.
    pub fn handle_event(&self, event: &FieldEvent) {
        match event.kind {
            FieldEventKind::Change => self.shared.handle_change(event),
            FieldEventKind::Blur | FieldEventKind::Submit | FieldEventKind::Reset => {
                self.shared.handle_pause(event)
            }
        }
    }

    /// Cancel all timers and in-flight evaluations. No snapshot is emitted
    /// afterwards. Idempotent.
    pub fn destroy(&self) {
        {
            let mut state = lock(&self.shared.state);
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            UnitShared::invalidate(&mut state);
        }
        self.shared.results.dispose();
        self.shared.visibility.dispose();
        debug!("Validation unit '{}' destroyed", self.shared.name);
    }

    /// Check if the unit was destroyed.
    pub fn is_destroyed(&self) -> bool {
        lock(&self.shared.state).destroyed
    }
}

impl Drop for ValidationUnit {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for ValidationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationUnit")
            .field("name", &self.shared.name)
            .field("data", &self.data())
            .finish()
    }
}
