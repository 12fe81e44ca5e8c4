//! Configuration error types.
//!
//! These are programmer errors in the calling application. They are returned
//! synchronously from reconfiguration and event dispatch and must not be
//! swallowed: each one points at a latent re-validation loop or leak.

use std::time::Duration;

use thiserror::Error;

use crate::event::FieldEventKind;

/// Fatal misconfiguration detected at the library boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A rule kept its name but was handed a different function.
    #[error(
        "Rule function changed for '{validation}/{rule}'. Rule functions must keep their identity \
         across reconfigurations; build the RuleFn once and clone it instead of creating a new \
         closure on every render"
    )]
    RuleFunctionChanged {
        /// Validation the rule belongs to.
        validation: String,
        /// Name of the offending rule.
        rule: String,
    },

    /// The calculation debounce of an existing validation changed.
    #[error("Debounce for validation '{validation}' cannot change ({previous:?} -> {requested:?})")]
    DebounceChanged {
        /// Validation whose debounce changed.
        validation: String,
        /// Debounce the unit was created with.
        previous: Duration,
        /// Debounce found in the new configuration.
        requested: Duration,
    },

    /// The form-level typing debounce changed after the registry was created.
    #[error("Typing debounce cannot change once the form is configured")]
    TypingDebounceChanged,

    /// The rule failure policy changed after the registry was created.
    #[error("Failure policy cannot change once the form is configured")]
    FailurePolicyChanged,

    /// A rule declaration has the wrong shape.
    #[error("Malformed rule in validation '{validation}': {reason}")]
    MalformedRule {
        /// Validation the rule belongs to.
        validation: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Two rules of one validation share a name.
    #[error("Duplicate rule '{rule}' in validation '{validation}'")]
    DuplicateRule {
        /// Validation containing the duplicate.
        validation: String,
        /// The repeated rule name.
        rule: String,
    },

    /// A validation's field groups have the wrong shape.
    #[error("Malformed fields for validation '{validation}': {reason}")]
    MalformedFields {
        /// Validation with the bad field declaration.
        validation: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Two validations share a name.
    #[error("Duplicate validation '{0}'")]
    DuplicateValidation(String),

    /// A validation name or form-level field name is empty.
    #[error("Malformed field or validation name: {0:?}")]
    MalformedField(String),

    /// A non-change event carried a typing debounce.
    #[error("A nonzero debounce is only allowed for change events, got {kind} with {debounce:?}")]
    EventDebounceNotAllowed {
        /// Kind of the offending event.
        kind: FieldEventKind,
        /// The debounce it carried.
        debounce: Duration,
    },
}
