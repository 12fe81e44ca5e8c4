//! Form validation orchestration.
//!
//! `formwork` turns a declarative, re-supplied-on-every-render description of
//! a form's validations into debounced, ordered, possibly asynchronous rule
//! evaluation, and tells the UI when to show each result.
//!
//! The entry point is [`ValidationRegistry`]: build one from a
//! [`FormConfig`], feed it field events and fresh configs, and read snapshots
//! from the `on_validation` callback or [`ValidationRegistry::data`].

pub mod config;
pub mod debounce;
pub mod error;
pub mod event;
pub mod registry;
pub mod result;
pub mod rule;
pub mod submit;
mod sync;
pub mod touch;
pub mod unit;

pub use config::{FormConfig, TypingDebounce, Validation, ValidationConfig};
pub use error::ConfigurationError;
pub use event::{FieldEvent, FieldEventKind};
pub use registry::{FormId, ValidationRegistry};
pub use result::{ValidationData, ValidationResult};

pub mod prelude {
    pub use crate::config::{FieldGroups, FormConfig, TypingDebounce, Validation, ValidationConfig};
    pub use crate::error::ConfigurationError;
    pub use crate::event::{FieldEvent, FieldEventKind};
    pub use crate::registry::{FormId, ValidationRegistry};
    pub use crate::result::{ValidationData, ValidationResult, aggregate_validity};
    pub use crate::rule::{Args, FailurePolicy, Rule, RuleFn, Verdict, builtin};
}
