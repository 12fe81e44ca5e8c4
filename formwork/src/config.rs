//! Form configuration and its normalization.
//!
//! The UI layer describes its validations with [`FormConfig`] and
//! [`Validation`] on every render. Before anything reaches a unit, the
//! description is checked and normalized into one canonical
//! [`ValidationConfig`] per validation name.
//!
//! # Example
//!
//! ```ignore
//! use formwork::prelude::*;
//!
//! let config = FormConfig::new()
//!     .fields(["email", "password", "rePassword"])
//!     .validation(
//!         "email",
//!         Validation::new().rule(Rule::new("isEmail", builtin::is_email()).arg("value", email)),
//!     )
//!     .validation(
//!         "passwordsMatch",
//!         Validation::new()
//!             .rule(Rule::new("areSame", builtin::are_same()).arg("value", pw).arg("other", re_pw))
//!             .fields(["password", "rePassword"]),
//!     )
//!     .on_validation(|name, data| println!("{name}: {data:?}"));
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigurationError;
use crate::result::ValidationData;
use crate::rule::{FailurePolicy, Rule};

/// Default debounce applied to rule evaluation.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Default typing debounce before a field was first blurred or submitted.
pub const DEFAULT_TYPING_BEFORE_BLUR: Duration = Duration::from_millis(2500);

/// Default typing debounce once a field was blurred or submitted.
pub const DEFAULT_TYPING_AFTER_BLUR: Duration = Duration::from_millis(1000);

/// Called with `(validation name, snapshot)` whenever a snapshot changes.
pub type ValidationCallback = Arc<dyn Fn(&str, &ValidationData) + Send + Sync>;

/// Called with the last snapshot of a validation removed from the config.
pub type DestroyCallback = Arc<dyn Fn(&str, &ValidationData) + Send + Sync>;

/// How long a result stays hidden after the user edits a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingDebounce {
    /// Quiet period while the field was never blurred or submitted.
    pub before_blur: Duration,
    /// Quiet period once the field was blurred or submitted.
    pub after_blur: Duration,
}

impl Default for TypingDebounce {
    fn default() -> Self {
        Self {
            before_blur: DEFAULT_TYPING_BEFORE_BLUR,
            after_blur: DEFAULT_TYPING_AFTER_BLUR,
        }
    }
}

impl TypingDebounce {
    /// Use the same quiet period regardless of blur history.
    pub fn uniform(delay: Duration) -> Self {
        Self {
            before_blur: delay,
            after_blur: delay,
        }
    }
}

/// Field declaration of a validation, as written by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fields {
    /// One list used both to hide while typing and to gate on touch.
    Shared(Vec<String>),
    /// Separate lists.
    Split {
        /// Fields whose edits hide the result.
        depends_on: Vec<String>,
        /// Fields that must all be touched before the result shows.
        need_touch: Vec<String>,
    },
}

/// One validation as written by the caller.
#[derive(Debug, Clone, Default)]
pub struct Validation {
    rules: Vec<Rule>,
    fields: Option<Fields>,
    debounce: Option<Duration>,
}

impl Validation {
    /// Create a validation without rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule. Rules run in the order they are added.
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Append several rules.
    pub fn rules(mut self, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Use the same fields to hide while typing and to gate on touch.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(Fields::Shared(fields.into_iter().map(Into::into).collect()));
        self
    }

    /// Declare the two field groups separately.
    pub fn split_fields<I, J, S, T>(mut self, depends_on: I, need_touch: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        self.fields = Some(Fields::Split {
            depends_on: depends_on.into_iter().map(Into::into).collect(),
            need_touch: need_touch.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Override the form's evaluation debounce for this validation.
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = Some(debounce);
        self
    }
}

/// A bare rule list is a validation over its own name.
impl From<Vec<Rule>> for Validation {
    fn from(rules: Vec<Rule>) -> Self {
        Self::new().rules(rules)
    }
}

/// Field groups of a normalized validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldGroups {
    /// Fields whose in-progress edits hide the result.
    pub depends_on: BTreeSet<String>,
    /// Fields that must each be touched before the result is shown.
    pub need_touch: BTreeSet<String>,
}

impl FieldGroups {
    /// Both groups set to the same fields.
    pub fn shared<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: BTreeSet<String> = fields.into_iter().map(Into::into).collect();
        Self {
            depends_on: fields.clone(),
            need_touch: fields,
        }
    }

    /// Every field mentioned in either group.
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.depends_on.union(&self.need_touch)
    }
}

/// Canonical configuration of one validation unit.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Rules in evaluation order.
    pub rules: Vec<Rule>,
    /// Field groups controlling visibility.
    pub fields: FieldGroups,
    /// Evaluation debounce.
    pub debounce: Duration,
}

impl ValidationConfig {
    /// A validation over the field named like itself.
    pub fn new(name: &str, rules: Vec<Rule>) -> Self {
        Self {
            rules,
            fields: FieldGroups::shared([name]),
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Set the field groups.
    pub fn with_fields(mut self, fields: FieldGroups) -> Self {
        self.fields = fields;
        self
    }

    /// Set the evaluation debounce.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Check if both configs declare the same rules with the same arguments.
    pub fn same_rules(&self, other: &ValidationConfig) -> bool {
        self.rules.len() == other.rules.len()
            && self
                .rules
                .iter()
                .zip(&other.rules)
                .all(|(a, b)| a.same_definition(b))
    }

    /// Normalize a caller-written validation.
    pub fn normalize(
        name: &str,
        validation: Validation,
        default_debounce: Duration,
    ) -> Result<Self, ConfigurationError> {
        let mut seen = BTreeSet::new();
        for rule in &validation.rules {
            if rule.name().is_empty() {
                return Err(ConfigurationError::MalformedRule {
                    validation: name.to_string(),
                    reason: "rule name cannot be empty".to_string(),
                });
            }
            if !seen.insert(rule.name()) {
                return Err(ConfigurationError::DuplicateRule {
                    validation: name.to_string(),
                    rule: rule.name().to_string(),
                });
            }
        }

        let fields = match validation.fields {
            None => FieldGroups::shared([name]),
            Some(Fields::Shared(fields)) => FieldGroups::shared(check_names(name, fields)?),
            Some(Fields::Split {
                depends_on,
                need_touch,
            }) => FieldGroups {
                depends_on: check_names(name, depends_on)?.into_iter().collect(),
                need_touch: check_names(name, need_touch)?.into_iter().collect(),
            },
        };

        Ok(Self {
            rules: validation.rules,
            fields,
            debounce: validation.debounce.unwrap_or(default_debounce),
        })
    }
}

fn check_names(validation: &str, fields: Vec<String>) -> Result<Vec<String>, ConfigurationError> {
    if fields.iter().any(|f| f.is_empty()) {
        return Err(ConfigurationError::MalformedFields {
            validation: validation.to_string(),
            reason: "field names cannot be empty".to_string(),
        });
    }
    Ok(fields)
}

/// Everything the UI supplies about a form on each render.
#[derive(Clone)]
pub struct FormConfig {
    validations: Vec<(String, Validation)>,
    fields: Vec<String>,
    debounce: Duration,
    typing: TypingDebounce,
    failure_policy: FailurePolicy,
    on_validation: Option<ValidationCallback>,
    on_destroy: Option<DestroyCallback>,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            validations: Vec::new(),
            fields: Vec::new(),
            debounce: DEFAULT_DEBOUNCE,
            typing: TypingDebounce::default(),
            failure_policy: FailurePolicy::default(),
            on_validation: None,
            on_destroy: None,
        }
    }
}

impl fmt::Debug for FormConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormConfig")
            .field("validations", &self.validations)
            .field("fields", &self.fields)
            .field("debounce", &self.debounce)
            .field("typing", &self.typing)
            .field("failure_policy", &self.failure_policy)
            .field("on_validation", &self.on_validation.is_some())
            .field("on_destroy", &self.on_destroy.is_some())
            .finish()
    }
}

impl FormConfig {
    /// Create an empty form config with default debounces.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named validation.
    pub fn validation(mut self, name: impl Into<String>, validation: impl Into<Validation>) -> Self {
        self.validations.push((name.into(), validation.into()));
        self
    }

    /// Add a form field.
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Add several form fields.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Set the default evaluation debounce.
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set the typing debounce.
    pub fn typing_debounce(mut self, typing: TypingDebounce) -> Self {
        self.typing = typing;
        self
    }

    /// Set how rule execution failures are reported.
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the snapshot change callback.
    pub fn on_validation<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &ValidationData) + Send + Sync + 'static,
    {
        self.on_validation = Some(Arc::new(f));
        self
    }

    /// Set the callback receiving the last snapshot of removed validations.
    pub fn on_destroy<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &ValidationData) + Send + Sync + 'static,
    {
        self.on_destroy = Some(Arc::new(f));
        self
    }

    /// Check and normalize the whole form.
    pub(crate) fn normalize(self) -> Result<NormalizedForm, ConfigurationError> {
        for field in &self.fields {
            if field.is_empty() {
                return Err(ConfigurationError::MalformedField(field.clone()));
            }
        }

        let mut names = BTreeSet::new();
        let mut validations = Vec::with_capacity(self.validations.len());
        for (name, validation) in self.validations {
            if name.is_empty() {
                return Err(ConfigurationError::MalformedField(name));
            }
            if !names.insert(name.clone()) {
                return Err(ConfigurationError::DuplicateValidation(name));
            }
            let config = ValidationConfig::normalize(&name, validation, self.debounce)?;
            validations.push((name, config));
        }

        Ok(NormalizedForm {
            validations,
            fields: self.fields,
            typing: self.typing,
            failure_policy: self.failure_policy,
            on_validation: self.on_validation,
            on_destroy: self.on_destroy,
        })
    }
}

/// A checked form config.
pub(crate) struct NormalizedForm {
    pub validations: Vec<(String, ValidationConfig)>,
    pub fields: Vec<String>,
    pub typing: TypingDebounce,
    pub failure_policy: FailurePolicy,
    pub on_validation: Option<ValidationCallback>,
    pub on_destroy: Option<DestroyCallback>,
}
