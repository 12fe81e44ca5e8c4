//! Validation outcomes and the snapshots handed to the UI.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Outcome of evaluating one validation's rules.
///
/// `Pending` strictly means "not known yet": an evaluation is scheduled or in
/// flight (or, under [`FailurePolicy::LeavePending`](crate::rule::FailurePolicy),
/// a rule failed to execute).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ValidationResult {
    /// Not yet known.
    #[default]
    Pending,
    /// Every rule passed.
    Valid,
    /// The first failing rule, in declaration order.
    Invalid {
        /// Name of the failing rule.
        rule: String,
        /// Reason the rule reported.
        reason: String,
    },
    /// A rule could not be executed (returned an error or panicked).
    Failed {
        /// Name of the rule that failed to execute.
        rule: String,
        /// Error or panic message.
        message: String,
    },
}

impl ValidationResult {
    /// Shorthand for an `Invalid` result.
    pub fn invalid(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    /// Tri-state validity: `Some(true)`, `Some(false)` or `None` while pending.
    pub fn is_valid(&self) -> Option<bool> {
        match self {
            Self::Pending => None,
            Self::Valid => Some(true),
            Self::Invalid { .. } | Self::Failed { .. } => Some(false),
        }
    }

    /// Check if the result is still unknown.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Check if a rule could not be executed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Name of the rule responsible for a negative result.
    pub fn rule(&self) -> Option<&str> {
        match self {
            Self::Invalid { rule, .. } | Self::Failed { rule, .. } => Some(rule),
            _ => None,
        }
    }

    /// Human-readable reason for a negative result.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Invalid { reason, .. } => Some(reason),
            Self::Failed { message, .. } => Some(message),
            _ => None,
        }
    }
}

// {"isValid": true|false|null, "error": {"rule": .., "reason": ..}}
impl Serialize for ValidationResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        #[derive(serde::Serialize)]
        struct ErrorInfo<'a> {
            rule: Option<&'a str>,
            reason: Option<&'a str>,
        }

        let len = if self.is_failed() { 3 } else { 2 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("isValid", &self.is_valid())?;
        map.serialize_entry(
            "error",
            &ErrorInfo {
                rule: self.rule(),
                reason: self.reason(),
            },
        )?;
        if self.is_failed() {
            map.serialize_entry("failed", &true)?;
        }
        map.end()
    }
}

/// Snapshot of one validation as the UI should render it.
///
/// `show` is false while any `depends_on` field is being edited, and until
/// every `need_touch` field has been touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ValidationData {
    /// Latest rule outcome.
    pub result: ValidationResult,
    /// Whether the UI should display the outcome.
    pub show: bool,
}

impl ValidationData {
    /// The initial snapshot of every unit: pending and hidden.
    pub fn seed() -> Self {
        Self::default()
    }

    /// The reason to display, if the result is negative and visible.
    pub fn visible_error(&self) -> Option<&str> {
        if self.show { self.result.reason() } else { None }
    }
}

/// Tri-state AND over a set of results.
///
/// `Some(false)` if any result is negative, else `None` if any is pending,
/// else `Some(true)`. An empty set is valid.
pub fn aggregate_validity<'a, I>(results: I) -> Option<bool>
where
    I: IntoIterator<Item = &'a ValidationResult>,
{
    let mut pending = false;
    for result in results {
        match result.is_valid() {
            Some(false) => return Some(false),
            None => pending = true,
            Some(true) => {}
        }
    }
    if pending { None } else { Some(true) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_tri_state() {
        assert_eq!(ValidationResult::Pending.is_valid(), None);
        assert_eq!(ValidationResult::Valid.is_valid(), Some(true));
        assert_eq!(ValidationResult::invalid("r", "x").is_valid(), Some(false));
        let failed = ValidationResult::Failed {
            rule: "r".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(failed.is_valid(), Some(false));
    }

    #[test]
    fn test_aggregate_validity() {
        use ValidationResult::{Pending, Valid};

        assert_eq!(aggregate_validity(&[Valid, Pending, Valid]), None);
        assert_eq!(
            aggregate_validity(&[Valid, ValidationResult::invalid("r", "x"), Pending]),
            Some(false)
        );
        assert_eq!(aggregate_validity(&[Valid, Valid, Valid]), Some(true));
        assert_eq!(aggregate_validity(&[] as &[ValidationResult]), Some(true));
    }

    #[test]
    fn test_visible_error_requires_show() {
        let mut data = ValidationData {
            result: ValidationResult::invalid("isEmail", "Please enter a valid email."),
            show: false,
        };
        assert_eq!(data.visible_error(), None);
        data.show = true;
        assert_eq!(data.visible_error(), Some("Please enter a valid email."));
    }

    #[test]
    fn test_serialize_invalid() {
        let data = ValidationData {
            result: ValidationResult::invalid("isRequired", "This field is required"),
            show: true,
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "result": {
                    "isValid": false,
                    "error": {"rule": "isRequired", "reason": "This field is required"}
                },
                "show": true
            })
        );
    }

    #[test]
    fn test_serialize_pending_uses_nulls() {
        let json = serde_json::to_value(ValidationResult::Pending).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"isValid": null, "error": {"rule": null, "reason": null}})
        );
    }

    #[test]
    fn test_serialize_failed_is_flagged() {
        let result = ValidationResult::Failed {
            rule: "lookup".to_string(),
            message: "connection refused".to_string(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["failed"], serde_json::json!(true));
        assert_eq!(json["isValid"], serde_json::json!(false));
    }
}
