//! Field interaction events.

use std::fmt;
use std::time::Duration;

/// What happened to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldEventKind {
    /// The user edited the field value.
    Change,
    /// The field lost focus.
    Blur,
    /// The form was submitted.
    Submit,
    /// The field (or the whole form) was reset.
    Reset,
}

impl fmt::Display for FieldEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Change => "change",
            Self::Blur => "blur",
            Self::Submit => "submit",
            Self::Reset => "reset",
        };
        f.write_str(name)
    }
}

/// A field interaction reported by the UI layer.
///
/// `fields: None` targets every configured field of the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEvent {
    /// Event kind.
    pub kind: FieldEventKind,
    /// Targeted fields, or `None` for all fields.
    pub fields: Option<Vec<String>>,
    /// Typing debounce override. Only meaningful for `Change`.
    pub debounce: Option<Duration>,
}

impl FieldEvent {
    /// Create an event of the given kind targeting all fields.
    pub fn new(kind: FieldEventKind) -> Self {
        Self {
            kind,
            fields: None,
            debounce: None,
        }
    }

    /// A change of one field.
    pub fn change(field: impl Into<String>) -> Self {
        Self::new(FieldEventKind::Change).field(field)
    }

    /// A blur of one field.
    pub fn blur(field: impl Into<String>) -> Self {
        Self::new(FieldEventKind::Blur).field(field)
    }

    /// A submit of the whole form.
    pub fn submit() -> Self {
        Self::new(FieldEventKind::Submit)
    }

    /// A reset of the whole form.
    pub fn reset() -> Self {
        Self::new(FieldEventKind::Reset)
    }

    /// Add a targeted field.
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.fields.get_or_insert_with(Vec::new).push(field.into());
        self
    }

    /// Replace the targeted fields.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Override the typing debounce for this change.
    ///
    /// `Duration::ZERO` recomputes visibility immediately.
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = Some(debounce);
        self
    }

    /// Whether any targeted field is in `set`.
    pub(crate) fn touches<'a>(&self, mut set: impl Iterator<Item = &'a String>) -> bool {
        match &self.fields {
            Some(fields) => set.any(|f| fields.contains(f)),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_collect_fields() {
        let event = FieldEvent::change("password").field("rePassword");
        assert_eq!(event.kind, FieldEventKind::Change);
        assert_eq!(
            event.fields,
            Some(vec!["password".to_string(), "rePassword".to_string()])
        );
    }

    #[test]
    fn test_submit_targets_all_fields() {
        assert!(FieldEvent::submit().fields.is_none());
    }

    #[test]
    fn test_touches() {
        let set = ["email".to_string(), "name".to_string()];
        assert!(FieldEvent::blur("name").touches(set.iter()));
        assert!(!FieldEvent::blur("age").touches(set.iter()));
        assert!(FieldEvent::reset().touches(set.iter()));
    }
}
