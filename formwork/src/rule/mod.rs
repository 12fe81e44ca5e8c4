//! Validation rules and their evaluation.
//!
//! A [`Rule`] pairs a name with a [`RuleFn`] and the [`Args`] it is called
//! with. Rule functions may answer synchronously or hand back a future; the
//! [`RuleEvaluator`] runs an ordered list of rules and resolves to the first
//! failure.
//!
//! # Example
//!
//! ```ignore
//! use formwork::rule::{Args, Rule, RuleFn, Verdict};
//!
//! // Build rule functions once and clone them: their identity must stay
//! // stable across reconfigurations.
//! let not_taken = RuleFn::deferred(|args: &Args| {
//!     let name = args.get_str("value").unwrap_or_default().to_string();
//!     async move { lookup_username(&name).await }
//! });
//!
//! let rules = vec![
//!     Rule::new("isRequired", builtin::is_required()).arg("value", "alice"),
//!     Rule::new("notTaken", not_taken.clone()).arg("value", "alice"),
//! ];
//! ```

mod args;
pub mod builtin;
mod evaluator;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

pub use args::{Args, VALUE};
pub use evaluator::{Evaluation, FailurePolicy, RuleEvaluator};

/// Answer of a single rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The rule is satisfied.
    Pass,
    /// The rule is violated, with the reason to show the user.
    Fail(String),
    /// The rule could not be executed.
    Error(String),
}

impl Verdict {
    /// Shorthand for a failing verdict.
    pub fn fail(reason: impl Into<String>) -> Self {
        Self::Fail(reason.into())
    }
}

impl From<Result<(), String>> for Verdict {
    fn from(result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::Pass,
            Err(reason) => Self::Fail(reason),
        }
    }
}

/// `None` passes, `Some(reason)` fails.
impl From<Option<String>> for Verdict {
    fn from(reason: Option<String>) -> Self {
        match reason {
            None => Self::Pass,
            Some(reason) => Self::Fail(reason),
        }
    }
}

impl From<bool> for Verdict {
    fn from(ok: bool) -> Self {
        if ok {
            Self::Pass
        } else {
            Self::Fail("Invalid value".to_string())
        }
    }
}

/// What a rule function returns: a verdict now, or one later.
pub enum RuleOutcome {
    /// The verdict is known synchronously.
    Ready(Verdict),
    /// The verdict arrives when the future resolves.
    Deferred(BoxFuture<'static, Verdict>),
}

impl RuleOutcome {
    /// Check if the outcome needs to be awaited.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }
}

impl fmt::Debug for RuleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(verdict) => f.debug_tuple("Ready").field(verdict).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

type RuleClosure = dyn Fn(&Args) -> RuleOutcome + Send + Sync;

/// A shareable rule function with a stable identity.
///
/// Two `RuleFn`s are the same rule only if one was cloned from the other.
/// Wrapping the same closure twice yields two different rules.
#[derive(Clone)]
pub struct RuleFn(Arc<RuleClosure>);

impl RuleFn {
    /// Wrap a closure returning a [`RuleOutcome`].
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Args) -> RuleOutcome + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Wrap a synchronous check.
    pub fn sync<F, V>(f: F) -> Self
    where
        F: Fn(&Args) -> V + Send + Sync + 'static,
        V: Into<Verdict>,
    {
        Self::new(move |args| RuleOutcome::Ready(f(args).into()))
    }

    /// Wrap an asynchronous check.
    ///
    /// The closure receives the arguments by reference and must move what it
    /// needs into the returned future.
    pub fn deferred<F, Fut>(f: F) -> Self
    where
        F: Fn(&Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Verdict> + Send + 'static,
    {
        Self::new(move |args| RuleOutcome::Deferred(f(args).boxed()))
    }

    /// Invoke the rule.
    pub fn call(&self, args: &Args) -> RuleOutcome {
        (self.0)(args)
    }

    /// Check if both handles point at the same rule function.
    pub fn same_fn(&self, other: &RuleFn) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl fmt::Debug for RuleFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RuleFn({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

/// A named rule bound to its arguments.
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    func: RuleFn,
    args: Args,
}

impl Rule {
    /// Create a rule with no arguments.
    pub fn new(name: impl Into<String>, func: RuleFn) -> Self {
        Self {
            name: name.into(),
            func,
            args: Args::new(),
        }
    }

    /// Add an argument (builder pattern).
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key, value);
        self
    }

    /// Replace all arguments.
    pub fn with_args(mut self, args: Args) -> Self {
        self.args = args;
        self
    }

    /// Rule name, unique within its validation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The rule function.
    pub fn func(&self) -> &RuleFn {
        &self.func
    }

    /// Arguments the rule is called with.
    pub fn args(&self) -> &Args {
        &self.args
    }

    /// Invoke the rule function with its arguments.
    pub fn invoke(&self) -> RuleOutcome {
        self.func.call(&self.args)
    }

    /// Same name, same function and equal arguments.
    pub fn same_definition(&self, other: &Rule) -> bool {
        self.name == other.name && self.func.same_fn(&other.func) && self.args == other.args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloned_rule_fn_keeps_identity() {
        let f = RuleFn::sync(|_: &Args| Verdict::Pass);
        let g = f.clone();
        assert!(f.same_fn(&g));
    }

    #[test]
    fn test_rewrapped_closure_is_a_new_rule() {
        let check = |_: &Args| Verdict::Pass;
        let f = RuleFn::sync(check);
        let g = RuleFn::sync(check);
        assert!(!f.same_fn(&g));
    }

    #[test]
    fn test_verdict_conversions() {
        assert_eq!(Verdict::from(Ok::<(), String>(())), Verdict::Pass);
        assert_eq!(
            Verdict::from(Some("too short".to_string())),
            Verdict::fail("too short")
        );
        assert_eq!(Verdict::from(None::<String>), Verdict::Pass);
    }

    #[test]
    fn test_same_definition_compares_args() {
        let f = RuleFn::sync(|_: &Args| Verdict::Pass);
        let a = Rule::new("r", f.clone()).arg("value", "x");
        let b = Rule::new("r", f.clone()).arg("value", "x");
        let c = Rule::new("r", f).arg("value", "y");
        assert!(a.same_definition(&b));
        assert!(!a.same_definition(&c));
    }

    #[test]
    fn test_invoke_passes_args() {
        let echo = RuleFn::sync(|args: &Args| {
            if args.get_str(VALUE) == Some("ok") {
                Verdict::Pass
            } else {
                Verdict::fail("not ok")
            }
        });
        let rule = Rule::new("echo", echo).arg(VALUE, "ok");
        assert!(matches!(rule.invoke(), RuleOutcome::Ready(Verdict::Pass)));
    }
}
