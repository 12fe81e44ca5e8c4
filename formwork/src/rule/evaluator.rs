//! Ordered, short-circuiting rule evaluation.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use futures::future::{self, BoxFuture};
use futures::stream::{FuturesOrdered, StreamExt};
use futures::FutureExt;
use log::{trace, warn};

use super::{Rule, RuleOutcome, Verdict};
use crate::result::ValidationResult;

/// How a rule that fails to execute (returns [`Verdict::Error`] or panics)
/// affects the result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Surface a distinct [`ValidationResult::Failed`] state.
    #[default]
    Strict,
    /// Report the failure as an ordinary [`ValidationResult::Invalid`].
    TreatAsInvalid,
    /// Keep the validation [`ValidationResult::Pending`] until it is
    /// re-evaluated.
    LeavePending,
}

/// Result of [`RuleEvaluator::evaluate`].
pub enum Evaluation {
    /// Every rule answered synchronously (or a sync rule failed first).
    Ready(ValidationResult),
    /// At least one rule is asynchronous; await the future.
    Deferred(BoxFuture<'static, ValidationResult>),
}

impl Evaluation {
    /// Wait for the final result.
    pub async fn resolve(self) -> ValidationResult {
        match self {
            Self::Ready(result) => result,
            Self::Deferred(fut) => fut.await,
        }
    }

    /// The result, if it is already known.
    pub fn ready(&self) -> Option<&ValidationResult> {
        match self {
            Self::Ready(result) => Some(result),
            Self::Deferred(_) => None,
        }
    }
}

impl fmt::Debug for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Runs an ordered list of rules and resolves to the first failure.
///
/// Synchronous rules are checked in order until the first asynchronous one;
/// a failure there stops evaluation before any later rule is invoked, so
/// cheap local checks guard expensive remote ones. From the first
/// asynchronous rule on, every remaining rule is started and they progress
/// concurrently, but verdicts are consumed in declaration order: the result
/// is the earliest failing rule, known as soon as all rules before it passed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEvaluator {
    policy: FailurePolicy,
}

impl RuleEvaluator {
    /// Create an evaluator with the given failure policy.
    pub fn new(policy: FailurePolicy) -> Self {
        Self { policy }
    }

    /// The failure policy in use.
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Evaluate `rules` in order.
    pub fn evaluate(&self, rules: &[Rule]) -> Evaluation {
        let mut deferred: FuturesOrdered<BoxFuture<'static, (String, Verdict)>> =
            FuturesOrdered::new();

        for rule in rules {
            let name = rule.name().to_string();
            match invoke_guarded(rule) {
                RuleOutcome::Ready(verdict) if deferred.is_empty() => {
                    if let Some(result) = settle(self.policy, &name, verdict) {
                        trace!("Rule '{}' settled evaluation synchronously", name);
                        return Evaluation::Ready(result);
                    }
                }
                RuleOutcome::Ready(verdict) => {
                    deferred.push_back(future::ready((name, verdict)).boxed());
                }
                RuleOutcome::Deferred(fut) => {
                    deferred.push_back(guard_future(name, fut));
                }
            }
        }

        if deferred.is_empty() {
            return Evaluation::Ready(ValidationResult::Valid);
        }

        let policy = self.policy;
        Evaluation::Deferred(
            async move {
                while let Some((name, verdict)) = deferred.next().await {
                    if let Some(result) = settle(policy, &name, verdict) {
                        return result;
                    }
                }
                ValidationResult::Valid
            }
            .boxed(),
        )
    }
}

/// Map a verdict to a final result, or `None` to keep going.
fn settle(policy: FailurePolicy, rule: &str, verdict: Verdict) -> Option<ValidationResult> {
    match verdict {
        Verdict::Pass => None,
        Verdict::Fail(reason) => Some(ValidationResult::Invalid {
            rule: rule.to_string(),
            reason,
        }),
        Verdict::Error(message) => {
            warn!("Rule '{}' failed to execute: {}", rule, message);
            Some(match policy {
                FailurePolicy::Strict => ValidationResult::Failed {
                    rule: rule.to_string(),
                    message,
                },
                FailurePolicy::TreatAsInvalid => ValidationResult::Invalid {
                    rule: rule.to_string(),
                    reason: message,
                },
                FailurePolicy::LeavePending => ValidationResult::Pending,
            })
        }
    }
}

/// Invoke a rule, turning a panic into [`Verdict::Error`].
fn invoke_guarded(rule: &Rule) -> RuleOutcome {
    panic::catch_unwind(AssertUnwindSafe(|| rule.invoke())).unwrap_or_else(|payload| {
        RuleOutcome::Ready(Verdict::Error(format!(
            "rule panicked: {}",
            extract_panic_message(&payload)
        )))
    })
}

/// Await a deferred verdict, turning a panic into [`Verdict::Error`].
fn guard_future(
    name: String,
    fut: BoxFuture<'static, Verdict>,
) -> BoxFuture<'static, (String, Verdict)> {
    async move {
        let verdict = AssertUnwindSafe(fut).catch_unwind().await.unwrap_or_else(|payload| {
            Verdict::Error(format!(
                "rule panicked: {}",
                extract_panic_message(&payload)
            ))
        });
        (name, verdict)
    }
    .boxed()
}

/// Extract a human-readable message from a panic payload.
fn extract_panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
