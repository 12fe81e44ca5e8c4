//! Common leaf rules.
//!
//! Each constructor returns a clone of one shared [`RuleFn`], so calling it
//! on every render keeps the rule identity stable.
//!
//! All rules read the checked value from the `value` argument. `has_length`
//! also reads optional `min`/`max`, and `are_same` compares `value` against
//! `other`.

use std::sync::LazyLock;

use regex::Regex;

use super::{Args, RuleFn, VALUE, Verdict};

static DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]").expect("digit pattern is valid"));

static IS_EMAIL: LazyLock<RuleFn> = LazyLock::new(|| RuleFn::sync(check_email));
static IS_REQUIRED: LazyLock<RuleFn> = LazyLock::new(|| RuleFn::sync(check_required));
static HAS_NUMBER: LazyLock<RuleFn> = LazyLock::new(|| RuleFn::sync(check_number));
static HAS_LENGTH: LazyLock<RuleFn> = LazyLock::new(|| RuleFn::sync(check_length));
static ARE_SAME: LazyLock<RuleFn> = LazyLock::new(|| RuleFn::sync(check_same));

/// The value must be a syntactically valid email address.
pub fn is_email() -> RuleFn {
    IS_EMAIL.clone()
}

/// The value must be present and non-empty.
pub fn is_required() -> RuleFn {
    IS_REQUIRED.clone()
}

/// The value must contain at least one digit.
pub fn has_number() -> RuleFn {
    HAS_NUMBER.clone()
}

/// The value length (in characters) must lie within `min..=max`.
pub fn has_length() -> RuleFn {
    HAS_LENGTH.clone()
}

/// `value` and `other` must be equal.
pub fn are_same() -> RuleFn {
    ARE_SAME.clone()
}

fn check_email(args: &Args) -> Verdict {
    match args.get_str(VALUE) {
        Some(value) if email_address::EmailAddress::is_valid(value) => Verdict::Pass,
        _ => Verdict::fail("Please enter a valid email."),
    }
}

fn check_required(args: &Args) -> Verdict {
    match args.get(VALUE) {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Verdict::Pass,
        Some(serde_json::Value::Array(items)) if !items.is_empty() => Verdict::Pass,
        Some(serde_json::Value::Bool(_) | serde_json::Value::Number(_)) => Verdict::Pass,
        _ => Verdict::fail("This field is required"),
    }
}

fn check_number(args: &Args) -> Verdict {
    match args.get_str(VALUE) {
        Some(value) if DIGIT.is_match(value) => Verdict::Pass,
        _ => Verdict::fail("This field should contain at least one digit."),
    }
}

fn check_length(args: &Args) -> Verdict {
    let Some(value) = args.get_str(VALUE) else {
        return Verdict::fail("Value cannot be null.");
    };
    let len = value.chars().count() as u64;
    if let Some(min) = args.get_u64("min")
        && len < min
    {
        return Verdict::fail(format!("Length should be at least {}.", min));
    }
    if let Some(max) = args.get_u64("max")
        && len > max
    {
        return Verdict::fail(format!("Length should be at most {}.", max));
    }
    Verdict::Pass
}

fn check_same(args: &Args) -> Verdict {
    if args.get(VALUE) == args.get("other") {
        Verdict::Pass
    } else {
        Verdict::fail("Values have to match.")
    }
}
