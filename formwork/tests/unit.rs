//! Tests for the validation unit lifecycle.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use formwork::config::{FieldGroups, TypingDebounce, ValidationConfig};
use formwork::rule::{Args, Rule, RuleFn, Verdict};
use formwork::touch::{FieldTouchTracker, SharedTracker};
use formwork::unit::{UnitOptions, ValidationUnit};
use formwork::{ConfigurationError, FieldEvent, FieldEventKind, ValidationData, ValidationResult};

type Emissions = Arc<Mutex<Vec<ValidationData>>>;

fn options(emissions: &Emissions) -> UnitOptions {
    let emissions = Arc::clone(emissions);
    UnitOptions {
        typing: TypingDebounce::uniform(Duration::from_millis(300)),
        ..UnitOptions::default()
    }
    .listener(move |_, _, data| emissions.lock().unwrap().push(data.clone()))
}

fn failing() -> RuleFn {
    RuleFn::sync(|_: &Args| Verdict::fail("bad"))
}

fn record(tracker: &SharedTracker, unit: &ValidationUnit, event: FieldEvent) {
    let fields = event.fields.clone().unwrap_or_default();
    tracker.lock().unwrap().record_event(event.kind, &fields);
    unit.handle_event(&event);
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_starts_pending_and_hidden() {
    let emissions = Emissions::default();
    let unit = ValidationUnit::new(
        "email",
        ValidationConfig::new("email", vec![Rule::new("bad", failing())]),
        FieldTouchTracker::shared(),
        options(&emissions),
    );

    assert_eq!(unit.data(), ValidationData::seed());
    assert!(unit.activity().awaiting_result);

    sleep_ms(101).await;
    assert_eq!(unit.data().result, ValidationResult::invalid("bad", "bad"));
    assert!(!unit.data().show);
    assert!(unit.activity().is_idle());
    assert_eq!(emissions.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_updates_coalesce_into_one_evaluation() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let probe = {
        let seen = Arc::clone(&seen);
        RuleFn::sync(move |args: &Args| {
            seen.lock().unwrap().push(args.get_str("value").unwrap_or_default().to_string());
            Verdict::Pass
        })
    };
    let config = |value: &str| {
        ValidationConfig::new("name", vec![Rule::new("probe", probe.clone()).arg("value", value)])
    };

    let unit = ValidationUnit::new(
        "name",
        config("first"),
        FieldTouchTracker::shared(),
        UnitOptions::default(),
    );
    sleep_ms(30).await;
    assert!(unit.update(config("second")).unwrap());
    sleep_ms(30).await;
    assert!(unit.update(config("third")).unwrap());

    sleep_ms(99).await;
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(unit.data().result, ValidationResult::Pending);

    sleep_ms(2).await;
    assert_eq!(*seen.lock().unwrap(), vec!["third"]);
    assert_eq!(unit.data().result, ValidationResult::Valid);
}

#[tokio::test(start_paused = true)]
async fn test_stale_async_result_is_discarded() {
    let lookup = RuleFn::deferred(|args: &Args| {
        let slow = args.get_str("value") == Some("old");
        async move {
            if slow {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Verdict::fail("stale")
            } else {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Verdict::Pass
            }
        }
    });
    let config = |value: &str| {
        ValidationConfig::new("user", vec![Rule::new("lookup", lookup.clone()).arg("value", value)])
            .with_debounce(Duration::ZERO)
    };

    let emissions = Emissions::default();
    let unit = ValidationUnit::new(
        "user",
        config("old"),
        FieldTouchTracker::shared(),
        options(&emissions),
    );
    sleep_ms(20).await;
    unit.update(config("new")).unwrap();

    sleep_ms(200).await;
    assert_eq!(unit.data().result, ValidationResult::Valid);
    assert!(
        emissions
            .lock()
            .unwrap()
            .iter()
            .all(|data| data.result.reason() != Some("stale"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_change_hides_resolved_result() {
    let tracker = FieldTouchTracker::shared();
    let emissions = Emissions::default();
    let unit = ValidationUnit::new(
        "email",
        ValidationConfig::new("email", vec![Rule::new("bad", failing())]).with_debounce(Duration::ZERO),
        Arc::clone(&tracker),
        options(&emissions),
    );
    record(&tracker, &unit, FieldEvent::blur("email"));
    assert!(unit.data().show);
    assert_eq!(unit.data().visible_error(), Some("bad"));

    record(&tracker, &unit, FieldEvent::change("email"));
    assert!(!unit.data().show);
    assert!(unit.activity().awaiting_visibility);

    sleep_ms(299).await;
    assert!(!unit.data().show);
    sleep_ms(2).await;
    assert!(unit.data().show);
    assert!(unit.activity().is_idle());
}

#[tokio::test(start_paused = true)]
async fn test_blur_ends_typing_window() {
    let tracker = FieldTouchTracker::shared();
    let emissions = Emissions::default();
    let unit = ValidationUnit::new(
        "email",
        ValidationConfig::new("email", vec![Rule::new("bad", failing())]),
        Arc::clone(&tracker),
        options(&emissions),
    );

    record(&tracker, &unit, FieldEvent::change("email"));
    assert!(!unit.data().show);
    record(&tracker, &unit, FieldEvent::blur("email"));
    assert!(unit.data().show);
    assert!(!unit.activity().awaiting_visibility);
}

#[tokio::test(start_paused = true)]
async fn test_zero_event_debounce_does_not_hide() {
    let tracker = FieldTouchTracker::shared();
    let emissions = Emissions::default();
    let unit = ValidationUnit::new(
        "email",
        ValidationConfig::new("email", vec![Rule::new("bad", failing())]).with_debounce(Duration::ZERO),
        Arc::clone(&tracker),
        options(&emissions),
    );
    record(&tracker, &unit, FieldEvent::blur("email"));
    let before = emissions.lock().unwrap().len();

    record(
        &tracker,
        &unit,
        FieldEvent::change("email").debounce(Duration::ZERO),
    );
    assert!(unit.data().show);
    assert_eq!(emissions.lock().unwrap().len(), before);
}

#[tokio::test(start_paused = true)]
async fn test_typing_debounce_depends_on_blur_history() {
    let tracker = FieldTouchTracker::shared();
    let unit = ValidationUnit::new(
        "email",
        ValidationConfig::new("email", vec![]),
        Arc::clone(&tracker),
        UnitOptions {
            typing: TypingDebounce {
                before_blur: Duration::from_millis(500),
                after_blur: Duration::from_millis(100),
            },
            ..UnitOptions::default()
        },
    );

    record(&tracker, &unit, FieldEvent::change("email"));
    sleep_ms(101).await;
    assert!(unit.activity().awaiting_visibility);
    sleep_ms(400).await;
    assert!(unit.data().show);

    record(&tracker, &unit, FieldEvent::blur("email"));
    record(&tracker, &unit, FieldEvent::change("email"));
    assert!(!unit.data().show);
    sleep_ms(101).await;
    assert!(unit.data().show);
}

#[tokio::test(start_paused = true)]
async fn test_need_touch_gates_visibility() {
    let tracker = FieldTouchTracker::shared();
    let unit = ValidationUnit::new(
        "match",
        ValidationConfig::new("match", vec![Rule::new("bad", failing())])
            .with_fields(FieldGroups::shared(["password", "rePassword"])),
        Arc::clone(&tracker),
        UnitOptions::default(),
    );

    record(&tracker, &unit, FieldEvent::blur("password"));
    assert!(!unit.data().show);
    record(&tracker, &unit, FieldEvent::blur("rePassword"));
    assert!(unit.data().show);
}

#[tokio::test(start_paused = true)]
async fn test_change_on_touch_only_field_reveals() {
    let tracker = FieldTouchTracker::shared();
    let fields = FieldGroups {
        depends_on: ["rePassword".to_string()].into(),
        need_touch: ["password".to_string(), "rePassword".to_string()].into(),
    };
    let unit = ValidationUnit::new(
        "match",
        ValidationConfig::new("match", vec![Rule::new("bad", failing())])
            .with_fields(fields)
            .with_debounce(Duration::ZERO),
        Arc::clone(&tracker),
        UnitOptions::default(),
    );

    record(&tracker, &unit, FieldEvent::blur("rePassword"));
    assert!(!unit.data().show);

    record(&tracker, &unit, FieldEvent::change("password"));
    assert!(unit.data().show);
    assert!(!unit.activity().awaiting_visibility);

    sleep_ms(5000).await;
    assert!(unit.data().show);
}

#[tokio::test(start_paused = true)]
async fn test_events_for_other_fields_are_ignored() {
    let tracker = FieldTouchTracker::shared();
    let emissions = Emissions::default();
    let unit = ValidationUnit::new(
        "email",
        ValidationConfig::new("email", vec![]),
        Arc::clone(&tracker),
        options(&emissions),
    );

    record(&tracker, &unit, FieldEvent::change("name"));
    record(&tracker, &unit, FieldEvent::blur("name"));
    assert!(!unit.activity().awaiting_visibility);
    assert!(emissions.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_update_rejects_new_rule_function() {
    let unit = ValidationUnit::new(
        "email",
        ValidationConfig::new("email", vec![Rule::new("bad", failing())]),
        FieldTouchTracker::shared(),
        UnitOptions::default(),
    );

    let err = unit
        .update(ValidationConfig::new("email", vec![Rule::new("bad", failing())]))
        .unwrap_err();
    assert_eq!(
        err,
        ConfigurationError::RuleFunctionChanged {
            validation: "email".to_string(),
            rule: "bad".to_string(),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_update_rejects_debounce_change() {
    let unit = ValidationUnit::new(
        "email",
        ValidationConfig::new("email", vec![]),
        FieldTouchTracker::shared(),
        UnitOptions::default(),
    );

    let changed = ValidationConfig::new("email", vec![]).with_debounce(Duration::from_millis(5));
    assert!(matches!(
        unit.check_update(&changed),
        Err(ConfigurationError::DebounceChanged { .. })
    ));
    assert!(unit.update(changed).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_unchanged_update_keeps_result() {
    let rule = Rule::new("bad", failing());
    let unit = ValidationUnit::new(
        "email",
        ValidationConfig::new("email", vec![rule.clone()]),
        FieldTouchTracker::shared(),
        UnitOptions::default(),
    );
    sleep_ms(101).await;

    assert!(!unit.update(ValidationConfig::new("email", vec![rule])).unwrap());
    assert_eq!(unit.data().result, ValidationResult::invalid("bad", "bad"));
    assert!(unit.activity().is_idle());
}

#[tokio::test(start_paused = true)]
async fn test_destroy_stops_everything() {
    let tracker = FieldTouchTracker::shared();
    let emissions = Emissions::default();
    let unit = ValidationUnit::new(
        "email",
        ValidationConfig::new("email", vec![Rule::new("bad", failing())]),
        Arc::clone(&tracker),
        options(&emissions),
    );
    record(&tracker, &unit, FieldEvent::new(FieldEventKind::Change).field("email"));

    unit.destroy();
    unit.destroy();
    assert!(unit.is_destroyed());

    sleep_ms(1000).await;
    assert_eq!(emissions.lock().unwrap().len(), 0);
    assert_eq!(unit.data(), ValidationData::seed());
}
