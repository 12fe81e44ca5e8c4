//! Scripted registration form driven through a `ValidationRegistry`.
//!
//! Log output goes to `formwork-demo.log`; set `FORMWORK_LOG` to a level
//! (`trace`, `debug`, `info`, ...) to change verbosity.

use std::fs::File;
use std::str::FromStr;
use std::time::Duration;

use formwork::prelude::*;
use log::info;
use simplelog::{Config, LevelFilter, WriteLogger};

const TAKEN: &[&str] = &["admin", "root"];

/// Current field values, as a UI would hold them.
#[derive(Debug, Clone, Default)]
struct Registration {
    username: String,
    email: String,
    password: String,
    re_password: String,
}

/// Rule functions are built once so their identity survives re-renders.
struct Rules {
    available: RuleFn,
}

impl Rules {
    fn new() -> Self {
        let available = RuleFn::deferred(|args: &Args| {
            let name = args.get_str(formwork::rule::VALUE).unwrap_or_default().to_string();
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                if TAKEN.contains(&name.as_str()) {
                    Verdict::fail(format!("'{}' is already taken.", name))
                } else {
                    Verdict::Pass
                }
            }
        });
        Self { available }
    }
}

fn render(form: &Registration, rules: &Rules) -> FormConfig {
    FormConfig::new()
        .fields(["username", "email", "password", "rePassword"])
        .validation(
            "username",
            vec![
                Rule::new("isRequired", builtin::is_required()).arg("value", form.username.as_str()),
                Rule::new("available", rules.available.clone()).arg("value", form.username.as_str()),
            ],
        )
        .validation(
            "email",
            vec![Rule::new("isEmail", builtin::is_email()).arg("value", form.email.as_str())],
        )
        .validation(
            "password",
            vec![
                Rule::new("hasLength", builtin::has_length())
                    .arg("value", form.password.as_str())
                    .arg("min", 8),
                Rule::new("hasNumber", builtin::has_number()).arg("value", form.password.as_str()),
            ],
        )
        .validation(
            "passwordsMatch",
            Validation::new()
                .rule(
                    Rule::new("areSame", builtin::are_same())
                        .arg("value", form.password.as_str())
                        .arg("other", form.re_password.as_str()),
                )
                .fields(["password", "rePassword"]),
        )
        .on_validation(|name, data| match data.visible_error() {
            Some(reason) => println!("  {:<15} {}", name, reason),
            None if data.show => println!("  {:<15} ok", name),
            None => {}
        })
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let level = std::env::var("FORMWORK_LOG")
        .ok()
        .and_then(|level| LevelFilter::from_str(&level).ok())
        .unwrap_or(LevelFilter::Debug);
    let log_file = File::create("formwork-demo.log")?;
    WriteLogger::init(level, Config::default(), log_file)?;
    Ok(())
}

/// Type `value` into `field` and re-render, the way a UI binding would.
fn type_into(
    registry: &mut ValidationRegistry,
    form: &mut Registration,
    rules: &Rules,
    field: &str,
    value: &str,
) -> Result<(), ConfigurationError> {
    let slot = match field {
        "username" => &mut form.username,
        "email" => &mut form.email,
        "password" => &mut form.password,
        _ => &mut form.re_password,
    };
    *slot = value.to_string();
    registry.dispatch_field_event(FieldEvent::change(field))?;
    registry.reconfigure(render(form, rules))
}

async fn pause(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = init_logging() {
        eprintln!("Logging disabled: {}", e);
    }

    let rules = Rules::new();
    let mut form = Registration::default();
    let mut registry = ValidationRegistry::new(render(&form, &rules))?;
    info!("Demo form {} started", registry.form_id());

    println!("typing a taken username, then leaving the field:");
    type_into(&mut registry, &mut form, &rules, "username", "admin")?;
    registry.dispatch_field_event(FieldEvent::blur("username"))?;
    pause(400).await;

    println!("fixing it:");
    type_into(&mut registry, &mut form, &rules, "username", "alice")?;
    pause(1500).await;

    println!("filling the rest:");
    type_into(&mut registry, &mut form, &rules, "email", "alice@example.com")?;
    registry.dispatch_field_event(FieldEvent::blur("email"))?;
    type_into(&mut registry, &mut form, &rules, "password", "secret")?;
    registry.dispatch_field_event(FieldEvent::blur("password"))?;
    type_into(&mut registry, &mut form, &rules, "rePassword", "secret1")?;
    registry.dispatch_field_event(FieldEvent::blur("rePassword"))?;
    pause(400).await;

    println!("submitting:");
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let valid_tx = tx.clone();
    registry.submit(
        move || {
            let _ = valid_tx.send(true);
        },
        move || {
            let _ = tx.send(false);
        },
    );

    let accepted = rx.recv().await.unwrap_or(false);
    println!("form {}", if accepted { "accepted" } else { "rejected" });
    info!("Demo finished, aggregate validity {:?}", registry.aggregate_validity());
    Ok(())
}
