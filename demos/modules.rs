//! Demonstration of module stores: a todo list plus a session module
//!
//! Run with `RUST_LOG=modstore=trace` to see every transition.

use std::thread;
use std::time::Duration;

use modstore::{build, use_module, ModuleDefinition, State, StoreError};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

fn todos() -> ModuleDefinition {
    ModuleDefinition::new("todos")
        .state("items", json!([]))
        .state("filter", "all")
        .mutation("add", |state, title| {
            if let Some(items) = state.get_mut("items").and_then(Value::as_array_mut) {
                let id = items.len();
                items.push(json!({"id": id, "title": title, "completed": false}));
            }
        })
        .mutation("toggle", |state, id| {
            if let Some(items) = state.get_mut("items").and_then(Value::as_array_mut) {
                for item in items.iter_mut().filter(|item| item["id"] == id) {
                    let completed = item["completed"].as_bool().unwrap_or(false);
                    item["completed"] = json!(!completed);
                }
            }
        })
        .mutation("set_filter", |state, filter| {
            state.insert("filter".to_string(), filter);
        })
        .action("import", |ctx, titles| {
            let titles = titles
                .as_array()
                .cloned()
                .ok_or_else(|| ctx.fail("import", "expected a list of titles"))?;
            for title in titles {
                ctx.commit("add", title)?;
            }
            Ok(())
        })
        .getter("stats", |state| {
            let (total, completed) = counts(state);
            json!({"total": total, "active": total - completed, "completed": completed})
        })
        .getter("visible", |state| {
            let filter = state["filter"].as_str().unwrap_or("all");
            let items = state["items"].as_array().cloned().unwrap_or_default();
            let visible: Vec<Value> = items
                .into_iter()
                .filter(|item| {
                    let completed = item["completed"].as_bool().unwrap_or(false);
                    match filter {
                        "active" => !completed,
                        "completed" => completed,
                        _ => true,
                    }
                })
                .map(|item| item["title"].clone())
                .collect();
            json!(visible)
        })
}

fn session() -> ModuleDefinition {
    ModuleDefinition::new("session")
        .state("user", Value::Null)
        .mutation("login", |state, user| {
            state.insert("user".to_string(), user);
        })
        .action("login_later", |ctx, user| {
            let ctx = ctx.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                if let Err(err) = ctx.commit("login", user) {
                    tracing::warn!(%err, "login arrived after teardown");
                }
            });
            Ok(())
        })
}

fn counts(state: &State) -> (usize, usize) {
    let items = state["items"].as_array().map(Vec::as_slice).unwrap_or(&[]);
    let completed = items
        .iter()
        .filter(|item| item["completed"].as_bool().unwrap_or(false))
        .count();
    (items.len(), completed)
}

fn run() -> Result<(), StoreError> {
    let factory = build([todos(), session()]);

    factory.scope(|modules| -> Result<(), StoreError> {
        println!("=== Module Store Example: Todo App ===\n");

        println!("1. Subscribing to todo changes");
        let _subscription = modules.subscribe("todos", |state| {
            let (total, completed) = counts(state);
            println!("   [todos] total: {}, completed: {}", total, completed);
        })?;

        println!("\n2. Adding todos through an action");
        let actions = modules.actions("todos", &["import"])?;
        if let Some(import) = &actions["import"] {
            import.call(json!(["Learn Rust", "Build a store", "Write documentation"]))?;
        }

        println!("\n3. Completing the first two todos");
        let mutations = modules.mutations("todos", &["toggle", "set_filter"])?;
        if let Some(toggle) = &mutations["toggle"] {
            toggle.call(json!(0))?;
            toggle.call(json!(1))?;
        }

        println!("\n4. Active todos only");
        if let Some(set_filter) = &mutations["set_filter"] {
            set_filter.call(json!("active"))?;
        }
        let values = modules.getters("todos", &["visible", "stats"])?;
        println!("   visible: {:?}", values["visible"]);
        println!("   stats:   {:?}", values["stats"]);

        println!("\n5. Logging in from a background action");
        let nested = use_module()?;
        let actions = nested.actions("session", &["login_later"])?;
        if let Some(login) = &actions["login_later"] {
            login.call(json!({"name": "ada"}))?;
        }
        println!("   right away: {:?}", nested.states("session", &["user"])?["user"]);
        thread::sleep(Duration::from_millis(50));
        println!("   a bit later: {:?}", nested.states("session", &["user"])?["user"]);

        Ok(())
    })??;

    println!("\n✓ Example complete!");
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
