//! Integration tests for Modstore

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    mpsc, Arc, Barrier,
};
use std::thread;
use std::time::Duration;

use modstore::{build, use_module, ModuleDefinition, Store, StoreError, StoreOptions};
use serde_json::{json, Value};

fn counter() -> ModuleDefinition {
    ModuleDefinition::new("counter")
        .state("count", 0)
        .mutation("increment", |state, n| {
            let count = state["count"].as_i64().unwrap_or(0);
            state.insert("count".to_string(), json!(count + n.as_i64().unwrap_or(0)));
        })
        .action("increment_async", |ctx, n| {
            let ctx = ctx.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                let _ = ctx.commit("increment", n);
            });
            Ok(())
        })
}

fn cart() -> ModuleDefinition {
    ModuleDefinition::new("cart")
        .state("items", json!([]))
        .mutation("set_items", |state, items| {
            state.insert("items".to_string(), items);
        })
        .getter("total", |state| {
            let total: i64 = state["items"]
                .as_array()
                .map(|items| items.iter().filter_map(|i| i["price"].as_i64()).sum())
                .unwrap_or(0);
            json!(total)
        })
}

#[test]
fn counter_scenario() {
    let store = Store::new([counter(), cart()]);
    let modules = store.accessor();

    modules.commit("counter", "increment", json!(5)).unwrap();
    modules.commit("counter", "increment", json!(-2)).unwrap();

    let slice = modules.states("counter", &["count"]).unwrap();
    assert_eq!(slice.len(), 1);
    assert_eq!(slice["count"], Some(json!(3)));
}

#[test]
fn cart_getter_scenario() {
    let store = Store::new([counter(), cart()]);
    let modules = store.accessor();

    let mutations = modules.mutations("cart", &["set_items"]).unwrap();
    mutations["set_items"]
        .as_ref()
        .unwrap()
        .call(json!([{"price": 10}, {"price": 5}]))
        .unwrap();

    let values = modules.getters("cart", &["total"]).unwrap();
    assert_eq!(values["total"], Some(json!(15)));
}

#[test]
fn unknown_kind_leaves_state_untouched() {
    let store = Store::new([counter(), cart()]);
    let modules = store.accessor();
    modules.commit("counter", "increment", json!(1)).unwrap();

    let before = modules.states("counter", &["count"]).unwrap();
    let before_snapshot = modules.state("counter").unwrap();

    modules
        .commit("counter", "nonexistentType", json!({}))
        .unwrap();

    assert_eq!(modules.states("counter", &["count"]).unwrap(), before);
    assert_eq!(*modules.state("counter").unwrap(), *before_snapshot);
}

#[test]
fn commits_are_copy_on_write() {
    let store = Store::new([counter()]);
    let modules = store.accessor();

    let before = modules.state("counter").unwrap();
    modules.commit("counter", "increment", json!(2)).unwrap();
    let after = modules.state("counter").unwrap();

    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(before["count"], json!(0));
    assert_eq!(after["count"], json!(2));
}

#[test]
fn unknown_module_fails_all_reads() {
    let store = Store::new([counter()]);
    let modules = store.accessor();

    for err in [
        modules.states("ghost", &["count"]).unwrap_err(),
        modules.getters("ghost", &["total"]).unwrap_err(),
        modules.actions("ghost", &["increment_async"]).unwrap_err(),
        modules.mutations("ghost", &["increment"]).unwrap_err(),
    ] {
        assert_eq!(
            err,
            StoreError::ModuleNotFound {
                module: "ghost".to_string()
            }
        );
        assert!(err.to_string().contains("ghost"));
    }
}

#[test]
fn async_action_commits_against_live_state() {
    let release = Arc::new(Barrier::new(2));
    let gate = release.clone();
    let definition = counter().action("increment_when_released", move |ctx, n| {
        let ctx = ctx.clone();
        let gate = gate.clone();
        thread::spawn(move || {
            gate.wait();
            let _ = ctx.commit("increment", n);
        });
        Ok(())
    });
    let store = Store::new([definition]);
    let modules = store.accessor();

    let (tx, rx) = mpsc::channel();
    let _subscription = modules
        .subscribe("counter", move |state| {
            let _ = tx.send(state["count"].clone());
        })
        .unwrap();

    let actions = modules
        .actions("counter", &["increment_when_released"])
        .unwrap();
    actions["increment_when_released"]
        .as_ref()
        .unwrap()
        .call(json!(10))
        .unwrap();

    modules.commit("counter", "increment", json!(1)).unwrap();
    release.wait();

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), json!(1));
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), json!(11));
}

#[test]
fn async_action_completes_in_background() {
    let store = Store::new([counter()]);
    let modules = store.accessor();

    let (tx, rx) = mpsc::channel();
    let _subscription = modules
        .subscribe("counter", move |state| {
            let _ = tx.send(state["count"].clone());
        })
        .unwrap();

    let actions = modules.actions("counter", &["increment_async"]).unwrap();
    actions["increment_async"]
        .as_ref()
        .unwrap()
        .call(json!(10))
        .unwrap();

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), json!(10));
    assert_eq!(modules.state("counter").unwrap()["count"], json!(10));
}

#[test]
fn async_action_after_teardown_is_rejected() {
    let factory = build([counter()]);
    let (tx, rx) = mpsc::channel();

    let context = factory
        .scope(|modules| {
            let instance = modules.store().module("counter").unwrap();
            instance.context()
        })
        .unwrap();

    thread::spawn(move || {
        let _ = tx.send(context.commit("increment", json!(1)));
    });

    let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(
        result,
        Err(StoreError::Disposed {
            module: "counter".to_string()
        })
    );
}

#[test]
fn scoped_accessor_resolution() {
    assert_eq!(use_module().unwrap_err(), StoreError::OutsideScope);

    let factory = build([counter()]);
    let count = factory
        .scope(|_| {
            let modules = use_module().unwrap();
            modules.commit("counter", "increment", json!(4)).unwrap();
            modules.states("counter", &["count"]).unwrap()["count"].clone()
        })
        .unwrap();

    assert_eq!(count, Some(json!(4)));
    assert_eq!(use_module().unwrap_err(), StoreError::OutsideScope);
}

#[test]
fn nested_scopes_shadow_outer() {
    let outer = Store::new([counter()]);
    let inner = Store::new([cart()]);

    outer.provide(|| {
        assert_eq!(use_module().unwrap().modules(), vec!["counter"]);

        inner.provide(|| {
            let modules = use_module().unwrap();
            assert_eq!(modules.modules(), vec!["cart"]);
            assert!(matches!(
                modules.states("counter", &["count"]),
                Err(StoreError::ModuleNotFound { .. })
            ));
        });

        assert_eq!(use_module().unwrap().modules(), vec!["counter"]);
    });
}

#[test]
fn each_activation_starts_from_initial_state() {
    let factory = build([counter()]);

    for _ in 0..3 {
        let count = factory
            .scope(|modules| {
                modules.commit("counter", "increment", json!(1)).unwrap();
                modules.state("counter").unwrap()["count"].clone()
            })
            .unwrap();
        assert_eq!(count, json!(1));
    }
}

#[test]
fn strict_mode_reports_unknown_kinds() {
    let store = Store::builder()
        .module(counter())
        .options(StoreOptions { strict: true })
        .build()
        .unwrap();

    let err = store
        .accessor()
        .commit("counter", "nonexistentType", Value::Null)
        .unwrap_err();
    assert_eq!(
        err,
        StoreError::UnknownMutation {
            module: "counter".to_string(),
            kind: "nonexistentType".to_string(),
        }
    );
}

#[test]
fn store_subscription() {
    let store = Store::new([counter(), cart()]);
    let counter_calls = Arc::new(AtomicUsize::new(0));
    let counter_calls_clone = counter_calls.clone();

    let _subscription = store.subscribe(move |module, _| {
        if module == "counter" {
            counter_calls_clone.fetch_add(1, Ordering::SeqCst);
        }
    });

    let modules = store.accessor();
    modules.commit("counter", "increment", json!(1)).unwrap();
    modules.commit("cart", "set_items", json!([])).unwrap();
    modules.commit("counter", "unknown", json!(1)).unwrap();

    assert_eq!(counter_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn broadcast_kind_reaches_only_modules_that_handle_it() {
    let logger = ModuleDefinition::new("log")
        .state("entries", json!([]))
        .mutation("increment", |state, n| {
            if let Some(entries) = state.get_mut("entries").and_then(Value::as_array_mut) {
                entries.push(n);
            }
        });
    let store = Store::new([counter(), cart(), logger]);
    let modules = store.accessor();

    for module in modules.modules() {
        modules.commit(module, "increment", json!(2)).unwrap();
    }

    assert_eq!(modules.state("counter").unwrap()["count"], json!(2));
    assert_eq!(modules.state("log").unwrap()["entries"], json!([2]));
    assert_eq!(modules.state("cart").unwrap()["items"], json!([]));
}
