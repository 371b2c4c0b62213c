use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::json;

use super::*;
use crate::component::{PlainComponent, Props};
use crate::config::Environment;
use crate::error::StorageError;
use crate::filter::FilterKeys;
use crate::key::FALLBACK_KEY;
use crate::probe::{Capability, HostContext, probe};
use crate::storage::{KeyValueStore, MemoryStore, SharedStore};
use crate::unload::UnloadSignal;

fn obj(value: Value) -> State {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn setup() -> (Rc<MemoryStore>, AdapterConfig) {
    let (typed, shared) = MemoryStore::shared();
    let config = AdapterConfig::new(probe(Some(shared), HostContext::Headless))
        .with_environment(Environment::Development);
    (typed, config)
}

fn stored(store: &MemoryStore, key: &str) -> Option<Value> {
    store.raw(key).map(|raw| serde_json::from_str(&raw).expect("stored value is json"))
}

fn mounted(component: PlainComponent, config: &AdapterConfig) -> LocalStorage<PlainComponent> {
    let wrapped = LocalStorage::wrap(component, config.clone());
    wrapped.mount();
    wrapped
}

// =============================================================
// Key derivation through the wrapper
// =============================================================

#[test]
fn uses_display_name_as_key() {
    let (store, config) = setup();
    let c = mounted(PlainComponent::new("component1"), &config);
    c.set_state(obj(json!({"a": "world"})));
    c.unmount().expect("unmount");

    assert_eq!(store.raw("component1").as_deref(), Some(r#"{"a":"world"}"#));
}

#[test]
fn uses_props_storage_key() {
    let (store, config) = setup();
    let component = PlainComponent::new("component2").with_props(Props::new().with_storage_key("component-key"));
    let c = mounted(component, &config);
    c.set_state(obj(json!({"hello": "moon"})));
    c.unmount().expect("unmount");

    assert_eq!(stored(&store, "component-key"), Some(json!({"hello": "moon"})));
    assert_eq!(store.raw("component2"), None);
}

#[test]
fn uses_fallback_key_without_any_name() {
    let (store, config) = setup();
    let c = mounted(PlainComponent::anonymous(), &config);
    c.set_state(obj(json!({"hello": "star"})));
    c.unmount().expect("unmount");

    assert_eq!(stored(&store, FALLBACK_KEY), Some(json!({"hello": "star"})));
}

#[test]
fn function_key_reads_other_props() {
    let (store, config) = setup();
    let props = Props::new().with("otherKey", "jenkees").with_storage_key_fn(|props| {
        props
            .get("otherKey")
            .and_then(Value::as_str)
            .map_or(StorageKey::Disabled, StorageKey::from)
    });
    let c = mounted(PlainComponent::new("component1").with_props(props), &config);
    c.set_state(obj(json!({"a": "world"})));
    c.unmount().expect("unmount");

    assert_eq!(stored(&store, "jenkees"), Some(json!({"a": "world"})));
}

/// Component with its own key and filter overrides.
struct Dashboard {
    props: Props,
    state: Option<State>,
    disabled: bool,
}

impl Dashboard {
    fn new() -> Self {
        Self { props: Props::new().with_storage_key("ignored"), state: None, disabled: false }
    }
}

impl Component for Dashboard {
    fn props(&self) -> &Props {
        &self.props
    }

    fn state(&self) -> Option<&State> {
        self.state.as_ref()
    }

    fn set_state(&mut self, partial: State) {
        self.state.get_or_insert_with(State::new).extend(partial);
    }

    fn static_display_name(&self) -> Option<&'static str> {
        Some("ComponentUseMethod")
    }

    fn local_storage_key(&self) -> Option<StorageKey> {
        if self.disabled {
            return Some(StorageKey::Disabled);
        }
        Some(StorageKey::Key(format!("{}DynamicSuffix", self.static_display_name().unwrap_or_default())))
    }

    fn state_filter_keys(&self) -> Option<FilterKeys> {
        Some(FilterKeys::from(["a", "b"]))
    }
}

#[test]
fn override_methods_drive_key_and_filter() {
    let (store, config) = setup();
    let c = LocalStorage::wrap(Dashboard::new(), config);
    c.mount();
    c.set_state(obj(json!({"a": "world", "b": "bar", "c": "shouldNotSync"})));
    c.unmount().expect("unmount");

    assert_eq!(stored(&store, "ComponentUseMethodDynamicSuffix"), Some(json!({"a": "world", "b": "bar"})));
    assert_eq!(store.raw("ignored"), None);
}

#[test]
fn override_returning_disabled_suppresses_writes() {
    let (store, config) = setup();
    let c = LocalStorage::wrap(Dashboard { disabled: true, ..Dashboard::new() }, config);
    assert_eq!(c.mount(), LoadOutcome::Disabled);
    c.set_state(obj(json!({"a": "world"})));
    assert_eq!(c.save().expect("save"), SaveOutcome::Skipped(SkipReason::Disabled));
    c.unmount().expect("unmount");

    assert!(store.is_empty());
}

// =============================================================
// Filtering
// =============================================================

#[test]
fn props_filter_keeps_only_listed_keys() {
    let (store, config) = setup();
    let component = PlainComponent::new("componentStateFilter")
        .with_props(Props::new().with_filter_keys(["a", "b"]));
    let c = mounted(component, &config);
    c.set_state(obj(json!({"a": "world", "b": "bar", "c": "shouldNotSync"})));
    c.unmount().expect("unmount");

    assert_eq!(stored(&store, "componentStateFilter"), Some(json!({"a": "world", "b": "bar"})));
}

#[test]
fn single_string_filter_prop() {
    let (store, config) = setup();
    let component = PlainComponent::new("one").with_props(Props::new().with_filter_keys("a"));
    let c = mounted(component, &config);
    c.set_state(obj(json!({"a": 1, "b": 2})));
    c.unmount().expect("unmount");

    assert_eq!(stored(&store, "one"), Some(json!({"a": 1})));
}

// =============================================================
// Disabling
// =============================================================

#[test]
fn disabled_key_never_writes() {
    let (store, config) = setup();
    let first = mounted(PlainComponent::new("component1"), &config);
    first.set_state(obj(json!({"a": "world"})));
    first.unmount().expect("unmount");

    let second = LocalStorage::wrap(
        PlainComponent::new("component1").with_props(Props::new().without_storage()),
        config,
    );
    assert_eq!(second.mount(), LoadOutcome::Disabled);
    assert_eq!(second.state(), None);
    second.set_state(obj(json!({"a": "hello"})));
    second.unmount().expect("unmount");

    assert_eq!(stored(&store, "component1"), Some(json!({"a": "world"})));
}

#[test]
fn function_key_returning_disabled_never_writes() {
    let (store, config) = setup();
    let props = Props::new().with_storage_key_fn(|_| StorageKey::Disabled);
    let c = mounted(PlainComponent::new("component1").with_props(props), &config);
    c.set_state(obj(json!({"a": "world"})));
    c.unmount().expect("unmount");

    assert!(store.is_empty());
}

// =============================================================
// Save timing
// =============================================================

#[test]
fn updates_do_not_write_until_unmount() {
    let (store, config) = setup();
    let c = mounted(PlainComponent::new("component1"), &config);

    c.set_state(obj(json!({"a": "world"})));
    assert_eq!(store.raw("component1"), None);
    c.set_state(obj(json!({"a": "moon", "b": 1})));
    assert_eq!(store.raw("component1"), None);

    c.unmount().expect("unmount");
    assert_eq!(stored(&store, "component1"), Some(json!({"a": "moon", "b": 1})));
}

#[test]
fn save_before_mount_is_skipped() {
    let (store, config) = setup();
    let c = LocalStorage::wrap(PlainComponent::new("early"), config);
    c.set_state(obj(json!({"a": 1})));

    assert_eq!(c.save().expect("save"), SaveOutcome::Skipped(SkipReason::NotLoaded));
    assert!(!c.is_loaded());
    assert!(store.is_empty());
}

#[test]
fn manual_save_writes_immediately() {
    let (store, config) = setup();
    let c = mounted(PlainComponent::new("manual"), &config);
    c.set_state(obj(json!({"a": 1})));

    assert_eq!(c.save().expect("save"), SaveOutcome::Written { key: "manual".to_owned() });
    assert_eq!(stored(&store, "manual"), Some(json!({"a": 1})));
}

// =============================================================
// Loading
// =============================================================

#[test]
fn round_trip_restores_state_on_next_mount() {
    let (_store, config) = setup();
    let first = mounted(PlainComponent::new("component"), &config);
    first.set_state(obj(json!({"hello": "venus"})));
    first.unmount().expect("unmount");

    let second = LocalStorage::wrap(PlainComponent::new("component"), config);
    assert_eq!(second.mount(), LoadOutcome::Applied);
    assert_eq!(second.state(), Some(obj(json!({"hello": "venus"}))));
    assert!(second.is_loaded());
    assert_eq!(second.phase(), Phase::Loaded);
}

#[test]
fn schema_drift_does_not_fail() {
    let (store, config) = setup();
    let config = config.with_consistency_check(true);

    let old = LocalStorage::wrap(
        PlainComponent::new("component").with_initial_state(obj(json!({"hello": null}))),
        config.clone(),
    );
    old.mount();
    old.set_state(obj(json!({"hello": "venus"})));
    old.unmount().expect("unmount");

    let updated = LocalStorage::wrap(
        PlainComponent::new("component").with_initial_state(obj(json!({"hello": null, "newprop": null}))),
        config,
    );
    assert_eq!(updated.mount(), LoadOutcome::Applied);
    assert_eq!(updated.state(), Some(obj(json!({"hello": "venus", "newprop": null}))));
    updated.set_state(obj(json!({"hello": "neptune"})));
    updated.unmount().expect("unmount");

    assert_eq!(stored(&store, "component"), Some(json!({"hello": "neptune", "newprop": null})));
}

#[test]
fn malformed_value_is_ignored_then_overwritten() {
    let (store, config) = setup();
    store.set_item("broken", "{not json").expect("seed");

    let c = LocalStorage::wrap(
        PlainComponent::new("broken").with_initial_state(obj(json!({"a": 0}))),
        config,
    );
    assert_eq!(c.mount(), LoadOutcome::Malformed);
    assert!(c.is_loaded());
    assert_eq!(c.state(), Some(obj(json!({"a": 0}))));

    c.unmount().expect("unmount");
    assert_eq!(stored(&store, "broken"), Some(json!({"a": 0})));
}

#[test]
fn non_object_value_is_malformed() {
    let (store, config) = setup();
    store.set_item("list", "[1,2]").expect("seed");
    let c = LocalStorage::wrap(PlainComponent::new("list"), config);
    assert_eq!(c.mount(), LoadOutcome::Malformed);
    assert_eq!(c.state(), None);
}

#[test]
fn stored_null_is_nothing_to_load() {
    let (store, config) = setup();
    store.set_item("nil", "null").expect("seed");
    let c = LocalStorage::wrap(PlainComponent::new("nil"), config);
    assert_eq!(c.mount(), LoadOutcome::Empty);
    assert_eq!(c.state(), None);
}

#[test]
fn mount_twice_is_ignored() {
    let (_store, config) = setup();
    let c = mounted(PlainComponent::new("twice"), &config);
    assert_eq!(c.mount(), LoadOutcome::AlreadyMounted);
}

#[test]
fn remount_after_unmount_reloads() {
    let (_store, config) = setup();
    let c = mounted(PlainComponent::new("again"), &config);
    c.set_state(obj(json!({"n": 1})));
    c.unmount().expect("unmount");
    assert_eq!(c.phase(), Phase::Unmounted);

    assert_eq!(c.mount(), LoadOutcome::Applied);
}

// =============================================================
// Lifecycle ordering
// =============================================================

#[derive(Default)]
struct Recorder {
    props: Props,
    state: Option<State>,
    events: Rc<RefCell<Vec<String>>>,
}

impl Component for Recorder {
    fn props(&self) -> &Props {
        &self.props
    }

    fn state(&self) -> Option<&State> {
        self.state.as_ref()
    }

    fn set_state(&mut self, partial: State) {
        self.events.borrow_mut().push("set_state".to_owned());
        self.state.get_or_insert_with(State::new).extend(partial);
    }

    fn display_name(&self) -> Option<&str> {
        Some("recorder")
    }

    fn did_mount(&mut self) {
        let seen = self.state.as_ref().and_then(|s| s.get("step")).cloned().unwrap_or(Value::Null);
        self.events.borrow_mut().push(format!("did_mount:{seen}"));
    }

    fn will_unmount(&mut self) {
        self.events.borrow_mut().push("will_unmount".to_owned());
        self.state.get_or_insert_with(State::new).insert("closing".to_owned(), json!(true));
    }
}

#[test]
fn inner_did_mount_runs_after_load() {
    let (store, config) = setup();
    store.set_item("recorder", r#"{"step":3}"#).expect("seed");

    let events = Rc::new(RefCell::new(Vec::new()));
    let c = LocalStorage::wrap(Recorder { events: events.clone(), ..Recorder::default() }, config);
    c.mount();

    assert_eq!(*events.borrow(), vec!["set_state".to_owned(), "did_mount:3".to_owned()]);
}

#[test]
fn inner_will_unmount_runs_before_save() {
    let (store, config) = setup();
    let events = Rc::new(RefCell::new(Vec::new()));
    let c = LocalStorage::wrap(Recorder { events: events.clone(), ..Recorder::default() }, config);
    c.mount();
    c.unmount().expect("unmount");

    assert_eq!(events.borrow().last().map(String::as_str), Some("will_unmount"));
    assert_eq!(stored(&store, "recorder"), Some(json!({"closing": true})));
}

#[test]
fn wrapper_reports_inner_display_name() {
    let (_store, config) = setup();
    let c = LocalStorage::wrap(PlainComponent::new("Sidebar"), config.clone());
    assert_eq!(c.display_name().as_deref(), Some("Sidebar"));

    let anon = LocalStorage::wrap(PlainComponent::anonymous(), config);
    assert_eq!(anon.display_name(), None);
    assert_eq!(anon.storage_key(), StorageKey::from(FALLBACK_KEY));
}

// =============================================================
// Unload safety net
// =============================================================

fn setup_with_unload() -> (Rc<MemoryStore>, Rc<UnloadSignal>, AdapterConfig) {
    let (store, config) = setup();
    let signal = Rc::new(UnloadSignal::new());
    let config = config.with_unload_target(signal.clone());
    (store, signal, config)
}

#[test]
fn unload_signal_flushes_state_once() {
    let (store, signal, config) = setup_with_unload();
    let c = mounted(PlainComponent::new("tab"), &config);
    assert_eq!(signal.listener_count(), 1);

    c.set_state(obj(json!({"draft": "hello"})));
    signal.dispatch();

    assert_eq!(stored(&store, "tab"), Some(json!({"draft": "hello"})));
    assert_eq!(signal.listener_count(), 0);
    assert_eq!(c.phase(), Phase::Unmounted);

    // A later dispatch or explicit teardown must not write again.
    store.set_item("tab", r#"{"draft":"external"}"#).expect("overwrite");
    signal.dispatch();
    c.unmount().expect("unmount");
    assert_eq!(stored(&store, "tab"), Some(json!({"draft": "external"})));
}

#[test]
fn unmount_removes_unload_listener() {
    let (_store, signal, config) = setup_with_unload();
    let c = mounted(PlainComponent::new("tab"), &config);
    assert_eq!(signal.listener_count(), 1);

    c.unmount().expect("unmount");
    assert_eq!(signal.listener_count(), 0);
}

#[test]
fn dropping_the_wrapper_removes_unload_listener() {
    let (_store, signal, config) = setup_with_unload();
    let c = mounted(PlainComponent::new("tab"), &config);
    assert_eq!(signal.listener_count(), 1);

    drop(c);
    assert_eq!(signal.listener_count(), 0);
}

// =============================================================
// Unavailable and failing storage
// =============================================================

#[test]
fn unavailable_storage_is_pass_through() {
    let signal = Rc::new(UnloadSignal::new());
    let config = AdapterConfig::new(Capability::Unavailable).with_unload_target(signal.clone());
    let c = LocalStorage::wrap(PlainComponent::new("offline"), config);

    assert_eq!(c.mount(), LoadOutcome::Unavailable);
    assert!(c.is_loaded());
    assert_eq!(signal.listener_count(), 0);

    c.set_state(obj(json!({"a": 1})));
    assert_eq!(c.save().expect("save"), SaveOutcome::Skipped(SkipReason::Unavailable));
    c.unmount().expect("unmount");
    assert_eq!(c.state(), Some(obj(json!({"a": 1}))));
}

/// Engine whose reads or writes can be made to fail after the probe.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_reads: Cell<bool>,
    fail_writes: Cell<bool>,
}

impl KeyValueStore for FlakyStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.fail_reads.get() {
            return Err(StorageError::Read { key: key.to_owned(), reason: "SecurityError".to_owned() });
        }
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.get() {
            return Err(StorageError::Write { key: key.to_owned(), reason: "QuotaExceededError".to_owned() });
        }
        self.inner.set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove_item(key)
    }
}

#[test]
fn write_failure_is_swallowed() {
    let flaky = Rc::new(FlakyStore::default());
    let shared: SharedStore = flaky.clone();
    let c = LocalStorage::wrap(PlainComponent::new("quota"), AdapterConfig::new(Capability::Available(shared)));
    c.mount();
    c.set_state(obj(json!({"a": 1})));

    flaky.fail_writes.set(true);
    assert_eq!(c.save().expect("save"), SaveOutcome::Failed);
    c.unmount().expect("unmount completes");
    assert_eq!(c.phase(), Phase::Unmounted);
}

#[test]
fn read_failure_still_marks_loaded() {
    let flaky = Rc::new(FlakyStore::default());
    flaky.fail_reads.set(true);
    let shared: SharedStore = flaky.clone();
    let c = LocalStorage::wrap(PlainComponent::new("locked"), AdapterConfig::new(Capability::Available(shared)));

    assert_eq!(c.mount(), LoadOutcome::Failed);
    assert!(c.is_loaded());

    flaky.fail_reads.set(false);
    c.set_state(obj(json!({"a": 1})));
    c.unmount().expect("unmount");
    assert_eq!(flaky.inner.raw("locked").as_deref(), Some(r#"{"a":1}"#));
}

// =============================================================
// Consistency check
// =============================================================

#[test]
fn shared_key_conflict_fails_in_development() {
    let (store, signal, config) = setup_with_unload();
    let config = config.with_consistency_check(true);
    let first = mounted(PlainComponent::new("shared"), &config);
    let second = mounted(PlainComponent::new("shared"), &config);

    first.set_state(obj(json!({"hello": "mercury"})));
    first.unmount().expect("first unmount");

    second.set_state(obj(json!({"hello": "saturn"})));
    let err = second.unmount().expect_err("conflict");
    assert!(matches!(err, PersistError::ConcurrentExternalMutation { ref key, .. } if key == "shared"));

    // Teardown still completed and the conflicting write was not made.
    assert_eq!(second.phase(), Phase::Unmounted);
    assert_eq!(signal.listener_count(), 0);
    assert_eq!(stored(&store, "shared"), Some(json!({"hello": "mercury"})));
}

#[test]
fn shared_key_conflict_is_silent_in_production() {
    let (store, config) = setup();
    let config = config.with_consistency_check(true).with_environment(Environment::Production);
    let first = mounted(PlainComponent::new("shared"), &config);
    let second = mounted(PlainComponent::new("shared"), &config);

    first.set_state(obj(json!({"hello": "mercury"})));
    first.unmount().expect("first unmount");
    second.set_state(obj(json!({"hello": "saturn"})));
    second.unmount().expect("no check in production");

    assert_eq!(stored(&store, "shared"), Some(json!({"hello": "saturn"})));
}

#[test]
fn repeated_saves_by_one_instance_pass_the_check() {
    let (_store, config) = setup();
    let c = mounted(PlainComponent::new("solo"), &config.with_consistency_check(true));
    c.set_state(obj(json!({"n": 1})));
    c.save().expect("first save");
    c.set_state(obj(json!({"n": 2})));
    c.save().expect("second save");
    c.unmount().expect("unmount");
}

#[test]
fn remount_after_external_clear_passes_the_check() {
    let (store, config) = setup();
    let config = config.with_consistency_check(true);
    let c = mounted(PlainComponent::new("again"), &config);
    c.set_state(obj(json!({"n": 1})));
    c.unmount().expect("first unmount");

    store.clear();

    assert_eq!(c.mount(), LoadOutcome::Empty);
    c.set_state(obj(json!({"n": 2})));
    c.unmount().expect("storage matches what this mount saw");
    assert_eq!(stored(&store, "again"), Some(json!({"n": 2})));
}
