//! Hot reload of the default observer's settings.

mod common;

use std::fs;
use std::sync::Arc;

use common::{Harness, CREATE_PEOPLE};
use sqlscope::config::{load_config, spawn_observer_reload, ScopeConfig};
use sqlscope::context::Context;
use sqlscope::driver::Connector;
use sqlscope::memdb::{Capabilities, MemDriver};
use sqlscope::observer::{DefaultObserver, MemorySink};
use sqlscope::proxy::wrap;
use tokio::sync::mpsc;

#[tokio::test]
async fn test_reloaded_settings_apply_to_running_proxy() {
    let sink = Arc::new(MemorySink::new());
    let observer = Arc::new(DefaultObserver::new(sink.clone()));
    let backend = MemDriver::new(Capabilities::full());
    let proxy = wrap(observer.clone(), backend.connector("reload"));

    let ctx = Context::background();
    proxy.connect(&ctx).unwrap().close().unwrap();
    assert_eq!(sink.take(), vec!["Connect → CONN(1)"]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sqlscope.toml");
    fs::write(&path, "[observer]\nlog_connect = false\nlog_close = true\n").unwrap();
    let config = load_config(&path).unwrap();

    let (tx, rx) = mpsc::unbounded_channel::<ScopeConfig>();
    let task = spawn_observer_reload(rx, observer.clone());
    tx.send(config).unwrap();
    drop(tx);
    task.await.unwrap();

    assert!(observer.config().log_close);
    proxy.connect(&ctx).unwrap().close().unwrap();
    assert_eq!(sink.take(), vec!["CONN(2) ► Close"]);
}

#[tokio::test]
async fn test_disabling_observer_silences_harnessed_backend() {
    let h = Harness::new(Capabilities::full());
    h.seed(&[CREATE_PEOPLE]);

    let sink = Arc::new(MemorySink::new());
    let observer = Arc::new(DefaultObserver::new(sink.clone()));
    let proxy = wrap(observer.clone(), h.backend.connector(&h.database));

    let (tx, rx) = mpsc::unbounded_channel();
    let task = spawn_observer_reload(rx, observer);
    let mut config = ScopeConfig::default();
    config.observer.enabled = false;
    tx.send(config).unwrap();
    drop(tx);
    task.await.unwrap();

    let mut conn = proxy.connect(&Context::background()).unwrap();
    conn.prepare("SELECT|people|name").unwrap().close().unwrap();
    conn.close().unwrap();
    assert!(sink.lines().is_empty());
}
