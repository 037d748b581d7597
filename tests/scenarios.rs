//! End-to-end notification sequences through the proxy.

mod common;

use std::sync::Arc;

use common::{person, Event, Harness, CREATE_PEOPLE, INSERT_PEOPLE, SELECT_PEOPLE};
use sqlscope::client::Database;
use sqlscope::config::ObserverConfig;
use sqlscope::context::Context;
use sqlscope::driver::{to_named, Connector, DriverError, IsolationLevel, TxOptions, Value};
use sqlscope::memdb::Capabilities;
use sqlscope::observer::{DefaultObserver, MemorySink};
use sqlscope::proxy::wrap;

#[test]
fn test_connect_then_prepare() {
    let h = Harness::new(Capabilities::baseline());
    let mut conn = h.connect();
    let stmt = conn.prepare("INSERT|people|name=?").unwrap();

    assert_eq!(
        h.observer.events(),
        vec![
            Event::Connect { conn: 1 },
            Event::ConnPrepare {
                conn: 1,
                stmt: 2,
                query: "INSERT|people|name=?".to_string(),
            },
        ]
    );
    assert_eq!(stmt.num_input(), Some(1));
}

#[test]
fn test_prepare_exec_close_then_conn_exec() {
    let h = Harness::new(Capabilities::full());
    h.seed(&[CREATE_PEOPLE]);
    let ctx = Context::background();
    let args = to_named(&person("ada", 36));

    let mut conn = h.connect();
    let mut stmt = conn
        .as_prepare_context()
        .unwrap()
        .prepare_context(&ctx, INSERT_PEOPLE)
        .unwrap();
    stmt.as_exec_context().unwrap().exec_context(&ctx, &args).unwrap();
    stmt.close().unwrap();
    conn.as_execer_context()
        .unwrap()
        .exec_context(&ctx, INSERT_PEOPLE, &args)
        .unwrap();

    let events = h.observer.events();
    assert_eq!(
        events,
        vec![
            Event::Connect { conn: 1 },
            Event::ConnPrepareContext {
                conn: 1,
                stmt: 2,
                query: INSERT_PEOPLE.to_string(),
            },
            Event::StmtExecContext {
                stmt: 2,
                query: INSERT_PEOPLE.to_string(),
                args: args.clone(),
            },
            Event::StmtClose { stmt: 2 },
            Event::ConnExecContext {
                conn: 1,
                query: INSERT_PEOPLE.to_string(),
                args,
            },
        ]
    );
    assert!(!events
        .iter()
        .any(|e| matches!(e, Event::ConnQuery { .. } | Event::ConnQueryContext { .. })));
}

#[test]
fn test_non_default_isolation_rejected_without_extended_begin() {
    let h = Harness::new(Capabilities::baseline());
    let mut conn = h.connect();
    let opts = TxOptions {
        isolation: IsolationLevel::Serializable,
        read_only: false,
    };

    let err = conn.as_begin_tx().unwrap().begin_tx(&Context::background(), opts).err();

    assert_eq!(err, Some(DriverError::UnsupportedIsolationLevel));
    assert!(!h
        .observer
        .events()
        .iter()
        .any(|e| matches!(e, Event::ConnBegin { .. })));
}

#[test]
fn test_cancelled_fallback_prepare_closes_statement() {
    let h = Harness::new(Capabilities::baseline());
    let mut conn = h.connect();
    h.observer.clear();

    let (ctx, cancel) = Context::background().with_cancel();
    cancel.cancel();
    let err = conn
        .as_prepare_context()
        .unwrap()
        .prepare_context(&ctx, INSERT_PEOPLE)
        .err();

    assert_eq!(err, Some(DriverError::Canceled));
    assert!(h.observer.events().is_empty());
    let stats = h.backend.stats();
    assert_eq!(stats.stmts_prepared, 1);
    assert_eq!(stats.open_stmts(), 0);
}

#[test]
fn test_transaction_lifecycle() {
    let h = Harness::new(Capabilities::full());
    h.seed(&[CREATE_PEOPLE]);
    let ctx = Context::background();
    let mut conn = h.connect();

    let tx = conn.as_begin_tx().unwrap().begin_tx(&ctx, TxOptions::default()).unwrap();
    conn.as_execer().unwrap().exec(INSERT_PEOPLE, &person("ada", 36)).unwrap();
    tx.rollback().unwrap();

    let tx = conn.begin().unwrap();
    tx.commit().unwrap();

    assert_eq!(
        h.observer.events(),
        vec![
            Event::Connect { conn: 1 },
            Event::ConnBegin {
                conn: 1,
                tx: 2,
                opts: TxOptions::default(),
            },
            Event::ConnExec {
                conn: 1,
                query: INSERT_PEOPLE.to_string(),
                args: person("ada", 36),
            },
            Event::TxRollback { tx: 2 },
            Event::ConnBegin {
                conn: 1,
                tx: 3,
                opts: TxOptions::default(),
            },
            Event::TxCommit { tx: 3 },
        ]
    );

    let mut rows = conn.as_queryer().unwrap().query(SELECT_PEOPLE, &[]).unwrap();
    let mut row = vec![Value::Null; 2];
    assert!(!rows.next(&mut row).unwrap(), "rollback discarded the insert");
    rows.close().unwrap();
}

#[test]
fn test_rollback_leaves_other_connections_writes() {
    let h = Harness::new(Capabilities::full());
    h.seed(&[CREATE_PEOPLE]);
    let mut first = h.connect();
    let mut second = h.connect();

    let tx = first.begin().unwrap();
    first.as_execer().unwrap().exec(INSERT_PEOPLE, &person("ada", 36)).unwrap();
    second.as_execer().unwrap().exec(INSERT_PEOPLE, &person("bob", 40)).unwrap();
    tx.rollback().unwrap();

    let mut rows = second.as_queryer().unwrap().query(SELECT_PEOPLE, &[]).unwrap();
    let mut row = vec![Value::Null; 2];
    assert!(rows.next(&mut row).unwrap());
    assert_eq!(row, person("bob", 40));
    assert!(!rows.next(&mut row).unwrap());
    rows.close().unwrap();
}

#[test]
fn test_default_observer_transcript() {
    let backend = sqlscope::memdb::MemDriver::new(Capabilities::full());
    let sink = Arc::new(MemorySink::new());
    let observer = Arc::new(DefaultObserver::with_config(
        sink.clone(),
        ObserverConfig {
            log_close: true,
            ..Default::default()
        },
    ));
    let db = Database::new(Arc::new(wrap(observer, backend.connector("transcript"))));
    let ctx = Context::background();

    let mut session = db.connect(&ctx).unwrap();
    session.exec(&ctx, CREATE_PEOPLE, &[]).unwrap();
    let tx = session.begin(&ctx, TxOptions::default()).unwrap();
    let mut stmt = session.prepare(&ctx, INSERT_PEOPLE).unwrap();
    stmt.exec(&ctx, &person("ada", 36)).unwrap();
    stmt.close().unwrap();
    tx.commit().unwrap();
    let mut rows = session.query(&ctx, SELECT_PEOPLE, &[]).unwrap();
    assert_eq!(rows.collect_rows().unwrap(), vec![person("ada", 36)]);
    rows.close().unwrap();
    session.close().unwrap();

    assert_eq!(
        sink.lines(),
        vec![
            "Connect → CONN(1)",
            "CONN(1) ► Exec(CREATE|people|name=text,age=int)",
            "CONN(1) ► Begin → TX(2)",
            "CONN(1) ► Prepare(INSERT|people|name=?,age=?) → STMT(3)",
            "STMT(3) ► Exec(INSERT|people|name=?,age=?)",
            "STMT(3) ► Close",
            "TX(2) ► Commit",
            "CONN(1) ► Query(SELECT|people|name,age) → ROWS(4)",
            "ROWS(4) ► Close",
            "CONN(1) ► Close",
        ]
    );
}

#[test]
fn test_backend_errors_pass_through_without_notification() {
    let h = Harness::new(Capabilities::full());
    let ctx = Context::background();
    let mut conn = h.connect();
    h.observer.clear();

    let prepare_err = conn.prepare("FAIL|disk on fire").err();
    assert_eq!(prepare_err, Some(DriverError::backend("disk on fire")));

    let exec_err = conn
        .as_execer_context()
        .unwrap()
        .exec_context(&ctx, "INSERT|missing|a=?", &to_named(&[Value::Int(1)]))
        .err();
    assert!(matches!(exec_err, Some(DriverError::Backend(_))));

    assert!(h.observer.events().is_empty());

    // Failed calls do not consume IDs.
    let _stmt = conn.prepare(INSERT_PEOPLE).unwrap();
    assert_eq!(
        h.observer.events(),
        vec![Event::ConnPrepare {
            conn: 1,
            stmt: 2,
            query: INSERT_PEOPLE.to_string(),
        }]
    );
}

#[test]
fn test_proxy_connector_reports_backend_connect_failure() {
    let h = Harness::new(Capabilities::full());
    h.backend.set_faults(sqlscope::memdb::Faults {
        connect: Some("refused".to_string()),
        ..Default::default()
    });

    let err = h.proxy.connect(&Context::background()).err();
    assert_eq!(err, Some(DriverError::backend("refused")));
    assert!(h.observer.events().is_empty());
}
