//! IDs stay unique when many threads share one proxy tree.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use common::{person, Event, Harness, CREATE_PEOPLE, INSERT_PEOPLE};
use sqlscope::context::Context;
use sqlscope::driver::Connector;
use sqlscope::memdb::Capabilities;

const THREADS: usize = 8;
const ROUNDS: usize = 50;

fn entity_id(event: &Event) -> Option<u64> {
    match event {
        Event::Connect { conn } => Some(*conn),
        Event::ConnPrepare { stmt, .. } | Event::ConnPrepareContext { stmt, .. } => Some(*stmt),
        Event::ConnBegin { tx, .. } => Some(*tx),
        _ => None,
    }
}

#[test]
fn test_concurrent_connections_get_distinct_ids() {
    let h = Arc::new(Harness::new(Capabilities::full()));
    h.seed(&[CREATE_PEOPLE]);

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let h = h.clone();
            thread::spawn(move || {
                let ctx = Context::background();
                for round in 0..ROUNDS {
                    let mut conn = h.proxy.connect(&ctx).unwrap();
                    let tx = conn.begin().unwrap();
                    let mut stmt = conn.prepare(INSERT_PEOPLE).unwrap();
                    stmt.exec(&person(&format!("t{t}-r{round}"), round as i64)).unwrap();
                    stmt.close().unwrap();
                    tx.commit().unwrap();
                    conn.close().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let ids: Vec<u64> = h.observer.events().iter().filter_map(entity_id).collect();
    let expected = THREADS * ROUNDS * 3;
    assert_eq!(ids.len(), expected);

    let unique: HashSet<u64> = ids.iter().copied().collect();
    assert_eq!(unique.len(), expected, "an ID was issued twice");
    // Nothing failed, so the IDs are exactly 1..=expected.
    assert_eq!(unique.iter().max().copied(), Some(expected as u64));
    assert_eq!(unique.iter().min().copied(), Some(1));

    let stats = h.backend.stats();
    assert_eq!(stats.open_conns(), 0);
    assert_eq!(stats.commits, (THREADS * ROUNDS) as u64);
}
