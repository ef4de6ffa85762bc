//! Lock waits, timeouts and deadlocks between transactions

#[path = "testutils/mod.rs"]
mod testutils;

use rowquery::config::EngineConfig;
use rowquery::data::{Datum, Tuple};
use rowquery::dict::TableDef;
use rowquery::error::DbError;
use rowquery::exec::QueryExecutor;
use rowquery::storage::{LockMode, StorageEngine};
use rowquery::trx::{QueLockState, Transaction};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use testutils::test_fixture::{number_row, tuple, TestFixture};

fn key(table: &TableDef, k: u64, seq: Option<u64>) -> Tuple {
    let mut values = vec![Datum::from(k)];
    values.extend(seq.map(Datum::from));
    tuple(table.clustered_index(), values)
}

fn short_timeout() -> EngineConfig {
    EngineConfig {
        lock_wait_timeout_ms: 200,
        ..EngineConfig::for_testing()
    }
}

/// Takes the X lock on `(k, seq)` for `trx` and releases the latch.
fn lock_row(fixture: &TestFixture, trx: &mut Transaction, table: &TableDef, k: u64, seq: u64) {
    let mut executor = QueryExecutor::new(fixture.storage(), trx);
    executor
        .select_for_update(table, &key(table, k, Some(seq)), None)
        .unwrap();
    executor.commit_mtr();
}

#[test]
#[serial_test::serial]
fn test_blocked_delete_resumes_after_commit() {
    let fixture = TestFixture::new();
    let table = fixture.create_numbers_table();
    fixture.insert_committed(
        &table,
        &[
            number_row(&table, 1, 0, "a"),
            number_row(&table, 1, 1, "b"),
            number_row(&table, 2, 0, "c"),
        ],
    );

    let mut holder_trx = Transaction::new();
    lock_row(&fixture, &mut holder_trx, &table, 1, 0);

    let engine = Arc::clone(fixture.engine());
    let waiter_table = Arc::clone(&table);
    let waiter = thread::spawn(move || {
        let storage: Arc<dyn StorageEngine> = engine;
        let mut trx = Transaction::new();
        let mut executor = QueryExecutor::new(storage, &mut trx);
        let deleted = executor.delete_record(&waiter_table, &key(&waiter_table, 1, None));
        let balanced = executor.mtr_stats().is_balanced();
        drop(executor);
        (deleted, balanced, trx)
    });

    fixture.wait_for_lock_waits(1);
    fixture.commit(&mut holder_trx);

    let (deleted, balanced, mut trx) = waiter.join().unwrap();
    assert_eq!(deleted, Ok(2));
    assert!(balanced);
    fixture.commit(&mut trx);
    assert_eq!(fixture.engine().stats().lock_waits, 1);
    assert_eq!(fixture.engine().n_lock_waits(), 0);
}

#[test]
#[serial_test::serial]
fn test_insert_waits_for_uncommitted_delete() {
    let fixture = TestFixture::new();
    let table = fixture.create_numbers_table();
    fixture.insert_committed(&table, &[number_row(&table, 1, 0, "a")]);

    let mut deleter_trx = Transaction::new();
    {
        let mut deleter = QueryExecutor::new(fixture.storage(), &mut deleter_trx);
        deleter.delete_record(&table, &key(&table, 1, Some(0))).unwrap();
    }

    let engine = Arc::clone(fixture.engine());
    let waiter_table = Arc::clone(&table);
    let waiter = thread::spawn(move || {
        let storage: Arc<dyn StorageEngine> = engine;
        let mut trx = Transaction::new();
        let mut executor = QueryExecutor::new(storage, &mut trx);
        let inserted = executor.insert_record(&waiter_table, &number_row(&waiter_table, 1, 0, "z"));
        drop(executor);
        (inserted, trx)
    });

    fixture.wait_for_lock_waits(1);
    fixture.commit(&mut deleter_trx);

    let (inserted, mut trx) = waiter.join().unwrap();
    assert_eq!(inserted, Ok(()));
    fixture.commit(&mut trx);
}

#[test]
#[serial_test::serial]
fn test_insert_after_rolled_back_delete_is_duplicate() {
    let fixture = TestFixture::new();
    let table = fixture.create_numbers_table();
    fixture.insert_committed(&table, &[number_row(&table, 1, 0, "a")]);

    let mut deleter_trx = Transaction::new();
    {
        let mut deleter = QueryExecutor::new(fixture.storage(), &mut deleter_trx);
        deleter.delete_record(&table, &key(&table, 1, Some(0))).unwrap();
    }

    let engine = Arc::clone(fixture.engine());
    let waiter_table = Arc::clone(&table);
    let waiter = thread::spawn(move || {
        let storage: Arc<dyn StorageEngine> = engine;
        let mut trx = Transaction::new();
        let mut executor = QueryExecutor::new(storage, &mut trx);
        let inserted = executor.insert_record(&waiter_table, &number_row(&waiter_table, 1, 0, "z"));
        drop(executor);
        (inserted, trx)
    });

    fixture.wait_for_lock_waits(1);
    fixture.rollback(&mut deleter_trx);

    let (inserted, mut trx) = waiter.join().unwrap();
    assert!(matches!(inserted, Err(DbError::DuplicateKey(_))));
    fixture.rollback(&mut trx);
}

#[test]
#[serial_test::serial]
fn test_row_lock_wait_times_out() {
    let fixture = TestFixture::with_config(short_timeout());
    let table = fixture.create_numbers_table();
    fixture.insert_committed(&table, &[number_row(&table, 1, 0, "a")]);

    let mut holder_trx = Transaction::new();
    lock_row(&fixture, &mut holder_trx, &table, 1, 0);

    let mut waiter_trx = Transaction::new();
    let mut waiter = QueryExecutor::new(fixture.storage(), &mut waiter_trx);
    let started = Instant::now();
    assert_eq!(
        waiter.delete_record(&table, &key(&table, 1, None)),
        Err(DbError::LockWaitTimeout)
    );
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(waiter.lock_state(), QueLockState::Row);
    assert_eq!(
        waiter.transaction().error_state,
        Some(DbError::LockWaitTimeout)
    );
    assert!(waiter.mtr_stats().is_balanced());
    drop(waiter);

    let stats = fixture.engine().stats();
    assert_eq!(stats.lock_waits, 1);
    assert_eq!(stats.lock_wait_timeouts, 1);
    assert_eq!(fixture.engine().n_lock_waits(), 0);

    fixture.rollback(&mut waiter_trx);
    fixture.commit(&mut holder_trx);
}

#[test]
#[serial_test::serial]
fn test_deadlock_victim_is_the_requester() {
    let fixture = TestFixture::new();
    let table = fixture.create_numbers_table();
    fixture.insert_committed(
        &table,
        &[number_row(&table, 1, 0, "a"), number_row(&table, 2, 0, "b")],
    );

    let mut first_trx = Transaction::new();
    let mut second_trx = Transaction::new();
    lock_row(&fixture, &mut first_trx, &table, 1, 0);
    lock_row(&fixture, &mut second_trx, &table, 2, 0);

    // The first transaction blocks on the second one's row
    let engine = Arc::clone(fixture.engine());
    let first_table = Arc::clone(&table);
    let first = thread::spawn(move || {
        let storage: Arc<dyn StorageEngine> = engine;
        let mut executor = QueryExecutor::new(storage, &mut first_trx);
        let search = key(&first_table, 2, Some(0));
        let result = loop {
            match executor.select_for_update(&first_table, &search, None) {
                Err(DbError::LockWait) => continue,
                other => break other,
            }
        };
        executor.commit_mtr();
        drop(executor);
        (result, first_trx)
    });
    fixture.wait_for_lock_waits(1);

    // Closing the cycle makes the second transaction the victim
    {
        let mut second = QueryExecutor::new(fixture.storage(), &mut second_trx);
        assert_eq!(
            second.select_for_update(&table, &key(&table, 1, Some(0)), None),
            Err(DbError::Deadlock)
        );
        assert_eq!(second.lock_state(), QueLockState::Row);
        assert!(second.mtr_stats().is_balanced());
    }
    assert_eq!(fixture.engine().stats().deadlocks, 1);
    fixture.rollback(&mut second_trx);

    let (result, mut first_trx) = first.join().unwrap();
    assert_eq!(result, Ok(()));
    fixture.commit(&mut first_trx);
}

#[test]
#[serial_test::serial]
fn test_table_lock_wait_reports_table_state() {
    let fixture = TestFixture::with_config(short_timeout());
    let table = fixture.create_numbers_table();

    let mut holder_trx = Transaction::new();
    let mut holder = QueryExecutor::new(fixture.storage(), &mut holder_trx);
    holder.lock_table(&table, LockMode::IX).unwrap();

    let mut waiter_trx = Transaction::new();
    let mut waiter = QueryExecutor::new(fixture.storage(), &mut waiter_trx);
    // Intention locks are compatible with each other
    waiter.lock_table(&table, LockMode::IS).unwrap();
    assert_eq!(
        waiter.lock_table(&table, LockMode::X),
        Err(DbError::LockWait)
    );
    assert_eq!(
        waiter.handle_wait(DbError::LockWait, true),
        Err(DbError::LockWaitTimeout)
    );
    assert_eq!(waiter.lock_state(), QueLockState::Table);
    drop(waiter);
    drop(holder);
    fixture.rollback(&mut waiter_trx);
    fixture.commit(&mut holder_trx);
}

#[test]
fn test_handle_wait_without_pending_request() {
    let fixture = TestFixture::new();
    let mut trx = Transaction::new();
    let mut executor = QueryExecutor::new(fixture.storage(), &mut trx);
    assert_eq!(
        executor.handle_wait(DbError::LockWait, false),
        Err(DbError::LockWait)
    );
    assert_eq!(executor.lock_state(), QueLockState::Row);
    assert_eq!(executor.transaction().error_state, Some(DbError::LockWait));
}
