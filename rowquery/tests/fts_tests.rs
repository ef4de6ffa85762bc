//! Full-text auxiliary, common and config table access

#[path = "testutils/mod.rs"]
mod testutils;

use rowquery::config::EngineConfig;
use rowquery::dict::{IndexDef, TableDef};
use rowquery::error::DbError;
use rowquery::fts::{
    config_get_index_ulint, config_get_index_value, config_get_ulint, config_get_value,
    config_set_index_ulint, config_set_index_value, config_set_ulint, config_set_value,
    create_fts_tables, AuxRecordReader, CommonTableReader, ConfigReader, FtsAuxData,
    FtsQueryExecutor,
};
use rowquery::storage::SearchMode;
use rowquery::trx::{QueLockState, Transaction};
use std::sync::Arc;
use testutils::test_fixture::TestFixture;

/// A user table with its full-text tables, indexed through `title_idx`
fn setup(fixture: &TestFixture) -> (Arc<TableDef>, Arc<IndexDef>) {
    let docs = fixture.create_docs_table();
    let index = docs.index("title_idx").unwrap().clone();
    create_fts_tables(fixture.engine(), docs.id, Some(index.id)).unwrap();
    (docs, index)
}

fn postings(word: &str, first: u64, last: u64) -> FtsAuxData {
    FtsAuxData::with_postings(word, first, last, (last - first + 1) as u32, vec![first as u8; 4])
}

#[test]
fn test_aux_records() {
    let fixture = TestFixture::new();
    let (docs, index) = setup(&fixture);
    let mut trx = Transaction::new();
    let mut fts = FtsQueryExecutor::new(fixture.storage(), &mut trx, docs.id, Some(index.id));

    fts.insert_aux_record(0, &postings("rust", 6, 9)).unwrap();
    fts.insert_aux_record(0, &postings("rust", 1, 5)).unwrap();
    fts.insert_aux_record(0, &postings("sql", 2, 2)).unwrap();
    fts.insert_aux_record(1, &postings("zig", 4, 4)).unwrap();
    assert!(matches!(
        fts.insert_aux_record(0, &postings("rust", 1, 3)),
        Err(DbError::DuplicateKey(_))
    ));

    let mut reader = AuxRecordReader::new();
    fts.read_aux(0, "rust", SearchMode::Ge, &mut reader).unwrap();
    assert_eq!(reader.rows(), &[postings("rust", 1, 5), postings("rust", 6, 9)]);

    let mut first_only = AuxRecordReader::with_limit(1);
    fts.read_aux(0, "rust", SearchMode::Ge, &mut first_only).unwrap();
    assert_eq!(first_only.into_rows(), vec![postings("rust", 1, 5)]);

    let mut everything = AuxRecordReader::new();
    fts.read_aux_all(0, &mut everything).unwrap();
    let words: Vec<&str> = everything.rows().iter().map(|row| row.word.as_str()).collect();
    assert_eq!(words, vec!["rust", "rust", "sql"]);

    assert_eq!(
        fts.read_aux(0, "go", SearchMode::Ge, &mut AuxRecordReader::new()),
        Err(DbError::RecordNotFound)
    );

    assert_eq!(fts.delete_aux_record(0, &FtsAuxData::new("rust")), Ok(2));
    let mut after_delete = AuxRecordReader::new();
    fts.read_aux(0, "rust", SearchMode::Ge, &mut after_delete).unwrap();
    assert!(after_delete.rows().is_empty());
    assert!(matches!(
        fts.insert_aux_record(6, &postings("out", 1, 1)),
        Err(DbError::Generic(_))
    ));
    assert!(fts.executor().mtr_stats().is_balanced());
}

#[test]
fn test_aux_tables_need_an_index() {
    let fixture = TestFixture::new();
    let (docs, _) = setup(&fixture);
    let mut trx = Transaction::new();
    let mut fts = FtsQueryExecutor::new(fixture.storage(), &mut trx, docs.id, None);
    assert!(matches!(
        fts.read_aux_all(0, &mut AuxRecordReader::new()),
        Err(DbError::Generic(_))
    ));
}

#[test]
fn test_common_tables() {
    let fixture = TestFixture::new();
    let (docs, _) = setup(&fixture);
    let mut trx = Transaction::new();
    let mut fts = FtsQueryExecutor::new(fixture.storage(), &mut trx, docs.id, None);

    for doc_id in [7, 3, 11] {
        fts.insert_common_record("DELETED", doc_id).unwrap();
    }
    fts.insert_common_record("BEING_DELETED", 9).unwrap();

    let mut reader = CommonTableReader::new();
    fts.read_all_common("DELETED", &mut reader).unwrap();
    assert_eq!(reader.doc_ids(), &[3, 7, 11]);

    assert_eq!(fts.delete_common_record("DELETED", 7), Ok(1));
    assert_eq!(
        fts.delete_common_record("DELETED", 7),
        Err(DbError::RecordNotFound)
    );
    assert_eq!(fts.delete_all_common_records("DELETED"), Ok(2));

    reader.clear();
    fts.read_all_common("DELETED", &mut reader).unwrap();
    assert!(reader.doc_ids().is_empty());

    reader.clear();
    fts.read_all_common("BEING_DELETED", &mut reader).unwrap();
    assert_eq!(reader.doc_ids(), &[9]);

    assert!(matches!(
        fts.insert_common_record("INDEX_1", 1),
        Err(DbError::Generic(_))
    ));
}

#[test]
fn test_missing_fts_tables() {
    let fixture = TestFixture::new();
    let docs = fixture.create_docs_table();
    let mut trx = Transaction::new();
    let mut fts = FtsQueryExecutor::new(fixture.storage(), &mut trx, docs.id, None);
    assert!(matches!(
        fts.insert_common_record("DELETED", 1),
        Err(DbError::TableNotFound(_))
    ));
}

#[test]
fn test_config_records() {
    let fixture = TestFixture::new();
    let (docs, _) = setup(&fixture);

    let mut trx = Transaction::new();
    {
        let mut fts = FtsQueryExecutor::new(fixture.storage(), &mut trx, docs.id, None);
        fts.insert_config_record("optimize_limit", "180").unwrap();
        // Missing keys are inserted, present ones updated
        fts.update_config_record("synced_doc_id", "42").unwrap();
        fts.update_config_record("optimize_limit", "200").unwrap();

        let mut reader = ConfigReader::new();
        fts.read_config_with_lock("optimize_limit", &mut reader)
            .unwrap();
        fts.release_lock();
        assert_eq!(reader.value(), "200");
        assert!(fts.executor().mtr_stats().is_balanced());

        assert_eq!(
            fts.read_config_with_lock("stopword_table", &mut ConfigReader::new()),
            Err(DbError::RecordNotFound)
        );
        assert_eq!(fts.delete_config_record("synced_doc_id"), Ok(1));
    }
    fixture.commit(&mut trx);

    let mut trx = Transaction::new();
    assert_eq!(
        config_get_value(fixture.storage(), &mut trx, docs.id, "optimize_limit").unwrap(),
        "200"
    );
    assert_eq!(
        config_get_value(fixture.storage(), &mut trx, docs.id, "synced_doc_id"),
        Err(DbError::RecordNotFound)
    );
    fixture.commit(&mut trx);
}

#[test]
fn test_config_values() {
    let fixture = TestFixture::new();
    let (docs, index) = setup(&fixture);
    let mut trx = Transaction::new();

    config_set_ulint(fixture.storage(), &mut trx, docs.id, "synced_doc_id", 42).unwrap();
    assert_eq!(
        config_get_ulint(fixture.storage(), &mut trx, docs.id, "synced_doc_id").unwrap(),
        42
    );
    config_set_ulint(fixture.storage(), &mut trx, docs.id, "synced_doc_id", 1_000_000).unwrap();
    assert_eq!(
        config_get_ulint(fixture.storage(), &mut trx, docs.id, "synced_doc_id").unwrap(),
        1_000_000
    );

    config_set_value(fixture.storage(), &mut trx, docs.id, "use_stopword", "yes").unwrap();
    assert!(matches!(
        config_get_ulint(fixture.storage(), &mut trx, docs.id, "use_stopword"),
        Err(DbError::Corruption(_))
    ));

    config_set_index_value(fixture.storage(), &mut trx, &index, "last_optimized_word", "rust")
        .unwrap();
    assert_eq!(
        config_get_index_value(fixture.storage(), &mut trx, &index, "last_optimized_word")
            .unwrap(),
        "rust"
    );
    config_set_index_ulint(fixture.storage(), &mut trx, &index, "total_word_count", 17).unwrap();
    assert_eq!(
        config_get_index_ulint(fixture.storage(), &mut trx, &index, "total_word_count").unwrap(),
        17
    );
    // Index parameters do not shadow table-wide ones
    assert!(matches!(
        config_get_value(fixture.storage(), &mut trx, docs.id, "total_word_count"),
        Err(DbError::RecordNotFound)
    ));
    fixture.commit(&mut trx);
}

#[test]
#[serial_test::serial]
fn test_delete_all_waits_for_the_table_lock() {
    let fixture = TestFixture::with_config(EngineConfig {
        lock_wait_timeout_ms: 200,
        ..EngineConfig::for_testing()
    });
    let (docs, _) = setup(&fixture);

    let mut writer_trx = Transaction::new();
    let mut writer = FtsQueryExecutor::new(fixture.storage(), &mut writer_trx, docs.id, None);
    writer.insert_common_record("DELETED", 5).unwrap();

    let mut cleaner_trx = Transaction::new();
    let mut cleaner = FtsQueryExecutor::new(fixture.storage(), &mut cleaner_trx, docs.id, None);
    assert_eq!(
        cleaner.delete_all_common_records("DELETED"),
        Err(DbError::LockWaitTimeout)
    );
    assert_eq!(cleaner.executor().lock_state(), QueLockState::Table);
    assert_eq!(fixture.engine().stats().lock_wait_timeouts, 1);

    drop(cleaner);
    drop(writer);
    fixture.rollback(&mut cleaner_trx);
    fixture.commit(&mut writer_trx);
}
