//! Test fixture for RowQuery integration tests

use rowquery::config::EngineConfig;
use rowquery::data::{Datum, Tuple};
use rowquery::dict::{IndexDef, TableBuilder, TableDef};
use rowquery::error::DbResult;
use rowquery::exec::{process_matching, QueryExecutor};
use rowquery::storage::{MemoryEngine, SearchMode, StorageEngine, TrxOps};
use rowquery::trx::Transaction;
use rowquery::ColumnType;
use std::borrow::Cow;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// A row as raw field bytes, `None` for NULL
pub type RawRow = Vec<Option<Vec<u8>>>;

/// Isolated engine instance for one test
pub struct TestFixture {
    engine: Arc<MemoryEngine>,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::for_testing())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        init_logging();
        let engine = MemoryEngine::with_config(config).expect("invalid test configuration");
        Self {
            engine: Arc::new(engine),
        }
    }

    pub fn engine(&self) -> &Arc<MemoryEngine> {
        &self.engine
    }

    /// The engine behind the trait object the executor takes
    pub fn storage(&self) -> Arc<dyn StorageEngine> {
        self.engine.clone()
    }

    /// `words(word, first_doc_id, doc_count, ilist)` keyed on
    /// `(word, first_doc_id)`
    pub fn create_words_table(&self) -> Arc<TableDef> {
        self.engine
            .create_table(
                TableBuilder::new("words")
                    .column("word", ColumnType::varchar(64))
                    .column("first_doc_id", ColumnType::int())
                    .column("doc_count", ColumnType::uint32())
                    .column("ilist", ColumnType::varbinary(8192))
                    .primary_key(&["word", "first_doc_id"]),
            )
            .expect("Failed to create words table")
    }

    /// `numbers(k, seq, note)` keyed on `(k, seq)`, so one `k` may repeat
    pub fn create_numbers_table(&self) -> Arc<TableDef> {
        self.engine
            .create_table(
                TableBuilder::new("numbers")
                    .column("k", ColumnType::int())
                    .column("seq", ColumnType::int())
                    .column("note", ColumnType::varchar(32).nullable())
                    .primary_key(&["k", "seq"]),
            )
            .expect("Failed to create numbers table")
    }

    /// `docs(id, title, body)` keyed on `id` with a secondary index on
    /// `title`
    pub fn create_docs_table(&self) -> Arc<TableDef> {
        self.engine
            .create_table(
                TableBuilder::new("docs")
                    .column("id", ColumnType::int())
                    .column("title", ColumnType::varchar_ci(64))
                    .column("body", ColumnType::varchar(200))
                    .primary_key(&["id"])
                    .secondary_index("title_idx", &["title"]),
            )
            .expect("Failed to create docs table")
    }

    pub fn commit(&self, trx: &mut Transaction) {
        self.engine.commit(trx).expect("commit failed");
    }

    pub fn rollback(&self, trx: &mut Transaction) {
        self.engine.rollback(trx).expect("rollback failed");
    }

    /// Blocks until `n` transactions wait in lock queues.
    pub fn wait_for_lock_waits(&self, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.engine.n_lock_waits() != n {
            assert!(
                Instant::now() < deadline,
                "expected {} lock waits, have {}",
                n,
                self.engine.n_lock_waits()
            );
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Inserts `rows` in one committed transaction.
    pub fn insert_committed(&self, table: &TableDef, rows: &[Tuple]) {
        let mut trx = Transaction::new();
        {
            let mut executor = QueryExecutor::new(self.storage(), &mut trx);
            for row in rows {
                executor.insert_record(table, row).expect("insert failed");
            }
        }
        self.commit(&mut trx);
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn tuple(index: &IndexDef, values: Vec<Datum>) -> Tuple {
    Tuple::build(index, values).expect("tuple does not fit the index")
}

pub fn word_row(table: &TableDef, word: &str, first_doc_id: u64, ilist: &[u8]) -> Tuple {
    tuple(
        table.clustered_index(),
        vec![
            Datum::from(word),
            Datum::from(first_doc_id),
            Datum::from(1u32),
            Datum::from(ilist),
        ],
    )
}

pub fn number_row(table: &TableDef, k: u64, seq: u64, note: &str) -> Tuple {
    tuple(
        table.clustered_index(),
        vec![Datum::from(k), Datum::from(seq), Datum::from(note)],
    )
}

/// Collects every row the default comparison accepts, as raw bytes.
pub fn collect_rows(
    executor: &mut QueryExecutor<'_>,
    table: &TableDef,
    search: Option<&Tuple>,
) -> DbResult<Vec<RawRow>> {
    let mut rows = Vec::new();
    let mut callback = process_matching(|rec| {
        let row = (0..rec.n_fields())
            .map(|n| rec.field(n).map(|field| field.map(Cow::into_owned)))
            .collect::<DbResult<RawRow>>()?;
        rows.push(row);
        Ok(true)
    });
    executor.read(table, search, SearchMode::Ge, &mut callback)?;
    drop(callback);
    Ok(rows)
}
