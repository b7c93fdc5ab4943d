//! Pipeline tests: conservation, batching, failure handling, and end-to-end loads into SQLite.

use batchload::engine::{BatchCommitter, CommitError, open_db, row_count};
use batchload::pipeline::{ShutdownSignal, run_pipeline};
use batchload::source::RowError;
use batchload::utils::ConnectParams;
use batchload::{
    CommitOutcome, FailurePolicy, Header, ImportReport, LoadConfig, Row, SealedBatch, load_file,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// --- in-process committer ---

/// One committed or attempted batch as seen by a worker's committer.
#[derive(Clone, Debug)]
struct SeenBatch {
    worker: usize,
    seq: u64,
    ids: Vec<String>,
    ok: bool,
}

/// Records every batch it is given; fails any batch containing a row named "bad".
struct RecordingCommitter {
    worker: usize,
    seen: Arc<Mutex<Vec<SeenBatch>>>,
}

impl BatchCommitter for RecordingCommitter {
    fn commit(&mut self, batch: &SealedBatch, header: &Header, _table: &str) -> CommitOutcome {
        assert!(batch.rows.iter().all(|r| r.len() == header.len()));
        let ok = !batch.rows.iter().any(|r| r[1] == "bad");
        self.seen.lock().unwrap().push(SeenBatch {
            worker: self.worker,
            seq: batch.seq,
            ids: batch.rows.iter().map(|r| r[0].clone()).collect(),
            ok,
        });
        if ok {
            Ok(batch.len())
        } else {
            Err(CommitError::Commit(rusqlite::Error::QueryReturnedNoRows))
        }
    }
}

fn recorders(n: usize) -> (Vec<RecordingCommitter>, Arc<Mutex<Vec<SeenBatch>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let committers = (0..n)
        .map(|worker| RecordingCommitter {
            worker,
            seen: Arc::clone(&seen),
        })
        .collect();
    (committers, seen)
}

fn header() -> Header {
    Header::new(vec!["id".into(), "name".into()])
}

fn rows(n: usize) -> Vec<Result<Row, RowError>> {
    (1..=n)
        .map(|i| Ok(vec![i.to_string(), format!("name{i}")]))
        .collect()
}

fn config(workers: usize, batch_size: usize) -> LoadConfig {
    LoadConfig {
        workers,
        batch_size,
        ..LoadConfig::new("unused.csv", "people")
    }
}

fn run(
    input: Vec<Result<Row, RowError>>,
    cfg: &LoadConfig,
) -> (ImportReport, Vec<SeenBatch>) {
    let (committers, seen) = recorders(cfg.workers);
    let report = run_pipeline(
        input.into_iter(),
        header(),
        committers,
        cfg,
        Arc::new(ShutdownSignal::new()),
    )
    .unwrap();
    let seen = seen.lock().unwrap().clone();
    (report, seen)
}

/// `input` as an iterator that counts how many records the dispatcher actually pulled.
fn counted(
    input: Vec<Result<Row, RowError>>,
) -> (impl Iterator<Item = Result<Row, RowError>> + Send + 'static, Arc<AtomicUsize>) {
    let pulled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&pulled);
    let iter = input.into_iter().inspect(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (iter, pulled)
}

fn batch_sizes_by_worker(seen: &[SeenBatch]) -> HashMap<usize, Vec<usize>> {
    let mut by_worker: HashMap<usize, Vec<(u64, usize)>> = HashMap::new();
    for b in seen {
        by_worker.entry(b.worker).or_default().push((b.seq, b.ids.len()));
    }
    by_worker
        .into_iter()
        .map(|(w, mut v)| {
            v.sort();
            (w, v.into_iter().map(|(_, n)| n).collect())
        })
        .collect()
}

// --- invariants (in-process committer) ---

#[test]
fn test_conservation_and_at_most_once() {
    let (report, seen) = run(rows(1000), &config(4, 7));

    assert_eq!(report.rows_dispatched, 1000);
    assert_eq!(report.rows_committed, 1000);
    assert_eq!(report.batches_failed, 0);
    assert!(!report.has_errors());

    let mut ids: Vec<usize> = seen
        .iter()
        .flat_map(|b| b.ids.iter().map(|s| s.parse::<usize>().unwrap()))
        .collect();
    ids.sort_unstable();
    let expected: Vec<usize> = (1..=1000).collect();
    assert_eq!(ids, expected, "every row seen exactly once");
}

#[test]
fn test_batch_size_invariant_per_worker() {
    let batch_size = 9;
    let (report, seen) = run(rows(500), &config(3, batch_size));
    assert_eq!(report.rows_committed, 500);

    for (worker, sizes) in batch_sizes_by_worker(&seen) {
        let (last, full) = sizes.split_last().unwrap();
        assert!(
            full.iter().all(|&n| n == batch_size),
            "worker {worker}: {sizes:?}"
        );
        assert!(*last >= 1 && *last <= batch_size, "worker {worker}: {sizes:?}");
    }
}

#[test]
fn test_dispatch_count_matches_pulled() {
    let (report, _) = run(rows(333), &config(5, 10));
    assert_eq!(report.rows_dispatched, 333);
    assert_eq!(report.rows_remaining, 0);
    assert_eq!(
        report.rows_dispatched,
        report.rows_pulled + report.rows_remaining
    );
}

#[test]
fn test_scenario_a_single_worker_batches() {
    let (report, seen) = run(rows(250), &config(1, 100));
    assert_eq!(report.rows_committed, 250);
    assert_eq!(report.batches_committed, 3);
    assert_eq!(report.batches_failed, 0);
    assert_eq!(batch_sizes_by_worker(&seen)[&0], vec![100, 100, 50]);
}

#[test]
fn test_scenario_b_fewer_rows_than_batch() {
    let (report, seen) = run(rows(10), &config(5, 100));
    assert_eq!(report.rows_committed, 10);
    assert_eq!(report.batches_failed, 0);
    // Workers pull concurrently, so the ten rows may be split, but only as partial batches.
    assert!((1..=5).contains(&report.batches_committed));
    assert!(seen.iter().all(|b| b.ids.len() < 100));
}

#[test]
fn test_scenario_d_short_row_is_skipped() {
    let mut input = rows(10);
    input[3] = Err(RowError::FieldCount {
        line: 5,
        expected: 2,
        found: 1,
    });
    let (report, seen) = run(input, &config(2, 4));

    assert_eq!(report.rows_skipped, 1);
    assert_eq!(report.rows_dispatched, 9);
    assert_eq!(report.rows_committed, 9);
    assert!(seen.iter().all(|b| !b.ids.contains(&"4".to_string())));
}

#[test]
fn test_continue_policy_counts_each_failed_batch_once() {
    let mut input = rows(30);
    input[14] = Ok(vec!["15".into(), "bad".into()]);
    let (report, _) = run(input, &config(1, 10));

    assert_eq!(report.batches_failed, 1);
    assert_eq!(report.rows_failed, 10);
    assert_eq!(report.rows_committed, 20);
    assert_eq!(report.batches_committed, 2);
    assert_eq!(report.failures.len(), 1);
    assert!(report.has_errors());
    assert!(!report.aborted);
}

#[test]
fn test_abort_policy_stops_committing_after_first_failure() {
    let mut input = rows(100);
    input[14] = Ok(vec!["15".into(), "bad".into()]);
    let cfg = LoadConfig {
        failure_policy: FailurePolicy::Abort,
        ..config(1, 10)
    };
    let (report, seen) = run(input, &cfg);

    assert!(report.aborted);
    assert_eq!(report.batches_failed, 1);
    assert_eq!(report.rows_committed, 10);
    assert_eq!(seen.len(), 2, "no commit attempted after the failure");
    assert_eq!(
        report.rows_pulled,
        report.rows_committed + report.rows_failed + report.rows_discarded
    );
    assert_eq!(report.rows_remaining, 0);
}

#[test]
fn test_cancel_before_start_dispatches_nothing() {
    let (committers, seen) = recorders(2);
    let (input, read) = counted(rows(50));
    let shutdown = Arc::new(ShutdownSignal::new());
    shutdown.request_cancel();
    let report = run_pipeline(input, header(), committers, &config(2, 10), shutdown).unwrap();

    assert!(report.cancelled);
    assert!(report.stopped_early);
    assert_eq!(report.rows_dispatched, 0);
    assert_eq!(report.rows_committed, 0);
    assert_eq!(read.load(Ordering::SeqCst), 0, "no record read after the stop");
    assert!(seen.lock().unwrap().is_empty());
}

/// Raises cancel from inside the first commit, i.e. while the dispatcher is mid-source.
struct CancellingCommitter {
    inner: RecordingCommitter,
    shutdown: Arc<ShutdownSignal>,
}

impl BatchCommitter for CancellingCommitter {
    fn commit(&mut self, batch: &SealedBatch, header: &Header, table: &str) -> CommitOutcome {
        self.shutdown.request_cancel();
        self.inner.commit(batch, header, table)
    }
}

#[test]
fn test_cancel_mid_run_commits_everything_queued() {
    let (inner, seen) = recorders(3);
    let shutdown = Arc::new(ShutdownSignal::new());
    let committers: Vec<CancellingCommitter> = inner
        .into_iter()
        .map(|inner| CancellingCommitter {
            inner,
            shutdown: Arc::clone(&shutdown),
        })
        .collect();
    let (input, read) = counted(rows(1000));
    let report = run_pipeline(input, header(), committers, &config(3, 5), shutdown).unwrap();

    assert!(report.cancelled);
    assert!(!report.aborted);
    assert!(report.stopped_early);
    assert!(report.rows_dispatched < 1000);
    // Every record read was either queued or skipped, and everything queued was committed.
    assert_eq!(
        read.load(Ordering::SeqCst),
        report.rows_dispatched + report.rows_skipped
    );
    assert_eq!(report.rows_committed, report.rows_dispatched);
    assert_eq!(report.rows_pulled, report.rows_dispatched);
    assert_eq!(report.rows_remaining, 0);
    assert_eq!(report.rows_discarded, 0);

    let committed: usize = seen.lock().unwrap().iter().map(|b| b.ids.len()).sum();
    assert_eq!(committed, report.rows_committed);
}

#[test]
fn test_abort_policy_with_many_workers_drains_cleanly() {
    let mut input = rows(200);
    input[6] = Ok(vec!["7".into(), "bad".into()]);
    let cfg = LoadConfig {
        failure_policy: FailurePolicy::Abort,
        ..config(4, 5)
    };
    let (input, read) = counted(input);
    let (committers, seen) = recorders(cfg.workers);
    let report = run_pipeline(
        input,
        header(),
        committers,
        &cfg,
        Arc::new(ShutdownSignal::new()),
    )
    .unwrap();

    assert!(report.aborted);
    assert!(report.has_errors());
    assert_eq!(report.batches_failed, 1);
    assert!((1..=5).contains(&report.rows_failed));
    assert_eq!(report.rows_remaining, 0);
    assert_eq!(report.rows_pulled, report.rows_dispatched);
    assert_eq!(
        report.rows_pulled,
        report.rows_committed + report.rows_failed + report.rows_discarded
    );
    assert_eq!(read.load(Ordering::SeqCst), report.rows_dispatched);

    let seen = seen.lock().unwrap();
    let committed: usize = seen.iter().filter(|b| b.ok).map(|b| b.ids.len()).sum();
    assert_eq!(committed, report.rows_committed);
    assert!(
        seen.iter()
            .filter(|b| b.ok)
            .all(|b| !b.ids.contains(&"7".to_string()))
    );
}

#[test]
fn test_committer_count_must_match_workers() {
    let (committers, _) = recorders(2);
    let result = run_pipeline(
        rows(5).into_iter(),
        header(),
        committers,
        &config(3, 10),
        Arc::new(ShutdownSignal::new()),
    );
    assert!(result.is_err());
}

struct PanickingCommitter;

impl BatchCommitter for PanickingCommitter {
    fn commit(&mut self, _batch: &SealedBatch, _header: &Header, _table: &str) -> CommitOutcome {
        panic!("committer blew up");
    }
}

#[test]
fn test_worker_panic_is_reported_and_run_terminates() {
    let report = run_pipeline(
        rows(500).into_iter(),
        header(),
        vec![PanickingCommitter],
        &config(1, 10),
        Arc::new(ShutdownSignal::new()),
    )
    .unwrap();

    assert_eq!(report.worker_panics, 1);
    assert!(report.has_errors());
    assert!(report.aborted);
    assert_eq!(report.rows_committed, 0);
}

// --- end to end (CSV file → SQLite) ---

const CREATE_BEBELINO_SQL: &str = r#"
CREATE TABLE bebelino (
    id INTEGER NOT NULL,
    name TEXT NOT NULL CHECK (name <> 'bad'),
    score INTEGER
);
"#;

fn setup_load(dir: &Path, body: &str) -> (PathBuf, ConnectParams) {
    let csv_path = dir.join("data.csv");
    std::fs::write(&csv_path, body).unwrap();
    let params = ConnectParams {
        db_path: dir.join("load.db"),
        passphrase: None,
    };
    let conn = open_db(&params, Duration::from_secs(5)).unwrap();
    conn.execute_batch(CREATE_BEBELINO_SQL).unwrap();
    (csv_path, params)
}

fn csv_body(n: usize, bad_id: Option<usize>) -> String {
    let mut s = String::from("id,name,score\n");
    for i in 1..=n {
        let name = if Some(i) == bad_id {
            "bad".to_string()
        } else {
            format!("row {i}")
        };
        s.push_str(&format!("{i},{name},{}\n", i * 10));
    }
    s
}

fn count_where(params: &ConnectParams, sql: &str) -> i64 {
    let conn = open_db(params, Duration::from_secs(5)).unwrap();
    conn.query_row(sql, [], |r| r.get(0)).unwrap()
}

#[test]
fn test_load_file_scenario_a() {
    let dir = tempfile::tempdir().unwrap();
    let (csv_path, params) = setup_load(dir.path(), &csv_body(250, None));
    let cfg = LoadConfig {
        workers: 1,
        batch_size: 100,
        ..LoadConfig::new(&csv_path, "bebelino")
    };

    let report = load_file(&cfg, &params).unwrap();
    assert_eq!(report.rows_committed, 250);
    assert_eq!(report.batches_committed, 3);
    assert_eq!(report.batches_failed, 0);

    let conn = open_db(&params, Duration::from_secs(5)).unwrap();
    assert_eq!(row_count(&conn, "bebelino").unwrap(), 250);
}

#[test]
fn test_load_file_scenario_b_many_workers() {
    let dir = tempfile::tempdir().unwrap();
    let (csv_path, params) = setup_load(dir.path(), &csv_body(10, None));
    let cfg = LoadConfig {
        workers: 5,
        batch_size: 100,
        ..LoadConfig::new(&csv_path, "bebelino")
    };

    let report = load_file(&cfg, &params).unwrap();
    assert_eq!(report.rows_committed, 10);
    assert_eq!(report.batches_failed, 0);
    assert_eq!(count_where(&params, "SELECT COUNT(*) FROM bebelino"), 10);
}

#[test]
fn test_load_file_scenario_c_middle_batch_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (csv_path, params) = setup_load(dir.path(), &csv_body(250, Some(150)));
    let cfg = LoadConfig {
        workers: 1,
        batch_size: 100,
        ..LoadConfig::new(&csv_path, "bebelino")
    };

    let report = load_file(&cfg, &params).unwrap();
    assert_eq!(report.rows_committed, 150);
    assert_eq!(report.batches_failed, 1);
    assert_eq!(report.rows_failed, 100);
    assert!(report.has_errors());
    assert!(!report.aborted);

    assert_eq!(count_where(&params, "SELECT COUNT(*) FROM bebelino"), 150);
    assert_eq!(
        count_where(
            &params,
            "SELECT COUNT(*) FROM bebelino WHERE id BETWEEN 101 AND 200"
        ),
        0
    );
}

#[test]
fn test_load_file_scenario_d_short_row() {
    let dir = tempfile::tempdir().unwrap();
    let body = "id,name,score\n1,a,10\n2,b\n3,c,30\n";
    let (csv_path, params) = setup_load(dir.path(), body);
    let cfg = LoadConfig {
        workers: 2,
        batch_size: 10,
        ..LoadConfig::new(&csv_path, "bebelino")
    };

    let report = load_file(&cfg, &params).unwrap();
    assert_eq!(report.rows_skipped, 1);
    assert_eq!(report.rows_dispatched, 2);
    assert_eq!(report.rows_committed, 2);
    assert_eq!(count_where(&params, "SELECT COUNT(*) FROM bebelino WHERE id = 2"), 0);
}

#[test]
fn test_load_file_many_workers_conserves_rows() {
    let dir = tempfile::tempdir().unwrap();
    let (csv_path, params) = setup_load(dir.path(), &csv_body(5_000, None));
    let cfg = LoadConfig {
        workers: 4,
        batch_size: 128,
        ..LoadConfig::new(&csv_path, "bebelino")
    };

    let report = load_file(&cfg, &params).unwrap();
    assert_eq!(report.rows_committed, 5_000);
    assert_eq!(
        count_where(&params, "SELECT COUNT(DISTINCT id) FROM bebelino"),
        5_000
    );
}

#[test]
fn test_load_file_setup_errors_are_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let (csv_path, params) = setup_load(dir.path(), &csv_body(3, None));

    let missing_source = LoadConfig::new(dir.path().join("nope.csv"), "bebelino");
    assert!(load_file(&missing_source, &params).is_err());

    let missing_table = LoadConfig::new(&csv_path, "nope");
    assert!(load_file(&missing_table, &params).is_err());

    let zero_workers = LoadConfig {
        workers: 0,
        ..LoadConfig::new(&csv_path, "bebelino")
    };
    assert!(load_file(&zero_workers, &params).is_err());

    assert_eq!(count_where(&params, "SELECT COUNT(*) FROM bebelino"), 0);
}
