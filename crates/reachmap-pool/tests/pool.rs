//! Integration tests driving the pool with scripted stand-in workers.
//!
//! Each stub is a small shell script speaking the stdio protocol, so these
//! tests exercise real process spawning, payload delivery, message parsing,
//! exit observation, and the kill-all path.

use geo::{polygon, MultiPolygon};
use reachmap_core::{
    AdminArea, AnalysisTask, MemoryOperationLog, OpCode, PoiSet, RoutingLimits,
};
use reachmap_pool::{PoolError, WorkerCommand, WorkerPool};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn task(id: &str) -> AnalysisTask {
    let boundary = MultiPolygon(vec![polygon![
        (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)
    ]]);
    AnalysisTask::new(
        AdminArea::new(id, format!("Area {id}"), boundary),
        Arc::new(vec![]),
        Arc::new(PoiSet::new()),
        RoutingLimits::default(),
    )
}

fn tasks(ids: &[&str]) -> Vec<AnalysisTask> {
    ids.iter().map(|id| task(id)).collect()
}

fn script(dir: &TempDir, body: &str) -> WorkerCommand {
    let path = dir.path().join("worker.sh");
    std::fs::write(&path, body).expect("write stub script");
    WorkerCommand::new("sh").arg(path.display().to_string())
}

/// Shell fragment that reads the payload line and pulls out the area id
/// (the payload leads with it by design).
const READ_AREA_ID: &str = r#"
read -r line
id=$(printf '%s' "$line" | grep -o '"id":"[^"]*"' | head -n1 | cut -d'"' -f4)
"#;

#[tokio::test]
async fn results_are_correlated_by_area_not_arrival_order() {
    let dir = TempDir::new().unwrap();
    let command = script(
        &dir,
        &format!(
            r#"{READ_AREA_ID}
case "$id" in
  A1) sleep 0.4 ;;
  A2) sleep 0.2 ;;
esac
printf '{{"type":"status","data":"routing %s"}}\n' "$id"
printf '{{"type":"done","data":[{{"id":"%s-o1","name":"origin in %s","lon":0.5,"lat":0.5,"poi":{{"hospital":1812.4}}}}]}}\n' "$id" "$id"
exit 0
"#
        ),
    );

    let pool = WorkerPool::new(command).with_limit(3);
    let results = pool.run(tasks(&["A1", "A2", "A3"])).await.unwrap();

    // Dispatch order preserved even though A3 finished first.
    let names: Vec<&str> = results.iter().map(|r| r.area_name.as_str()).collect();
    assert_eq!(names, vec!["Area A1", "Area A2", "Area A3"]);
    for result in &results {
        assert_eq!(result.records.len(), 1);
        let record = &result.records[0];
        assert!(record.id.as_str().starts_with(result.area_id.as_str()));
        assert_eq!(record.poi["hospital"], Some(1812.0));
    }
}

#[tokio::test]
async fn empty_done_is_a_valid_result_and_progress_is_logged() {
    let dir = TempDir::new().unwrap();
    let command = script(
        &dir,
        r#"read -r line
printf '{"type":"done","data":[]}\n'
exit 0
"#,
    );

    let log = Arc::new(MemoryOperationLog::new());
    let pool = WorkerPool::new(command).with_limit(2).with_log(log.clone());
    let results = pool.run(tasks(&["A1", "A2", "A3"])).await.unwrap();

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.is_empty()));

    let events = log.events();
    assert_eq!(events[0].code, OpCode::Routing);
    assert_eq!(events[0].data["count"], 3);
    let mut remaining: Vec<i64> = events
        .iter()
        .filter(|e| e.code == OpCode::RoutingArea)
        .map(|e| e.data["remaining"].as_i64().unwrap())
        .collect();
    remaining.sort_unstable();
    assert_eq!(remaining, vec![0, 1, 2]);
    assert_eq!(events.last().unwrap().code, OpCode::Routing);
    assert_eq!(events.last().unwrap().data["message"], "Routing complete");
}

fn max_simultaneous(log_path: &Path) -> i64 {
    let contents = std::fs::read_to_string(log_path).expect("read concurrency log");
    let mut marks: Vec<(u128, i64)> = contents
        .lines()
        .filter_map(|line| {
            let (sign, ts) = line.split_once(' ')?;
            Some((ts.trim().parse().ok()?, if sign == "+" { 1 } else { -1 }))
        })
        .collect();
    marks.sort_unstable();
    let mut current = 0;
    let mut max = 0;
    for (_, delta) in marks {
        current += delta;
        max = max.max(current);
    }
    max
}

#[tokio::test]
async fn concurrency_never_exceeds_the_limit() {
    let dir = TempDir::new().unwrap();
    let conc_log = dir.path().join("conc.log");
    let command = script(
        &dir,
        r#"log="$1"
printf '%s\n' "+ $(date +%s%N)" >> "$log"
read -r line
sleep 0.3
printf '%s\n' "- $(date +%s%N)" >> "$log"
printf '{"type":"done","data":[]}\n'
exit 0
"#,
    )
    .arg(conc_log.display().to_string());

    let started = Instant::now();
    let pool = WorkerPool::new(command).with_limit(2);
    let results = pool
        .run(tasks(&["A1", "A2", "A3", "A4", "A5"]))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(results.len(), 5);
    assert!(max_simultaneous(&conc_log) <= 2, "more than 2 workers ran at once");
    // 5 tasks of ~0.3s through 2 slots needs at least 3 rounds.
    assert!(elapsed >= Duration::from_millis(800), "finished too fast: {elapsed:?}");
}

#[tokio::test]
async fn nonzero_exit_fails_the_batch_and_kills_live_workers() {
    let dir = TempDir::new().unwrap();
    let command = script(
        &dir,
        &format!(
            r#"{READ_AREA_ID}
if [ "$id" = "A3" ]; then
  exit 2
fi
sleep 10
printf '{{"type":"done","data":[]}}\n'
exit 0
"#
        ),
    );

    let started = Instant::now();
    let pool = WorkerPool::new(command).with_limit(5);
    let err = pool
        .run(tasks(&["A1", "A2", "A3", "A4", "A5"]))
        .await
        .expect_err("batch should fail");

    match &err {
        PoolError::WorkerFailed {
            area,
            code,
            diagnostic,
        } => {
            assert_eq!(area.as_str(), "A3");
            assert_eq!(*code, 2);
            assert!(diagnostic.is_unknown());
        }
        other => panic!("unexpected error: {other}"),
    }
    // The sleeping workers were killed, not waited out.
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn error_message_then_nonzero_exit_carries_the_diagnostic() {
    let dir = TempDir::new().unwrap();
    let command = script(
        &dir,
        r#"read -r line
printf '{"type":"error","data":"table query failed","stack":"at osrm.table","details":{"grid":4}}\n'
exit 3
"#,
    );

    let err = WorkerPool::new(command)
        .with_limit(1)
        .run(tasks(&["A1"]))
        .await
        .expect_err("batch should fail");

    let diagnostic = err.diagnostic().expect("diagnostic expected");
    assert_eq!(err.exit_code(), Some(3));
    assert_eq!(diagnostic.message, "table query failed");
    assert_eq!(diagnostic.stack.as_deref(), Some("at osrm.table"));
    assert_eq!(diagnostic.details.as_ref().unwrap()["grid"], 4);
}

#[tokio::test]
async fn fatal_event_carries_the_worker_diagnostic() {
    let dir = TempDir::new().unwrap();
    let command = script(
        &dir,
        r#"read -r line
printf '{"type":"error","data":"table query failed","stack":"at osrm.table","details":{"grid":4}}\n'
exit 3
"#,
    );

    let log = Arc::new(MemoryOperationLog::new());
    let err = WorkerPool::new(command)
        .with_limit(1)
        .with_log(log.clone())
        .run(tasks(&["A1"]))
        .await
        .expect_err("batch should fail");
    assert_eq!(err.exit_code(), Some(3));

    let events = log.events();
    let last = events.last().unwrap();
    assert_eq!(last.code, OpCode::Error);
    assert_eq!(last.data["details"]["area"], "A1");
    assert_eq!(last.data["details"]["exitCode"], 3);
    assert_eq!(last.data["details"]["stack"], "at osrm.table");
    assert_eq!(last.data["details"]["details"]["grid"], 4);
}

#[tokio::test]
async fn duplicate_done_does_not_skew_progress_or_results() {
    let dir = TempDir::new().unwrap();
    let command = script(
        &dir,
        &format!(
            r#"{READ_AREA_ID}
printf '{{"type":"done","data":[{{"id":"%s-o1","name":"kept","lon":0.5,"lat":0.5,"poi":{{}}}}]}}\n' "$id"
printf '{{"type":"done","data":[]}}\n'
exit 0
"#
        ),
    );

    let log = Arc::new(MemoryOperationLog::new());
    let pool = WorkerPool::new(command).with_limit(1).with_log(log.clone());
    let results = pool.run(tasks(&["A1", "A2"])).await.unwrap();

    // The first done wins; the duplicate neither replaces the records nor
    // decrements the pending count a second time.
    assert_eq!(results[0].records.len(), 1);
    assert_eq!(results[0].records[0].name, "kept");

    let mut remaining: Vec<i64> = log
        .events()
        .iter()
        .filter(|e| e.code == OpCode::RoutingArea)
        .map(|e| e.data["remaining"].as_i64().unwrap())
        .collect();
    remaining.sort_unstable();
    assert_eq!(remaining, vec![0, 1]);
}

#[tokio::test]
async fn error_message_then_clean_exit_is_still_a_success() {
    let dir = TempDir::new().unwrap();
    let command = script(
        &dir,
        r#"read -r line
printf '{"type":"error","data":"recoverable warning"}\n'
printf '{"type":"done","data":[]}\n'
exit 0
"#,
    );

    let results = WorkerPool::new(command)
        .with_limit(1)
        .run(tasks(&["A1"]))
        .await
        .expect("exit code is authoritative");
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn clean_exit_without_done_is_a_protocol_error() {
    let dir = TempDir::new().unwrap();
    let command = script(
        &dir,
        r#"read -r line
printf '{"type":"status","data":"about to vanish"}\n'
printf '{"type":"squarecount","data":4}\n'
printf '{"type":"square","data":"1/4"}\n'
exit 0
"#,
    );

    let err = WorkerPool::new(command)
        .with_limit(1)
        .run(tasks(&["A1"]))
        .await
        .expect_err("missing done must fail");
    assert!(matches!(err, PoolError::MissingDone { .. }));
}

#[tokio::test]
async fn hung_worker_is_killed_after_the_timeout() {
    let dir = TempDir::new().unwrap();
    let command = script(
        &dir,
        r#"read -r line
sleep 30
"#,
    );

    let started = Instant::now();
    let err = WorkerPool::new(command)
        .with_limit(1)
        .with_timeout(Duration::from_millis(300))
        .run(tasks(&["A1"]))
        .await
        .expect_err("timeout must fail the batch");

    assert!(matches!(err, PoolError::TimedOut { .. }));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn unspawnable_worker_fails_the_batch() {
    let command = WorkerCommand::new("/nonexistent/reachmap-worker");
    let err = WorkerPool::new(command)
        .with_limit(1)
        .run(tasks(&["A1"]))
        .await
        .expect_err("spawn failure must fail the batch");
    assert!(matches!(err, PoolError::Spawn { .. }));
}

#[tokio::test]
async fn empty_batch_completes_with_no_results() {
    let command = WorkerCommand::new("sh").arg("-c").arg("exit 0");
    let results = WorkerPool::new(command).run(vec![]).await.unwrap();
    assert!(results.is_empty());
}
