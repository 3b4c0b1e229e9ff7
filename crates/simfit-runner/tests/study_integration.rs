//! End-to-end calibration against a shell stand-in for the simulator.

use std::path::Path;
use std::sync::Arc;

use simfit_core::{
    ArchiveAggregator, DurationLog, ParameterSpec, ParameterTable, RunLayout, RunStatus,
    TargetSeries, Transform,
};
use simfit_runner::{
    run_study, write_summary_json, Dispatcher, RandomSearch, RunIdSequence, SimulatorCommand,
    SimulatorEvaluator, StudyOptions, StudySummary,
};
use tempfile::tempdir;

/// Writes `result-<id>.txt` with the parameter header and three samples.
/// Run 2 exits non-zero without writing anything; run 4 stops after two samples.
fn fake_simulator(output_dir: &Path) -> SimulatorCommand {
    let script = format!(
        r#"out='{dir}'
case "$2" in
  2) echo "solver diverged" >&2; exit 3 ;;
esac
printf '%s\t%s\n' "$4" "$6" > "$out/result-$2.txt"
printf '0\t1.0\n1\t2.0\n' >> "$out/result-$2.txt"
if [ "$2" != "4" ]; then printf '2\t3.0\n' >> "$out/result-$2.txt"; fi
echo "run $2 done""#,
        dir = output_dir.display()
    );
    SimulatorCommand::new("sh", vec!["-c".to_string(), script, "sim".to_string()])
}

fn table() -> ParameterTable {
    ParameterTable::new(vec![
        ParameterSpec::new("k1", 1.0, 10.0).unwrap(),
        ParameterSpec::new("k2", 6.0, 15.0)
            .unwrap()
            .with_transform(Transform::Log10),
    ])
    .unwrap()
}

/// Test: a five-trial study consumes ids 1..=5 and survives failures
#[tokio::test]
async fn test_study_end_to_end() {
    let dir = tempdir().unwrap();
    let layout = RunLayout::new(dir.path().join("output"));
    std::fs::create_dir_all(layout.output_dir()).unwrap();

    let table = Arc::new(table());
    let target = Arc::new(TargetSeries::from_pairs([(0.0, 1.0), (1.0, 2.0), (2.0, 5.0)]));
    let dispatcher = Dispatcher::new(fake_simulator(layout.output_dir()), layout.clone());
    let evaluator = SimulatorEvaluator::new(dispatcher, table.clone(), target.clone());

    let mut optimizer = RandomSearch::new(Some(2024));
    let options = StudyOptions {
        max_trials: 5,
        failure_penalty: 1e6,
    };
    let result = run_study(&table, &mut optimizer, &evaluator, &options)
        .await
        .expect("study should complete");

    let ids: Vec<u64> = result.trials.iter().filter_map(|t| t.run_id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);

    let statuses: Vec<RunStatus> = result.trials.iter().map(|t| t.status).collect();
    assert_eq!(
        statuses,
        vec![
            RunStatus::Completed,
            RunStatus::Failed,
            RunStatus::Completed,
            RunStatus::Incomplete,
            RunStatus::Completed,
        ]
    );
    assert_eq!(result.trials[1].loss, 1e6);
    assert!(result.trials[1].error.as_ref().unwrap().contains("exit code 3"));

    // All completed runs produce the same series: RMSE = sqrt(4 / 3).
    let expected = (4.0f64 / 3.0).sqrt();
    for t in result.trials.iter().filter(|t| t.status == RunStatus::Completed) {
        assert!((t.score.unwrap() - expected).abs() < 1e-12);
    }

    let log = std::fs::read_to_string(layout.log_path(2)).unwrap();
    assert!(log.contains("solver diverged"));

    let durations = DurationLog::new(layout.duration_log_path()).read().unwrap();
    assert_eq!(durations.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    let raw = std::fs::read_to_string(layout.duration_log_path()).unwrap();
    assert!(raw.lines().all(|l| l.starts_with("run=") && l.ends_with(" seconds")));

    // Header round-trips the physical vector passed on the command line.
    let first = &result.trials[0];
    let archived = simfit_core::read_run_output(&layout, &table, 1).unwrap();
    let k2 = archived.parameters.get("k2").unwrap();
    assert!((k2 - first.physical.get("k2").unwrap()).abs() <= 1e-9 * k2);

    // The archive sees the same runs: 1, 3 and 5 scored, 4 excluded, 2 absent.
    let table_view = ArchiveAggregator::new(&layout, &table, &target)
        .aggregate()
        .unwrap();
    let rows: Vec<u64> = table_view.rows.iter().map(|r| r.run_id).collect();
    assert_eq!(rows, vec![1, 3, 5]);
    assert_eq!(table_view.excluded_ids(), vec![4]);
    for row in &table_view.rows {
        assert!((row.error - expected).abs() < 1e-12);
        assert!(row.duration_secs.is_some());
    }

    let summary = StudySummary::from_result(&result, &table).unwrap();
    let summary_path = dir.path().join("best.json");
    write_summary_json(&summary_path, &summary).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&summary_path).unwrap()).unwrap();
    assert_eq!(json["total_trials"], 5);
    assert_eq!(json["completed"], 3);
    assert_eq!(json["best"]["run_id"], 1);
}

/// Test: a resumed dispatcher continues after the highest archived id
#[tokio::test]
async fn test_resume_continues_numbering() {
    let dir = tempdir().unwrap();
    let layout = RunLayout::new(dir.path());
    std::fs::write(layout.result_path(7), "1\t1e7\n0\t1.0\n").unwrap();

    let next = layout.next_free_run_id().unwrap();
    assert_eq!(next, 8);

    let dispatcher = Dispatcher::with_sequence(
        fake_simulator(layout.output_dir()),
        layout.clone(),
        RunIdSequence::starting_at(next),
    );
    let physical: simfit_core::ParamVector = [("k1", 2.0), ("k2", 1e8)].into_iter().collect();
    let invocation = dispatcher.dispatch(&physical).await.unwrap();
    assert_eq!(invocation.run_id, 8);
    assert!(invocation.succeeded());
    assert!(layout.result_path(8).exists());
}
