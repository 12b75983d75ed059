//! End-to-end tests: scan, reconcile, plan and execute against real directories

use docsync_config::{Config, ConfigLoader};
use docsync_sync::{
    hash_bytes, ExecutorOptions, GroupKey, GroupingMode, JobId, JobStatus, MatchResult,
    PlannerOptions, ReconciliationEngine, Snapshotter, SyncAction, SyncExecutor, SyncPlan,
    SUSPECTED_RENAME,
};
use docsync_tests::{day_2024, TestRoot};
use docsync_types::{Error, SyncStrategy, WorkerCount};
use rstest::rstest;
use tokio_util::sync::CancellationToken;

type TestResult = anyhow::Result<()>;

fn engine(strategy: SyncStrategy) -> ReconciliationEngine {
    ReconciliationEngine::new(&Config::default())
        .with_planner_options(PlannerOptions::default().with_strategy(strategy))
        .with_executor_options(ExecutorOptions::default().with_dry_run(false))
}

#[tokio::test]
async fn test_rename_is_detected_not_acted_on() -> TestResult {
    let a = TestRoot::new()?;
    let b = TestRoot::new()?;
    a.write("sub/doc.pdf", b"X")?;
    a.write("new.pdf", b"Y")?;
    b.write("sub/doc.pdf", b"X")?;
    b.write("sub2/doc2.pdf", b"Y")?;

    for strategy in SyncStrategy::ALL {
        let engine = engine(strategy);
        let analysis = engine.analyze(a.path(), b.path()).await?;

        assert_eq!(analysis.matches.len(), 2);
        assert!(matches!(analysis.matches[0], MatchResult::SuspectedDuplicate { .. }));
        assert!(matches!(analysis.matches[1], MatchResult::ExactMatch { .. }));

        let plan = engine.plan(&analysis);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.actions()[0].reason(), Some(SUSPECTED_RENAME));

        let state = engine.execute(plan, JobId::new()).wait().await?;
        assert_eq!(state.status, JobStatus::Completed);
    }

    assert_eq!(a.listing()?, vec!["new.pdf", "sub/doc.pdf"]);
    assert_eq!(b.listing()?, vec!["sub/doc.pdf", "sub2/doc2.pdf"]);
    Ok(())
}

#[tokio::test]
async fn test_keep_newest_overwrites_then_settles() -> TestResult {
    let a = TestRoot::new()?;
    let b = TestRoot::new()?;
    a.write_at("report.pdf", b"A", day_2024(1))?;
    b.write_at("report.pdf", b"B", day_2024(32))?;

    let engine = engine(SyncStrategy::KeepNewest);
    let analysis = engine.analyze(a.path(), b.path()).await?;
    let plan = engine.plan(&analysis);

    assert_eq!(plan.len(), 1);
    match &plan.actions()[0] {
        SyncAction::Copy {
            source,
            destination,
            overwrite,
            ..
        } => {
            assert!(source.starts_with(analysis.root2.root()));
            assert!(destination.starts_with(analysis.root1.root()));
            assert!(*overwrite);
        }
        other => panic!("expected a copy, got {}", other),
    }

    let state = engine.execute(plan, JobId::new()).wait().await?;
    assert_eq!(state.status, JobStatus::Completed);
    assert!(state.errors.is_empty());
    assert_eq!(a.read("report.pdf")?, b"B");

    let rerun = engine.analyze(a.path(), b.path()).await?;
    assert!(rerun.summary.is_in_sync());
    assert!(engine.plan(&rerun).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_keep_both_loses_nothing() -> TestResult {
    let a = TestRoot::new()?;
    let b = TestRoot::new()?;
    a.write("docs/report.pdf", b"version A")?;
    b.write("docs/report.pdf", b"version B")?;

    let engine = engine(SyncStrategy::KeepBoth);
    let analysis = engine.analyze(a.path(), b.path()).await?;
    let state = engine
        .execute(engine.plan(&analysis), JobId::new())
        .wait()
        .await?;

    assert_eq!(state.status, JobStatus::Completed);
    assert!(state.errors.is_empty());
    assert_eq!(a.read("docs/report.pdf")?, b"version A");
    assert_eq!(a.read("docs/report_copy.pdf")?, b"version B");
    assert_eq!(b.read("docs/report.pdf")?, b"version B");
    assert_eq!(b.read("docs/report_copy.pdf")?, b"version A");

    let rerun = engine.analyze(a.path(), b.path()).await?;
    // Each root now holds both versions under swapped names
    assert_eq!(rerun.summary.partial_records, 4);
    assert_eq!(rerun.summary.exact, 0);
    Ok(())
}

#[rstest]
#[case(SyncStrategy::KeepNewest, b"older".as_slice(), b"newer".as_slice())]
#[case(SyncStrategy::KeepLargest, b"ab".as_slice(), b"cd".as_slice())]
#[tokio::test]
async fn test_ties_fall_back_to_keep_both(
    #[case] strategy: SyncStrategy,
    #[case] content1: &[u8],
    #[case] content2: &[u8],
) -> TestResult {
    let a = TestRoot::new()?;
    let b = TestRoot::new()?;
    // Same timestamp and same size on both sides
    a.write_at("tie.txt", content1, day_2024(10))?;
    b.write_at("tie.txt", content2, day_2024(10))?;

    let engine = engine(strategy);
    let analysis = engine.analyze(a.path(), b.path()).await?;
    let plan = engine.plan(&analysis);

    if strategy == SyncStrategy::KeepLargest {
        assert_eq!(plan.count("copy"), 2);
        engine.execute(plan, JobId::new()).wait().await?;
        assert_eq!(a.read("tie.txt")?, content1);
        assert_eq!(a.read("tie_copy.txt")?, content2);
    } else {
        assert_eq!(plan.count("copy"), 2);
        assert!(plan.actions().iter().all(|action| matches!(
            action,
            SyncAction::Copy { overwrite: false, .. }
        )));
    }
    Ok(())
}

#[rstest]
#[case(SyncStrategy::KeepBoth)]
#[case(SyncStrategy::KeepNewest)]
#[case(SyncStrategy::KeepLargest)]
#[tokio::test]
async fn test_synced_roots_plan_nothing(#[case] strategy: SyncStrategy) -> TestResult {
    let a = TestRoot::new()?;
    let b = TestRoot::new()?;
    for root in [&a, &b] {
        root.write("one.txt", b"1")?;
        root.write("deep/er/two.txt", b"2")?;
    }

    let engine = engine(strategy);
    let analysis = engine.analyze(a.path(), b.path()).await?;

    assert_eq!(analysis.summary.exact, 2);
    assert!(engine.plan(&analysis).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_reconciliation_is_stable() -> TestResult {
    let a = TestRoot::new()?;
    let b = TestRoot::new()?;
    for i in 0..20 {
        a.write(&format!("d{}/f{}.txt", i % 3, i), format!("{}", i % 7).as_bytes())?;
        b.write(&format!("d{}/f{}.txt", i % 4, i), format!("{}", i % 5).as_bytes())?;
    }

    let engine = engine(SyncStrategy::KeepBoth);
    let first = engine.analyze(a.path(), b.path()).await?;
    let second = engine.analyze(a.path(), b.path()).await?;

    assert_eq!(first.matches, second.matches);
    assert_eq!(
        serde_json::to_string(&first.matches)?,
        serde_json::to_string(&second.matches)?
    );
    assert_eq!(engine.plan(&first), engine.plan(&second));
    Ok(())
}

#[tokio::test]
async fn test_failed_verification_keeps_source() -> TestResult {
    let a = TestRoot::new()?;
    let b = TestRoot::new()?;
    let source = a.write("moving.txt", b"on disk")?;

    let plan = SyncPlan::new(
        SyncStrategy::KeepBoth,
        vec![SyncAction::Rename {
            source: source.clone(),
            destination: b.join("moving.txt"),
            source_root: a.path().to_path_buf(),
            destination_root: b.path().to_path_buf(),
            content_hash: hash_bytes(b"at scan time"),
        }],
    );

    let executor = SyncExecutor::new(ExecutorOptions::default().with_dry_run(false));
    let state = executor.execute(plan, JobId::new()).wait().await?;

    assert_eq!(state.status, JobStatus::Completed);
    assert!(matches!(
        state.errors[0].error,
        Error::VerificationMismatch { .. }
    ));
    assert!(source.exists());
    assert!(b.listing()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_dry_run_changes_nothing() -> TestResult {
    let a = TestRoot::new()?;
    let b = TestRoot::new()?;
    a.write_at("report.pdf", b"A", day_2024(1))?;
    b.write_at("report.pdf", b"B", day_2024(32))?;
    a.write("only_here.txt", b"u")?;

    let engine = ReconciliationEngine::new(&Config::default()).with_planner_options(
        PlannerOptions::default().with_strategy(SyncStrategy::KeepNewest),
    );
    let analysis = engine.analyze(a.path(), b.path()).await?;
    let plan = engine.plan(&analysis);
    let total = plan.len();

    let state = engine.execute(plan, JobId::new()).wait().await?;

    assert!(state.dry_run);
    assert_eq!(state.status, JobStatus::Completed);
    assert_eq!(state.completed_count, total);
    assert_eq!(a.read("report.pdf")?, b"A");
    assert_eq!(b.listing()?, vec!["report.pdf"]);
    Ok(())
}

#[tokio::test]
async fn test_cancelled_job_leaves_no_partial_files() -> TestResult {
    let a = TestRoot::new()?;
    let b = TestRoot::new()?;
    for i in 0..50 {
        a.write(&format!("f{:02}.bin", i), &docsync_tests::generate_test_data(64 * 1024, i))?;
    }

    let engine = ReconciliationEngine::new(&Config::default()).with_executor_options(
        ExecutorOptions::default()
            .with_dry_run(false)
            .with_workers(WorkerCount::sequential()),
    );
    let analysis = engine.analyze(a.path(), b.path()).await?;
    let handle = engine.execute(engine.plan(&analysis), JobId::new());
    handle.cancel();
    let state = handle.wait().await?;

    assert!(matches!(state.status, JobStatus::Cancelled | JobStatus::Completed));
    assert!(state.completed_count <= state.total_count);
    let copied = b.listing()?;
    assert_eq!(copied.len(), state.completed_count);
    for name in copied {
        assert_eq!(b.read(&name)?, a.read(&name)?);
    }
    Ok(())
}

#[tokio::test]
async fn test_pre_cancelled_run_does_nothing() -> TestResult {
    let a = TestRoot::new()?;
    let b = TestRoot::new()?;
    a.write("x.txt", b"x")?;

    let engine = engine(SyncStrategy::KeepBoth);
    let analysis = engine.analyze(a.path(), b.path()).await?;
    let token = CancellationToken::new();
    token.cancel();

    let state = SyncExecutor::new(ExecutorOptions::default().with_dry_run(false))
        .run(engine.plan(&analysis), JobId::new(), token)
        .await;

    assert_eq!(state.status, JobStatus::Cancelled);
    assert_eq!(state.completed_count, 0);
    assert!(b.listing()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unavailable_root_is_fatal() -> TestResult {
    let a = TestRoot::new()?;
    let missing = a.join("unplugged-drive");

    let result = Snapshotter::default()
        .scan_pair(a.path(), &missing)
        .await;

    match result {
        Err(e @ Error::RootUnavailable { .. }) => assert!(e.is_fatal()),
        other => panic!("expected RootUnavailable, got {:?}", other.map(|_| ())),
    }
    Ok(())
}

#[tokio::test]
async fn test_uniques_are_copied_both_ways() -> TestResult {
    let a = TestRoot::new()?;
    let b = TestRoot::new()?;
    a.write("from_a/report.pdf", b"aaaa")?;
    b.write("from_b.txt", b"bb")?;

    let engine = engine(SyncStrategy::KeepBoth);
    let analysis = engine.analyze(a.path(), b.path()).await?;
    assert_eq!(analysis.summary.space_needed_root1, 2);
    assert_eq!(analysis.summary.space_needed_root2, 4);

    let state = engine
        .execute(engine.plan(&analysis), JobId::new())
        .wait()
        .await?;

    assert!(state.errors.is_empty());
    assert_eq!(a.listing()?, b.listing()?);
    Ok(())
}

#[tokio::test]
async fn test_target_folder_is_created_on_demand() -> TestResult {
    let a = TestRoot::new()?;
    let b = TestRoot::new()?;
    a.write("sub/only.pdf", b"unique")?;
    assert!(!b.exists("incoming"));

    let options = PlannerOptions {
        target_root2: Some(b.join("incoming")),
        ..PlannerOptions::default()
    };
    let engine = engine(SyncStrategy::KeepBoth).with_planner_options(options);
    let analysis = engine.analyze(a.path(), b.path()).await?;

    let state = engine
        .execute(engine.plan(&analysis), JobId::new())
        .wait()
        .await?;

    assert_eq!(state.status, JobStatus::Completed);
    assert!(state.errors.is_empty());
    assert_eq!(b.read("incoming/sub/only.pdf")?, b"unique");
    Ok(())
}

#[tokio::test]
async fn test_duplicate_groups_span_roots() -> TestResult {
    let a = TestRoot::new()?;
    let b = TestRoot::new()?;
    a.write("invoice.pdf", b"paid")?;
    a.write("archive/invoice-copy.pdf", b"paid")?;
    b.write("Invoice.PDF", b"unpaid")?;

    let engine = engine(SyncStrategy::KeepBoth);
    let analysis = engine.analyze(a.path(), b.path()).await?;

    let content = engine.duplicates(&analysis, GroupingMode::Content);
    assert_eq!(content.len(), 1);
    assert_eq!(content[0].key(), &GroupKey::Content(hash_bytes(b"paid")));
    assert_eq!(content[0].reclaimable_bytes(), 4);

    let names = engine.duplicates(&analysis, GroupingMode::Name);
    assert_eq!(names.len(), 1);
    assert!(names[0].is_cross_root());
    Ok(())
}

#[tokio::test]
async fn test_engine_from_config_file() -> TestResult {
    let a = TestRoot::new()?;
    let b = TestRoot::new()?;
    let settings = TestRoot::new()?;
    let config_path = settings.write(
        "docsync.yaml",
        b"sync:\n  strategy: keep_largest\n  dry_run: false\n  copy_suffix: _other\n",
    )?;
    a.write("notes.txt", b"short")?;
    b.write("notes.txt", b"much longer")?;
    a.write("skip.log", b"log")?;

    let mut config = ConfigLoader::load_from_file(&config_path)?;
    config.scan.extensions = vec!["txt".to_string()];
    let engine = ReconciliationEngine::new(&config);

    let analysis = engine.analyze(a.path(), b.path()).await?;
    assert_eq!(analysis.root1.len(), 1);

    let plan = engine.plan(&analysis);
    assert_eq!(plan.strategy(), SyncStrategy::KeepLargest);
    engine.execute(plan, JobId::new()).wait().await?;

    assert_eq!(a.read("notes.txt")?, b"much longer");
    assert!(!b.exists("skip.log"));
    Ok(())
}
