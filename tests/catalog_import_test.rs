// ==========================================
// 目录导入对账集成测试
// ==========================================
// 覆盖: 幂等重跑 / 同名分组跨行业 / 试运行无副作用 / 跳过行报告 / CSV 文件导入 / 权限
// ==========================================

use sample_catalog::api::CallerContext;
use sample_catalog::domain::{ImportOutcome, InsertedCounts, SkipReason};

use test_helpers::{
    admin, create_test_app, entity_counts, import_triples, mismatched_assignment_count, raw_rows,
};

const SCENARIO: [(&str, &str, &str); 3] = [
    ("Dairy", "Cheese", "Cheddar"),
    ("Dairy", "Cheese", "Gouda"),
    ("Meat", "Beef", "Sirloin"),
];

#[tokio::test]
async fn test_scenario_import_then_reimport_inserts_nothing() {
    let app = create_test_app().unwrap();

    let first = import_triples(&app, &SCENARIO).await;
    assert_eq!(
        first.inserted(),
        InsertedCounts {
            sectors: 2,
            groups: 2,
            products: 3,
            assignments: 3,
        }
    );
    assert_eq!(first.log.row_count, 3);
    assert_eq!(first.log.duplicate_assignments, 0);
    let counts_after_first = entity_counts(&app);
    assert_eq!(counts_after_first, (2, 2, 3, 3));

    let second = import_triples(&app, &SCENARIO).await;
    assert_eq!(second.inserted(), InsertedCounts::default());
    assert_eq!(second.log.duplicate_assignments, 3);
    assert_eq!(entity_counts(&app), counts_after_first);

    // 每次正式导入各写一条日志
    let logs = app
        .state
        .import_api
        .recent_import_logs(&admin(), None)
        .await
        .unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| !l.dry_run));
}

#[tokio::test]
async fn test_same_group_name_in_two_sectors_is_two_groups() {
    let app = create_test_app().unwrap();

    let report = import_triples(
        &app,
        &[("Dairy", "Organic", "Milk"), ("Produce", "Organic", "Kale")],
    )
    .await;
    assert_eq!(report.inserted().groups, 2);

    let groups = app.state.catalog_api.list_production_groups(None).unwrap();
    let organic: Vec<_> = groups.iter().filter(|g| g.name == "Organic").collect();
    assert_eq!(organic.len(), 2);
    assert_ne!(organic[0].sector_id, organic[1].sector_id);
}

#[tokio::test]
async fn test_separator_in_names_keeps_groups_distinct() {
    let app = create_test_app().unwrap();

    let report = import_triples(&app, &[("A::B", "C", "P1"), ("A", "B::C", "P2")]).await;
    assert_eq!(
        report.inserted(),
        InsertedCounts {
            sectors: 2,
            groups: 2,
            products: 2,
            assignments: 2,
        }
    );
    assert_eq!(mismatched_assignment_count(&app), 0);
}

#[tokio::test]
async fn test_trimmed_names_reconcile_with_existing_records() {
    let app = create_test_app().unwrap();
    import_triples(&app, &[("Dairy", "Cheese", "Brie")]).await;

    let report = import_triples(&app, &[("  Dairy ", " Cheese", "Brie  ")]).await;
    assert_eq!(report.inserted(), InsertedCounts::default());
    assert_eq!(entity_counts(&app), (1, 1, 1, 1));
}

#[tokio::test]
async fn test_dry_run_reports_without_writing() {
    let app = create_test_app().unwrap();
    import_triples(&app, &[("Dairy", "Cheese", "Brie")]).await;
    let before = entity_counts(&app);

    let outcome = app
        .state
        .import_api
        .import_rows(&admin(), raw_rows(&SCENARIO), true)
        .await
        .unwrap();

    let report = match outcome {
        ImportOutcome::DryRun(report) => report,
        other => panic!("应为试运行结果: {:?}", other),
    };
    assert_eq!(report.row_count, 3);
    assert_eq!(report.accepted_rows, 3);
    assert_eq!(report.unique.sectors, 2);
    assert_eq!(report.unique.groups, 2);
    assert_eq!(report.unique.products, 3);
    assert_eq!(report.samples.sectors, vec!["Dairy", "Meat"]);

    assert_eq!(entity_counts(&app), before);
    let logs = app
        .state
        .import_api
        .recent_import_logs(&admin(), Some(10))
        .await
        .unwrap();
    assert_eq!(logs.len(), 1, "试运行不写导入日志");
}

#[tokio::test]
async fn test_rows_with_blank_fields_are_skipped_and_reported() {
    let app = create_test_app().unwrap();

    let report = import_triples(
        &app,
        &[
            ("Dairy", "Cheese", "Brie"),
            ("", "Cheese", "Gouda"),
            ("Dairy", "  ", "Feta"),
            ("Dairy", "Cheese", ""),
        ],
    )
    .await;

    assert_eq!(report.log.row_count, 4);
    assert_eq!(report.log.skipped_rows, 3);
    let reasons: Vec<(usize, SkipReason)> = report.skipped.iter().map(|s| (s.row_number, s.reason)).collect();
    assert_eq!(
        reasons,
        vec![
            (2, SkipReason::MissingSector),
            (3, SkipReason::MissingGroup),
            (4, SkipReason::MissingProduct),
        ]
    );
    assert_eq!(entity_counts(&app), (1, 1, 1, 1));
}

#[tokio::test]
async fn test_csv_file_import_end_to_end() {
    let app = create_test_app().unwrap();
    let csv_path = app.dir.path().join("catalog.csv");
    std::fs::write(
        &csv_path,
        "sector,production_group,product\nDairy,Cheese,Cheddar\nDairy,Cheese,Gouda\n,,\nMeat,Beef,Sirloin\n",
    )
    .unwrap();

    let outcome = app
        .state
        .import_api
        .import_file(&admin(), csv_path.to_str().unwrap(), Some("supplier-sheet".to_string()), false)
        .await
        .unwrap();

    match outcome {
        ImportOutcome::Applied(report) => {
            assert_eq!(report.inserted().assignments, 3);
            assert_eq!(report.log.source, "supplier-sheet");
            // 空白行计入总行数并作为跳过行上报
            assert_eq!(report.log.row_count, 4);
            assert_eq!(report.skipped.len(), 1);
            assert_eq!(report.skipped[0].row_number, 3);
            assert_eq!(report.skipped[0].reason, SkipReason::BlankRow);
        }
        other => panic!("应为正式导入结果: {:?}", other),
    }
    assert_eq!(entity_counts(&app), (2, 2, 3, 3));
}

#[tokio::test]
async fn test_missing_file_is_not_found_and_writes_no_log() {
    let app = create_test_app().unwrap();
    let err = app
        .state
        .import_api
        .import_file(&admin(), "/nonexistent/catalog.csv", None, false)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");

    let logs = app
        .state
        .import_api
        .recent_import_logs(&admin(), None)
        .await
        .unwrap();
    assert!(logs.is_empty());
}

#[tokio::test]
async fn test_import_requires_admin() {
    let app = create_test_app().unwrap();
    let err = app
        .state
        .import_api
        .import_rows(&CallerContext::anonymous(), raw_rows(&SCENARIO), false)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "UNAUTHORIZED");
    assert_eq!(entity_counts(&app), (0, 0, 0, 0));
}
