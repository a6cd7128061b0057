// ==========================================
// 并发导入测试
// ==========================================
// 测试目标: 多个进程级 AppState（各自独立连接）同时导入同一批数据，
//           全部成功，每条目录记录只被创建一次
// ==========================================


use sample_catalog::app::{AppOptions, AppState};
use sample_catalog::domain::{ImportOutcome, InsertedCounts, RawRow};
use std::sync::{Arc, Barrier};
use std::thread;
use test_helpers::{admin, create_test_app, entity_counts, mismatched_assignment_count};

const WORKERS: usize = 4;
const ROWS: usize = 400;

/// 4 个行业 × 5 个分组名 → 20 个分组；每行一个独立产品
fn shared_rows() -> Vec<RawRow> {
    (0..ROWS)
        .map(|i| {
            RawRow::new(
                i + 1,
                vec![
                    format!("Sector-{}", i % 4),
                    format!("Group-{}", i % 5),
                    format!("Product-{:03}", i),
                ],
            )
        })
        .collect()
}

#[test]
fn test_concurrent_imports_of_same_rows_all_succeed() {
    let app = create_test_app().unwrap();
    let db_path = app.state.db_path.clone();
    let barrier = Arc::new(Barrier::new(WORKERS));

    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let db_path = db_path.clone();
            let barrier = barrier.clone();
            thread::spawn(move || -> Result<InsertedCounts, String> {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| e.to_string())?;
                let state = AppState::with_options(AppOptions::for_db_path(db_path))?;

                barrier.wait();
                let outcome = runtime
                    .block_on(state.import_api.import_rows(&admin(), shared_rows(), false))
                    .map_err(|e| format!("worker {}: {}", worker, e))?;
                match outcome {
                    ImportOutcome::Applied(report) => Ok(report.inserted()),
                    ImportOutcome::DryRun(_) => Err("正式导入返回了试运行结果".to_string()),
                }
            })
        })
        .collect();

    let mut total = InsertedCounts::default();
    for handle in handles {
        let inserted = handle.join().unwrap().unwrap();
        total.sectors += inserted.sectors;
        total.groups += inserted.groups;
        total.products += inserted.products;
        total.assignments += inserted.assignments;
    }

    // 各线程的新建计数之和恰好等于唯一记录数
    assert_eq!(
        total,
        InsertedCounts {
            sectors: 4,
            groups: 20,
            products: ROWS,
            assignments: ROWS,
        }
    );
    assert_eq!(entity_counts(&app), (4, 20, ROWS, ROWS));
    assert_eq!(mismatched_assignment_count(&app), 0);
}
