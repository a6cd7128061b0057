// ==========================================
// 样品申请流程集成测试
// ==========================================
// 覆盖: 提交与快照冻结 / 不匹配拒绝 / 状态历史只追加 / 客户列表 / 外部投递 / 删除
// ==========================================

use sample_catalog::api::{CallerContext, CustomerListQuery};
use sample_catalog::config::config_keys;
use sample_catalog::domain::RequestStatus;

use test_helpers::{
    admin, create_test_app, create_test_app_with_config, find_ids, import_triples, request_count,
    submit_input,
};

const CATALOG: [(&str, &str, &str); 4] = [
    ("Hardware", "Tools", "Widget"),
    ("Hardware", "Tools", "Hammer"),
    ("Hardware", "Fasteners", "Bolt"),
    ("Food", "Snacks", "Pretzel"),
];

#[tokio::test]
async fn test_snapshot_survives_product_rename() {
    let app = create_test_app().unwrap();
    import_triples(&app, &CATALOG).await;
    let (sector_id, group_id, product_id) = find_ids(&app, "Hardware", "Tools", "Widget");

    let outcome = app
        .state
        .request_api
        .submit(&submit_input("Acme", Some(&sector_id), &[(&product_id, &group_id)]))
        .await
        .unwrap();
    let request_id = outcome.request.request_id.clone();
    assert_eq!(outcome.request.status, RequestStatus::Pending);
    assert_eq!(outcome.request.status_history.len(), 1);
    assert_eq!(outcome.request.status_history[0].note, "created");
    outcome.dispatch.wait().await;

    app.state
        .catalog_api
        .rename_product(&admin(), &product_id, "Gadget")
        .unwrap();

    let stored = app.state.request_api.get_request(&admin(), &request_id).unwrap();
    assert_eq!(stored.products.len(), 1);
    assert_eq!(stored.products[0].product_name, "Widget");
    assert_eq!(stored.products[0].production_group_name, "Tools");
    assert_eq!(stored.products[0].product_id.as_deref(), Some(product_id.as_str()));
}

#[tokio::test]
async fn test_unmatched_pair_is_rejected_without_creating_request() {
    let app = create_test_app().unwrap();
    import_triples(&app, &CATALOG).await;
    let (_, tools_id, _) = find_ids(&app, "Hardware", "Tools", "Widget");
    let (food_id, _, pretzel_id) = find_ids(&app, "Food", "Snacks", "Pretzel");

    // 产品不在该分组下
    let err = app
        .state
        .request_api
        .submit(&submit_input("Acme", None, &[(&pretzel_id, &tools_id)]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "UNMATCHED_ASSIGNMENT");
    let details = err.to_error_response().details.unwrap();
    assert_eq!(details["product_id"], pretzel_id.as_str());
    assert_eq!(details["production_group_id"], tools_id.as_str());

    // 指定行业与关联行业不一致
    let (_, _, widget_id) = find_ids(&app, "Hardware", "Tools", "Widget");
    let err = app
        .state
        .request_api
        .submit(&submit_input("Acme", Some(&food_id), &[(&widget_id, &tools_id)]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "UNMATCHED_ASSIGNMENT");

    assert_eq!(request_count(&app), 0);
}

#[tokio::test]
async fn test_missing_required_fields_are_rejected() {
    let app = create_test_app().unwrap();
    import_triples(&app, &CATALOG).await;
    let (_, group_id, product_id) = find_ids(&app, "Hardware", "Tools", "Widget");

    let mut input = submit_input("Acme", None, &[(&product_id, &group_id)]);
    input.contact.email = "   ".to_string();
    let err = app.state.request_api.submit(&input).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    let empty = submit_input("Acme", None, &[]);
    let err = app.state.request_api.submit(&empty).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    assert_eq!(request_count(&app), 0);
}

#[tokio::test]
async fn test_status_history_is_append_only() {
    let app = create_test_app().unwrap();
    import_triples(&app, &CATALOG).await;
    let (_, group_id, product_id) = find_ids(&app, "Hardware", "Tools", "Widget");
    let request = app
        .state
        .request_api
        .submit(&submit_input("Acme", None, &[(&product_id, &group_id)]))
        .await
        .unwrap()
        .request;

    let api = &app.state.request_api;
    let steps = [
        ("review", Some("checking stock")),
        ("approved", None),
        ("completed", Some("done")),
        // 终态可重新打开
        ("pending", Some("reopened")),
    ];
    let mut previous = request.status_history.clone();
    for (status, note) in steps {
        let updated = api.set_status(&admin(), &request.request_id, status, note).unwrap();
        assert_eq!(updated.status_history.len(), previous.len() + 1);
        assert_eq!(&updated.status_history[..previous.len()], &previous[..]);
        let last = updated.status_history.last().unwrap();
        assert_eq!(last.status.as_str(), status);
        assert_eq!(last.note, note.unwrap_or(""));
        assert_eq!(last.updated_by.as_deref(), Some("ops@example.test"));
        previous = updated.status_history;
    }
    assert_eq!(previous.len(), 1 + steps.len());

    let err = api
        .set_status(&admin(), &request.request_id, "teleported", None)
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
    let err = api.set_status(&admin(), "missing", "review", None).unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
    let err = api
        .set_status(&CallerContext::anonymous(), &request.request_id, "review", None)
        .unwrap_err();
    assert_eq!(err.code(), "UNAUTHORIZED");

    let stored = api.get_request(&admin(), &request.request_id).unwrap();
    assert_eq!(stored.status, RequestStatus::Pending);
    assert_eq!(stored.status_history.len(), 1 + steps.len());
}

#[tokio::test]
async fn test_customer_list_pagination_filters_and_search() {
    let app = create_test_app_with_config(&[(config_keys::CUSTOMER_PAGE_SIZE, "2")]).unwrap();
    import_triples(&app, &CATALOG).await;
    let (hardware_id, tools_id, widget_id) = find_ids(&app, "Hardware", "Tools", "Widget");
    let (_, fasteners_id, bolt_id) = find_ids(&app, "Hardware", "Fasteners", "Bolt");

    let api = &app.state.request_api;
    for company in ["Alpha Ltd", "Bravo Inc", "Charlie Co"] {
        api.submit(&submit_input(company, Some(&hardware_id), &[(&widget_id, &tools_id)]))
            .await
            .unwrap();
    }
    let mut other = submit_input("Delta GmbH", None, &[(&bolt_id, &fasteners_id)]);
    other.contact.province = Some("Quebec".to_string());
    api.submit(&other).await.unwrap();

    // 分页（新建在前）
    let page1 = api
        .list_customers(&admin(), &CustomerListQuery::default())
        .await
        .unwrap();
    assert_eq!(page1.rows.len(), 2);
    assert_eq!(page1.pagination.total, 4);
    assert_eq!(page1.pagination.limit, 2);
    assert_eq!(page1.pagination.total_pages, 2);
    assert_eq!(page1.rows[0].company_name, "Delta GmbH");
    assert_eq!(page1.rows[0].sector_name, "Others");
    assert_eq!(page1.rows[0].short_id.len(), 6);

    let page2 = api
        .list_customers(
            &admin(),
            &CustomerListQuery {
                page: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page2.pagination.page, 2);
    assert_eq!(page2.rows.len(), 2);
    assert_eq!(page2.rows[1].company_name, "Alpha Ltd");
    assert_eq!(page2.rows[1].sector_name, "Hardware");
    assert_eq!(page2.rows[1].products, "Widget");

    // 超大页码：拒绝而不是溢出
    let err = api
        .list_customers(
            &admin(),
            &CustomerListQuery {
                page: Some(usize::MAX),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_INPUT");

    // 过滤条件为 AND；"all" 不过滤行业
    let by_group = api
        .list_customers(
            &admin(),
            &CustomerListQuery {
                sector_id: Some("all".to_string()),
                production_group_id: Some(fasteners_id.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_group.pagination.total, 1);
    assert_eq!(by_group.rows[0].production_groups, "Fasteners");

    let by_sector_and_province = api
        .list_customers(
            &admin(),
            &CustomerListQuery {
                sector_id: Some(hardware_id.clone()),
                province: Some("Quebec".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_sector_and_province.pagination.total, 0);

    // 检索: 不分页，大小写不敏感，覆盖快照中的产品名
    let search = api
        .list_customers(
            &admin(),
            &CustomerListQuery {
                search: Some("WIDGET".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(search.rows.len(), 3);
    assert_eq!(search.pagination.total, 3);
    assert_eq!(search.pagination.limit, 3);
    assert_eq!(search.pagination.page, 1);
    assert_eq!(search.pagination.total_pages, 1);

    let by_name = api
        .list_customers(
            &admin(),
            &CustomerListQuery {
                search: Some("bravo".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_name.rows.len(), 1);
    assert_eq!(by_name.rows[0].company_name, "Bravo Inc");

    let err = api
        .list_customers(&CallerContext::anonymous(), &CustomerListQuery::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "UNAUTHORIZED");
}

#[tokio::test]
async fn test_submission_dispatches_spreadsheet_row_and_notification() {
    let app = create_test_app_with_config(&[(config_keys::ADMIN_EMAIL, "admin@example.test")]).unwrap();
    import_triples(&app, &CATALOG).await;
    let (sector_id, group_id, product_id) = find_ids(&app, "Hardware", "Tools", "Widget");
    let (_, _, hammer_id) = find_ids(&app, "Hardware", "Tools", "Hammer");

    let outcome = app
        .state
        .request_api
        .submit(&submit_input(
            "Acme",
            Some(&sector_id),
            &[(&product_id, &group_id), (&hammer_id, &group_id)],
        ))
        .await
        .unwrap();
    let request_id = outcome.request.request_id.clone();
    let summary = outcome.dispatch.wait().await;
    assert_eq!(summary.delivered, 2);
    assert_eq!(summary.failed, 0);

    let sheet = std::fs::read_to_string(app.spreadsheet_path()).unwrap();
    let lines: Vec<&str> = sheet.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains("Acme"));
    assert!(lines[1].contains("Hardware"));
    assert!(lines[1].contains("\"Widget, Hammer\""));
    assert!(lines[1].ends_with(&request_id));

    let sent = app.mail.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "admin@example.test");
    assert_eq!(sent[0].subject, "New sample request: Acme");
    assert!(sent[0].body.contains("Hammer (Tools)"));
}

#[tokio::test]
async fn test_no_admin_email_means_no_notification() {
    let app = create_test_app().unwrap();
    import_triples(&app, &CATALOG).await;
    let (_, group_id, product_id) = find_ids(&app, "Hardware", "Tools", "Widget");

    let outcome = app
        .state
        .request_api
        .submit(&submit_input("Acme", None, &[(&product_id, &group_id)]))
        .await
        .unwrap();
    outcome.dispatch.wait().await;

    assert!(app.mail.sent.lock().unwrap().is_empty());
    assert!(app.spreadsheet_path().exists());
}

#[tokio::test]
async fn test_delete_request_removes_it() {
    let app = create_test_app().unwrap();
    import_triples(&app, &CATALOG).await;
    let (_, group_id, product_id) = find_ids(&app, "Hardware", "Tools", "Widget");
    let request = app
        .state
        .request_api
        .submit(&submit_input("Acme", None, &[(&product_id, &group_id)]))
        .await
        .unwrap()
        .request;

    let api = &app.state.request_api;
    api.set_status(&admin(), &request.request_id, "review", None).unwrap();
    api.delete_request(&admin(), &request.request_id).unwrap();

    assert_eq!(request_count(&app), 0);
    assert_eq!(
        api.delete_request(&admin(), &request.request_id).unwrap_err().code(),
        "NOT_FOUND"
    );
}
