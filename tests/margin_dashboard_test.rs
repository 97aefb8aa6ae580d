// ==========================================
// 毛利率看板集成测试
// ==========================================
// 测试目标: 验证风险标注、汇总与过滤
// 覆盖范围: 目标阈值 / 未定价估算 / 分类与毛利率过滤 / 排序
// ==========================================


use chrono::{Duration, Utc};
use cost_intelligence::config::config_manager::KEY_TARGET_MARGIN_PERCENT;
use cost_intelligence::domain::estimate::{CostEstimate, MarginFilters};
use cost_intelligence::repository::estimate_repo::CostEstimateRepository;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use test_helpers::{build_engines, create_test_db, insert_test_config, shared_connection};
use uuid::Uuid;

/// 直接写入一条估算（绕过管道,看板只依赖持久化字段）
fn seed_estimate(
    repo: &CostEstimateRepository,
    title: &str,
    category: Option<&str>,
    margin: Option<f64>,
    age_minutes: i64,
) {
    let created_at = Utc::now() - Duration::minutes(age_minutes);
    repo.insert_estimate(&CostEstimate {
        id: Uuid::new_v4().to_string(),
        title: title.to_string(),
        description: None,
        category: category.map(String::from),
        client_name: None,
        material_cost: 50.0,
        labour_cost: 15.0,
        overhead_cost: 6.5,
        total_cost_price: 71.5,
        selling_price: margin.map(|_| 100.0),
        margin,
        confidence_score: 80,
        lines: Vec::new(),
        created_at,
        updated_at: created_at,
    })
    .unwrap();
}

fn setup(conn: &Arc<Mutex<Connection>>) -> test_helpers::TestEngines {
    let engines = build_engines(conn, vec![]);
    seed_estimate(&engines.estimate_repo, "健康单", Some("branding"), Some(30.0), 1);
    seed_estimate(&engines.estimate_repo, "风险单", Some("events"), Some(12.5), 2);
    seed_estimate(&engines.estimate_repo, "未定价单", Some("events"), None, 3);
    engines
}

#[test]
fn test_at_risk_classification_with_default_target() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path).unwrap();
    let engines = setup(&conn);

    let dashboard = engines
        .classifier
        .margin_dashboard(&MarginFilters::default())
        .unwrap();

    // 默认目标毛利率 25%: 12.5 有风险,30 无风险,未定价不算风险
    assert_eq!(dashboard.summary.target_margin, 25.0);
    assert_eq!(dashboard.summary.total, 3);
    assert_eq!(dashboard.summary.at_risk, 1);

    let by_title = |title: &str| {
        dashboard
            .estimates
            .iter()
            .find(|e| e.estimate.title == title)
            .unwrap()
    };
    assert!(!by_title("健康单").at_risk);
    assert!(by_title("风险单").at_risk);
    assert!(!by_title("未定价单").at_risk);

    // 均值只统计有毛利率定义的估算: (30 + 12.5) / 2 = 21.3（1 位小数）
    assert_eq!(dashboard.summary.avg_margin, 21.3);
}

#[test]
fn test_configured_target_changes_classification() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path).unwrap();
    let engines = setup(&conn);

    insert_test_config(&conn, KEY_TARGET_MARGIN_PERCENT, "10");

    let dashboard = engines
        .classifier
        .margin_dashboard(&MarginFilters::default())
        .unwrap();

    // 阈值降到 10% 后无风险单
    assert_eq!(dashboard.summary.target_margin, 10.0);
    assert_eq!(dashboard.summary.at_risk, 0);
}

#[test]
fn test_category_filter_is_case_insensitive() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path).unwrap();
    let engines = setup(&conn);

    let dashboard = engines
        .classifier
        .margin_dashboard(&MarginFilters {
            category: Some("EVENTS".to_string()),
            ..Default::default()
        })
        .unwrap();

    assert_eq!(dashboard.summary.total, 2);
    assert!(dashboard
        .estimates
        .iter()
        .all(|e| e.estimate.category.as_deref() == Some("events")));
}

#[test]
fn test_margin_range_filter_excludes_unpriced() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path).unwrap();
    let engines = setup(&conn);

    let dashboard = engines
        .classifier
        .margin_dashboard(&MarginFilters {
            min_margin: Some(20.0),
            ..Default::default()
        })
        .unwrap();

    // 毛利率下限过滤: 未定价单一并排除
    assert_eq!(dashboard.summary.total, 1);
    assert_eq!(dashboard.estimates[0].estimate.title, "健康单");
}

#[test]
fn test_dashboard_orders_worst_margin_first() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path).unwrap();
    let engines = setup(&conn);

    let dashboard = engines
        .classifier
        .margin_dashboard(&MarginFilters::default())
        .unwrap();

    let titles: Vec<&str> = dashboard
        .estimates
        .iter()
        .map(|e| e.estimate.title.as_str())
        .collect();

    // 毛利率升序,未定价置底
    assert_eq!(titles, vec!["风险单", "健康单", "未定价单"]);
}
