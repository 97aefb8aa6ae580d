// ==========================================
// 成本估算 API 集成测试
// ==========================================
// 测试目标: 验证估算管道的端到端计算与持久化
// 覆盖范围: 费用模型 / 置信度汇总 / 售价更新 / 入参校验
// 费用模型: 材料 + 固定人工 15 + 管理费用 10%
// ==========================================


use cost_intelligence::api::error::ApiError;
use cost_intelligence::api::CostEngineApi;
use cost_intelligence::domain::estimate::{BomLine, CostEstimateInput};
use cost_intelligence::lookup::{LookupTier, StaticReferenceTier};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use test_helpers::{assert_close, build_engines, create_test_db, shared_connection};

fn build_api(conn: &Arc<Mutex<Connection>>, tiers: Vec<Box<dyn LookupTier>>) -> CostEngineApi {
    let engines = build_engines(conn, tiers);
    CostEngineApi::new(
        engines.resolver,
        engines.estimator,
        engines.classifier,
        engines.estimate_repo,
    )
}

fn pvc_input(selling_price: Option<f64>) -> CostEstimateInput {
    CostEstimateInput {
        title: "展位横幅".to_string(),
        description: Some("6x2m PVC banner".to_string()),
        category: Some("branding".to_string()),
        client_name: Some("Acme Events".to_string()),
        bom_lines: Some(vec![BomLine {
            material_name: "PVC fabric 510gsm".to_string(),
            quantity: 12.0,
            unit: "sqm".to_string(),
        }]),
        selling_price,
    }
}

#[tokio::test]
async fn test_estimate_cost_model_end_to_end() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path).unwrap();
    let api = build_api(&conn, vec![Box::new(StaticReferenceTier::new())]);

    let estimate = api.create_estimate(pvc_input(None)).await.unwrap();

    // 参考价 1.85 × 12 = 22.20
    assert_close(estimate.material_cost, 22.2, "material_cost");
    assert_close(estimate.labour_cost, 15.0, "labour_cost");
    // (22.20 + 15) × 10% = 3.72
    assert_close(estimate.overhead_cost, 3.72, "overhead_cost");
    assert_close(estimate.total_cost_price, 40.92, "total_cost_price");

    // 单行置信度 0.75 → 整单 75
    assert_eq!(estimate.confidence_score, 75);
    assert_eq!(estimate.selling_price, None);
    assert_eq!(estimate.margin, None);

    assert_eq!(estimate.lines.len(), 1);
    let line = &estimate.lines[0];
    assert_eq!(line.line_no, 1);
    assert_close(line.unit_price, 1.85, "line unit_price");
    assert_close(line.line_total, 22.2, "line_total");
    assert_eq!(line.source, "ONLINE");
    assert_eq!(line.source_detail.as_deref(), Some("static-reference:PVC fabric"));
}

#[tokio::test]
async fn test_unknown_material_yields_zero_cost_line() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path).unwrap();
    let api = build_api(&conn, vec![]);

    let input = CostEstimateInput {
        title: "神秘项目".to_string(),
        bom_lines: Some(vec![BomLine {
            material_name: "Unobtainium".to_string(),
            quantity: 3.0,
            unit: "kg".to_string(),
        }]),
        ..Default::default()
    };

    // 无价物料绝不导致估算失败
    let estimate = api.create_estimate(input).await.unwrap();

    assert_close(estimate.material_cost, 0.0, "material_cost");
    // (0 + 15) × 1.10 = 16.50
    assert_close(estimate.total_cost_price, 16.5, "total_cost_price");
    assert_eq!(estimate.confidence_score, 0);

    let line = &estimate.lines[0];
    assert_eq!(line.unit_price, 0.0);
    assert_eq!(line.source, "none");
    assert_eq!(line.confidence, 0.0);
}

#[tokio::test]
async fn test_invalid_bom_lines_are_filtered() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path).unwrap();
    let api = build_api(&conn, vec![Box::new(StaticReferenceTier::new())]);

    let input = CostEstimateInput {
        title: "过滤测试".to_string(),
        bom_lines: Some(vec![
            BomLine {
                material_name: "   ".to_string(),
                quantity: 2.0,
                unit: "sqm".to_string(),
            },
            BomLine {
                material_name: "carpet".to_string(),
                quantity: 0.0,
                unit: "sqm".to_string(),
            },
            BomLine {
                material_name: "carpet".to_string(),
                quantity: 10.0,
                unit: "sqm".to_string(),
            },
        ]),
        ..Default::default()
    };

    let estimate = api.create_estimate(input).await.unwrap();

    // 空名与非正数量的行被丢弃,只剩有效行
    assert_eq!(estimate.lines.len(), 1);
    assert_close(estimate.lines[0].line_total, 12.0, "carpet 1.2 × 10");
}

#[tokio::test]
async fn test_margin_computed_at_creation_when_priced() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path).unwrap();
    let api = build_api(&conn, vec![Box::new(StaticReferenceTier::new())]);

    let estimate = api.create_estimate(pvc_input(Some(60.0))).await.unwrap();

    // (60 − 40.92) / 60 = 31.8%
    assert_eq!(estimate.selling_price, Some(60.0));
    assert_eq!(estimate.margin, Some(31.8));
}

#[tokio::test]
async fn test_update_selling_price_preserves_cost_fields() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path).unwrap();
    let api = build_api(&conn, vec![Box::new(StaticReferenceTier::new())]);

    let created = api.create_estimate(pvc_input(None)).await.unwrap();
    let updated = api.update_selling_price(&created.id, 60.0).unwrap();

    assert_eq!(updated.selling_price, Some(60.0));
    assert_eq!(updated.margin, Some(31.8));

    // 成本字段创建后不可变
    assert_close(updated.material_cost, created.material_cost, "material_cost");
    assert_close(updated.labour_cost, created.labour_cost, "labour_cost");
    assert_close(updated.overhead_cost, created.overhead_cost, "overhead_cost");
    assert_close(
        updated.total_cost_price,
        created.total_cost_price,
        "total_cost_price",
    );
    assert_eq!(updated.confidence_score, created.confidence_score);

    // 回读一致
    let fetched = api.get_estimate(&created.id).unwrap();
    assert_eq!(fetched.margin, Some(31.8));
    assert_eq!(fetched.lines.len(), 1);
}

#[tokio::test]
async fn test_update_missing_estimate_returns_not_found() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path).unwrap();
    let api = build_api(&conn, vec![]);

    let result = api.update_selling_price("no-such-id", 100.0);
    assert!(matches!(result, Err(ApiError::NotFound { .. })));
}

#[tokio::test]
async fn test_input_validation() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path).unwrap();
    let api = build_api(&conn, vec![]);

    let empty_title = CostEstimateInput {
        title: "  ".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        api.create_estimate(empty_title).await,
        Err(ApiError::InvalidInput(_))
    ));

    assert!(matches!(
        api.resolve_price("", "kg").await,
        Err(ApiError::InvalidInput(_))
    ));

    let created = api
        .create_estimate(CostEstimateInput {
            title: "校验".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(matches!(
        api.update_selling_price(&created.id, 0.0),
        Err(ApiError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_list_estimates_includes_line_count() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path).unwrap();
    let api = build_api(&conn, vec![Box::new(StaticReferenceTier::new())]);

    api.create_estimate(pvc_input(Some(60.0))).await.unwrap();

    let summaries = api.list_estimates().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].line_count, 1);
    assert_eq!(summaries[0].confidence_score, 75);
    assert_eq!(summaries[0].margin, Some(31.8));
}
