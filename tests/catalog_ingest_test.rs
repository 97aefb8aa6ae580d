// ==========================================
// 价格目录 API 集成测试
// ==========================================
// 测试目标: 验证人工录入、批量提取的幂等性与目录浏览
// 覆盖范围: source_ref 幂等重放 / 物料去重 / 逐行容错 / 搜索
// ==========================================


use cost_intelligence::api::catalog_api::ManualPriceOptions;
use cost_intelligence::api::error::ApiError;
use cost_intelligence::api::CatalogApi;
use cost_intelligence::domain::material::IngestRow;
use cost_intelligence::domain::types::PriceSource;
use cost_intelligence::repository::catalog_repo::CatalogRepository;
use std::sync::Arc;
use test_helpers::{create_test_db, shared_connection};

fn build_api(db_path: &str) -> (CatalogApi, Arc<CatalogRepository>) {
    let conn = shared_connection(db_path).unwrap();
    let catalog = Arc::new(CatalogRepository::from_connection(conn));
    (CatalogApi::new(catalog.clone()), catalog)
}

fn row(description: &str, unit_price: f64, source_ref: &str) -> IngestRow {
    IngestRow {
        description: description.to_string(),
        unit_price,
        vendor_name: Some("Muscat Trading".to_string()),
        source_ref: source_ref.to_string(),
    }
}

#[test]
fn test_add_manual_price() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (api, catalog) = build_api(&db_path);

    let observation = api
        .add_manual_price(
            "Aluminium sheet 2mm",
            "sqm",
            8.5,
            ManualPriceOptions {
                vendor_name: Some("Gulf Metals".to_string()),
                category: Some("metal".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(observation.source, PriceSource::Manual);
    assert_eq!(observation.unit_price, 8.5);
    assert_eq!(observation.currency, "OMR");
    // 人工录入默认满置信度,且不过期
    assert_eq!(observation.confidence, 1.0);
    assert!(observation.expires_at.is_none());

    let material = catalog
        .find_material_exact("aluminium sheet 2mm")
        .unwrap()
        .expect("物料应已创建");
    assert_eq!(material.category.as_deref(), Some("metal"));
}

#[test]
fn test_manual_price_validation() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (api, _) = build_api(&db_path);

    assert!(matches!(
        api.add_manual_price("", "kg", 1.0, ManualPriceOptions::default()),
        Err(ApiError::InvalidInput(_))
    ));
    assert!(matches!(
        api.add_manual_price("rope", "metre", 0.0, ManualPriceOptions::default()),
        Err(ApiError::InvalidInput(_))
    ));
}

#[test]
fn test_ingest_batch_with_invalid_rows() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (api, _) = build_api(&db_path);

    let rows = vec![
        row("Steel pipe 2in", 3.4, "PO:1001:1"),
        row("Nylon rope 10mm", 0.55, "PO:1001:2"),
        row("   ", 9.9, "PO:1001:3"),
        row("Zinc coating", 0.0, "PO:1001:4"),
    ];

    let summary = api
        .ingest_observations(PriceSource::VendorPo, &rows, "piece")
        .unwrap();

    assert_eq!(summary.lines_processed, 4);
    assert_eq!(summary.observations_inserted, 2);
    assert_eq!(summary.materials_created, 2);
    // 空描述与非正单价的行跳过
    assert_eq!(summary.skipped, 2);
    assert!(summary.errors.is_empty());
}

#[test]
fn test_ingest_replay_is_idempotent() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (api, catalog) = build_api(&db_path);

    let rows = vec![
        row("Steel pipe 2in", 3.4, "PO:1001:1"),
        row("Nylon rope 10mm", 0.55, "PO:1001:2"),
    ];

    let first = api
        .ingest_observations(PriceSource::VendorPo, &rows, "piece")
        .unwrap();
    assert_eq!(first.observations_inserted, 2);

    // 整批重放: 不产生重复观测
    let replay = api
        .ingest_observations(PriceSource::VendorPo, &rows, "piece")
        .unwrap();
    assert_eq!(replay.observations_inserted, 0);
    assert_eq!(replay.materials_created, 0);
    assert_eq!(replay.skipped, 2);

    let material = catalog.find_material_exact("Steel pipe 2in").unwrap().unwrap();
    let observations = catalog.observations_for(&material.id, false, 10).unwrap();
    assert_eq!(observations.len(), 1);
}

#[test]
fn test_ingest_dedupes_material_by_normalized_name() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (api, catalog) = build_api(&db_path);

    // 同一物料的两次采购,source_ref 不同
    let rows = vec![
        row("MDF Board 18mm", 4.5, "PO:2001:1"),
        row("  mdf board 18MM ", 4.8, "PO:2002:3"),
    ];

    let summary = api
        .ingest_observations(PriceSource::CostSheet, &rows, "sheet")
        .unwrap();

    assert_eq!(summary.observations_inserted, 2);
    // 规范化同名,只建一个物料
    assert_eq!(summary.materials_created, 1);

    let material = catalog.find_material_exact("mdf board 18mm").unwrap().unwrap();
    let observations = catalog.observations_for(&material.id, false, 10).unwrap();
    assert_eq!(observations.len(), 2);
    // COST_SHEET 提取观测携带固定置信度
    assert!(observations.iter().all(|o| o.confidence == 0.8));
}

#[test]
fn test_ingest_rejects_non_extraction_sources() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (api, _) = build_api(&db_path);

    let rows = vec![row("rope", 1.0, "X:1")];
    assert!(matches!(
        api.ingest_observations(PriceSource::Manual, &rows, "piece"),
        Err(ApiError::InvalidInput(_))
    ));
    assert!(matches!(
        api.ingest_observations(PriceSource::Online, &rows, "piece"),
        Err(ApiError::InvalidInput(_))
    ));
}

#[test]
fn test_vendor_po_confidence() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (api, catalog) = build_api(&db_path);

    api.ingest_observations(
        PriceSource::VendorPo,
        &[row("Copper cable 4mm", 2.1, "PO:3001:1")],
        "metre",
    )
    .unwrap();

    let material = catalog
        .find_material_exact("copper cable 4mm")
        .unwrap()
        .unwrap();
    let observations = catalog.observations_for(&material.id, false, 10).unwrap();
    assert_eq!(observations[0].confidence, 0.9);
    assert_eq!(observations[0].source, PriceSource::VendorPo);
    assert_eq!(observations[0].source_ref.as_deref(), Some("PO:3001:1"));
}

#[test]
fn test_list_materials_with_search() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let (api, _) = build_api(&db_path);

    api.add_manual_price("PVC fabric 510gsm", "sqm", 1.9, ManualPriceOptions::default())
        .unwrap();
    api.add_manual_price("Mesh banner", "sqm", 2.2, ManualPriceOptions::default())
        .unwrap();
    api.add_manual_price("PVC pipe 2in", "metre", 0.8, ManualPriceOptions::default())
        .unwrap();

    let all = api.list_materials(None).unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|m| m.observation_count == 1));
    assert!(all.iter().all(|m| m.latest_prices.len() == 1));

    let pvc = api.list_materials(Some("pvc")).unwrap();
    assert_eq!(pvc.len(), 2);

    let none = api.list_materials(Some("granite")).unwrap();
    assert!(none.is_empty());
}
