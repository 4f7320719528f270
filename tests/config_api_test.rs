// ==========================================
// ConfigApi 集成测试
// ==========================================
// 测试范围:
// 1. 配置查询: list_configs（含默认值）
// 2. 配置更新: update_config（值格式校验）
// 3. 配置快照: get_config_snapshot
// 4. 配置对业务的影响: 调整流水备注、导入映射
// ==========================================


use std::collections::HashSet;

use rust_decimal_macros::dec;
use test_helpers::*;
use textile_stock::api::{ApiError, MovementQuery};
use textile_stock::config::config_keys;
use textile_stock::domain::{CountEntry, SourceFilter, SourceKey, SourceRow};
use textile_stock::{MovementKind, UnitKind};

#[test]
fn test_list_configs_初始状态() {
    let env = TestEnv::new().unwrap();
    let configs = env.state.config_api.list_configs().unwrap();

    assert_eq!(configs.len(), 10);
    assert!(configs.iter().all(|c| c.is_default));
    let stale = configs
        .iter()
        .find(|c| c.key == config_keys::STALE_DAYS_THRESHOLD)
        .unwrap();
    assert_eq!(stale.value, "30");
}

#[test]
fn test_update_config_成功与快照() {
    let env = TestEnv::new().unwrap();
    let api = &env.state.config_api;

    api.update_config(config_keys::ATTENTION_DAYS_THRESHOLD, "5")
        .unwrap();
    let configs = api.list_configs().unwrap();
    let attention = configs
        .iter()
        .find(|c| c.key == config_keys::ATTENTION_DAYS_THRESHOLD)
        .unwrap();
    assert_eq!(attention.value, "5");
    assert!(!attention.is_default);

    let snapshot: serde_json::Value =
        serde_json::from_str(&api.get_config_snapshot().unwrap()).unwrap();
    assert_eq!(snapshot[config_keys::ATTENTION_DAYS_THRESHOLD], "5");
}

#[test]
fn test_update_config_非法值() {
    let env = TestEnv::new().unwrap();
    let api = &env.state.config_api;

    assert!(matches!(
        api.update_config(config_keys::QUERY_CHUNK_SIZE, "0"),
        Err(ApiError::InvalidInput(_))
    ));
    assert!(api.update_config(config_keys::BOOK_CHECK, "ALWAYS").is_err());
    assert!(api.update_config("unknown_key", "1").is_err());
    assert!(api.list_configs().unwrap().iter().all(|c| c.is_default));
}

#[test]
fn test_adjustment_note_from_config() {
    let env = TestEnv::new().unwrap();
    env.state
        .config_api
        .update_config(config_keys::ADJUSTMENT_NOTE, "جرد نهاية السنة")
        .unwrap();
    let item = env.create_item("رسمة 1", "1");
    env.purchase(&item, date(2026, 1, 1), dec!(5), 5);

    let api = &env.state.reconciliation_api;
    let snapshot = api.load_sheet(true).unwrap();
    let entries = vec![CountEntry::new(&item.item_id, Some(dec!(4)), Some(dec!(5)))];
    api.commit(date(2026, 12, 31), None, &entries, &snapshot)
        .unwrap();

    let adjustments = env
        .state
        .movement_api
        .list(&MovementQuery {
            kind: Some(MovementKind::Adjustment),
            ..MovementQuery::default()
        })
        .unwrap();
    assert_eq!(
        adjustments[0].movement.note.as_deref(),
        Some("جرد نهاية السنة")
    );
}

#[tokio::test]
async fn test_import_mapping_from_config() {
    let env = TestEnv::new().unwrap();
    let config = &env.state.config_api;
    config
        .update_config(config_keys::IMPORT_DESIGN_NAME_PREFIX, "Design ")
        .unwrap();
    config
        .update_config(config_keys::IMPORT_DEFAULT_UNIT, "m")
        .unwrap();

    let rows = vec![SourceRow {
        quality: "Q".to_string(),
        design_code: "9".to_string(),
        mariage_code: "1".to_string(),
        status: None,
        date: None,
        image_url: None,
    }];
    let api = &env.state.import_api;
    let preview = api
        .preview_rows(rows, &SourceFilter::default(), date(2026, 1, 1))
        .await
        .unwrap();
    let selected: HashSet<SourceKey> = preview
        .report
        .merged
        .iter()
        .filter_map(|r| r.key.clone())
        .collect();
    let response = api.apply(&preview.report, &selected).await.unwrap();
    assert_eq!(response.summary.inserted, 1);

    let item = env
        .state
        .catalog_api
        .get_item(&response.summary.inserted_ids[0])
        .unwrap();
    assert_eq!(item.item_name, "Design 9");
    assert_eq!(item.unit, UnitKind::M);
}
