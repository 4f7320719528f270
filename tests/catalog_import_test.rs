// ==========================================
// 商品目录 / 导入 集成测试
// ==========================================
// 测试范围:
// 1. 新建去重、停用、硬删除保护、色名补全
// 2. 批量粘贴：预览分类、应用时重新比对
// 3. 印花来源表：文件预览去重、选中导入、图片步骤独立计数
// ==========================================


use std::collections::HashSet;
use std::io::Write;

use rust_decimal_macros::dec;
use test_helpers::*;
use textile_stock::api::{ApiError, ColorNameUpdate};
use textile_stock::domain::{ItemPatch, SourceFilter, SourceKey};
use textile_stock::importer::PasteStatus;
use textile_stock::{Classification, UnitKind};

// ==========================================
// 目录维护
// ==========================================

#[test]
fn test_create_item_cleans_and_rejects_duplicate() {
    let env = TestEnv::new().unwrap();
    let api = &env.state.catalog_api;

    let item = api
        .create_item(new_item(" قطن ", "رسمة  5", " ٠٧ ", UnitKind::M))
        .unwrap();
    assert_eq!(item.main_category, "قطن");
    assert_eq!(item.item_name, "رسمة 5");
    assert_eq!(item.color_code, "07");
    assert!(item.is_active);

    // 同名同色号（大小写/空白/数字写法不同）视为重复
    let err = api
        .create_item(new_item("حرير", "رسمة 5 ", "07", UnitKind::Kg))
        .unwrap_err();
    assert!(matches!(err, ApiError::DuplicateItem(_)), "{:?}", err);

    // 缺少色号
    assert!(api
        .create_item(new_item("قطن", "رسمة 6", "  ", UnitKind::Kg))
        .is_err());
}

#[test]
fn test_update_item_rejects_collision() {
    let env = TestEnv::new().unwrap();
    let a = env.create_item("رسمة 1", "1");
    let b = env.create_item("رسمة 2", "1");

    let api = &env.state.catalog_api;
    let err = api
        .update_item(
            &b.item_id,
            &ItemPatch {
                item_name: Some("رسمة 1".to_string()),
                ..ItemPatch::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::DuplicateItem(_)));

    let updated = api
        .update_item(
            &a.item_id,
            &ItemPatch {
                description: Some("ناعم".to_string()),
                ..ItemPatch::default()
            },
        )
        .unwrap();
    assert_eq!(updated.description.as_deref(), Some("ناعم"));
}

#[test]
fn test_delete_item_in_use_is_rejected() {
    let env = TestEnv::new().unwrap();
    let used = env.create_item("رسمة 1", "1");
    let unused = env.create_item("رسمة 2", "1");
    env.purchase(&used, date(2026, 1, 1), dec!(1), 1);

    let api = &env.state.catalog_api;
    match api.delete_item(&used.item_id).unwrap_err() {
        ApiError::ItemInUse { movements, .. } => assert_eq!(movements, 1),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(api.get_item(&used.item_id).is_ok());

    assert_eq!(api.delete_item(&unused.item_id).unwrap(), None);
    assert!(matches!(
        api.get_item(&unused.item_id),
        Err(ApiError::NotFound(_))
    ));
}

#[test]
fn test_list_items_search_and_active_filter() {
    let env = TestEnv::new().unwrap();
    let a = env.create_item("رسمة 1", "RED-1");
    let b = env.create_item("رسمة 2", "BLUE-2");
    env.state.catalog_api.set_active(&b.item_id, false).unwrap();

    let api = &env.state.catalog_api;
    assert_eq!(api.list_items(false, None).unwrap().len(), 2);
    assert_eq!(api.list_items(true, None).unwrap().len(), 1);

    let found = api.list_items(false, Some("red")).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].item_id, a.item_id);

    assert_eq!(api.list_main_categories().unwrap(), vec!["قطن".to_string()]);
}

#[test]
fn test_color_name_completion() {
    let env = TestEnv::new().unwrap();
    let a = env.create_item("رسمة 1", "1");
    let b = env.create_item("رسمة 1", "2");

    let api = &env.state.catalog_api;
    assert_eq!(api.list_missing_color_names(Some("قطن")).unwrap().len(), 2);

    let updated = api
        .apply_color_names(&[
            ColorNameUpdate {
                item_id: a.item_id.clone(),
                color_name: "أحمر".to_string(),
            },
            ColorNameUpdate {
                item_id: b.item_id.clone(),
                color_name: "   ".to_string(),
            },
        ])
        .unwrap();
    assert_eq!(updated, 1);

    let missing = api.list_missing_color_names(Some("قطن")).unwrap();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].item_id, b.item_id);
}

// ==========================================
// 批量粘贴
// ==========================================

#[tokio::test]
async fn test_bulk_paste_preview_and_apply() {
    let env = TestEnv::new().unwrap();
    env.create_item("رسمة 1", "1");

    let text = "\
قطن|سادة|رسمة 1|1|أحمر|kg
قطن|سادة|رسمة 2|1|أزرق|m|وصف
قطن|سادة|رسمة 2|1|أزرق|m

ناقص|سطر";

    let api = &env.state.catalog_api;
    let preview = api.preview_bulk_paste(text).await.unwrap();
    assert_eq!(preview.rows.len(), 4);
    assert_eq!(preview.rows[0].status, PasteStatus::Existing);
    assert_eq!(preview.rows[1].status, PasteStatus::New);
    assert_eq!(preview.rows[2].status, PasteStatus::DuplicateInBatch);
    assert_eq!(preview.rows[3].status, PasteStatus::Invalid);
    assert_eq!(preview.new_count, 1);
    assert_eq!(preview.existing_count, 2);
    assert_eq!(preview.invalid_count, 1);

    let response = api.apply_bulk_paste(text).await.unwrap();
    assert_eq!(response.summary.inserted, 1);
    assert_eq!(response.summary.skipped, 2);
    assert_eq!(response.summary.failed.len(), 1);
    assert!(!response.message.is_empty());

    let item = api.get_item(&response.summary.inserted_ids[0]).unwrap();
    assert_eq!(item.unit, UnitKind::M);
    assert_eq!(item.description.as_deref(), Some("وصف"));

    // 再次应用：全部已存在
    let again = api.apply_bulk_paste(text).await.unwrap();
    assert_eq!(again.summary.inserted, 0);
}

// ==========================================
// 印花来源表
// ==========================================

fn write_source_csv(env: &TestEnv, image_ok: &str) -> String {
    let path = env.dir().join("source.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "quality,design_code,mariage_number,status,date,image_url").unwrap();
    writeln!(file, "Q1,A,1,formed,2026-04-01,").unwrap();
    writeln!(file, " q1 , a ,1,received,2026-04-10,").unwrap();
    writeln!(file, "Q2,B,2,,2026-04-05,/no/such/image.jpg").unwrap();
    writeln!(file, "Q3,D,4,not yet formed,2026-04-06,{}", image_ok).unwrap();
    writeln!(file, ",C,3,,,").unwrap();
    path.to_str().unwrap().to_string()
}

#[tokio::test]
async fn test_source_preview_and_apply() {
    let env = TestEnv::new().unwrap();
    // 目录中已有 A/1 对应的商品
    env.create_item("رسمة A", "1");

    let image = env.dir().join("design-d.png");
    std::fs::write(&image, b"png").unwrap();
    let csv_path = write_source_csv(&env, image.to_str().unwrap());

    let api = &env.state.import_api;
    let today = date(2026, 4, 30);
    let preview = api
        .preview_file(&csv_path, &SourceFilter::default(), today)
        .await
        .unwrap();
    assert_eq!(preview.total_rows, 5);

    let report = &preview.report;
    assert_eq!(report.existing_count, 1);
    assert_eq!(report.new_count, 2);
    assert_eq!(report.incomplete_count, 1);

    let a = &report.merged[0];
    assert_eq!(a.count, 2);
    assert_eq!(a.last_date, Some(date(2026, 4, 10)));
    assert_eq!(a.last_status.as_deref(), Some("received"));
    assert_eq!(a.classification, Classification::Existing);

    // 全选（已存在/不完整行被忽略）
    let selected: HashSet<SourceKey> = report.merged.iter().filter_map(|r| r.key.clone()).collect();
    let response = api.apply(report, &selected).await.unwrap();
    let summary = &response.summary;
    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.skipped, 0);
    assert!(summary.failed.is_empty());
    assert_eq!(summary.images.ok, 1);
    assert_eq!(summary.images.failed, 1);

    // 图片失败不影响商品写入
    let catalog = env.state.catalog_api.list_items(false, None).unwrap();
    assert_eq!(catalog.len(), 3);
    let d = catalog.iter().find(|i| i.item_name == "رسمة D").unwrap();
    assert_eq!(d.main_category, "Q3");
    assert_eq!(d.sub_category, "مطبوع");
    let stored = d.image_path.as_deref().unwrap();
    assert!(stored.ends_with(".png"));
    assert!(env.dir().join("media").join(stored).exists());
    let b = catalog.iter().find(|i| i.item_name == "رسمة B").unwrap();
    assert!(b.image_path.is_none());

    // 同一份预览再次应用：应用时重新比对，全部跳过
    let again = api.apply(report, &selected).await.unwrap();
    assert_eq!(again.summary.inserted, 0);
    assert_eq!(again.summary.skipped, 2);
}

#[tokio::test]
async fn test_source_preview_days_filter() {
    let env = TestEnv::new().unwrap();
    let csv_path = write_source_csv(&env, "");

    let filter = SourceFilter {
        days_back: Some(22),
        ..SourceFilter::default()
    };
    let preview = env
        .state
        .import_api
        .preview_file(&csv_path, &filter, date(2026, 4, 30))
        .await
        .unwrap();
    // 只剩 2026-04-10 这一行；无日期行被丢弃
    assert_eq!(preview.filtered_rows, 1);
    assert_eq!(preview.report.merged.len(), 1);
    assert_eq!(preview.report.merged[0].count, 1);
}

#[tokio::test]
async fn test_source_apply_requires_selection_and_file() {
    let env = TestEnv::new().unwrap();
    let api = &env.state.import_api;

    let missing = api
        .preview_file("/no/such/source.csv", &SourceFilter::default(), date(2026, 4, 30))
        .await;
    assert!(matches!(missing, Err(ApiError::NotFound(_))));

    let csv_path = write_source_csv(&env, "");
    let preview = api
        .preview_file(&csv_path, &SourceFilter::default(), date(2026, 4, 30))
        .await
        .unwrap();
    let err = api.apply(&preview.report, &HashSet::new()).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
}
