// ==========================================
// 纺织品库存台账系统 - 目录导入器实现
// ==========================================
// 职责: 整合导入流程，从文件/粘贴到商品目录
// 流程: 解析 → 映射 → 过滤 → 去重分类 → 应用时复核 → 落库 → 图片转存
// 红线: 目录导入为尽力而为（批量失败回退逐行）；图片失败不影响商品
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::import::{CatalogMapping, MergedRow, SourceFilter, SourceRow};
use crate::domain::item::{CatalogKey, Item, NewItem};
use crate::engine::ImportMatcher;
use crate::importer::bulk_paste::{BulkPasteParser, PastePreview, PasteRow, PasteStatus};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::SourceFieldMapper;
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::image_transfer::{ImageJob, ImageStore, ImageTransfer};
use crate::importer::import_trait::{
    CatalogImportSummary, CatalogImporter, FieldMapper, FileParser, RowFailure, SourcePreview,
};
use crate::repository::ItemRepository;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

// ==========================================
// CatalogImporterImpl - 目录导入器
// ==========================================
pub struct CatalogImporterImpl<C>
where
    C: ImportConfigReader,
{
    // 数据访问层
    item_repo: Arc<ItemRepository>,

    // 配置读取器
    config: Arc<C>,

    // 导入组件
    file_parser: Box<dyn FileParser>,
    field_mapper: Box<dyn FieldMapper>,
    image_store: Arc<dyn ImageStore>,
}

impl<C> CatalogImporterImpl<C>
where
    C: ImportConfigReader,
{
    /// 使用默认解析器/映射器创建
    pub fn new(item_repo: Arc<ItemRepository>, config: Arc<C>, image_store: Arc<dyn ImageStore>) -> Self {
        Self::with_components(
            item_repo,
            config,
            Box::new(UniversalFileParser),
            Box::new(SourceFieldMapper::new()),
            image_store,
        )
    }

    pub fn with_components(
        item_repo: Arc<ItemRepository>,
        config: Arc<C>,
        file_parser: Box<dyn FileParser>,
        field_mapper: Box<dyn FieldMapper>,
        image_store: Arc<dyn ImageStore>,
    ) -> Self {
        Self {
            item_repo,
            config,
            file_parser,
            field_mapper,
            image_store,
        }
    }

    async fn mapping(&self) -> ImportResult<CatalogMapping> {
        self.config
            .get_catalog_mapping()
            .await
            .map_err(|e| ImportError::ConfigReadError(e.to_string()))
    }

    /// 尽力插入：先整批事务，失败后逐行
    ///
    /// # 返回
    /// - (已插入商品及其图片来源, 失败行)
    fn insert_best_effort(
        &self,
        candidates: Vec<NewItem>,
    ) -> (Vec<(Item, Option<String>)>, Vec<RowFailure>) {
        let now = Utc::now();
        let prepared: Vec<(Item, Option<String>)> = candidates
            .into_iter()
            .map(|c| {
                let source = c.image_source.clone();
                (c.into_item(Uuid::new_v4().to_string(), now), source)
            })
            .collect();
        if prepared.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let items: Vec<Item> = prepared.iter().map(|(item, _)| item.clone()).collect();
        match self.item_repo.insert_batch(&items) {
            Ok(_) => return (prepared, Vec::new()),
            Err(e) => warn!(count = items.len(), error = %e, "批量插入失败，改为逐行插入"),
        }

        let mut inserted = Vec::new();
        let mut failures = Vec::new();
        for (item, source) in prepared {
            match self.item_repo.insert(&item) {
                Ok(()) => inserted.push((item, source)),
                Err(e) => {
                    warn!(item = %item.display_label(), error = %e, "商品插入失败");
                    failures.push(RowFailure {
                        label: item.display_label(),
                        message: e.explain(),
                    });
                }
            }
        }
        (inserted, failures)
    }

    /// 落库后的图片步骤
    async fn transfer_images(
        &self,
        inserted: &[(Item, Option<String>)],
    ) -> ImportResult<crate::importer::image_transfer::ImageTransferReport> {
        let jobs: Vec<ImageJob> = inserted
            .iter()
            .filter_map(|(item, source)| {
                source.as_ref().map(|s| ImageJob {
                    item_id: item.item_id.clone(),
                    source: s.clone(),
                })
            })
            .collect();

        let attempts = self
            .config
            .get_image_retry_attempts()
            .await
            .map_err(|e| ImportError::ConfigReadError(e.to_string()))?;
        let mut report = ImageTransfer::new(self.image_store.clone(), attempts)
            .run(&jobs)
            .await;

        for (item_id, path) in report.stored.clone() {
            if let Err(e) = self.item_repo.set_image_path(&item_id, Some(&path)) {
                warn!(item_id = %item_id, error = %e, "image_path 回写失败");
                report.demote(&item_id, e.explain());
            }
        }
        Ok(report)
    }

    async fn finish(
        &self,
        inserted: Vec<(Item, Option<String>)>,
        failed: Vec<RowFailure>,
        skipped: usize,
    ) -> ImportResult<CatalogImportSummary> {
        let images = self.transfer_images(&inserted).await?;
        let summary = CatalogImportSummary {
            inserted: inserted.len(),
            skipped,
            failed,
            inserted_ids: inserted.iter().map(|(item, _)| item.item_id.clone()).collect(),
            images,
        };
        info!(
            inserted = summary.inserted,
            skipped = summary.skipped,
            failed = summary.failed.len(),
            img_ok = summary.images.ok,
            img_fail = summary.images.failed,
            "目录导入完成"
        );
        Ok(summary)
    }
}

#[async_trait]
impl<C> CatalogImporter for CatalogImporterImpl<C>
where
    C: ImportConfigReader + Send + Sync,
{
    #[instrument(skip(self, filter), fields(file = %file_path.display()))]
    async fn preview_source_file(
        &self,
        file_path: &Path,
        filter: &SourceFilter,
        today: NaiveDate,
    ) -> ImportResult<SourcePreview> {
        let raw_rows = self.file_parser.parse_to_raw_records(file_path)?;
        info!(total_rows = raw_rows.len(), "文件解析完成");

        let mut rows = Vec::with_capacity(raw_rows.len());
        for (idx, raw) in raw_rows.iter().enumerate() {
            match self.field_mapper.map_to_source_row(raw, idx + 1) {
                Ok(row) => rows.push(row),
                Err(e) => warn!(row_number = idx + 1, error = %e, "字段映射失败"),
            }
        }

        self.preview_source_rows(rows, filter, today).await
    }

    async fn preview_source_rows(
        &self,
        rows: Vec<SourceRow>,
        filter: &SourceFilter,
        today: NaiveDate,
    ) -> ImportResult<SourcePreview> {
        let matcher = ImportMatcher::new(self.mapping().await?);
        let total_rows = rows.len();
        let filtered = matcher.filter_rows(rows, filter, today);
        let existing = self.item_repo.list_catalog_keys()?;
        let report = matcher.dedupe_and_classify(&filtered, &existing);

        info!(
            total_rows,
            filtered_rows = filtered.len(),
            merged = report.merged.len(),
            new_count = report.new_count,
            existing_count = report.existing_count,
            incomplete_count = report.incomplete_count,
            "来源预览完成"
        );
        Ok(SourcePreview {
            total_rows,
            filtered_rows: filtered.len(),
            report,
        })
    }

    #[instrument(skip(self, selected), fields(selected = selected.len()))]
    async fn apply_source(&self, selected: Vec<MergedRow>) -> ImportResult<CatalogImportSummary> {
        let mapping = self.mapping().await?;
        // 应用时重新获取目录键，避免预览后新增的重复
        let mut existing: HashSet<CatalogKey> = self.item_repo.list_catalog_keys()?;

        let mut candidates = Vec::new();
        let mut skipped = 0;
        for row in &selected {
            if row.key.is_none() {
                skipped += 1;
                continue;
            }
            let candidate = mapping.candidate(row);
            if !existing.insert(candidate.catalog_key()) {
                skipped += 1;
                continue;
            }
            candidates.push(candidate);
        }

        let (inserted, failed) = self.insert_best_effort(candidates);
        self.finish(inserted, failed, skipped).await
    }

    async fn preview_paste(&self, rows: Vec<PasteRow>) -> ImportResult<PastePreview> {
        let existing = self.item_repo.list_catalog_keys()?;
        Ok(BulkPasteParser::classify(rows, &existing))
    }

    #[instrument(skip(self, rows), fields(lines = rows.len()))]
    async fn apply_paste(&self, rows: Vec<PasteRow>) -> ImportResult<CatalogImportSummary> {
        let existing = self.item_repo.list_catalog_keys()?;
        let preview = BulkPasteParser::classify(rows, &existing);

        let mut failed: Vec<RowFailure> = preview
            .rows
            .iter()
            .filter(|r| r.status == PasteStatus::Invalid)
            .map(|r| RowFailure {
                label: format!("#{} {}", r.line, r.raw),
                message: r.message.clone().unwrap_or_default(),
            })
            .collect();

        let (inserted, insert_failures) = self.insert_best_effort(preview.new_items());
        failed.extend(insert_failures);
        self.finish(inserted, failed, preview.existing_count).await
    }
}
