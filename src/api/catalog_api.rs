// ==========================================
// 纺织品库存台账系统 - 商品目录 API
// ==========================================
// 职责: 商品增改停删 / 搜索 / 色名补全 / 批量粘贴导入
// 规则: (商品名, 色号) 规范化后唯一；被流水引用的商品不可硬删除
// ==========================================

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::stock_api::filter_items;
use crate::config::ConfigManager;
use crate::domain::item::{Item, ItemPatch, NewItem};
use crate::i18n;
use crate::importer::{
    BulkPasteParser, CatalogImportSummary, CatalogImporter, CatalogImporterImpl, FileParser,
    PastePreview, UniversalFileParser,
};
use crate::repository::ItemRepository;

/// 色名补全的一项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorNameUpdate {
    pub item_id: String,
    pub color_name: String,
}

/// 批量导入结果 + 面向操作员的汇总文字
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogImportResponse {
    pub summary: CatalogImportSummary,
    pub message: String,
}

// ==========================================
// CatalogApi - 商品目录 API
// ==========================================
pub struct CatalogApi {
    item_repo: Arc<ItemRepository>,
    importer: Arc<CatalogImporterImpl<ConfigManager>>,
}

impl CatalogApi {
    pub fn new(
        item_repo: Arc<ItemRepository>,
        importer: Arc<CatalogImporterImpl<ConfigManager>>,
    ) -> Self {
        Self { item_repo, importer }
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 商品列表（大类 → 小类 → 名称 → 色号）
    pub fn list_items(&self, active_only: bool, search: Option<&str>) -> ApiResult<Vec<Item>> {
        Ok(filter_items(self.item_repo.list(active_only)?, search))
    }

    pub fn get_item(&self, item_id: &str) -> ApiResult<Item> {
        self.item_repo
            .find_by_id(item_id)?
            .ok_or_else(|| ApiError::NotFound(format!("商品(id={})不存在", item_id)))
    }

    pub fn list_main_categories(&self) -> ApiResult<Vec<String>> {
        Ok(self.item_repo.list_main_categories()?)
    }

    // ==========================================
    // 增改停删
    // ==========================================

    /// 新建商品
    ///
    /// # 返回
    /// - Err(DuplicateItem): 同名同色号已存在
    #[instrument(skip(self, input))]
    pub fn create_item(&self, input: NewItem) -> ApiResult<Item> {
        let input = input.cleaned();
        require_key_fields(&input.item_name, &input.color_code)?;
        self.ensure_unique(&input.catalog_key(), None)?;

        let item = input.into_item(Uuid::new_v4().to_string(), Utc::now());
        self.item_repo.insert(&item)?;
        info!(item_id = %item.item_id, item = %item.display_label(), "商品已创建");
        Ok(item)
    }

    /// 修改商品（不含图片路径）
    pub fn update_item(&self, item_id: &str, patch: &ItemPatch) -> ApiResult<Item> {
        let mut item = self.get_item(item_id)?;
        let before = item.catalog_key();
        patch.apply_to(&mut item, Utc::now());
        require_key_fields(&item.item_name, &item.color_code)?;

        let after = item.catalog_key();
        if after != before {
            self.ensure_unique(&after, Some(item_id))?;
        }
        self.item_repo.update(&item)?;
        Ok(item)
    }

    /// 启用 / 停用
    pub fn set_active(&self, item_id: &str, active: bool) -> ApiResult<()> {
        self.item_repo.set_active(item_id, active)?;
        info!(item_id = %item_id, active, "商品状态已切换");
        Ok(())
    }

    /// 硬删除
    ///
    /// # 返回
    /// - Ok(Some(path)): 删除成功，返回原图片路径供调用方清理
    /// - Err(ItemInUse): 已有流水引用
    pub fn delete_item(&self, item_id: &str) -> ApiResult<Option<String>> {
        let item = self.get_item(item_id)?;
        let movements = self.item_repo.count_movements(item_id)?;
        if movements > 0 {
            return Err(ApiError::ItemInUse {
                item: item.display_label(),
                movements,
            });
        }

        match self.item_repo.delete(item_id) {
            Ok(()) => {
                info!(item_id = %item_id, "商品已删除");
                Ok(item.image_path)
            }
            // 盘点行等其他引用
            Err(e) if e.is_foreign_key() => Err(ApiError::ItemInUse {
                item: item.display_label(),
                movements,
            }),
            Err(e) => Err(e.into()),
        }
    }

    // ==========================================
    // 色名补全
    // ==========================================

    pub fn list_missing_color_names(&self, main_category: Option<&str>) -> ApiResult<Vec<Item>> {
        Ok(self.item_repo.list_missing_color_names(main_category)?)
    }

    /// 批量写入色名（单事务，空白项忽略）
    pub fn apply_color_names(&self, updates: &[ColorNameUpdate]) -> ApiResult<usize> {
        let pairs: Vec<(String, String)> = updates
            .iter()
            .map(|u| (u.item_id.clone(), u.color_name.clone()))
            .collect();
        let n = self.item_repo.update_color_names(&pairs)?;
        info!(updated = n, "色名已补全");
        Ok(n)
    }

    // ==========================================
    // 批量粘贴
    // ==========================================

    pub async fn preview_bulk_paste(&self, text: &str) -> ApiResult<PastePreview> {
        Ok(self
            .importer
            .preview_paste(BulkPasteParser::parse_text(text))
            .await?)
    }

    /// 表格文件（首行为表头）按粘贴格式预览
    pub async fn preview_bulk_sheet(&self, file_path: &Path) -> ApiResult<PastePreview> {
        let rows = UniversalFileParser.parse_to_rows(file_path)?;
        Ok(self
            .importer
            .preview_paste(BulkPasteParser::parse_sheet_rows(rows))
            .await?)
    }

    /// 应用粘贴：重新比对目录后只插入新行
    pub async fn apply_bulk_paste(&self, text: &str) -> ApiResult<CatalogImportResponse> {
        let summary = self
            .importer
            .apply_paste(BulkPasteParser::parse_text(text))
            .await?;
        Ok(CatalogImportResponse {
            message: summary_message(&summary),
            summary,
        })
    }

    fn ensure_unique(
        &self,
        key: &crate::domain::item::CatalogKey,
        exclude_id: Option<&str>,
    ) -> ApiResult<()> {
        let clash = self
            .item_repo
            .list(false)?
            .into_iter()
            .find(|i| i.catalog_key() == *key && Some(i.item_id.as_str()) != exclude_id);
        match clash {
            Some(existing) => Err(ApiError::DuplicateItem(existing.display_label())),
            None => Ok(()),
        }
    }
}

fn require_key_fields(item_name: &str, color_code: &str) -> ApiResult<()> {
    if item_name.is_empty() || color_code.is_empty() {
        return Err(ApiError::InvalidInput("商品名和色号不能为空".to_string()));
    }
    Ok(())
}

/// 导入汇总文字（本地化）
pub(crate) fn summary_message(summary: &CatalogImportSummary) -> String {
    i18n::t_with_args(
        "import.summary",
        &[
            ("inserted", summary.inserted.to_string().as_str()),
            ("skipped", summary.skipped.to_string().as_str()),
            ("failed", summary.failed.len().to_string().as_str()),
            ("img_ok", summary.images.ok.to_string().as_str()),
            ("img_fail", summary.images.failed.to_string().as_str()),
        ],
    )
}
