// ==========================================
// 纺织品库存台账系统 - 来源表导入 API
// ==========================================
// 职责: 印花来源表预览（去重分类）与选中行导入
// 说明: 预览结果由调用方持有，应用时只传选中的来源键
// ==========================================

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument};

use crate::api::catalog_api::{summary_message, CatalogImportResponse};
use crate::api::error::{config_error, ApiError, ApiResult};
use crate::config::{ConfigManager, ImportConfigReader};
use crate::domain::import::{DedupReport, MergedRow, SourceFilter, SourceKey, SourceRow};
use crate::engine::ImportMatcher;
use crate::importer::{CatalogImporter, CatalogImporterImpl, SourcePreview};

/// 导入API
pub struct ImportApi {
    importer: Arc<CatalogImporterImpl<ConfigManager>>,
    config: Arc<ConfigManager>,
}

impl ImportApi {
    pub fn new(importer: Arc<CatalogImporterImpl<ConfigManager>>, config: Arc<ConfigManager>) -> Self {
        Self { importer, config }
    }

    /// 预览来源文件（.csv / .xlsx / .xls）
    ///
    /// # 参数
    /// - file_path: 文件路径
    /// - filter: 去重前的预筛选（最近 N 天 / 状态 / 文本）
    /// - today: "最近 N 天"的基准日
    pub async fn preview_file(
        &self,
        file_path: &str,
        filter: &SourceFilter,
        today: NaiveDate,
    ) -> ApiResult<SourcePreview> {
        let path = Path::new(file_path);
        if !path.exists() {
            return Err(ApiError::NotFound(format!("文件不存在: {}", file_path)));
        }
        Ok(self.importer.preview_source_file(path, filter, today).await?)
    }

    /// 预览已取得的来源行
    pub async fn preview_rows(
        &self,
        rows: Vec<SourceRow>,
        filter: &SourceFilter,
        today: NaiveDate,
    ) -> ApiResult<SourcePreview> {
        Ok(self.importer.preview_source_rows(rows, filter, today).await?)
    }

    /// 导入选中的新行
    ///
    /// # 参数
    /// - report: 预览得到的去重报告
    /// - selected: 选中的来源键（已存在/不完整的行会被忽略）
    #[instrument(skip(self, report, selected), fields(selected = selected.len()))]
    pub async fn apply(
        &self,
        report: &DedupReport,
        selected: &HashSet<SourceKey>,
    ) -> ApiResult<CatalogImportResponse> {
        if selected.is_empty() {
            return Err(ApiError::InvalidInput("没有选中任何行".to_string()));
        }

        let mapping = self
            .config
            .get_catalog_mapping()
            .await
            .map_err(config_error)?;
        let rows: Vec<MergedRow> = ImportMatcher::new(mapping)
            .select_new(report, selected)
            .into_iter()
            .cloned()
            .collect();
        info!(rows = rows.len(), "开始导入选中行");

        let summary = self.importer.apply_source(rows).await?;
        Ok(CatalogImportResponse {
            message: summary_message(&summary),
            summary,
        })
    }
}
