// ==========================================
// 纺织品库存台账系统 - 导入接口
// ==========================================
// 职责: 定义导入管道各阶段接口（不包含实现）
// 流程: 解析 → 映射 → 清洗 → 去重分类 → 落库 → 图片转存
// ==========================================

use crate::domain::import::{DedupReport, MergedRow, SourceFilter, SourceRow};
use crate::importer::bulk_paste::{PastePreview, PasteRow};
use crate::importer::error::ImportResult;
use crate::importer::image_transfer::ImageTransferReport;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解析接口（阶段 0）
// 实现者: CsvParser, ExcelParser
pub trait FileParser: Send + Sync {
    /// 解析文件为原始行记录（HashMap<列名, 值>），跳过全空行
    fn parse_to_raw_records(&self, file_path: &Path) -> ImportResult<Vec<HashMap<String, String>>>;

    /// 解析文件为原始单元格行（不区分表头）
    fn parse_to_rows(&self, file_path: &Path) -> ImportResult<Vec<Vec<String>>>;
}

// ==========================================
// FieldMapper Trait
// ==========================================
// 用途: 原始行 → 来源行（阶段 1）
// 实现者: SourceFieldMapper
pub trait FieldMapper: Send + Sync {
    /// # 参数
    /// - row: 原始行记录
    /// - row_number: 行号（从 1 开始，用于日志）
    fn map_to_source_row(
        &self,
        row: &HashMap<String, String>,
        row_number: usize,
    ) -> ImportResult<SourceRow>;
}

// ==========================================
// DataCleaner Trait
// ==========================================
// 用途: 文本/日期清洗（阶段 2）
pub trait DataCleaner: Send + Sync {
    /// TRIM + 空白折叠
    fn clean_text(&self, value: &str) -> String;

    /// 空字符串 → None
    fn normalize_null(&self, value: Option<String>) -> Option<String>;

    /// 多格式日期解析（含 Excel 序列号）
    fn parse_date(&self, value: &str) -> Option<NaiveDate>;
}

// ==========================================
// 导入汇总
// ==========================================

/// 单行落库失败
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowFailure {
    /// 目录显示（名称 + 色号）
    pub label: String,
    pub message: String,
}

/// 目录导入汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogImportSummary {
    pub inserted: usize,
    /// 应用时已存在（或本批重复）而跳过
    pub skipped: usize,
    pub failed: Vec<RowFailure>,
    /// 新建商品 id（按输入顺序）
    pub inserted_ids: Vec<String>,
    pub images: ImageTransferReport,
}

/// 来源预览
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePreview {
    /// 映射后的来源行数（过滤前）
    pub total_rows: usize,
    /// 过滤后参与去重的行数
    pub filtered_rows: usize,
    pub report: DedupReport,
}

// ==========================================
// CatalogImporter Trait
// ==========================================
// 用途: 目录导入主接口
// 实现者: CatalogImporterImpl
#[async_trait]
pub trait CatalogImporter: Send + Sync {
    /// 文件 → 来源行 → 过滤 → 去重分类
    async fn preview_source_file(
        &self,
        file_path: &Path,
        filter: &SourceFilter,
        today: NaiveDate,
    ) -> ImportResult<SourcePreview>;

    /// 已获取的来源行 → 过滤 → 去重分类
    async fn preview_source_rows(
        &self,
        rows: Vec<SourceRow>,
        filter: &SourceFilter,
        today: NaiveDate,
    ) -> ImportResult<SourcePreview>;

    /// 导入选中的合并行（应用时重新校验目录键），随后执行图片转存
    async fn apply_source(&self, selected: Vec<MergedRow>) -> ImportResult<CatalogImportSummary>;

    /// 批量粘贴预览
    async fn preview_paste(&self, rows: Vec<PasteRow>) -> ImportResult<PastePreview>;

    /// 批量粘贴导入（只插入新行）
    async fn apply_paste(&self, rows: Vec<PasteRow>) -> ImportResult<CatalogImportSummary>;
}
