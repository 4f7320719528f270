// ==========================================
// 纺织品库存台账系统 - 字段映射器实现
// ==========================================
// 职责: 来源列名（含别名）→ SourceRow
// 说明: 列名大小写/空白不敏感；日期无法解析时置空并告警
// ==========================================

use crate::domain::import::SourceRow;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::ImportResult;
use crate::importer::import_trait::{DataCleaner as DataCleanerTrait, FieldMapper};
use std::collections::HashMap;

const QUALITY_ALIASES: &[&str] = &["quality", "الجودة", "الخامة", "品质"];
const DESIGN_ALIASES: &[&str] = &["designcode", "design_code", "design", "رقم الرسمة", "الرسمة", "花号"];
const MARIAGE_ALIASES: &[&str] = &[
    "mariagenumber",
    "mariage_number",
    "mariage",
    "colorcode",
    "color_code",
    "رقم المارياج",
    "配色号",
];
const STATUS_ALIASES: &[&str] = &["status", "الحالة", "状态"];
const DATE_ALIASES: &[&str] = &["date", "التاريخ", "日期"];
const IMAGE_ALIASES: &[&str] = &["imageurl", "image_url", "image", "الصورة", "图片"];

pub struct SourceFieldMapper {
    cleaner: DataCleaner,
}

impl Default for SourceFieldMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceFieldMapper {
    pub fn new() -> Self {
        Self {
            cleaner: DataCleaner,
        }
    }

    /// 按别名取第一个非空值
    fn get_string(&self, row: &HashMap<String, String>, aliases: &[&str]) -> Option<String> {
        for (header, value) in row {
            let header = header.trim().to_lowercase();
            if aliases.iter().any(|a| *a == header) {
                if let Some(v) = self.cleaner.normalize_null(Some(value.clone())) {
                    return Some(v);
                }
            }
        }
        None
    }
}

impl FieldMapper for SourceFieldMapper {
    fn map_to_source_row(
        &self,
        row: &HashMap<String, String>,
        row_number: usize,
    ) -> ImportResult<SourceRow> {
        let date = match self.get_string(row, DATE_ALIASES) {
            None => None,
            Some(raw) => {
                let parsed = self.cleaner.parse_date(&raw);
                if parsed.is_none() {
                    tracing::warn!(row_number, raw_value = %raw, "日期无法解析，按无日期处理");
                }
                parsed
            }
        };

        Ok(SourceRow {
            quality: self.get_string(row, QUALITY_ALIASES).unwrap_or_default(),
            design_code: self.get_string(row, DESIGN_ALIASES).unwrap_or_default(),
            mariage_code: self.get_string(row, MARIAGE_ALIASES).unwrap_or_default(),
            status: self.get_string(row, STATUS_ALIASES),
            date,
            image_url: self.get_string(row, IMAGE_ALIASES),
        })
    }
}
