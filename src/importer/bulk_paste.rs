// ==========================================
// 纺织品库存台账系统 - 批量粘贴解析
// ==========================================
// 格式: 大类|小类|名称|色号|色名|单位[|描述]，每行一个商品
// 规则: 少于 6 列为错误行；单位只接受 kg/m，其余回退 kg
// ==========================================

use crate::domain::item::{CatalogKey, NewItem};
use crate::domain::types::UnitKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const MIN_COLUMNS: usize = 6;

/// 解析后的粘贴行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasteRow {
    /// 行号（从 1 开始，不计空行）
    pub line: usize,
    pub raw: String,
    pub parsed: Result<NewItem, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PasteStatus {
    New,
    Existing,
    /// 与本批前面的行同键
    DuplicateInBatch,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PastePreviewRow {
    pub line: usize,
    pub raw: String,
    pub status: PasteStatus,
    pub item: Option<NewItem>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PastePreview {
    pub rows: Vec<PastePreviewRow>,
    pub new_count: usize,
    pub existing_count: usize,
    pub invalid_count: usize,
}

impl PastePreview {
    /// 可导入的新商品（按行顺序）
    pub fn new_items(&self) -> Vec<NewItem> {
        self.rows
            .iter()
            .filter(|r| r.status == PasteStatus::New)
            .filter_map(|r| r.item.clone())
            .collect()
    }
}

pub struct BulkPasteParser;

impl BulkPasteParser {
    /// 解析粘贴文本（空行忽略）
    pub fn parse_text(text: &str) -> Vec<PasteRow> {
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .enumerate()
            .map(|(idx, raw)| PasteRow {
                line: idx + 1,
                raw: raw.to_string(),
                parsed: Self::parse_line(raw),
            })
            .collect()
    }

    /// 表格行（首行为表头，跳过）转为粘贴行
    pub fn parse_sheet_rows(rows: Vec<Vec<String>>) -> Vec<PasteRow> {
        let text = rows
            .into_iter()
            .skip(1)
            .filter(|r| r.iter().any(|c| !c.trim().is_empty()))
            .map(|r| {
                r.iter()
                    .map(|c| c.trim().to_string())
                    .collect::<Vec<_>>()
                    .join("|")
            })
            .collect::<Vec<_>>()
            .join("\n");
        Self::parse_text(&text)
    }

    fn parse_line(raw: &str) -> Result<NewItem, String> {
        let parts: Vec<&str> = raw.split('|').map(str::trim).collect();
        if parts.len() < MIN_COLUMNS {
            return Err(format!("بيانات ناقصة (تحتاج {} أعمدة)", MIN_COLUMNS));
        }

        let unit = match parts[5].to_lowercase().as_str() {
            "m" => UnitKind::M,
            _ => UnitKind::Kg,
        };
        let item = NewItem {
            main_category: parts[0].to_string(),
            sub_category: parts[1].to_string(),
            item_name: parts[2].to_string(),
            color_code: parts[3].to_string(),
            color_name: Some(parts[4].to_string()),
            unit,
            description: parts.get(6).map(|s| s.to_string()),
            image_source: None,
        }
        .cleaned();

        if item.item_name.is_empty() || item.color_code.is_empty() {
            return Err("اسم الصنف ورقم اللون مطلوبان".to_string());
        }
        Ok(item)
    }

    /// 按目录键分类：新 / 已存在 / 本批重复 / 错误
    pub fn classify(rows: Vec<PasteRow>, existing: &HashSet<CatalogKey>) -> PastePreview {
        let mut preview = PastePreview::default();
        let mut seen: HashSet<CatalogKey> = HashSet::new();

        for row in rows {
            let (status, item, message) = match row.parsed {
                Err(msg) => (PasteStatus::Invalid, None, Some(msg)),
                Ok(item) => {
                    let key = item.catalog_key();
                    if existing.contains(&key) {
                        (PasteStatus::Existing, Some(item), None)
                    } else if !seen.insert(key) {
                        (PasteStatus::DuplicateInBatch, Some(item), None)
                    } else {
                        (PasteStatus::New, Some(item), None)
                    }
                }
            };
            match status {
                PasteStatus::New => preview.new_count += 1,
                PasteStatus::Existing | PasteStatus::DuplicateInBatch => preview.existing_count += 1,
                PasteStatus::Invalid => preview.invalid_count += 1,
            }
            preview.rows.push(PastePreviewRow {
                line: row.line,
                raw: row.raw,
                status,
                item,
                message,
            });
        }
        preview
    }
}
