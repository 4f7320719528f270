// ==========================================
// 纺织品库存台账系统 - 导入去重实体
// ==========================================
// 职责: 来源行 / 来源自然键 / 合并行 / 去重报告 / 目录映射
// 红线: 来源键与目录键是两套不同的键函数
// ==========================================

use crate::domain::item::{CatalogKey, NewItem};
use crate::domain::text::{clean_text, non_empty, normalize_key_part};
use crate::domain::types::{Classification, UnitKind};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// SourceRow - 外部来源原始行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRow {
    /// 品质（对应目录大类）
    pub quality: String,
    pub design_code: String,
    /// 配色号（对应目录色号）
    pub mariage_code: String,
    pub status: Option<String>,
    pub date: Option<NaiveDate>,
    pub image_url: Option<String>,
}

impl SourceRow {
    /// 三个自然键字段齐全才可生成键
    pub fn source_key(&self) -> Option<SourceKey> {
        let key = SourceKey {
            quality: normalize_key_part(&self.quality),
            design_code: normalize_key_part(&self.design_code),
            mariage_code: normalize_key_part(&self.mariage_code),
        };
        if key.quality.is_empty() || key.design_code.is_empty() || key.mariage_code.is_empty() {
            None
        } else {
            Some(key)
        }
    }
}

// ==========================================
// SourceKey - 来源自然键 (品质, 花号, 配色号)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceKey {
    pub quality: String,
    pub design_code: String,
    pub mariage_code: String,
}

// ==========================================
// CatalogMapping - 来源行 → 目录候选
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogMapping {
    pub sub_category: String,
    pub name_prefix: String,
    pub unit: UnitKind,
}

impl Default for CatalogMapping {
    fn default() -> Self {
        Self {
            sub_category: "مطبوع".to_string(),
            name_prefix: "رسمة ".to_string(),
            unit: UnitKind::Kg,
        }
    }
}

impl CatalogMapping {
    /// 商品名 = 前缀 + 花号
    pub fn item_name(&self, design_code: &str) -> String {
        clean_text(&format!("{}{}", self.name_prefix, clean_text(design_code)))
    }

    /// 目录键（商品名, 色号）
    pub fn catalog_key(&self, row: &SourceRow) -> CatalogKey {
        CatalogKey::new(&self.item_name(&row.design_code), &row.mariage_code)
    }

    /// 目录候选（大类 = 品质，色号 = 配色号）
    pub fn candidate(&self, row: &MergedRow) -> NewItem {
        NewItem {
            main_category: clean_text(&row.quality),
            sub_category: self.sub_category.clone(),
            item_name: self.item_name(&row.design_code),
            color_code: clean_text(&row.mariage_code),
            color_name: None,
            unit: self.unit,
            description: None,
            image_source: non_empty(row.image_url.as_deref()),
        }
        .cleaned()
    }
}

// ==========================================
// MergedRow - 同键合并结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRow {
    /// 不完整行无键
    pub key: Option<SourceKey>,
    /// 首次出现的显示值（已清洗）
    pub quality: String,
    pub design_code: String,
    pub mariage_code: String,
    pub count: usize,
    pub last_date: Option<NaiveDate>,
    pub last_status: Option<String>,
    pub image_url: Option<String>,
    pub classification: Classification,
    pub catalog_key: Option<CatalogKey>,
}

impl MergedRow {
    pub fn is_selectable(&self) -> bool {
        self.classification == Classification::New
    }
}

/// 去重分类报告
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DedupReport {
    pub merged: Vec<MergedRow>,
    pub new_count: usize,
    pub existing_count: usize,
    pub incomplete_count: usize,
}

/// 来源预筛选（在去重前应用）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceFilter {
    /// 只保留最近 N 天（含无日期行时丢弃）
    pub days_back: Option<i64>,
    /// 状态文字精确匹配（规范化空白后）
    pub status: Option<String>,
    /// 任意字段包含
    pub text: Option<String>,
}
