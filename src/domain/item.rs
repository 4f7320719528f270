// ==========================================
// 纺织品库存台账系统 - 商品目录实体
// ==========================================
// 职责: Item / NewItem / ItemPatch / CatalogKey
// 红线: (商品名, 色号) 在目录中应唯一；存储层不强制，调用方必须去重
// ==========================================

use crate::domain::text::{clean_text, non_empty, normalize_arabic_digits, normalize_key_part};
use crate::domain::types::UnitKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Item - 商品目录条目
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub item_id: String,
    pub main_category: String,
    pub sub_category: String,
    pub item_name: String,
    pub color_code: String,
    pub color_name: Option<String>,
    pub unit: UnitKind,
    pub description: Option<String>,
    pub image_path: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// 显示名 "大类 - 小类 - 名称"（空段省略）
    pub fn material_label(&self) -> String {
        [&self.main_category, &self.sub_category, &self.item_name]
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" - ")
    }

    /// 显示名 + 色号，用于错误提示
    pub fn display_label(&self) -> String {
        format!("{} [{}]", self.material_label(), self.color_code)
    }

    pub fn catalog_key(&self) -> CatalogKey {
        CatalogKey::new(&self.item_name, &self.color_code)
    }

    /// 搜索文本（显示名 + 色号 + 色名 + 描述），小写
    pub fn search_text(&self) -> String {
        let mut parts = vec![self.material_label(), self.color_code.clone()];
        if let Some(name) = &self.color_name {
            parts.push(name.clone());
        }
        if let Some(desc) = &self.description {
            parts.push(desc.clone());
        }
        normalize_key_part(&parts.join(" "))
    }
}

// ==========================================
// CatalogKey - 目录自然键 (商品名, 色号)
// ==========================================
/// 结构化相等/哈希，两个字段各自规范化
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CatalogKey {
    pub item_name: String,
    pub color_code: String,
}

impl CatalogKey {
    pub fn new(item_name: &str, color_code: &str) -> Self {
        Self {
            item_name: normalize_key_part(item_name),
            color_code: normalize_key_part(color_code),
        }
    }
}

// ==========================================
// NewItem - 新建商品输入
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub main_category: String,
    pub sub_category: String,
    pub item_name: String,
    pub color_code: String,
    pub color_name: Option<String>,
    pub unit: UnitKind,
    pub description: Option<String>,
    /// 外部图片来源（导入时使用，落库前由图片步骤转存）
    pub image_source: Option<String>,
}

impl NewItem {
    /// 清洗输入：空白折叠，色号数字归一
    pub fn cleaned(self) -> Self {
        Self {
            main_category: clean_text(&self.main_category),
            sub_category: clean_text(&self.sub_category),
            item_name: clean_text(&self.item_name),
            color_code: normalize_arabic_digits(&clean_text(&self.color_code)),
            color_name: non_empty(self.color_name.as_deref()),
            unit: self.unit,
            description: non_empty(self.description.as_deref()),
            image_source: non_empty(self.image_source.as_deref()),
        }
    }

    pub fn catalog_key(&self) -> CatalogKey {
        CatalogKey::new(&self.item_name, &self.color_code)
    }

    /// 生成目录实体（image_path 留空，由图片步骤回填）
    pub fn into_item(self, item_id: String, now: DateTime<Utc>) -> Item {
        Item {
            item_id,
            main_category: self.main_category,
            sub_category: self.sub_category,
            item_name: self.item_name,
            color_code: self.color_code,
            color_name: self.color_name,
            unit: self.unit,
            description: self.description,
            image_path: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

// ==========================================
// ItemPatch - 原地更新
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemPatch {
    pub main_category: Option<String>,
    pub sub_category: Option<String>,
    pub item_name: Option<String>,
    pub color_code: Option<String>,
    pub color_name: Option<String>,
    pub unit: Option<UnitKind>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

impl ItemPatch {
    /// 应用到现有实体（清洗规则同 NewItem）
    pub fn apply_to(&self, item: &mut Item, now: DateTime<Utc>) {
        if let Some(v) = &self.main_category {
            item.main_category = clean_text(v);
        }
        if let Some(v) = &self.sub_category {
            item.sub_category = clean_text(v);
        }
        if let Some(v) = &self.item_name {
            item.item_name = clean_text(v);
        }
        if let Some(v) = &self.color_code {
            item.color_code = normalize_arabic_digits(&clean_text(v));
        }
        if let Some(v) = &self.color_name {
            item.color_name = non_empty(Some(v));
        }
        if let Some(v) = self.unit {
            item.unit = v;
        }
        if let Some(v) = &self.description {
            item.description = non_empty(Some(v));
        }
        if let Some(v) = self.is_active {
            item.is_active = v;
        }
        item.updated_at = now;
    }
}
