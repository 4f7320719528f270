// ==========================================
// 纺织品库存台账系统 - 领域类型定义
// ==========================================
// 职责: 枚举与小值类型（单位/流水类型/来源状态/分类/滞销等级/策略）
// 序列化格式: 与数据库存储字符串一致
// ==========================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 主数量小数位数
pub const QTY_SCALE: u32 = 3;

/// 主数量统一精度（3 位小数）
pub fn round_qty(value: Decimal) -> Decimal {
    value.round_dp(QTY_SCALE)
}

// ==========================================
// 计量单位 (Unit Kind)
// ==========================================
// 主数量只允许按重量(kg)或长度(m)计量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Kg,
    M,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl UnitKind {
    /// 从字符串解析单位（大小写不敏感，兼容阿拉伯语显示名）
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "kg" | "كغ" => Some(UnitKind::Kg),
            "m" | "متر" => Some(UnitKind::M),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            UnitKind::Kg => "kg",
            UnitKind::M => "m",
        }
    }

    /// 翻译键（unit.kg / unit.m）
    pub fn label_key(&self) -> &'static str {
        match self {
            UnitKind::Kg => "unit.kg",
            UnitKind::M => "unit.m",
        }
    }
}

// ==========================================
// 流水类型 (Movement Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    Purchase,   // 采购入库
    Sale,       // 销售出库
    Adjustment, // 盘点调整
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl MovementKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "purchase" => Some(MovementKind::Purchase),
            "sale" => Some(MovementKind::Sale),
            "adjustment" => Some(MovementKind::Adjustment),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            MovementKind::Purchase => "purchase",
            MovementKind::Sale => "sale",
            MovementKind::Adjustment => "adjustment",
        }
    }
}

// ==========================================
// 来源状态 (Source Status) - 印花来源数据
// ==========================================
// 排名: 未成型 < 已成型 < 已收货（同日期/无日期时高者胜）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceStatus {
    NotFormed,
    Formed,
    Received,
}

impl SourceStatus {
    pub const NOT_FORMED_LABEL: &'static str = "لم يتم التشكيل";
    pub const FORMED_LABEL: &'static str = "تم التشكيل";
    pub const RECEIVED_LABEL: &'static str = "تم الاستلام";

    /// 识别来源系统中的状态文字（阿拉伯语原文或英文代码）
    pub fn from_label(s: &str) -> Option<Self> {
        let t = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match t.as_str() {
            Self::NOT_FORMED_LABEL => Some(SourceStatus::NotFormed),
            Self::FORMED_LABEL => Some(SourceStatus::Formed),
            Self::RECEIVED_LABEL => Some(SourceStatus::Received),
            _ => match t.to_uppercase().as_str() {
                "NOT_FORMED" => Some(SourceStatus::NotFormed),
                "FORMED" => Some(SourceStatus::Formed),
                "RECEIVED" => Some(SourceStatus::Received),
                _ => None,
            },
        }
    }

    /// 状态排名（未知状态为 0）
    pub fn rank_of(label: &str) -> u8 {
        match Self::from_label(label) {
            Some(SourceStatus::NotFormed) => 1,
            Some(SourceStatus::Formed) => 2,
            Some(SourceStatus::Received) => 3,
            None => 0,
        }
    }
}

// ==========================================
// 导入分类 (Classification)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Existing,   // 目录中已存在
    New,        // 可导入
    Incomplete, // 自然键字段缺失，不可选
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Existing => write!(f, "EXISTING"),
            Classification::New => write!(f, "NEW"),
            Classification::Incomplete => write!(f, "INCOMPLETE"),
        }
    }
}

// ==========================================
// 滞销等级 (Stale Level)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StaleLevel {
    Normal,    // 近期有销售
    Attention, // 超过关注阈值
    Stale,     // 超过滞销阈值
    NoSales,   // 从未销售
}

impl StaleLevel {
    pub fn label_key(&self) -> &'static str {
        match self {
            StaleLevel::Normal => "stock.normal",
            StaleLevel::Attention => "stock.attention",
            StaleLevel::Stale => "stock.stale",
            StaleLevel::NoSales => "stock.no_sales",
        }
    }
}

/// 滞销阈值（天）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleThresholds {
    /// 超过该天数进入"关注"
    pub attention_days: i64,
    /// 达到该天数即"滞销"
    pub stale_days: i64,
}

impl Default for StaleThresholds {
    fn default() -> Self {
        Self {
            attention_days: 7,
            stale_days: 30,
        }
    }
}

// ==========================================
// 库存总览排序预设
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StockSortPreset {
    /// 大类 → 小类 → 名称 → 色号
    #[default]
    Default,
    /// 同名商品内按主数量降序
    MostQtyInItem,
    /// 最久未售在前（从未销售最前）
    Stale,
    /// 最近销售在前
    LatestSale,
    /// 卷数降序
    MostRolls,
}

impl StockSortPreset {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "most_qty_in_item" => StockSortPreset::MostQtyInItem,
            "stale" => StockSortPreset::Stale,
            "latest_sale" => StockSortPreset::LatestSale,
            "most_rolls" => StockSortPreset::MostRolls,
            _ => StockSortPreset::Default,
        }
    }
}

// ==========================================
// 预订单状态 (Order Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Draft,
    Confirmed,
    Cancelled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl OrderStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "DRAFT" => Some(OrderStatus::Draft),
            "CONFIRMED" => Some(OrderStatus::Confirmed),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "DRAFT",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// 只有草稿可流转（草稿 → 确认 / 取消）
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Draft, OrderStatus::Confirmed) | (OrderStatus::Draft, OrderStatus::Cancelled)
        )
    }
}

// ==========================================
// 盘点策略
// ==========================================

/// 零差异行处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZeroDiffPolicy {
    /// 不落库（默认）
    #[default]
    Skip,
    /// 作为确认行落库（无调整流水）
    Record,
}

impl ZeroDiffPolicy {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "RECORD" => ZeroDiffPolicy::Record,
            _ => ZeroDiffPolicy::Skip,
        }
    }
}

/// 账面数复核策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookCheck {
    /// 使用加载盘点表时的账面快照（默认）
    #[default]
    AcceptStale,
    /// 提交前重新汇总，账面变化则拒绝
    Revalidate,
}

impl BookCheck {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "REVALIDATE" => BookCheck::Revalidate,
            _ => BookCheck::AcceptStale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_source_status_rank_order() {
        assert!(SourceStatus::NotFormed < SourceStatus::Formed);
        assert!(SourceStatus::Formed < SourceStatus::Received);
        assert_eq!(SourceStatus::rank_of("  تم   الاستلام "), 3);
        assert_eq!(SourceStatus::rank_of("لم يتم التشكيل"), 1);
        assert_eq!(SourceStatus::rank_of("غير معروف"), 0);
    }

    #[test]
    fn test_unit_kind_parse() {
        assert_eq!(UnitKind::from_str(" KG "), Some(UnitKind::Kg));
        assert_eq!(UnitKind::from_str("متر"), Some(UnitKind::M));
        assert_eq!(UnitKind::from_str("yard"), None);
    }

    #[test]
    fn test_order_status_transitions() {
        assert!(OrderStatus::Draft.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Draft.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Confirmed.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Draft));
    }

    #[test]
    fn test_round_qty() {
        assert_eq!(round_qty(dec!(1.23456)), dec!(1.235));
        assert_eq!(round_qty(dec!(2.5)), dec!(2.5));
    }

    #[test]
    fn test_policies_default_when_unknown() {
        assert_eq!(ZeroDiffPolicy::from_str("record"), ZeroDiffPolicy::Record);
        assert_eq!(ZeroDiffPolicy::from_str("bogus"), ZeroDiffPolicy::Skip);
        assert_eq!(BookCheck::from_str("REVALIDATE"), BookCheck::Revalidate);
        assert_eq!(BookCheck::from_str(""), BookCheck::AcceptStale);
    }
}
