// ==========================================
// 纺织品库存台账系统 - 客户预订单
// ==========================================
// 职责: 预订单 / 预订行 / 可用量
// 说明: 草稿状态的预订单占用卷数，确认/取消后释放
// ==========================================

use crate::domain::types::OrderStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerOrder {
    pub order_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub status: OrderStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_id: String,
    pub order_id: String,
    pub item_id: String,
    pub qty_rolls: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub item_id: String,
    pub qty_rolls: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_name: String,
    pub customer_phone: String,
    pub note: Option<String>,
    pub lines: Vec<NewOrderLine>,
}

/// 订单明细行（商品已删除时 label 为占位文字）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineView {
    pub line: OrderLine,
    pub label: String,
    pub color_code: Option<String>,
    pub item_missing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order: CustomerOrder,
    pub lines: Vec<OrderLineView>,
}

/// 单个商品的可用量
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAvailability {
    pub item_id: String,
    pub balance_rolls: i64,
    /// 草稿预订单已占用
    pub reserved_rolls: i64,
    /// 余额 - 占用
    pub available_rolls: i64,
    /// 当前购物车数量
    pub in_cart: i64,
    /// 扣除购物车后剩余
    pub remaining_after_cart: i64,
    /// 购物车超出可用量
    pub over: bool,
}
