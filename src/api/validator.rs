// ==========================================
// 纺织品库存台账系统 - 录入校验器
// ==========================================
// 职责: 流水/预订录入的同步校验（写库前完成，不做部分写入）
// 规则: 商品必须存在且启用；主数量取 3 位小数后 > 0；卷数为正整数
// ==========================================

use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::item::Item;
use crate::domain::types::round_qty;
use crate::repository::ItemRepository;

/// 非空文本（清洗后）
pub fn require_text(value: &str, field: &str) -> ApiResult<String> {
    let cleaned = crate::domain::text::clean_text(value);
    if cleaned.is_empty() {
        return Err(ApiError::InvalidInput(format!("{}不能为空", field)));
    }
    Ok(cleaned)
}

/// 主数量按 3 位小数取整后必须大于 0
///
/// # 返回
/// - Ok(Decimal): 取整后的数量（即落库值）
pub fn positive_qty(value: Decimal, line: usize) -> ApiResult<Decimal> {
    let rounded = round_qty(value);
    if rounded <= Decimal::ZERO {
        return Err(ApiError::InvalidInput(format!(
            "第 {} 行: 数量必须大于 0（输入: {}）",
            line,
            value.normalize()
        )));
    }
    Ok(rounded)
}

/// 卷数必须是正整数
pub fn positive_rolls(value: Decimal, line: usize) -> ApiResult<i64> {
    let whole = if value.fract().is_zero() && value > Decimal::ZERO {
        value.to_i64()
    } else {
        None
    };
    whole.ok_or_else(|| {
        ApiError::InvalidInput(format!(
            "第 {} 行: 卷数必须是正整数（输入: {}）",
            line,
            value.normalize()
        ))
    })
}

// ==========================================
// ItemValidator - 商品引用校验
// ==========================================
pub struct ItemValidator {
    item_repo: Arc<ItemRepository>,
}

impl ItemValidator {
    pub fn new(item_repo: Arc<ItemRepository>) -> Self {
        Self { item_repo }
    }

    /// 商品必须存在且启用
    ///
    /// # 参数
    /// - line: 行号（从 1 开始，用于提示）
    pub fn require_active_item(&self, item_id: &str, line: usize) -> ApiResult<Item> {
        if item_id.trim().is_empty() {
            return Err(ApiError::InvalidInput(format!("第 {} 行: 请选择商品", line)));
        }
        let item = self
            .item_repo
            .find_by_id(item_id)?
            .ok_or_else(|| ApiError::NotFound(format!("第 {} 行: 商品不存在 ({})", line, item_id)))?;
        if !item.is_active {
            return Err(ApiError::BusinessRuleViolation(format!(
                "第 {} 行: 商品已停用: {}",
                line,
                item.display_label()
            )));
        }
        Ok(item)
    }
}
