// ==========================================
// 纺织品库存台账系统 - 预订可用量引擎
// ==========================================
// 职责: 卷数余额 - 草稿预订占用 - 购物车 → 可用量与超量标记
// ==========================================

use crate::domain::balance::Balance;
use crate::domain::order::ItemAvailability;
use std::collections::HashMap;

pub struct AvailabilityEngine;

impl Default for AvailabilityEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AvailabilityEngine {
    pub fn new() -> Self {
        Self
    }

    /// 计算可用量
    ///
    /// # 参数
    /// - item_ids: 要展示的商品
    /// - balances: 当前余额（缺失视为 0）
    /// - reserved: 草稿预订单占用卷数
    /// - cart: 当前购物车卷数
    pub fn compute(
        &self,
        item_ids: &[String],
        balances: &HashMap<String, Balance>,
        reserved: &HashMap<String, i64>,
        cart: &HashMap<String, i64>,
    ) -> Vec<ItemAvailability> {
        item_ids
            .iter()
            .map(|id| {
                let balance_rolls = balances.get(id).map_or(0, |b| b.rolls);
                let reserved_rolls = reserved.get(id).copied().unwrap_or(0);
                let available_rolls = balance_rolls - reserved_rolls;
                let in_cart = cart.get(id).copied().unwrap_or(0);
                let remaining_after_cart = available_rolls - in_cart;
                ItemAvailability {
                    item_id: id.clone(),
                    balance_rolls,
                    reserved_rolls,
                    available_rolls,
                    in_cart,
                    remaining_after_cart,
                    over: in_cart > 0 && remaining_after_cart < 0,
                }
            })
            .collect()
    }
}
