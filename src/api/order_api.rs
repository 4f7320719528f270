// ==========================================
// 纺织品库存台账系统 - 客户预订单 API
// ==========================================
// 职责: 草稿创建 / 列表 / 明细 / 确认 / 取消 / 可用量
// 规则: 只有草稿可流转；草稿占用卷数，确认或取消后释放
// ==========================================

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::stock_api::StockApi;
use crate::api::validator::{positive_rolls, require_text, ItemValidator};
use crate::domain::item::Item;
use crate::domain::order::{
    CustomerOrder, ItemAvailability, NewOrder, OrderDetail, OrderLine, OrderLineView,
};
use crate::domain::text::non_empty;
use crate::domain::types::OrderStatus;
use crate::engine::AvailabilityEngine;
use crate::i18n;
use crate::repository::{ItemRepository, OrderRepository};

pub struct OrderApi {
    order_repo: Arc<OrderRepository>,
    item_repo: Arc<ItemRepository>,
    stock_api: Arc<StockApi>,
    validator: ItemValidator,
    engine: AvailabilityEngine,
}

impl OrderApi {
    pub fn new(
        order_repo: Arc<OrderRepository>,
        item_repo: Arc<ItemRepository>,
        stock_api: Arc<StockApi>,
    ) -> Self {
        Self {
            order_repo,
            validator: ItemValidator::new(item_repo.clone()),
            item_repo,
            stock_api,
            engine: AvailabilityEngine::new(),
        }
    }

    /// 创建草稿订单（单事务）
    ///
    /// # 返回
    /// - Err(InvalidInput): 客户名/电话为空、无明细行、卷数非正整数
    pub fn create_draft(&self, input: &NewOrder) -> ApiResult<OrderDetail> {
        let customer_name = require_text(&input.customer_name, "客户名")?;
        let customer_phone = require_text(&input.customer_phone, "电话")?;
        if input.lines.is_empty() {
            return Err(ApiError::InvalidInput("订单至少需要一行".to_string()));
        }

        let order = CustomerOrder {
            order_id: Uuid::new_v4().to_string(),
            customer_name,
            customer_phone,
            status: OrderStatus::Draft,
            note: non_empty(input.note.as_deref()),
            created_at: Utc::now(),
        };

        let mut lines = Vec::with_capacity(input.lines.len());
        for (idx, line) in input.lines.iter().enumerate() {
            self.validator.require_active_item(&line.item_id, idx + 1)?;
            let qty_rolls = positive_rolls(Decimal::from(line.qty_rolls), idx + 1)?;
            lines.push(OrderLine {
                line_id: Uuid::new_v4().to_string(),
                order_id: order.order_id.clone(),
                item_id: line.item_id.clone(),
                qty_rolls,
            });
        }

        self.order_repo.create(&order, &lines)?;
        info!(order_id = %order.order_id, lines = lines.len(), "预订单已创建");
        self.detail(&order.order_id)
    }

    /// 订单列表（新建在前）
    pub fn list(&self, status: Option<OrderStatus>) -> ApiResult<Vec<CustomerOrder>> {
        Ok(self.order_repo.list(status)?)
    }

    /// 订单明细（商品已删除时以占位文字显示）
    pub fn detail(&self, order_id: &str) -> ApiResult<OrderDetail> {
        let order = self
            .order_repo
            .find(order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("预订单(id={})不存在", order_id)))?;

        let items: HashMap<String, Item> = self
            .item_repo
            .list(false)?
            .into_iter()
            .map(|i| (i.item_id.clone(), i))
            .collect();

        let lines = self
            .order_repo
            .list_lines(order_id)?
            .into_iter()
            .map(|line| match items.get(&line.item_id) {
                Some(item) => OrderLineView {
                    label: item.material_label(),
                    color_code: Some(item.color_code.clone()),
                    item_missing: false,
                    line,
                },
                None => OrderLineView {
                    label: i18n::t("common.deleted_item"),
                    color_code: None,
                    item_missing: true,
                    line,
                },
            })
            .collect();

        Ok(OrderDetail { order, lines })
    }

    pub fn confirm(&self, order_id: &str) -> ApiResult<()> {
        self.transition(order_id, OrderStatus::Confirmed)
    }

    pub fn cancel(&self, order_id: &str) -> ApiResult<()> {
        self.transition(order_id, OrderStatus::Cancelled)
    }

    fn transition(&self, order_id: &str, next: OrderStatus) -> ApiResult<()> {
        let order = self
            .order_repo
            .find(order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("预订单(id={})不存在", order_id)))?;
        if !order.status.can_transition_to(next) {
            return Err(ApiError::InvalidStateTransition {
                from: order.status.to_string(),
                to: next.to_string(),
            });
        }
        self.order_repo.set_status(order_id, next)?;
        info!(order_id = %order_id, from = %order.status, to = %next, "预订单状态已变更");
        Ok(())
    }

    /// 可用量：余额卷数 - 草稿占用 - 购物车
    ///
    /// # 参数
    /// - item_ids: 要展示的商品
    /// - cart: 拟下单卷数（item_id → 卷数）
    pub fn availability(
        &self,
        item_ids: &[String],
        cart: &HashMap<String, i64>,
    ) -> ApiResult<Vec<ItemAvailability>> {
        let balances = self.stock_api.current_balances()?;
        let reserved = self.order_repo.reserved_rolls()?;
        Ok(self.engine.compute(item_ids, &balances, &reserved, cart))
    }
}
