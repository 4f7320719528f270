// ==========================================
// 纺织品库存台账系统 - 库存总览 API
// ==========================================
// 职责: 当前余额 / 最近销售 / 滞销等级 / 历史余额
// 说明: 余额每次由全量流水汇总，调用方自行缓存
// ==========================================

use crate::api::error::{config_error, ApiResult};
use crate::config::ConfigManager;
use crate::domain::balance::{Balance, StockRow};
use crate::domain::item::Item;
use crate::domain::movement::MovementFilter;
use crate::domain::text::normalize_key_part;
use crate::domain::types::StockSortPreset;
use crate::engine::LedgerAggregator;
use crate::perf::PerfGuard;
use crate::repository::LedgerStore;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 库存总览查询条件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockQuery {
    /// 在 显示名/色号/色名/描述 中搜索
    pub search: Option<String>,
    /// 只看滞销（含从未销售）
    pub only_stale: bool,
    pub preset: StockSortPreset,
    pub active_only: bool,
}

/// 历史余额行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalBalance {
    pub item: Item,
    pub balance: Balance,
}

// ==========================================
// StockApi - 库存总览 API
// ==========================================
pub struct StockApi {
    store: Arc<dyn LedgerStore>,
    config: Arc<ConfigManager>,
    aggregator: LedgerAggregator,
}

impl StockApi {
    pub fn new(store: Arc<dyn LedgerStore>, config: Arc<ConfigManager>) -> Self {
        Self {
            store,
            config,
            aggregator: LedgerAggregator::new(),
        }
    }

    /// 全部商品的当前余额
    pub fn current_balances(&self) -> ApiResult<HashMap<String, Balance>> {
        let items = self.store.list_items(false)?;
        let movements = self.store.list_movements(&MovementFilter::all())?;
        Ok(self.aggregator.compute_balances(&items, &movements))
    }

    /// 库存总览
    ///
    /// # 参数
    /// - query: 搜索/滞销过滤/排序预设
    /// - today: 计算"距今天数"的基准日
    pub fn stock_overview(&self, query: &StockQuery, today: NaiveDate) -> ApiResult<Vec<StockRow>> {
        let mut perf = PerfGuard::new("stock_overview");
        let thresholds = self.config.get_stale_thresholds().map_err(config_error)?;

        let items = filter_items(self.store.list_items(query.active_only)?, query.search.as_deref());
        let movements = self.store.list_movements(&MovementFilter::all())?;

        let mut rows = self
            .aggregator
            .compute_stock_rows(items, &movements, today, &thresholds);
        if query.only_stale {
            rows.retain(|r| self.aggregator.is_stale(r.days_since_sale, &thresholds));
        }
        self.aggregator.sort_stock_rows(&mut rows, query.preset);

        perf.set_rows(rows.len());
        debug!(rows = rows.len(), preset = ?query.preset, "库存总览生成");
        Ok(rows)
    }

    /// 截至某日（含）的历史余额
    pub fn balances_as_of(
        &self,
        as_of: NaiveDate,
        search: Option<&str>,
    ) -> ApiResult<Vec<HistoricalBalance>> {
        let items = filter_items(self.store.list_items(false)?, search);
        let movements = self.store.list_movements(&MovementFilter {
            date_to: Some(as_of),
            ..MovementFilter::all()
        })?;

        let balances = self.aggregator.balances_as_of(&items, &movements, as_of);
        Ok(items
            .into_iter()
            .map(|item| {
                let balance = balances.get(&item.item_id).copied().unwrap_or(Balance::ZERO);
                HistoricalBalance { item, balance }
            })
            .collect())
    }
}

/// 按搜索词过滤商品（规范化后包含匹配）
pub(crate) fn filter_items(items: Vec<Item>, search: Option<&str>) -> Vec<Item> {
    let needle = search.map(normalize_key_part).unwrap_or_default();
    if needle.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|i| i.search_text().contains(&needle))
        .collect()
}
