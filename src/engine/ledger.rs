// ==========================================
// 纺织品库存台账系统 - 台账汇总引擎
// ==========================================
// 职责: 流水 → 余额 / 最近销售日 / 滞销等级 / 总览排序
// 红线: 纯函数、无状态；结果与流水顺序无关（交换律）
// 红线: 孤立流水（商品不在输入集合中）跳过，不影响其他商品
// ==========================================

use crate::domain::balance::{Balance, DateRange, StockRow};
use crate::domain::item::Item;
use crate::domain::movement::Movement;
use crate::domain::types::{MovementKind, StaleLevel, StaleThresholds, StockSortPreset};
use chrono::NaiveDate;
use std::cmp::{Ordering, Reverse};
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument, warn};

/// 汇总结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerSummary {
    pub balances: HashMap<String, Balance>,
    /// 只统计有效销售（排除冲销对）
    pub last_sale: HashMap<String, NaiveDate>,
    /// 被跳过的孤立流水数
    pub orphaned: usize,
}

// ==========================================
// LedgerAggregator - 台账汇总引擎
// ==========================================
pub struct LedgerAggregator;

impl Default for LedgerAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerAggregator {
    pub fn new() -> Self {
        Self
    }

    /// 计算当前余额
    ///
    /// # 参数
    /// - items: 商品集合（每个商品初始化为 0）
    /// - movements: 任意顺序的流水（可来自分页/分块查询）
    ///
    /// # 返回
    /// - item_id → Balance；空流水得到全 0
    pub fn compute_balances(&self, items: &[Item], movements: &[Movement]) -> HashMap<String, Balance> {
        self.summarize(items.iter().map(|i| i.item_id.as_str()), movements, None)
            .balances
    }

    /// 计算截至某日（含）的历史余额
    pub fn balances_as_of(
        &self,
        items: &[Item],
        movements: &[Movement],
        as_of: NaiveDate,
    ) -> HashMap<String, Balance> {
        self.summarize(
            items.iter().map(|i| i.item_id.as_str()),
            movements,
            Some(DateRange::until(as_of)),
        )
        .balances
    }

    /// 汇总余额 + 最近销售日
    ///
    /// # 说明
    /// - 余额是各流水 (入 - 出) 的累加，加法满足交换律
    /// - 最近销售日是 sale 流水日期的最大值，同样与顺序无关
    /// - 冲销流水与被冲销流水都计入余额（净额为 0），但都不算销售
    #[instrument(skip_all, fields(movements = movements.len()))]
    pub fn summarize<'a, I>(
        &self,
        item_ids: I,
        movements: &[Movement],
        range: Option<DateRange>,
    ) -> LedgerSummary
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut balances: HashMap<String, Balance> = item_ids
            .into_iter()
            .map(|id| (id.to_string(), Balance::ZERO))
            .collect();

        let voided: HashSet<&str> = movements
            .iter()
            .filter_map(|m| m.reverses_id.as_deref())
            .collect();

        let mut last_sale: HashMap<String, NaiveDate> = HashMap::new();
        let mut orphaned = 0usize;

        for m in movements {
            if let Some(r) = &range {
                if !r.contains(m.move_date) {
                    continue;
                }
            }

            let Some(balance) = balances.get_mut(&m.item_id) else {
                orphaned += 1;
                debug!(movement_id = %m.movement_id, item_id = %m.item_id, "孤立流水，跳过");
                continue;
            };
            *balance += Balance::new(m.delta_main(), m.delta_rolls());

            let effective_sale = m.kind == MovementKind::Sale
                && !m.is_reversal()
                && !voided.contains(m.movement_id.as_str());
            if effective_sale {
                last_sale
                    .entry(m.item_id.clone())
                    .and_modify(|d| {
                        if m.move_date > *d {
                            *d = m.move_date;
                        }
                    })
                    .or_insert(m.move_date);
            }
        }

        if orphaned > 0 {
            warn!(orphaned, "存在引用未知商品的流水");
        }
        debug!(items = balances.len(), orphaned, "台账汇总完成");

        LedgerSummary {
            balances,
            last_sale,
            orphaned,
        }
    }

    // ==========================================
    // 滞销判定
    // ==========================================

    /// 根据最近销售日判定滞销等级
    ///
    /// # 返回
    /// - (距今天数, 等级)；从未销售为 (None, NoSales)
    pub fn classify_stale(
        &self,
        last_sale: Option<NaiveDate>,
        today: NaiveDate,
        thresholds: &StaleThresholds,
    ) -> (Option<i64>, StaleLevel) {
        match last_sale {
            None => (None, StaleLevel::NoSales),
            Some(d) => {
                let days = (today - d).num_days();
                let level = if days >= thresholds.stale_days {
                    StaleLevel::Stale
                } else if days > thresholds.attention_days {
                    StaleLevel::Attention
                } else {
                    StaleLevel::Normal
                };
                (Some(days), level)
            }
        }
    }

    /// "只看滞销"过滤：从未销售视为无限久
    pub fn is_stale(&self, days_since_sale: Option<i64>, thresholds: &StaleThresholds) -> bool {
        days_since_sale.map_or(true, |d| d >= thresholds.stale_days)
    }

    /// 生成库存总览行
    pub fn compute_stock_rows(
        &self,
        items: Vec<Item>,
        movements: &[Movement],
        today: NaiveDate,
        thresholds: &StaleThresholds,
    ) -> Vec<StockRow> {
        let summary = self.summarize(items.iter().map(|i| i.item_id.as_str()), movements, None);

        items
            .into_iter()
            .map(|item| {
                let balance = summary
                    .balances
                    .get(&item.item_id)
                    .copied()
                    .unwrap_or(Balance::ZERO);
                let last_sale_date = summary.last_sale.get(&item.item_id).copied();
                let (days_since_sale, stale_level) =
                    self.classify_stale(last_sale_date, today, thresholds);
                StockRow {
                    item,
                    balance,
                    last_sale_date,
                    days_since_sale,
                    stale_level,
                }
            })
            .collect()
    }

    // ==========================================
    // 排序预设
    // ==========================================

    pub fn sort_stock_rows(&self, rows: &mut [StockRow], preset: StockSortPreset) {
        match preset {
            StockSortPreset::Default => rows.sort_by(default_order),
            StockSortPreset::MostQtyInItem => rows.sort_by(|a, b| {
                group_order(a, b)
                    .then_with(|| b.balance.main.cmp(&a.balance.main))
                    .then_with(|| default_order(a, b))
            }),
            StockSortPreset::Stale => rows.sort_by(|a, b| {
                let da = a.days_since_sale.unwrap_or(i64::MAX);
                let db = b.days_since_sale.unwrap_or(i64::MAX);
                db.cmp(&da).then_with(|| default_order(a, b))
            }),
            StockSortPreset::LatestSale => rows.sort_by(|a, b| {
                // 有销售在前，日期新在前
                Reverse(a.last_sale_date)
                    .cmp(&Reverse(b.last_sale_date))
                    .then_with(|| default_order(a, b))
            }),
            StockSortPreset::MostRolls => rows.sort_by(|a, b| {
                b.balance
                    .rolls
                    .cmp(&a.balance.rolls)
                    .then_with(|| default_order(a, b))
            }),
        }
    }
}

fn group_order(a: &StockRow, b: &StockRow) -> Ordering {
    a.item
        .main_category
        .cmp(&b.item.main_category)
        .then_with(|| a.item.sub_category.cmp(&b.item.sub_category))
        .then_with(|| a.item.item_name.cmp(&b.item.item_name))
}

fn default_order(a: &StockRow, b: &StockRow) -> Ordering {
    group_order(a, b)
        .then_with(|| a.item.color_code.cmp(&b.item.color_code))
        .then_with(|| a.item.item_id.cmp(&b.item.item_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::item::NewItem;
    use crate::domain::types::UnitKind;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    fn item(id: &str, name: &str, color: &str) -> Item {
        NewItem {
            main_category: "قطن".to_string(),
            sub_category: "سادة".to_string(),
            item_name: name.to_string(),
            color_code: color.to_string(),
            color_name: None,
            unit: UnitKind::Kg,
            description: None,
            image_source: None,
        }
        .into_item(id.to_string(), Utc::now())
    }

    fn mv(
        id: &str,
        item_id: &str,
        day: u32,
        kind: MovementKind,
        main_in: Decimal,
        main_out: Decimal,
        rolls_in: i64,
        rolls_out: i64,
    ) -> Movement {
        Movement {
            movement_id: id.to_string(),
            item_id: item_id.to_string(),
            move_date: d(day),
            kind,
            qty_main_in: main_in,
            qty_main_out: main_out,
            qty_rolls_in: rolls_in,
            qty_rolls_out: rolls_out,
            note: None,
            session_id: None,
            reverses_id: None,
            supersedes_id: None,
            created_at: Utc::now(),
        }
    }

    fn sample_movements() -> Vec<Movement> {
        vec![
            mv("m1", "a", 1, MovementKind::Purchase, dec!(100.125), dec!(0), 10, 0),
            mv("m2", "a", 3, MovementKind::Sale, dec!(0), dec!(20.5), 0, 2),
            mv("m3", "b", 2, MovementKind::Purchase, dec!(50), dec!(0), 5, 0),
            mv("m4", "a", 5, MovementKind::Adjustment, dec!(0.375), dec!(0), 0, 1),
            mv("m5", "b", 6, MovementKind::Sale, dec!(0), dec!(7.333), 0, 1),
        ]
    }

    #[test]
    fn test_compute_balances_basic() {
        let engine = LedgerAggregator::new();
        let items = vec![item("a", "x", "1"), item("b", "y", "2")];
        let balances = engine.compute_balances(&items, &sample_movements());

        assert_eq!(balances["a"], Balance::new(dec!(80.000), 7));
        assert_eq!(balances["b"], Balance::new(dec!(42.667), 4));
    }

    #[test]
    fn test_compute_balances_is_order_independent() {
        let engine = LedgerAggregator::new();
        let items = vec![item("a", "x", "1"), item("b", "y", "2")];
        let base = sample_movements();
        let expected = engine.summarize(items.iter().map(|i| i.item_id.as_str()), &base, None);

        for shift in 0..base.len() {
            let mut rotated = base.clone();
            rotated.rotate_left(shift);
            let got = engine.summarize(items.iter().map(|i| i.item_id.as_str()), &rotated, None);
            assert_eq!(got, expected);

            rotated.reverse();
            let got = engine.summarize(items.iter().map(|i| i.item_id.as_str()), &rotated, None);
            assert_eq!(got, expected);
        }
    }

    #[test]
    fn test_zero_state() {
        let engine = LedgerAggregator::new();
        assert!(engine.compute_balances(&[], &[]).is_empty());

        let items = vec![item("a", "x", "1"), item("b", "y", "2")];
        let balances = engine.compute_balances(&items, &[]);
        assert_eq!(balances.len(), 2);
        assert!(balances.values().all(|b| b.is_zero()));
    }

    #[test]
    fn test_orphan_movement_is_skipped() {
        let engine = LedgerAggregator::new();
        let items = vec![item("a", "x", "1")];
        let mut movements = sample_movements();
        movements.push(mv("ghost", "missing", 2, MovementKind::Purchase, dec!(999), dec!(0), 99, 0));

        let summary = engine.summarize(items.iter().map(|i| i.item_id.as_str()), &movements, None);
        // b 也不在商品集合中
        assert_eq!(summary.orphaned, 3);
        assert_eq!(summary.balances.len(), 1);
        assert_eq!(summary.balances["a"], Balance::new(dec!(80.000), 7));
    }

    #[test]
    fn test_decimal_precision_over_many_movements() {
        let engine = LedgerAggregator::new();
        let items = vec![item("a", "x", "1")];
        let movements: Vec<Movement> = (0..10_000)
            .map(|i| {
                mv(&format!("m{}", i), "a", 1, MovementKind::Purchase, dec!(0.001), dec!(0), 0, 0)
            })
            .collect();
        let balances = engine.compute_balances(&items, &movements);
        assert_eq!(balances["a"].main, dec!(10.000));
    }

    #[test]
    fn test_balances_as_of() {
        let engine = LedgerAggregator::new();
        let items = vec![item("a", "x", "1")];
        let balances = engine.balances_as_of(&items, &sample_movements(), d(3));
        assert_eq!(balances["a"], Balance::new(dec!(79.625), 8));
    }

    #[test]
    fn test_last_sale_ignores_voided_sales() {
        let engine = LedgerAggregator::new();
        let items = vec![item("a", "x", "1")];
        let mut movements = sample_movements();
        movements.push(mv("m6", "a", 9, MovementKind::Sale, dec!(0), dec!(1), 0, 0));
        let mut reversal = mv("m7", "a", 9, MovementKind::Sale, dec!(1), dec!(0), 0, 0);
        reversal.reverses_id = Some("m6".to_string());
        movements.push(reversal);

        let summary = engine.summarize(items.iter().map(|i| i.item_id.as_str()), &movements, None);
        assert_eq!(summary.last_sale.get("a"), Some(&d(3)));
        assert_eq!(summary.balances["a"], Balance::new(dec!(80.000), 7));
    }

    #[test]
    fn test_classify_stale() {
        let engine = LedgerAggregator::new();
        let th = StaleThresholds::default();
        let today = d(31);

        assert_eq!(engine.classify_stale(None, today, &th), (None, StaleLevel::NoSales));
        assert_eq!(engine.classify_stale(Some(d(25)), today, &th), (Some(6), StaleLevel::Normal));
        assert_eq!(engine.classify_stale(Some(d(24)), today, &th), (Some(7), StaleLevel::Normal));
        assert_eq!(engine.classify_stale(Some(d(10)), today, &th), (Some(21), StaleLevel::Attention));
        assert_eq!(engine.classify_stale(Some(d(1)), today, &th), (Some(30), StaleLevel::Stale));

        assert!(engine.is_stale(None, &th));
        assert!(engine.is_stale(Some(30), &th));
        assert!(!engine.is_stale(Some(29), &th));
    }

    #[test]
    fn test_sort_presets() {
        let engine = LedgerAggregator::new();
        let items = vec![item("a", "x", "2"), item("b", "x", "1"), item("c", "w", "9")];
        let movements = vec![
            mv("m1", "a", 1, MovementKind::Purchase, dec!(10), dec!(0), 1, 0),
            mv("m2", "b", 1, MovementKind::Purchase, dec!(30), dec!(0), 9, 0),
            mv("m3", "a", 20, MovementKind::Sale, dec!(0), dec!(1), 0, 0),
            mv("m4", "c", 2, MovementKind::Sale, dec!(0), dec!(1), 0, 0),
        ];
        let th = StaleThresholds::default();
        let mut rows = engine.compute_stock_rows(items, &movements, d(28), &th);

        let ids = |rows: &[StockRow]| rows.iter().map(|r| r.item.item_id.clone()).collect::<Vec<_>>();

        engine.sort_stock_rows(&mut rows, StockSortPreset::Default);
        assert_eq!(ids(&rows), vec!["c", "b", "a"]);

        engine.sort_stock_rows(&mut rows, StockSortPreset::MostQtyInItem);
        assert_eq!(ids(&rows), vec!["c", "b", "a"]);

        engine.sort_stock_rows(&mut rows, StockSortPreset::Stale);
        assert_eq!(ids(&rows), vec!["b", "c", "a"]);

        engine.sort_stock_rows(&mut rows, StockSortPreset::LatestSale);
        assert_eq!(ids(&rows), vec!["a", "c", "b"]);

        engine.sort_stock_rows(&mut rows, StockSortPreset::MostRolls);
        assert_eq!(ids(&rows), vec!["b", "a", "c"]);
    }
}
