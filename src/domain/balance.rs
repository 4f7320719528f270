// ==========================================
// 纺织品库存台账系统 - 余额（派生值）
// ==========================================
// 红线: 余额不落库，永远由流水全量汇总得到
// ==========================================

use crate::domain::item::Item;
use crate::domain::types::StaleLevel;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Sub};

/// 单个商品的余额：主数量 + 卷数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balance {
    pub main: Decimal,
    pub rolls: i64,
}

impl Balance {
    pub const ZERO: Balance = Balance {
        main: Decimal::ZERO,
        rolls: 0,
    };

    pub fn new(main: Decimal, rolls: i64) -> Self {
        Self { main, rolls }
    }

    pub fn is_zero(&self) -> bool {
        self.main.is_zero() && self.rolls == 0
    }
}

impl Add for Balance {
    type Output = Balance;
    fn add(self, rhs: Balance) -> Balance {
        Balance::new(self.main + rhs.main, self.rolls + rhs.rolls)
    }
}

impl AddAssign for Balance {
    fn add_assign(&mut self, rhs: Balance) {
        self.main += rhs.main;
        self.rolls += rhs.rolls;
    }
}

impl Sub for Balance {
    type Output = Balance;
    fn sub(self, rhs: Balance) -> Balance {
        Balance::new(self.main - rhs.main, self.rolls - rhs.rolls)
    }
}

/// 日期区间（闭区间，两端可选）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn until(to: NaiveDate) -> Self {
        Self {
            from: None,
            to: Some(to),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |f| date >= f) && self.to.map_or(true, |t| date <= t)
    }
}

/// 库存总览行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRow {
    pub item: Item,
    pub balance: Balance,
    pub last_sale_date: Option<NaiveDate>,
    pub days_since_sale: Option<i64>,
    pub stale_level: StaleLevel,
}
