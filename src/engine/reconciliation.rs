// ==========================================
// 纺织品库存台账系统 - 盘点对账引擎
// ==========================================
// 职责: 实盘录入 + 账面快照 → 对账计划（盘点行 + 调整流水）
// 红线: 纯函数；校验全部通过才生成计划，任何一行不合法整单拒绝
// 红线: 账面数取加载盘点表时的快照，提交时不重新读取（除非显式复核）
// ==========================================
// 每行状态:
// 1. 跳过   - 主数量、卷数都未录入
// 2. 拒绝   - 只录入其中一项
// 3. 拒绝   - 卷数不是非负整数；主数量为负或超过 3 位小数
// 4. 无变化 - 差异均为 0（默认不落库，可配置为确认行）
// 5. 调整   - 生成盘点行 + 一条 adjustment 流水
// ==========================================

use crate::domain::audit::{BookSnapshot, CountEntry, PlannedLine, ReconciliationPlan};
use crate::domain::balance::Balance;
use crate::domain::movement::NewMovement;
use crate::domain::types::{ZeroDiffPolicy, QTY_SCALE};
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, info, instrument};

/// 对账校验错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconciliationError {
    #[error("盘点录入不完整，主数量与卷数必须同时填写: {item}")]
    PartialEntry { item_id: String, item: String },

    #[error("卷数必须是非负整数: {item}（输入: {value}）")]
    InvalidRollCount {
        item_id: String,
        item: String,
        value: String,
    },

    #[error("主数量不能为负: {item}（输入: {value}）")]
    NegativeQuantity {
        item_id: String,
        item: String,
        value: String,
    },

    #[error("主数量最多 3 位小数: {item}（输入: {value}）")]
    ExcessPrecision {
        item_id: String,
        item: String,
        value: String,
    },

    #[error("盘点表中没有该商品: item_id={0}")]
    UnknownItem(String),

    #[error("同一商品重复录入: {item}")]
    DuplicateEntry { item_id: String, item: String },

    #[error("没有可保存的内容")]
    NothingToSave,

    #[error("账面余额在加载盘点表后已变化，请重新加载: {items:?}")]
    BookBalanceChanged { items: Vec<String> },
}

/// 单行判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Skip,
    Unchanged { actual: Balance },
    Apply { actual: Balance, diff: Balance },
}

// ==========================================
// ReconciliationEngine - 盘点对账引擎
// ==========================================
pub struct ReconciliationEngine;

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self
    }

    /// 单行判定
    ///
    /// # 参数
    /// - entry: 实盘录入
    /// - book: 账面数（快照）
    /// - label: 商品显示名（用于错误提示）
    pub fn evaluate_line(
        &self,
        entry: &CountEntry,
        book: Balance,
        label: &str,
    ) -> Result<LineOutcome, ReconciliationError> {
        let (main, rolls) = match (entry.actual_main, entry.actual_rolls) {
            (None, None) => return Ok(LineOutcome::Skip),
            (Some(m), Some(r)) => (m, r),
            _ => {
                return Err(ReconciliationError::PartialEntry {
                    item_id: entry.item_id.clone(),
                    item: label.to_string(),
                })
            }
        };

        let rolls = whole_rolls(rolls).ok_or_else(|| ReconciliationError::InvalidRollCount {
            item_id: entry.item_id.clone(),
            item: label.to_string(),
            value: rolls.normalize().to_string(),
        })?;

        if main.is_sign_negative() && !main.is_zero() {
            return Err(ReconciliationError::NegativeQuantity {
                item_id: entry.item_id.clone(),
                item: label.to_string(),
                value: main.normalize().to_string(),
            });
        }

        // 实盘数按录入原样保存，不做取整
        if main.normalize().scale() > QTY_SCALE {
            return Err(ReconciliationError::ExcessPrecision {
                item_id: entry.item_id.clone(),
                item: label.to_string(),
                value: main.normalize().to_string(),
            });
        }

        let actual = Balance::new(main.normalize(), rolls);
        let diff = actual - book;
        if diff.is_zero() {
            Ok(LineOutcome::Unchanged { actual })
        } else {
            Ok(LineOutcome::Apply { actual, diff })
        }
    }

    /// 生成对账计划
    ///
    /// # 参数
    /// - audit_date: 盘点日期（也是调整流水日期）
    /// - entries: 实盘录入
    /// - snapshot: 加载盘点表时的账面快照
    /// - policy: 零差异行策略
    /// - adjustment_note: 调整流水备注
    ///
    /// # 返回
    /// - Ok(plan): 至少一行需要落库
    /// - Err: 第一个校验错误；或 NothingToSave
    #[instrument(skip(self, entries, snapshot, adjustment_note), fields(entries = entries.len()))]
    pub fn plan(
        &self,
        audit_date: NaiveDate,
        entries: &[CountEntry],
        snapshot: &BookSnapshot,
        policy: ZeroDiffPolicy,
        adjustment_note: Option<&str>,
    ) -> Result<ReconciliationPlan, ReconciliationError> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut lines = Vec::new();
        let mut skipped = 0usize;
        let mut unchanged = 0usize;

        for entry in entries {
            if entry.actual_main.is_none() && entry.actual_rolls.is_none() {
                skipped += 1;
                continue;
            }

            let book_entry = snapshot
                .get(&entry.item_id)
                .ok_or_else(|| ReconciliationError::UnknownItem(entry.item_id.clone()))?;

            if !seen.insert(entry.item_id.as_str()) {
                return Err(ReconciliationError::DuplicateEntry {
                    item_id: entry.item_id.clone(),
                    item: book_entry.label.clone(),
                });
            }

            match self.evaluate_line(entry, book_entry.book, &book_entry.label)? {
                LineOutcome::Skip => skipped += 1,
                LineOutcome::Unchanged { actual } => {
                    unchanged += 1;
                    if policy == ZeroDiffPolicy::Record {
                        lines.push(PlannedLine {
                            item_id: entry.item_id.clone(),
                            label: book_entry.label.clone(),
                            book: book_entry.book,
                            actual,
                            diff: Balance::ZERO,
                            adjustment: None,
                        });
                    }
                }
                LineOutcome::Apply { actual, diff } => {
                    let adjustment =
                        NewMovement::adjustment(&entry.item_id, audit_date, diff.main, diff.rolls)
                            .with_note(adjustment_note.map(str::to_string));
                    lines.push(PlannedLine {
                        item_id: entry.item_id.clone(),
                        label: book_entry.label.clone(),
                        book: book_entry.book,
                        actual,
                        diff,
                        adjustment: Some(adjustment),
                    });
                }
            }
        }

        let plan = ReconciliationPlan {
            audit_date,
            lines,
            skipped,
            unchanged,
        };

        let applied = plan.applied_count();
        let nothing = match policy {
            ZeroDiffPolicy::Skip => applied == 0,
            ZeroDiffPolicy::Record => plan.lines.is_empty(),
        };
        if nothing {
            debug!(skipped, unchanged, "没有可保存的盘点行");
            return Err(ReconciliationError::NothingToSave);
        }

        info!(
            applied,
            recorded = plan.lines.len(),
            skipped,
            unchanged,
            "对账计划生成"
        );
        Ok(plan)
    }

    /// 显式复核：计划中涉及的商品，账面快照必须与当前余额一致
    pub fn revalidate(
        &self,
        plan: &ReconciliationPlan,
        current: &HashMap<String, Balance>,
    ) -> Result<(), ReconciliationError> {
        let changed: Vec<String> = plan
            .lines
            .iter()
            .filter(|l| current.get(&l.item_id) != Some(&l.book))
            .map(|l| l.label.clone())
            .collect();

        if changed.is_empty() {
            Ok(())
        } else {
            Err(ReconciliationError::BookBalanceChanged { items: changed })
        }
    }

    /// "只看差异"视图：忽略未录入和不合法的行
    pub fn preview_differences(
        &self,
        entries: &[CountEntry],
        snapshot: &BookSnapshot,
    ) -> Vec<PlannedLine> {
        entries
            .iter()
            .filter_map(|entry| {
                let book_entry = snapshot.get(&entry.item_id)?;
                match self.evaluate_line(entry, book_entry.book, &book_entry.label) {
                    Ok(LineOutcome::Apply { actual, diff }) => Some(PlannedLine {
                        item_id: entry.item_id.clone(),
                        label: book_entry.label.clone(),
                        book: book_entry.book,
                        actual,
                        diff,
                        adjustment: None,
                    }),
                    _ => None,
                }
            })
            .collect()
    }
}

/// 非负整数卷数
fn whole_rolls(value: Decimal) -> Option<i64> {
    if value.is_sign_negative() && !value.is_zero() {
        return None;
    }
    if !value.fract().is_zero() {
        return None;
    }
    value.trunc().to_i64()
}
