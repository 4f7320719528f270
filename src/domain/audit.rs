// ==========================================
// 纺织品库存台账系统 - 盘点实体
// ==========================================
// 职责: 盘点会话 / 盘点行 / 录入 / 账面快照 / 对账计划
// 红线: 盘点行只在提交会话时创建，之后不可变
// ==========================================

use crate::domain::balance::Balance;
use crate::domain::movement::NewMovement;
use crate::domain::types::UnitKind;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// AuditSession - 盘点会话
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSession {
    pub session_id: String,
    pub audit_date: NaiveDate,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 会话列表项（含行数）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSessionSummary {
    pub session: AuditSession,
    pub line_count: i64,
}

// ==========================================
// AuditLine - 盘点行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLine {
    pub line_id: String,
    pub session_id: String,
    pub audit_date: NaiveDate,
    pub item_id: String,
    pub book_main: Decimal,
    pub book_rolls: i64,
    pub actual_main: Decimal,
    pub actual_rolls: i64,
    pub diff_main: Decimal,
    pub diff_rolls: i64,
}

/// 会话明细行（关联商品显示字段，商品缺失时为 None）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLineView {
    pub line: AuditLine,
    pub material_label: Option<String>,
    pub color_code: Option<String>,
    pub unit: Option<UnitKind>,
}

// ==========================================
// CountEntry - 实盘录入
// ==========================================
/// 两个字段都可空：都空为跳过；只填一个为不完整
///
/// 卷数以 Decimal 接收，便于识别非整数输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountEntry {
    pub item_id: String,
    pub actual_main: Option<Decimal>,
    pub actual_rolls: Option<Decimal>,
}

impl CountEntry {
    pub fn new(item_id: &str, actual_main: Option<Decimal>, actual_rolls: Option<Decimal>) -> Self {
        Self {
            item_id: item_id.to_string(),
            actual_main,
            actual_rolls,
        }
    }
}

// ==========================================
// BookSnapshot - 加载盘点表时的账面快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookEntry {
    pub item_id: String,
    pub label: String,
    pub unit: UnitKind,
    pub book: Balance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub loaded_at: DateTime<Utc>,
    pub entries: HashMap<String, BookEntry>,
}

impl BookSnapshot {
    pub fn get(&self, item_id: &str) -> Option<&BookEntry> {
        self.entries.get(item_id)
    }

    /// 盘点表行（按显示名排序）
    pub fn sheet_rows(&self) -> Vec<&BookEntry> {
        let mut rows: Vec<&BookEntry> = self.entries.values().collect();
        rows.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.item_id.cmp(&b.item_id)));
        rows
    }
}

// ==========================================
// ReconciliationPlan - 待提交的对账结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedLine {
    pub item_id: String,
    pub label: String,
    pub book: Balance,
    pub actual: Balance,
    pub diff: Balance,
    /// 非零差异才有调整流水；零差异确认行为 None
    pub adjustment: Option<NewMovement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationPlan {
    pub audit_date: NaiveDate,
    pub lines: Vec<PlannedLine>,
    /// 两项都未录入
    pub skipped: usize,
    /// 与账面完全一致
    pub unchanged: usize,
}

impl ReconciliationPlan {
    /// 产生调整流水的行数
    pub fn applied_count(&self) -> usize {
        self.lines.iter().filter(|l| l.adjustment.is_some()).count()
    }
}

/// 提交结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub session_id: String,
    pub applied_count: usize,
    pub recorded_lines: usize,
}
