// ==========================================
// 纺织品库存台账系统 - 库存流水实体
// ==========================================
// 职责: Movement / NewMovement / MovementFilter / MovementPatch
// 红线: 流水只记录流量，不记录余额；流水只追加，更正通过冲销/替代完成
// ==========================================

use crate::domain::types::{round_qty, MovementKind};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// Movement - 台账流水
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub movement_id: String,
    pub item_id: String,
    pub move_date: NaiveDate,
    pub kind: MovementKind,
    pub qty_main_in: Decimal,
    pub qty_main_out: Decimal,
    pub qty_rolls_in: i64,
    pub qty_rolls_out: i64,
    pub note: Option<String>,
    /// 盘点调整流水所属会话
    pub session_id: Option<String>,
    /// 冲销流水指向被冲销的流水
    pub reverses_id: Option<String>,
    /// 替代流水指向被替代（已冲销）的流水
    pub supersedes_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Movement {
    /// 主数量净变动（入 - 出）
    pub fn delta_main(&self) -> Decimal {
        self.qty_main_in - self.qty_main_out
    }

    /// 卷数净变动（入 - 出）
    pub fn delta_rolls(&self) -> i64 {
        self.qty_rolls_in - self.qty_rolls_out
    }

    pub fn is_reversal(&self) -> bool {
        self.reverses_id.is_some()
    }
}

// ==========================================
// NewMovement - 待写入流水
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMovement {
    pub item_id: String,
    pub move_date: NaiveDate,
    pub kind: MovementKind,
    pub qty_main_in: Decimal,
    pub qty_main_out: Decimal,
    pub qty_rolls_in: i64,
    pub qty_rolls_out: i64,
    pub note: Option<String>,
    pub session_id: Option<String>,
}

impl NewMovement {
    /// 采购：计入"入"列
    pub fn purchase(item_id: &str, move_date: NaiveDate, qty_main: Decimal, rolls: i64) -> Self {
        Self {
            item_id: item_id.to_string(),
            move_date,
            kind: MovementKind::Purchase,
            qty_main_in: round_qty(qty_main),
            qty_main_out: Decimal::ZERO,
            qty_rolls_in: rolls,
            qty_rolls_out: 0,
            note: None,
            session_id: None,
        }
    }

    /// 销售：计入"出"列
    pub fn sale(item_id: &str, move_date: NaiveDate, qty_main: Decimal, rolls: i64) -> Self {
        Self {
            item_id: item_id.to_string(),
            move_date,
            kind: MovementKind::Sale,
            qty_main_in: Decimal::ZERO,
            qty_main_out: round_qty(qty_main),
            qty_rolls_in: 0,
            qty_rolls_out: rolls,
            note: None,
            session_id: None,
        }
    }

    /// 按签名差异拆分为入/出两列：in = max(diff, 0)，out = max(-diff, 0)
    pub fn adjustment(
        item_id: &str,
        move_date: NaiveDate,
        diff_main: Decimal,
        diff_rolls: i64,
    ) -> Self {
        let diff_main = round_qty(diff_main);
        Self {
            item_id: item_id.to_string(),
            move_date,
            kind: MovementKind::Adjustment,
            qty_main_in: diff_main.max(Decimal::ZERO),
            qty_main_out: (-diff_main).max(Decimal::ZERO),
            qty_rolls_in: diff_rolls.max(0),
            qty_rolls_out: (-diff_rolls).max(0),
            note: None,
            session_id: None,
        }
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }

    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    pub fn delta_main(&self) -> Decimal {
        self.qty_main_in - self.qty_main_out
    }

    pub fn delta_rolls(&self) -> i64 {
        self.qty_rolls_in - self.qty_rolls_out
    }
}

// ==========================================
// MovementFilter - 查询条件
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementFilter {
    pub item_ids: Option<Vec<String>>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub kind: Option<MovementKind>,
    /// 是否包含已冲销的流水及冲销流水本身（汇总余额时必须包含）
    pub include_voided: bool,
}

impl MovementFilter {
    /// 全量（含冲销对），用于余额汇总
    pub fn all() -> Self {
        Self {
            include_voided: true,
            ..Default::default()
        }
    }
}

// ==========================================
// MovementPatch - 更正请求
// ==========================================
/// 仅改备注时原地更新；涉及数量/日期/商品时走"替代"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementPatch {
    pub note: Option<String>,
    pub move_date: Option<NaiveDate>,
    pub item_id: Option<String>,
    pub qty_main: Option<Decimal>,
    pub qty_rolls: Option<i64>,
}

impl MovementPatch {
    pub fn is_note_only(&self) -> bool {
        self.move_date.is_none()
            && self.item_id.is_none()
            && self.qty_main.is_none()
            && self.qty_rolls.is_none()
    }

    /// 基于原流水生成替代流水（方向沿用原流水）
    pub fn corrected(&self, original: &Movement) -> NewMovement {
        let item_id = self.item_id.clone().unwrap_or_else(|| original.item_id.clone());
        let move_date = self.move_date.unwrap_or(original.move_date);
        let note = match &self.note {
            Some(n) => Some(n.clone()),
            None => original.note.clone(),
        };

        let outbound = original.qty_main_out > Decimal::ZERO || original.qty_rolls_out > 0;
        let main = self.qty_main.map(round_qty).unwrap_or(if outbound {
            original.qty_main_out
        } else {
            original.qty_main_in
        });
        let rolls = self.qty_rolls.unwrap_or(if outbound {
            original.qty_rolls_out
        } else {
            original.qty_rolls_in
        });

        let (qty_main_in, qty_main_out, qty_rolls_in, qty_rolls_out) = if outbound {
            (Decimal::ZERO, main, 0, rolls)
        } else {
            (main, Decimal::ZERO, rolls, 0)
        };

        NewMovement {
            item_id,
            move_date,
            kind: original.kind,
            qty_main_in,
            qty_main_out,
            qty_rolls_in,
            qty_rolls_out,
            note,
            session_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_adjustment_split() {
        let adj = NewMovement::adjustment("i1", d(2026, 3, 1), dec!(2.5), -2);
        assert_eq!(adj.qty_main_in, dec!(2.5));
        assert_eq!(adj.qty_main_out, dec!(0));
        assert_eq!(adj.qty_rolls_in, 0);
        assert_eq!(adj.qty_rolls_out, 2);
        assert_eq!(adj.delta_main(), dec!(2.5));
        assert_eq!(adj.delta_rolls(), -2);
    }

    #[test]
    fn test_patch_corrected_keeps_direction() {
        let original = Movement {
            movement_id: "m1".to_string(),
            item_id: "i1".to_string(),
            move_date: d(2026, 3, 1),
            kind: MovementKind::Sale,
            qty_main_in: dec!(0),
            qty_main_out: dec!(5),
            qty_rolls_in: 0,
            qty_rolls_out: 1,
            note: Some("x".to_string()),
            session_id: None,
            reverses_id: None,
            supersedes_id: None,
            created_at: Utc::now(),
        };
        let patch = MovementPatch {
            qty_main: Some(dec!(4.25)),
            ..Default::default()
        };
        assert!(!patch.is_note_only());

        let fixed = patch.corrected(&original);
        assert_eq!(fixed.kind, MovementKind::Sale);
        assert_eq!(fixed.qty_main_out, dec!(4.25));
        assert_eq!(fixed.qty_rolls_out, 1);
        assert_eq!(fixed.note.as_deref(), Some("x"));
    }
}
