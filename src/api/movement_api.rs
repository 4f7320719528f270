// ==========================================
// 纺织品库存台账系统 - 流水 API（采购 / 销售）
// ==========================================
// 职责: 批量录入、查询、冲销、替代、更正、删除
// 红线: 流水只追加；更正以冲销 + 替代实现
// 红线: 已封存流水不可改动；新流水和替代流水都不能落入盘点封存期
// ==========================================

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::{positive_qty, positive_rolls, ItemValidator};
use crate::domain::item::Item;
use crate::domain::movement::{Movement, MovementFilter, MovementPatch, NewMovement};
use crate::domain::text::{non_empty, normalize_key_part};
use crate::domain::types::{MovementKind, UnitKind};
use crate::repository::{ItemRepository, LedgerStore, MovementRepository};

/// 单行录入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementLineInput {
    pub item_id: String,
    pub qty_main: Decimal,
    /// 按十进制接收，校验为正整数
    pub qty_rolls: Decimal,
    pub note: Option<String>,
}

/// 流水列表查询条件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementQuery {
    pub kind: Option<MovementKind>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// 在 商品显示名/色号/备注 中搜索
    pub search: Option<String>,
    pub include_voided: bool,
}

/// 流水 + 商品显示字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementView {
    pub movement: Movement,
    pub label: Option<String>,
    pub color_code: Option<String>,
    pub unit: Option<UnitKind>,
    /// 已被冲销
    pub voided: bool,
}

// ==========================================
// MovementApi - 流水 API
// ==========================================
pub struct MovementApi {
    store: Arc<dyn LedgerStore>,
    movement_repo: Arc<MovementRepository>,
    item_repo: Arc<ItemRepository>,
    validator: ItemValidator,
}

impl MovementApi {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        movement_repo: Arc<MovementRepository>,
        item_repo: Arc<ItemRepository>,
    ) -> Self {
        Self {
            store,
            movement_repo,
            validator: ItemValidator::new(item_repo.clone()),
            item_repo,
        }
    }

    // ==========================================
    // 录入
    // ==========================================

    /// 批量录入采购或销售
    ///
    /// # 参数
    /// - kind: Purchase（计入"入"列）或 Sale（计入"出"列）
    /// - move_date: 流水日期
    /// - lines: 录入行（全部校验通过才写库，单事务）
    ///
    /// # 返回
    /// - Err(MovementSealed): 日期不晚于某商品最近一次盘点日期，整批不写入
    #[instrument(skip(self, lines), fields(kind = %kind, lines = lines.len()))]
    pub fn record(
        &self,
        kind: MovementKind,
        move_date: NaiveDate,
        lines: &[MovementLineInput],
    ) -> ApiResult<Vec<Movement>> {
        if lines.is_empty() {
            return Err(ApiError::InvalidInput("至少需要一行".to_string()));
        }

        let mut rows = Vec::with_capacity(lines.len());
        for (idx, line) in lines.iter().enumerate() {
            let n = idx + 1;
            self.validator.require_active_item(&line.item_id, n)?;
            let qty = positive_qty(line.qty_main, n)?;
            let rolls = positive_rolls(line.qty_rolls, n)?;

            let row = match kind {
                MovementKind::Purchase => NewMovement::purchase(&line.item_id, move_date, qty, rolls),
                MovementKind::Sale => NewMovement::sale(&line.item_id, move_date, qty, rolls),
                MovementKind::Adjustment => {
                    return Err(ApiError::InvalidInput(
                        "调整流水只能由盘点提交生成".to_string(),
                    ))
                }
            };
            rows.push(row.with_note(non_empty(line.note.as_deref())));
        }

        let written = self.store.insert_movements(&rows)?;
        info!(count = written.len(), "流水已录入");
        Ok(written)
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 按类型/日期区间查询，附带商品显示字段
    pub fn list(&self, query: &MovementQuery) -> ApiResult<Vec<MovementView>> {
        let movements = self.store.list_movements(&MovementFilter {
            item_ids: None,
            date_from: query.date_from,
            date_to: query.date_to,
            kind: query.kind,
            include_voided: query.include_voided,
        })?;

        let items: HashMap<String, Item> = self
            .item_repo
            .list(false)?
            .into_iter()
            .map(|i| (i.item_id.clone(), i))
            .collect();
        let voided: HashSet<String> = movements
            .iter()
            .filter_map(|m| m.reverses_id.clone())
            .collect();
        let needle = query
            .search
            .as_deref()
            .map(normalize_key_part)
            .unwrap_or_default();

        let mut views: Vec<MovementView> = movements
            .into_iter()
            .map(|m| {
                let item = items.get(&m.item_id);
                MovementView {
                    voided: voided.contains(&m.movement_id),
                    label: item.map(Item::material_label),
                    color_code: item.map(|i| i.color_code.clone()),
                    unit: item.map(|i| i.unit),
                    movement: m,
                }
            })
            .filter(|v| needle.is_empty() || search_text(v).contains(&needle))
            .collect();

        // 新日期在前
        views.sort_by(|a, b| {
            b.movement
                .move_date
                .cmp(&a.movement.move_date)
                .then_with(|| b.movement.created_at.cmp(&a.movement.created_at))
        });
        Ok(views)
    }

    // ==========================================
    // 更正
    // ==========================================

    /// 冲销
    ///
    /// # 返回
    /// - Ok(Movement): 冲销流水
    pub fn void(&self, movement_id: &str, note: Option<&str>) -> ApiResult<Movement> {
        self.ensure_not_sealed(movement_id)?;
        Ok(self.movement_repo.void(movement_id, non_empty(note).as_deref())?)
    }

    /// 替代：冲销原流水 + 追加更正流水（同一事务）
    ///
    /// # 返回
    /// - Ok((冲销流水, 替代流水))
    pub fn supersede(
        &self,
        movement_id: &str,
        patch: &MovementPatch,
    ) -> ApiResult<(Movement, Movement)> {
        self.validate_patch(patch)?;
        self.ensure_not_sealed(movement_id)?;
        let original = self.find(movement_id)?;
        Ok(self
            .movement_repo
            .supersede(movement_id, &patch.corrected(&original))?)
    }

    /// 更正：只改备注时原地更新，否则走替代
    ///
    /// # 返回
    /// - Ok(Movement): 更正后的当前有效流水
    pub fn update(&self, movement_id: &str, patch: &MovementPatch) -> ApiResult<Movement> {
        self.validate_patch(patch)?;
        if !patch.is_note_only() {
            self.ensure_not_sealed(movement_id)?;
        }
        Ok(self.store.update_movement(movement_id, patch)?)
    }

    /// 删除（以冲销实现）
    pub fn delete(&self, movement_id: &str) -> ApiResult<Movement> {
        self.ensure_not_sealed(movement_id)?;
        Ok(self.store.delete_movement(movement_id)?)
    }

    fn find(&self, movement_id: &str) -> ApiResult<Movement> {
        self.movement_repo
            .find_by_id(movement_id)?
            .ok_or_else(|| ApiError::NotFound(format!("流水(id={})不存在", movement_id)))
    }

    fn ensure_not_sealed(&self, movement_id: &str) -> ApiResult<()> {
        let movement = self.find(movement_id)?;
        if self.movement_repo.is_sealed(movement_id)? {
            return Err(ApiError::MovementSealed(format!(
                "{} ({})",
                movement_id, movement.move_date
            )));
        }
        Ok(())
    }

    fn validate_patch(&self, patch: &MovementPatch) -> ApiResult<()> {
        if let Some(item_id) = &patch.item_id {
            self.validator.require_active_item(item_id, 1)?;
        }
        if let Some(qty) = patch.qty_main {
            positive_qty(qty, 1)?;
        }
        if let Some(rolls) = patch.qty_rolls {
            positive_rolls(Decimal::from(rolls), 1)?;
        }
        Ok(())
    }
}

fn search_text(view: &MovementView) -> String {
    let parts = [
        view.label.as_deref().unwrap_or_default(),
        view.color_code.as_deref().unwrap_or_default(),
        view.movement.note.as_deref().unwrap_or_default(),
    ];
    normalize_key_part(&parts.join(" "))
}
