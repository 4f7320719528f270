use super::queries::{is_date_sealed_with, is_sealed_with, is_voided_with, load_movement};
use crate::db::open_sqlite_connection;
use crate::domain::movement::{Movement, NewMovement};
use crate::repository::codec::{date_to_db, qty_to_db, ts_to_db};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

// ==========================================
// MovementRepository - 流水仓储
// ==========================================
pub struct MovementRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MovementRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub(super) fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 批量追加流水（单事务）
    ///
    /// # 返回
    /// - Ok(Vec<Movement>): 落库后的流水（含生成的 id）
    /// - Err(BusinessRuleViolation): 任一行日期落入该商品的盘点封存期，整批不写入
    pub fn insert_batch(&self, rows: &[NewMovement]) -> RepositoryResult<Vec<Movement>> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            ensure_open_period(&tx, row)?;
            out.push(insert_movement_tx(&tx, row, None, None)?);
        }
        tx.commit()?;
        Ok(out)
    }

    /// 仅修改备注（原地更新，不影响余额）
    pub fn update_note(&self, movement_id: &str, note: Option<&str>) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE movements SET note = ?2 WHERE movement_id = ?1",
            params![movement_id, note],
        )?;
        if rows == 0 {
            return Err(not_found(movement_id));
        }
        Ok(())
    }

    /// 冲销：追加一条方向相反、日期相同的流水
    ///
    /// # 返回
    /// - Ok(Movement): 冲销流水
    /// - Err(BusinessRuleViolation): 冲销流水本身、已冲销或已封存
    pub fn void(&self, movement_id: &str, note: Option<&str>) -> RepositoryResult<Movement> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let original = load_voidable(&tx, movement_id)?;
        let reversal = insert_movement_tx(&tx, &reversal_of(&original, note), Some(movement_id), None)?;
        tx.commit()?;
        tracing::info!(movement_id = %movement_id, reversal_id = %reversal.movement_id, "流水已冲销");
        Ok(reversal)
    }

    /// 替代：冲销原流水并追加更正后的流水（同一事务）
    ///
    /// # 返回
    /// - Ok((冲销流水, 替代流水))
    pub fn supersede(
        &self,
        movement_id: &str,
        replacement: &NewMovement,
    ) -> RepositoryResult<(Movement, Movement)> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let original = load_voidable(&tx, movement_id)?;
        // 替代流水也不能改写已盘点的期间（改日期 / 改商品）
        ensure_open_period(&tx, replacement)?;
        let reversal =
            insert_movement_tx(&tx, &reversal_of(&original, None), Some(movement_id), None)?;
        let fixed = insert_movement_tx(&tx, replacement, None, Some(movement_id))?;
        tx.commit()?;
        tracing::info!(
            movement_id = %movement_id,
            replacement_id = %fixed.movement_id,
            "流水已替代"
        );
        Ok((reversal, fixed))
    }
}

fn not_found(movement_id: &str) -> RepositoryError {
    RepositoryError::NotFound {
        entity: "Movement".to_string(),
        id: movement_id.to_string(),
    }
}

/// 读取可冲销的原流水
fn load_voidable(conn: &Connection, movement_id: &str) -> RepositoryResult<Movement> {
    let original = load_movement(conn, movement_id)?.ok_or_else(|| not_found(movement_id))?;
    if original.is_reversal() {
        return Err(RepositoryError::BusinessRuleViolation(format!(
            "冲销流水不可再次冲销: {}",
            movement_id
        )));
    }
    if is_voided_with(conn, movement_id)? {
        return Err(RepositoryError::BusinessRuleViolation(format!(
            "流水已冲销: {}",
            movement_id
        )));
    }
    if is_sealed_with(conn, &original)? {
        return Err(RepositoryError::BusinessRuleViolation(format!(
            "流水已被盘点封存: {}",
            movement_id
        )));
    }
    Ok(original)
}

/// 新写入的流水（非盘点调整）不能落入盘点封存期
fn ensure_open_period(conn: &Connection, row: &NewMovement) -> RepositoryResult<()> {
    if row.session_id.is_none() && is_date_sealed_with(conn, &row.item_id, row.move_date)? {
        return Err(RepositoryError::BusinessRuleViolation(format!(
            "流水日期已被盘点封存: item_id={}, 日期={}",
            row.item_id, row.move_date
        )));
    }
    Ok(())
}

/// 冲销流水：入/出互换，其余沿用
fn reversal_of(original: &Movement, note: Option<&str>) -> NewMovement {
    NewMovement {
        item_id: original.item_id.clone(),
        move_date: original.move_date,
        kind: original.kind,
        qty_main_in: original.qty_main_out,
        qty_main_out: original.qty_main_in,
        qty_rolls_in: original.qty_rolls_out,
        qty_rolls_out: original.qty_rolls_in,
        note: note.map(str::to_string),
        session_id: None,
    }
}

/// 在给定连接/事务上追加一条流水
pub(crate) fn insert_movement_tx(
    conn: &Connection,
    row: &NewMovement,
    reverses_id: Option<&str>,
    supersedes_id: Option<&str>,
) -> RepositoryResult<Movement> {
    let movement = Movement {
        movement_id: Uuid::new_v4().to_string(),
        item_id: row.item_id.clone(),
        move_date: row.move_date,
        kind: row.kind,
        qty_main_in: row.qty_main_in,
        qty_main_out: row.qty_main_out,
        qty_rolls_in: row.qty_rolls_in,
        qty_rolls_out: row.qty_rolls_out,
        note: row.note.clone(),
        session_id: row.session_id.clone(),
        reverses_id: reverses_id.map(str::to_string),
        supersedes_id: supersedes_id.map(str::to_string),
        created_at: Utc::now(),
    };

    conn.execute(
        r#"
        INSERT INTO movements (
            movement_id, item_id, move_date, kind,
            qty_main_in, qty_main_out, qty_rolls_in, qty_rolls_out,
            note, session_id, reverses_id, supersedes_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
        params![
            movement.movement_id,
            movement.item_id,
            date_to_db(movement.move_date),
            movement.kind.to_db_str(),
            qty_to_db(movement.qty_main_in),
            qty_to_db(movement.qty_main_out),
            movement.qty_rolls_in,
            movement.qty_rolls_out,
            movement.note,
            movement.session_id,
            movement.reverses_id,
            movement.supersedes_id,
            ts_to_db(movement.created_at),
        ],
    )?;

    Ok(movement)
}
