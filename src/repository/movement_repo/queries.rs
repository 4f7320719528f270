use super::core::MovementRepository;
use crate::domain::movement::{Movement, MovementFilter};
use crate::domain::types::MovementKind;
use crate::repository::codec::{date_to_db, get_date, get_qty, get_ts, placeholders};
use crate::repository::error::RepositoryResult;
use chrono::NaiveDate;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const MOVEMENT_COLUMNS: &str = "m.movement_id, m.item_id, m.move_date, m.kind, \
     m.qty_main_in, m.qty_main_out, m.qty_rolls_in, m.qty_rolls_out, \
     m.note, m.session_id, m.reverses_id, m.supersedes_id, m.created_at";

impl MovementRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, movement_id: &str) -> RepositoryResult<Option<Movement>> {
        let conn = self.get_conn()?;
        load_movement(&conn, movement_id)
    }

    /// 按条件查询流水
    ///
    /// # 参数
    /// - filter: 商品/日期/类型条件；include_voided=false 时排除冲销对
    /// - chunk_size: item_ids 分块大小
    ///
    /// # 返回
    /// - 按 (move_date, created_at) 升序
    pub fn list(&self, filter: &MovementFilter, chunk_size: usize) -> RepositoryResult<Vec<Movement>> {
        let conn = self.get_conn()?;
        list_movements_with(&conn, filter, chunk_size)
    }

    /// 是否已被盘点封存
    pub fn is_sealed(&self, movement_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        match load_movement(&conn, movement_id)? {
            Some(m) => is_sealed_with(&conn, &m),
            None => Ok(false),
        }
    }

    /// 商品在该日期是否已被盘点封存（新流水/替代流水落点检查）
    pub fn is_date_sealed(&self, item_id: &str, move_date: NaiveDate) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        is_date_sealed_with(&conn, item_id, move_date)
    }

    /// 是否已有冲销流水
    pub fn is_voided(&self, movement_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        is_voided_with(&conn, movement_id)
    }
}

/// 在给定连接/事务上按条件查询流水（按 (move_date, created_at) 升序）
pub(crate) fn list_movements_with(
    conn: &Connection,
    filter: &MovementFilter,
    chunk_size: usize,
) -> RepositoryResult<Vec<Movement>> {
    let mut out = match &filter.item_ids {
        Some(ids) if ids.is_empty() => Vec::new(),
        Some(ids) => {
            let mut acc = Vec::new();
            for chunk in ids.chunks(chunk_size.max(1)) {
                acc.extend(query_movements(conn, filter, Some(chunk))?);
            }
            acc
        }
        None => query_movements(conn, filter, None)?,
    };

    out.sort_by(|a, b| {
        a.move_date
            .cmp(&b.move_date)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
    Ok(out)
}

fn query_movements(
    conn: &Connection,
    filter: &MovementFilter,
    item_ids: Option<&[String]>,
) -> RepositoryResult<Vec<Movement>> {
    let mut sql = format!("SELECT {} FROM movements m WHERE 1 = 1", MOVEMENT_COLUMNS);
    let mut args: Vec<Value> = Vec::new();

    if let Some(ids) = item_ids {
        sql.push_str(&format!(" AND m.item_id IN ({})", placeholders(ids.len())));
        args.extend(ids.iter().map(|id| Value::Text(id.clone())));
    }
    if let Some(from) = filter.date_from {
        sql.push_str(" AND m.move_date >= ?");
        args.push(Value::Text(date_to_db(from)));
    }
    if let Some(to) = filter.date_to {
        sql.push_str(" AND m.move_date <= ?");
        args.push(Value::Text(date_to_db(to)));
    }
    if let Some(kind) = filter.kind {
        sql.push_str(" AND m.kind = ?");
        args.push(Value::Text(kind.to_db_str().to_string()));
    }
    if !filter.include_voided {
        sql.push_str(
            " AND m.reverses_id IS NULL \
              AND NOT EXISTS (SELECT 1 FROM movements r WHERE r.reverses_id = m.movement_id)",
        );
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(args.iter()), map_movement_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub(super) fn load_movement(conn: &Connection, movement_id: &str) -> RepositoryResult<Option<Movement>> {
    let sql = format!("SELECT {} FROM movements m WHERE m.movement_id = ?1", MOVEMENT_COLUMNS);
    let row = conn
        .query_row(&sql, params![movement_id], map_movement_row)
        .optional()?;
    Ok(row)
}

/// 封存规则：属于盘点会话，或同商品存在盘点日期不早于流水日期的盘点行
pub(super) fn is_sealed_with(conn: &Connection, movement: &Movement) -> RepositoryResult<bool> {
    if movement.session_id.is_some() {
        return Ok(true);
    }
    is_date_sealed_with(conn, &movement.item_id, movement.move_date)
}

/// 该商品在该日期是否已落入盘点封存期
pub(super) fn is_date_sealed_with(
    conn: &Connection,
    item_id: &str,
    move_date: NaiveDate,
) -> RepositoryResult<bool> {
    let hit: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM audit_lines WHERE item_id = ?1 AND audit_date >= ?2 LIMIT 1",
            params![item_id, date_to_db(move_date)],
            |row| row.get(0),
        )
        .optional()?;
    Ok(hit.is_some())
}

pub(super) fn is_voided_with(conn: &Connection, movement_id: &str) -> RepositoryResult<bool> {
    let hit: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM movements WHERE reverses_id = ?1 LIMIT 1",
            params![movement_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(hit.is_some())
}

fn map_movement_row(row: &Row<'_>) -> rusqlite::Result<Movement> {
    let kind_raw: String = row.get(3)?;
    let kind = MovementKind::from_str(&kind_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            format!("未知流水类型: {}", kind_raw).into(),
        )
    })?;
    Ok(Movement {
        movement_id: row.get(0)?,
        item_id: row.get(1)?,
        move_date: get_date(row, 2)?,
        kind,
        qty_main_in: get_qty(row, 4)?,
        qty_main_out: get_qty(row, 5)?,
        qty_rolls_in: row.get(6)?,
        qty_rolls_out: row.get(7)?,
        note: row.get(8)?,
        session_id: row.get(9)?,
        reverses_id: row.get(10)?,
        supersedes_id: row.get(11)?,
        created_at: get_ts(row, 12)?,
    })
}
