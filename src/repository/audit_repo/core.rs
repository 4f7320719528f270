use crate::db::open_sqlite_connection;
use crate::domain::audit::{AuditLine, AuditLineView, AuditSession, AuditSessionSummary};
use crate::domain::movement::{Movement, NewMovement};
use crate::domain::types::UnitKind;
use crate::repository::codec::{date_to_db, get_date, get_qty, get_ts, qty_to_db, ts_to_db};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::movement_repo::insert_movement_tx;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::instrument;

// ==========================================
// AuditRepository - 盘点仓储
// ==========================================
pub struct AuditRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AuditRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 原子提交盘点
    ///
    /// # 参数
    /// - session: 会话头
    /// - lines: 盘点行（session_id 必须与会话一致）
    /// - adjustments: 调整流水（写入时挂到该会话）
    ///
    /// # 返回
    /// - Ok(Vec<Movement>): 已写入的调整流水
    #[instrument(skip(self, lines, adjustments), fields(session_id = %session.session_id, lines = lines.len(), adjustments = adjustments.len()))]
    pub fn commit(
        &self,
        session: &AuditSession,
        lines: &[AuditLine],
        adjustments: &[NewMovement],
    ) -> RepositoryResult<Vec<Movement>> {
        self.commit_guarded(session, lines, adjustments, |_| Ok::<(), RepositoryError>(()))
    }

    /// 原子提交盘点，写入前先在同一事务内执行 guard
    ///
    /// # 参数
    /// - guard: 在事务连接上做最终检查（如账面复核）；返回 Err 时整单回滚
    ///
    /// # 返回
    /// - Ok(Vec<Movement>): 已写入的调整流水
    /// - Err(E): guard 的错误，或转换后的仓储错误
    pub fn commit_guarded<E, F>(
        &self,
        session: &AuditSession,
        lines: &[AuditLine],
        adjustments: &[NewMovement],
        guard: F,
    ) -> Result<Vec<Movement>, E>
    where
        E: From<RepositoryError>,
        F: FnOnce(&Connection) -> Result<(), E>,
    {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction().map_err(RepositoryError::from)?;

        guard(&*tx)?;

        insert_session_with(&tx, session)?;
        for line in lines {
            insert_line_with(&tx, line)?;
        }
        let mut written = Vec::with_capacity(adjustments.len());
        for adj in adjustments {
            let adj = adj.clone().with_session(&session.session_id);
            written.push(insert_movement_tx(&tx, &adj, None, None)?);
        }

        tx.commit().map_err(RepositoryError::from)?;
        Ok(written)
    }

    /// 单独写入会话头
    pub fn insert_session(&self, session: &AuditSession) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        insert_session_with(&conn, session)
    }

    /// 单独写入盘点行（单事务）
    pub fn insert_lines(&self, lines: &[AuditLine]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        for line in lines {
            insert_line_with(&tx, line)?;
        }
        tx.commit()?;
        Ok(lines.len())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 会话列表（按盘点日期、创建时间倒序）
    pub fn list_sessions(
        &self,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
    ) -> RepositoryResult<Vec<AuditSessionSummary>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT s.session_id, s.audit_date, s.note, s.created_at,
                   (SELECT COUNT(*) FROM audit_lines l WHERE l.session_id = s.session_id)
            FROM audit_sessions s
            WHERE (?1 IS NULL OR s.audit_date >= ?1)
              AND (?2 IS NULL OR s.audit_date <= ?2)
            ORDER BY s.audit_date DESC, s.created_at DESC
            "#,
        )?;
        let rows = stmt
            .query_map(
                params![date_from.map(date_to_db), date_to.map(date_to_db)],
                |row| {
                    Ok(AuditSessionSummary {
                        session: map_session_row(row)?,
                        line_count: row.get(4)?,
                    })
                },
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn find_session(&self, session_id: &str) -> RepositoryResult<Option<AuditSession>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                "SELECT session_id, audit_date, note, created_at FROM audit_sessions WHERE session_id = ?1",
                params![session_id],
                map_session_row,
            )
            .optional()?;
        Ok(row)
    }

    /// 会话明细（关联商品显示字段）
    pub fn list_lines(&self, session_id: &str) -> RepositoryResult<Vec<AuditLineView>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT l.line_id, l.session_id, l.audit_date, l.item_id,
                   l.book_main, l.book_rolls, l.actual_main, l.actual_rolls,
                   l.diff_main, l.diff_rolls,
                   i.main_category, i.sub_category, i.item_name, i.color_code, i.unit
            FROM audit_lines l
            LEFT JOIN items i ON i.item_id = l.item_id
            WHERE l.session_id = ?1
            ORDER BY i.main_category, i.sub_category, i.item_name, i.color_code
            "#,
        )?;
        let rows = stmt
            .query_map(params![session_id], map_line_view_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn insert_session_with(conn: &Connection, session: &AuditSession) -> RepositoryResult<()> {
    conn.execute(
        "INSERT INTO audit_sessions (session_id, audit_date, note, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            session.session_id,
            date_to_db(session.audit_date),
            session.note,
            ts_to_db(session.created_at),
        ],
    )?;
    Ok(())
}

fn insert_line_with(conn: &Connection, line: &AuditLine) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT INTO audit_lines (
            line_id, session_id, audit_date, item_id,
            book_main, book_rolls, actual_main, actual_rolls, diff_main, diff_rolls
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            line.line_id,
            line.session_id,
            date_to_db(line.audit_date),
            line.item_id,
            qty_to_db(line.book_main),
            line.book_rolls,
            qty_to_db(line.actual_main),
            line.actual_rolls,
            qty_to_db(line.diff_main),
            line.diff_rolls,
        ],
    )?;
    Ok(())
}

fn map_session_row(row: &Row<'_>) -> rusqlite::Result<AuditSession> {
    Ok(AuditSession {
        session_id: row.get(0)?,
        audit_date: get_date(row, 1)?,
        note: row.get(2)?,
        created_at: get_ts(row, 3)?,
    })
}

fn map_line_view_row(row: &Row<'_>) -> rusqlite::Result<AuditLineView> {
    let line = AuditLine {
        line_id: row.get(0)?,
        session_id: row.get(1)?,
        audit_date: get_date(row, 2)?,
        item_id: row.get(3)?,
        book_main: get_qty(row, 4)?,
        book_rolls: row.get(5)?,
        actual_main: get_qty(row, 6)?,
        actual_rolls: row.get(7)?,
        diff_main: get_qty(row, 8)?,
        diff_rolls: row.get(9)?,
    };

    let main: Option<String> = row.get(10)?;
    let sub: Option<String> = row.get(11)?;
    let name: Option<String> = row.get(12)?;
    let material_label = name.as_ref().map(|n| {
        [main.as_deref(), sub.as_deref(), Some(n.as_str())]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" - ")
    });
    let unit: Option<String> = row.get(14)?;

    Ok(AuditLineView {
        line,
        material_label,
        color_code: row.get(13)?,
        unit: unit.as_deref().and_then(UnitKind::from_str),
    })
}
