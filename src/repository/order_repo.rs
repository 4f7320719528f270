// ==========================================
// 纺织品库存台账系统 - 客户预订单仓储
// ==========================================
// 职责: customer_orders / customer_order_lines 读写，草稿占用统计
// 红线: 订单行不引用 items 外键，商品删除后订单仍可查看
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::order::{CustomerOrder, OrderLine};
use crate::domain::types::OrderStatus;
use crate::repository::codec::{get_ts, ts_to_db};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

pub struct OrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderRepository {
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

    /// 创建订单及其行（单事务）
    pub fn create(&self, order: &CustomerOrder, lines: &[OrderLine]) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO customer_orders (order_id, customer_name, customer_phone, status, note, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                order.order_id,
                order.customer_name,
                order.customer_phone,
                order.status.to_db_str(),
                order.note,
                ts_to_db(order.created_at),
            ],
        )?;
        for line in lines {
            tx.execute(
                "INSERT INTO customer_order_lines (line_id, order_id, item_id, qty_rolls) VALUES (?1, ?2, ?3, ?4)",
                params![line.line_id, line.order_id, line.item_id, line.qty_rolls],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn set_status(&self, order_id: &str, status: OrderStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE customer_orders SET status = ?2 WHERE order_id = ?1",
            params![order_id, status.to_db_str()],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "CustomerOrder".to_string(),
                id: order_id.to_string(),
            });
        }
        Ok(())
    }

    /// 订单列表（新建在前，可按状态过滤）
    pub fn list(&self, status: Option<OrderStatus>) -> RepositoryResult<Vec<CustomerOrder>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT order_id, customer_name, customer_phone, status, note, created_at
            FROM customer_orders
            WHERE (?1 IS NULL OR status = ?1)
            ORDER BY created_at DESC
            "#,
        )?;
        let rows = stmt
            .query_map(params![status.map(|s| s.to_db_str())], map_order_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn find(&self, order_id: &str) -> RepositoryResult<Option<CustomerOrder>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                "SELECT order_id, customer_name, customer_phone, status, note, created_at \
                 FROM customer_orders WHERE order_id = ?1",
                params![order_id],
                map_order_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn list_lines(&self, order_id: &str) -> RepositoryResult<Vec<OrderLine>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT line_id, order_id, item_id, qty_rolls FROM customer_order_lines \
             WHERE order_id = ?1 ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map(params![order_id], |row| {
                Ok(OrderLine {
                    line_id: row.get(0)?,
                    order_id: row.get(1)?,
                    item_id: row.get(2)?,
                    qty_rolls: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// 草稿订单按商品汇总的占用卷数
    pub fn reserved_rolls(&self) -> RepositoryResult<HashMap<String, i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT l.item_id, SUM(l.qty_rolls)
            FROM customer_order_lines l
            JOIN customer_orders o ON o.order_id = l.order_id
            WHERE o.status = ?1
            GROUP BY l.item_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![OrderStatus::Draft.to_db_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(rows)
    }
}

fn map_order_row(row: &Row<'_>) -> rusqlite::Result<CustomerOrder> {
    let status_raw: String = row.get(3)?;
    let status = OrderStatus::from_str(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            format!("未知订单状态: {}", status_raw).into(),
        )
    })?;
    Ok(CustomerOrder {
        order_id: row.get(0)?,
        customer_name: row.get(1)?,
        customer_phone: row.get(2)?,
        status,
        note: row.get(4)?,
        created_at: get_ts(row, 5)?,
    })
}
