// ==========================================
// 纺织品库存台账系统 - 商品目录仓储
// ==========================================
// 职责: items 表 CRUD、自然键查询、色名批量回填
// 红线: Repository 不含业务逻辑；被流水/盘点引用的商品由外键拒绝硬删除
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::item::{CatalogKey, Item};
use crate::domain::types::UnitKind;
use crate::repository::codec::{get_ts, placeholders, ts_to_db};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

const ITEM_COLUMNS: &str = "item_id, main_category, sub_category, item_name, color_code, \
     color_name, unit, description, image_path, is_active, created_at, updated_at";

/// 商品目录仓储
pub struct ItemRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ItemRepository {
    /// 打开数据库文件创建仓储
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
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

    /// 插入单个商品
    pub fn insert(&self, item: &Item) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_with(&conn, item)
    }

    /// 批量插入（单事务，任一失败整体回滚）
    ///
    /// # 返回
    /// - Ok(usize): 插入条数
    pub fn insert_batch(&self, items: &[Item]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        for item in items {
            Self::insert_tx(&tx, item)?;
        }
        tx.commit()?;
        Ok(items.len())
    }

    pub(crate) fn insert_tx(tx: &Transaction<'_>, item: &Item) -> RepositoryResult<()> {
        Self::insert_with(tx, item)
    }

    fn insert_with(conn: &Connection, item: &Item) -> RepositoryResult<()> {
        conn.execute(
            &format!("INSERT INTO items ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)", ITEM_COLUMNS),
            params![
                item.item_id,
                item.main_category,
                item.sub_category,
                item.item_name,
                item.color_code,
                item.color_name,
                item.unit.to_db_str(),
                item.description,
                item.image_path,
                item.is_active,
                ts_to_db(item.created_at),
                ts_to_db(item.updated_at),
            ],
        )?;
        Ok(())
    }

    /// 整行更新（image_path 除外）
    pub fn update(&self, item: &Item) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE items SET
                main_category = ?2, sub_category = ?3, item_name = ?4,
                color_code = ?5, color_name = ?6, unit = ?7, description = ?8,
                is_active = ?9, updated_at = ?10
            WHERE item_id = ?1
            "#,
            params![
                item.item_id,
                item.main_category,
                item.sub_category,
                item.item_name,
                item.color_code,
                item.color_name,
                item.unit.to_db_str(),
                item.description,
                item.is_active,
                ts_to_db(item.updated_at),
            ],
        )?;
        Self::ensure_found(rows, &item.item_id)
    }

    pub fn set_image_path(&self, item_id: &str, image_path: Option<&str>) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE items SET image_path = ?2 WHERE item_id = ?1",
            params![item_id, image_path],
        )?;
        Self::ensure_found(rows, item_id)
    }

    pub fn set_active(&self, item_id: &str, active: bool) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE items SET is_active = ?2, updated_at = ?3 WHERE item_id = ?1",
            params![item_id, active, ts_to_db(chrono::Utc::now())],
        )?;
        Self::ensure_found(rows, item_id)
    }

    /// 硬删除商品
    ///
    /// # 返回
    /// - Err(ForeignKeyViolation): 仍被流水或盘点行引用
    pub fn delete(&self, item_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute("DELETE FROM items WHERE item_id = ?1", params![item_id])?;
        Self::ensure_found(rows, item_id)
    }

    /// 批量回填色名（单事务）
    ///
    /// # 参数
    /// - updates: (item_id, color_name)，空色名跳过
    pub fn update_color_names(&self, updates: &[(String, String)]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let now = ts_to_db(chrono::Utc::now());
        let mut count = 0;
        for (item_id, color_name) in updates {
            let name = color_name.trim();
            if name.is_empty() {
                continue;
            }
            count += tx.execute(
                "UPDATE items SET color_name = ?2, updated_at = ?3 WHERE item_id = ?1",
                params![item_id, name, now],
            )?;
        }
        tx.commit()?;
        Ok(count)
    }

    fn ensure_found(rows: usize, item_id: &str) -> RepositoryResult<()> {
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Item".to_string(),
                id: item_id.to_string(),
            });
        }
        Ok(())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, item_id: &str) -> RepositoryResult<Option<Item>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM items WHERE item_id = ?1",
            ITEM_COLUMNS
        ))?;
        match stmt.query_row(params![item_id], map_item_row) {
            Ok(item) => Ok(Some(item)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 列出商品（按 大类/小类/名称/色号 排序）
    pub fn list(&self, active_only: bool) -> RepositoryResult<Vec<Item>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM items {} ORDER BY main_category, sub_category, item_name, color_code",
            ITEM_COLUMNS,
            if active_only { "WHERE is_active = 1" } else { "" }
        );
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map([], map_item_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    /// 按 id 批量查询（分块，避免超出 SQLite 参数上限）
    pub fn find_by_ids(&self, item_ids: &[String], chunk_size: usize) -> RepositoryResult<Vec<Item>> {
        let conn = self.get_conn()?;
        let mut out = Vec::with_capacity(item_ids.len());
        for chunk in item_ids.chunks(chunk_size.max(1)) {
            let sql = format!(
                "SELECT {} FROM items WHERE item_id IN ({})",
                ITEM_COLUMNS,
                placeholders(chunk.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), map_item_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            out.extend(rows);
        }
        Ok(out)
    }

    /// 全部目录自然键（规范化后）
    pub fn list_catalog_keys(&self) -> RepositoryResult<HashSet<CatalogKey>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT item_name, color_code FROM items")?;
        let keys = stmt
            .query_map([], |row| {
                let name: String = row.get(0)?;
                let code: String = row.get(1)?;
                Ok(CatalogKey::new(&name, &code))
            })?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(keys)
    }

    /// 候选键中已存在于目录的部分
    pub fn find_existing_keys(
        &self,
        candidates: &[CatalogKey],
    ) -> RepositoryResult<HashSet<CatalogKey>> {
        if candidates.is_empty() {
            return Ok(HashSet::new());
        }
        let all = self.list_catalog_keys()?;
        Ok(candidates
            .iter()
            .filter(|k| all.contains(*k))
            .cloned()
            .collect())
    }

    /// 引用该商品的流水条数
    pub fn count_movements(&self, item_id: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let n = conn.query_row(
            "SELECT COUNT(*) FROM movements WHERE item_id = ?1",
            params![item_id],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    /// 缺少色名的商品（可按大类过滤）
    pub fn list_missing_color_names(&self, main_category: Option<&str>) -> RepositoryResult<Vec<Item>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM items \
             WHERE (color_name IS NULL OR TRIM(color_name) = '') \
               AND (?1 IS NULL OR main_category = ?1) \
             ORDER BY main_category, sub_category, item_name, color_code",
            ITEM_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params![main_category], map_item_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    /// 去重后的大类列表
    pub fn list_main_categories(&self) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT main_category FROM items ORDER BY main_category")?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
    }
}

/// items 行映射（列顺序同 ITEM_COLUMNS）
pub(crate) fn map_item_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    let unit_raw: String = row.get(6)?;
    let unit = UnitKind::from_str(&unit_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            Type::Text,
            format!("未知单位: {}", unit_raw).into(),
        )
    })?;
    Ok(Item {
        item_id: row.get(0)?,
        main_category: row.get(1)?,
        sub_category: row.get(2)?,
        item_name: row.get(3)?,
        color_code: row.get(4)?,
        color_name: row.get(5)?,
        unit,
        description: row.get(7)?,
        image_path: row.get(8)?,
        is_active: row.get(9)?,
        created_at: get_ts(row, 10)?,
        updated_at: get_ts(row, 11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::item::NewItem;
    use chrono::Utc;

    fn setup_repo() -> ItemRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::migrate(&conn).unwrap();
        ItemRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn make_item(id: &str, name: &str, code: &str) -> Item {
        NewItem {
            main_category: "قطن".to_string(),
            sub_category: "مطبوع".to_string(),
            item_name: name.to_string(),
            color_code: code.to_string(),
            color_name: None,
            unit: UnitKind::Kg,
            description: None,
            image_source: None,
        }
        .cleaned()
        .into_item(id.to_string(), Utc::now())
    }

    #[test]
    fn test_insert_find_update() {
        let repo = setup_repo();
        let mut item = make_item("i1", "رسمة 1", "07");
        repo.insert(&item).unwrap();

        let loaded = repo.find_by_id("i1").unwrap().unwrap();
        assert_eq!(loaded.item_name, "رسمة 1");
        assert_eq!(loaded.unit, UnitKind::Kg);
        assert!(loaded.is_active);

        item.description = Some("ناعم".to_string());
        repo.update(&item).unwrap();
        assert_eq!(
            repo.find_by_id("i1").unwrap().unwrap().description.as_deref(),
            Some("ناعم")
        );
        assert!(repo.find_by_id("missing").unwrap().is_none());
    }

    #[test]
    fn test_insert_batch_rolls_back_on_duplicate_id() {
        let repo = setup_repo();
        let a = make_item("i1", "A", "1");
        let dup = make_item("i1", "B", "2");
        assert!(repo.insert_batch(&[a, dup]).is_err());
        assert!(repo.list(false).unwrap().is_empty());
    }

    #[test]
    fn test_active_filter_and_missing_color_names() {
        let repo = setup_repo();
        repo.insert(&make_item("i1", "A", "1")).unwrap();
        repo.insert(&make_item("i2", "B", "2")).unwrap();
        repo.set_active("i2", false).unwrap();

        assert_eq!(repo.list(true).unwrap().len(), 1);
        assert_eq!(repo.list(false).unwrap().len(), 2);

        assert_eq!(repo.list_missing_color_names(Some("قطن")).unwrap().len(), 2);
        let n = repo
            .update_color_names(&[
                ("i1".to_string(), "أحمر".to_string()),
                ("i2".to_string(), "  ".to_string()),
            ])
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(repo.list_missing_color_names(None).unwrap().len(), 1);
    }

    #[test]
    fn test_existing_keys_are_normalized() {
        let repo = setup_repo();
        repo.insert(&make_item("i1", "رسمة 12", "٠٧")).unwrap();

        let found = repo
            .find_existing_keys(&[
                CatalogKey::new("رسمة  12", "07"),
                CatalogKey::new("رسمة 13", "07"),
            ])
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains(&CatalogKey::new("رسمة 12", "07")));
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let repo = setup_repo();
        assert!(matches!(
            repo.delete("nope"),
            Err(RepositoryError::NotFound { .. })
        ));
    }
}
