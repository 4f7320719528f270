// ==========================================
// 纺织品库存台账系统 - 台账存储接口
// ==========================================
// 职责: 汇总/对账/导入所需的存储操作抽象
// 说明: 引擎不直接依赖 SQLite；API 层通过该接口读写
// ==========================================

use crate::domain::audit::{AuditLine, AuditSession};
use crate::domain::item::{CatalogKey, Item};
use crate::domain::movement::{Movement, MovementFilter, MovementPatch, NewMovement};
use crate::repository::audit_repo::AuditRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::item_repo::ItemRepository;
use crate::repository::movement_repo::MovementRepository;
use rusqlite::Connection;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// 台账存储接口
pub trait LedgerStore: Send + Sync {
    fn list_items(&self, active_only: bool) -> RepositoryResult<Vec<Item>>;

    fn list_movements(&self, filter: &MovementFilter) -> RepositoryResult<Vec<Movement>>;

    fn insert_movements(&self, rows: &[NewMovement]) -> RepositoryResult<Vec<Movement>>;

    /// 更正流水：仅改备注时原地更新，否则替代
    ///
    /// # 返回
    /// - Ok(Movement): 更正后的当前有效流水
    fn update_movement(&self, movement_id: &str, patch: &MovementPatch) -> RepositoryResult<Movement>;

    /// 删除流水（以冲销实现；已封存时拒绝）
    ///
    /// # 返回
    /// - Ok(Movement): 冲销流水
    fn delete_movement(&self, movement_id: &str) -> RepositoryResult<Movement>;

    fn insert_audit_session(&self, session: &AuditSession) -> RepositoryResult<()>;

    fn insert_audit_lines(&self, lines: &[AuditLine]) -> RepositoryResult<usize>;

    /// 会话 + 盘点行 + 调整流水 原子提交
    fn commit_audit(
        &self,
        session: &AuditSession,
        lines: &[AuditLine],
        adjustments: &[NewMovement],
    ) -> RepositoryResult<Vec<Movement>>;

    fn find_existing_catalog_keys(
        &self,
        candidates: &[CatalogKey],
    ) -> RepositoryResult<HashSet<CatalogKey>>;
}

// ==========================================
// SqliteLedgerStore - SQLite 实现
// ==========================================
pub struct SqliteLedgerStore {
    items: ItemRepository,
    movements: MovementRepository,
    audits: AuditRepository,
    chunk_size: usize,
}

impl SqliteLedgerStore {
    /// 基于共享连接创建
    ///
    /// # 参数
    /// - chunk_size: 按商品 id 查询流水时的分块大小
    pub fn from_connection(conn: Arc<Mutex<Connection>>, chunk_size: usize) -> Self {
        Self {
            items: ItemRepository::from_connection(conn.clone()),
            movements: MovementRepository::from_connection(conn.clone()),
            audits: AuditRepository::from_connection(conn),
            chunk_size,
        }
    }
}

impl LedgerStore for SqliteLedgerStore {
    fn list_items(&self, active_only: bool) -> RepositoryResult<Vec<Item>> {
        self.items.list(active_only)
    }

    fn list_movements(&self, filter: &MovementFilter) -> RepositoryResult<Vec<Movement>> {
        self.movements.list(filter, self.chunk_size)
    }

    fn insert_movements(&self, rows: &[NewMovement]) -> RepositoryResult<Vec<Movement>> {
        self.movements.insert_batch(rows)
    }

    fn update_movement(&self, movement_id: &str, patch: &MovementPatch) -> RepositoryResult<Movement> {
        if patch.is_note_only() {
            self.movements.update_note(movement_id, patch.note.as_deref())?;
            return self
                .movements
                .find_by_id(movement_id)?
                .ok_or_else(|| RepositoryError::NotFound {
                    entity: "Movement".to_string(),
                    id: movement_id.to_string(),
                });
        }

        let original = self
            .movements
            .find_by_id(movement_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "Movement".to_string(),
                id: movement_id.to_string(),
            })?;
        let (_, replacement) = self
            .movements
            .supersede(movement_id, &patch.corrected(&original))?;
        Ok(replacement)
    }

    fn delete_movement(&self, movement_id: &str) -> RepositoryResult<Movement> {
        self.movements.void(movement_id, None)
    }

    fn insert_audit_session(&self, session: &AuditSession) -> RepositoryResult<()> {
        self.audits.insert_session(session)
    }

    fn insert_audit_lines(&self, lines: &[AuditLine]) -> RepositoryResult<usize> {
        self.audits.insert_lines(lines)
    }

    fn commit_audit(
        &self,
        session: &AuditSession,
        lines: &[AuditLine],
        adjustments: &[NewMovement],
    ) -> RepositoryResult<Vec<Movement>> {
        self.audits.commit(session, lines, adjustments)
    }

    fn find_existing_catalog_keys(
        &self,
        candidates: &[CatalogKey],
    ) -> RepositoryResult<HashSet<CatalogKey>> {
        self.items.find_existing_keys(candidates)
    }
}
