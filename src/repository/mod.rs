// ==========================================
// 纺织品库存台账系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod audit_repo;
pub mod codec;
pub mod error;
pub mod item_repo;
pub mod movement_repo;
pub mod order_repo;
pub mod store;

// 重导出核心仓储
pub use audit_repo::AuditRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use item_repo::ItemRepository;
pub use movement_repo::MovementRepository;
pub use order_repo::OrderRepository;
pub use store::{LedgerStore, SqliteLedgerStore};
