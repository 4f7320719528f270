// ==========================================
// 纺织品库存台账系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、值对象
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod audit;
pub mod balance;
pub mod import;
pub mod item;
pub mod movement;
pub mod order;
pub mod text;
pub mod types;

// 重导出核心类型
pub use audit::{
    AuditLine, AuditLineView, AuditSession, AuditSessionSummary, BookEntry, BookSnapshot,
    CommitOutcome, CountEntry, PlannedLine, ReconciliationPlan,
};
pub use balance::{Balance, DateRange, StockRow};
pub use import::{CatalogMapping, DedupReport, MergedRow, SourceFilter, SourceKey, SourceRow};
pub use item::{CatalogKey, Item, ItemPatch, NewItem};
pub use movement::{Movement, MovementFilter, MovementPatch, NewMovement};
pub use order::{
    CustomerOrder, ItemAvailability, NewOrder, NewOrderLine, OrderDetail, OrderLine,
    OrderLineView,
};
pub use types::{
    BookCheck, Classification, MovementKind, OrderStatus, SourceStatus, StaleLevel,
    StaleThresholds, StockSortPreset, UnitKind, ZeroDiffPolicy,
};
