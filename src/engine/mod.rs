// ==========================================
// 纺织品库存台账系统 - 引擎层
// ==========================================
// 职责: 台账汇总 / 盘点对账 / 导入去重 / 预订可用量
// 红线: 引擎无状态、不访问数据库；缓存由调用方持有
// ==========================================

pub mod availability;
pub mod dedup;
pub mod ledger;
pub mod reconciliation;

// 重导出核心引擎
pub use availability::AvailabilityEngine;
pub use dedup::ImportMatcher;
pub use ledger::{LedgerAggregator, LedgerSummary};
pub use reconciliation::{LineOutcome, ReconciliationEngine, ReconciliationError};
