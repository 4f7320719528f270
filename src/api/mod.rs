// ==========================================
// 纺织品库存台账系统 - API 层
// ==========================================
// 职责: 校验输入、编排仓储与引擎、映射错误
// ==========================================

pub mod catalog_api;
pub mod config_api;
pub mod error;
pub mod import_api;
pub mod movement_api;
pub mod order_api;
pub mod reconciliation_api;
pub mod stock_api;
pub mod validator;

// 重导出核心类型
pub use catalog_api::{CatalogApi, CatalogImportResponse, ColorNameUpdate};
pub use config_api::{ConfigApi, ConfigItem};
pub use error::{ApiError, ApiResult};
pub use import_api::ImportApi;
pub use movement_api::{MovementApi, MovementLineInput, MovementQuery, MovementView};
pub use order_api::OrderApi;
pub use reconciliation_api::{CommitResult, ReconciliationApi, SessionDetail};
pub use stock_api::{HistoricalBalance, StockApi, StockQuery};
