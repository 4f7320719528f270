// ==========================================
// 纺织品库存台账系统 - 应用层
// ==========================================
// 职责: 装配 API，供命令行入口使用
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
