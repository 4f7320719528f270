// ==========================================
// 纺织品库存台账系统 - 核心库
// ==========================================
// 职责: 台账汇总 / 盘点对账 / 商品目录导入 / 预订单
// 技术栈: Rust + SQLite
// 系统定位: 单店铺本地账本 (操作员最终确认)
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "en");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/迁移）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// 性能观测
pub mod perf;

// API 层 - 业务接口
pub mod api;

// 应用层 - 装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    BookCheck, Classification, MovementKind, OrderStatus, SourceStatus, StaleLevel,
    StockSortPreset, UnitKind, ZeroDiffPolicy,
};

// 领域实体
pub use domain::{
    AuditSession, Balance, CountEntry, CustomerOrder, Item, Movement, SourceRow, StockRow,
};

// 引擎
pub use engine::{AvailabilityEngine, ImportMatcher, LedgerAggregator, ReconciliationEngine};

// API
pub use api::{CatalogApi, ImportApi, MovementApi, OrderApi, ReconciliationApi, StockApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "纺织品库存台账系统";
