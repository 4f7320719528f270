// ==========================================
// 纺织品库存台账系统 - 应用状态
// ==========================================
// 职责: 打开数据库、执行迁移、装配仓储/引擎/API
// 红线: 全部仓储共享同一连接（单写者）
// ==========================================

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::api::{
    CatalogApi, ConfigApi, ImportApi, MovementApi, OrderApi, ReconciliationApi, StockApi,
};
use crate::config::ConfigManager;
use crate::db;
use crate::i18n;
use crate::importer::{CatalogImporterImpl, FsImageStore, ImageStore};
use crate::perf;
use crate::repository::{
    AuditRepository, ItemRepository, LedgerStore, MovementRepository, OrderRepository,
    SqliteLedgerStore,
};

/// 图片目录名（与数据库文件同级）
const MEDIA_DIR: &str = "media";

/// 应用状态
///
/// 持有所有 API 实例；调用方（CLI / 桌面壳）只与这里交互
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    pub stock_api: Arc<StockApi>,
    pub reconciliation_api: Arc<ReconciliationApi>,
    pub movement_api: Arc<MovementApi>,
    pub catalog_api: Arc<CatalogApi>,
    pub import_api: Arc<ImportApi>,
    pub order_api: Arc<OrderApi>,
    pub config_api: Arc<ConfigApi>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（不存在时自动创建并建表）
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState, 数据库路径: {}", db_path);

        let mut conn = db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        db::migrate(&conn).map_err(|e| format!("数据库迁移失败: {}", e))?;
        perf::install_sqlite_tracing(&mut conn);
        let conn = Arc::new(Mutex::new(conn));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let chunk_size = config_manager
            .get_query_chunk_size()
            .map_err(|e| format!("无法读取查询分块配置: {}", e))?;

        // ==========================================
        // 仓储
        // ==========================================
        let item_repo = Arc::new(ItemRepository::from_connection(conn.clone()));
        let movement_repo = Arc::new(MovementRepository::from_connection(conn.clone()));
        let audit_repo = Arc::new(AuditRepository::from_connection(conn.clone()));
        let order_repo = Arc::new(OrderRepository::from_connection(conn.clone()));
        let store: Arc<dyn LedgerStore> =
            Arc::new(SqliteLedgerStore::from_connection(conn, chunk_size));

        // ==========================================
        // 导入
        // ==========================================
        let media_root = media_root_for(&db_path);
        std::fs::create_dir_all(&media_root)
            .map_err(|e| format!("无法创建图片目录 {}: {}", media_root.display(), e))?;
        let image_store: Arc<dyn ImageStore> = Arc::new(FsImageStore::new(media_root));
        let importer = Arc::new(CatalogImporterImpl::new(
            item_repo.clone(),
            config_manager.clone(),
            image_store,
        ));

        // ==========================================
        // API
        // ==========================================
        let stock_api = Arc::new(StockApi::new(store.clone(), config_manager.clone()));
        let reconciliation_api = Arc::new(ReconciliationApi::new(
            store.clone(),
            audit_repo,
            config_manager.clone(),
        ));
        let movement_api = Arc::new(MovementApi::new(
            store,
            movement_repo,
            item_repo.clone(),
        ));
        let catalog_api = Arc::new(CatalogApi::new(item_repo.clone(), importer.clone()));
        let import_api = Arc::new(ImportApi::new(importer, config_manager.clone()));
        let order_api = Arc::new(OrderApi::new(order_repo, item_repo, stock_api.clone()));
        let config_api = Arc::new(ConfigApi::new(config_manager));

        i18n::set_locale(i18n::DEFAULT_LOCALE);

        tracing::info!(chunk_size, "AppState初始化完成");

        Ok(Self {
            db_path,
            stock_api,
            reconciliation_api,
            movement_api,
            catalog_api,
            import_api,
            order_api,
            config_api,
        })
    }
}

/// 图片根目录：数据库文件所在目录下的 media/
fn media_root_for(db_path: &str) -> PathBuf {
    Path::new(db_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.join(MEDIA_DIR))
        .unwrap_or_else(|| PathBuf::from(MEDIA_DIR))
}

/// 获取默认数据库路径
///
/// - `TEXTILE_STOCK_DB` 显式指定时优先
/// - 否则使用用户数据目录下的 textile-stock/stock.db
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var("TEXTILE_STOCK_DB") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./stock.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("textile-stock");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("stock.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_root_for() {
        assert_eq!(
            media_root_for("/data/shop/stock.db"),
            PathBuf::from("/data/shop/media")
        );
        assert_eq!(media_root_for("stock.db"), PathBuf::from("media"));
    }

    #[test]
    fn test_app_state_opens_fresh_database() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("stock.db").to_string_lossy().to_string();

        let state = AppState::new(db_path.clone()).unwrap();
        assert_eq!(state.db_path, db_path);
        assert!(dir.path().join("media").is_dir());
        assert!(state.stock_api.current_balances().unwrap().is_empty());
        assert!(state.reconciliation_api.list_sessions(None, None).unwrap().is_empty());
    }
}
