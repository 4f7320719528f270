// ==========================================
// 纺织品库存台账系统 - SQLite 连接初始化与建库
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键必须每个连接开启）
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供幂等建库（migrate），台账表结构只在这里定义
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启（movements/audit_lines → items 依赖它拒绝硬删除）
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 建库（幂等）
///
/// # 说明
/// - 所有表使用 IF NOT EXISTS，可在已有库上重复执行
/// - 主数量以 TEXT 存储十进制字符串，读取时解析为 Decimal，避免浮点漂移
/// - movements.item_id / audit_lines.item_id 使用 ON DELETE RESTRICT：
///   被引用的商品不可硬删除
pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    let current = read_schema_version(conn)?;
    if current.unwrap_or(0) < CURRENT_SCHEMA_VERSION {
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
            [CURRENT_SCHEMA_VERSION],
        )?;
        tracing::info!(version = CURRENT_SCHEMA_VERSION, "schema 初始化完成");
    }
    Ok(())
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_scope (
    scope_id TEXT PRIMARY KEY,
    scope_type TEXT NOT NULL,
    scope_key TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(scope_type, scope_key)
);

INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
VALUES ('global', 'GLOBAL', 'global');

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS items (
    item_id TEXT PRIMARY KEY,
    main_category TEXT NOT NULL,
    sub_category TEXT NOT NULL,
    item_name TEXT NOT NULL,
    color_code TEXT NOT NULL,
    color_name TEXT,
    unit TEXT NOT NULL CHECK (unit IN ('kg', 'm')),
    description TEXT,
    image_path TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_name_color ON items(item_name, color_code);

CREATE TABLE IF NOT EXISTS audit_sessions (
    session_id TEXT PRIMARY KEY,
    audit_date TEXT NOT NULL,
    note TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_sessions_date ON audit_sessions(audit_date);

CREATE TABLE IF NOT EXISTS audit_lines (
    line_id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES audit_sessions(session_id) ON DELETE RESTRICT,
    audit_date TEXT NOT NULL,
    item_id TEXT NOT NULL REFERENCES items(item_id) ON DELETE RESTRICT,
    book_main TEXT NOT NULL,
    book_rolls INTEGER NOT NULL,
    actual_main TEXT NOT NULL,
    actual_rolls INTEGER NOT NULL,
    diff_main TEXT NOT NULL,
    diff_rolls INTEGER NOT NULL,
    UNIQUE(session_id, item_id)
);

CREATE INDEX IF NOT EXISTS idx_audit_lines_item ON audit_lines(item_id);

CREATE TABLE IF NOT EXISTS movements (
    movement_id TEXT PRIMARY KEY,
    item_id TEXT NOT NULL REFERENCES items(item_id) ON DELETE RESTRICT,
    move_date TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('purchase', 'sale', 'adjustment')),
    qty_main_in TEXT NOT NULL DEFAULT '0',
    qty_main_out TEXT NOT NULL DEFAULT '0',
    qty_rolls_in INTEGER NOT NULL DEFAULT 0 CHECK (qty_rolls_in >= 0),
    qty_rolls_out INTEGER NOT NULL DEFAULT 0 CHECK (qty_rolls_out >= 0),
    note TEXT,
    session_id TEXT REFERENCES audit_sessions(session_id) ON DELETE RESTRICT,
    reverses_id TEXT UNIQUE REFERENCES movements(movement_id) ON DELETE RESTRICT,
    supersedes_id TEXT REFERENCES movements(movement_id) ON DELETE RESTRICT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_movements_item ON movements(item_id);
CREATE INDEX IF NOT EXISTS idx_movements_date ON movements(move_date);
CREATE INDEX IF NOT EXISTS idx_movements_kind_date ON movements(kind, move_date);

CREATE TABLE IF NOT EXISTS customer_orders (
    order_id TEXT PRIMARY KEY,
    customer_name TEXT NOT NULL,
    customer_phone TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'DRAFT',
    note TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS customer_order_lines (
    line_id TEXT PRIMARY KEY,
    order_id TEXT NOT NULL REFERENCES customer_orders(order_id) ON DELETE CASCADE,
    item_id TEXT NOT NULL,
    qty_rolls INTEGER NOT NULL CHECK (qty_rolls > 0)
);

CREATE INDEX IF NOT EXISTS idx_order_lines_order ON customer_order_lines(order_id);
"#;
