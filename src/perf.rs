// ==========================================
// 纺织品库存台账系统 - 性能观测
// ==========================================
// 职责: SQL 计数 / 慢查询日志 / 操作耗时
// 输出: tracing target = "perf" / "slow_sql"
// ==========================================

use rusqlite::Connection;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

static SQL_TRACE_ON: AtomicBool = AtomicBool::new(false);
static SLOW_SQL_MS: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static OPEN_GUARDS: Cell<u32> = Cell::new(0);
    static STMT_COUNT: Cell<u64> = Cell::new(0);
    static SLOW_COUNT: Cell<u64> = Cell::new(0);
}

/// SQL 观测开关（来自环境变量）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlTraceSettings {
    pub enabled: bool,
    pub slow_threshold_ms: u64,
}

impl SqlTraceSettings {
    /// 读取环境变量
    ///
    /// - `TEXTILE_STOCK_PERF_SQL=1` 强制开启（Debug 默认开启，Release 默认关闭）
    /// - `TEXTILE_STOCK_SLOW_SQL_MS=50` 慢 SQL 阈值（毫秒）
    pub fn from_env() -> Self {
        let enabled = match std::env::var("TEXTILE_STOCK_PERF_SQL") {
            Ok(v) => parse_flag(&v),
            Err(_) => cfg!(debug_assertions),
        };
        let slow_threshold_ms = std::env::var("TEXTILE_STOCK_SLOW_SQL_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(if cfg!(debug_assertions) { 50 } else { 200 });
        Self {
            enabled,
            slow_threshold_ms,
        }
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(
        v.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn one_line_sql(sql: &str, max_chars: usize) -> String {
    let flat: String = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let head: String = flat.chars().take(max_chars).collect();
    format!("{}…", head)
}

/// 在连接上安装 trace/profile 回调（SQL 计数 + 慢查询日志）
pub fn install_sqlite_tracing(conn: &mut Connection) {
    apply_sqlite_tracing(conn, SqlTraceSettings::from_env());
}

/// 按给定设置安装回调；关闭时显式清理，避免复用连接残留 callback
pub fn apply_sqlite_tracing(conn: &mut Connection, settings: SqlTraceSettings) {
    SQL_TRACE_ON.store(settings.enabled, Ordering::Relaxed);
    if !settings.enabled {
        conn.trace(None);
        conn.profile(None);
        return;
    }

    SLOW_SQL_MS.store(settings.slow_threshold_ms, Ordering::Relaxed);
    conn.trace(Some(on_sql_trace));
    conn.profile(Some(on_sql_profile));
}

fn guard_active() -> bool {
    OPEN_GUARDS.with(|g| g.get() > 0)
}

fn on_sql_trace(_sql: &str) {
    if SQL_TRACE_ON.load(Ordering::Relaxed) && guard_active() {
        STMT_COUNT.with(|c| c.set(c.get().saturating_add(1)));
    }
}

fn on_sql_profile(sql: &str, duration: Duration) {
    if !SQL_TRACE_ON.load(Ordering::Relaxed) {
        return;
    }

    let ms = duration.as_millis() as u64;
    let threshold = SLOW_SQL_MS.load(Ordering::Relaxed);
    if threshold == 0 || ms < threshold {
        return;
    }

    tracing::warn!(
        target: "slow_sql",
        duration_ms = ms,
        sql = %one_line_sql(sql, 400),
        "slow sql"
    );
    if guard_active() {
        SLOW_COUNT.with(|c| c.set(c.get().saturating_add(1)));
    }
}

/// 操作级性能 Guard：drop 时输出 elapsed_ms / sql_count / slow_sql_count / rows
///
/// ```ignore
/// let mut perf = textile_stock::perf::PerfGuard::new("stock_overview");
/// // ...
/// perf.set_rows(rows.len());
/// ```
pub struct PerfGuard {
    op: &'static str,
    started: Instant,
    stmt_base: u64,
    slow_base: u64,
    rows: Option<usize>,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        OPEN_GUARDS.with(|g| g.set(g.get().saturating_add(1)));
        Self {
            op,
            started: Instant::now(),
            stmt_base: STMT_COUNT.with(|c| c.get()),
            slow_base: SLOW_COUNT.with(|c| c.get()),
            rows: None,
        }
    }

    /// 记录本次操作处理的行数（可选）
    pub fn set_rows(&mut self, rows: usize) {
        self.rows = Some(rows);
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        let sql_count = STMT_COUNT.with(|c| c.get()).saturating_sub(self.stmt_base);
        let slow_sql_count = SLOW_COUNT.with(|c| c.get()).saturating_sub(self.slow_base);

        tracing::info!(
            target: "perf",
            op = self.op,
            elapsed_ms,
            sql_count,
            slow_sql_count,
            rows = self.rows.unwrap_or(0),
            "done"
        );

        OPEN_GUARDS.with(|g| g.set(g.get().saturating_sub(1)));
    }
}
