// ==========================================
// 纺织品库存台账系统 - 行编解码
// ==========================================
// 约定: 日期 "%Y-%m-%d"；时间戳 RFC3339；主数量十进制字符串
// ==========================================

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rust_decimal::Decimal;
use std::str::FromStr;

pub const DATE_FMT: &str = "%Y-%m-%d";

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub fn date_to_db(d: NaiveDate) -> String {
    d.format(DATE_FMT).to_string()
}

pub fn ts_to_db(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

pub fn qty_to_db(q: Decimal) -> String {
    q.normalize().to_string()
}

/// 读取日期列
pub fn get_date(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FMT).map_err(|e| conversion_error(idx, e))
}

/// 读取时间戳列
pub fn get_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

/// 读取主数量列
pub fn get_qty(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(raw.trim()).map_err(|e| conversion_error(idx, e))
}

/// "?,?,?" 占位符
pub fn placeholders(n: usize) -> String {
    std::iter::repeat("?").take(n).collect::<Vec<_>>().join(",")
}
