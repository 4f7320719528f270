// ==========================================
// 纺织品库存台账系统 - 数据清洗器实现
// ==========================================
// 职责: TRIM / 空白折叠 / NULL 标准化 / 日期解析
// ==========================================

use crate::domain::text::{clean_text, normalize_arabic_digits};
use crate::importer::import_trait::DataCleaner as DataCleanerTrait;
use chrono::{Duration, NaiveDate};

/// Excel 日期序列号起点（1900 闰年错误已计入）
const EXCEL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y", "%Y%m%d"];

pub struct DataCleaner;

impl DataCleanerTrait for DataCleaner {
    fn clean_text(&self, value: &str) -> String {
        clean_text(value)
    }

    fn normalize_null(&self, value: Option<String>) -> Option<String> {
        value.and_then(|v| {
            let cleaned = clean_text(&v);
            if cleaned.is_empty() || cleaned == "—" || cleaned == "-" {
                None
            } else {
                Some(cleaned)
            }
        })
    }

    fn parse_date(&self, value: &str) -> Option<NaiveDate> {
        let value = normalize_arabic_digits(value.trim());
        if value.is_empty() {
            return None;
        }

        // ISO 时间戳只取日期部分
        let head = value.get(..10).unwrap_or(&value);
        for fmt in DATE_FORMATS {
            if let Ok(d) = NaiveDate::parse_from_str(head, fmt) {
                return Some(d);
            }
            if let Ok(d) = NaiveDate::parse_from_str(&value, fmt) {
                return Some(d);
            }
        }

        excel_serial_to_date(&value)
    }
}

/// Excel 日期序列号 → 日期（仅接受合理区间）
fn excel_serial_to_date(value: &str) -> Option<NaiveDate> {
    let serial = value.parse::<f64>().ok()?;
    if !(1.0..=200_000.0).contains(&serial) {
        return None;
    }
    let (y, m, d) = EXCEL_EPOCH;
    NaiveDate::from_ymd_opt(y, m, d)?.checked_add_signed(Duration::days(serial.trunc() as i64))
}
