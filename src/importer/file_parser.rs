// ==========================================
// 纺织品库存台账系统 - 文件解析器实现
// ==========================================
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 输出: 表头映射行（来源导入）或原始单元格行（批量粘贴）
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::import_trait::FileParser;
use calamine::{open_workbook, Reader, Xlsx};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

fn ensure_exists(path: &Path) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// 首行作表头，其余行按列名组装；跳过全空行
fn rows_to_records(mut rows: Vec<Vec<String>>) -> Vec<HashMap<String, String>> {
    if rows.is_empty() {
        return Vec::new();
    }
    let headers: Vec<String> = rows.remove(0).into_iter().map(|h| h.trim().to_string()).collect();

    rows.into_iter()
        .filter_map(|row| {
            let row_map: HashMap<String, String> = row
                .into_iter()
                .enumerate()
                .filter_map(|(idx, value)| headers.get(idx).map(|h| (h.clone(), value)))
                .collect();
            if row_map.values().all(|v| v.is_empty()) {
                None
            } else {
                Some(row_map)
            }
        })
        .collect()
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_to_raw_records(&self, file_path: &Path) -> ImportResult<Vec<HashMap<String, String>>> {
        Ok(rows_to_records(self.parse_to_rows(file_path)?))
    }

    fn parse_to_rows(&self, file_path: &Path) -> ImportResult<Vec<Vec<String>>> {
        ensure_exists(file_path)?;
        let ext = extension_of(file_path);
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let file = File::open(file_path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let row: Vec<String> = record.iter().map(|v| v.trim().to_string()).collect();
            if row.iter().all(|v| v.is_empty()) {
                continue;
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl FileParser for ExcelParser {
    fn parse_to_raw_records(&self, file_path: &Path) -> ImportResult<Vec<HashMap<String, String>>> {
        Ok(rows_to_records(self.parse_to_rows(file_path)?))
    }

    fn parse_to_rows(&self, file_path: &Path) -> ImportResult<Vec<Vec<String>>> {
        ensure_exists(file_path)?;
        let ext = extension_of(file_path);
        if ext != "xlsx" && ext != "xls" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let mut workbook: Xlsx<_> = open_workbook(file_path)?;

        // 只读第一个 sheet
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;
        let range = workbook.worksheet_range(&sheet_name)?;

        let rows = range
            .rows()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.to_string().trim().to_string())
                    .collect::<Vec<_>>()
            })
            .filter(|row| row.iter().any(|v| !v.is_empty()))
            .collect();
        Ok(rows)
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    fn pick(path: &Path) -> ImportResult<Box<dyn FileParser>> {
        match extension_of(path).as_str() {
            "csv" => Ok(Box::new(CsvParser)),
            "xlsx" | "xls" => Ok(Box::new(ExcelParser)),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl FileParser for UniversalFileParser {
    fn parse_to_raw_records(&self, file_path: &Path) -> ImportResult<Vec<HashMap<String, String>>> {
        ensure_exists(file_path)?;
        Self::pick(file_path)?.parse_to_raw_records(file_path)
    }

    fn parse_to_rows(&self, file_path: &Path) -> ImportResult<Vec<Vec<String>>> {
        ensure_exists(file_path)?;
        Self::pick(file_path)?.parse_to_rows(file_path)
    }
}
