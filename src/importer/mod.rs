// ==========================================
// 纺织品库存台账系统 - 导入层
// ==========================================
// 职责: 外部来源表格 / 批量粘贴 → 商品目录
// 支持: Excel, CSV, 粘贴文本
// ==========================================

// 模块声明
pub mod bulk_paste;
pub mod catalog_importer;
pub mod data_cleaner;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod image_transfer;
pub mod import_trait;

// 重导出核心类型
pub use bulk_paste::{BulkPasteParser, PastePreview, PastePreviewRow, PasteRow, PasteStatus};
pub use catalog_importer::CatalogImporterImpl;
pub use data_cleaner::DataCleaner as DataCleanerImpl;
pub use error::{ImportError, ImportResult};
pub use field_mapper::SourceFieldMapper;
pub use file_parser::{CsvParser, ExcelParser, UniversalFileParser};
pub use image_transfer::{
    FsImageStore, ImageFailure, ImageJob, ImageStore, ImageTransfer, ImageTransferReport,
};

// 重导出 Trait 接口
pub use import_trait::{
    CatalogImportSummary, CatalogImporter, DataCleaner, FieldMapper, FileParser, RowFailure,
    SourcePreview,
};
