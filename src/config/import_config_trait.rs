// ==========================================
// 纺织品库存台账系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::import::CatalogMapping;
use crate::domain::types::UnitKind;
use async_trait::async_trait;
use std::error::Error;

pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 印花来源导入时写入的小类
    ///
    /// # 默认值
    /// - "مطبوع"
    async fn get_printed_sub_category(&self) -> ConfigResult<String>;

    /// 花号生成商品名时的前缀
    ///
    /// # 默认值
    /// - "رسمة "
    async fn get_design_name_prefix(&self) -> ConfigResult<String>;

    /// 导入商品的单位
    ///
    /// # 默认值
    /// - kg
    async fn get_default_unit(&self) -> ConfigResult<UnitKind>;

    /// 图片转存每张的尝试次数（≥1）
    ///
    /// # 默认值
    /// - 2
    async fn get_image_retry_attempts(&self) -> ConfigResult<u32>;

    /// 组装来源行 → 目录候选的映射规则
    async fn get_catalog_mapping(&self) -> ConfigResult<CatalogMapping> {
        Ok(CatalogMapping {
            sub_category: self.get_printed_sub_category().await?,
            name_prefix: self.get_design_name_prefix().await?,
            unit: self.get_default_unit().await?,
        })
    }
}
