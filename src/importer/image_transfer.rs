// ==========================================
// 纺织品库存台账系统 - 图片转存（提交后步骤）
// ==========================================
// 职责: 目录落库后把来源图片转存到 items/{item_id}.{ext}
// 红线: 图片失败只计数和记录，不回滚已插入的商品
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const KNOWN_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// 由来源名推断扩展名（忽略查询串），未知时为 jpg
pub fn infer_extension(source: &str) -> String {
    let clean = source.split('?').next().unwrap_or(source);
    Path::new(clean)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .filter(|e| KNOWN_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or_else(|| "jpg".to_string())
}

/// 目标相对路径 items/{item_id}.{ext}
pub fn target_path(item_id: &str, source: &str) -> String {
    format!("items/{}.{}", item_id, infer_extension(source))
}

// ==========================================
// ImageStore Trait
// ==========================================
// 实现者: FsImageStore
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// 转存一张图片
    ///
    /// # 返回
    /// - Ok(String): 存储后的相对路径
    async fn store(&self, item_id: &str, source: &str) -> ImportResult<String>;
}

/// 本地目录实现：从本地路径复制
pub struct FsImageStore {
    root: PathBuf,
}

impl FsImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ImageStore for FsImageStore {
    async fn store(&self, item_id: &str, source: &str) -> ImportResult<String> {
        let lower = source.to_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Err(ImportError::UnsupportedImageSource(source.to_string()));
        }

        let src = Path::new(source.split('?').next().unwrap_or(source));
        if !tokio::fs::try_exists(src).await.unwrap_or(false) {
            return Err(ImportError::FileNotFound(src.display().to_string()));
        }

        let relative = target_path(item_id, source);
        let dest = self.root.join(&relative);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(src, &dest).await?;
        Ok(relative)
    }
}

// ==========================================
// ImageTransfer - 带重试的批量转存
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageJob {
    pub item_id: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFailure {
    pub item_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageTransferReport {
    pub ok: usize,
    pub failed: usize,
    /// (item_id, 存储路径)
    pub stored: Vec<(String, String)>,
    pub failures: Vec<ImageFailure>,
}

impl ImageTransferReport {
    /// 记录一次后续失败（例如回写 image_path 失败）
    pub fn demote(&mut self, item_id: &str, message: String) {
        if let Some(pos) = self.stored.iter().position(|(id, _)| id == item_id) {
            self.stored.remove(pos);
            self.ok = self.ok.saturating_sub(1);
        }
        self.failed += 1;
        self.failures.push(ImageFailure {
            item_id: item_id.to_string(),
            message,
        });
    }
}

pub struct ImageTransfer {
    store: Arc<dyn ImageStore>,
    attempts: u32,
}

impl ImageTransfer {
    /// # 参数
    /// - attempts: 每张图片的尝试次数（至少 1）
    pub fn new(store: Arc<dyn ImageStore>, attempts: u32) -> Self {
        Self {
            store,
            attempts: attempts.max(1),
        }
    }

    async fn store_with_retry(&self, job: &ImageJob) -> ImportResult<String> {
        let mut last_err = None;
        for attempt in 1..=self.attempts {
            match self.store.store(&job.item_id, &job.source).await {
                Ok(path) => return Ok(path),
                Err(e) => {
                    debug!(item_id = %job.item_id, attempt, error = %e, "图片转存失败");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ImportError::ImageTransferError {
            item_id: job.item_id.clone(),
            message: "no attempt made".to_string(),
        }))
    }

    /// 并发转存，按输入顺序汇总
    pub async fn run(&self, jobs: &[ImageJob]) -> ImageTransferReport {
        let results = join_all(jobs.iter().map(|job| self.store_with_retry(job))).await;

        let mut report = ImageTransferReport::default();
        for (job, result) in jobs.iter().zip(results) {
            match result {
                Ok(path) => {
                    report.ok += 1;
                    report.stored.push((job.item_id.clone(), path));
                }
                Err(e) => {
                    warn!(item_id = %job.item_id, source = %job.source, error = %e, "图片转存放弃");
                    report.failed += 1;
                    report.failures.push(ImageFailure {
                        item_id: job.item_id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
        report
    }
}
