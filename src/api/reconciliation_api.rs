// ==========================================
// 纺织品库存台账系统 - 盘点对账 API
// ==========================================
// 职责: 加载盘点表 → 差异预览 → 原子提交 → 会话查询
// 红线: 校验全部通过才写库；会话/盘点行/调整流水同一事务
// 策略: 零差异行 / 账面复核 均由配置决定
// ==========================================

use crate::api::error::{config_error, ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::audit::{
    AuditLine, AuditLineView, AuditSession, AuditSessionSummary, BookEntry, BookSnapshot,
    CommitOutcome, CountEntry, PlannedLine, ReconciliationPlan,
};
use crate::domain::movement::{MovementFilter, NewMovement};
use crate::domain::text::non_empty;
use crate::domain::types::BookCheck;
use crate::engine::{LedgerAggregator, ReconciliationEngine};
use crate::i18n;
use crate::repository::movement_repo::list_movements_with;
use crate::repository::{AuditRepository, LedgerStore};
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// 提交结果 + 面向操作员的提示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitResult {
    pub outcome: CommitOutcome,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDetail {
    pub session: AuditSession,
    pub lines: Vec<AuditLineView>,
}

// ==========================================
// ReconciliationApi - 盘点对账 API
// ==========================================
pub struct ReconciliationApi {
    store: Arc<dyn LedgerStore>,
    audit_repo: Arc<AuditRepository>,
    config: Arc<ConfigManager>,
    engine: ReconciliationEngine,
    aggregator: LedgerAggregator,
}

impl ReconciliationApi {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        audit_repo: Arc<AuditRepository>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            store,
            audit_repo,
            config,
            engine: ReconciliationEngine::new(),
            aggregator: LedgerAggregator::new(),
        }
    }

    /// 加载盘点表：账面快照（记录加载时间）
    ///
    /// # 参数
    /// - active_only: 只包含启用商品
    pub fn load_sheet(&self, active_only: bool) -> ApiResult<BookSnapshot> {
        let items = self.store.list_items(active_only)?;
        let movements = self.store.list_movements(&MovementFilter::all())?;
        let balances = self.aggregator.compute_balances(&items, &movements);

        let entries: HashMap<String, BookEntry> = items
            .into_iter()
            .map(|item| {
                let book = balances.get(&item.item_id).copied().unwrap_or_default();
                let entry = BookEntry {
                    item_id: item.item_id.clone(),
                    label: item.display_label(),
                    unit: item.unit,
                    book,
                };
                (item.item_id, entry)
            })
            .collect();

        info!(items = entries.len(), "盘点表已加载");
        Ok(BookSnapshot {
            loaded_at: Utc::now(),
            entries,
        })
    }

    /// "只看差异"视图
    pub fn preview_differences(
        &self,
        entries: &[CountEntry],
        snapshot: &BookSnapshot,
    ) -> Vec<PlannedLine> {
        self.engine.preview_differences(entries, snapshot)
    }

    /// 提交盘点
    ///
    /// # 参数
    /// - audit_date: 盘点日期（调整流水也记在这一天）
    /// - note: 会话备注
    /// - entries: 实盘录入
    /// - snapshot: load_sheet 返回的账面快照
    ///
    /// # 返回
    /// - Ok(CommitResult): 会话 id + 调整条数
    /// - Err(ValidationError / NothingToSave / BookBalanceChanged): 未写入任何数据
    #[instrument(skip(self, note, entries, snapshot), fields(entries = entries.len()))]
    pub fn commit(
        &self,
        audit_date: NaiveDate,
        note: Option<&str>,
        entries: &[CountEntry],
        snapshot: &BookSnapshot,
    ) -> ApiResult<CommitResult> {
        let policy = self.config.get_zero_diff_policy().map_err(config_error)?;
        let book_check = self.config.get_book_check().map_err(config_error)?;
        let adjustment_note = self
            .config
            .get_adjustment_note()
            .map_err(config_error)?
            .unwrap_or_else(|| i18n::t("reconciliation.adjustment_note"));

        let plan = self
            .engine
            .plan(audit_date, entries, snapshot, policy, Some(&adjustment_note))?;

        let session = AuditSession {
            session_id: Uuid::new_v4().to_string(),
            audit_date,
            note: non_empty(note),
            created_at: Utc::now(),
        };
        let (lines, adjustments) = build_rows(&session, &plan);

        let written = match book_check {
            BookCheck::AcceptStale => self.store.commit_audit(&session, &lines, &adjustments)?,
            BookCheck::Revalidate => {
                // 复核与写入在同一事务内，中间不会插入新流水
                let chunk_size = self.config.get_query_chunk_size().map_err(config_error)?;
                self.audit_repo
                    .commit_guarded(&session, &lines, &adjustments, |conn| {
                        self.revalidate_with(conn, &plan, chunk_size)
                    })?
            }
        };

        let outcome = CommitOutcome {
            session_id: session.session_id.clone(),
            applied_count: written.len(),
            recorded_lines: lines.len(),
        };
        let message = i18n::t_with_args(
            "reconciliation.committed",
            &[("count", outcome.applied_count.to_string().as_str())],
        );
        info!(
            session_id = %outcome.session_id,
            applied = outcome.applied_count,
            recorded = outcome.recorded_lines,
            "盘点已提交"
        );
        Ok(CommitResult { outcome, message })
    }

    /// 计划涉及商品的账面数必须等于当前余额（在提交事务的连接上读取）
    fn revalidate_with(
        &self,
        conn: &Connection,
        plan: &ReconciliationPlan,
        chunk_size: usize,
    ) -> ApiResult<()> {
        let item_ids: Vec<String> = plan.lines.iter().map(|l| l.item_id.clone()).collect();
        let filter = MovementFilter {
            item_ids: Some(item_ids.clone()),
            ..MovementFilter::all()
        };
        let movements = list_movements_with(conn, &filter, chunk_size)?;
        let current = self
            .aggregator
            .summarize(item_ids.iter().map(String::as_str), &movements, None)
            .balances;
        self.engine.revalidate(plan, &current)?;
        Ok(())
    }

    // ==========================================
    // 会话查询
    // ==========================================

    /// 日期区间内的会话（新在前）
    pub fn list_sessions(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> ApiResult<Vec<AuditSessionSummary>> {
        if let (Some(f), Some(t)) = (from, to) {
            if f > t {
                return Err(ApiError::InvalidInput(format!(
                    "开始日期晚于结束日期: {} > {}",
                    f, t
                )));
            }
        }
        Ok(self.audit_repo.list_sessions(from, to)?)
    }

    pub fn session_detail(&self, session_id: &str) -> ApiResult<SessionDetail> {
        let session = self
            .audit_repo
            .find_session(session_id)?
            .ok_or_else(|| ApiError::NotFound(format!("盘点会话(id={})不存在", session_id)))?;
        let lines = self.audit_repo.list_lines(session_id)?;
        Ok(SessionDetail { session, lines })
    }
}

/// 计划 → 盘点行 + 调整流水
fn build_rows(session: &AuditSession, plan: &ReconciliationPlan) -> (Vec<AuditLine>, Vec<NewMovement>) {
    let lines = plan
        .lines
        .iter()
        .map(|l| AuditLine {
            line_id: Uuid::new_v4().to_string(),
            session_id: session.session_id.clone(),
            audit_date: session.audit_date,
            item_id: l.item_id.clone(),
            book_main: l.book.main,
            book_rolls: l.book.rolls,
            actual_main: l.actual.main,
            actual_rolls: l.actual.rolls,
            diff_main: l.diff.main,
            diff_rolls: l.diff.rolls,
        })
        .collect();
    let adjustments = plan
        .lines
        .iter()
        .filter_map(|l| l.adjustment.clone())
        .collect();
    (lines, adjustments)
}
