// ==========================================
// 纺织品库存台账系统 - 导入去重匹配引擎
// ==========================================
// 职责: 来源行按自然键分组合并，并对照目录键分类
// 红线: 分组键为结构化元组，不做字符串拼接
// 红线: 自然键字段缺失的行为"不完整"，永远不可选
// ==========================================
// 合并规则:
// - count      = 合并的原始行数
// - last_date  = 最大日期
// - last_status= 有状态的行中按 (日期, 状态排名) 取最大；有日期 > 无日期
// - image      = 有图片的行中取日期最新者；同日期取先出现者
// ==========================================

use crate::domain::import::{CatalogMapping, DedupReport, MergedRow, SourceFilter, SourceKey, SourceRow};
use crate::domain::item::CatalogKey;
use crate::domain::text::{clean_text, non_empty, normalize_key_part};
use crate::domain::types::{Classification, SourceStatus};
use chrono::{Duration, NaiveDate};
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

/// 分组累加器
struct GroupAcc {
    key: SourceKey,
    first: SourceRow,
    count: usize,
    last_date: Option<NaiveDate>,
    status: Option<(Option<NaiveDate>, u8, String)>,
    image: Option<(Option<NaiveDate>, String)>,
}

impl GroupAcc {
    fn new(key: SourceKey, row: &SourceRow) -> Self {
        let mut acc = Self {
            key,
            first: row.clone(),
            count: 0,
            last_date: None,
            status: None,
            image: None,
        };
        acc.absorb(row);
        acc
    }

    fn absorb(&mut self, row: &SourceRow) {
        self.count += 1;
        if row.date > self.last_date {
            self.last_date = row.date;
        }

        if let Some(status) = non_empty(row.status.as_deref()) {
            let rank = SourceStatus::rank_of(&status);
            let better = match &self.status {
                None => true,
                Some((d, r, _)) => (row.date, rank) > (*d, *r),
            };
            if better {
                self.status = Some((row.date, rank, status));
            }
        }

        if let Some(url) = non_empty(row.image_url.as_deref()) {
            let better = match &self.image {
                None => true,
                Some((d, _)) => row.date > *d,
            };
            if better {
                self.image = Some((row.date, url));
            }
        }
    }
}

// ==========================================
// ImportMatcher - 去重匹配引擎
// ==========================================
pub struct ImportMatcher {
    mapping: CatalogMapping,
}

impl ImportMatcher {
    pub fn new(mapping: CatalogMapping) -> Self {
        Self { mapping }
    }

    pub fn mapping(&self) -> &CatalogMapping {
        &self.mapping
    }

    /// 去重并分类
    ///
    /// # 参数
    /// - rows: 来源行（任意顺序）
    /// - existing: 预先读取的目录键集合
    ///
    /// # 返回
    /// - DedupReport：合并行按首次出现顺序，不完整行逐行保留
    #[instrument(skip_all, fields(rows = rows.len(), existing = existing.len()))]
    pub fn dedupe_and_classify(
        &self,
        rows: &[SourceRow],
        existing: &HashSet<CatalogKey>,
    ) -> DedupReport {
        let mut index: HashMap<SourceKey, usize> = HashMap::new();
        let mut slots: Vec<Result<GroupAcc, SourceRow>> = Vec::new();

        for row in rows {
            match row.source_key() {
                Some(key) => match index.get(&key) {
                    Some(&pos) => {
                        if let Ok(acc) = &mut slots[pos] {
                            acc.absorb(row);
                        }
                    }
                    None => {
                        index.insert(key.clone(), slots.len());
                        slots.push(Ok(GroupAcc::new(key, row)));
                    }
                },
                None => slots.push(Err(row.clone())),
            }
        }

        let mut report = DedupReport::default();
        for slot in slots {
            let merged = match slot {
                Ok(acc) => self.finish_group(acc, existing),
                Err(row) => incomplete_row(&row),
            };
            match merged.classification {
                Classification::New => report.new_count += 1,
                Classification::Existing => report.existing_count += 1,
                Classification::Incomplete => report.incomplete_count += 1,
            }
            report.merged.push(merged);
        }

        debug!(
            groups = report.merged.len(),
            new = report.new_count,
            existing = report.existing_count,
            incomplete = report.incomplete_count,
            "去重分类完成"
        );
        report
    }

    fn finish_group(&self, acc: GroupAcc, existing: &HashSet<CatalogKey>) -> MergedRow {
        let catalog_key = self.mapping.catalog_key(&acc.first);
        let classification = if existing.contains(&catalog_key) {
            Classification::Existing
        } else {
            Classification::New
        };

        MergedRow {
            key: Some(acc.key),
            quality: clean_text(&acc.first.quality),
            design_code: clean_text(&acc.first.design_code),
            mariage_code: clean_text(&acc.first.mariage_code),
            count: acc.count,
            last_date: acc.last_date,
            last_status: acc.status.map(|(_, _, s)| s),
            image_url: acc.image.map(|(_, u)| u),
            classification,
            catalog_key: Some(catalog_key),
        }
    }

    /// 去重前的来源预筛选
    pub fn filter_rows(
        &self,
        rows: Vec<SourceRow>,
        filter: &SourceFilter,
        today: NaiveDate,
    ) -> Vec<SourceRow> {
        let since = filter.days_back.map(|n| today - Duration::days(n.max(0)));
        let status = filter.status.as_deref().map(clean_text).filter(|s| !s.is_empty());
        let text = filter
            .text
            .as_deref()
            .map(normalize_key_part)
            .filter(|s| !s.is_empty());

        rows.into_iter()
            .filter(|r| match since {
                Some(s) => r.date.map_or(false, |d| d >= s),
                None => true,
            })
            .filter(|r| match &status {
                Some(s) => r.status.as_deref().map(clean_text).as_deref() == Some(s.as_str()),
                None => true,
            })
            .filter(|r| match &text {
                Some(t) => {
                    let hay = normalize_key_part(&format!(
                        "{} {} {} {}",
                        r.quality,
                        r.design_code,
                        r.mariage_code,
                        r.status.as_deref().unwrap_or("")
                    ));
                    hay.contains(t.as_str())
                }
                None => true,
            })
            .collect()
    }

    /// 只返回被选中的"新"行；已存在/不完整的行即使被选中也会被忽略
    pub fn select_new<'a>(
        &self,
        report: &'a DedupReport,
        selected: &HashSet<SourceKey>,
    ) -> Vec<&'a MergedRow> {
        report
            .merged
            .iter()
            .filter(|m| m.is_selectable())
            .filter(|m| m.key.as_ref().map_or(false, |k| selected.contains(k)))
            .collect()
    }
}

fn incomplete_row(row: &SourceRow) -> MergedRow {
    MergedRow {
        key: None,
        quality: clean_text(&row.quality),
        design_code: clean_text(&row.design_code),
        mariage_code: clean_text(&row.mariage_code),
        count: 1,
        last_date: row.date,
        last_status: non_empty(row.status.as_deref()),
        image_url: non_empty(row.image_url.as_deref()),
        classification: Classification::Incomplete,
        catalog_key: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOT_FORMED: &str = SourceStatus::NOT_FORMED_LABEL;
    const FORMED: &str = SourceStatus::FORMED_LABEL;
    const RECEIVED: &str = SourceStatus::RECEIVED_LABEL;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, day).unwrap()
    }

    fn row(q: &str, design: &str, m: &str, status: Option<&str>, date: Option<NaiveDate>) -> SourceRow {
        SourceRow {
            quality: q.to_string(),
            design_code: design.to_string(),
            mariage_code: m.to_string(),
            status: status.map(str::to_string),
            date,
            image_url: None,
        }
    }

    fn matcher() -> ImportMatcher {
        ImportMatcher::new(CatalogMapping::default())
    }

    #[test]
    fn test_key_normalization_merges_variants() {
        let rows = vec![
            row("Poly", "D-10", "M1", None, None),
            row("  poly ", "d-10 ", " m1", None, None),
        ];
        let report = matcher().dedupe_and_classify(&rows, &HashSet::new());
        assert_eq!(report.merged.len(), 1);
        assert_eq!(report.merged[0].count, 2);
        assert_eq!(report.merged[0].quality, "Poly");
        assert_eq!(report.new_count, 1);
    }

    #[test]
    fn test_status_follows_latest_date() {
        let rows = vec![
            row("Q", "D", "M", Some(FORMED), Some(d(1))),
            row("Q", "D", "M", Some(NOT_FORMED), Some(d(2))),
            row("Q", "D", "M", Some(RECEIVED), Some(d(3))),
        ];
        let report = matcher().dedupe_and_classify(&rows, &HashSet::new());
        let m = &report.merged[0];
        assert_eq!(m.count, 3);
        assert_eq!(m.last_date, Some(d(3)));
        assert_eq!(m.last_status.as_deref(), Some(RECEIVED));

        // 最新日期上的状态胜出，即使排名更低
        let rows = vec![
            row("Q", "D", "M", Some(RECEIVED), Some(d(2))),
            row("Q", "D", "M", Some(FORMED), Some(d(1))),
            row("Q", "D", "M", Some(NOT_FORMED), Some(d(3))),
        ];
        let report = matcher().dedupe_and_classify(&rows, &HashSet::new());
        assert_eq!(report.merged[0].last_status.as_deref(), Some(NOT_FORMED));
    }

    #[test]
    fn test_status_rank_breaks_ties_and_absent_dates() {
        let same_day = vec![
            row("Q", "D", "M", Some(RECEIVED), Some(d(4))),
            row("Q", "D", "M", Some(FORMED), Some(d(4))),
        ];
        let report = matcher().dedupe_and_classify(&same_day, &HashSet::new());
        assert_eq!(report.merged[0].last_status.as_deref(), Some(RECEIVED));

        let no_dates = vec![
            row("Q", "D", "M", Some(NOT_FORMED), None),
            row("Q", "D", "M", Some(FORMED), None),
        ];
        let report = matcher().dedupe_and_classify(&no_dates, &HashSet::new());
        assert_eq!(report.merged[0].last_status.as_deref(), Some(FORMED));

        // 有日期的行优先于无日期的行
        let mixed = vec![
            row("Q", "D", "M", Some(RECEIVED), None),
            row("Q", "D", "M", Some(NOT_FORMED), Some(d(1))),
        ];
        let report = matcher().dedupe_and_classify(&mixed, &HashSet::new());
        assert_eq!(report.merged[0].last_status.as_deref(), Some(NOT_FORMED));
    }

    #[test]
    fn test_merge_is_order_independent_for_status_and_date() {
        let rows = vec![
            row("Q", "D", "M", Some(FORMED), Some(d(1))),
            row("Q", "D", "M", Some(NOT_FORMED), Some(d(2))),
            row("Q", "D", "M", Some(RECEIVED), Some(d(2))),
            row("Q", "D", "M", None, Some(d(5))),
        ];
        let forward = matcher().dedupe_and_classify(&rows, &HashSet::new());
        let mut reversed_rows = rows.clone();
        reversed_rows.reverse();
        let reversed = matcher().dedupe_and_classify(&reversed_rows, &HashSet::new());

        assert_eq!(forward.merged[0].last_date, Some(d(5)));
        assert_eq!(forward.merged[0].last_status.as_deref(), Some(RECEIVED));
        assert_eq!(forward.merged[0].last_date, reversed.merged[0].last_date);
        assert_eq!(forward.merged[0].last_status, reversed.merged[0].last_status);
    }

    #[test]
    fn test_image_prefers_latest_date() {
        let mut a = row("Q", "D", "M", None, Some(d(1)));
        a.image_url = Some("https://img/a.jpg".to_string());
        let mut b = row("Q", "D", "M", None, Some(d(3)));
        b.image_url = Some("https://img/b.png".to_string());
        let mut c = row("Q", "D", "M", None, Some(d(3)));
        c.image_url = Some("https://img/c.png".to_string());
        let mut e = row("Q", "D", "M", None, Some(d(9)));
        e.image_url = Some("   ".to_string());

        let report = matcher().dedupe_and_classify(&[a, b, c, e], &HashSet::new());
        assert_eq!(report.merged[0].image_url.as_deref(), Some("https://img/b.png"));
    }

    #[test]
    fn test_classification_uses_catalog_key() {
        let mut existing = HashSet::new();
        existing.insert(CatalogKey::new("رسمة D-1", "M1"));

        let rows = vec![
            row("Q1", "d-1", "m1", None, None),
            row("Q2", "D-2", "M1", None, None),
            row("", "D-3", "M1", None, None),
            row("Q3", "D-4", " ", None, None),
        ];
        let report = matcher().dedupe_and_classify(&rows, &existing);

        assert_eq!(report.existing_count, 1);
        assert_eq!(report.new_count, 1);
        assert_eq!(report.incomplete_count, 2);
        assert_eq!(report.merged[0].classification, Classification::Existing);
        assert_eq!(report.merged[1].classification, Classification::New);
        assert!(report.merged[2..].iter().all(|m| !m.is_selectable()));
    }

    #[test]
    fn test_select_new_ignores_non_new_rows() {
        let mut existing = HashSet::new();
        existing.insert(CatalogKey::new("رسمة A", "1"));
        let rows = vec![row("Q", "A", "1", None, None), row("Q", "B", "1", None, None)];
        let m = matcher();
        let report = m.dedupe_and_classify(&rows, &existing);

        let selected: HashSet<SourceKey> =
            report.merged.iter().filter_map(|r| r.key.clone()).collect();
        let picked = m.select_new(&report, &selected);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].design_code, "B");
    }

    #[test]
    fn test_filter_rows() {
        let rows = vec![
            row("Poly", "A", "1", Some(FORMED), Some(d(20))),
            row("Poly", "B", "1", Some(RECEIVED), Some(d(2))),
            row("Cotton", "C", "1", Some(FORMED), None),
        ];
        let m = matcher();

        let recent = m.filter_rows(
            rows.clone(),
            &SourceFilter {
                days_back: Some(7),
                ..Default::default()
            },
            d(25),
        );
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].design_code, "A");

        let formed = m.filter_rows(
            rows.clone(),
            &SourceFilter {
                status: Some(FORMED.to_string()),
                ..Default::default()
            },
            d(25),
        );
        assert_eq!(formed.len(), 2);

        let text = m.filter_rows(
            rows,
            &SourceFilter {
                text: Some("COTTON".to_string()),
                ..Default::default()
            },
            d(25),
        );
        assert_eq!(text.len(), 1);
    }
}
