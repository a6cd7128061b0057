// ==========================================
// 样品申请目录系统 - 目录去重计划
// ==========================================
// 规则: 行业按名称、分组按 (行业, 分组) 复合键、产品按名称去重
// 顺序: 保持首次出现顺序
// ==========================================

use crate::domain::import::{CatalogRow, DryRunSamples, RawRow, RowOutcome, SkippedRow, UniqueCounts};
use crate::importer::row_normalizer::normalize_row;
use std::collections::HashSet;
use std::fmt;

/// 待写入的分组（所属行业名 + 分组名）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlannedGroup {
    pub sector: String,
    pub group: String,
}

impl PlannedGroup {
    pub fn key(&self) -> (&str, &str) {
        (&self.sector, &self.group)
    }
}

// 仅用于日志与错误信息
impl fmt::Display for PlannedGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.sector, self.group)
    }
}

// ==========================================
// CatalogPlan - 清洗 + 去重结果（试运行与正式导入共用）
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct CatalogPlan {
    pub row_count: usize,
    pub rows: Vec<CatalogRow>,
    pub skipped: Vec<SkippedRow>,
    pub sectors: Vec<String>,
    pub groups: Vec<PlannedGroup>,
    pub products: Vec<String>,
}

impl CatalogPlan {
    pub fn build(raw_rows: &[RawRow]) -> Self {
        let mut plan = CatalogPlan {
            row_count: raw_rows.len(),
            ..Default::default()
        };

        let mut seen_sectors = HashSet::new();
        let mut seen_groups = HashSet::new();
        let mut seen_products = HashSet::new();

        for raw in raw_rows {
            match normalize_row(raw) {
                RowOutcome::Skipped(skipped) => plan.skipped.push(skipped),
                RowOutcome::Accepted(row) => {
                    if seen_sectors.insert(row.sector.clone()) {
                        plan.sectors.push(row.sector.clone());
                    }
                    let planned = PlannedGroup {
                        sector: row.sector.clone(),
                        group: row.group.clone(),
                    };
                    if seen_groups.insert(planned.clone()) {
                        plan.groups.push(planned);
                    }
                    if seen_products.insert(row.product.clone()) {
                        plan.products.push(row.product.clone());
                    }
                    plan.rows.push(row);
                }
            }
        }

        plan
    }

    pub fn unique_counts(&self) -> UniqueCounts {
        UniqueCounts {
            sectors: self.sectors.len(),
            groups: self.groups.len(),
            products: self.products.len(),
        }
    }

    /// 每类前 n 个样例（分组样例为分组名本身）
    pub fn samples(&self, n: usize) -> DryRunSamples {
        DryRunSamples {
            sectors: self.sectors.iter().take(n).cloned().collect(),
            groups: self.groups.iter().take(n).map(|g| g.group.clone()).collect(),
            products: self.products.iter().take(n).cloned().collect(),
        }
    }
}
