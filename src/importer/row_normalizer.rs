// ==========================================
// 样品申请目录系统 - 行清洗
// ==========================================
// 规则: 每个字段 TRIM；三列全空 → 空白行；任一字段为空（或列数不足）→ 跳过并记录原因
// ==========================================

use crate::domain::import::{CatalogRow, RawRow, RowOutcome, SkipReason, SkippedRow};

const SECTOR_COL: usize = 0;
const GROUP_COL: usize = 1;
const PRODUCT_COL: usize = 2;

fn cell(raw: &RawRow, idx: usize) -> &str {
    raw.cells.get(idx).map(|c| c.trim()).unwrap_or("")
}

/// 原始行 → 目录行 / 跳过行
pub fn normalize_row(raw: &RawRow) -> RowOutcome {
    let sector = cell(raw, SECTOR_COL);
    let group = cell(raw, GROUP_COL);
    let product = cell(raw, PRODUCT_COL);

    let reason = if sector.is_empty() && group.is_empty() && product.is_empty() {
        Some(SkipReason::BlankRow)
    } else if sector.is_empty() {
        Some(SkipReason::MissingSector)
    } else if group.is_empty() {
        Some(SkipReason::MissingGroup)
    } else if product.is_empty() {
        Some(SkipReason::MissingProduct)
    } else {
        None
    };

    match reason {
        Some(reason) => RowOutcome::Skipped(SkippedRow {
            row_number: raw.row_number,
            reason,
        }),
        None => RowOutcome::Accepted(CatalogRow {
            row_number: raw.row_number,
            sector: sector.to_string(),
            group: group.to_string(),
            product: product.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(cells: &[&str]) -> RawRow {
        RawRow::new(7, cells.iter().map(|c| c.to_string()).collect())
    }

    #[test]
    fn test_trims_every_field() {
        match normalize_row(&raw(&["  Dairy ", "Cheese\t", " Brie"])) {
            RowOutcome::Accepted(row) => {
                assert_eq!(row.sector, "Dairy");
                assert_eq!(row.group, "Cheese");
                assert_eq!(row.product, "Brie");
                assert_eq!(row.row_number, 7);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_whitespace_only_field_is_skipped() {
        assert_eq!(
            normalize_row(&raw(&["Dairy", "   ", "Brie"])),
            RowOutcome::Skipped(SkippedRow {
                row_number: 7,
                reason: SkipReason::MissingGroup
            })
        );
    }

    #[test]
    fn test_too_few_cells_is_skipped() {
        assert_eq!(
            normalize_row(&raw(&["Dairy", "Cheese"])),
            RowOutcome::Skipped(SkippedRow {
                row_number: 7,
                reason: SkipReason::MissingProduct
            })
        );
        assert!(matches!(
            normalize_row(&raw(&["", "Cheese", "Brie"])),
            RowOutcome::Skipped(SkippedRow {
                reason: SkipReason::MissingSector,
                ..
            })
        ));
    }

    #[test]
    fn test_blank_row_is_reported_as_blank() {
        for cells in [&[][..], &["", " ", "\t"][..]] {
            assert_eq!(
                normalize_row(&raw(cells)),
                RowOutcome::Skipped(SkippedRow {
                    row_number: 7,
                    reason: SkipReason::BlankRow
                })
            );
        }
    }
}
