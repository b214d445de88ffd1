use std::collections::BTreeSet;

use sniffer_sdk::Row;
use tracing::{debug, warn};

use crate::table::visibility::ColumnVisibility;
use crate::telemetry::{self, PerfGuard};

/// Outcome of one [`TableState::merge`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub appended: usize,
    /// Rows dropped because their id was not above the watermark, or because
    /// their arity did not match the schema.
    pub skipped: usize,
    /// Columns that entered the dirty set during this merge.
    pub newly_dirty: Vec<usize>,
}

impl MergeReport {
    pub fn is_noop(&self) -> bool {
        self.appended == 0
    }
}

/// Rows shown in one view plus everything derived from them.
#[derive(Debug, Clone)]
pub struct TableState {
    columns: usize,
    rows: Vec<Row>,
    changed: Vec<Vec<bool>>,
    dirty: BTreeSet<usize>,
    watermark: Option<u64>,
    visibility: ColumnVisibility,
}

impl TableState {
    pub fn new(columns: usize) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            changed: Vec::new(),
            dirty: BTreeSet::new(),
            watermark: None,
            visibility: ColumnVisibility::new(columns),
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Id of the last merged row; the cursor for the next fetch.
    pub fn watermark(&self) -> Option<u64> {
        self.watermark
    }

    pub fn dirty_columns(&self) -> &BTreeSet<usize> {
        &self.dirty
    }

    pub fn is_changed(&self, row: usize, column: usize) -> bool {
        self.changed
            .get(row)
            .and_then(|cells| cells.get(column))
            .copied()
            .unwrap_or(false)
    }

    pub fn visibility(&self) -> &ColumnVisibility {
        &self.visibility
    }

    pub fn visibility_mut(&mut self) -> &mut ColumnVisibility {
        &mut self.visibility
    }

    /// Shows exactly the columns that have changed so far.
    pub fn show_only_changed(&mut self) {
        self.visibility.set_only_changed(&self.dirty);
    }

    /// Appends a batch delivered in increasing id order.
    ///
    /// Rows at or below the watermark are dropped, so a batch fetched by an
    /// overlapping tick merges as a no-op. Only the appended rows and their
    /// single predecessor are compared; no earlier result can change.
    pub fn merge(&mut self, batch: Vec<Row>) -> MergeReport {
        let _guard = PerfGuard::new("table_merge");
        let mut report = MergeReport::default();
        let start = self.rows.len();

        for row in batch {
            if self.watermark.is_some_and(|mark| row.id <= mark) {
                report.skipped += 1;
                continue;
            }
            if row.values.len() != self.columns {
                warn!(
                    target = "slate::merge",
                    id = row.id,
                    values = row.values.len(),
                    columns = self.columns,
                    "dropping row with mismatched arity"
                );
                report.skipped += 1;
                continue;
            }
            self.watermark = Some(row.id);
            self.rows.push(row);
        }

        report.appended = self.rows.len() - start;
        if report.is_noop() {
            return report;
        }

        for idx in start..self.rows.len() {
            let flags = match idx.checked_sub(1) {
                None => vec![false; self.columns],
                Some(prev) => self.rows[prev]
                    .values
                    .iter()
                    .zip(&self.rows[idx].values)
                    .map(|(before, after)| before != after)
                    .collect(),
            };
            for (column, changed) in flags.iter().enumerate() {
                if *changed && self.dirty.insert(column) {
                    report.newly_dirty.push(column);
                }
            }
            self.changed.push(flags);
        }

        self.visibility.sync_changed(&self.dirty);
        telemetry::record_gauge("table_rows", self.rows.len() as u64);
        debug!(
            target = "slate::merge",
            appended = report.appended,
            skipped = report.skipped,
            newly_dirty = ?report.newly_dirty,
            watermark = ?self.watermark,
            "merged batch"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sniffer_sdk::Value;

    fn row(id: u64, values: &[i64]) -> Row {
        Row::new(id, values.iter().map(|v| Value::Int(*v)).collect())
    }

    /// Reference highlight: compare every adjacent pair from scratch.
    fn full_rescan(rows: &[Row]) -> (Vec<Vec<bool>>, BTreeSet<usize>) {
        let mut dirty = BTreeSet::new();
        let mut changed = Vec::new();
        for (idx, row) in rows.iter().enumerate() {
            let flags: Vec<bool> = match idx {
                0 => vec![false; row.values.len()],
                _ => rows[idx - 1]
                    .values
                    .iter()
                    .zip(&row.values)
                    .map(|(a, b)| a != b)
                    .collect(),
            };
            for (col, flag) in flags.iter().enumerate() {
                if *flag {
                    dirty.insert(col);
                }
            }
            changed.push(flags);
        }
        (changed, dirty)
    }

    #[test]
    fn worked_example_marks_expected_cells() {
        let mut table = TableState::new(2);
        table.merge(vec![Row::new(1, vec![Value::Bool(false), Value::Int(5)])]);
        table.merge(vec![
            Row::new(2, vec![Value::Bool(true), Value::Int(5)]),
            Row::new(3, vec![Value::Bool(true), Value::Int(7)]),
        ]);

        assert!(!table.is_changed(0, 0) && !table.is_changed(0, 1));
        assert!(table.is_changed(1, 0));
        assert!(!table.is_changed(1, 1));
        assert!(!table.is_changed(2, 0));
        assert!(table.is_changed(2, 1));
        assert_eq!(
            table.dirty_columns().iter().copied().collect::<Vec<_>>(),
            vec![0, 1]
        );
        assert_eq!(table.watermark(), Some(3));
    }

    #[test]
    fn empty_batch_is_a_noop() {
        let mut table = TableState::new(1);
        table.merge(vec![row(0, &[1]), row(1, &[2])]);
        let generation = table.visibility().generation();
        let dirty = table.dirty_columns().clone();

        let report = table.merge(Vec::new());
        assert!(report.is_noop());
        assert_eq!(table.len(), 2);
        assert_eq!(table.dirty_columns(), &dirty);
        assert_eq!(table.visibility().generation(), generation);
        assert_eq!(table.watermark(), Some(1));
    }

    #[test]
    fn overlapping_batches_do_not_duplicate_rows() {
        let mut table = TableState::new(1);
        table.merge(vec![row(4, &[1]), row(5, &[1])]);
        let report = table.merge(vec![row(4, &[1]), row(5, &[1]), row(6, &[2])]);
        assert_eq!(report.appended, 1);
        assert_eq!(report.skipped, 2);
        let ids: Vec<u64> = table.rows().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4, 5, 6]);
    }

    #[test]
    fn concatenation_preserves_arrival_order_without_gaps() {
        let mut table = TableState::new(1);
        let batches = vec![
            vec![row(0, &[0]), row(1, &[0])],
            vec![],
            vec![row(2, &[0])],
            vec![row(7, &[0]), row(9, &[0])],
        ];
        let mut expected = Vec::new();
        for batch in batches {
            expected.extend(batch.iter().map(|r| r.id));
            table.merge(batch);
        }
        let ids: Vec<u64> = table.rows().iter().map(|r| r.id).collect();
        assert_eq!(ids, expected);
    }

    #[test_timeout::timeout(10)]
    fn incremental_highlight_matches_full_rescan() {
        let series: [&[i64]; 8] = [
            &[1, 1, 1],
            &[1, 2, 1],
            &[1, 2, 1],
            &[3, 2, 1],
            &[3, 2, 1],
            &[3, 2, 4],
            &[3, 2, 4],
            &[0, 0, 0],
        ];
        let rows: Vec<Row> = series
            .iter()
            .enumerate()
            .map(|(id, values)| row(id as u64, values))
            .collect();

        for split in 0..rows.len() {
            let mut table = TableState::new(3);
            let mut previous_dirty = BTreeSet::new();
            for chunk in [&rows[..split], &rows[split..]] {
                table.merge(chunk.to_vec());
                assert!(table.dirty_columns().is_superset(&previous_dirty));
                previous_dirty = table.dirty_columns().clone();
            }
            let (changed, dirty) = full_rescan(&rows);
            for (r, flags) in changed.iter().enumerate() {
                for (c, flag) in flags.iter().enumerate() {
                    assert_eq!(table.is_changed(r, c), *flag, "split {split} cell ({r},{c})");
                }
            }
            assert_eq!(table.dirty_columns(), &dirty);
        }
    }

    #[test]
    fn change_indicators_track_dirty_columns() {
        let mut table = TableState::new(3);
        let report = table.merge(vec![row(0, &[1, 1, 1]), row(1, &[1, 2, 1])]);
        assert_eq!(report.newly_dirty, vec![1]);
        assert!(table.visibility().is_changed(1));
        assert!(!table.visibility().is_changed(0));

        table.show_only_changed();
        assert_eq!(table.visibility().visible_columns(), vec![1]);
    }

    #[test]
    fn mismatched_arity_rows_are_dropped() {
        let mut table = TableState::new(2);
        let report = table.merge(vec![row(0, &[1, 2]), row(1, &[1])]);
        assert_eq!(report.appended, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(table.watermark(), Some(0));
    }
}
