use std::collections::BTreeSet;

use thiserror::Error;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VisibilityError {
    #[error("column {column} does not exist (table has {columns} columns)")]
    UnknownColumn { column: usize, columns: usize },
}

/// Per-column show/hide flags plus the "has changed" indicators shown next to
/// each entry of the column chooser.
///
/// Every mutating call bumps [`ColumnVisibility::generation`]; the renderer
/// relayouts whenever the generation moves, even if the flags ended up equal.
#[derive(Debug, Clone)]
pub struct ColumnVisibility {
    visible: Vec<bool>,
    changed: Vec<bool>,
    generation: u64,
}

impl ColumnVisibility {
    pub fn new(columns: usize) -> Self {
        Self {
            visible: vec![true; columns],
            changed: vec![false; columns],
            generation: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_visible(&self, column: usize) -> bool {
        self.visible.get(column).copied().unwrap_or(false)
    }

    pub fn is_changed(&self, column: usize) -> bool {
        self.changed.get(column).copied().unwrap_or(false)
    }

    pub fn visible_columns(&self) -> Vec<usize> {
        self.visible
            .iter()
            .enumerate()
            .filter_map(|(idx, shown)| shown.then_some(idx))
            .collect()
    }

    pub fn set_all(&mut self, visible: bool) {
        self.visible.iter_mut().for_each(|flag| *flag = visible);
        self.bump("set_all");
    }

    /// Shows exactly the columns in `dirty` and hides the rest.
    pub fn set_only_changed(&mut self, dirty: &BTreeSet<usize>) {
        for (idx, flag) in self.visible.iter_mut().enumerate() {
            *flag = dirty.contains(&idx);
        }
        self.bump("set_only_changed");
    }

    pub fn toggle(&mut self, column: usize, visible: bool) -> Result<(), VisibilityError> {
        let columns = self.visible.len();
        let flag = self
            .visible
            .get_mut(column)
            .ok_or(VisibilityError::UnknownColumn { column, columns })?;
        *flag = visible;
        self.bump("toggle");
        Ok(())
    }

    /// Mirrors the dirty-column set into the change indicators. Returns
    /// whether any indicator flipped. Does not affect layout.
    pub fn sync_changed(&mut self, dirty: &BTreeSet<usize>) -> bool {
        let mut flipped = false;
        for (idx, flag) in self.changed.iter_mut().enumerate() {
            let now = dirty.contains(&idx);
            if *flag != now {
                *flag = now;
                flipped = true;
            }
        }
        flipped
    }

    fn bump(&mut self, op: &'static str) {
        self.generation = self.generation.wrapping_add(1);
        trace!(
            target = "slate::columns",
            op,
            generation = self.generation,
            visible = self.visible.iter().filter(|v| **v).count(),
            "column visibility changed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dirty(cols: &[usize]) -> BTreeSet<usize> {
        cols.iter().copied().collect()
    }

    #[test]
    fn starts_fully_visible() {
        let vis = ColumnVisibility::new(3);
        assert_eq!(vis.visible_columns(), vec![0, 1, 2]);
        assert!(!vis.is_changed(0));
    }

    #[test]
    fn only_changed_matches_dirty_set_exactly() {
        let mut vis = ColumnVisibility::new(4);
        vis.set_only_changed(&dirty(&[1, 3]));
        assert_eq!(vis.visible_columns(), vec![1, 3]);

        vis.set_only_changed(&dirty(&[]));
        assert!(vis.visible_columns().is_empty());

        vis.set_all(true);
        assert_eq!(vis.visible_columns(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn every_mutation_requests_relayout() {
        let mut vis = ColumnVisibility::new(2);
        let start = vis.generation();
        vis.set_all(true);
        vis.toggle(1, true).unwrap();
        vis.set_only_changed(&dirty(&[0, 1]));
        assert_eq!(vis.generation(), start + 3);
    }

    #[test]
    fn toggle_rejects_unknown_column_without_side_effects() {
        let mut vis = ColumnVisibility::new(2);
        let generation = vis.generation();
        assert_eq!(
            vis.toggle(5, false),
            Err(VisibilityError::UnknownColumn {
                column: 5,
                columns: 2
            })
        );
        assert_eq!(vis.generation(), generation);
        assert_eq!(vis.visible_columns(), vec![0, 1]);
    }

    #[test]
    fn change_indicators_follow_dirty_set_without_relayout() {
        let mut vis = ColumnVisibility::new(3);
        let generation = vis.generation();
        assert!(vis.sync_changed(&dirty(&[2])));
        assert!(!vis.sync_changed(&dirty(&[2])));
        assert!(vis.is_changed(2));
        assert!(!vis.is_changed(0));
        assert_eq!(vis.generation(), generation);
    }
}
