//! Live table engine: row merging with change highlighting, column
//! visibility, and the autoscroll state machine.

pub mod autoscroll;
pub mod merge;
pub mod visibility;

pub use autoscroll::{Autoscroll, AutoscrollPolicy, ScrollCommand, ScrollMode};
pub use merge::{MergeReport, TableState};
pub use visibility::{ColumnVisibility, VisibilityError};
