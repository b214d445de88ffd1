//! Terminal rendering of a live view.

pub mod table_view;
pub mod viewport;

pub use viewport::{ScrollEvent, Viewport};
