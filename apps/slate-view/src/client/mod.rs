//! Backend-facing side of a view: polling, capture status, injection and the
//! controller that ties them to the table engine.

pub mod fetch;
pub mod inject;
pub mod keys;
pub mod prefill;
pub mod status;
pub mod view;

pub use fetch::{FetchError, FetchLoop, FetchOutcome, should_poll};
pub use inject::{InjectDraft, InjectError, InjectStatus};
pub use status::StatusToggle;
pub use view::{Effect, EffectRunner, ViewContext, ViewController, ViewEvent};
