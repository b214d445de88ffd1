use tracing::{info, warn};

pub const STATUS_CHANGE_FAILED: &str = "Status change failed";

/// Local mirror of the backend capture flag and the one control that flips it.
///
/// The mirror only ever holds values the backend reported. A request in
/// flight disables the control until the backend answers.
#[derive(Debug, Clone, Default)]
pub struct StatusToggle {
    capturing: Option<bool>,
    pending: bool,
}

impl StatusToggle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Authoritative value, `None` until the first read completes.
    pub fn capturing(&self) -> Option<bool> {
        self.capturing
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.unwrap_or(false)
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn status_label(&self) -> &'static str {
        match self.capturing {
            Some(true) => "Capturing...",
            Some(false) => "Stopped",
            None => "Unknown",
        }
    }

    pub fn button_label(&self) -> &'static str {
        if self.is_capturing() {
            "Stop capturing"
        } else {
            "Start capturing"
        }
    }

    /// Applies a plain status read.
    pub fn observe(&mut self, capturing: bool) {
        self.capturing = Some(capturing);
    }

    /// Starts a toggle. Returns the value to request, or `None` while an
    /// earlier request is still outstanding.
    pub fn begin_toggle(&mut self) -> Option<bool> {
        if self.pending {
            return None;
        }
        self.pending = true;
        Some(!self.is_capturing())
    }

    /// Completes a toggle with the backend's answer. On failure the mirror is
    /// left alone and the message to surface is returned.
    pub fn resolve<E: std::fmt::Display>(
        &mut self,
        requested: bool,
        result: Result<bool, E>,
    ) -> Option<&'static str> {
        self.pending = false;
        match result {
            Ok(actual) => {
                if actual != requested {
                    info!(
                        target = "slate::status",
                        requested, actual, "backend refused capture change"
                    );
                }
                self.capturing = Some(actual);
                None
            }
            Err(err) => {
                warn!(target = "slate::status", requested, error = %err, "status change failed");
                Some(STATUS_CHANGE_FAILED)
            }
        }
    }
}
