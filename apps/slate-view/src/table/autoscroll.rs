use tracing::trace;

/// Whether newly appended rows pull the viewport along.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScrollMode {
    #[default]
    Following,
    Detached,
}

impl ScrollMode {
    pub fn label(self) -> &'static str {
        match self {
            ScrollMode::Following => "FOLLOWING",
            ScrollMode::Detached => "DETACHED",
        }
    }
}

/// How user scroll events are evaluated.
///
/// `Strict` only evaluates while following, so once detached the viewer stays
/// detached for the rest of the session. `ReattachAtBottom` evaluates from
/// either state and re-attaches when the operator scrolls back to the bottom.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AutoscrollPolicy {
    #[default]
    Strict,
    ReattachAtBottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollCommand {
    ToBottom,
}

#[derive(Debug, Clone)]
pub struct Autoscroll {
    mode: ScrollMode,
    suppress_next: bool,
    policy: AutoscrollPolicy,
}

impl Default for Autoscroll {
    fn default() -> Self {
        Self::new(AutoscrollPolicy::default())
    }
}

impl Autoscroll {
    pub fn new(policy: AutoscrollPolicy) -> Self {
        Self {
            mode: ScrollMode::Following,
            suppress_next: false,
            policy,
        }
    }

    pub fn mode(&self) -> ScrollMode {
        self.mode
    }

    pub fn policy(&self) -> AutoscrollPolicy {
        self.policy
    }

    pub fn is_following(&self) -> bool {
        self.mode == ScrollMode::Following
    }

    pub fn is_suppressing(&self) -> bool {
        self.suppress_next
    }

    /// Feeds one scroll event. The suppression flag is consumed by whatever
    /// event comes next, regardless of where it came from.
    pub fn on_scroll(&mut self, at_bottom: bool) -> ScrollMode {
        if std::mem::take(&mut self.suppress_next) {
            trace!(
                target = "slate::autoscroll",
                at_bottom,
                "ignored self-issued scroll"
            );
            return self.mode;
        }

        let evaluate = match self.policy {
            AutoscrollPolicy::Strict => self.mode == ScrollMode::Following,
            AutoscrollPolicy::ReattachAtBottom => true,
        };
        if evaluate {
            let next = if at_bottom {
                ScrollMode::Following
            } else {
                ScrollMode::Detached
            };
            if next != self.mode {
                trace!(
                    target = "slate::autoscroll",
                    from = self.mode.label(),
                    to = next.label(),
                    "autoscroll transition"
                );
            }
            self.mode = next;
        }
        self.mode
    }

    /// Called after newly appended rows have been drawn. Returns the
    /// programmatic scroll to perform, arming suppression first.
    pub fn on_rows_rendered(&mut self) -> Option<ScrollCommand> {
        match self.mode {
            ScrollMode::Following => {
                self.suppress_next = true;
                Some(ScrollCommand::ToBottom)
            }
            ScrollMode::Detached => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn programmatic_scroll_does_not_detach() {
        let mut auto = Autoscroll::default();
        assert_eq!(auto.on_rows_rendered(), Some(ScrollCommand::ToBottom));
        assert!(auto.is_suppressing());
        // The event caused by our own scroll, even if it lands short of bottom.
        assert_eq!(auto.on_scroll(false), ScrollMode::Following);
        assert!(!auto.is_suppressing());
    }

    #[test]
    fn user_scroll_away_from_bottom_detaches() {
        let mut auto = Autoscroll::default();
        assert_eq!(auto.on_scroll(true), ScrollMode::Following);
        assert_eq!(auto.on_scroll(false), ScrollMode::Detached);
        assert_eq!(auto.on_rows_rendered(), None);
        assert!(!auto.is_suppressing());
    }

    #[test]
    fn strict_policy_never_reattaches() {
        let mut auto = Autoscroll::new(AutoscrollPolicy::Strict);
        auto.on_scroll(false);
        assert_eq!(auto.on_scroll(true), ScrollMode::Detached);
        assert_eq!(auto.on_rows_rendered(), None);
    }

    #[test]
    fn reattach_policy_follows_again_at_bottom() {
        let mut auto = Autoscroll::new(AutoscrollPolicy::ReattachAtBottom);
        auto.on_scroll(false);
        assert_eq!(auto.mode(), ScrollMode::Detached);
        assert_eq!(auto.on_scroll(true), ScrollMode::Following);
        assert_eq!(auto.on_rows_rendered(), Some(ScrollCommand::ToBottom));
    }

    #[test]
    fn suppression_is_one_shot() {
        let mut auto = Autoscroll::default();
        auto.on_rows_rendered();
        auto.on_scroll(false);
        assert_eq!(auto.on_scroll(false), ScrollMode::Detached);
    }
}
