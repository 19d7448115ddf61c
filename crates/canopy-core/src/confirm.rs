//! Two-phase slide-to-confirm for destructive actions.
//!
//! Phase one arms a pending record at zero progress. Phase two feeds a
//! continuous drag value. Releasing at or past the threshold yields the
//! target exactly once and clears the record; releasing short of it snaps
//! the slider back to zero.

/// Default release threshold.
pub const DEFAULT_CONFIRM_THRESHOLD: u8 = 80;

/// An armed destructive action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction<T> {
    /// What the action will destroy.
    pub target: T,
    /// Slide progress, 0-100.
    pub slide_progress: u8,
    /// True while progress is at or past the threshold.
    pub armed: bool,
}

/// Result of releasing the slider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Release<T> {
    /// Threshold reached: run the action on this target.
    Fire(T),
    /// Released short of the threshold; progress is back at zero.
    SnappedBack,
    /// Nothing was pending.
    Idle,
}

/// Slide-to-confirm state machine.
#[derive(Debug, Clone)]
pub struct SlideConfirm<T> {
    pending: Option<PendingAction<T>>,
    threshold: u8,
}

impl<T> Default for SlideConfirm<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIRM_THRESHOLD)
    }
}

impl<T> SlideConfirm<T> {
    /// Create a state machine with the given threshold (clamped to 1..=100).
    pub fn new(threshold: u8) -> Self {
        Self {
            pending: None,
            threshold: threshold.clamp(1, 100),
        }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Phase one: arm an action at zero progress, replacing any other.
    pub fn arm(&mut self, target: T) {
        self.pending = Some(PendingAction {
            target,
            slide_progress: 0,
            armed: false,
        });
    }

    /// Phase two: report drag progress. Ignored when nothing is pending.
    pub fn drag(&mut self, progress: u8) {
        let threshold = self.threshold;
        if let Some(pending) = self.pending.as_mut() {
            pending.slide_progress = progress.min(100);
            pending.armed = pending.slide_progress >= threshold;
        }
    }

    /// Release the slider.
    pub fn release(&mut self) -> Release<T> {
        match self.pending.take() {
            Some(pending) if pending.slide_progress >= self.threshold => {
                Release::Fire(pending.target)
            }
            Some(mut pending) => {
                pending.slide_progress = 0;
                pending.armed = false;
                self.pending = Some(pending);
                Release::SnappedBack
            }
            None => Release::Idle,
        }
    }

    /// Drop the pending action (cancel button, commit, focus loss).
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn pending(&self) -> Option<&PendingAction<T>> {
        self.pending.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_below_threshold_snaps_back() {
        let mut confirm = SlideConfirm::new(80);
        confirm.arm("a.txt");
        confirm.drag(79);
        assert_eq!(confirm.release(), Release::SnappedBack);

        let pending = confirm.pending().unwrap();
        assert_eq!(pending.slide_progress, 0);
        assert!(!pending.armed);
    }

    #[test]
    fn test_release_at_threshold_fires_once() {
        let mut confirm = SlideConfirm::new(80);
        confirm.arm("a.txt");
        confirm.drag(80);
        assert!(confirm.pending().unwrap().armed);
        assert_eq!(confirm.release(), Release::Fire("a.txt"));
        assert_eq!(confirm.release(), Release::Idle);
        assert!(!confirm.is_pending());
    }

    #[test]
    fn test_drag_without_arm_is_ignored() {
        let mut confirm: SlideConfirm<&str> = SlideConfirm::default();
        confirm.drag(100);
        assert_eq!(confirm.release(), Release::Idle);
    }

    #[test]
    fn test_drag_clamps_and_cancel_clears() {
        let mut confirm = SlideConfirm::new(80);
        confirm.arm(1);
        confirm.drag(250);
        assert_eq!(confirm.pending().unwrap().slide_progress, 100);
        confirm.cancel();
        assert!(confirm.pending().is_none());
    }

    #[test]
    fn test_rearm_replaces_target() {
        let mut confirm = SlideConfirm::new(80);
        confirm.arm("a");
        confirm.drag(50);
        confirm.arm("b");
        assert_eq!(confirm.pending().unwrap().slide_progress, 0);
        confirm.drag(90);
        assert_eq!(confirm.release(), Release::Fire("b"));
    }
}
