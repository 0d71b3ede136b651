//! Linear step-progression state machine.
//!
//! States are the integers `0..=total`. `0` means not started and `total`
//! means complete; the only transition is a monotonic `+1`.

/// Position within a plan of `total` steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    current: u32,
    total: u32,
}

/// Result of applying one `advance` transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Ordinal of the step whose result is being reported, if one was active.
    pub finished: Option<u32>,
    /// Ordinal now active, or `None` when the plan is complete.
    pub next: Option<u32>,
    /// Whether `current` changed and must be persisted.
    pub moved: bool,
}

impl Progress {
    /// Build a position, clamping `current` into `0..=total`.
    pub fn new(current: u32, total: u32) -> Self {
        Self {
            current: current.min(total),
            total,
        }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// Ordinal of the active step, if `1 <= current <= total`.
    pub fn active(&self) -> Option<u32> {
        (self.current >= 1 && self.current <= self.total).then_some(self.current)
    }

    pub fn is_complete(&self) -> bool {
        self.current >= self.total
    }

    /// Apply one `advance`. Never moves past `total`.
    pub fn advance(self) -> (Self, Transition) {
        let finished = self.active();
        let next = self.current + 1;
        if next > self.total {
            return (
                self,
                Transition {
                    finished,
                    next: None,
                    moved: false,
                },
            );
        }
        let moved = Self {
            current: next,
            total: self.total,
        };
        (
            moved,
            Transition {
                finished,
                next: Some(next),
                moved: true,
            },
        )
    }
}
