//! Progressive scroll schedule used to trigger lazy-loaded content.

/// Scrolling never goes further than this many viewport heights.
pub const MAX_VIEWPORTS: u64 = 5;

/// Absolute cap on scroll steps regardless of page size.
pub const MAX_ATTEMPTS: u32 = 20;

/// Consecutive steps without document growth before scrolling stops.
pub const STALL_LIMIT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxDistance,
    HeightStable,
    AttemptCap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollStep {
    /// Scroll to this vertical offset, then settle.
    To(u64),
    Stop(StopReason),
}

/// State machine deciding the next scroll position from observed heights.
#[derive(Debug, Clone)]
pub struct ScrollPlan {
    viewport_height: u64,
    max_offset: u64,
    offset: u64,
    attempts: u32,
    stalled: u32,
    last_height: Option<u64>,
}

impl ScrollPlan {
    #[must_use]
    pub fn new(viewport_height: u32) -> Self {
        let viewport_height = u64::from(viewport_height.max(1));
        Self {
            viewport_height,
            max_offset: viewport_height * MAX_VIEWPORTS,
            offset: 0,
            attempts: 0,
            stalled: 0,
            last_height: None,
        }
    }

    /// Feed the current document height and get the next step.
    pub fn next_step(&mut self, document_height: u64) -> ScrollStep {
        if self.attempts >= MAX_ATTEMPTS {
            return ScrollStep::Stop(StopReason::AttemptCap);
        }

        if let Some(last) = self.last_height {
            if document_height <= last {
                self.stalled += 1;
            } else {
                self.stalled = 0;
            }
        }
        self.last_height = Some(document_height);

        if self.stalled >= STALL_LIMIT {
            return ScrollStep::Stop(StopReason::HeightStable);
        }

        let next = self.offset + self.viewport_height;
        if next > self.max_offset {
            return ScrollStep::Stop(StopReason::MaxDistance);
        }

        self.attempts += 1;
        self.offset = next;
        ScrollStep::To(next)
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growing_page_stops_at_five_viewports() {
        let mut plan = ScrollPlan::new(1000);
        let mut height = 2000;
        let mut offsets = Vec::new();
        loop {
            match plan.next_step(height) {
                ScrollStep::To(offset) => offsets.push(offset),
                ScrollStep::Stop(reason) => {
                    assert_eq!(reason, StopReason::MaxDistance);
                    break;
                }
            }
            height += 1500;
        }
        assert_eq!(offsets, vec![1000, 2000, 3000, 4000, 5000]);
    }

    #[test]
    fn test_static_page_stops_after_three_stalls() {
        let mut plan = ScrollPlan::new(800);
        assert_eq!(plan.next_step(900), ScrollStep::To(800));
        assert_eq!(plan.next_step(900), ScrollStep::To(1600));
        assert_eq!(plan.next_step(900), ScrollStep::To(2400));
        assert_eq!(
            plan.next_step(900),
            ScrollStep::Stop(StopReason::HeightStable)
        );
        assert_eq!(plan.attempts(), 3);
    }

    #[test]
    fn test_growth_resets_stall_counter() {
        let mut plan = ScrollPlan::new(100);
        plan.next_step(500);
        plan.next_step(500);
        plan.next_step(500);
        // Growth just before the third stall keeps scrolling
        assert_eq!(plan.next_step(700), ScrollStep::To(400));
        assert_eq!(plan.next_step(700), ScrollStep::To(500));
    }

    #[test]
    fn test_zero_viewport_is_treated_as_one_pixel() {
        let mut plan = ScrollPlan::new(0);
        assert_eq!(plan.next_step(10), ScrollStep::To(1));
    }
}
