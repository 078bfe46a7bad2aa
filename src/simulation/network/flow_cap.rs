/// Outflow (or inflow) budget of a link, in PCE.
///
/// The budget refills with `per_second` for every elapsed second and is capped at the budget of one
/// time step. Consuming more than is left is allowed and leaves a debt which the next refills pay
/// back first.
#[derive(Debug, Clone)]
pub struct FlowCapacity {
    per_second: f32,
    per_step: f32,
    budget: f32,
    refilled_at: u32,
}

impl FlowCapacity {
    /// `capacity_h` is in vehicles per hour and is scaled by the sample size.
    pub(super) fn new(capacity_h: f32, sample_size: f32, time_step_size: u32) -> FlowCapacity {
        let per_second = capacity_h * sample_size / 3600.;
        let per_step = per_second * time_step_size as f32;
        FlowCapacity {
            per_second,
            per_step,
            budget: per_step,
            refilled_at: 0,
        }
    }

    pub(super) fn refill(&mut self, now: u32) {
        self.budget = self.budget_at(now);
        self.refilled_at = self.refilled_at.max(now);
    }

    /// The budget after a refill at `now`, without refilling. Node decisions use this on the shared
    /// network state.
    pub(super) fn budget_at(&self, now: u32) -> f32 {
        match now.checked_sub(self.refilled_at) {
            Some(elapsed) if elapsed > 0 => {
                (self.budget + elapsed as f32 * self.per_second).min(self.per_step)
            }
            _ => self.budget,
        }
    }

    pub(super) fn budget(&self) -> f32 {
        self.budget
    }

    pub(super) fn has_budget(&self) -> bool {
        self.budget > 1e-10
    }

    pub(super) fn consume(&mut self, pce: f32) {
        self.budget -= pce;
    }

    pub(super) fn per_step(&self) -> f32 {
        self.per_step
    }

    pub(super) fn per_second(&self) -> f32 {
        self.per_second
    }
}
