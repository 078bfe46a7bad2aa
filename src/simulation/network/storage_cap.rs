/// StorageCap tracks how many vehicles (in PCE) are on a link.
///
/// Vehicles consume storage when they start driving on a link and release it when they cross the
/// downstream node or arrive on the link. A vehicle may enter as long as the used storage is below the
/// maximum, so a vehicle larger than the remaining storage still fits onto a link with some space left.
#[derive(Debug, Clone)]
pub struct StorageCap {
    max: f32,
    used: f32,
}

impl StorageCap {
    pub fn build(
        length: f64,
        perm_lanes: f32,
        capacity_per_time_step: f32,
        sample_size: f32,
        effective_cell_size: f32,
        explicit: Option<f32>,
    ) -> Self {
        let max = match explicit {
            Some(cap) => cap * sample_size,
            None => {
                let cap = length * perm_lanes as f64 * sample_size as f64
                    / effective_cell_size as f64;
                // storage capacity needs to be at least enough to handle the cap_per_time_step:
                capacity_per_time_step.ceil().max(cap.floor() as f32)
            }
        };

        Self {
            // a link must hold at least one vehicle, otherwise nothing could ever pass it
            max: max.max(1.),
            used: 0.0,
        }
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn used(&self) -> f32 {
        self.used
    }

    pub fn consume(&mut self, value: f32) {
        self.used += value;
    }

    pub fn release(&mut self, value: f32) {
        self.used = (self.used - value).max(0.);
    }

    pub fn reset(&mut self) {
        self.used = 0.;
    }

    /// Tests whether there is storage capacity available on the link.
    pub fn is_available(&self) -> bool {
        self.is_available_with(0.)
    }

    /// Tests whether there is storage capacity available, if `additional` storage was consumed on
    /// top of the current usage.
    pub fn is_available_with(&self, additional: f32) -> bool {
        self.max - (self.used + additional) > 1e-6
    }

    /// Recomputes the maximum after the link's attributes changed. Vehicles already on the link stay.
    pub fn set_max(&mut self, other: &StorageCap) {
        self.max = other.max;
    }
}
