/// Observations of one time bin. Travel times of stuck agents are kept apart, they only count if
/// no regular traversal was observed in the bin.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct BinObservations {
    sum: f64,
    count: u32,
    stuck_sum: f64,
    stuck_count: u32,
}

impl BinObservations {
    fn mean(&self) -> Option<f64> {
        if self.count > 0 {
            Some(self.sum / self.count as f64)
        } else if self.stuck_count > 0 {
            Some(self.stuck_sum / self.stuck_count as f64)
        } else {
            None
        }
    }
}

/// Binned travel times of one link or one pair of links.
///
/// Observations are collected per bin. The values handed out are the consolidated bin means, which
/// have to be recomputed with [TravelTimeData::consolidate] after new observations were added.
#[derive(Debug, Clone, PartialEq)]
pub struct TravelTimeData {
    bin_size: u32,
    free_flow: f64,
    bins: Vec<BinObservations>,
    consolidated: Vec<f64>,
}

impl TravelTimeData {
    /// `bin_size` must be positive.
    pub fn new(free_flow: f64, bin_size: u32, num_slots: usize) -> Self {
        let num_slots = num_slots.max(1);
        TravelTimeData {
            bin_size,
            free_flow,
            bins: vec![BinObservations::default(); num_slots],
            consolidated: vec![free_flow; num_slots],
        }
    }

    /// The bin covering `time`. Times after the last bin fall into the last bin.
    pub fn slot(&self, time: u32) -> usize {
        ((time / self.bin_size) as usize).min(self.bins.len() - 1)
    }

    pub fn num_slots(&self) -> usize {
        self.bins.len()
    }

    pub fn add_travel_time(&mut self, time: u32, travel_time: f64) {
        let slot = self.slot(time);
        let bin = &mut self.bins[slot];
        bin.sum += travel_time;
        bin.count += 1;
    }

    pub fn add_stuck_travel_time(&mut self, time: u32, travel_time: f64) {
        let slot = self.slot(time);
        let bin = &mut self.bins[slot];
        bin.stuck_sum += travel_time;
        bin.stuck_count += 1;
    }

    /// Number of regular observations in the bin covering `time`.
    pub fn observations(&self, time: u32) -> u32 {
        self.bins[self.slot(time)].count
    }

    /// The mean of the bin, or the free flow travel time if nothing was observed.
    fn raw_travel_time(&self, slot: usize) -> f64 {
        self.bins[slot].mean().unwrap_or(self.free_flow)
    }

    /// Recomputes the values handed out. A bin must not be faster than its predecessor minus one bin
    /// size: vehicles queued in one bin can't clear the link earlier than one bin later. Slower bins
    /// are kept as they are and become the baseline for the next bin.
    pub fn consolidate(&mut self) {
        let bin_size = self.bin_size as f64;
        let mut prev = self.raw_travel_time(0);
        self.consolidated[0] = prev;
        for slot in 1..self.bins.len() {
            let travel_time = self.raw_travel_time(slot);
            let min_travel_time = prev - bin_size;
            if travel_time < min_travel_time {
                self.consolidated[slot] = min_travel_time;
                prev = min_travel_time;
            } else {
                self.consolidated[slot] = travel_time;
                prev = travel_time;
            }
        }
    }

    /// The consolidated travel time of the bin covering `time`.
    pub fn travel_time(&self, time: u32) -> f64 {
        self.consolidated[self.slot(time)]
    }
}
