/// How long the head of a link's buffer has been waiting at the downstream node. A vehicle waiting
/// for at least `threshold` seconds is pushed onto its next link even if that link is full.
///
/// The link starts and resets the timer while it is moved. Node decisions only read it.
#[derive(Debug, Clone)]
pub struct StuckTimer {
    waiting_since: Option<u32>,
    threshold: u32,
}

impl StuckTimer {
    /// `u32::MAX` disables the timer.
    pub fn new(threshold: u32) -> Self {
        StuckTimer {
            waiting_since: None,
            threshold,
        }
    }

    /// Starts the timer unless it is already running.
    pub fn start(&mut self, now: u32) {
        self.waiting_since.get_or_insert(now);
    }

    pub fn reset(&mut self) {
        self.waiting_since = None;
    }

    pub fn is_stuck(&self, now: u32) -> bool {
        self.threshold != u32::MAX
            && self
                .waiting_since
                .is_some_and(|since| now.saturating_sub(since) >= self.threshold)
    }
}
