use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::simulation::id::Id;

pub trait Identifiable<I> {
    fn id(&self) -> &Id<I>;
}

struct Entry<T, I> {
    time: u32,
    id: Id<I>,
    order: usize,
    value: T,
}

impl<T, I> PartialEq<Self> for Entry<T, I> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T, I> Eq for Entry<T, I> {}

impl<T, I> PartialOrd<Self> for Entry<T, I> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, I> Ord for Entry<T, I> {
    // BinaryHeap is a max heap. The entry which must be popped first compares greatest: the earliest
    // time, then the larger id, then the one inserted first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| self.id.cmp(&other.id))
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// Priority queue of values which become due at a point in simulation time. Values due at the same
/// time are released in descending id order.
pub struct TimeQueue<T, I> {
    q: BinaryHeap<Entry<T, I>>,
    counter: usize,
}

impl<T, I> Default for TimeQueue<T, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, I> TimeQueue<T, I> {
    pub fn new() -> Self {
        TimeQueue {
            q: BinaryHeap::new(),
            counter: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.q.len()
    }

    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }

    /// The earliest time at which a value becomes due.
    pub fn next_time(&self) -> Option<u32> {
        self.q.peek().map(|e| e.time)
    }
}

impl<T, I> TimeQueue<T, I>
where
    T: Identifiable<I>,
{
    pub fn add(&mut self, value: T, time: u32) {
        let order = self.counter;
        self.counter += 1;
        self.q.push(Entry {
            time,
            id: value.id().clone(),
            order,
            value,
        });
    }

    /// Removes all values due at or before `now`, in queue order.
    pub fn pop(&mut self, now: u32) -> Vec<T> {
        let mut result = Vec::new();
        while self.q.peek().is_some_and(|e| e.time <= now) {
            if let Some(entry) = self.q.pop() {
                result.push(entry.value);
            }
        }
        result
    }

    /// Removes all values regardless of their time, in queue order.
    pub fn drain(&mut self) -> Vec<T> {
        let mut result = Vec::with_capacity(self.q.len());
        while let Some(entry) = self.q.pop() {
            result.push(entry.value);
        }
        result
    }
}
