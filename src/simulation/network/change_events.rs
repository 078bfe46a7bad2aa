use crate::simulation::error::{ConfigError, ConfigResult};
use crate::simulation::id::Id;
use crate::simulation::network::{Link, Network};

/// A new value for a link attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChangeValue {
    Absolute(f32),
    Factor(f32),
}

impl ChangeValue {
    pub fn apply(&self, current: f32) -> f32 {
        match self {
            ChangeValue::Absolute(value) => *value,
            ChangeValue::Factor(factor) => current * factor,
        }
    }
}

/// Changes the attributes of some links at a point in time, e.g. to model an accident or a
/// lane closure. Flow capacity is given in vehicles per hour.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkChangeEvent {
    pub time: u32,
    pub links: Vec<Id<Link>>,
    pub freespeed: Option<ChangeValue>,
    pub flow_capacity: Option<ChangeValue>,
    pub lanes: Option<ChangeValue>,
}

impl NetworkChangeEvent {
    pub fn new(time: u32, links: &[&str]) -> Self {
        NetworkChangeEvent {
            time,
            links: links.iter().map(|l| Id::create(l)).collect(),
            freespeed: None,
            flow_capacity: None,
            lanes: None,
        }
    }

    pub fn with_freespeed(mut self, value: ChangeValue) -> Self {
        self.freespeed = Some(value);
        self
    }

    pub fn with_flow_capacity(mut self, value: ChangeValue) -> Self {
        self.flow_capacity = Some(value);
        self
    }

    pub fn with_lanes(mut self, value: ChangeValue) -> Self {
        self.lanes = Some(value);
        self
    }
}

/// Change events in the order they are applied. Events with the same time keep their insertion order.
#[derive(Debug, Default)]
pub struct ChangeEventQueue {
    events: Vec<NetworkChangeEvent>,
    next: usize,
}

impl ChangeEventQueue {
    pub fn new(mut events: Vec<NetworkChangeEvent>, network: &Network) -> ConfigResult<Self> {
        for event in &events {
            if let Some(unknown) = event.links.iter().find(|l| network.get_link(l).is_none()) {
                return Err(ConfigError::UnknownLink(unknown.to_string()));
            }
        }
        events.sort_by_key(|e| e.time);
        Ok(ChangeEventQueue { events, next: 0 })
    }

    /// Returns the events due at or before `now` which were not returned yet.
    pub fn pop(&mut self, now: u32) -> &[NetworkChangeEvent] {
        let start = self.next;
        while self.events.get(self.next).is_some_and(|e| e.time <= now) {
            self.next += 1;
        }
        &self.events[start..self.next]
    }

    pub fn is_empty(&self) -> bool {
        self.next >= self.events.len()
    }
}
