pub mod xml_writer;

use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

use ahash::HashMap;

use crate::simulation::id::Id;
use crate::simulation::network::Link;
use crate::simulation::population::Person;
use crate::simulation::pt::TransitStopFacility;
use crate::simulation::vehicles::Vehicle;

/// All events the simulation emits. The set is closed: subscribers can match exhaustively.
///
/// Events are immutable once published. Their textual form (e.g. for the xml events file) is a
/// projection computed by [Event::attributes].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ActivityStart {
        time: u32,
        person: Id<Person>,
        link: Id<Link>,
        act_type: String,
    },
    ActivityEnd {
        time: u32,
        person: Id<Person>,
        link: Id<Link>,
        act_type: String,
    },
    PersonDeparture {
        time: u32,
        person: Id<Person>,
        link: Id<Link>,
        leg_mode: String,
    },
    PersonArrival {
        time: u32,
        person: Id<Person>,
        link: Id<Link>,
        leg_mode: String,
    },
    /// The agent was removed from the simulation before finishing its plan.
    PersonStuck {
        time: u32,
        person: Id<Person>,
        link: Option<Id<Link>>,
        leg_mode: Option<String>,
    },
    LinkEnter {
        time: u32,
        link: Id<Link>,
        vehicle: Id<Vehicle>,
        driver: Id<Person>,
    },
    LinkLeave {
        time: u32,
        link: Id<Link>,
        vehicle: Id<Vehicle>,
        driver: Id<Person>,
    },
    VehicleEntersTraffic {
        time: u32,
        person: Id<Person>,
        link: Id<Link>,
        vehicle: Id<Vehicle>,
        network_mode: String,
    },
    VehicleLeavesTraffic {
        time: u32,
        person: Id<Person>,
        link: Id<Link>,
        vehicle: Id<Vehicle>,
        network_mode: String,
    },
    PersonEntersVehicle {
        time: u32,
        person: Id<Person>,
        vehicle: Id<Vehicle>,
    },
    PersonLeavesVehicle {
        time: u32,
        person: Id<Person>,
        vehicle: Id<Vehicle>,
    },
    TransitDriverStarts {
        time: u32,
        driver: Id<Person>,
        vehicle: Id<Vehicle>,
        line: String,
        route: String,
    },
    VehicleArrivesAtFacility {
        time: u32,
        vehicle: Id<Vehicle>,
        facility: Id<TransitStopFacility>,
    },
    VehicleDepartsAtFacility {
        time: u32,
        vehicle: Id<Vehicle>,
        facility: Id<TransitStopFacility>,
    },
    BoardingDenied {
        time: u32,
        person: Id<Person>,
        vehicle: Id<Vehicle>,
    },
    /// Emitted at the end of a teleported leg.
    Travelled {
        time: u32,
        person: Id<Person>,
        distance: f64,
        mode: String,
    },
}

/// Discriminant of [Event], used to register callbacks for one kind of event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    ActivityStart,
    ActivityEnd,
    PersonDeparture,
    PersonArrival,
    PersonStuck,
    LinkEnter,
    LinkLeave,
    VehicleEntersTraffic,
    VehicleLeavesTraffic,
    PersonEntersVehicle,
    PersonLeavesVehicle,
    TransitDriverStarts,
    VehicleArrivesAtFacility,
    VehicleDepartsAtFacility,
    BoardingDenied,
    Travelled,
}

impl Event {
    pub fn time(&self) -> u32 {
        match self {
            Event::ActivityStart { time, .. }
            | Event::ActivityEnd { time, .. }
            | Event::PersonDeparture { time, .. }
            | Event::PersonArrival { time, .. }
            | Event::PersonStuck { time, .. }
            | Event::LinkEnter { time, .. }
            | Event::LinkLeave { time, .. }
            | Event::VehicleEntersTraffic { time, .. }
            | Event::VehicleLeavesTraffic { time, .. }
            | Event::PersonEntersVehicle { time, .. }
            | Event::PersonLeavesVehicle { time, .. }
            | Event::TransitDriverStarts { time, .. }
            | Event::VehicleArrivesAtFacility { time, .. }
            | Event::VehicleDepartsAtFacility { time, .. }
            | Event::BoardingDenied { time, .. }
            | Event::Travelled { time, .. } => *time,
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            Event::ActivityStart { .. } => EventType::ActivityStart,
            Event::ActivityEnd { .. } => EventType::ActivityEnd,
            Event::PersonDeparture { .. } => EventType::PersonDeparture,
            Event::PersonArrival { .. } => EventType::PersonArrival,
            Event::PersonStuck { .. } => EventType::PersonStuck,
            Event::LinkEnter { .. } => EventType::LinkEnter,
            Event::LinkLeave { .. } => EventType::LinkLeave,
            Event::VehicleEntersTraffic { .. } => EventType::VehicleEntersTraffic,
            Event::VehicleLeavesTraffic { .. } => EventType::VehicleLeavesTraffic,
            Event::PersonEntersVehicle { .. } => EventType::PersonEntersVehicle,
            Event::PersonLeavesVehicle { .. } => EventType::PersonLeavesVehicle,
            Event::TransitDriverStarts { .. } => EventType::TransitDriverStarts,
            Event::VehicleArrivesAtFacility { .. } => EventType::VehicleArrivesAtFacility,
            Event::VehicleDepartsAtFacility { .. } => EventType::VehicleDepartsAtFacility,
            Event::BoardingDenied { .. } => EventType::BoardingDenied,
            Event::Travelled { .. } => EventType::Travelled,
        }
    }

    /// The type string used in events files.
    pub fn type_(&self) -> &'static str {
        match self.event_type() {
            EventType::ActivityStart => "actstart",
            EventType::ActivityEnd => "actend",
            EventType::PersonDeparture => "departure",
            EventType::PersonArrival => "arrival",
            EventType::PersonStuck => "stuckAndAbort",
            EventType::LinkEnter => "entered link",
            EventType::LinkLeave => "left link",
            EventType::VehicleEntersTraffic => "vehicle enters traffic",
            EventType::VehicleLeavesTraffic => "vehicle leaves traffic",
            EventType::PersonEntersVehicle => "PersonEntersVehicle",
            EventType::PersonLeavesVehicle => "PersonLeavesVehicle",
            EventType::TransitDriverStarts => "TransitDriverStarts",
            EventType::VehicleArrivesAtFacility => "VehicleArrivesAtFacility",
            EventType::VehicleDepartsAtFacility => "VehicleDepartsAtFacility",
            EventType::BoardingDenied => "BoardingDeniedEvent",
            EventType::Travelled => "travelled",
        }
    }

    /// Projects the event onto its attribute map, in the order in which the attributes are written.
    /// `time` and `type` always come first.
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        let mut attr = vec![
            ("time", self.time().to_string()),
            ("type", self.type_().to_string()),
        ];
        match self {
            Event::ActivityStart {
                person,
                link,
                act_type,
                ..
            }
            | Event::ActivityEnd {
                person,
                link,
                act_type,
                ..
            } => {
                attr.push(("person", person.to_string()));
                attr.push(("link", link.to_string()));
                attr.push(("actType", act_type.clone()));
            }
            Event::PersonDeparture {
                person,
                link,
                leg_mode,
                ..
            }
            | Event::PersonArrival {
                person,
                link,
                leg_mode,
                ..
            } => {
                attr.push(("person", person.to_string()));
                attr.push(("link", link.to_string()));
                attr.push(("legMode", leg_mode.clone()));
            }
            Event::PersonStuck {
                person,
                link,
                leg_mode,
                ..
            } => {
                if let Some(link) = link {
                    attr.push(("link", link.to_string()));
                }
                if let Some(mode) = leg_mode {
                    attr.push(("legMode", mode.clone()));
                }
                attr.push(("person", person.to_string()));
            }
            Event::LinkEnter {
                link,
                vehicle,
                driver,
                ..
            }
            | Event::LinkLeave {
                link,
                vehicle,
                driver,
                ..
            } => {
                attr.push(("person", driver.to_string()));
                attr.push(("link", link.to_string()));
                attr.push(("vehicle", vehicle.to_string()));
            }
            Event::VehicleEntersTraffic {
                person,
                link,
                vehicle,
                network_mode,
                ..
            }
            | Event::VehicleLeavesTraffic {
                person,
                link,
                vehicle,
                network_mode,
                ..
            } => {
                attr.push(("person", person.to_string()));
                attr.push(("link", link.to_string()));
                attr.push(("vehicle", vehicle.to_string()));
                attr.push(("networkMode", network_mode.clone()));
            }
            Event::PersonEntersVehicle {
                person, vehicle, ..
            }
            | Event::PersonLeavesVehicle {
                person, vehicle, ..
            }
            | Event::BoardingDenied {
                person, vehicle, ..
            } => {
                attr.push(("person", person.to_string()));
                attr.push(("vehicle", vehicle.to_string()));
            }
            Event::TransitDriverStarts {
                driver,
                vehicle,
                line,
                route,
                ..
            } => {
                attr.push(("driverId", driver.to_string()));
                attr.push(("vehicleId", vehicle.to_string()));
                attr.push(("transitLineId", line.clone()));
                attr.push(("transitRouteId", route.clone()));
            }
            Event::VehicleArrivesAtFacility {
                vehicle, facility, ..
            }
            | Event::VehicleDepartsAtFacility {
                vehicle, facility, ..
            } => {
                attr.push(("vehicle", vehicle.to_string()));
                attr.push(("facility", facility.to_string()));
            }
            Event::Travelled {
                person,
                distance,
                mode,
                ..
            } => {
                attr.push(("person", person.to_string()));
                attr.push(("distance", distance.to_string()));
                attr.push(("mode", mode.clone()));
            }
        }
        attr
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "<event ")?;
        for (key, value) in self.attributes() {
            write!(f, "{key}=\"{value}\" ")?;
        }
        write!(f, "/>")
    }
}

type OnEventFn = dyn Fn(&Event) + 'static;
type OnEventFallibleFn = dyn Fn(&Event) -> Result<(), String> + 'static;

/// The EventsManager holds call-backs for event processing. Events are delivered synchronously, in the
/// order in which they are published.
///
/// The manager lives on the thread which drives the simulation, which is why callbacks don't need to
/// be `Send`. Subscribers which need to keep state share it with the callback via `Rc<RefCell<_>>`
/// or use types which are `Sync` anyway.
#[derive(Default)]
pub struct EventsManager {
    per_type: HashMap<EventType, Vec<Rc<OnEventFn>>>,
    catch_all: Vec<Box<OnEventFn>>,
    fallible: Vec<Box<OnEventFallibleFn>>,
    finish: Vec<Box<dyn Fn() + 'static>>,
    failure: Option<String>,
}

impl Debug for EventsManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EventsManager {{ per_type: {:?}, catch_all: {:?}, fallible: {:?}, finish: {:?} }}",
            self.per_type.len(),
            self.catch_all.len(),
            self.fallible.len(),
            self.finish.len()
        )
    }
}

impl EventsManager {
    pub fn new() -> Self {
        EventsManager::default()
    }

    pub fn publish_event(&mut self, event: Event) {
        if let Some(list) = self.per_type.get(&event.event_type()) {
            for h in list {
                h(&event);
            }
        }
        for h in &self.catch_all {
            h(&event);
        }
        for h in &self.fallible {
            if let Err(e) = h(&event) {
                // keep the first failure, it is the one which caused the others
                self.failure.get_or_insert(e);
            }
        }
    }

    pub fn finish(&mut self) {
        for f in self.finish.iter() {
            f()
        }
    }

    /// Whether any callback was registered. A simulation without any subscriber would produce no
    /// output at all.
    pub fn has_subscribers(&self) -> bool {
        !self.per_type.is_empty() || !self.catch_all.is_empty() || !self.fallible.is_empty()
    }

    /// Returns and clears the first error a fallible subscriber reported.
    pub fn take_failure(&mut self) -> Option<String> {
        self.failure.take()
    }

    /// Registers a callback for one type of events.
    pub fn on<F>(&mut self, event_type: EventType, f: F)
    where
        F: Fn(&Event) + 'static,
    {
        self.per_type.entry(event_type).or_default().push(Rc::new(f));
    }

    /// Registers a callback for all events.
    pub fn on_any<F>(&mut self, f: F)
    where
        F: Fn(&Event) + 'static,
    {
        self.catch_all.push(Box::new(f));
    }

    /// Registers a callback for all events which may fail. The first failure is kept and can be
    /// queried with [EventsManager::take_failure].
    pub fn on_any_fallible<F, E>(&mut self, f: F)
    where
        F: Fn(&Event) -> Result<(), E> + 'static,
        E: Display,
    {
        self.fallible
            .push(Box::new(move |e| f(e).map_err(|err| err.to_string())));
    }

    pub fn on_finish<F>(&mut self, f: F)
    where
        F: Fn() + 'static,
    {
        self.finish.push(Box::new(f));
    }
}
