use crate::simulation::error::{ConfigError, ConfigResult};
use crate::simulation::id::Id;
use crate::simulation::network::{Link, Network};
use crate::simulation::vehicles::Vehicle;

/// The persons of a scenario. Persons are kept in insertion order, which is the order in which their
/// agents are created.
#[derive(Debug, Default, Clone)]
pub struct Population {
    persons: Vec<Person>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: Id<Person>,
    pub plan: Plan,
}

/// A selected plan: activities and legs alternate, starting and ending with an activity. So
/// `acts.len() == legs.len() + 1` for a valid plan.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Plan {
    pub acts: Vec<Activity>,
    pub legs: Vec<Leg>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub act_type: String,
    pub link: Id<Link>,
    pub end_time: Option<u32>,
    pub max_dur: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    pub mode: String,
    pub trav_time: Option<u32>,
    pub route: Option<Route>,
    pub vehicle: Option<Id<Vehicle>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Links the vehicle drives on. The first link is the departure link, the last the arrival link.
    Network { links: Vec<Id<Link>> },
    Generic {
        start_link: Id<Link>,
        end_link: Id<Link>,
        distance: f64,
    },
}

impl Population {
    pub fn new() -> Self {
        Population::default()
    }

    pub fn add_person(&mut self, person: Person) {
        self.persons.push(person);
    }

    pub fn persons(&self) -> &[Person] {
        &self.persons
    }

    pub fn len(&self) -> usize {
        self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }
}

impl Person {
    pub fn new(id: &str, plan: Plan) -> Self {
        Person {
            id: Id::create(id),
            plan,
        }
    }

    /// Checks the structure of the plan. Network legs must have a network route on known links.
    pub fn validate(&self, network: &Network, main_modes: &[String]) -> ConfigResult<()> {
        let invalid = |reason: &str| ConfigError::InvalidPlan {
            person: self.id.to_string(),
            reason: reason.to_string(),
        };

        if self.plan.acts.is_empty() {
            return Err(invalid("plan has no activities"));
        }
        if self.plan.acts.len() != self.plan.legs.len() + 1 {
            return Err(invalid(
                "plan must alternate activities and legs, starting and ending with an activity",
            ));
        }
        for act in &self.plan.acts {
            if network.get_link(&act.link).is_none() {
                return Err(ConfigError::UnknownLink(act.link.to_string()));
            }
        }
        for leg in &self.plan.legs {
            if !main_modes.contains(&leg.mode) {
                continue;
            }
            match &leg.route {
                Some(Route::Network { links }) if !links.is_empty() => {
                    if let Some(unknown) = links.iter().find(|l| network.get_link(l).is_none()) {
                        return Err(ConfigError::UnknownLink(unknown.to_string()));
                    }
                }
                _ => {
                    return Err(invalid(&format!(
                        "leg with network mode {} has no network route",
                        leg.mode
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Plan {
    pub fn new() -> Self {
        Plan::default()
    }

    pub fn add_act(&mut self, act: Activity) {
        self.acts.push(act);
    }

    pub fn add_leg(&mut self, leg: Leg) {
        self.legs.push(leg);
    }
}

impl Activity {
    pub fn new(act_type: &str, link: &str, end_time: Option<u32>, max_dur: Option<u32>) -> Self {
        Activity {
            act_type: act_type.to_string(),
            link: Id::create(link),
            end_time,
            max_dur,
        }
    }

    /// The time at which an activity started at `now` ends. The end time wins over the maximum
    /// duration. An activity with neither never ends.
    pub fn cmp_end_time(&self, now: u32) -> u32 {
        if let Some(end_time) = self.end_time {
            end_time
        } else if let Some(max_dur) = self.max_dur {
            now.saturating_add(max_dur)
        } else {
            u32::MAX
        }
    }
}

impl Leg {
    pub fn new(mode: &str, trav_time: Option<u32>, route: Option<Route>) -> Self {
        Leg {
            mode: mode.to_string(),
            trav_time,
            route,
            vehicle: None,
        }
    }

    pub fn with_vehicle(mut self, vehicle: &str) -> Self {
        self.vehicle = Some(Id::create(vehicle));
        self
    }
}

impl Route {
    pub fn network(links: &[&str]) -> Self {
        Route::Network {
            links: links.iter().map(|l| Id::create(l)).collect(),
        }
    }

    pub fn start_link(&self) -> Option<&Id<Link>> {
        match self {
            Route::Network { links } => links.first(),
            Route::Generic { start_link, .. } => Some(start_link),
        }
    }

    pub fn end_link(&self) -> Option<&Id<Link>> {
        match self {
            Route::Network { links } => links.last(),
            Route::Generic { end_link, .. } => Some(end_link),
        }
    }

    /// The distance of the route. For network routes, this is the length of all links after the
    /// departure link.
    pub fn distance(&self, network: &Network) -> f64 {
        match self {
            Route::Network { links } => links
                .iter()
                .skip(1)
                .filter_map(|id| network.get_link(id))
                .map(|l| l.length)
                .sum(),
            Route::Generic { distance, .. } => *distance,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::simulation::error::ConfigError;
    use crate::simulation::population::{Activity, Leg, Person, Plan, Route};
    use crate::test_utils::create_line_network;

    fn plan(leg: Leg) -> Plan {
        let mut plan = Plan::new();
        plan.add_act(Activity::new("home", "link1", Some(10), None));
        plan.add_leg(leg);
        plan.add_act(Activity::new("work", "link3", None, None));
        plan
    }

    fn main_modes() -> Vec<String> {
        vec!["car".to_string()]
    }

    #[test]
    fn activity_end_time() {
        assert_eq!(10, Activity::new("a", "l", Some(10), Some(5)).cmp_end_time(3));
        assert_eq!(8, Activity::new("a", "l", None, Some(5)).cmp_end_time(3));
        assert_eq!(u32::MAX, Activity::new("a", "l", None, None).cmp_end_time(3));
    }

    #[test]
    fn valid_network_plan() {
        let network = create_line_network(3);
        let route = Route::network(&["link1", "link2", "link3"]);
        let person = Person::new("p", plan(Leg::new("car", None, Some(route))));
        assert!(person.validate(&network, &main_modes()).is_ok());
    }

    #[test]
    fn network_leg_without_route() {
        let network = create_line_network(3);
        let person = Person::new("p", plan(Leg::new("car", None, None)));
        assert!(matches!(
            person.validate(&network, &main_modes()),
            Err(ConfigError::InvalidPlan { .. })
        ));
    }

    #[test]
    fn teleported_leg_needs_no_route() {
        let network = create_line_network(3);
        let person = Person::new("p", plan(Leg::new("walk", Some(50), None)));
        assert!(person.validate(&network, &main_modes()).is_ok());
    }

    #[test]
    fn route_on_unknown_link() {
        let network = create_line_network(3);
        let route = Route::network(&["link1", "link9"]);
        let person = Person::new("p", plan(Leg::new("car", None, Some(route))));
        assert!(matches!(
            person.validate(&network, &main_modes()),
            Err(ConfigError::UnknownLink(id)) if id == "link9"
        ));
    }

    #[test]
    fn plan_ending_with_leg() {
        let network = create_line_network(3);
        let mut plan = Plan::new();
        plan.add_act(Activity::new("home", "link1", Some(10), None));
        plan.add_leg(Leg::new("walk", Some(1), None));
        let person = Person::new("p", plan);
        assert!(matches!(
            person.validate(&network, &main_modes()),
            Err(ConfigError::InvalidPlan { .. })
        ));
    }

    #[test]
    fn network_route_distance() {
        let network = create_line_network(3);
        let route = Route::network(&["link1", "link2", "link3"]);
        // each link of the line network is 100m long
        assert_eq!(200., route.distance(&network));
    }
}
