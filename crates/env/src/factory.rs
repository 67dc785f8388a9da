//! Grid factory with battery-powered robots and charging stations.
//!
//! Every registered agent gets a body on a 13x13 grid, placed on a random
//! free cell with a full battery. A truck and a delivery spot sit at fixed
//! locations; a handful of obstacles are scattered at construction time.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use mas_core::{ActionError, AgentName, Environment, Literal, Term};

use crate::movement::{step_towards, Location, Occupancy};

pub const GRID_SIZE: i32 = 13;
pub const TRUCK: Location = Location::new(8, 10);
pub const DELIVERY: Location = Location::new(4, 2);
pub const DELIVERY_ID: i64 = 1;

const OBSTACLE_ATTEMPTS: usize = 10;
/// Obstacles keep at least this distance from the truck and the delivery spot.
const KEY_LOCATION_CLEARANCE: f64 = 1.5;
const FULL_BATTERY: i64 = 100;
const MOVE_COST: i64 = 1;

#[derive(Debug, Clone)]
struct Robot {
    position: Location,
    battery: i64,
    closest_station: Option<(String, Location)>,
}

pub struct FactoryEnvironment {
    obstacles: BTreeSet<Location>,
    stations: BTreeMap<String, Location>,
    robots: BTreeMap<AgentName, Robot>,
    rng: StdRng,
    revision: u64,
}

impl FactoryEnvironment {
    pub fn new(seed: u64) -> Self {
        let mut env = Self {
            obstacles: BTreeSet::new(),
            stations: BTreeMap::new(),
            robots: BTreeMap::new(),
            rng: StdRng::seed_from_u64(seed),
            revision: 0,
        };
        for _ in 0..OBSTACLE_ATTEMPTS {
            let at = env.random_location();
            if env.is_free(at) && !near_key_location(at) {
                env.obstacles.insert(at);
            }
        }
        info!(seed, obstacles = env.obstacles.len(), "Factory created");
        env
    }

    pub fn obstacles(&self) -> impl Iterator<Item = &Location> {
        self.obstacles.iter()
    }

    pub fn position(&self, agent: &AgentName) -> Option<Location> {
        self.robots.get(agent).map(|r| r.position)
    }

    pub fn battery(&self, agent: &AgentName) -> Option<i64> {
        self.robots.get(agent).map(|r| r.battery)
    }

    pub fn station(&self, name: &str) -> Option<Location> {
        self.stations.get(name).copied()
    }

    /// Places a charging station, replacing any station with the same name.
    pub fn add_station(&mut self, name: impl Into<String>, at: Location) -> Result<(), ActionError> {
        if !in_grid(at) || self.obstacles.contains(&at) {
            return Err(ActionError::invalid(
                "add_charging_station",
                format!("{} is not a usable cell", at),
            ));
        }
        self.stations.insert(name.into(), at);
        self.touch();
        Ok(())
    }

    fn random_location(&mut self) -> Location {
        Location::new(
            self.rng.gen_range(0..GRID_SIZE),
            self.rng.gen_range(0..GRID_SIZE),
        )
    }

    fn random_free_location(&mut self) -> Option<Location> {
        let cells = (GRID_SIZE * GRID_SIZE) as usize;
        for _ in 0..cells * 4 {
            let at = self.random_location();
            if self.is_free(at) {
                return Some(at);
            }
        }
        (0..GRID_SIZE)
            .flat_map(|y| (0..GRID_SIZE).map(move |x| Location::new(x, y)))
            .find(|&at| self.is_free(at))
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn robot_mut(&mut self, agent: &AgentName) -> Result<&mut Robot, ActionError> {
        self.robots
            .get_mut(agent)
            .ok_or_else(|| ActionError::UnknownAgent(agent.to_string()))
    }

    fn move_towards_target(&mut self, agent: &AgentName, args: &[Term]) -> Result<(), ActionError> {
        const ACTION: &str = "move_towards_target";
        let [tx, ty, ax, ay] = args else {
            return Err(arity(ACTION, 4, args.len()));
        };
        let target = Location::new(coordinate(ACTION, tx)?, coordinate(ACTION, ty)?);
        // The agent's own idea of where it is; the tracked position wins.
        coordinate(ACTION, ax)?;
        coordinate(ACTION, ay)?;

        let robot = self
            .robots
            .get(agent)
            .ok_or_else(|| ActionError::UnknownAgent(agent.to_string()))?;
        let from = robot.position;
        if from == target {
            return Ok(());
        }
        if robot.battery <= 0 {
            return Err(ActionError::failed(ACTION, "battery depleted"));
        }

        let body = Body {
            obstacles: &self.obstacles,
            robots: &self.robots,
            agent,
        };
        let next = step_towards(&body, from, target, &mut self.rng);

        let robot = self.robot_mut(agent)?;
        robot.position = next;
        robot.battery = (robot.battery - MOVE_COST).max(0);
        debug!(agent = %agent, from = %from, to = %next, target = %target, "Robot moved");
        self.touch();
        Ok(())
    }

    fn update_battery_level(&mut self, agent: &AgentName, args: &[Term]) -> Result<(), ActionError> {
        const ACTION: &str = "update_battery_level";
        let [level] = args else {
            return Err(arity(ACTION, 1, args.len()));
        };
        let level = level
            .as_integer()
            .filter(|l| (0..=FULL_BATTERY).contains(l))
            .ok_or_else(|| {
                ActionError::invalid(ACTION, format!("{} is not a level in 0..=100", level))
            })?;
        self.robot_mut(agent)?.battery = level;
        self.touch();
        Ok(())
    }

    fn compute_closest_charging_station(
        &mut self,
        agent: &AgentName,
        args: &[Term],
    ) -> Result<(), ActionError> {
        const ACTION: &str = "compute_closest_charging_station";
        let [stations, x, y] = args else {
            return Err(arity(ACTION, 3, args.len()));
        };
        let from = Location::new(coordinate(ACTION, x)?, coordinate(ACTION, y)?);
        let stations = stations
            .as_list()
            .ok_or_else(|| ActionError::invalid(ACTION, format!("{} is not a list", stations)))?;

        let mut closest: Option<(String, Location)> = None;
        for entry in stations {
            let (name, at) = station_entry(ACTION, entry)?;
            let better = closest
                .as_ref()
                .map_or(true, |(_, best)| from.distance(&at) < from.distance(best));
            if better {
                closest = Some((name, at));
            }
        }

        if let Some(found) = closest {
            self.robot_mut(agent)?.closest_station = Some(found);
            self.touch();
        }
        Ok(())
    }

    fn add_charging_station(&mut self, args: &[Term]) -> Result<(), ActionError> {
        const ACTION: &str = "add_charging_station";
        let [name, x, y] = args else {
            return Err(arity(ACTION, 3, args.len()));
        };
        let name = text(ACTION, name)?;
        let at = Location::new(coordinate(ACTION, x)?, coordinate(ACTION, y)?);
        self.add_station(name, at)
    }

    fn remove_charging_station(&mut self, args: &[Term]) -> Result<(), ActionError> {
        const ACTION: &str = "remove_charging_station";
        let [name] = args else {
            return Err(arity(ACTION, 1, args.len()));
        };
        let name = text(ACTION, name)?;
        if self.stations.remove(&name).is_none() {
            return Err(ActionError::failed(ACTION, format!("no station named {}", name)));
        }
        self.touch();
        Ok(())
    }
}

/// The grid as seen by one moving robot: its own cell does not block it.
struct Body<'a> {
    obstacles: &'a BTreeSet<Location>,
    robots: &'a BTreeMap<AgentName, Robot>,
    agent: &'a AgentName,
}

impl Occupancy for Body<'_> {
    fn width(&self) -> i32 {
        GRID_SIZE
    }

    fn height(&self) -> i32 {
        GRID_SIZE
    }

    fn is_free(&self, at: Location) -> bool {
        in_grid(at)
            && !self.obstacles.contains(&at)
            && !self
                .robots
                .iter()
                .any(|(name, r)| name != self.agent && r.position == at)
    }
}

impl Occupancy for FactoryEnvironment {
    fn width(&self) -> i32 {
        GRID_SIZE
    }

    fn height(&self) -> i32 {
        GRID_SIZE
    }

    fn is_free(&self, at: Location) -> bool {
        in_grid(at)
            && !self.obstacles.contains(&at)
            && !self.robots.values().any(|r| r.position == at)
    }
}

fn in_grid(at: Location) -> bool {
    (0..GRID_SIZE).contains(&at.x) && (0..GRID_SIZE).contains(&at.y)
}

fn near_key_location(at: Location) -> bool {
    at.distance(&TRUCK) <= KEY_LOCATION_CLEARANCE || at.distance(&DELIVERY) <= KEY_LOCATION_CLEARANCE
}

fn arity(action: &str, expected: usize, got: usize) -> ActionError {
    ActionError::invalid(action, format!("expected {} arguments, got {}", expected, got))
}

fn coordinate(action: &str, term: &Term) -> Result<i32, ActionError> {
    term.as_integer()
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| ActionError::invalid(action, format!("{} is not a coordinate", term)))
}

fn text(action: &str, term: &Term) -> Result<String, ActionError> {
    term.as_text()
        .map(str::to_string)
        .ok_or_else(|| ActionError::invalid(action, format!("{} is not a name", term)))
}

/// One `[Name, X, Y]` entry of a station list.
fn station_entry(action: &str, entry: &Term) -> Result<(String, Location), ActionError> {
    match entry.as_list() {
        Some([name, x, y]) => Ok((
            text(action, name)?,
            Location::new(coordinate(action, x)?, coordinate(action, y)?),
        )),
        _ => Err(ActionError::invalid(
            action,
            format!("{} is not a [Name, X, Y] entry", entry),
        )),
    }
}

fn percept(functor: &str, args: Vec<Term>) -> Literal {
    Literal::new(functor).with_args(args)
}

fn point(at: Location) -> [Term; 2] {
    [Term::number(at.x), Term::number(at.y)]
}

#[async_trait]
impl Environment for FactoryEnvironment {
    async fn perceive(&self, agent: &AgentName) -> Vec<Literal> {
        let [tx, ty] = point(TRUCK);
        let [dx, dy] = point(DELIVERY);
        let mut out = vec![
            percept("truck_position", vec![tx, ty]),
            percept(
                "delivery_position",
                vec![Term::number(DELIVERY_ID as f64), dx, dy],
            ),
        ];
        for (name, at) in &self.stations {
            let [x, y] = point(*at);
            out.push(percept("charging_station", vec![Term::string(name), x, y]));
        }
        if let Some(robot) = self.robots.get(agent) {
            let [x, y] = point(robot.position);
            out.push(percept("current_position", vec![x, y]));
            out.push(percept(
                "batteryLevel",
                vec![Term::number(robot.battery as f64)],
            ));
            if let Some((name, at)) = &robot.closest_station {
                let [x, y] = point(*at);
                out.push(percept(
                    "closestChargingStation",
                    vec![Term::string(name), x, y],
                ));
            }
        }
        out
    }

    async fn act(&mut self, agent: &AgentName, action: &Literal) -> Result<(), ActionError> {
        match action.functor.as_str() {
            "move_towards_target" => self.move_towards_target(agent, &action.args),
            "update_battery_level" => self.update_battery_level(agent, &action.args),
            "compute_closest_charging_station" => {
                self.compute_closest_charging_station(agent, &action.args)
            }
            "add_charging_station" => self.add_charging_station(&action.args),
            "remove_charging_station" => self.remove_charging_station(&action.args),
            _ => Err(ActionError::UnknownAction(action.to_string())),
        }
    }

    fn register_agent(&mut self, agent: &AgentName) {
        if self.robots.contains_key(agent) {
            return;
        }
        let Some(position) = self.random_free_location() else {
            warn!(agent = %agent, "No free cell left for robot");
            return;
        };
        debug!(agent = %agent, position = %position, "Robot placed");
        self.robots.insert(
            agent.clone(),
            Robot {
                position,
                battery: FULL_BATTERY,
                closest_station: None,
            },
        );
        self.touch();
    }

    fn remove_agent(&mut self, agent: &AgentName) {
        if self.robots.remove(agent).is_some() {
            self.touch();
        }
    }

    fn revision(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: i32) -> Term {
        Term::number(n)
    }

    fn act(functor: &str, args: Vec<Term>) -> Literal {
        Literal::new(functor).with_args(args)
    }

    fn robot_env(seed: u64) -> (FactoryEnvironment, AgentName) {
        let mut env = FactoryEnvironment::new(seed);
        let agent = AgentName::from("robot");
        env.register_agent(&agent);
        (env, agent)
    }

    #[test]
    fn test_obstacles_avoid_key_locations() {
        for seed in 0..20 {
            let env = FactoryEnvironment::new(seed);
            assert!(env.obstacles().count() <= OBSTACLE_ATTEMPTS);
            for at in env.obstacles() {
                assert!(!near_key_location(*at), "seed {} put obstacle at {}", seed, at);
            }
        }
    }

    #[test]
    fn test_same_seed_same_layout() {
        let (a, robot) = robot_env(9);
        let (b, _) = robot_env(9);
        assert_eq!(
            a.obstacles().collect::<Vec<_>>(),
            b.obstacles().collect::<Vec<_>>()
        );
        assert_eq!(a.position(&robot), b.position(&robot));
    }

    #[test]
    fn test_registration_places_robots_on_free_cells() {
        let mut env = FactoryEnvironment::new(4);
        let names: Vec<AgentName> = (0..5).map(|i| AgentName::new(format!("r{}", i))).collect();
        for name in &names {
            env.register_agent(name);
        }
        let cells: BTreeSet<Location> = names.iter().filter_map(|n| env.position(n)).collect();
        assert_eq!(cells.len(), names.len());
        for at in &cells {
            assert!(!env.obstacles.contains(at));
        }
        assert_eq!(env.battery(&names[0]), Some(FULL_BATTERY));
    }

    #[tokio::test]
    async fn test_moves_drain_battery_and_stay_on_grid() {
        let (mut env, robot) = robot_env(1);
        let start = env.position(&robot).unwrap();
        let target = Location::new((start.x + 6) % GRID_SIZE, (start.y + 6) % GRID_SIZE);
        for _ in 0..30 {
            env.act(
                &robot,
                &act(
                    "move_towards_target",
                    vec![num(target.x), num(target.y), num(start.x), num(start.y)],
                ),
            )
            .await
            .unwrap();
            let at = env.position(&robot).unwrap();
            assert!(in_grid(at));
            assert!(!env.obstacles.contains(&at));
            if at == target {
                break;
            }
        }
        assert!(env.battery(&robot).unwrap() < FULL_BATTERY);
    }

    #[tokio::test]
    async fn test_move_with_empty_battery_fails() {
        let (mut env, robot) = robot_env(2);
        env.act(&robot, &act("update_battery_level", vec![num(0)]))
            .await
            .unwrap();
        let here = env.position(&robot).unwrap();
        let there = Location::new((here.x + 3) % GRID_SIZE, here.y);
        let err = env
            .act(
                &robot,
                &act(
                    "move_towards_target",
                    vec![num(there.x), num(there.y), num(here.x), num(here.y)],
                ),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Failed { .. }));
    }

    #[tokio::test]
    async fn test_battery_level_bounds() {
        let (mut env, robot) = robot_env(3);
        env.act(&robot, &act("update_battery_level", vec![num(40)]))
            .await
            .unwrap();
        assert_eq!(env.battery(&robot), Some(40));

        for bad in [num(101), num(-1), Term::atom("full")] {
            let err = env
                .act(&robot, &act("update_battery_level", vec![bad]))
                .await
                .unwrap_err();
            assert!(matches!(err, ActionError::InvalidArguments { .. }));
        }
    }

    #[tokio::test]
    async fn test_closest_charging_station_percept() {
        let (mut env, robot) = robot_env(5);
        let entry = |name: &str, x: i32, y: i32| {
            Term::List(vec![Term::string(name), num(x), num(y)])
        };
        let stations = Term::List(vec![entry("far", 12, 12), entry("near", 1, 1)]);
        env.act(
            &robot,
            &act("compute_closest_charging_station", vec![stations, num(0), num(0)]),
        )
        .await
        .unwrap();

        let expected = act(
            "closestChargingStation",
            vec![Term::string("near"), num(1), num(1)],
        );
        assert!(env.perceive(&robot).await.contains(&expected));
    }

    #[tokio::test]
    async fn test_station_management() {
        let (mut env, robot) = robot_env(6);
        let free = (0..GRID_SIZE)
            .map(|x| Location::new(x, 0))
            .find(|at| !env.obstacles.contains(at))
            .unwrap();
        env.act(
            &robot,
            &act(
                "add_charging_station",
                vec![Term::atom("cs1"), num(free.x), num(free.y)],
            ),
        )
        .await
        .unwrap();
        assert_eq!(env.station("cs1"), Some(free));

        let seen = act(
            "charging_station",
            vec![Term::string("cs1"), num(free.x), num(free.y)],
        );
        assert!(env.perceive(&robot).await.contains(&seen));

        env.act(&robot, &act("remove_charging_station", vec![Term::atom("cs1")]))
            .await
            .unwrap();
        assert!(env.station("cs1").is_none());
        let err = env
            .act(&robot, &act("remove_charging_station", vec![Term::atom("cs1")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Failed { .. }));
    }

    #[tokio::test]
    async fn test_fixed_percepts_for_everyone() {
        let env = FactoryEnvironment::new(0);
        let outsider = AgentName::from("visitor");
        let seen = env.perceive(&outsider).await;
        assert!(seen.contains(&act("truck_position", vec![num(8), num(10)])));
        assert!(seen.contains(&act("delivery_position", vec![num(1), num(4), num(2)])));
    }

    #[tokio::test]
    async fn test_unregistered_agent_cannot_move() {
        let mut env = FactoryEnvironment::new(0);
        let err = env
            .act(
                &AgentName::from("ghost"),
                &act("move_towards_target", vec![num(1), num(1), num(0), num(0)]),
            )
            .await
            .unwrap_err();
        assert_eq!(err, ActionError::UnknownAgent("ghost".to_string()));
    }
}
