use std::io::BufRead;
use std::sync::LazyLock;

use colored::Colorize;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::cli::{self, ConfigType, EnergyModel};
use crate::errors::Error;
use crate::problem::ProblemInstance;
use crate::reader::LineReader;
use crate::routes::RouteSet;

/// Cost value closing the improvement history on the solver output stream.
pub const HISTORY_SENTINEL: f64 = -1.0;

/// Timing value kept when the solver did not report it.
pub const UNAVAILABLE_TIME: f64 = -1.0;

static TIMING_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(real|user|sys)\s+(\d+(?:\.\d*)?)$").unwrap());

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SolutionRecord {
    pub cost: f64,
    pub capacity_violation: f64,
    pub drone_energy_violation: f64,
    pub waiting_time_violation: f64,
    pub fixed_time_violation: f64,
    #[serde(default)]
    pub fixed_distance_violation: f64,

    #[serde(flatten)]
    pub routes: RouteSet,

    pub feasible: bool,
}

impl SolutionRecord {
    pub fn new(
        cost: f64,
        capacity_violation: f64,
        drone_energy_violation: f64,
        waiting_time_violation: f64,
        fixed_time_violation: f64,
        fixed_distance_violation: f64,
        routes: RouteSet,
    ) -> Self {
        Self {
            cost,
            capacity_violation,
            drone_energy_violation,
            waiting_time_violation,
            fixed_time_violation,
            fixed_distance_violation,
            routes,
            feasible: capacity_violation == 0.0
                && drone_energy_violation == 0.0
                && waiting_time_violation == 0.0
                && fixed_time_violation == 0.0
                && fixed_distance_violation == 0.0,
        }
    }

    /// Read the scalar metrics followed by one route line per vehicle.
    pub fn read<R: BufRead>(reader: &mut LineReader<R>, problem: &ProblemInstance) -> Result<Self, Error> {
        let cost = reader.parse_finite("cost")?;
        if cost < 0.0 {
            return Err(Error::format(format!("Negative cost {cost}")));
        }

        let capacity_violation = reader.parse_finite("capacity violation")?;
        let drone_energy_violation = reader.parse_finite("drone energy violation")?;
        let waiting_time_violation = reader.parse_finite("waiting time violation")?;
        let fixed_time_violation = reader.parse_finite("fixed time violation")?;
        let fixed_distance_violation = reader.parse_finite("fixed distance violation")?;

        for (violation, name) in [
            (capacity_violation, "capacity"),
            (drone_energy_violation, "drone energy"),
            (waiting_time_violation, "waiting time"),
            (fixed_time_violation, "fixed time"),
            (fixed_distance_violation, "fixed distance"),
        ] {
            if violation < 0.0 {
                return Err(Error::format(format!("Negative {name} violation {violation}")));
            }
        }

        let routes = RouteSet::read(reader, problem.counts())?;
        Ok(Self::new(
            cost,
            capacity_violation,
            drone_energy_violation,
            waiting_time_violation,
            fixed_time_violation,
            fixed_distance_violation,
            routes,
        ))
    }
}

/// One improvement of the best cost during the search.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct HistoryEntry {
    pub iteration: usize,
    pub cost: f64,

    #[serde(flatten)]
    pub routes: RouteSet,
}

/// Read the `(cost, routes)` chain up to the sentinel. The solver emits the most recent entry first.
pub fn read_history<R: BufRead>(
    reader: &mut LineReader<R>,
    problem: &ProblemInstance,
) -> Result<Vec<HistoryEntry>, Error> {
    let mut chain = vec![];
    loop {
        let cost = reader.parse_finite("history cost")?;
        if cost == HISTORY_SENTINEL {
            break;
        }

        if cost < 0.0 {
            return Err(Error::format(format!("Negative history cost {cost}")));
        }

        chain.push((cost, RouteSet::read(reader, problem.counts())?));
    }

    chain.reverse();
    Ok(chain
        .into_iter()
        .enumerate()
        .map(|(iteration, (cost, routes))| HistoryEntry { iteration, cost, routes })
        .collect())
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Timing {
    pub real: f64,
    pub user: f64,
    pub sys: f64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            real: UNAVAILABLE_TIME,
            user: UNAVAILABLE_TIME,
            sys: UNAVAILABLE_TIME,
        }
    }
}

impl Timing {
    /// Read exactly three `"<real|user|sys> <seconds>"` lines, in any order.
    pub fn read<R: BufRead>(reader: &mut LineReader<R>) -> Result<Self, Error> {
        let mut timing = Self::default();
        for _ in 0..3 {
            let line = reader.next_line("timing")?;
            let Some(captures) = TIMING_REGEX.captures(&line) else {
                return Err(Error::format(format!("Unrecognized pattern: {line:?}")));
            };

            let (_, [tag, value]) = captures.extract::<2>();
            let value = value
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| Error::format(format!("Invalid timing value {value:?}")))?;
            match tag {
                "real" => timing.real = value,
                "user" => timing.user = value,
                _ => timing.sys = value,
            }
        }

        Ok(timing)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ResultRecord {
    pub problem: String,
    #[serde(default)]
    pub customers_count: usize,
    pub trucks_count: usize,
    pub drones_count: usize,

    pub iterations: usize,
    pub tabu_size: usize,
    pub config: EnergyModel,
    pub speed_type: ConfigType,
    pub range_type: ConfigType,

    pub solution: SolutionRecord,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    pub last_improved: usize,

    pub real: f64,
    pub user: f64,
    pub sys: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialization_label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elite_set: Option<Vec<SolutionRecord>>,
}

impl ResultRecord {
    /// Assemble a record from the complete solver output stream of one run.
    pub fn read<R: BufRead>(reader: &mut LineReader<R>, problem: &ProblemInstance) -> Result<Self, Error> {
        let iterations = reader.parse::<usize>("iterations")?;
        let tabu_size = reader.parse::<usize>("tabu size")?;
        let config = cli::parse_value::<EnergyModel>(&reader.next_line("energy model")?, "energy model")?;
        let speed_type = cli::parse_value::<ConfigType>(&reader.next_line("speed type")?, "speed type")?;
        let range_type = cli::parse_value::<ConfigType>(&reader.next_line("range type")?, "range type")?;

        let solution = SolutionRecord::read(reader, problem)?;
        let history = read_history(reader, problem)?;

        let reported_feasible = reader.parse::<u8>("feasible flag")? != 0;
        if reported_feasible != solution.feasible {
            eprintln!(
                "{}",
                format!(
                    "Solver reported feasible = {reported_feasible}, but violations imply feasible = {}",
                    solution.feasible
                )
                .yellow()
            );
        }

        let last_improved = reader.parse::<usize>("last improved iteration")?;
        let timing = Timing::read(reader)?;

        Ok(Self {
            problem: problem.problem.clone(),
            customers_count: problem.customers_count,
            trucks_count: problem.trucks_count,
            drones_count: problem.drones_count,
            iterations,
            tabu_size,
            config,
            speed_type,
            range_type,
            solution,
            history,
            last_improved,
            real: timing.real,
            user: timing.user,
            sys: timing.sys,
            initialization_label: None,
            elite_set: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _problem() -> ProblemInstance {
        ProblemInstance {
            problem: String::from("SMALL"),
            customers_count: 3,
            trucks_count: 1,
            drones_count: 1,
            x: vec![0.0, 1.0, 2.0, 3.0],
            y: vec![0.0, 1.0, 2.0, 3.0],
            demands: vec![0.0, 1.0, 1.0, 1.0],
            dronable: vec![true; 4],
            truck_service_time: vec![0.0; 4],
            drone_service_time: vec![0.0; 4],
            truck_capacity: 10.0,
        }
    }

    const OUTPUT: &str = "1200
10
endurance
low
high
42.5
0
0
0
0
0
0 1 2 0
0 3 0
50.0
0 1 0
0 2 3 0
45.0
0 1 2 0 0 3 0

-1
1
87
user 10.25
real 12.5
sys 0.03
";

    #[test]
    fn can_assemble_result() {
        let problem = _problem();
        let record = ResultRecord::read(&mut LineReader::new(OUTPUT.as_bytes()), &problem).unwrap();

        assert_eq!(record.problem, "SMALL");
        assert_eq!(record.iterations, 1200);
        assert_eq!(record.config, EnergyModel::Endurance);
        assert_eq!(record.range_type, ConfigType::High);
        assert_eq!(record.solution.cost, 42.5);
        assert!(record.solution.feasible);
        assert_eq!(record.solution.routes.truck_paths, vec![vec![vec![0, 1, 2, 0]]]);
        assert_eq!(record.solution.routes.drone_paths, vec![vec![vec![0, 3, 0]]]);
        assert_eq!(record.last_improved, 87);
        assert_eq!((record.real, record.user, record.sys), (12.5, 10.25, 0.03));
    }

    #[test]
    fn can_order_history_chronologically() {
        let problem = _problem();
        let record = ResultRecord::read(&mut LineReader::new(OUTPUT.as_bytes()), &problem).unwrap();

        let costs = record.history.iter().map(|h| h.cost).collect::<Vec<_>>();
        assert_eq!(costs, vec![45.0, 50.0]);
        assert_eq!(record.history[0].iteration, 0);
        assert_eq!(record.history[0].routes.truck_paths, vec![vec![vec![0, 1, 2, 0], vec![0, 3, 0]]]);
        assert_eq!(record.history[1].routes.drone_paths, vec![vec![vec![0, 2, 3, 0]]]);
    }

    #[test]
    fn can_read_sentinel_only_history() {
        let problem = ProblemInstance {
            trucks_count: 0,
            drones_count: 0,
            .._problem()
        };
        let mut reader = LineReader::new("5.0\n3.0\n-1\n".as_bytes());
        let costs = read_history(&mut reader, &problem)
            .unwrap()
            .iter()
            .map(|h| h.cost)
            .collect::<Vec<_>>();
        assert_eq!(costs, vec![3.0, 5.0]);
    }

    #[test]
    fn can_keep_missing_timing_as_sentinel() {
        let mut reader = LineReader::new("real 1.5\nreal 2\nsys 0.5\n".as_bytes());
        let timing = Timing::read(&mut reader).unwrap();
        assert_eq!(timing.real, 2.0);
        assert_eq!(timing.user, UNAVAILABLE_TIME);
        assert_eq!(timing.sys, 0.5);
    }

    #[test]
    fn can_reject_unrecognized_timing() {
        let mut reader = LineReader::new("real 1.5\nwall 2\nsys 0.5\n".as_bytes());
        assert!(matches!(Timing::read(&mut reader), Err(Error::Format(_))));
    }

    #[test]
    fn can_reject_non_finite_metrics() {
        let problem = _problem();
        for (from, to) in [("42.5\n", "inf\n"), ("42.5\n0\n0\n", "42.5\nnan\n0\n"), ("42.5\n", "-3\n")] {
            let output = OUTPUT.replacen(from, to, 1);
            assert!(matches!(
                ResultRecord::read(&mut LineReader::new(output.as_bytes()), &problem),
                Err(Error::Format(_))
            ));
        }
    }

    #[test]
    fn can_derive_feasibility_from_violations() {
        let feasible = SolutionRecord::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0, RouteSet::default());
        assert!(feasible.feasible);

        let infeasible = SolutionRecord::new(1.0, 0.0, 0.0, 0.0, 0.0, 1e-9, RouteSet::default());
        assert!(!infeasible.feasible);
    }

    #[test]
    fn can_abort_on_truncated_output() {
        let problem = _problem();
        let truncated = OUTPUT.lines().take(20).collect::<Vec<_>>().join("\n");
        assert!(matches!(
            ResultRecord::read(&mut LineReader::new(truncated.as_bytes()), &problem),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn can_serialize_with_flat_paths() {
        let problem = _problem();
        let record = ResultRecord::read(&mut LineReader::new(OUTPUT.as_bytes()), &problem).unwrap();
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["config"], "endurance");
        assert_eq!(value["solution"]["truck_paths"], serde_json::json!([[[0, 1, 2, 0]]]));
        assert!(value.get("elite_set").is_none());

        let parsed = serde_json::from_value::<ResultRecord>(value).unwrap();
        assert_eq!(parsed, record);
    }
}
