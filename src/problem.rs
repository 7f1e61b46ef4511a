use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, expected};

/// Customer and vehicle counts of an archived problem. These are not encoded in the archive itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct InstanceCounts {
    pub customers_count: usize,
    pub trucks_count: usize,
    pub drones_count: usize,
}

/// Explicit lookup table from problem identifier to [`InstanceCounts`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct InstanceTable {
    rows: HashMap<String, InstanceCounts>,
}

impl Default for InstanceTable {
    fn default() -> Self {
        let rows = [
            ("CMT1", 50, 3, 2),
            ("CMT2", 75, 5, 5),
            ("CMT3", 100, 4, 4),
            ("CMT4", 150, 6, 6),
            ("CMT5", 199, 9, 8),
        ]
        .into_iter()
        .map(|(problem, customers_count, trucks_count, drones_count)| {
            (
                problem.to_string(),
                InstanceCounts {
                    customers_count,
                    trucks_count,
                    drones_count,
                },
            )
        })
        .collect();

        Self { rows }
    }
}

impl InstanceTable {
    /// The built-in rows, extended (and overridden) by the rows of the JSON file at `path`.
    pub fn with_overrides(path: &Path) -> Result<Self, Error> {
        let data = fs::read_to_string(path)?;
        let overrides = serde_json::from_str::<Self>(&data)
            .map_err(|e| Error::configuration(format!("Invalid instance table {}: {e}", path.display())))?;

        let mut table = Self::default();
        for (problem, counts) in overrides.rows {
            table.insert(&problem, counts);
        }

        Ok(table)
    }

    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(path) => Self::with_overrides(path),
            None => Ok(Self::default()),
        }
    }

    pub fn insert(&mut self, problem: &str, counts: InstanceCounts) {
        self.rows.insert(problem.to_string(), counts);
    }

    pub fn resolve(&self, problem: &str) -> Result<InstanceCounts, Error> {
        self.rows
            .get(problem)
            .copied()
            .ok_or_else(|| Error::UnresolvedInstance(problem.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ProblemInstance {
    pub problem: String,
    pub customers_count: usize,
    pub trucks_count: usize,
    pub drones_count: usize,

    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub demands: Vec<f64>,
    pub dronable: Vec<bool>,

    pub truck_service_time: Vec<f64>,
    pub drone_service_time: Vec<f64>,

    pub truck_capacity: f64,
}

fn _multi_line(pattern: &str) -> Regex {
    RegexBuilder::new(pattern).multi_line(true).build().unwrap()
}

static COORDINATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| _multi_line(r"^[ \t]*(\d+)[ \t]+(-?\d+(?:\.\d*)?)[ \t]+(-?\d+(?:\.\d*)?)[ \t]*\r?$"));
static DEMAND_REGEX: LazyLock<Regex> =
    LazyLock::new(|| _multi_line(r"^[ \t]*(\d+)[ \t]+(\d+(?:\.\d*)?)[ \t]*\r?$"));
static CAPACITY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| _multi_line(r"^[ \t]*CAPACITY[ \t]*:[ \t]*(\d+(?:\.\d*)?)[ \t]*\r?$"));

/// Strip the archive file extension from a problem identifier.
pub fn problem_name(problem: &str) -> &str {
    problem.strip_suffix(".vrp").unwrap_or(problem)
}

impl ProblemInstance {
    /// Load `<archive>/<problem>.vrp`, taking the counts from `table`.
    pub fn import(archive: &Path, problem: &str, table: &InstanceTable) -> Result<Self, Error> {
        let problem = problem_name(problem);
        let counts = table.resolve(problem)?;

        let path = archive.join(format!("{problem}.vrp"));
        let data = fs::read_to_string(&path)
            .map_err(|e| Error::format(format!("Cannot read problem archive {}: {e}", path.display())))?;

        Self::parse(problem, &data, counts)
    }

    pub fn parse(problem: &str, data: &str, counts: InstanceCounts) -> Result<Self, Error> {
        fn _parse_f64(value: &str) -> Result<f64, Error> {
            value
                .parse::<f64>()
                .map_err(|_| Error::format(format!("Invalid number {value:?}")))
        }

        fn _check_ids(ids: &[usize], section: &str) -> Result<(), Error> {
            if let Some(&first) = ids.first() {
                for (offset, &id) in ids.iter().enumerate() {
                    if id != first + offset {
                        return Err(Error::format(format!(
                            "Non-contiguous node id {id} in {section} section, expected {}",
                            first + offset
                        )));
                    }
                }
            }

            Ok(())
        }

        let mut ids = vec![];
        let mut x = vec![];
        let mut y = vec![];
        for c in COORDINATE_REGEX.captures_iter(data) {
            let (_, [_id, _x, _y]) = c.extract::<3>();
            ids.push(_id.parse::<usize>().map_err(|_| Error::format(format!("Invalid node id {_id:?}")))?);
            x.push(_parse_f64(_x)?);
            y.push(_parse_f64(_y)?);
        }
        _check_ids(&ids, "coordinate")?;

        ids.clear();
        let mut demands = vec![];
        for c in DEMAND_REGEX.captures_iter(data) {
            let (_, [_id, _demand]) = c.extract::<2>();
            ids.push(_id.parse::<usize>().map_err(|_| Error::format(format!("Invalid node id {_id:?}")))?);
            demands.push(_parse_f64(_demand)?);
        }
        _check_ids(&ids, "demand")?;

        let truck_capacity = _parse_f64(
            expected(CAPACITY_REGEX.captures(data), "a \"CAPACITY : <number>\" line")?
                .get(1)
                .map_or("", |m| m.as_str()),
        )?;

        let nodes = counts.customers_count + 1;
        if x.len() != nodes || demands.len() != nodes {
            return Err(Error::format(format!(
                "Problem {problem} should have {nodes} nodes, found {} coordinates and {} demands",
                x.len(),
                demands.len()
            )));
        }

        if demands[0] != 0.0 {
            return Err(Error::format(format!("Depot of {problem} has non-zero demand {}", demands[0])));
        }

        Ok(Self {
            problem: problem.to_string(),
            customers_count: counts.customers_count,
            trucks_count: counts.trucks_count,
            drones_count: counts.drones_count,
            x,
            y,
            demands,
            dronable: vec![true; nodes],
            truck_service_time: vec![0.0; nodes],
            drone_service_time: vec![0.0; nodes],
            truck_capacity,
        })
    }

    pub fn counts(&self) -> InstanceCounts {
        InstanceCounts {
            customers_count: self.customers_count,
            trucks_count: self.trucks_count,
            drones_count: self.drones_count,
        }
    }
}
