use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use rand::Rng;
use rand::distr::Alphanumeric;

use crate::errors::Error;
use crate::problem::ProblemInstance;
use crate::routes::RouteSet;
use crate::solutions::ResultRecord;

/// Paths of the artifacts written for one run.
#[derive(Debug)]
pub struct Persisted {
    pub id: String,
    pub json: PathBuf,
    pub pretty: Option<PathBuf>,
    pub plot: PathBuf,
}

pub struct ResultWriter<'a> {
    _outputs: &'a Path,
}

fn _random_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect::<String>()
}

impl<'a> ResultWriter<'a> {
    pub fn new(outputs: &'a Path) -> Result<Self, Error> {
        if !outputs.is_dir() {
            fs::create_dir_all(outputs)?;
        }

        Ok(Self { _outputs: outputs })
    }

    /// Atomically create `<problem>-<id>.json`, drawing a new id for as long as the name is taken.
    fn _create_exclusive(
        &self,
        problem: &str,
        mut next_id: impl FnMut() -> String,
    ) -> Result<(String, PathBuf, File), Error> {
        loop {
            let id = next_id();
            let path = self._outputs.join(format!("{problem}-{id}.json"));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((id, path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn persist(&self, record: &ResultRecord, problem: &ProblemInstance, pretty: bool) -> Result<Persisted, Error> {
        self._persist(record, problem, pretty, _random_id)
    }

    fn _persist(
        &self,
        record: &ResultRecord,
        problem: &ProblemInstance,
        pretty: bool,
        next_id: impl FnMut() -> String,
    ) -> Result<Persisted, Error> {
        let (id, json_path, json) = self._create_exclusive(&record.problem, next_id)?;
        let pretty_path = pretty.then(|| self._outputs.join(format!("{}-{id}-pretty.json", record.problem)));
        let plot = self._outputs.join(format!("{}-{id}-plot.py", record.problem));

        let written = Self::_write_artifacts(json, record, problem, pretty_path.as_deref(), &plot);
        if let Err(e) = written {
            // No partial result may stay in the outputs directory
            for path in [Some(&json_path), pretty_path.as_ref(), Some(&plot)].into_iter().flatten() {
                let _ = fs::remove_file(path);
            }

            return Err(e);
        }

        Ok(Persisted {
            id,
            json: json_path,
            pretty: pretty_path,
            plot,
        })
    }

    fn _write_artifacts(
        mut json: File,
        record: &ResultRecord,
        problem: &ProblemInstance,
        pretty: Option<&Path>,
        plot: &Path,
    ) -> Result<(), Error> {
        json.write_all(serde_json::to_string(record)?.as_bytes())?;
        json.sync_all()?;

        if let Some(path) = pretty {
            fs::write(path, serde_json::to_string_pretty(record)?)?;
        }

        fs::write(plot, plot_script(problem, &record.solution.routes))?;
        Ok(())
    }
}

/// A standalone matplotlib script drawing every trip of `routes` over the instance.
pub fn plot_script(problem: &ProblemInstance, routes: &RouteSet) -> String {
    let dronable = format!(
        "[{}]",
        problem
            .dronable
            .iter()
            .map(|&d| if d { "True" } else { "False" })
            .collect::<Vec<_>>()
            .join(", ")
    );

    format!(
        r#"# Auto-generated by {package}
from __future__ import annotations

from typing import List

from matplotlib import pyplot


x = {x:?}
y = {y:?}
dronable = {dronable}
customers_count = {customers_count}

truck_paths: List[List[List[int]]] = {truck_paths:?}
drone_paths: List[List[List[int]]] = {drone_paths:?}

_, ax = pyplot.subplots()


def draw(vehicle_paths: List[List[List[int]]], color: str) -> None:
    for paths in vehicle_paths:
        _x: List[float] = []
        _y: List[float] = []
        _u: List[float] = []
        _v: List[float] = []
        for path in paths:
            for index in range(len(path) - 1):
                current = path[index]
                after = path[index + 1]

                _x.append(x[current])
                _y.append(y[current])
                _u.append(x[after] - x[current])
                _v.append(y[after] - y[current])

        ax.quiver(_x, _y, _u, _v, color=color, angles="xy", scale_units="xy", scale=1, width=0.004)


draw(drone_paths, "cyan")
draw(truck_paths, "darkviolet")

ax.scatter((x[0],), (y[0],), c="black", label="Depot")
ax.scatter(
    [x[index] for index in range(1, 1 + customers_count) if dronable[index]],
    [y[index] for index in range(1, 1 + customers_count) if dronable[index]],
    c="darkblue",
    label="Dronable",
)
ax.scatter(
    [x[index] for index in range(1, 1 + customers_count) if not dronable[index]],
    [y[index] for index in range(1, 1 + customers_count) if not dronable[index]],
    c="red",
    label="Truck-only",
)

ax.annotate("0", (x[0], y[0]))
for index in range(1, 1 + customers_count):
    ax.annotate(str(index), (x[index], y[index]))

ax.grid(True)

pyplot.legend()
pyplot.show()
pyplot.close()
"#,
        package = env!("CARGO_PKG_NAME"),
        x = problem.x,
        y = problem.y,
        customers_count = problem.customers_count,
        truck_paths = routes.truck_paths,
        drone_paths = routes.drone_paths,
    )
}
