use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use colored::Colorize;
use csv::{QuoteStyle, WriterBuilder};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

use crate::errors::Error;
use crate::solutions::ResultRecord;

/// Baseline optimal costs are reported in different units than solver costs; they are rescaled by this
/// factor before any comparison.
// TODO: confirm the derivation of this factor with the owners of the MILP baseline.
pub const BASELINE_COST_SCALE: f64 = 60.0;

pub const SUMMARY_CSV: &str = "summary.csv";
pub const SUMMARY_JSON: &str = "summary.json";

pub const COLUMNS: [&str; 27] = [
    "Problem",
    "Customers count",
    "Trucks count",
    "Drones count",
    "Iterations",
    "Tabu size",
    "Energy model",
    "Speed type",
    "Range type",
    "Cost",
    "MILP cost",
    "Improved [%]",
    "MILP performance",
    "MILP status",
    "Capacity violation",
    "Energy violation",
    "Waiting time violation",
    "Fixed time violation",
    "Fixed distance violation",
    "Truck paths",
    "Drone paths",
    "Feasible",
    "Initialization",
    "Last improved",
    "real",
    "user",
    "sys",
];

static BASELINE_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+\.\d+\.\d+").unwrap());

/// An externally computed reference result, keyed by the problem identifier found in its file name.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct BaselineRecord {
    #[serde(skip)]
    pub problem: String,

    #[serde(rename = "Optimal", default)]
    pub optimal: Option<f64>,

    #[serde(rename = "Solve_Time")]
    pub solve_time: f64,

    pub status: String,
}

impl BaselineRecord {
    /// Rescaled optimal cost, comparable with solver costs.
    pub fn scaled_cost(&self) -> Option<f64> {
        self.optimal.map(|optimal| BASELINE_COST_SCALE * optimal)
    }
}

/// Load every `*.json` baseline whose file name carries a `<a>.<b>.<c>` identifier.
///
/// A missing directory yields an empty baseline set.
pub fn load_baselines(directory: &Path) -> Result<HashMap<String, BaselineRecord>, Error> {
    let mut result = HashMap::new();
    if !directory.is_dir() {
        eprintln!(
            "{}",
            format!("Baseline directory {} does not exist", directory.display()).yellow()
        );
        return Ok(result);
    }

    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|f| f.to_str()) else {
            continue;
        };

        if !path.is_file() || !name.ends_with(".json") {
            continue;
        }

        if let Some(problem) = BASELINE_ID_REGEX.find(name) {
            let data = fs::read_to_string(&path)?;
            let mut record = serde_json::from_str::<BaselineRecord>(&data)
                .map_err(|e| Error::format(format!("Invalid baseline {}: {e}", path.display())))?;
            record.problem = problem.as_str().to_string();
            result.insert(record.problem.clone(), record);
        }
    }

    Ok(result)
}

fn _is_result_file(name: &str) -> bool {
    name.ends_with(".json") && !name.ends_with("-pretty.json") && name != SUMMARY_JSON
}

/// Load every persisted result of `directory`, ordered by file name.
pub fn load_results(directory: &Path) -> Result<Vec<ResultRecord>, Error> {
    let mut paths = fs::read_dir(directory)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<PathBuf>, _>>()?;
    paths.retain(|path| {
        path.is_file()
            && path
                .file_name()
                .and_then(|f| f.to_str())
                .is_some_and(_is_result_file)
    });
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut results = vec![];
    for path in paths {
        eprintln!("{}", path.display());
        let data = fs::read_to_string(&path)?;
        let record = serde_json::from_str::<ResultRecord>(&data)
            .map_err(|e| Error::format(format!("Invalid result {}: {e}", path.display())))?;
        results.push(record);
    }

    Ok(results)
}

/// Percentage by which `cost` improves on `baseline_cost`, rounded to 2 decimals.
pub fn improvement(cost: f64, baseline_cost: f64) -> f64 {
    (100.0 * (baseline_cost - cost) / baseline_cost * 100.0).round() / 100.0
}

fn _float(value: f64) -> String {
    format!("{value:?}")
}

/// One row of the tabular summary, in [`COLUMNS`] order. Missing baseline fields are empty.
pub fn summary_row(result: &ResultRecord, baseline: Option<&BaselineRecord>) -> Vec<String> {
    let solution = &result.solution;
    let baseline_cost = baseline.and_then(BaselineRecord::scaled_cost);

    vec![
        result.problem.clone(),
        result.customers_count.to_string(),
        result.trucks_count.to_string(),
        result.drones_count.to_string(),
        result.iterations.to_string(),
        result.tabu_size.to_string(),
        result.config.to_string(),
        result.speed_type.to_string(),
        result.range_type.to_string(),
        _float(solution.cost),
        baseline_cost.map(_float).unwrap_or_default(),
        baseline_cost
            .filter(|&c| c != 0.0)
            .map(|c| _float(improvement(solution.cost, c)))
            .unwrap_or_default(),
        baseline.map(|b| _float(b.solve_time)).unwrap_or_default(),
        baseline.map(|b| b.status.clone()).unwrap_or_default(),
        _float(solution.capacity_violation),
        _float(solution.drone_energy_violation),
        _float(solution.waiting_time_violation),
        _float(solution.fixed_time_violation),
        _float(solution.fixed_distance_violation),
        format!("{:?}", solution.routes.truck_paths),
        format!("{:?}", solution.routes.drone_paths),
        u8::from(solution.feasible).to_string(),
        result.initialization_label.clone().unwrap_or_default(),
        result.last_improved.to_string(),
        _float(result.real),
        _float(result.user),
        _float(result.sys),
    ]
}

/// Write the `sep=,`-prefixed table. Fields containing separators or quotes are quoted and escaped.
pub fn write_csv<W: Write>(
    mut writer: W,
    results: &[ResultRecord],
    baselines: &HashMap<String, BaselineRecord>,
) -> Result<(), Error> {
    writeln!(writer, "sep=,")?;

    let mut csv = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .from_writer(writer);
    csv.write_record(COLUMNS)?;
    for result in results {
        csv.write_record(summary_row(result, baselines.get(&result.problem)))?;
    }

    csv.flush()?;
    Ok(())
}

pub fn write_json<W: Write>(writer: W, results: &[ResultRecord]) -> Result<(), Error> {
    let mut serializer = serde_json::Serializer::with_formatter(writer, PrettyFormatter::with_indent(b"    "));
    results.serialize(&mut serializer)?;
    Ok(())
}

/// Scan `outputs` for results and write `summary.csv` and `summary.json` next to them.
pub fn summarize(outputs: &Path, baseline: &Path) -> Result<(PathBuf, PathBuf), Error> {
    let json_path = outputs.join(SUMMARY_JSON);
    if json_path.is_file() {
        fs::remove_file(&json_path)?;
    }

    let results = load_results(outputs)?;
    let baselines = load_baselines(baseline)?;
    let covered = results.iter().filter(|r| baselines.contains_key(&r.problem)).count();
    eprintln!(
        "{}",
        format!("Summarizing {} results, {covered} with a baseline", results.len()).green()
    );

    let csv_path = outputs.join(SUMMARY_CSV);
    write_csv(BufWriter::new(File::create(&csv_path)?), &results, &baselines)?;
    println!("{}", csv_path.display());

    let mut json = BufWriter::new(File::create(&json_path)?);
    write_json(&mut json, &results)?;
    json.flush()?;
    println!("{}", json_path.display());

    Ok((csv_path, json_path))
}
