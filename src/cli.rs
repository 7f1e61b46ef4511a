use std::fmt;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::errors::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Deserialize, Serialize)]
pub enum EnergyModel {
    #[serde(rename = "linear")]
    Linear = 0,
    #[serde(rename = "non-linear")]
    #[value(name = "non-linear")]
    NonLinear = 1,
    #[serde(rename = "endurance")]
    Endurance = 2,
}

impl fmt::Display for EnergyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Linear => "linear",
                Self::NonLinear => "non-linear",
                Self::Endurance => "endurance",
            }
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Deserialize, Serialize)]
pub enum ConfigType {
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "high")]
    High,
}

impl fmt::Display for ConfigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Low => "low",
                Self::High => "high",
            }
        )
    }
}

/// Parse a textual value echoed by the solver into one of the CLI enums.
pub fn parse_value<T: ValueEnum>(value: &str, what: &str) -> Result<T, Error> {
    T::from_str(value.trim(), false).map_err(|e| Error::format(format!("Invalid {what} {value:?}: {e}")))
}

#[derive(Debug, Parser)]
#[command(
    long_about = "The min-timespan parallel technician-and-drone scheduling in door-to-door sampling service system.\nSolver input/output interchange.",
    propagate_version = true,
    version
)]
pub struct Arguments {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Transform a problem from the archive into the solver input stream (written to stdout)
    Encode {
        /// The problem name in the archive
        problem: String,

        /// Directory of the problem archive
        #[arg(long, default_value = "problems/cvrplib")]
        archive: PathBuf,

        /// Directory of the vehicle config datasets
        #[arg(long, default_value = "problems/config_parameter")]
        config_dir: PathBuf,

        /// JSON instance table overriding the built-in customer/vehicle counts
        #[arg(long)]
        instances: Option<PathBuf>,

        /// The number of iterations to run the algorithm for
        #[arg(short, long, default_value_t = 1200)]
        iterations: usize,

        /// The tabu size for each neighborhood
        #[arg(short, long, default_value_t = 10)]
        tabu_size: usize,

        /// The energy consumption model to use
        #[arg(short, long, default_value_t = EnergyModel::Linear)]
        config: EnergyModel,

        /// Speed type of drones
        #[arg(long, default_value_t = ConfigType::Low)]
        speed_type: ConfigType,

        /// Range type of drones
        #[arg(long, default_value_t = ConfigType::Low)]
        range_type: ConfigType,

        /// The verbose mode
        #[arg(short, long)]
        verbose: bool,
    },

    /// Transform the solver output stream (read from stdin) into a persisted result
    Decode {
        /// The problem name in the archive
        problem: String,

        /// Directory of the problem archive
        #[arg(long, default_value = "problems/cvrplib")]
        archive: PathBuf,

        /// JSON instance table overriding the built-in customer/vehicle counts
        #[arg(long)]
        instances: Option<PathBuf>,

        /// The directory to store results
        #[arg(long, default_value = "result")]
        outputs: PathBuf,

        /// Also write an indented copy of the result
        #[arg(long)]
        pretty: bool,
    },

    /// Parse a solver input stream (read from stdin) and print it as JSON
    Inspect {
        /// The problem name to attach to the decoded input
        #[arg(default_value = "stdin")]
        problem: String,
    },

    /// Summarize every persisted result against the MILP baseline
    Summary {
        /// The directory of persisted results
        #[arg(long, default_value = "result")]
        outputs: PathBuf,

        /// The directory of MILP baseline results
        #[arg(long, default_value = "problems/milp")]
        baseline: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_parse_echoed_values() {
        assert_eq!(parse_value::<EnergyModel>("non-linear", "model").unwrap(), EnergyModel::NonLinear);
        assert_eq!(parse_value::<ConfigType>("high\n", "speed type").unwrap(), ConfigType::High);
        assert!(matches!(parse_value::<ConfigType>("medium", "speed type"), Err(Error::Format(_))));
    }

    #[test]
    fn can_display_values_as_serialized() {
        for model in [EnergyModel::Linear, EnergyModel::NonLinear, EnergyModel::Endurance] {
            assert_eq!(serde_json::to_string(&model).unwrap(), format!("\"{model}\""));
        }
    }

    #[test]
    fn can_parse_encode_arguments() {
        let arguments =
            Arguments::try_parse_from(["min-timespan-interchange", "encode", "CMT1", "-c", "endurance", "-v"]).unwrap();
        match arguments.command {
            Commands::Encode {
                problem,
                config,
                iterations,
                verbose,
                ..
            } => {
                assert_eq!(problem, "CMT1");
                assert_eq!(config, EnergyModel::Endurance);
                assert_eq!(iterations, 1200);
                assert!(verbose);
            }
            _ => panic!("Expected encode command"),
        }
    }
}
