use std::fmt::Debug;
use std::io::{BufRead, Write};

use serde::Serialize;

use crate::cli::{self, ConfigType};
use crate::config::{DroneConfig, TruckConfig, VehicleConfig};
use crate::errors::Error;
use crate::problem::ProblemInstance;
use crate::reader::LineReader;

/// Join values with single spaces. `Debug` keeps the trailing `.0` of integral floats.
pub fn join<T: Debug>(values: impl IntoIterator<Item = T>) -> String {
    values
        .into_iter()
        .map(|v| format!("{v:?}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunParameters {
    pub iterations: usize,
    pub tabu_size: usize,
    pub verbose: bool,
}

/// Everything the external solver reads on its standard input.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SolverInput {
    pub problem: ProblemInstance,
    pub parameters: RunParameters,
    pub truck: TruckConfig,
    pub drone: DroneConfig,
}

impl VehicleConfig {
    /// The lines describing this config on the solver input stream.
    pub fn wire_lines(&self) -> Vec<String> {
        match self {
            Self::Truck(truck) => vec![
                join([truck.maximum_velocity, truck.capacity]),
                format!("{} {}", truck.coefficients.len(), join(&truck.coefficients))
                    .trim_end()
                    .to_string(),
            ],
            Self::Drone(drone) => vec![
                drone.class_name().to_string(),
                format!("{:?} {} {}", drone.capacity(), drone.speed_type(), drone.range_type()),
                join(drone.model_values()),
            ],
        }
    }
}

impl SolverInput {
    /// The truck capacity always follows the archived instance, whatever the truck dataset says.
    pub fn new(problem: ProblemInstance, parameters: RunParameters, truck: TruckConfig, drone: DroneConfig) -> Self {
        let truck = TruckConfig {
            capacity: problem.truck_capacity,
            ..truck
        };

        Self {
            problem,
            parameters,
            truck,
            drone,
        }
    }

    /// The exact line sequence consumed by the solver. Line and field order are part of the wire contract.
    pub fn encode(&self) -> Vec<String> {
        let problem = &self.problem;
        let mut lines = vec![
            join([problem.customers_count, problem.trucks_count, problem.drones_count]),
            join(&problem.x),
            join(&problem.y),
            join(&problem.demands),
            join(problem.dronable.iter().map(|&d| u8::from(d))),
            join(&problem.truck_service_time),
            join(&problem.drone_service_time),
            self.parameters.iterations.to_string(),
            self.parameters.tabu_size.to_string(),
            u8::from(self.parameters.verbose).to_string(),
        ];

        lines.extend(VehicleConfig::Truck(self.truck.clone()).wire_lines());
        lines.extend(VehicleConfig::Drone(self.drone.clone()).wire_lines());
        lines
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        for line in self.encode() {
            writeln!(writer, "{line}")?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Parse an encoded stream back. The problem identifier is not part of the stream.
    pub fn decode<R: BufRead>(reader: &mut LineReader<R>, problem: &str) -> Result<Self, Error> {
        let counts = reader.parse_all::<usize>("instance header")?;
        let [customers_count, trucks_count, drones_count] = counts[..] else {
            return Err(Error::format(format!("Expected 3 counts in instance header, found {counts:?}")));
        };

        let nodes = customers_count + 1;
        let mut _node_line = |what: &str| -> Result<Vec<f64>, Error> {
            let values = reader.parse_all::<f64>(what)?;
            if values.len() != nodes {
                return Err(Error::format(format!("Expected {nodes} {what}, found {}", values.len())));
            }

            Ok(values)
        };

        let x = _node_line("x coordinates")?;
        let y = _node_line("y coordinates")?;
        let demands = _node_line("demands")?;
        let dronable = _node_line("dronable flags")?
            .into_iter()
            .map(|d| {
                if d == 0.0 {
                    Ok(false)
                } else if d == 1.0 {
                    Ok(true)
                } else {
                    Err(Error::format(format!("Invalid dronable flag {d}")))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        let truck_service_time = _node_line("truck service times")?;
        let drone_service_time = _node_line("drone service times")?;

        let parameters = RunParameters {
            iterations: reader.parse("iterations")?,
            tabu_size: reader.parse("tabu size")?,
            verbose: reader.parse::<u8>("verbose flag")? != 0,
        };

        let truck_values = reader.parse_all::<f64>("truck config")?;
        let [maximum_velocity, capacity] = truck_values[..] else {
            return Err(Error::format("Expected velocity and capacity in truck config"));
        };

        let coefficients = reader.parse_all::<f64>("truck coefficients")?;
        let Some((&count, coefficients)) = coefficients.split_first() else {
            return Err(Error::format("Missing truck coefficients count"));
        };
        if count != coefficients.len() as f64 {
            return Err(Error::format(format!(
                "Declared {count} truck coefficients, found {}",
                coefficients.len()
            )));
        }

        let class_name = reader.next_line("drone config class")?;
        let header = reader.next_line("drone config header")?;
        let fields = header.split_whitespace().collect::<Vec<_>>();
        let [capacity_text, speed_type, range_type] = fields[..] else {
            return Err(Error::format(format!("Invalid drone config header {header:?}")));
        };
        let drone_capacity = capacity_text
            .parse::<f64>()
            .map_err(|_| Error::format(format!("Invalid drone capacity {capacity_text:?}")))?;
        let drone = DroneConfig::from_values(
            &class_name,
            drone_capacity,
            cli::parse_value::<ConfigType>(speed_type, "speed type")?,
            cli::parse_value::<ConfigType>(range_type, "range type")?,
            &reader.parse_all::<f64>("drone config values")?,
        )?;

        Ok(Self {
            problem: ProblemInstance {
                problem: problem.to_string(),
                customers_count,
                trucks_count,
                drones_count,
                x,
                y,
                demands,
                dronable,
                truck_service_time,
                drone_service_time,
                truck_capacity: capacity,
            },
            parameters,
            truck: TruckConfig {
                maximum_velocity,
                capacity,
                coefficients: coefficients.to_vec(),
            },
            drone,
        })
    }
}
