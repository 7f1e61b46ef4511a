use std::error::Error;
use std::io::{self, BufWriter};

use clap::Parser;
use colored::Colorize;
use mimalloc::MiMalloc;

mod cli;
mod config;
mod encoder;
mod errors;
mod logger;
mod problem;
mod reader;
mod routes;
mod solutions;
mod summary;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> Result<(), Box<dyn Error>> {
    let arguments = cli::Arguments::parse();
    match arguments.command {
        cli::Commands::Encode {
            ref problem,
            ref archive,
            ref config_dir,
            ref instances,
            iterations,
            tabu_size,
            config,
            speed_type,
            range_type,
            verbose,
        } => {
            if verbose {
                eprintln!("Received {arguments:?}");
            }

            let table = problem::InstanceTable::load(instances.as_deref())?;
            let problem = problem::ProblemInstance::import(archive, problem, &table)?;
            let truck = config::TruckConfig::load(config_dir)?;
            let drone = config::DroneConfig::load(config_dir, config, speed_type, range_type)?;
            if verbose {
                eprintln!(
                    "Selected {} ({}, speed {}, range {})",
                    drone.class_name(),
                    drone.energy_model(),
                    drone.speed_type(),
                    drone.range_type()
                );
            }

            let input = encoder::SolverInput::new(
                problem,
                encoder::RunParameters {
                    iterations,
                    tabu_size,
                    verbose,
                },
                truck,
                drone,
            );
            input.write_to(&mut BufWriter::new(io::stdout().lock()))?;
        }
        cli::Commands::Decode {
            problem,
            archive,
            instances,
            outputs,
            pretty,
        } => {
            let table = problem::InstanceTable::load(instances.as_deref())?;
            let problem = problem::ProblemInstance::import(&archive, &problem, &table)?;

            let mut reader = reader::LineReader::new(io::stdin().lock());
            let record = solutions::ResultRecord::read(&mut reader, &problem)?;

            let persisted = logger::ResultWriter::new(&outputs)?.persist(&record, &problem, pretty)?;
            println!("{}", persisted.json.display());
            if let Some(path) = &persisted.pretty {
                println!("{}", path.display());
            }
            println!("{}", persisted.plot.display());

            eprintln!(
                "{}",
                format!(
                    "Result {} = {} ({} trips, feasible = {})",
                    persisted.id,
                    record.solution.cost,
                    record.solution.routes.trips_count(),
                    record.solution.feasible
                )
                .red()
            );
        }
        cli::Commands::Inspect { problem } => {
            let mut reader = reader::LineReader::new(io::stdin().lock());
            let input = encoder::SolverInput::decode(&mut reader, &problem)?;
            println!("{}", serde_json::to_string_pretty(&input)?);
        }
        cli::Commands::Summary { outputs, baseline } => {
            summary::summarize(&outputs, &baseline)?;
        }
    }

    Ok(())
}
