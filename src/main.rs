// Weaver: compile-time traffic scheduling for mesh NoC accelerators
// Copyright (C) 2023 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use log::info;

use weaver::{report, EvolutionConfig, EvolutionController, FlowTable};

/// Search for a mesh traffic schedule minimizing the worst per-layer slowdown.
#[derive(Debug, Parser)]
struct Cli {
    /// Directory holding the pre-generated trace files.
    trace_dir: PathBuf,
    /// Flit size selecting the trace file (`trace_<SIZE>.csv`).
    #[clap(long, short = 'f', default_value = "1024")]
    flit_size: u64,
    /// Mesh side length; the array has the square of this many PEs.
    #[clap(long, short = 'd', default_value = "16")]
    array_diameter: usize,
    /// Number of parallel evaluation workers. If not specified, it will use
    /// all available cores.
    #[clap(long, short = 'w')]
    workers: Option<usize>,
    /// Number of individuals per generation.
    #[clap(long, short = 'p', default_value = "100")]
    population_size: usize,
    /// Number of generations to evolve.
    #[clap(long, short = 'n', default_value = "50")]
    n_evolution: usize,
    /// Iteration-count compression factor in (0, 1].
    #[clap(long, default_value = "1.0")]
    shrink: f64,
    /// Quantile across the per-layer slowdown maxima used by the score.
    #[clap(long, default_value = "0.9")]
    quantile: f64,
    /// Master seed of the search.
    #[clap(long, default_value = "1")]
    seed: u64,
    /// Log harmonizer progress every 500 iterations.
    #[clap(long, short = 'v')]
    scheduler_verbose: bool,
    /// Where to write the best schedule.
    #[clap(long, short = 'o', default_value = "best_scheduling.csv")]
    output: PathBuf,
    /// File to which the mean exceeded slowdown is appended.
    #[clap(long, default_value = "slowdown.csv")]
    result_file: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_timed();

    let args = Cli::parse();
    if !(args.shrink > 0.0 && args.shrink <= 1.0) {
        return Err("--shrink must lie in (0, 1]".into());
    }
    if !(0.0..=1.0).contains(&args.quantile) {
        return Err("--quantile must lie in [0, 1]".into());
    }

    let threads = args.workers.unwrap_or_else(num_cpus::get);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()?;

    let trace_path = args.trace_dir.join(format!("trace_{}.csv", args.flit_size));
    let table = Arc::new(FlowTable::load(&trace_path, args.array_diameter)?);

    let controller = EvolutionController::new(EvolutionConfig {
        population_size: args.population_size,
        n_evolution: args.n_evolution,
        shrink: args.shrink,
        quantile: args.quantile,
        seed: args.seed,
        verbose: args.scheduler_verbose,
    });
    let Some(outcome) = controller.run(table) else {
        info!("nothing to schedule");
        return Ok(());
    };

    println!("score: {}", outcome.best.score);
    match report::mean_exceeded_slowdown(&outcome.best) {
        Some(mean) => {
            println!("mean exceeded slowdown: {mean}");
            report::append_result(&args.result_file, mean)?;
        }
        None => println!("no flow exceeds its injection budget"),
    }

    let load = report::channel_load(&outcome.best)?;
    info!("channel load imbalance: {:.3}", report::load_imbalance(&load));

    report::write_schedule(&args.output, &outcome.best)?;
    info!("best schedule written to {}", args.output.display());

    Ok(())
}
