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

//! The generational evolutionary search over candidate schedules.
//!
//! A classic truncation scheme: evaluate the whole population in parallel,
//! keep the better half, and refill with mutated offspring of uniformly
//! paired survivors. Every random decision draws from a generator seeded by
//! (master seed, generation, population slot), so a search is reproducible
//! bit-for-bit no matter how rayon schedules the evaluations.

use std::sync::Arc;

use log::{info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;

use crate::{
    individual::{BestSchedule, BestTracker, EvalSettings, Individual},
    trace::FlowTable,
};

/// Parameters of the evolutionary search.
#[derive(Debug, Clone, Copy)]
pub struct EvolutionConfig {
    /// Number of individuals per generation.
    pub population_size: usize,
    /// Number of generations to evolve.
    pub n_evolution: usize,
    /// Iteration-count compression factor handed to every evaluation.
    pub shrink: f64,
    /// Quantile across per-layer maxima used by the score.
    pub quantile: f64,
    /// Master seed of the search.
    pub seed: u64,
    /// Log harmonizer progress during evaluations.
    pub verbose: bool,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            n_evolution: 50,
            shrink: 1.0,
            quantile: 0.9,
            seed: 1,
            verbose: false,
        }
    }
}

/// Result of a finished search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Highest-scoring schedule observed over the whole search.
    pub best: BestSchedule,
    /// Best score of each generation, in order. Monotonically non-decreasing
    /// since survivors carry over unchanged.
    pub generation_best: Vec<f64>,
}

/// Population manager running the generational loop.
#[derive(Debug, Clone)]
pub struct EvolutionController {
    /// Search parameters.
    config: EvolutionConfig,
}

impl EvolutionController {
    /// A controller with the given parameters.
    pub fn new(config: EvolutionConfig) -> Self {
        Self { config }
    }

    /// Run the search on a workload. Returns `None` when there is nothing to
    /// search (empty population, zero generations, or every evaluation of a
    /// generation failed before any schedule was recorded).
    pub fn run(&self, table: Arc<FlowTable>) -> Option<SearchOutcome> {
        let cfg = self.config;
        if cfg.population_size == 0 || cfg.n_evolution == 0 {
            return None;
        }
        let settings = EvalSettings {
            shrink: cfg.shrink,
            quantile: cfg.quantile,
            verbose: cfg.verbose,
        };

        // seed population: each slot is warmed up with up to 100 mutations
        let mut population: Vec<Individual> = (0..cfg.population_size)
            .into_par_iter()
            .map(|slot| {
                let mut rng = slot_rng(cfg.seed, 0, slot);
                let mut individual = Individual::new(table.clone());
                for _ in 0..rng.gen_range(0..100) {
                    individual.mutate(&mut rng);
                }
                individual
            })
            .collect();

        let best = BestTracker::new();
        let mut generation_best = Vec::with_capacity(cfg.n_evolution);

        for generation in 0..cfg.n_evolution {
            let scores: Vec<Option<f64>> = population
                .par_iter_mut()
                .enumerate()
                .map(|(slot, individual)| match individual.evaluate(&settings, &best) {
                    Ok(score) => Some(score),
                    Err(e) => {
                        warn!("generation {generation}, individual {slot}: {e}");
                        None
                    }
                })
                .collect();

            // rank the survivors of this generation, failed evaluations last
            let mut ranked: Vec<(usize, f64)> = scores
                .iter()
                .enumerate()
                .filter_map(|(slot, score)| score.map(|s| (slot, s)))
                .collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
            let Some(&(_, top)) = ranked.first() else {
                warn!("generation {generation}: every evaluation failed, aborting");
                break;
            };
            generation_best.push(top);
            info!(
                "generation {generation}: best score {top}, {} of {} evaluated",
                ranked.len(),
                cfg.population_size
            );

            if generation + 1 == cfg.n_evolution {
                break;
            }

            // truncation selection: keep the better half, refill by crossover
            let keep = (cfg.population_size + 1) / 2;
            let survivors: Vec<Individual> = ranked
                .iter()
                .take(keep)
                .map(|&(slot, _)| population[slot].clone())
                .collect();

            let mut next = survivors.clone();
            for slot in next.len()..cfg.population_size {
                let mut rng = slot_rng(cfg.seed, generation as u64 + 1, slot);
                let left = &survivors[rng.gen_range(0..survivors.len())];
                let right = &survivors[rng.gen_range(0..survivors.len())];
                let mut child = Individual::crossover(left, right, &mut rng);
                child.mutate(&mut rng);
                next.push(child);
            }
            population = next;
        }

        let outcome = best.into_best().map(|best| SearchOutcome {
            best,
            generation_best,
        });
        if let Some(outcome) = &outcome {
            info!("search finished: best score {}", outcome.best.score);
        }
        outcome
    }
}

/// Deterministic generator for one population slot of one generation.
fn slot_rng(seed: u64, generation: u64, slot: usize) -> StdRng {
    StdRng::seed_from_u64(
        seed ^ generation.wrapping_mul(0x9e37_79b9_7f4a_7c15)
            ^ (slot as u64).wrapping_mul(0xc2b2_ae3d_27d4_eb4f),
    )
}
