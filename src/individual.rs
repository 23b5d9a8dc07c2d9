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

//! One candidate schedule and its genetic operators.
//!
//! The genome of an [`Individual`] is a per-flow list of waypoint PEs that
//! force a detour of the flow's XY path. Mutation adds or removes waypoints,
//! crossover swaps flow rows between two parents, and evaluation routes every
//! flow, replays the injections with the [`Harmonizer`], and condenses the
//! result into a single score: the negated quantile over the per-layer worst
//! completion proxies (higher is better). The immutable [`FlowTable`] is
//! shared by the whole population; cloning an individual only clones its
//! waypoint lists and derived columns.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use log::debug;
use rand::{seq::SliceRandom, Rng};
use thiserror::Error;

use crate::{
    harmonizer::{temporal_map, Harmonizer, WorkFlow},
    routing::{Channel, RouteError, XYRouter},
    trace::FlowTable,
};

/// Knobs consumed by a single evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EvalSettings {
    /// Iteration-count compression factor in `(0, 1]`; 1 simulates every
    /// injection, smaller values trade accuracy for time.
    pub shrink: f64,
    /// Quantile across the per-layer worst completion proxies.
    pub quantile: f64,
    /// Log harmonizer progress.
    pub verbose: bool,
}

impl Default for EvalSettings {
    fn default() -> Self {
        Self {
            shrink: 1.0,
            quantile: 0.9,
            verbose: false,
        }
    }
}

/// Derived scheduling columns of one flow, written by the latest evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowOutcome {
    /// Injection clock reached after all iterations, rescaled to the full
    /// iteration count when the run was shrunk.
    pub issue_time: f64,
    /// Average slack per simulated iteration.
    pub delay: f64,
    /// Whether the flow accumulated any slack at all.
    pub is_bound: bool,
}

/// Error of a single schedule evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EvaluateError {
    /// Path assembly failed for a flow.
    #[error("routing flow {flow}: {source}")]
    Route {
        /// Table id of the offending flow.
        flow: usize,
        /// The underlying routing failure.
        source: RouteError,
    },
}

/// Build the concrete channel sequence of a flow routed through `waypoints`.
///
/// The milestone sequence is `src`, the waypoints in order, then `dst`. Every
/// inner milestone loses the trailing [`Output`](crate::routing::Port::Output)
/// entry of its segment, so the assembled path ejects only at `dst`.
pub fn assemble_path(
    router: &XYRouter,
    src: usize,
    waypoints: &[usize],
    dst: usize,
) -> Result<Vec<Channel>, RouteError> {
    let mut milestones = Vec::with_capacity(waypoints.len() + 2);
    milestones.push(src);
    milestones.extend_from_slice(waypoints);
    milestones.push(dst);

    let mut path = Vec::new();
    for (leg, pair) in milestones.windows(2).enumerate() {
        let mut segment = router.path(pair[0], pair[1])?;
        if leg + 2 < milestones.len() {
            segment.pop();
        }
        path.extend(segment);
    }
    Ok(path)
}

/// One candidate schedule: the shared workload plus per-flow waypoint lists.
#[derive(Debug, Clone)]
pub struct Individual {
    /// Immutable workload shared by the whole population.
    table: Arc<FlowTable>,
    /// Per-flow waypoint lists, in table row order.
    genome: Vec<Vec<usize>>,
    /// Derived columns of the latest evaluation, in table row order.
    outcome: Vec<FlowOutcome>,
}

impl Individual {
    /// A fresh individual with an empty genome: every flow takes its plain
    /// XY path.
    pub fn new(table: Arc<FlowTable>) -> Self {
        let flows = table.flows.len();
        Self {
            table,
            genome: vec![Vec::new(); flows],
            outcome: vec![FlowOutcome::default(); flows],
        }
    }

    /// Rebuild a candidate from dumped waypoint lists, one per table row.
    ///
    /// # Panics
    /// Panics when the number of waypoint lists does not match the table.
    pub fn with_genome(table: Arc<FlowTable>, genome: Vec<Vec<usize>>) -> Self {
        assert_eq!(
            genome.len(),
            table.flows.len(),
            "one waypoint list per flow required"
        );
        let flows = table.flows.len();
        Self {
            table,
            genome,
            outcome: vec![FlowOutcome::default(); flows],
        }
    }

    /// The shared workload.
    pub fn table(&self) -> &FlowTable {
        &self.table
    }

    /// The waypoint lists, in table row order.
    pub fn genome(&self) -> &[Vec<usize>] {
        &self.genome
    }

    /// Derived columns of the latest evaluation, in table row order.
    pub fn outcome(&self) -> &[FlowOutcome] {
        &self.outcome
    }

    /// Apply `k in [0, 50)` random edits; each edit removes a waypoint with
    /// probability 0.6 and inserts one otherwise.
    pub fn mutate(&mut self, rng: &mut impl Rng) {
        if self.genome.is_empty() {
            return;
        }
        let edits = rng.gen_range(0..50);
        for _ in 0..edits {
            if rng.gen::<f64>() < 0.6 {
                self.remove_waypoint(rng);
            } else {
                self.add_waypoint(rng);
            }
        }
    }

    /// Append a uniformly sampled fresh waypoint to one random flow. PEs
    /// already on the flow's waypoint list, its source, and its destination
    /// stay excluded so the milestone sequence never stalls on one PE.
    pub(crate) fn add_waypoint(&mut self, rng: &mut impl Rng) {
        let idx = rng.gen_range(0..self.genome.len());
        let flow = &self.table.flows[idx];
        let waypoints = &mut self.genome[idx];

        let mut used: HashSet<usize> = waypoints.iter().copied().collect();
        used.insert(flow.src);
        used.insert(flow.dst);
        let free: Vec<usize> = (0..self.table.num_pes())
            .filter(|pe| !used.contains(pe))
            .collect();
        if let Some(&pe) = free.choose(rng) {
            waypoints.push(pe);
        }
    }

    /// Remove a uniformly chosen waypoint from one random flow, if any.
    pub(crate) fn remove_waypoint(&mut self, rng: &mut impl Rng) {
        let idx = rng.gen_range(0..self.genome.len());
        let waypoints = &mut self.genome[idx];
        if !waypoints.is_empty() {
            waypoints.remove(rng.gen_range(0..waypoints.len()));
        }
    }

    /// Offspring of two parents: a copy of `right` with a uniformly sampled
    /// half of its flow rows replaced by the corresponding rows of `left`.
    pub fn crossover(left: &Individual, right: &Individual, rng: &mut impl Rng) -> Individual {
        let mut child = right.clone();
        let take = left.genome.len() / 2;
        for row in rand::seq::index::sample(rng, left.genome.len(), take).iter() {
            child.genome[row] = left.genome[row].clone();
            child.outcome[row] = left.outcome[row];
        }
        child
    }

    /// Route every flow, replay the injections, score the result, and record
    /// it in the shared best-so-far cell.
    ///
    /// The derived `issue_time`, `delay` and `is_bound` columns of this
    /// individual are updated as a side effect; the genome is untouched.
    pub fn evaluate(
        &mut self,
        settings: &EvalSettings,
        best: &BestTracker,
    ) -> Result<f64, EvaluateError> {
        let router = XYRouter::new(self.table.diameter);

        let mut rows = Vec::with_capacity(self.table.flows.len());
        for (flow, waypoints) in self.table.flows.iter().zip(&self.genome) {
            let path = assemble_path(&router, flow.src, waypoints, flow.dst)
                .map_err(|source| EvaluateError::Route {
                    flow: flow.id,
                    source,
                })?;
            let count = (flow.counts as f64 * settings.shrink).ceil() as u64;
            rows.push(WorkFlow::new(
                flow.id,
                flow.flit,
                flow.interval,
                count,
                path.iter().map(|c| c.index()).collect(),
            ));
        }

        temporal_map(&mut rows);
        Harmonizer::new(self.table.diameter, settings.verbose).run(&mut rows);

        for row in &rows {
            let counts = self.table.flows[row.id].counts;
            let delay = row.delay as f64 / row.total as f64;
            self.outcome[row.id] = FlowOutcome {
                issue_time: row.issue_time as f64 * counts as f64 / row.total as f64,
                delay,
                is_bound: delay > 0.0,
            };
        }

        let score = layer_score(&self.table, &self.outcome, settings.quantile);
        best.offer(score, || self.snapshot(score));
        debug!("evaluated individual: score {score}");
        Ok(score)
    }

    /// Dump the genome and derived columns, with the given score attached.
    pub fn snapshot(&self, score: f64) -> BestSchedule {
        let rows = self
            .table
            .flows
            .iter()
            .zip(&self.genome)
            .zip(&self.outcome)
            .map(|((flow, waypoints), outcome)| ScheduleRow {
                id: flow.id,
                layer: flow.layer.clone(),
                src: flow.src,
                dst: flow.dst,
                flit: flow.flit,
                interval: flow.interval,
                counts: flow.counts,
                intermediate: waypoints.clone(),
                issue_time: outcome.issue_time,
                delay: outcome.delay,
                is_bound: outcome.is_bound,
            })
            .collect();
        BestSchedule {
            diameter: self.table.diameter,
            score,
            rows,
        }
    }
}

/// Linear-interpolation quantile of `values`; an empty set yields 0.
pub fn quantile(mut values: Vec<f64>, q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let rank = (values.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    values[lo] + (values[hi] - values[lo]) * (rank - lo as f64)
}

/// The scalar objective maximized by the search.
///
/// Each flow's completion proxy is `(delay + interval) * counts`; flows are
/// grouped by layer and each layer contributes its worst proxy. The score is
/// the negated `q`-quantile across the layer maxima, so tighter schedules
/// score higher.
pub fn layer_score(table: &FlowTable, outcome: &[FlowOutcome], q: f64) -> f64 {
    let mut worst: HashMap<&str, f64> = HashMap::new();
    for (flow, outcome) in table.flows.iter().zip(outcome) {
        let proxy = (outcome.delay + flow.interval as f64) * flow.counts as f64;
        let max = worst.entry(&flow.layer).or_insert(f64::NEG_INFINITY);
        *max = max.max(proxy);
    }
    -quantile(worst.into_values().collect(), q)
}

/// Full dump of one evaluated schedule: every flow with its genome and
/// derived columns.
#[derive(Debug, Clone)]
pub struct BestSchedule {
    /// Side length of the mesh the schedule was computed for.
    pub diameter: usize,
    /// Score of this schedule.
    pub score: f64,
    /// One row per flow, in table order.
    pub rows: Vec<ScheduleRow>,
}

/// One flow of a dumped schedule.
#[derive(Debug, Clone)]
pub struct ScheduleRow {
    /// Stable flow id.
    pub id: usize,
    /// Layer tag of the flow.
    pub layer: String,
    /// Source PE.
    pub src: usize,
    /// Destination PE.
    pub dst: usize,
    /// Packet length in flits.
    pub flit: u64,
    /// Injection period.
    pub interval: u64,
    /// Total number of injections.
    pub counts: u64,
    /// Waypoint PEs forced into the flow's path.
    pub intermediate: Vec<usize>,
    /// Final injection clock (rescaled to the full iteration count).
    pub issue_time: f64,
    /// Average slack per simulated iteration.
    pub delay: f64,
    /// Whether the flow accumulated any slack.
    pub is_bound: bool,
}

/// Shared best-so-far record. Evaluators offer their result after every run;
/// the stored schedule only ever improves.
#[derive(Debug, Default)]
pub struct BestTracker {
    /// The best `(score, schedule)` pair seen so far.
    inner: Mutex<Option<(f64, BestSchedule)>>,
}

impl BestTracker {
    /// An empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the candidate if it improves on the best score seen so far.
    /// The schedule is only materialized when it is kept.
    pub fn offer(&self, score: f64, schedule: impl FnOnce() -> BestSchedule) {
        let mut slot = self.inner.lock().unwrap();
        if slot.as_ref().map_or(true, |(best, _)| score > *best) {
            *slot = Some((score, schedule()));
        }
    }

    /// Best score seen so far.
    pub fn best_score(&self) -> Option<f64> {
        self.inner.lock().unwrap().as_ref().map(|(score, _)| *score)
    }

    /// Take the best schedule out of the tracker.
    pub fn into_best(self) -> Option<BestSchedule> {
        self.inner.into_inner().unwrap().map(|(_, schedule)| schedule)
    }
}
