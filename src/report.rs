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

//! Writing the scheduling report.
//!
//! The best schedule is dumped as one CSV row per flow (genome and derived
//! columns included), the mean slowdown of the flows that exceed their
//! injection budget is appended to a running result file, and the per-channel
//! load gives a quick view of how evenly the search spread the traffic.

use std::{
    fs::OpenOptions,
    io::Write,
    path::Path,
};

use itertools::Itertools;
use serde::Serialize;
use thiserror::Error;

use crate::{
    individual::{assemble_path, BestSchedule},
    routing::{RouteError, XYRouter, PORTS_PER_ROUTER},
};

/// Error while writing a report file.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The file could not be written.
    #[error("cannot write the report: {0}")]
    Io(#[from] std::io::Error),
    /// A record could not be serialized.
    #[error("cannot serialize the report: {0}")]
    Csv(#[from] csv::Error),
}

/// CSV record for one flow of the best schedule.
#[derive(Debug, Serialize)]
struct ScheduleRecord<'a> {
    /// Stable flow id.
    id: usize,
    /// Layer tag.
    layer: &'a str,
    /// Source PE.
    src: usize,
    /// Destination PE.
    dst: usize,
    /// Packet length in flits.
    flit: u64,
    /// Injection period.
    interval: u64,
    /// Total number of injections.
    counts: u64,
    /// Waypoints, `;`-joined.
    intermediate: String,
    /// Final injection clock.
    issue_time: f64,
    /// Average slack per iteration.
    delay: f64,
    /// Whether the flow accumulated any slack.
    is_bound: bool,
}

/// Write the best schedule as a CSV table, one row per flow.
pub fn write_schedule(path: impl AsRef<Path>, schedule: &BestSchedule) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in &schedule.rows {
        writer.serialize(ScheduleRecord {
            id: row.id,
            layer: &row.layer,
            src: row.src,
            dst: row.dst,
            flit: row.flit,
            interval: row.interval,
            counts: row.counts,
            intermediate: row.intermediate.iter().map(usize::to_string).join(";"),
            issue_time: row.issue_time,
            delay: row.delay,
            is_bound: row.is_bound,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Mean slowdown over the flows whose final injection clock exceeds their
/// injection budget (`interval * counts`), or `None` if no flow does.
pub fn mean_exceeded_slowdown(schedule: &BestSchedule) -> Option<f64> {
    let exceeded: Vec<f64> = schedule
        .rows
        .iter()
        .map(|row| row.issue_time / (row.interval * row.counts) as f64)
        .filter(|slowdown| *slowdown > 1.0)
        .collect();
    (!exceeded.is_empty()).then(|| exceeded.iter().sum::<f64>() / exceeded.len() as f64)
}

/// Append one scalar result line to the running result file.
pub fn append_result(path: impl AsRef<Path>, value: f64) -> Result<(), ReportError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{value}")?;
    Ok(())
}

/// Traffic volume (`flit * counts`) accumulated on every channel of the mesh
/// by the scheduled paths, indexed by global channel id.
pub fn channel_load(schedule: &BestSchedule) -> Result<Vec<u64>, RouteError> {
    let router = XYRouter::new(schedule.diameter);
    let mut load = vec![0_u64; schedule.diameter * schedule.diameter * PORTS_PER_ROUTER];
    for row in &schedule.rows {
        for channel in assemble_path(&router, row.src, &row.intermediate, row.dst)? {
            load[channel.index()] += row.flit * row.counts;
        }
    }
    Ok(load)
}

/// Load imbalance factor: population standard deviation over mean of the
/// per-channel loads. Zero for an idle mesh.
pub fn load_imbalance(load: &[u64]) -> f64 {
    if load.is_empty() {
        return 0.0;
    }
    let n = load.len() as f64;
    let mean = load.iter().sum::<u64>() as f64 / n;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = load
        .iter()
        .map(|&l| (l as f64 - mean) * (l as f64 - mean))
        .sum::<f64>()
        / n;
    variance.sqrt() / mean
}
