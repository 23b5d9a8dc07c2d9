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

//! The workload flow table and its loader.
//!
//! The trace is a CSV stream with one row per flow. The mapped endpoints
//! (`map_src`, `map_dst`) replace the logical endpoints on load, rows that
//! map a flow onto a single PE are dropped, and multicast rows (those with a
//! `captain`) are rejected since this scheduler only handles unicast flows.
//! After load the table is immutable; candidate schedules share it by
//! reference and only own their waypoint lists.

use std::{fs::File, io::Read, path::Path};

use log::{info, warn};
use serde::Deserialize;
use thiserror::Error;

/// One row of the raw input trace, before mapping and validation.
#[derive(Debug, Clone, Deserialize)]
struct TraceRecord {
    /// Tag grouping the flows of one workload layer.
    layer: String,
    /// Packet length in flits.
    flit: u64,
    /// Period between successive injections, in source clock units.
    interval: u64,
    /// Total number of injections.
    counts: u64,
    /// Placed source PE.
    map_src: usize,
    /// Placed destination PE.
    map_dst: usize,
    /// Root of a multicast tree. Multicast flows are not schedulable here.
    #[serde(default)]
    captain: Option<usize>,
}

/// A single unicast flow of the workload.
#[derive(Debug, Clone)]
pub struct Flow {
    /// Stable id; equals the row position in the table.
    pub id: usize,
    /// Tag grouping the flows of one workload layer.
    pub layer: String,
    /// Source PE.
    pub src: usize,
    /// Destination PE.
    pub dst: usize,
    /// Packet length in flits.
    pub flit: u64,
    /// Period between successive injections, in source clock units.
    pub interval: u64,
    /// Total number of injections.
    pub counts: u64,
}

/// The immutable workload: mesh geometry plus one [`Flow`] per table row.
///
/// Flows are stored in id order (`flows[i].id == i`).
#[derive(Debug, Clone)]
pub struct FlowTable {
    /// Side length of the mesh; the array has the square of this many PEs.
    pub diameter: usize,
    /// All unicast flows of the workload.
    pub flows: Vec<Flow>,
}

/// Error while loading a trace file.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be opened.
    #[error("cannot open the trace: {0}")]
    Io(#[from] std::io::Error),
    /// The stream is not a valid trace table.
    #[error("malformed trace: {0}")]
    Csv(#[from] csv::Error),
    /// A PE index does not fit on the configured mesh.
    #[error("trace row {row}: PE {pe} does not exist on a mesh with {size} PEs")]
    PeOutOfRange {
        /// Data row (0-based) of the offending record.
        row: usize,
        /// The out-of-range PE index.
        pe: usize,
        /// Number of PEs on the mesh.
        size: usize,
    },
    /// A column that must be positive is zero.
    #[error("trace row {row}: column `{column}` must be positive")]
    NonPositive {
        /// Data row (0-based) of the offending record.
        row: usize,
        /// Name of the offending column.
        column: &'static str,
    },
}

impl FlowTable {
    /// Number of PEs on the mesh.
    pub fn num_pes(&self) -> usize {
        self.diameter * self.diameter
    }

    /// Load the trace file at `path` for a mesh with side length `diameter`.
    pub fn load(path: impl AsRef<Path>, diameter: usize) -> Result<Self, LoadError> {
        let table = Self::from_reader(File::open(path.as_ref())?, diameter)?;
        info!(
            "loaded {} flows from {}",
            table.flows.len(),
            path.as_ref().display()
        );
        Ok(table)
    }

    /// Parse a trace from any CSV stream (with a header row).
    pub fn from_reader(reader: impl Read, diameter: usize) -> Result<Self, LoadError> {
        let size = diameter * diameter;
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut flows = Vec::new();
        let mut dropped = 0_usize;
        for (row, record) in rdr.deserialize().enumerate() {
            let record: TraceRecord = record?;

            if let Some(captain) = record.captain {
                warn!("trace row {row}: skipping multicast flow (captain {captain})");
                continue;
            }

            // the placement decided by the mapper replaces the logical endpoints
            let (src, dst) = (record.map_src, record.map_dst);
            if src == dst {
                dropped += 1;
                continue;
            }

            for pe in [src, dst] {
                if pe >= size {
                    return Err(LoadError::PeOutOfRange { row, pe, size });
                }
            }
            for (value, column) in [
                (record.flit, "flit"),
                (record.interval, "interval"),
                (record.counts, "counts"),
            ] {
                if value == 0 {
                    return Err(LoadError::NonPositive { row, column });
                }
            }

            flows.push(Flow {
                id: flows.len(),
                layer: record.layer,
                src,
                dst,
                flit: record.flit,
                interval: record.interval,
                counts: record.counts,
            });
        }

        if dropped > 0 {
            info!("dropped {dropped} flows mapped onto a single PE");
        }
        Ok(Self { diameter, flows })
    }
}
