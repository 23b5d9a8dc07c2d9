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

//! # Weaver: compile-time traffic scheduling for mesh NoC accelerators
//!
//! Weaver searches for a spatial and temporal arrangement of the periodic
//! communication flows of an accelerator workload on a 2D mesh, such that the
//! worst-case per-layer slowdown under deterministic XY wormhole routing is
//! minimized. Flows are routed over forced detours (*waypoints*); an
//! evolutionary search mutates the waypoint lists and evaluates each candidate
//! with an analytical contention model, the *injection harmonizer*.
//!
//! ## Structure
//! The source code of this program is structured as follows:
//! - The module [`routing`] implements the deterministic XY path router that
//!   maps a pair of processing elements to an ordered sequence of channel
//!   reservations.
//! - The module [`trace`] defines the workload flow table
//!   ([`trace::FlowTable`]) and its loader.
//! - The module [`harmonizer`] contains the greedy injection scheduler that
//!   computes the steady-state injection delay of every flow
//!   ([`harmonizer::Harmonizer`]).
//! - The module [`individual`] defines one candidate schedule
//!   ([`individual::Individual`]), its genetic operators, the quantile-based
//!   score, and the shared best-so-far record ([`individual::BestTracker`]).
//! - The module [`evolution`] drives the parallel generational search
//!   ([`evolution::EvolutionController`]).
//! - The module [`report`] writes the best schedule and its summary metrics
//!   to disk.

#![deny(
    missing_docs,
    clippy::missing_docs_in_private_items,
    missing_debug_implementations,
    rust_2018_idioms
)]

pub mod evolution;
pub mod harmonizer;
pub mod individual;
pub mod report;
pub mod routing;
pub mod trace;
#[cfg(test)]
mod test;

pub use evolution::{EvolutionConfig, EvolutionController, SearchOutcome};
pub use individual::{BestSchedule, BestTracker, Individual};
pub use trace::FlowTable;
