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

//! The injection harmonizer: a greedy, conservative contention model.
//!
//! Each flow periodically injects a wormhole packet that holds every channel
//! of its path for the duration of the packet plus the pipeline depth up to
//! that channel. The harmonizer replays all injections in earliest-ready
//! order against a per-channel reservation table and accumulates, per flow,
//! the slack between the ideal periodic schedule and the achieved one. It is
//! an analytical proxy, not a cycle-accurate simulation: a packet either
//! issues (all its channels are free) or is pushed back to the release time
//! of the busiest channel.

use log::{debug, info};

use crate::routing::PORTS_PER_ROUTER;

/// Mutable per-flow state during one harmonizer run.
#[derive(Debug, Clone)]
pub struct WorkFlow {
    /// Stable id of the flow in the table.
    pub id: usize,
    /// Packet length in flits.
    pub flit: u64,
    /// Period between successive injections.
    pub interval: u64,
    /// Iterations to simulate (fixed reference copy of the initial count).
    pub total: u64,
    /// Remaining iterations; decremented on every counted injection.
    pub count: u64,
    /// Next scheduled injection clock.
    pub issue_time: u64,
    /// Accumulated slack in clock units, clamped to be non-negative.
    pub delay: i64,
    /// Global channel indices along the flow's path, in path order.
    pub path_ids: Vec<usize>,
    /// Whether the flow still has iterations to place.
    pub unsolved: bool,
}

impl WorkFlow {
    /// Fresh working state for a flow that simulates `count` iterations.
    pub fn new(id: usize, flit: u64, interval: u64, count: u64, path_ids: Vec<usize>) -> Self {
        Self {
            id,
            flit,
            interval,
            total: count,
            count,
            issue_time: 0,
            delay: 0,
            path_ids,
            unsolved: true,
        }
    }
}

/// Assign every flow its initial issue time.
///
/// Flows are ordered by ascending interval so that the greedy selector of the
/// harmonizer serves short-period flows first on ties, which reduces their
/// starvation. All issue times start at zero.
pub fn temporal_map(flows: &mut [WorkFlow]) {
    flows.sort_by_key(|f| f.interval);
    for flow in flows.iter_mut() {
        flow.issue_time = 0;
    }
}

/// Per-channel reservation table for one harmonizer run.
#[derive(Debug)]
pub struct Harmonizer {
    /// Clock at which the current reservation of each channel started.
    grab_start: Vec<u64>,
    /// Clock at which each channel becomes free again.
    grab_end: Vec<u64>,
    /// Log progress every 500 loop iterations.
    verbose: bool,
}

impl Harmonizer {
    /// Create a reservation table for a mesh with the given side length.
    pub fn new(diameter: usize, verbose: bool) -> Self {
        let channels = diameter * diameter * PORTS_PER_ROUTER;
        Self {
            grab_start: vec![0; channels],
            grab_end: vec![0; channels],
            verbose,
        }
    }

    /// Reservation window `(grab_start, grab_end)` of one channel.
    pub(crate) fn reservation(&self, channel: usize) -> (u64, u64) {
        (self.grab_start[channel], self.grab_end[channel])
    }

    /// Replay all injections until every flow has placed its iterations.
    ///
    /// On return, every flow has `count == 0` and `unsolved == false`. The
    /// flow's `issue_time` is the clock of the injection after its last
    /// counted one (`total * interval` when it never contended), and `delay`
    /// holds the accumulated slack over all counted injections.
    pub fn run(&mut self, flows: &mut [WorkFlow]) {
        let mut iterations = 0_u64;
        loop {
            // earliest-ready unsolved flow; ties fall back to table order
            let Some(selected) = flows
                .iter()
                .enumerate()
                .filter(|(_, f)| f.unsolved)
                .min_by_key(|(idx, f)| (f.issue_time, *idx))
                .map(|(idx, _)| idx)
            else {
                break;
            };

            iterations += 1;
            if self.verbose && iterations % 500 == 0 {
                let remaining = flows.iter().filter(|f| f.unsolved).count();
                info!("iteration {iterations}: {remaining} flows remaining");
            }

            let flow = &mut flows[selected];
            let wait_until = flow
                .path_ids
                .iter()
                .map(|&c| self.grab_end[c])
                .max()
                .unwrap_or(0);

            if flow.issue_time < wait_until {
                // contention: push the injection back, consume no iteration
                flow.issue_time = wait_until;
                continue;
            }

            // all channels are free: reserve the path. Channel k is released
            // once the tail flit has drained through it.
            for (k, &channel) in flow.path_ids.iter().enumerate() {
                self.grab_start[channel] = flow.issue_time;
                self.grab_end[channel] = flow.issue_time + flow.flit + k as u64 + 1;
            }

            // The pre-decrement count decides termination: after the last
            // counted injection the flow books one more reservation round
            // before it is marked solved.
            if flow.count == 0 {
                flow.unsolved = false;
            } else {
                flow.count -= 1;
                let completed = flow.total - flow.count;
                let span = flow.flit + flow.path_ids.len() as u64;
                flow.delay = (flow.delay + (span + flow.issue_time) as i64
                    - (completed * flow.interval) as i64)
                    .max(0);
                flow.issue_time += flow.interval;
            }
        }
        debug!("harmonizer finished after {iterations} iterations");
    }
}
