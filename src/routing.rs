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

//! Deterministic XY path routing on the 2D mesh.
//!
//! A processing element (PE) `i` on an `n x n` mesh sits at row `i / n` and
//! column `i % n`. Dimension-order routing resolves the column offset first
//! (X phase), then the row offset (Y phase), so a (src, dst) pair always maps
//! to the same ordered sequence of [`Channel`] reservations.

use thiserror::Error;

/// Number of ports per router; [`Channel::index`] uses this as its stride.
pub const PORTS_PER_ROUTER: usize = 6;

/// One of the six router ports. The integer encoding is fixed and is part of
/// the channel indexing scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(usize)]
pub enum Port {
    /// Injection port from the local PE.
    Input = 0,
    /// Ejection port towards the local PE.
    Output = 1,
    /// Link to the router one row above.
    North = 2,
    /// Link to the router one row below.
    South = 3,
    /// Link to the router one column to the left.
    West = 4,
    /// Link to the router one column to the right.
    East = 5,
}

impl Port {
    /// The fixed integer encoding of this port.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// A single channel reservation: the output `port` of `router`. A path is an
/// ordered sequence of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channel {
    /// Router (equivalently, PE) index on the mesh.
    pub router: usize,
    /// Output port taken at that router.
    pub port: Port,
}

impl Channel {
    /// Global index of this channel among all `6 n^2` channels of the mesh.
    pub fn index(self) -> usize {
        self.router * PORTS_PER_ROUTER + self.port.index()
    }
}

/// Error returned when a path cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RouteError {
    /// A flow from a PE to itself has no path.
    #[error("cannot route from PE {0} to itself")]
    SameNode(usize),
    /// Two consecutive routers of a path are not mesh neighbours. The XY
    /// algorithm never produces such a step on its own; hitting this variant
    /// means the caller handed over a corrupt milestone sequence.
    #[error("PEs {0} and {1} are not neighbours")]
    NotNeighbours(usize, usize),
}

/// Deterministic dimension-order router for an `n x n` mesh.
#[derive(Debug, Clone, Copy)]
pub struct XYRouter {
    /// Side length `n` of the mesh.
    diameter: usize,
}

impl XYRouter {
    /// Create a router for a mesh with the given side length.
    pub fn new(diameter: usize) -> Self {
        Self { diameter }
    }

    /// Compute the path from `src` to `dst` as a sequence of channel
    /// reservations. The X offset is resolved before the Y offset; the final
    /// entry is always the [`Port::Output`] of the destination router.
    pub fn path(&self, src: usize, dst: usize) -> Result<Vec<Channel>, RouteError> {
        if src == dst {
            return Err(RouteError::SameNode(src));
        }
        let n = self.diameter;
        let (src_row, src_col) = (src / n, src % n);
        let (dst_row, dst_col) = (dst / n, dst % n);

        let mut routers = Vec::with_capacity(
            src_row.abs_diff(dst_row) + src_col.abs_diff(dst_col) + 1,
        );
        // X phase: walk along the source row towards the destination column.
        let mut col = src_col;
        while col != dst_col {
            routers.push(src_row * n + col);
            col = if col < dst_col { col + 1 } else { col - 1 };
        }
        // Y phase: walk along the destination column towards the destination row.
        let mut row = src_row;
        while row != dst_row {
            routers.push(row * n + dst_col);
            row = if row < dst_row { row + 1 } else { row - 1 };
        }
        routers.push(dst);

        let mut path = Vec::with_capacity(routers.len());
        for hop in routers.windows(2) {
            path.push(Channel {
                router: hop[0],
                port: self.out_port(hop[0], hop[1])?,
            });
        }
        path.push(Channel {
            router: dst,
            port: Port::Output,
        });
        Ok(path)
    }

    /// Output port of `from` that leads to its neighbour `to`.
    fn out_port(&self, from: usize, to: usize) -> Result<Port, RouteError> {
        let bias = to as isize - from as isize;
        let n = self.diameter as isize;
        if bias == 1 {
            Ok(Port::East)
        } else if bias == -1 {
            Ok(Port::West)
        } else if bias == n {
            Ok(Port::South)
        } else if bias == -n {
            Ok(Port::North)
        } else {
            Err(RouteError::NotNeighbours(from, to))
        }
    }
}
