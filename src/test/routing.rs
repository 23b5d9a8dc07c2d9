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

//! Test the dimension-order router.

use pretty_assertions_sorted::assert_eq;
use test_log::test;

use crate::routing::{Channel, Port, RouteError, XYRouter};

fn ch(router: usize, port: Port) -> Channel {
    Channel { router, port }
}

#[test]
fn east_then_south() {
    let router = XYRouter::new(4);
    assert_eq!(
        router.path(0, 5).unwrap(),
        vec![ch(0, Port::East), ch(1, Port::South), ch(5, Port::Output)]
    );
}

#[test]
fn west_then_north() {
    let router = XYRouter::new(4);
    assert_eq!(
        router.path(5, 0).unwrap(),
        vec![ch(5, Port::West), ch(4, Port::North), ch(0, Port::Output)]
    );
}

#[test]
fn same_node_is_rejected() {
    let router = XYRouter::new(4);
    assert_eq!(router.path(3, 3), Err(RouteError::SameNode(3)));
}

#[test]
fn same_row_only_walks_east() {
    let router = XYRouter::new(4);
    assert_eq!(
        router.path(4, 7).unwrap(),
        vec![
            ch(4, Port::East),
            ch(5, Port::East),
            ch(6, Port::East),
            ch(7, Port::Output)
        ]
    );
}

#[test]
fn same_column_only_walks_south() {
    let router = XYRouter::new(4);
    assert_eq!(
        router.path(1, 13).unwrap(),
        vec![
            ch(1, Port::South),
            ch(5, Port::South),
            ch(9, Port::South),
            ch(13, Port::Output)
        ]
    );
}

/// Every path on a 5x5 mesh is a neighbour walk from src to dst of minimal
/// length, ejecting exactly once at the destination.
#[test]
fn path_shape() {
    let n = 5_usize;
    let router = XYRouter::new(n);
    for src in 0..n * n {
        for dst in 0..n * n {
            if src == dst {
                continue;
            }
            let path = router.path(src, dst).unwrap();

            let row_delta = (src / n).abs_diff(dst / n);
            let col_delta = (src % n).abs_diff(dst % n);
            assert_eq!(path.len(), row_delta + col_delta + 1);

            assert_eq!(path.first().unwrap().router, src);
            assert_eq!(path.last().unwrap().router, dst);
            assert_eq!(path.last().unwrap().port, Port::Output);
            assert!(path[..path.len() - 1]
                .iter()
                .all(|c| c.port != Port::Output));

            for hop in path.windows(2) {
                let step = (hop[1].router as isize - hop[0].router as isize).unsigned_abs();
                assert!(step == 1 || step == n, "{src} -> {dst}: step {step}");
            }
        }
    }
}
