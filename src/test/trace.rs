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

//! Test the trace loader.

use pretty_assertions_sorted::assert_eq;
use test_log::test;

use crate::trace::{FlowTable, LoadError};

#[test]
fn load_maps_and_filters() {
    let csv = "\
layer,src,dst,flit,interval,counts,map_src,map_dst,captain,epfl
l1,0,1,2,10,3,0,5,,
l1,1,2,2,10,3,6,6,,
l2,2,3,1,4,2,3,12,,7
l3,3,4,1,4,2,1,2,9,
";
    let table = FlowTable::from_reader(csv.as_bytes(), 4).unwrap();

    // the self-mapped flow and the multicast flow are gone
    assert_eq!(table.flows.len(), 2);

    // the mapped endpoints replace the logical ones
    assert_eq!(table.flows[0].id, 0);
    assert_eq!(table.flows[0].src, 0);
    assert_eq!(table.flows[0].dst, 5);
    assert_eq!(table.flows[0].layer, "l1");

    assert_eq!(table.flows[1].id, 1);
    assert_eq!(table.flows[1].src, 3);
    assert_eq!(table.flows[1].dst, 12);
}

#[test]
fn optional_columns_may_be_absent() {
    let csv = "\
layer,src,dst,flit,interval,counts,map_src,map_dst
l1,0,1,2,10,3,0,5
";
    let table = FlowTable::from_reader(csv.as_bytes(), 4).unwrap();
    assert_eq!(table.flows.len(), 1);
}

#[test]
fn out_of_range_pe_fails_the_load() {
    let csv = "\
layer,src,dst,flit,interval,counts,map_src,map_dst
l1,0,1,2,10,3,0,99
";
    let err = FlowTable::from_reader(csv.as_bytes(), 4).unwrap_err();
    assert!(matches!(
        err,
        LoadError::PeOutOfRange {
            row: 0,
            pe: 99,
            size: 16
        }
    ));
}

#[test]
fn zero_interval_fails_the_load() {
    let csv = "\
layer,src,dst,flit,interval,counts,map_src,map_dst
l1,0,1,2,10,3,0,5
l2,0,1,2,0,3,2,5
";
    let err = FlowTable::from_reader(csv.as_bytes(), 4).unwrap_err();
    assert!(matches!(
        err,
        LoadError::NonPositive {
            row: 1,
            column: "interval"
        }
    ));
}
