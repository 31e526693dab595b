// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
//! End-to-end lateral view tests through the pipeline executor.

use std::sync::Arc;
use std::time::Duration;

use arrow::array::{Array, ArrayRef, Int32Array, Int64Array, StringArray};
use arrow::datatypes::DataType;

use lateralis::common::ids::SlotId;
use lateralis::exec::chunk::Chunk;
use lateralis::exec::node::{SlotDescriptor, TableFunctionCall, TableFunctionNode};
use lateralis::exec::operators::TableFunctionProcessorFactory;
use lateralis::runtime::runtime_state::RuntimeState;

use crate::common::{
    chunk_for_slots, int64_values, list_array, list_type, run_lateral_view, run_with_timeout,
    utf8_values,
};

mod common;

fn tag_slots() -> Vec<SlotDescriptor> {
    vec![
        SlotDescriptor::new(1, "id", DataType::Int64, false),
        SlotDescriptor::new(2, "tags", list_type(), true),
        SlotDescriptor::new(3, "csv", DataType::Utf8, true),
        SlotDescriptor::new(4, "sep", DataType::Utf8, false),
    ]
}

fn tag_node() -> TableFunctionNode {
    TableFunctionNode::new(
        10,
        tag_slots(),
        vec![
            TableFunctionCall::new("explode_outer", vec![SlotId::new(2)], vec![list_type()]),
            TableFunctionCall::new(
                "explode_split",
                vec![SlotId::new(3), SlotId::new(4)],
                vec![DataType::Utf8, DataType::Utf8],
            ),
        ],
        vec![
            SlotDescriptor::new(5, "tag", DataType::Int64, true),
            SlotDescriptor::new(6, "part", DataType::Utf8, true),
        ],
    )
}

fn tag_chunk() -> Chunk {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(vec![1, 2, 3, 4])),
        list_array(vec![Some(vec![10, 20]), Some(vec![]), None, Some(vec![30])]),
        Arc::new(StringArray::from(vec![
            Some("a,b"),
            Some("c"),
            None,
            Some("d,,e"),
        ])),
        Arc::new(StringArray::from(vec![","; 4])),
    ];
    chunk_for_slots(&tag_slots(), columns)
}

fn number_slots() -> Vec<SlotDescriptor> {
    vec![
        SlotDescriptor::new(1, "id", DataType::Int64, false),
        SlotDescriptor::new(2, "n", DataType::Int64, true),
    ]
}

fn number_node() -> TableFunctionNode {
    TableFunctionNode::new(
        20,
        number_slots(),
        vec![TableFunctionCall::new(
            "explode_numbers",
            vec![SlotId::new(2)],
            vec![DataType::Int64],
        )],
        vec![SlotDescriptor::new(3, "v", DataType::Int32, false)],
    )
}

fn number_chunks(count: i64, rows_per_chunk: i64) -> Vec<Chunk> {
    (0..count)
        .map(|c| {
            let ids = (0..rows_per_chunk)
                .map(|r| c * rows_per_chunk + r)
                .collect::<Vec<_>>();
            let ns = ids.iter().map(|id| Some(id % 4)).collect::<Vec<_>>();
            chunk_for_slots(
                &number_slots(),
                vec![
                    Arc::new(Int64Array::from(ids)),
                    Arc::new(Int64Array::from(ns)),
                ],
            )
        })
        .collect()
}

fn id_value_pairs(chunks: &[Chunk]) -> Vec<(i64, i32)> {
    let mut out = Vec::new();
    for c in chunks {
        let ids = c.columns()[0]
            .as_any()
            .downcast_ref::<Int64Array>()
            .expect("ids");
        let vs = c.columns()[2]
            .as_any()
            .downcast_ref::<Int32Array>()
            .expect("values");
        for r in 0..c.len() {
            out.push((ids.value(r), vs.value(r)));
        }
    }
    out
}

#[test]
fn test_explode_outer_with_split() {
    let state = Arc::new(RuntimeState::default());
    let out = run_lateral_view(&tag_node(), vec![tag_chunk()], state, 1).expect("run");
    assert_eq!(
        int64_values(&out, 0),
        vec![Some(1), Some(1), Some(1), Some(1), Some(2), Some(4), Some(4), Some(4)]
    );
    assert_eq!(
        int64_values(&out, 4),
        vec![
            Some(10),
            Some(10),
            Some(20),
            Some(20),
            None,
            Some(30),
            Some(30),
            Some(30)
        ]
    );
    let parts = utf8_values(&out, 5);
    let parts = parts.iter().map(|p| p.as_deref()).collect::<Vec<_>>();
    assert_eq!(
        parts,
        vec![
            Some("a"),
            Some("b"),
            Some("a"),
            Some("b"),
            Some("c"),
            Some("d"),
            Some(""),
            Some("e")
        ]
    );
    // Pass-through columns are copied from their source row.
    assert_eq!(
        utf8_values(&out, 2)[7].as_deref(),
        Some("d,,e"),
        "csv of the last output row"
    );
}

#[test]
fn test_small_chunk_size_bounds_output() {
    let state = Arc::new(RuntimeState::with_batch_size(3));
    let out = run_lateral_view(&tag_node(), vec![tag_chunk(), tag_chunk()], state, 1)
        .expect("run");
    assert!(out.iter().all(|c| c.len() <= 3));
    assert_eq!(out.iter().map(Chunk::len).sum::<usize>(), 16);
}

#[test]
fn test_parallel_instances_cover_every_row_once() {
    let mut expected = run_with_timeout(Duration::from_secs(30), || {
        let state = Arc::new(RuntimeState::with_batch_size(7));
        let out = run_lateral_view(&number_node(), number_chunks(6, 5), state, 1).expect("run");
        id_value_pairs(&out)
    });
    let mut parallel = run_with_timeout(Duration::from_secs(30), || {
        let state = Arc::new(RuntimeState::with_batch_size(7));
        let out = run_lateral_view(&number_node(), number_chunks(6, 5), state, 3).expect("run");
        id_value_pairs(&out)
    });
    // n = id % 4 over ids 0..30
    assert_eq!(expected.len(), 43);
    expected.sort_unstable();
    parallel.sort_unstable();
    assert_eq!(expected, parallel);
}

#[test]
fn test_limit_stops_expansion() {
    let state = Arc::new(RuntimeState::with_batch_size(2));
    let node = number_node().with_limit(Some(4));
    let out = run_lateral_view(&node, number_chunks(3, 5), state, 1).expect("run");
    assert_eq!(
        id_value_pairs(&out),
        vec![(1, 0), (2, 0), (2, 1), (3, 0)]
    );
}

#[test]
fn test_zero_step_fails_and_cancels_query() {
    let slots = vec![
        SlotDescriptor::new(1, "lo", DataType::Int64, false),
        SlotDescriptor::new(2, "hi", DataType::Int64, false),
        SlotDescriptor::new(3, "step", DataType::Int64, false),
    ];
    let node = TableFunctionNode::new(
        30,
        slots.clone(),
        vec![TableFunctionCall::new(
            "generate_series",
            vec![SlotId::new(1), SlotId::new(2), SlotId::new(3)],
            vec![DataType::Int64; 3],
        )],
        vec![SlotDescriptor::new(4, "g", DataType::Int64, false)],
    );
    let input = chunk_for_slots(
        &slots,
        vec![
            Arc::new(Int64Array::from(vec![1, 1])),
            Arc::new(Int64Array::from(vec![3, 3])),
            Arc::new(Int64Array::from(vec![1, 0])),
        ],
    );
    let state = Arc::new(RuntimeState::default());
    let err = assert_err!(run_lateral_view(&node, vec![input], Arc::clone(&state), 1));
    assert!(err.contains("step size cannot equal zero"), "err={err}");
    assert!(state.is_cancelled());
    assert_eq!(state.error().as_deref(), Some(err.as_str()));
}

#[test]
fn test_cancelled_query_reports_cancellation() {
    let state = Arc::new(RuntimeState::default());
    state.cancel();
    let err = assert_err!(run_lateral_view(&tag_node(), vec![tag_chunk()], state, 2));
    assert!(err.contains("cancelled"), "err={err}");
}

#[test]
fn test_unsupported_function_is_rejected() {
    let node = TableFunctionNode::new(
        40,
        tag_slots(),
        vec![TableFunctionCall::new(
            "explode_map",
            vec![SlotId::new(2)],
            vec![list_type()],
        )],
        vec![SlotDescriptor::new(5, "v", DataType::Int64, true)],
    );
    let err = assert_err!(TableFunctionProcessorFactory::new(&node).map(|_| ()));
    assert!(err.contains("unsupported table function"), "err={err}");
}
