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
use std::env;
use std::process;
use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array, ListArray, StringArray};
use arrow::datatypes::{DataType, Field};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use arrow_buffer::{NullBuffer, OffsetBuffer, ScalarBuffer};

use lateralis::common::ids::SlotId;
use lateralis::exec::chunk::Chunk;
use lateralis::exec::node::{SlotDescriptor, TableFunctionCall, TableFunctionNode, schema_for_slots};
use lateralis::exec::operators::{
    ChunkCollectHandle, ChunkCollectSinkFactory, TableFunctionProcessorFactory,
    ValuesSourceFactory,
};
use lateralis::exec::pipeline::executor::PipelineExecutor;
use lateralis::exec::pipeline::operator_factory::OperatorFactory;
use lateralis::lateralis_config;
use lateralis::lateralis_logging::{self, info};
use lateralis::runtime::profile::RuntimeProfile;
use lateralis::runtime::runtime_state::RuntimeState;

fn tags_type() -> DataType {
    DataType::List(Arc::new(Field::new("item", DataType::Int64, true)))
}

fn child_slots() -> Vec<SlotDescriptor> {
    vec![
        SlotDescriptor::new(1, "id", DataType::Int64, false),
        SlotDescriptor::new(2, "tags", tags_type(), true),
        SlotDescriptor::new(3, "csv", DataType::Utf8, true),
        SlotDescriptor::new(4, "sep", DataType::Utf8, false),
    ]
}

/// Four rows exercising a regular list, an empty list, a NULL list and a NULL string.
fn sample_chunk() -> Result<Chunk, String> {
    let tags_values = Int64Array::from(vec![10, 20, 30]);
    let tags = ListArray::new(
        Arc::new(Field::new("item", DataType::Int64, true)),
        OffsetBuffer::new(ScalarBuffer::from(vec![0, 2, 2, 2, 3])),
        Arc::new(tags_values),
        Some(NullBuffer::from(vec![true, true, false, true])),
    );
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(vec![1, 2, 3, 4])),
        Arc::new(tags),
        Arc::new(StringArray::from(vec![Some("a,b"), Some("c"), Some("d,e"), None])),
        Arc::new(StringArray::from(vec![","; 4])),
    ];
    let batch = RecordBatch::try_new(schema_for_slots(&child_slots()), columns)
        .map_err(|e| format!("build sample batch: {e}"))?;
    Chunk::try_new(batch)
}

fn lateral_view_node() -> TableFunctionNode {
    TableFunctionNode::new(
        1,
        child_slots(),
        vec![
            TableFunctionCall::new("explode_outer", vec![SlotId::new(2)], vec![tags_type()]),
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
    .with_output_slot_ids(vec![SlotId::new(1), SlotId::new(5), SlotId::new(6)])
}

fn run_demo(dop: i32, show_profile: bool) -> Result<(), String> {
    let handle = ChunkCollectHandle::new();
    let factories: Vec<Box<dyn OperatorFactory>> = vec![
        Box::new(ValuesSourceFactory::new(vec![sample_chunk()?], 0)),
        Box::new(TableFunctionProcessorFactory::new(&lateral_view_node())?),
        Box::new(ChunkCollectSinkFactory::new(handle.clone())),
    ];
    let profile = RuntimeProfile::new("Lateral view demo");
    let executor = PipelineExecutor::new(factories, Arc::new(RuntimeState::default()))
        .with_profile(profile.clone());
    executor.run(dop)?;

    let batches = handle
        .take_chunks()
        .into_iter()
        .map(|c| c.batch)
        .collect::<Vec<_>>();
    let table = pretty_format_batches(&batches).map_err(|e| format!("format result: {e}"))?;
    println!("{table}");
    if show_profile {
        println!("{}", profile.pretty());
    }
    Ok(())
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let mut idx = 1usize;
    let mut config_path: Option<String> = None;
    let mut show_profile = false;
    while let Some(arg) = args.get(idx) {
        match arg.as_str() {
            "--config" | "-c" => {
                idx += 1;
                config_path = args.get(idx).cloned();
                if config_path.is_none() {
                    eprintln!("missing value for --config/-c");
                    process::exit(1);
                }
                idx += 1;
            }
            "--profile" => {
                show_profile = true;
                idx += 1;
            }
            "--help" | "-h" => {
                eprintln!("Usage: lateralis [--config <path>] [--profile]");
                eprintln!("  Runs a lateral view over built-in sample rows and prints the result.");
                process::exit(0);
            }
            other => {
                eprintln!("unknown arg: {other} (try --help)");
                process::exit(1);
            }
        }
    }

    let cfg = match config_path.as_deref() {
        Some(p) => match lateralis_config::init_from_path(p) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("load lateralis config failed: {e:#}");
                process::exit(1);
            }
        },
        None => lateralis_config::init_from_env_or_default()
            .unwrap_or_else(|_| lateralis_config::init_default()),
    };
    lateralis_logging::init_with_level(cfg.effective_log_filter());
    info!(
        "lateralis demo: batch_size={} pipeline_dop={}",
        cfg.runtime.batch_size, cfg.runtime.pipeline_dop
    );

    let dop = i32::try_from(cfg.runtime.pipeline_dop).unwrap_or(i32::MAX);
    if let Err(e) = run_demo(dop, show_profile) {
        eprintln!("lateral view failed: {e}");
        process::exit(1);
    }
}
