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
//! Integration tests for configuration loading and config-driven execution.

use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::DataType;

use lateralis::common::config;
use lateralis::common::ids::SlotId;
use lateralis::exec::node::{SlotDescriptor, TableFunctionCall, TableFunctionNode};
use lateralis::lateralis_config::LateralisConfig;
use lateralis::lateralis_logging::info;
use lateralis::runtime::runtime_state::RuntimeState;

use crate::common::{TestConfig, chunk_for_slots, run_lateral_view, utf8_values};

mod common;

#[test]
fn test_loads_config_and_runs_with_it() {
    let test_config = TestConfig::new().expect("test config");
    test_config.init_logging();
    let cfg = assert_ok!(test_config.load_config(), "load test config");
    assert_eq!(cfg.log_level, "debug");
    assert_eq!(cfg.runtime.pipeline_dop, 2);
    assert!(cfg.debug.exec_node_output);
    assert_eq!(config::pipeline_dop(), 2);
    info!("integration config loaded from {}", test_config.config_path.display());

    let slots = vec![
        SlotDescriptor::new(1, "s", DataType::Utf8, false),
        SlotDescriptor::new(2, "sep", DataType::Utf8, false),
    ];
    let node = TableFunctionNode::new(
        1,
        slots.clone(),
        vec![TableFunctionCall::new(
            "explode_split",
            vec![SlotId::new(1), SlotId::new(2)],
            vec![DataType::Utf8, DataType::Utf8],
        )],
        vec![SlotDescriptor::new(3, "part", DataType::Utf8, false)],
    );
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(vec!["x y z"])),
        Arc::new(StringArray::from(vec![" "])),
    ];
    let input = chunk_for_slots(&slots, columns);
    let dop = i32::try_from(config::pipeline_dop()).expect("dop");
    let out = run_lateral_view(&node, vec![input], Arc::new(RuntimeState::default()), dop)
        .expect("run");
    let parts = utf8_values(&out, 2);
    assert_eq!(
        parts,
        vec![Some("x".to_string()), Some("y".to_string()), Some("z".to_string())]
    );
}

#[test]
fn test_invalid_config_is_rejected() {
    let err = assert_err!(LateralisConfig::parse("[runtime]\npipeline_dop = 0\n"));
    assert!(err.to_string().contains("pipeline_dop"), "err={err}");

    let err = assert_err!(LateralisConfig::parse("log_level = 3\n"));
    assert!(!err.to_string().is_empty());
}

#[test]
fn test_missing_config_file_reports_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent.toml");
    let err = assert_err!(LateralisConfig::load_from_file(&path));
    assert!(format!("{err:#}").contains("absent.toml"), "err={err:#}");
}
