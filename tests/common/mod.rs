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
//! Common utilities and helpers for integration tests.
#![allow(dead_code)]
#![allow(unused_imports)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use arrow::array::{Array, ArrayRef, Int64Array, ListArray, StringArray};
use arrow::datatypes::{DataType, Field, Int64Type};
use arrow::record_batch::RecordBatch;

use lateralis::exec::chunk::Chunk;
use lateralis::exec::node::{SlotDescriptor, schema_for_slots};
use lateralis::exec::operators::{
    ChunkCollectHandle, ChunkCollectSinkFactory, TableFunctionProcessorFactory,
    ValuesSourceFactory,
};
use lateralis::exec::node::TableFunctionNode;
use lateralis::exec::pipeline::executor::PipelineExecutor;
use lateralis::exec::pipeline::operator_factory::OperatorFactory;
use lateralis::lateralis_config;
use lateralis::lateralis_logging;
use lateralis::runtime::runtime_state::RuntimeState;

/// Test configuration for integration tests.
pub struct TestConfig {
    /// Temporary directory for test artifacts
    pub temp_dir: TempDir,
    /// Test config path
    pub config_path: PathBuf,
}

impl TestConfig {
    /// Create a new test configuration with default settings.
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let config_path = temp_dir.path().join("test_lateralis.toml");

        let config_content = r#"
log_level = "debug"

[runtime]
batch_size = 4096
pipeline_dop = 2

[debug]
exec_node_output = true
explode_split_max_parts = 0
"#;

        std::fs::write(&config_path, config_content)?;

        Ok(Self {
            temp_dir,
            config_path,
        })
    }

    /// Initialize logging for tests.
    pub fn init_logging(&self) {
        lateralis_logging::init_with_level("debug");
    }

    /// Load the test configuration.
    pub fn load_config(&self) -> anyhow::Result<&'static lateralis_config::LateralisConfig> {
        lateralis_config::init_from_path(&self.config_path)
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self::new().expect("Failed to create test config")
    }
}

pub fn list_type() -> DataType {
    DataType::List(Arc::new(Field::new("item", DataType::Int64, true)))
}

pub fn list_array(values: Vec<Option<Vec<i64>>>) -> ArrayRef {
    Arc::new(ListArray::from_iter_primitive::<Int64Type, _, _>(
        values
            .into_iter()
            .map(|v| v.map(|items| items.into_iter().map(Some).collect::<Vec<_>>())),
    ))
}

/// Build a chunk whose schema carries the slot ids of `slots`.
pub fn chunk_for_slots(slots: &[SlotDescriptor], columns: Vec<ArrayRef>) -> Chunk {
    let batch = RecordBatch::try_new(schema_for_slots(slots), columns).expect("record batch");
    Chunk::try_new(batch).expect("chunk")
}

/// Run `source -> lateral view -> collect` with `dop` instances.
pub fn run_lateral_view(
    node: &TableFunctionNode,
    inputs: Vec<Chunk>,
    state: Arc<RuntimeState>,
    dop: i32,
) -> Result<Vec<Chunk>, String> {
    let handle = ChunkCollectHandle::new();
    let factories: Vec<Box<dyn OperatorFactory>> = vec![
        Box::new(ValuesSourceFactory::new(inputs, 0)),
        Box::new(TableFunctionProcessorFactory::new(node)?),
        Box::new(ChunkCollectSinkFactory::new(handle.clone())),
    ];
    PipelineExecutor::new(factories, state).run(dop)?;
    Ok(handle.take_chunks())
}

pub fn int64_values(chunks: &[Chunk], col: usize) -> Vec<Option<i64>> {
    let mut out = Vec::new();
    for c in chunks {
        let arr = c.columns()[col]
            .as_any()
            .downcast_ref::<Int64Array>()
            .expect("int64 column");
        out.extend(arr.iter());
    }
    out
}

pub fn utf8_values(chunks: &[Chunk], col: usize) -> Vec<Option<String>> {
    let mut out = Vec::new();
    for c in chunks {
        let arr = c.columns()[col]
            .as_any()
            .downcast_ref::<StringArray>()
            .expect("utf8 column");
        out.extend(arr.iter().map(|v| v.map(str::to_string)));
    }
    out
}

/// Run `f` and fail the test if it does not finish within `timeout`.
pub fn run_with_timeout<F, T>(timeout: Duration, f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    use std::sync::mpsc;

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(f());
    });

    match rx.recv_timeout(timeout) {
        Ok(v) => v,
        Err(_) => panic!("test timed out after {:?}", timeout),
    }
}

/// Assert that a result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $message:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $message, e),
        }
    };
}

/// Assert that a result is Err.
#[macro_export]
macro_rules! assert_err {
    ($result:expr) => {
        match $result {
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => e,
        }
    };
}
