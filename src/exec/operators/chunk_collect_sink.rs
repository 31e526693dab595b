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
//! Chunk collecting sink.
//!
//! Responsibilities:
//! - Buffers every chunk pushed by any instance into one shared handle.
//!
//! Key exported interfaces:
//! - Types: `ChunkCollectHandle`, `ChunkCollectSinkFactory`.

use std::sync::{Arc, Mutex};

use crate::exec::chunk::Chunk;

use crate::exec::pipeline::operator::{Operator, ProcessorOperator};
use crate::exec::pipeline::operator_factory::OperatorFactory;
use crate::runtime::runtime_state::RuntimeState;

/// Shared buffer of collected output chunks.
#[derive(Clone, Default)]
pub struct ChunkCollectHandle {
    inner: Arc<Mutex<Vec<Chunk>>>,
}

impl ChunkCollectHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, chunk: Chunk) -> Result<(), String> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| "chunk collect handle lock poisoned".to_string())?;
        guard.push(chunk);
        Ok(())
    }

    pub fn take_chunks(&self) -> Vec<Chunk> {
        match self.inner.lock() {
            Ok(mut guard) => guard.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        }
    }

    pub fn num_rows(&self) -> usize {
        match self.inner.lock() {
            Ok(guard) => guard.iter().map(Chunk::len).sum(),
            Err(poisoned) => poisoned.into_inner().iter().map(Chunk::len).sum(),
        }
    }
}

/// Factory for sinks appending into a [`ChunkCollectHandle`].
pub struct ChunkCollectSinkFactory {
    name: String,
    handle: ChunkCollectHandle,
}

impl ChunkCollectSinkFactory {
    pub fn new(handle: ChunkCollectHandle) -> Self {
        Self {
            name: "CHUNK_COLLECT_SINK".to_string(),
            handle,
        }
    }
}

impl OperatorFactory for ChunkCollectSinkFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, _dop: i32, driver_id: i32) -> Box<dyn Operator> {
        Box::new(ChunkCollectSinkOperator {
            name: format!("{} (driver_id={driver_id})", self.name),
            handle: self.handle.clone(),
            finished: false,
        })
    }

    fn is_sink(&self) -> bool {
        true
    }
}

struct ChunkCollectSinkOperator {
    name: String,
    handle: ChunkCollectHandle,
    finished: bool,
}

impl Operator for ChunkCollectSinkOperator {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_processor_mut(&mut self) -> Option<&mut dyn ProcessorOperator> {
        Some(self)
    }

    fn as_processor_ref(&self) -> Option<&dyn ProcessorOperator> {
        Some(self)
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

impl ProcessorOperator for ChunkCollectSinkOperator {
    fn need_input(&self) -> bool {
        !self.is_finished()
    }

    fn has_output(&self) -> bool {
        false
    }

    fn push_chunk(&mut self, _state: &RuntimeState, chunk: Chunk) -> Result<(), String> {
        if self.finished {
            return Ok(());
        }
        self.handle.push(chunk)
    }

    fn pull_chunk(&mut self, _state: &RuntimeState) -> Result<Option<Chunk>, String> {
        Ok(None)
    }

    fn set_finishing(&mut self, _state: &RuntimeState) -> Result<(), String> {
        self.finished = true;
        Ok(())
    }
}
