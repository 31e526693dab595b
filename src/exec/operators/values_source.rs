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
//! VALUES source operator.
//!
//! Responsibilities:
//! - Produces a fixed list of chunks as pipeline input.
//! - Deals chunks round-robin across parallel instances so every chunk is emitted exactly once.
//!
//! Key exported interfaces:
//! - Types: `ValuesSourceFactory`.

use std::collections::VecDeque;

use crate::exec::chunk::Chunk;

use crate::exec::pipeline::operator::{Operator, ProcessorOperator};
use crate::exec::pipeline::operator_factory::OperatorFactory;
use crate::runtime::runtime_state::RuntimeState;

/// Factory for VALUES source operators that emit pre-built chunks.
pub struct ValuesSourceFactory {
    name: String,
    chunks: Vec<Chunk>,
}

impl ValuesSourceFactory {
    pub fn new(chunks: Vec<Chunk>, node_id: i32) -> Self {
        let name = if node_id >= 0 {
            format!("ValuesSource (id={node_id})")
        } else {
            "ValuesSource".to_string()
        };
        Self { name, chunks }
    }
}

impl OperatorFactory for ValuesSourceFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, dop: i32, driver_id: i32) -> Box<dyn Operator> {
        let dop = dop.max(1) as usize;
        let driver_id = driver_id.max(0) as usize;
        let pending = self
            .chunks
            .iter()
            .enumerate()
            .filter(|(i, _)| i % dop == driver_id)
            .map(|(_, c)| c.clone())
            .collect();
        Box::new(ValuesSourceOperator {
            name: self.name.clone(),
            pending,
        })
    }

    fn is_source(&self) -> bool {
        true
    }
}

struct ValuesSourceOperator {
    name: String,
    pending: VecDeque<Chunk>,
}

impl Operator for ValuesSourceOperator {
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
        self.pending.is_empty()
    }
}

impl ProcessorOperator for ValuesSourceOperator {
    fn need_input(&self) -> bool {
        false
    }

    fn has_output(&self) -> bool {
        !self.is_finished()
    }

    fn push_chunk(&mut self, _state: &RuntimeState, _chunk: Chunk) -> Result<(), String> {
        Err("values source operator does not accept input".to_string())
    }

    fn pull_chunk(&mut self, _state: &RuntimeState) -> Result<Option<Chunk>, String> {
        while let Some(chunk) = self.pending.pop_front() {
            if !chunk.is_empty() {
                return Ok(Some(chunk));
            }
        }
        Ok(None)
    }

    fn set_finishing(&mut self, _state: &RuntimeState) -> Result<(), String> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ids::SlotId;
    use crate::exec::chunk::field_with_slot_id;
    use arrow::array::Int32Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    fn chunk(values: Vec<i32>) -> Chunk {
        let schema = Arc::new(Schema::new(vec![field_with_slot_id(
            Field::new("v", DataType::Int32, false),
            SlotId::new(1),
        )]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(values))]).expect("batch");
        Chunk::try_new(batch).expect("chunk")
    }

    fn drain(factory: &ValuesSourceFactory, dop: i32, driver_id: i32) -> Vec<usize> {
        let state = RuntimeState::default();
        let mut op = factory.create(dop, driver_id);
        let source = op.as_processor_mut().expect("processor");
        let mut lens = Vec::new();
        while source.has_output() {
            if let Some(c) = source.pull_chunk(&state).expect("pull") {
                lens.push(c.len());
            }
        }
        lens
    }

    #[test]
    fn deals_chunks_round_robin() {
        let factory = ValuesSourceFactory::new(
            vec![chunk(vec![1]), chunk(vec![2, 3]), chunk(vec![4, 5, 6])],
            0,
        );
        assert_eq!(factory.name(), "ValuesSource (id=0)");
        assert_eq!(drain(&factory, 2, 0), vec![1, 3]);
        assert_eq!(drain(&factory, 2, 1), vec![2]);
        assert_eq!(drain(&factory, 1, 0), vec![1, 2, 3]);
    }

    #[test]
    fn skips_empty_chunks() {
        let factory = ValuesSourceFactory::new(vec![chunk(vec![]), chunk(vec![7])], -1);
        assert_eq!(factory.name(), "ValuesSource");
        assert_eq!(drain(&factory, 1, 0), vec![1]);
    }
}
