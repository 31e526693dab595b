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
//! Table-function processor.
//!
//! Responsibilities:
//! - Expands each input row into the cross product of its table-function results, filling
//!   output chunks up to the runtime chunk size and resuming mid-row across pulls.
//! - Defers pass-through column copies: values of one input row are appended once per run of
//!   emitted combinations instead of once per output row.
//! - Applies residual conjuncts and an optional row limit to every expanded chunk.
//!
//! Key exported interfaces:
//! - Types: `TableFunctionProcessorFactory`.
//!
//! Current limitations:
//! - Generators are evaluated row by row; there is no whole-chunk fast path for a single
//!   function.

use std::sync::Arc;

use super::table_function_shared::TableFunctionShared;
use super::table_function_stack::{RollPoint, TableFunctionStack};
use crate::common::config;
use crate::exec::chunk::{Chunk, ColumnBuilder};
use crate::exec::expr::filter_chunk;
use crate::exec::node::TableFunctionNode;
use crate::exec::pipeline::operator::{Operator, ProcessorOperator};
use crate::exec::pipeline::operator_factory::OperatorFactory;
use crate::lateralis_logging::debug;
use crate::runtime::profile::{CounterRef, CounterUnit, OperatorProfiles, ScopedTimer};
use crate::runtime::runtime_state::RuntimeState;

/// Factory for lateral-view processors; validates the plan node once and shares the result.
pub struct TableFunctionProcessorFactory {
    name: String,
    shared: Arc<TableFunctionShared>,
    debug_output: bool,
}

impl TableFunctionProcessorFactory {
    pub fn new(node: &TableFunctionNode) -> Result<Self, String> {
        let shared = TableFunctionShared::new(node)?;
        let name = if shared.node_id() >= 0 {
            format!("TableFunction (id={})", shared.node_id())
        } else {
            "TableFunction".to_string()
        };
        Ok(Self {
            name,
            shared: Arc::new(shared),
            debug_output: config::debug_exec_node_output(),
        })
    }

    pub fn output_schema(&self) -> arrow::datatypes::SchemaRef {
        self.shared.output_schema()
    }
}

impl OperatorFactory for TableFunctionProcessorFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, _dop: i32, driver_id: i32) -> Box<dyn Operator> {
        Box::new(TableFunctionProcessorOperator {
            name: self.name.clone(),
            driver_id,
            shared: Arc::clone(&self.shared),
            stack: None,
            child_chunk: None,
            pass_through_sources: Vec::new(),
            cur_child_offset: None,
            current_row_insert_times: 0,
            child_eos: false,
            finished: false,
            rows_returned: 0,
            debug_output: self.debug_output,
            counters: None,
        })
    }
}

struct TableFunctionCounters {
    init_time: CounterRef,
    process_rows_time: CounterRef,
    filter_time: CounterRef,
    rows_returned: CounterRef,
}

/// Per-instance expansion state.
///
/// `cur_child_offset` is the bound row of `child_chunk`; `None` means a new input chunk is
/// needed. `current_row_insert_times` counts output rows emitted for the bound row whose
/// pass-through values have not been copied yet. `pass_through_sources` pairs each needed
/// output position with its column in `child_chunk`, resolved by slot id.
struct TableFunctionProcessorOperator {
    name: String,
    driver_id: i32,
    shared: Arc<TableFunctionShared>,
    stack: Option<TableFunctionStack>,
    child_chunk: Option<Chunk>,
    pass_through_sources: Vec<(usize, usize)>,
    cur_child_offset: Option<usize>,
    current_row_insert_times: usize,
    child_eos: bool,
    finished: bool,
    rows_returned: usize,
    debug_output: bool,
    counters: Option<TableFunctionCounters>,
}

impl TableFunctionProcessorOperator {
    fn timer(counter: Option<&CounterRef>) -> Option<ScopedTimer> {
        counter.map(|c| ScopedTimer::new(Arc::clone(c)))
    }

    fn ensure_stack(&mut self) -> Result<(), String> {
        if self.stack.is_some() {
            return Ok(());
        }
        let _timer = Self::timer(self.counters.as_ref().map(|c| &c.init_time));
        let mut stack = TableFunctionStack::new(self.shared.create_functions())?;
        stack
            .prepare_and_open()
            .map_err(|e| format!("{}: {e}", self.name))?;
        debug!(
            "{} driver_id={} opened {} table functions",
            self.name,
            self.driver_id,
            self.shared.fn_num()
        );
        self.stack = Some(stack);
        Ok(())
    }

    fn stack_mut(&mut self) -> Result<&mut TableFunctionStack, String> {
        let name = &self.name;
        self.stack
            .as_mut()
            .ok_or_else(|| format!("{name}: table functions are not prepared"))
    }

    /// Move to the next input row, or release the chunk when it is fully consumed.
    fn process_next_child_row(&mut self) -> Result<(), String> {
        let _timer = Self::timer(self.counters.as_ref().map(|c| &c.process_rows_time));
        let rows = self.child_chunk.as_ref().map_or(0, Chunk::len);
        let next = self.cur_child_offset.map_or(0, |o| o + 1);
        if next >= rows {
            self.stack_mut()?.process_close();
            self.child_chunk = None;
            self.cur_child_offset = None;
            return Ok(());
        }
        self.stack_mut()?.bind_row(next)?;
        self.cur_child_offset = Some(next);
        Ok(())
    }

    /// Append the bound row's needed pass-through values for every pending output row.
    fn copy_output_slots(&mut self, columns: &mut [ColumnBuilder]) -> Result<(), String> {
        if self.current_row_insert_times == 0 {
            return Ok(());
        }
        let (Some(chunk), Some(row)) = (self.child_chunk.as_ref(), self.cur_child_offset) else {
            return Err(format!(
                "{}: {} pending rows without a bound input row",
                self.name, self.current_row_insert_times
            ));
        };
        for &(out_idx, src_idx) in &self.pass_through_sources {
            let src = chunk.columns().get(src_idx).ok_or_else(|| {
                format!(
                    "{}: input chunk has {} columns, pass-through column {} missing",
                    self.name,
                    chunk.columns().len(),
                    src_idx
                )
            })?;
            columns[out_idx].append_many_from(src, row, self.current_row_insert_times)?;
        }
        self.current_row_insert_times = 0;
        Ok(())
    }

    /// Locate each needed pass-through slot in `chunk` by slot id.
    fn resolve_pass_through_sources(&self, chunk: &Chunk) -> Result<Vec<(usize, usize)>, String> {
        self.shared
            .needed_child_indices()
            .iter()
            .map(|&idx| {
                let slot = self.shared.child_slot(idx).ok_or_else(|| {
                    format!("{}: pass-through position {idx} has no child slot", self.name)
                })?;
                let src_idx = chunk.column_index(slot.id).ok_or_else(|| {
                    format!(
                        "{}: input chunk is missing pass-through slot {}",
                        self.name, slot.id
                    )
                })?;
                Ok((idx, src_idx))
            })
            .collect()
    }

    /// Fill one output chunk of at most `chunk_size` rows (before filtering) and report
    /// whether the stream is complete.
    fn get_expanded_chunk(&mut self, state: &RuntimeState) -> Result<(Chunk, bool), String> {
        let batch_size = state.chunk_size();
        let child_count = self.shared.child_slot_count();
        let mut columns = self.shared.new_column_builders();

        while columns[child_count].len() < batch_size {
            if state.is_cancelled() {
                return Err(format!("{}: query cancelled", self.name));
            }
            if self.child_chunk.as_ref().is_none_or(Chunk::is_empty) {
                break;
            }

            let mut skip_child_row = false;
            while columns[child_count].len() < batch_size {
                let roll_point = self.stack_mut()?.find_roll_point();
                if roll_point == RollPoint::AllExhausted || skip_child_row {
                    self.copy_output_slots(&mut columns)?;
                    self.process_next_child_row()?;
                    if self.cur_child_offset.is_none() {
                        break;
                    }
                } else if let RollPoint::At(idx) = roll_point {
                    if !self.stack_mut()?.roll(idx) {
                        continue;
                    }
                }

                skip_child_row = self.stack_mut()?.is_inner_and_empty();
                if skip_child_row {
                    continue;
                }

                let remaining = batch_size - columns[child_count].len();
                let repeat = self
                    .stack_mut()?
                    .emit(&mut columns[child_count..], remaining)?;
                self.current_row_insert_times += repeat;
            }
        }

        self.copy_output_slots(&mut columns)?;

        let num_rows = columns[child_count].len();
        for &idx in self.shared.useless_child_indices() {
            let missing = num_rows.saturating_sub(columns[idx].len());
            columns[idx].append_many_defaults(missing)?;
        }

        let arrays = columns
            .iter_mut()
            .map(ColumnBuilder::finish)
            .collect::<Result<Vec<_>, _>>()?;
        let chunk = Chunk::try_from_columns(self.shared.output_schema(), arrays, num_rows)
            .map_err(|e| format!("{}: {e}", self.name))?;

        let chunk = {
            let _timer = Self::timer(self.counters.as_ref().map(|c| &c.filter_time));
            filter_chunk(self.shared.arena(), self.shared.conjuncts(), chunk)
                .map_err(|e| format!("{}: {e}", self.name))?
        };

        let eos = self.child_eos && self.cur_child_offset.is_none();
        Ok((chunk, eos))
    }

    /// Truncate `chunk` to the remaining limit; marks the operator finished once reached.
    fn apply_limit(&mut self, chunk: Chunk) -> Result<Chunk, String> {
        let Some(limit) = self.shared.limit() else {
            self.rows_returned += chunk.len();
            return Ok(chunk);
        };
        let remaining = limit.saturating_sub(self.rows_returned);
        let chunk = if chunk.len() > remaining {
            chunk.slice(0, remaining)
        } else {
            chunk
        };
        self.rows_returned += chunk.len();
        if self.rows_returned >= limit {
            debug!(
                "{} driver_id={} reached limit {}",
                self.name, self.driver_id, limit
            );
            if self.child_chunk.take().is_some() {
                self.stack_mut()?.process_close();
            }
            self.cur_child_offset = None;
            self.current_row_insert_times = 0;
            self.finished = true;
        }
        Ok(chunk)
    }
}

impl Operator for TableFunctionProcessorOperator {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_profiles(&mut self, profiles: OperatorProfiles) {
        let fn_names = self
            .shared
            .fn_descs()
            .iter()
            .map(|d| d.function_name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        profiles.operator.add_info_string("TableFunctions", fn_names);
        self.counters = Some(TableFunctionCounters {
            init_time: profiles.unique.add_timer("InitTableFunctionTime"),
            process_rows_time: profiles.unique.add_timer("ProcessRowsTime"),
            filter_time: profiles.unique.add_timer("FilterTime"),
            rows_returned: profiles
                .common
                .add_counter("RowsReturned", CounterUnit::Unit),
        });
    }

    fn prepare(&mut self) -> Result<(), String> {
        self.ensure_stack()
    }

    fn close(&mut self) -> Result<(), String> {
        if let Some(mut stack) = self.stack.take() {
            if self.child_chunk.take().is_some() {
                stack.process_close();
            }
            stack.close().map_err(|e| format!("{}: {e}", self.name))?;
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn as_processor_mut(&mut self) -> Option<&mut dyn ProcessorOperator> {
        Some(self)
    }

    fn as_processor_ref(&self) -> Option<&dyn ProcessorOperator> {
        Some(self)
    }
}

impl ProcessorOperator for TableFunctionProcessorOperator {
    fn need_input(&self) -> bool {
        !self.finished && !self.child_eos && self.child_chunk.is_none()
    }

    fn has_output(&self) -> bool {
        !self.finished && self.child_chunk.is_some()
    }

    fn push_chunk(&mut self, _state: &RuntimeState, chunk: Chunk) -> Result<(), String> {
        if self.finished {
            return Ok(());
        }
        if self.child_chunk.is_some() {
            return Err(format!(
                "{}: received input while the previous chunk is still expanding",
                self.name
            ));
        }
        self.ensure_stack()?;
        let sources = self.resolve_pass_through_sources(&chunk)?;
        {
            let _timer = Self::timer(self.counters.as_ref().map(|c| &c.process_rows_time));
            self.stack_mut()?.process_init(&chunk)?;
        }
        self.child_chunk = Some(chunk);
        self.pass_through_sources = sources;
        self.cur_child_offset = None;
        self.current_row_insert_times = 0;
        self.process_next_child_row()
    }

    fn pull_chunk(&mut self, state: &RuntimeState) -> Result<Option<Chunk>, String> {
        if self.finished {
            return Ok(None);
        }
        let (chunk, eos) = self.get_expanded_chunk(state)?;
        if eos {
            self.finished = true;
        }
        let chunk = self.apply_limit(chunk)?;
        if let Some(c) = self.counters.as_ref() {
            c.rows_returned.add(chunk.len() as i64);
        }
        if self.debug_output {
            debug!(
                "{} driver_id={} output rows={} eos={}",
                self.name,
                self.driver_id,
                chunk.len(),
                self.finished
            );
        }
        if chunk.is_empty() {
            return Ok(None);
        }
        Ok(Some(chunk))
    }

    fn set_finishing(&mut self, _state: &RuntimeState) -> Result<(), String> {
        self.child_eos = true;
        if self.child_chunk.is_none() {
            self.finished = true;
        }
        Ok(())
    }
}
