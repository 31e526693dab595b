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
//! Generator stack controller for multi-function lateral views.
//!
//! Responsibilities:
//! - Enumerates the cross product of N bound generators like a mixed-radix counter, with the
//!   last generator as the least significant digit.
//! - Locates the roll point, carries into the next non-exhausted generator and rewinds the
//!   generators to its right.
//! - Detects combinations voided by an empty non-outer generator.
//!
//! Key exported interfaces:
//! - Types: `TableFunctionStack`, `RollPoint`.

use crate::exec::chunk::{Chunk, ColumnBuilder};
use crate::exec::table_function::TableFunction;

/// Where the exhausted suffix of the stack begins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RollPoint {
    /// Every generator is exhausted; the bound row is fully enumerated.
    AllExhausted,
    /// The last generator still has values.
    NoneExhausted,
    /// Generators `idx..N` are exhausted and generator `idx - 1` is not.
    At(usize),
}

pub(crate) struct TableFunctionStack {
    fns: Vec<Box<dyn TableFunction>>,
}

impl TableFunctionStack {
    pub(crate) fn new(fns: Vec<Box<dyn TableFunction>>) -> Result<Self, String> {
        if fns.is_empty() {
            return Err("table function stack requires at least one function".to_string());
        }
        Ok(Self { fns })
    }

    pub(crate) fn prepare_and_open(&mut self) -> Result<(), String> {
        for f in self.fns.iter_mut() {
            f.prepare()
                .map_err(|e| format!("prepare table function {} failed: {e}", f.name()))?;
            f.open()
                .map_err(|e| format!("open table function {} failed: {e}", f.name()))?;
        }
        Ok(())
    }

    pub(crate) fn process_init(&mut self, chunk: &Chunk) -> Result<(), String> {
        for f in self.fns.iter_mut() {
            f.process_init(chunk)?;
        }
        Ok(())
    }

    pub(crate) fn bind_row(&mut self, row: usize) -> Result<(), String> {
        for f in self.fns.iter_mut() {
            f.bind(row)?;
        }
        Ok(())
    }

    pub(crate) fn process_close(&mut self) {
        for f in self.fns.iter_mut() {
            f.process_close();
        }
    }

    pub(crate) fn close(&mut self) -> Result<(), String> {
        for f in self.fns.iter_mut() {
            f.close()?;
        }
        Ok(())
    }

    pub(crate) fn find_roll_point(&self) -> RollPoint {
        let last = self.fns.len() - 1;
        for i in (0..self.fns.len()).rev() {
            if !self.fns[i].exhausted() {
                return if i == last {
                    RollPoint::NoneExhausted
                } else {
                    RollPoint::At(i + 1)
                };
            }
        }
        RollPoint::AllExhausted
    }

    /// Advance leftwards from `roll_point - 1` until a generator still has values, then rewind
    /// every generator to its right. Returns false when the walk runs off the left end.
    pub(crate) fn roll(&mut self, roll_point: usize) -> bool {
        let mut pivot = None;
        for i in (0..roll_point.min(self.fns.len())).rev() {
            self.fns[i].advance();
            if !self.fns[i].exhausted() {
                pivot = Some(i);
                break;
            }
        }
        let Some(pivot) = pivot else {
            return false;
        };
        for f in self.fns[pivot + 1..].iter_mut() {
            f.reset();
        }
        true
    }

    /// True when some non-outer generator yields nothing for the bound row.
    pub(crate) fn is_inner_and_empty(&self) -> bool {
        self.fns.iter().any(|f| !f.is_outer() && f.current_empty())
    }

    /// Emit the next run of combinations: the last generator appends up to `max_step` fresh
    /// values and every other generator replicates its current value to match. Returns the
    /// number of rows appended.
    pub(crate) fn emit(
        &mut self,
        result_builders: &mut [ColumnBuilder],
        max_step: usize,
    ) -> Result<usize, String> {
        if result_builders.len() != self.fns.len() {
            return Err(format!(
                "table function result builders mismatch: builders={} functions={}",
                result_builders.len(),
                self.fns.len()
            ));
        }
        let last = self.fns.len() - 1;
        let (head, tail) = result_builders.split_at_mut(last);
        let repeat = self.fns[last].get_value(&mut tail[0], max_step)?;
        for (f, out) in self.fns[..last].iter().zip(head.iter_mut()) {
            f.get_same_many_values(out, repeat)?;
        }
        Ok(repeat)
    }
}
