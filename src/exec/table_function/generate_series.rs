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
use std::sync::Arc;

use arrow::array::Int64Array;

use super::{FnCursor, TableFunction, int64_at, int64_param};
use crate::common::ids::SlotId;
use crate::exec::chunk::{Chunk, ColumnBuilder};

/// `generate_series(start, end[, step])`: BIGINT values from `start` to `end` inclusive.
///
/// `step` defaults to 1 and may be negative. A NULL argument makes the row empty; a zero step
/// is an execution error.
pub struct GenerateSeriesFunction {
    name: String,
    param_slots: Vec<SlotId>,
    cursor: FnCursor,
    args: Vec<Int64Array>,
    start: i128,
    step: i128,
}

impl GenerateSeriesFunction {
    pub fn new(name: String, param_slots: Vec<SlotId>, is_outer: bool) -> Self {
        Self {
            name,
            param_slots,
            cursor: FnCursor::new(is_outer),
            args: Vec::new(),
            start: 0,
            step: 1,
        }
    }

    fn value_at(&self, offset: usize) -> Result<i64, String> {
        let v = self.start + self.step * offset as i128;
        i64::try_from(v)
            .map_err(|_| format!("table function {} value overflow: {}", self.name, v))
    }
}

impl TableFunction for GenerateSeriesFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn cursor(&self) -> &FnCursor {
        &self.cursor
    }

    fn cursor_mut(&mut self) -> &mut FnCursor {
        &mut self.cursor
    }

    fn process_init(&mut self, chunk: &Chunk) -> Result<(), String> {
        if !(2..=3).contains(&self.param_slots.len()) {
            return Err(format!(
                "table function {} expects 2 or 3 args, got {}",
                self.name,
                self.param_slots.len()
            ));
        }
        self.args = self
            .param_slots
            .iter()
            .map(|slot| int64_param(chunk, *slot, &self.name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(())
    }

    fn bind(&mut self, row: usize) -> Result<(), String> {
        if self.args.is_empty() {
            return Err(format!(
                "table function {} used before process_init",
                self.name
            ));
        }
        let start = int64_at(&self.args[0], row);
        let end = int64_at(&self.args[1], row);
        let step = match self.args.get(2) {
            Some(col) => int64_at(col, row),
            None => Some(1),
        };
        let (Some(start), Some(end), Some(step)) = (start, end, step) else {
            self.cursor.bind(0);
            return Ok(());
        };
        if step == 0 {
            return Err(format!(
                "table function {} step size cannot equal zero",
                self.name
            ));
        }
        let count = generate_series_count(i128::from(start), i128::from(end), i128::from(step))
            .map_err(|e| format!("table function {}: {e}", self.name))?;
        self.start = i128::from(start);
        self.step = i128::from(step);
        self.cursor.bind(count);
        Ok(())
    }

    fn process_close(&mut self) {
        self.args.clear();
    }

    fn append_values(
        &self,
        out: &mut ColumnBuilder,
        offset: usize,
        len: usize,
    ) -> Result<(), String> {
        let values = (offset..offset + len)
            .map(|i| self.value_at(i))
            .collect::<Result<Vec<_>, _>>()?;
        out.append_array(Arc::new(Int64Array::from(values)))
    }

    fn append_repeated(
        &self,
        out: &mut ColumnBuilder,
        offset: usize,
        count: usize,
    ) -> Result<(), String> {
        let v = self.value_at(offset)?;
        out.append_array(Arc::new(Int64Array::from(vec![v; count])))
    }
}

fn generate_series_count(start: i128, end: i128, step: i128) -> Result<usize, String> {
    let (diff, step_abs) = if step > 0 {
        if start > end {
            return Ok(0);
        }
        (end - start, step)
    } else {
        if start < end {
            return Ok(0);
        }
        (start - end, -step)
    };
    let count = diff / step_abs + 1;
    usize::try_from(count).map_err(|_| format!("series count overflow: {count}"))
}
