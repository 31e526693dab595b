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

use arrow::array::{Int32Array, Int64Array};

use super::{FnCursor, TableFunction, int64_at, int64_param};
use crate::common::ids::SlotId;
use crate::exec::chunk::{Chunk, ColumnBuilder};

/// `explode_numbers(n)`: INT values `0..n`. NULL or non-positive `n` is empty.
pub struct ExplodeNumbersFunction {
    name: String,
    param_slots: Vec<SlotId>,
    cursor: FnCursor,
    counts: Option<Int64Array>,
}

impl ExplodeNumbersFunction {
    pub fn new(name: String, param_slots: Vec<SlotId>, is_outer: bool) -> Self {
        Self {
            name,
            param_slots,
            cursor: FnCursor::new(is_outer),
            counts: None,
        }
    }
}

impl TableFunction for ExplodeNumbersFunction {
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
        let slot = *self
            .param_slots
            .first()
            .ok_or_else(|| format!("table function {} missing count argument", self.name))?;
        self.counts = Some(int64_param(chunk, slot, &self.name)?);
        Ok(())
    }

    fn bind(&mut self, row: usize) -> Result<(), String> {
        let counts = self
            .counts
            .as_ref()
            .ok_or_else(|| format!("table function {} used before process_init", self.name))?;
        let n = int64_at(counts, row).unwrap_or(0).max(0);
        if n > i64::from(i32::MAX) + 1 {
            return Err(format!(
                "table function {} count {} exceeds INT range",
                self.name, n
            ));
        }
        self.cursor.bind(n as usize);
        Ok(())
    }

    fn process_close(&mut self) {
        self.counts = None;
    }

    fn append_values(
        &self,
        out: &mut ColumnBuilder,
        offset: usize,
        len: usize,
    ) -> Result<(), String> {
        let values = Int32Array::from_iter_values((offset..offset + len).map(|v| v as i32));
        out.append_array(Arc::new(values))
    }

    fn append_repeated(
        &self,
        out: &mut ColumnBuilder,
        offset: usize,
        count: usize,
    ) -> Result<(), String> {
        out.append_array(Arc::new(Int32Array::from(vec![offset as i32; count])))
    }
}
