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

use arrow::array::{Array, ArrayRef, ListArray};
use arrow::datatypes::DataType;

use super::{FnCursor, TableFunction};
use crate::common::ids::SlotId;
use crate::exec::chunk::{Chunk, ColumnBuilder};

/// `explode(list)` / `unnest(list)`: one value per list element. A NULL list is empty.
pub struct ExplodeFunction {
    name: String,
    param_slots: Vec<SlotId>,
    result_type: DataType,
    cursor: FnCursor,
    list: Option<ListArray>,
    values: Option<ArrayRef>,
    base: usize,
}

impl ExplodeFunction {
    pub fn new(
        name: String,
        param_slots: Vec<SlotId>,
        is_outer: bool,
        result_type: DataType,
    ) -> Self {
        Self {
            name,
            param_slots,
            result_type,
            cursor: FnCursor::new(is_outer),
            list: None,
            values: None,
            base: 0,
        }
    }

    fn values(&self) -> Result<&ArrayRef, String> {
        self.values
            .as_ref()
            .ok_or_else(|| format!("table function {} used before process_init", self.name))
    }
}

impl TableFunction for ExplodeFunction {
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
            .ok_or_else(|| format!("table function {} missing list argument", self.name))?;
        let column = chunk
            .column_by_slot_id(slot)
            .map_err(|e| format!("table function {}: {e}", self.name))?;
        let list = column
            .as_any()
            .downcast_ref::<ListArray>()
            .cloned()
            .ok_or_else(|| {
                format!(
                    "table function {} expects LIST argument, got {:?}",
                    self.name,
                    column.data_type()
                )
            })?;
        let values = Arc::clone(list.values());
        if values.data_type() != &self.result_type {
            return Err(format!(
                "table function {} element type {:?} does not match result type {:?}",
                self.name,
                values.data_type(),
                self.result_type
            ));
        }
        self.list = Some(list);
        self.values = Some(values);
        self.base = 0;
        Ok(())
    }

    fn bind(&mut self, row: usize) -> Result<(), String> {
        let list = self
            .list
            .as_ref()
            .ok_or_else(|| format!("table function {} used before process_init", self.name))?;
        if row >= list.len() {
            return Err(format!(
                "table function {} row {} out of bounds (rows={})",
                self.name,
                row,
                list.len()
            ));
        }
        let (base, size) = if list.is_null(row) {
            (0, 0)
        } else {
            let offsets = list.value_offsets();
            (offsets[row] as usize, list.value_length(row) as usize)
        };
        self.base = base;
        self.cursor.bind(size);
        Ok(())
    }

    fn process_close(&mut self) {
        self.list = None;
        self.values = None;
        self.base = 0;
    }

    fn append_values(
        &self,
        out: &mut ColumnBuilder,
        offset: usize,
        len: usize,
    ) -> Result<(), String> {
        out.append_range_from(self.values()?, self.base + offset, len)
    }

    fn append_repeated(
        &self,
        out: &mut ColumnBuilder,
        offset: usize,
        count: usize,
    ) -> Result<(), String> {
        out.append_many_from(self.values()?, self.base + offset, count)
    }
}
