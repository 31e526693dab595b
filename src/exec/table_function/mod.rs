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
//! Row generators for lateral table functions.
//!
//! Responsibilities:
//! - Defines the `TableFunction` contract the expansion operator drives: bind a row, emit its
//!   values in bounded steps, replicate the current value, rewind and advance.
//! - Parses plan-level function names into `TableFunctionDesc` and creates one fresh generator
//!   per execution instance.
//!
//! Key exported interfaces:
//! - Types: `TableFunction`, `FnCursor`, `TableFunctionDesc`, `TableFunctionKind`.
//!
//! Current limitations:
//! - Supported kinds are `explode`/`unnest`, `explode_numbers`, `explode_split` and
//!   `generate_series`; each accepts an `_outer` suffix.

mod explode;
mod explode_numbers;
mod explode_split;
mod generate_series;

use std::fmt;

use arrow::array::{Array, ArrayRef, Int64Array};
use arrow::compute::cast;
use arrow::datatypes::DataType;

use crate::common::ids::SlotId;
use crate::exec::chunk::{Chunk, ColumnBuilder};

pub use explode::ExplodeFunction;
pub use explode_numbers::ExplodeNumbersFunction;
pub use explode_split::ExplodeSplitFunction;
pub use generate_series::GenerateSeriesFunction;

const OUTER_SUFFIX: &str = "_outer";

/// Per-row iteration state shared by every generator.
///
/// `cur_size` is the number of values the bound row yields and `cur_offset` the next one to
/// emit. An empty row still reports `eos` only after one `forward`, so outer generators get a
/// chance to contribute their single default value.
#[derive(Clone, Debug, Default)]
pub struct FnCursor {
    eos: bool,
    cur_offset: usize,
    cur_size: usize,
    is_outer: bool,
}

impl FnCursor {
    pub fn new(is_outer: bool) -> Self {
        Self {
            is_outer,
            ..Self::default()
        }
    }

    /// Start a new row that yields `size` values.
    pub fn bind(&mut self, size: usize) {
        self.cur_size = size;
        self.reset();
    }

    pub fn reset(&mut self) {
        self.eos = false;
        self.cur_offset = 0;
    }

    pub fn forward(&mut self, step: usize) {
        if self.current_empty() {
            self.eos = true;
            return;
        }
        self.cur_offset = self.cur_offset.saturating_add(step);
        if self.cur_offset >= self.cur_size {
            self.eos = true;
        }
    }

    pub fn eos(&self) -> bool {
        self.eos
    }

    pub fn is_outer(&self) -> bool {
        self.is_outer
    }

    pub fn current_empty(&self) -> bool {
        self.cur_size == 0
    }

    pub fn offset(&self) -> usize {
        self.cur_offset
    }

    pub fn size(&self) -> usize {
        self.cur_size
    }

    pub fn remaining(&self) -> usize {
        self.cur_size.saturating_sub(self.cur_offset)
    }
}

/// A stateful generator producing zero or more values per input row.
///
/// Call order per input chunk: `process_init`, then `bind` for each row (interleaved with
/// `get_value` / `get_same_many_values` / `forward` / `reset`), then `process_close`.
pub trait TableFunction: Send {
    fn name(&self) -> &str;

    fn cursor(&self) -> &FnCursor;

    fn cursor_mut(&mut self) -> &mut FnCursor;

    fn prepare(&mut self) -> Result<(), String> {
        Ok(())
    }

    fn open(&mut self) -> Result<(), String> {
        Ok(())
    }

    /// Bind a new input chunk; evaluates the parameter columns.
    fn process_init(&mut self, chunk: &Chunk) -> Result<(), String>;

    /// Bind row `row` of the current chunk and rewind to its first value.
    fn bind(&mut self, row: usize) -> Result<(), String>;

    /// Release per-chunk state once every row of the chunk is consumed.
    fn process_close(&mut self) {}

    fn close(&mut self) -> Result<(), String> {
        Ok(())
    }

    /// Append `len` consecutive values of the bound row starting at value `offset`.
    fn append_values(
        &self,
        out: &mut ColumnBuilder,
        offset: usize,
        len: usize,
    ) -> Result<(), String>;

    /// Append value `offset` of the bound row `count` times.
    fn append_repeated(
        &self,
        out: &mut ColumnBuilder,
        offset: usize,
        count: usize,
    ) -> Result<(), String>;

    fn reset(&mut self) {
        self.cursor_mut().reset();
    }

    fn forward(&mut self, step: usize) {
        self.cursor_mut().forward(step);
    }

    fn advance(&mut self) {
        self.forward(1);
    }

    fn exhausted(&self) -> bool {
        self.cursor().eos()
    }

    fn is_outer(&self) -> bool {
        self.cursor().is_outer()
    }

    fn current_empty(&self) -> bool {
        self.cursor().current_empty()
    }

    /// Append up to `max_step` fresh values and move past them; returns how many were
    /// appended. An empty row appends a single default and becomes exhausted.
    fn get_value(&mut self, out: &mut ColumnBuilder, max_step: usize) -> Result<usize, String> {
        if self.current_empty() {
            out.append_many_defaults(1)?;
            self.forward(1);
            return Ok(1);
        }
        let step = max_step.min(self.cursor().remaining()).max(1);
        let offset = self.cursor().offset();
        self.append_values(out, offset, step)?;
        self.forward(step);
        Ok(step)
    }

    /// Append the current value `count` times without moving the cursor.
    fn get_same_many_values(&self, out: &mut ColumnBuilder, count: usize) -> Result<(), String> {
        if count == 0 {
            return Ok(());
        }
        if self.current_empty() {
            return out.append_many_defaults(count);
        }
        self.append_repeated(out, self.cursor().offset(), count)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TableFunctionKind {
    Explode,
    ExplodeNumbers,
    ExplodeSplit,
    GenerateSeries,
}

impl TableFunctionKind {
    fn from_base_name(name: &str) -> Option<Self> {
        match name {
            "explode" | "unnest" => Some(Self::Explode),
            "explode_numbers" => Some(Self::ExplodeNumbers),
            "explode_split" => Some(Self::ExplodeSplit),
            "generate_series" => Some(Self::GenerateSeries),
            _ => None,
        }
    }
}

impl fmt::Display for TableFunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Explode => "explode",
            Self::ExplodeNumbers => "explode_numbers",
            Self::ExplodeSplit => "explode_split",
            Self::GenerateSeries => "generate_series",
        };
        f.write_str(s)
    }
}

/// Validated, instance-independent definition of one table-function call.
#[derive(Clone, Debug)]
pub struct TableFunctionDesc {
    pub function_name: String,
    pub kind: TableFunctionKind,
    pub param_slots: Vec<SlotId>,
    pub is_outer: bool,
    pub result_type: DataType,
}

impl TableFunctionDesc {
    /// Parse `function_name` (optionally suffixed with `_outer`) and check the parameter
    /// types against what the kind accepts.
    pub fn new(
        function_name: &str,
        param_slots: Vec<SlotId>,
        param_types: &[DataType],
    ) -> Result<Self, String> {
        let lowered = function_name.trim().to_ascii_lowercase();
        let (base, is_outer) = match lowered.strip_suffix(OUTER_SUFFIX) {
            Some(base) => (base, true),
            None => (lowered.as_str(), false),
        };
        let kind = TableFunctionKind::from_base_name(base)
            .ok_or_else(|| format!("unsupported table function: {}", function_name))?;
        if param_slots.len() != param_types.len() {
            return Err(format!(
                "table function {} has {} param slots but {} param types",
                function_name,
                param_slots.len(),
                param_types.len()
            ));
        }
        let result_type = result_type_for(kind, param_types)?;
        Ok(Self {
            function_name: function_name.to_string(),
            kind,
            param_slots,
            is_outer,
            result_type,
        })
    }

    /// Create a fresh generator with its own iteration state.
    pub fn create_function(&self) -> Box<dyn TableFunction> {
        let name = self.function_name.clone();
        let params = self.param_slots.clone();
        match self.kind {
            TableFunctionKind::Explode => Box::new(ExplodeFunction::new(
                name,
                params,
                self.is_outer,
                self.result_type.clone(),
            )),
            TableFunctionKind::ExplodeNumbers => {
                Box::new(ExplodeNumbersFunction::new(name, params, self.is_outer))
            }
            TableFunctionKind::ExplodeSplit => {
                Box::new(ExplodeSplitFunction::new(name, params, self.is_outer))
            }
            TableFunctionKind::GenerateSeries => {
                Box::new(GenerateSeriesFunction::new(name, params, self.is_outer))
            }
        }
    }
}

fn is_integer(dt: &DataType) -> bool {
    matches!(
        dt,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
    )
}

fn result_type_for(kind: TableFunctionKind, param_types: &[DataType]) -> Result<DataType, String> {
    match kind {
        TableFunctionKind::Explode => match param_types {
            [DataType::List(field)] => Ok(field.data_type().clone()),
            other => Err(format!("{kind} expects one LIST argument, got {:?}", other)),
        },
        TableFunctionKind::ExplodeNumbers => match param_types {
            [t] if is_integer(t) => Ok(DataType::Int32),
            other => Err(format!("{kind} expects one integer argument, got {:?}", other)),
        },
        TableFunctionKind::ExplodeSplit => match param_types {
            [DataType::Utf8, DataType::Utf8] => Ok(DataType::Utf8),
            other => Err(format!(
                "{kind} expects (VARCHAR, VARCHAR) arguments, got {:?}",
                other
            )),
        },
        TableFunctionKind::GenerateSeries => {
            if !(2..=3).contains(&param_types.len()) || !param_types.iter().all(is_integer) {
                return Err(format!(
                    "{kind} expects 2 or 3 integer arguments, got {:?}",
                    param_types
                ));
            }
            Ok(DataType::Int64)
        }
    }
}

/// Evaluate an integer parameter column of `chunk` as Int64.
pub(crate) fn int64_param(
    chunk: &Chunk,
    slot: SlotId,
    fn_name: &str,
) -> Result<Int64Array, String> {
    let column = chunk
        .column_by_slot_id(slot)
        .map_err(|e| format!("table function {fn_name}: {e}"))?;
    let column: ArrayRef = if column.data_type() == &DataType::Int64 {
        column
    } else {
        cast(&column, &DataType::Int64)
            .map_err(|e| format!("table function {fn_name} cast param to BIGINT failed: {e}"))?
    };
    column
        .as_any()
        .downcast_ref::<Int64Array>()
        .cloned()
        .ok_or_else(|| format!("table function {fn_name} downcast Int64Array failed"))
}

pub(crate) fn int64_at(array: &Int64Array, row: usize) -> Option<i64> {
    (row < array.len() && array.is_valid(row)).then(|| array.value(row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::Field;
    use std::sync::Arc;

    #[test]
    fn outer_suffix_selects_outer_variant() {
        let list = DataType::List(Arc::new(Field::new("item", DataType::Int64, true)));
        let desc = TableFunctionDesc::new("explode_outer", vec![SlotId::new(1)], &[list])
            .expect("desc");
        assert_eq!(desc.kind, TableFunctionKind::Explode);
        assert!(desc.is_outer);
        assert_eq!(desc.result_type, DataType::Int64);
        assert!(desc.create_function().is_outer());

        let list = DataType::List(Arc::new(Field::new("item", DataType::Utf8, true)));
        let desc = TableFunctionDesc::new("UNNEST", vec![SlotId::new(1)], &[list]).expect("desc");
        assert!(!desc.is_outer);
        assert_eq!(desc.result_type, DataType::Utf8);
    }

    #[test]
    fn unknown_function_and_bad_params_are_rejected() {
        let err = TableFunctionDesc::new("json_each", vec![SlotId::new(1)], &[DataType::Utf8])
            .expect_err("unknown");
        assert!(err.contains("unsupported table function"), "err={err}");

        let err = TableFunctionDesc::new(
            "generate_series",
            vec![SlotId::new(1)],
            &[DataType::Int64],
        )
        .expect_err("arity");
        assert!(err.contains("2 or 3 integer arguments"), "err={err}");

        let err = TableFunctionDesc::new("explode_numbers", vec![], &[DataType::Int32])
            .expect_err("slot/type mismatch");
        assert!(err.contains("param slots"), "err={err}");
    }

    #[test]
    fn cursor_empty_row_needs_one_forward_to_finish() {
        let mut cursor = FnCursor::new(true);
        cursor.bind(0);
        assert!(cursor.current_empty());
        assert!(!cursor.eos());
        cursor.forward(1);
        assert!(cursor.eos());

        cursor.bind(3);
        cursor.forward(2);
        assert!(!cursor.eos());
        assert_eq!(cursor.remaining(), 1);
        cursor.forward(1);
        assert!(cursor.eos());
        cursor.reset();
        assert_eq!(cursor.offset(), 0);
        assert!(!cursor.eos());
    }
}
