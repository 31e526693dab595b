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

use arrow::array::{Array, ArrayRef, StringArray};

use super::{FnCursor, TableFunction};
use crate::common::config;
use crate::common::ids::SlotId;
use crate::exec::chunk::{Chunk, ColumnBuilder};

/// `explode_split(str, delimiter)`: one VARCHAR value per delimited part.
///
/// A NULL string or delimiter is empty. An empty delimiter yields the whole string. With a
/// non-zero part limit the last part keeps the unsplit remainder.
pub struct ExplodeSplitFunction {
    name: String,
    param_slots: Vec<SlotId>,
    cursor: FnCursor,
    max_parts: usize,
    strings: Option<StringArray>,
    delimiters: Option<StringArray>,
    current: Option<ArrayRef>,
}

impl ExplodeSplitFunction {
    pub fn new(name: String, param_slots: Vec<SlotId>, is_outer: bool) -> Self {
        Self {
            name,
            param_slots,
            cursor: FnCursor::new(is_outer),
            max_parts: 0,
            strings: None,
            delimiters: None,
            current: None,
        }
    }

    pub fn with_max_parts(mut self, max_parts: usize) -> Self {
        self.max_parts = max_parts;
        self
    }

    fn utf8_param(&self, chunk: &Chunk, idx: usize) -> Result<StringArray, String> {
        let slot = *self.param_slots.get(idx).ok_or_else(|| {
            format!("table function {} missing argument {}", self.name, idx)
        })?;
        let column = chunk
            .column_by_slot_id(slot)
            .map_err(|e| format!("table function {}: {e}", self.name))?;
        column
            .as_any()
            .downcast_ref::<StringArray>()
            .cloned()
            .ok_or_else(|| {
                format!(
                    "table function {} argument {} expects VARCHAR, got {:?}",
                    self.name,
                    idx,
                    column.data_type()
                )
            })
    }

    fn split<'a>(&self, value: &'a str, delimiter: &str) -> Vec<&'a str> {
        if delimiter.is_empty() {
            return vec![value];
        }
        if self.max_parts > 0 {
            value.splitn(self.max_parts, delimiter).collect()
        } else {
            value.split(delimiter).collect()
        }
    }

    fn current(&self) -> Result<&ArrayRef, String> {
        self.current
            .as_ref()
            .ok_or_else(|| format!("table function {} has no bound row", self.name))
    }
}

impl TableFunction for ExplodeSplitFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn cursor(&self) -> &FnCursor {
        &self.cursor
    }

    fn cursor_mut(&mut self) -> &mut FnCursor {
        &mut self.cursor
    }

    fn prepare(&mut self) -> Result<(), String> {
        if self.max_parts == 0 {
            self.max_parts = config::explode_split_max_parts();
        }
        Ok(())
    }

    fn process_init(&mut self, chunk: &Chunk) -> Result<(), String> {
        self.strings = Some(self.utf8_param(chunk, 0)?);
        self.delimiters = Some(self.utf8_param(chunk, 1)?);
        self.current = None;
        Ok(())
    }

    fn bind(&mut self, row: usize) -> Result<(), String> {
        let (Some(strings), Some(delimiters)) = (self.strings.as_ref(), self.delimiters.as_ref())
        else {
            return Err(format!(
                "table function {} used before process_init",
                self.name
            ));
        };
        if row >= strings.len() {
            return Err(format!(
                "table function {} row {} out of bounds (rows={})",
                self.name,
                row,
                strings.len()
            ));
        }
        if strings.is_null(row) || delimiters.is_null(row) {
            self.current = None;
            self.cursor.bind(0);
            return Ok(());
        }
        let parts = self.split(strings.value(row), delimiters.value(row));
        let size = parts.len();
        self.current = Some(Arc::new(StringArray::from(parts)));
        self.cursor.bind(size);
        Ok(())
    }

    fn process_close(&mut self) {
        self.strings = None;
        self.delimiters = None;
        self.current = None;
    }

    fn append_values(
        &self,
        out: &mut ColumnBuilder,
        offset: usize,
        len: usize,
    ) -> Result<(), String> {
        out.append_range_from(self.current()?, offset, len)
    }

    fn append_repeated(
        &self,
        out: &mut ColumnBuilder,
        offset: usize,
        count: usize,
    ) -> Result<(), String> {
        out.append_many_from(self.current()?, offset, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::chunk::field_with_slot_id;
    use arrow::datatypes::{DataType, Field, Schema};

    fn chunk(values: Vec<Option<&str>>, delimiter: &str) -> Chunk {
        let schema = Arc::new(Schema::new(vec![
            field_with_slot_id(Field::new("s", DataType::Utf8, true), SlotId::new(1)),
            field_with_slot_id(Field::new("d", DataType::Utf8, false), SlotId::new(2)),
        ]));
        let len = values.len();
        Chunk::try_from_columns(
            schema,
            vec![
                Arc::new(StringArray::from(values)),
                Arc::new(StringArray::from(vec![delimiter; len])),
            ],
            len,
        )
        .expect("chunk")
    }

    fn splitter() -> ExplodeSplitFunction {
        ExplodeSplitFunction::new(
            "explode_split".to_string(),
            vec![SlotId::new(1), SlotId::new(2)],
            false,
        )
    }

    fn drain(f: &mut ExplodeSplitFunction) -> Vec<String> {
        let mut out = ColumnBuilder::new(DataType::Utf8, true);
        while !f.exhausted() {
            f.get_value(&mut out, 1).expect("value");
        }
        let out = out.finish().expect("finish");
        let out = out.as_any().downcast_ref::<StringArray>().expect("utf8");
        (0..out.len()).map(|i| out.value(i).to_string()).collect()
    }

    #[test]
    fn splits_on_delimiter_and_keeps_empty_parts() {
        let mut f = splitter();
        f.process_init(&chunk(vec![Some("a,b,,c"), None], ","))
            .expect("init");
        f.bind(0).expect("bind");
        assert_eq!(drain(&mut f), vec!["a", "b", "", "c"]);
        f.bind(1).expect("bind");
        assert!(f.current_empty());
    }

    #[test]
    fn empty_delimiter_and_part_limit() {
        let mut f = splitter();
        f.process_init(&chunk(vec![Some("x-y")], "")).expect("init");
        f.bind(0).expect("bind");
        assert_eq!(drain(&mut f), vec!["x-y"]);

        let mut f = splitter().with_max_parts(2);
        f.process_init(&chunk(vec![Some("1;2;3")], ";")).expect("init");
        f.bind(0).expect("bind");
        assert_eq!(drain(&mut f), vec!["1", "2;3"]);
    }
}
