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
//! Columnar chunk flowing between pipeline operators.
//!
//! Responsibilities:
//! - Wraps an Arrow `RecordBatch` and resolves columns by slot id.
//! - Carries slot ids in field metadata so schemas stay self-describing across operators.
//!
//! Key exported interfaces:
//! - Types: `Chunk`, `ColumnBuilder`.
//! - Functions: `field_with_slot_id`, `field_slot_id`.

mod column_builder;

pub use column_builder::ColumnBuilder;

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{ArrayRef, RecordBatch, RecordBatchOptions};
use arrow::datatypes::{Field, Schema, SchemaRef};

use crate::common::ids::SlotId;

/// A chunk of rows backed by an Arrow `RecordBatch`.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub batch: RecordBatch,
    slot_id_to_index: Arc<HashMap<SlotId, usize>>,
}

impl Chunk {
    pub fn try_new(batch: RecordBatch) -> Result<Self, String> {
        let slot_id_to_index = slot_id_to_index_from_schema(batch.schema().as_ref())?;
        Ok(Self {
            batch,
            slot_id_to_index: Arc::new(slot_id_to_index),
        })
    }

    /// Same as `try_new` but also rejects an empty schema carrying rows.
    pub fn try_new_strict(batch: RecordBatch) -> Result<Self, String> {
        if batch.num_columns() == 0 && batch.num_rows() > 0 {
            return Err(format!(
                "chunk with {} rows has no columns",
                batch.num_rows()
            ));
        }
        Self::try_new(batch)
    }

    /// Assemble a chunk from finished columns. Every column must have `num_rows` rows.
    pub fn try_from_columns(
        schema: SchemaRef,
        columns: Vec<ArrayRef>,
        num_rows: usize,
    ) -> Result<Self, String> {
        for (idx, column) in columns.iter().enumerate() {
            if column.len() != num_rows {
                let name = schema
                    .fields()
                    .get(idx)
                    .map(|f| f.name().as_str())
                    .unwrap_or("?");
                return Err(format!(
                    "column length mismatch at index {} (name={}): expected {} rows, got {}",
                    idx,
                    name,
                    num_rows,
                    column.len()
                ));
            }
        }
        let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
        let batch = RecordBatch::try_new_with_options(schema, columns, &options)
            .map_err(|e| format!("build chunk failed: {e}"))?;
        Self::try_new(batch)
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn slot_id_to_index(&self) -> &HashMap<SlotId, usize> {
        &self.slot_id_to_index
    }

    pub fn column_index(&self, slot_id: SlotId) -> Option<usize> {
        self.slot_id_to_index.get(&slot_id).copied()
    }

    pub fn column_by_slot_id(&self, slot_id: SlotId) -> Result<ArrayRef, String> {
        let idx = self.column_index(slot_id).ok_or_else(|| {
            let mut slots = self.slot_id_to_index.keys().collect::<Vec<_>>();
            slots.sort();
            format!(
                "slot id {} not found in chunk (num_columns={}, slot_ids={:?})",
                slot_id,
                self.batch.num_columns(),
                slots
            )
        })?;
        self.batch
            .columns()
            .get(idx)
            .cloned()
            .ok_or_else(|| format!("slot id {} mapped to invalid index {}", slot_id, idx))
    }

    pub fn len(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    pub fn slice(&self, offset: usize, length: usize) -> Self {
        Self {
            batch: self.batch.slice(offset, length),
            slot_id_to_index: Arc::clone(&self.slot_id_to_index),
        }
    }

    pub fn columns(&self) -> &[ArrayRef] {
        self.batch.columns()
    }
}

impl Default for Chunk {
    fn default() -> Self {
        Self {
            batch: RecordBatch::new_empty(Arc::new(Schema::empty())),
            slot_id_to_index: Arc::new(HashMap::new()),
        }
    }
}

pub const FIELD_META_SLOT_ID: &str = "lateralis.slot_id";

pub fn field_with_slot_id(field: Field, slot_id: SlotId) -> Field {
    let mut meta = field.metadata().clone();
    meta.insert(FIELD_META_SLOT_ID.to_string(), slot_id.to_string());
    field.with_metadata(meta)
}

pub fn field_slot_id(field: &Field) -> Result<Option<SlotId>, String> {
    let Some(v) = field.metadata().get(FIELD_META_SLOT_ID) else {
        return Ok(None);
    };
    Ok(Some(v.parse::<SlotId>()?))
}

fn slot_id_to_index_from_schema(schema: &Schema) -> Result<HashMap<SlotId, usize>, String> {
    let mut map = HashMap::with_capacity(schema.fields().len());
    for (idx, f) in schema.fields().iter().enumerate() {
        let slot_id = field_slot_id(f.as_ref())?.ok_or_else(|| {
            format!(
                "missing {} in chunk schema field at index {} (name={})",
                FIELD_META_SLOT_ID,
                idx,
                f.name()
            )
        })?;
        if let Some(prev) = map.insert(slot_id, idx) {
            // Two columns with one slot id would make slot lookups ambiguous.
            return Err(format!(
                "duplicate slot id {} in chunk schema: fields {} ({}) and {} ({})",
                slot_id,
                prev,
                schema.field(prev).name(),
                idx,
                f.name()
            ));
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int32Array, StringArray};
    use arrow::datatypes::DataType;

    #[test]
    fn strict_requires_slot_id_metadata_for_all_fields() {
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int32, true)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(vec![1, 2]))])
            .expect("record batch");
        let err = Chunk::try_new_strict(batch).expect_err("expected strict error");
        assert!(err.contains(FIELD_META_SLOT_ID), "err={}", err);
    }

    #[test]
    fn strict_rejects_duplicate_slot_id() {
        let schema = Arc::new(Schema::new(vec![
            field_with_slot_id(Field::new("a", DataType::Int32, true), SlotId::new(1)),
            field_with_slot_id(Field::new("b", DataType::Int32, true), SlotId::new(1)),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int32Array::from(vec![1, 2])),
                Arc::new(Int32Array::from(vec![3, 4])),
            ],
        )
        .expect("record batch");
        let err = Chunk::try_new_strict(batch).expect_err("expected duplicate error");
        assert!(err.contains("duplicate slot id"), "err={}", err);
    }

    #[test]
    fn column_length_mismatch_is_reported() {
        let schema = Arc::new(Schema::new(vec![
            field_with_slot_id(Field::new("a", DataType::Int32, true), SlotId::new(1)),
            field_with_slot_id(Field::new("b", DataType::Utf8, true), SlotId::new(2)),
        ]));
        let err = Chunk::try_from_columns(
            schema,
            vec![
                Arc::new(Int32Array::from(vec![1, 2])),
                Arc::new(StringArray::from(vec!["x"])),
            ],
            2,
        )
        .expect_err("mismatch");
        assert!(err.contains("column length mismatch"), "err={err}");
    }

    #[test]
    fn lookup_by_slot_id() {
        let schema = Arc::new(Schema::new(vec![
            field_with_slot_id(Field::new("a", DataType::Int32, true), SlotId::new(4)),
            field_with_slot_id(Field::new("b", DataType::Int32, true), SlotId::new(9)),
        ]));
        let chunk = Chunk::try_from_columns(
            schema,
            vec![
                Arc::new(Int32Array::from(vec![1, 2])),
                Arc::new(Int32Array::from(vec![3, 4])),
            ],
            2,
        )
        .expect("chunk");
        assert_eq!(chunk.column_index(SlotId::new(9)), Some(1));
        let err = chunk.column_by_slot_id(SlotId::new(5)).expect_err("missing");
        assert!(err.contains("slot id 5 not found"), "err={err}");
    }
}
