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
//! Shared, instance-independent configuration of a lateral table-function operator.
//!
//! Responsibilities:
//! - Validates the plan node and resolves table-function descriptors once per fragment.
//! - Splits pass-through child slots into needed and useless positions and fixes the output
//!   schema (child slots first, then one result column per function).
//! - Creates independent generator sets for each parallel instance.
//!
//! Key exported interfaces:
//! - Types: `TableFunctionShared`.

use std::collections::HashSet;
use std::sync::Arc;

use arrow::datatypes::{Field, Schema, SchemaRef};

use crate::common::ids::SlotId;
use crate::exec::chunk::{ColumnBuilder, field_with_slot_id};
use crate::exec::expr::{ExprArena, ExprId};
use crate::exec::node::{SlotDescriptor, TableFunctionNode};
use crate::exec::table_function::{TableFunction, TableFunctionDesc};

/// Read-only after construction; shared by every instance through an `Arc`.
#[derive(Debug)]
pub(crate) struct TableFunctionShared {
    node_id: i32,
    fn_descs: Vec<TableFunctionDesc>,
    child_slots: Vec<SlotDescriptor>,
    needed_child_indices: Vec<usize>,
    useless_child_indices: Vec<usize>,
    output_schema: SchemaRef,
    arena: Arc<ExprArena>,
    conjuncts: Vec<ExprId>,
    limit: Option<usize>,
}

impl TableFunctionShared {
    pub(crate) fn new(node: &TableFunctionNode) -> Result<Self, String> {
        let node_id = node.node_id;
        if node.fn_calls.is_empty() {
            return Err(format!(
                "TABLE_FUNCTION_NODE id={node_id} has no table functions"
            ));
        }
        if node.fn_calls.len() != node.fn_result_slots.len() {
            return Err(format!(
                "TABLE_FUNCTION_NODE id={node_id} has {} functions but {} result slots",
                node.fn_calls.len(),
                node.fn_result_slots.len()
            ));
        }

        let mut seen = HashSet::new();
        for slot in node.child_slots.iter().chain(node.fn_result_slots.iter()) {
            if !seen.insert(slot.id) {
                return Err(format!(
                    "TABLE_FUNCTION_NODE id={node_id} has duplicate slot id {}",
                    slot.id
                ));
            }
        }
        for slot_id in &node.output_slot_ids {
            if !seen.contains(slot_id) {
                return Err(format!(
                    "TABLE_FUNCTION_NODE id={node_id} output slot {} is neither a child slot nor a result slot",
                    slot_id
                ));
            }
        }

        let child_types = node
            .child_slots
            .iter()
            .map(|s| (s.id, s.data_type.clone()))
            .collect::<Vec<_>>();
        let mut fn_descs = Vec::with_capacity(node.fn_calls.len());
        for (call, result_slot) in node.fn_calls.iter().zip(node.fn_result_slots.iter()) {
            for (slot, declared) in call.param_slots.iter().zip(call.param_types.iter()) {
                let Some((_, actual)) = child_types.iter().find(|(id, _)| id == slot) else {
                    return Err(format!(
                        "TABLE_FUNCTION_NODE id={node_id} function {} reads slot {} which is not a child slot",
                        call.function_name, slot
                    ));
                };
                if actual != declared {
                    return Err(format!(
                        "TABLE_FUNCTION_NODE id={node_id} function {} param slot {} type mismatch: declared={:?} child={:?}",
                        call.function_name, slot, declared, actual
                    ));
                }
            }
            let desc = TableFunctionDesc::new(
                &call.function_name,
                call.param_slots.clone(),
                &call.param_types,
            )
            .map_err(|e| format!("TABLE_FUNCTION_NODE id={node_id}: {e}"))?;
            if desc.result_type != result_slot.data_type {
                return Err(format!(
                    "TABLE_FUNCTION_NODE id={node_id} function {} returns {:?} but result slot {} is {:?}",
                    call.function_name, desc.result_type, result_slot.id, result_slot.data_type
                ));
            }
            fn_descs.push(desc);
        }

        let output_ids = node.output_slot_ids.iter().copied().collect::<HashSet<SlotId>>();
        let (needed_child_indices, useless_child_indices): (Vec<usize>, Vec<usize>) =
            (0..node.child_slots.len())
                .partition(|i| output_ids.contains(&node.child_slots[*i].id));

        let mut fields = Vec::with_capacity(node.child_slots.len() + node.fn_result_slots.len());
        for (idx, slot) in node.child_slots.iter().enumerate() {
            let mut field = slot.to_field();
            if useless_child_indices.contains(&idx) {
                // Padded with NULLs.
                field = field.with_nullable(true);
            }
            fields.push(field);
        }
        for (slot, desc) in node.fn_result_slots.iter().zip(fn_descs.iter()) {
            // Outer functions contribute NULL for empty rows.
            let nullable = slot.nullable || desc.is_outer;
            fields.push(field_with_slot_id(
                Field::new(slot.name.clone(), slot.data_type.clone(), nullable),
                slot.id,
            ));
        }

        Ok(Self {
            node_id,
            fn_descs,
            child_slots: node.child_slots.clone(),
            needed_child_indices,
            useless_child_indices,
            output_schema: Arc::new(Schema::new(fields)),
            arena: Arc::clone(&node.arena),
            conjuncts: node.conjuncts.clone(),
            limit: node.limit,
        })
    }

    pub(crate) fn node_id(&self) -> i32 {
        self.node_id
    }

    pub(crate) fn fn_num(&self) -> usize {
        self.fn_descs.len()
    }

    pub(crate) fn fn_descs(&self) -> &[TableFunctionDesc] {
        &self.fn_descs
    }

    pub(crate) fn child_slot_count(&self) -> usize {
        self.child_slots.len()
    }

    pub(crate) fn child_slot(&self, idx: usize) -> Option<&SlotDescriptor> {
        self.child_slots.get(idx)
    }

    pub(crate) fn needed_child_indices(&self) -> &[usize] {
        &self.needed_child_indices
    }

    pub(crate) fn useless_child_indices(&self) -> &[usize] {
        &self.useless_child_indices
    }

    pub(crate) fn output_schema(&self) -> SchemaRef {
        Arc::clone(&self.output_schema)
    }

    pub(crate) fn arena(&self) -> &ExprArena {
        &self.arena
    }

    pub(crate) fn conjuncts(&self) -> &[ExprId] {
        &self.conjuncts
    }

    pub(crate) fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// One fresh generator per function, in plan order.
    pub(crate) fn create_functions(&self) -> Vec<Box<dyn TableFunction>> {
        self.fn_descs
            .iter()
            .map(TableFunctionDesc::create_function)
            .collect()
    }

    /// Empty builders for every output column, in output order.
    pub(crate) fn new_column_builders(&self) -> Vec<ColumnBuilder> {
        self.output_schema
            .fields()
            .iter()
            .map(|f| ColumnBuilder::new(f.data_type().clone(), f.is_nullable()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::node::TableFunctionCall;
    use arrow::datatypes::DataType;

    fn list_type() -> DataType {
        DataType::List(Arc::new(Field::new("item", DataType::Int64, true)))
    }

    fn node() -> TableFunctionNode {
        TableFunctionNode::new(
            7,
            vec![
                SlotDescriptor::new(1, "id", DataType::Int64, false),
                SlotDescriptor::new(2, "arr", list_type(), true),
            ],
            vec![TableFunctionCall::new(
                "explode_outer",
                vec![SlotId::new(2)],
                vec![list_type()],
            )],
            vec![SlotDescriptor::new(3, "v", DataType::Int64, false)],
        )
    }

    #[test]
    fn splits_needed_and_useless_child_slots() {
        let node = node().with_output_slot_ids(vec![SlotId::new(1), SlotId::new(3)]);
        let shared = TableFunctionShared::new(&node).expect("shared");
        assert_eq!(shared.needed_child_indices(), &[0]);
        assert_eq!(shared.useless_child_indices(), &[1]);
        let schema = shared.output_schema();
        assert_eq!(schema.fields().len(), 3);
        assert!(!schema.field(0).is_nullable());
        assert!(schema.field(1).is_nullable());
        // outer result column must accept NULL
        assert!(schema.field(2).is_nullable());
        assert_eq!(shared.create_functions().len(), 1);
    }

    #[test]
    fn rejects_invalid_layouts() {
        let mut bad = node();
        bad.fn_result_slots.clear();
        let err = TableFunctionShared::new(&bad).expect_err("count mismatch");
        assert!(err.contains("result slots"), "err={err}");

        let mut bad = node();
        bad.fn_result_slots[0].id = SlotId::new(1);
        let err = TableFunctionShared::new(&bad).expect_err("duplicate");
        assert!(err.contains("duplicate slot id 1"), "err={err}");

        let mut bad = node();
        bad.fn_result_slots[0].data_type = DataType::Utf8;
        let err = TableFunctionShared::new(&bad).expect_err("result type");
        assert!(err.contains("returns Int64"), "err={err}");

        let bad = node().with_output_slot_ids(vec![SlotId::new(42)]);
        let err = TableFunctionShared::new(&bad).expect_err("unknown output slot");
        assert!(err.contains("output slot 42"), "err={err}");

        let mut bad = node();
        bad.fn_calls.clear();
        bad.fn_result_slots.clear();
        let err = TableFunctionShared::new(&bad).expect_err("no functions");
        assert!(err.contains("has no table functions"), "err={err}");
    }
}
