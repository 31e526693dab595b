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
//! Vectorized expression evaluation over chunks.
//!
//! Responsibilities:
//! - Stores expression trees in a flat arena addressed by `ExprId`.
//! - Evaluates literals, slot references, comparisons and SQL three-valued boolean logic.
//! - Applies conjunct lists to chunks as residual filters.
//!
//! Key exported interfaces:
//! - Types: `ExprArena`, `ExprId`, `ExprNode`, `LiteralValue`.
//! - Functions: `filter_chunk`.
//!
//! Current limitations:
//! - No arithmetic, casts or function calls; predicates compare columns and constants only.

mod comparison;
mod literal;
mod predicate;

pub use predicate::{conjuncts_mask, filter_chunk};

use crate::common::ids::SlotId;
use crate::exec::chunk::Chunk;
use arrow::array::{ArrayRef, new_null_array};
use arrow::datatypes::DataType;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ExprId(pub usize);

#[derive(Clone, Debug, PartialEq)]
pub enum LiteralValue {
    Null,
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Bool(bool),
    Utf8(String),
}

#[derive(Clone, Debug)]
pub enum ExprNode {
    Literal(LiteralValue),
    SlotId(SlotId),
    Eq(ExprId, ExprId),
    Ne(ExprId, ExprId),
    Lt(ExprId, ExprId),
    Le(ExprId, ExprId),
    Gt(ExprId, ExprId),
    Ge(ExprId, ExprId),
    And(ExprId, ExprId),
    Or(ExprId, ExprId),
    Not(ExprId),
    IsNull(ExprId),
    IsNotNull(ExprId),
}

#[derive(Clone, Debug, Default)]
pub struct ExprArena {
    nodes: Vec<ExprNode>,
    types: Vec<DataType>,
}

impl ExprArena {
    pub fn push(&mut self, node: ExprNode) -> ExprId {
        self.push_typed(node, DataType::Null)
    }

    pub fn push_typed(&mut self, node: ExprNode, data_type: DataType) -> ExprId {
        let id = ExprId(self.nodes.len());
        self.nodes.push(node);
        self.types.push(data_type);
        id
    }

    pub fn node(&self, id: ExprId) -> Option<&ExprNode> {
        self.nodes.get(id.0)
    }

    pub fn data_type(&self, id: ExprId) -> Option<&DataType> {
        self.types.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn eval(&self, id: ExprId, chunk: &Chunk) -> Result<ArrayRef, String> {
        let node = self
            .nodes
            .get(id.0)
            .ok_or_else(|| format!("invalid ExprId {}", id.0))?;
        match node {
            ExprNode::Literal(v) => {
                let target_type = self.data_type(id).cloned().unwrap_or(DataType::Null);
                if matches!(v, LiteralValue::Null) && !matches!(target_type, DataType::Null) {
                    // Typed NULL keeps the declared type so it can be compared with a column.
                    return Ok(new_null_array(&target_type, chunk.len()));
                }
                literal::eval(v, chunk.len())
            }
            ExprNode::SlotId(slot_id) => chunk.column_by_slot_id(*slot_id),
            ExprNode::Eq(l, r) => comparison::eval_eq(self, *l, *r, chunk),
            ExprNode::Ne(l, r) => comparison::eval_ne(self, *l, *r, chunk),
            ExprNode::Lt(l, r) => comparison::eval_lt(self, *l, *r, chunk),
            ExprNode::Le(l, r) => comparison::eval_le(self, *l, *r, chunk),
            ExprNode::Gt(l, r) => comparison::eval_gt(self, *l, *r, chunk),
            ExprNode::Ge(l, r) => comparison::eval_ge(self, *l, *r, chunk),
            ExprNode::And(l, r) => comparison::eval_and(self, *l, *r, chunk),
            ExprNode::Or(l, r) => comparison::eval_or(self, *l, *r, chunk),
            ExprNode::Not(child) => comparison::eval_not(self, *child, chunk),
            ExprNode::IsNull(child) => predicate::eval_is_null(self, *child, chunk),
            ExprNode::IsNotNull(child) => predicate::eval_is_not_null(self, *child, chunk),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::chunk::field_with_slot_id;
    use arrow::array::{Array, BooleanArray, Int64Array};
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    fn one_column_chunk(values: Vec<Option<i64>>) -> Chunk {
        let schema = Arc::new(Schema::new(vec![field_with_slot_id(
            Field::new("v", DataType::Int64, true),
            SlotId::new(1),
        )]));
        let len = values.len();
        Chunk::try_from_columns(schema, vec![Arc::new(Int64Array::from(values))], len)
            .expect("chunk")
    }

    #[test]
    fn typed_null_literal_uses_declared_type() {
        let mut arena = ExprArena::default();
        let expr = arena.push_typed(ExprNode::Literal(LiteralValue::Null), DataType::Utf8);
        let chunk = one_column_chunk(vec![Some(1), Some(2)]);
        let out = arena.eval(expr, &chunk).expect("eval");
        assert_eq!(out.data_type(), &DataType::Utf8);
        assert_eq!(out.null_count(), 2);
    }

    #[test]
    fn comparison_widens_integer_literal() {
        let mut arena = ExprArena::default();
        let slot = arena.push_typed(ExprNode::SlotId(SlotId::new(1)), DataType::Int64);
        let lit = arena.push_typed(ExprNode::Literal(LiteralValue::Int32(2)), DataType::Int32);
        let gt = arena.push_typed(ExprNode::Gt(slot, lit), DataType::Boolean);
        let chunk = one_column_chunk(vec![Some(1), Some(3), None]);
        let out = arena.eval(gt, &chunk).expect("eval");
        let out = out.as_any().downcast_ref::<BooleanArray>().expect("bool");
        assert!(!out.value(0));
        assert!(out.value(1));
        assert!(out.is_null(2));
    }

    #[test]
    fn invalid_expr_id_is_error() {
        let arena = ExprArena::default();
        let err = arena
            .eval(ExprId(3), &one_column_chunk(vec![Some(1)]))
            .expect_err("invalid id");
        assert!(err.contains("invalid ExprId"), "err={err}");
    }
}
