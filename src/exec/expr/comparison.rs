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
use crate::exec::chunk::Chunk;
use crate::exec::expr::{ExprArena, ExprId};
use arrow::array::{Array, ArrayRef, BooleanArray, BooleanBuilder, Datum, new_null_array};
use arrow::compute::cast;
use arrow::compute::kernels::boolean::not;
use arrow::compute::kernels::cmp::{eq, gt, gt_eq, lt, lt_eq, neq};
use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use std::sync::Arc;

fn is_int(dt: &DataType) -> bool {
    matches!(
        dt,
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
    )
}

fn is_float(dt: &DataType) -> bool {
    matches!(dt, DataType::Float32 | DataType::Float64)
}

fn cast_to(array: ArrayRef, target: &DataType) -> Result<ArrayRef, String> {
    if array.data_type() == target {
        return Ok(array);
    }
    cast(&array, target).map_err(|e| e.to_string())
}

/// Bring both sides to one Arrow type: integers widen to Int64, mixed numerics to Float64,
/// an untyped NULL side takes the other side's type.
fn normalize_comparison_types(
    left: ArrayRef,
    right: ArrayRef,
) -> Result<(ArrayRef, ArrayRef), String> {
    let left_type = left.data_type().clone();
    let right_type = right.data_type().clone();

    if left_type == right_type {
        return Ok((left, right));
    }
    if matches!(left_type, DataType::Null) {
        return Ok((new_null_array(&right_type, left.len()), right));
    }
    if matches!(right_type, DataType::Null) {
        return Ok((left, new_null_array(&left_type, right.len())));
    }
    if is_int(&left_type) && is_int(&right_type) {
        return Ok((
            cast_to(left, &DataType::Int64)?,
            cast_to(right, &DataType::Int64)?,
        ));
    }
    if (is_int(&left_type) || is_float(&left_type))
        && (is_int(&right_type) || is_float(&right_type))
    {
        return Ok((
            cast_to(left, &DataType::Float64)?,
            cast_to(right, &DataType::Float64)?,
        ));
    }
    Err(format!(
        "Cannot compare incompatible types: {:?} vs {:?}",
        left_type, right_type
    ))
}

fn eval_compare(
    arena: &ExprArena,
    left: ExprId,
    right: ExprId,
    chunk: &Chunk,
    kernel: fn(&dyn Datum, &dyn Datum) -> Result<BooleanArray, ArrowError>,
) -> Result<ArrayRef, String> {
    let l = arena.eval(left, chunk)?;
    let r = arena.eval(right, chunk)?;
    let (l_norm, r_norm) = normalize_comparison_types(l, r)?;
    let result = kernel(&l_norm, &r_norm).map_err(|e| e.to_string())?;
    Ok(Arc::new(result))
}

pub fn eval_eq(
    arena: &ExprArena,
    left: ExprId,
    right: ExprId,
    chunk: &Chunk,
) -> Result<ArrayRef, String> {
    eval_compare(arena, left, right, chunk, eq)
}

pub fn eval_ne(
    arena: &ExprArena,
    left: ExprId,
    right: ExprId,
    chunk: &Chunk,
) -> Result<ArrayRef, String> {
    eval_compare(arena, left, right, chunk, neq)
}

pub fn eval_lt(
    arena: &ExprArena,
    left: ExprId,
    right: ExprId,
    chunk: &Chunk,
) -> Result<ArrayRef, String> {
    eval_compare(arena, left, right, chunk, lt)
}

pub fn eval_le(
    arena: &ExprArena,
    left: ExprId,
    right: ExprId,
    chunk: &Chunk,
) -> Result<ArrayRef, String> {
    eval_compare(arena, left, right, chunk, lt_eq)
}

pub fn eval_gt(
    arena: &ExprArena,
    left: ExprId,
    right: ExprId,
    chunk: &Chunk,
) -> Result<ArrayRef, String> {
    eval_compare(arena, left, right, chunk, gt)
}

pub fn eval_ge(
    arena: &ExprArena,
    left: ExprId,
    right: ExprId,
    chunk: &Chunk,
) -> Result<ArrayRef, String> {
    eval_compare(arena, left, right, chunk, gt_eq)
}

fn eval_boolean_operands(
    arena: &ExprArena,
    left: ExprId,
    right: ExprId,
    chunk: &Chunk,
    op: &str,
) -> Result<(ArrayRef, ArrayRef), String> {
    let l = arena.eval(left, chunk)?;
    let r = arena.eval(right, chunk)?;
    for (side, v) in [("left", &l), ("right", &r)] {
        if !matches!(v.data_type(), DataType::Boolean | DataType::Null) {
            return Err(format!(
                "{op} {side} operand must be boolean, got {:?}",
                v.data_type()
            ));
        }
    }
    Ok((
        cast_to(l, &DataType::Boolean)?,
        cast_to(r, &DataType::Boolean)?,
    ))
}

fn as_boolean<'a>(array: &'a ArrayRef, op: &str) -> Result<&'a BooleanArray, String> {
    array
        .as_any()
        .downcast_ref::<BooleanArray>()
        .ok_or_else(|| format!("{op} operand must be boolean"))
}

pub fn eval_and(
    arena: &ExprArena,
    left: ExprId,
    right: ExprId,
    chunk: &Chunk,
) -> Result<ArrayRef, String> {
    let (l, r) = eval_boolean_operands(arena, left, right, chunk, "AND")?;
    let l_bool = as_boolean(&l, "AND")?;
    let r_bool = as_boolean(&r, "AND")?;
    // SQL 3VL: FALSE dominates AND even when the other side is NULL.
    let mut builder = BooleanBuilder::with_capacity(l_bool.len());
    for i in 0..l_bool.len() {
        let lv = (!l_bool.is_null(i)).then(|| l_bool.value(i));
        let rv = (!r_bool.is_null(i)).then(|| r_bool.value(i));
        match (lv, rv) {
            (Some(false), _) | (_, Some(false)) => builder.append_value(false),
            (Some(true), Some(true)) => builder.append_value(true),
            _ => builder.append_null(),
        }
    }
    Ok(Arc::new(builder.finish()))
}

pub fn eval_or(
    arena: &ExprArena,
    left: ExprId,
    right: ExprId,
    chunk: &Chunk,
) -> Result<ArrayRef, String> {
    let (l, r) = eval_boolean_operands(arena, left, right, chunk, "OR")?;
    let l_bool = as_boolean(&l, "OR")?;
    let r_bool = as_boolean(&r, "OR")?;
    // SQL 3VL: TRUE dominates OR even when the other side is NULL.
    let mut builder = BooleanBuilder::with_capacity(l_bool.len());
    for i in 0..l_bool.len() {
        let lv = (!l_bool.is_null(i)).then(|| l_bool.value(i));
        let rv = (!r_bool.is_null(i)).then(|| r_bool.value(i));
        match (lv, rv) {
            (Some(true), _) | (_, Some(true)) => builder.append_value(true),
            (Some(false), Some(false)) => builder.append_value(false),
            _ => builder.append_null(),
        }
    }
    Ok(Arc::new(builder.finish()))
}

pub fn eval_not(arena: &ExprArena, child: ExprId, chunk: &Chunk) -> Result<ArrayRef, String> {
    let v = arena.eval(child, chunk)?;
    if matches!(v.data_type(), DataType::Null) {
        return Ok(new_null_array(&DataType::Boolean, v.len()));
    }
    let b = as_boolean(&v, "NOT")?;
    let result = not(b).map_err(|e| e.to_string())?;
    Ok(Arc::new(result))
}

#[cfg(test)]
mod tests {
    use crate::common::ids::SlotId;
    use crate::exec::chunk::{Chunk, field_with_slot_id};
    use crate::exec::expr::{ExprArena, ExprNode, LiteralValue};
    use arrow::array::{Array, BooleanArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn bool_chunk(values: Vec<Option<bool>>) -> Chunk {
        let schema = Arc::new(Schema::new(vec![field_with_slot_id(
            Field::new("b", DataType::Boolean, true),
            SlotId::new(1),
        )]));
        let len = values.len();
        Chunk::try_from_columns(schema, vec![Arc::new(BooleanArray::from(values))], len)
            .expect("chunk")
    }

    #[test]
    fn and_or_follow_three_valued_logic() {
        let chunk = bool_chunk(vec![Some(true), Some(false), None]);
        let mut arena = ExprArena::default();
        let slot = arena.push_typed(ExprNode::SlotId(SlotId::new(1)), DataType::Boolean);
        let null = arena.push_typed(ExprNode::Literal(LiteralValue::Null), DataType::Boolean);
        let and = arena.push_typed(ExprNode::And(slot, null), DataType::Boolean);
        let or = arena.push_typed(ExprNode::Or(slot, null), DataType::Boolean);

        let out = arena.eval(and, &chunk).expect("and");
        let out = out.as_any().downcast_ref::<BooleanArray>().expect("bool");
        assert!(out.is_null(0));
        assert!(!out.is_null(1) && !out.value(1));
        assert!(out.is_null(2));

        let out = arena.eval(or, &chunk).expect("or");
        let out = out.as_any().downcast_ref::<BooleanArray>().expect("bool");
        assert!(!out.is_null(0) && out.value(0));
        assert!(out.is_null(1));
        assert!(out.is_null(2));
    }

    #[test]
    fn incompatible_comparison_is_error() {
        let chunk = bool_chunk(vec![Some(true)]);
        let mut arena = ExprArena::default();
        let slot = arena.push_typed(ExprNode::SlotId(SlotId::new(1)), DataType::Boolean);
        let lit = arena.push_typed(
            ExprNode::Literal(LiteralValue::Utf8("x".to_string())),
            DataType::Utf8,
        );
        let eq = arena.push_typed(ExprNode::Eq(slot, lit), DataType::Boolean);
        let err = arena.eval(eq, &chunk).expect_err("incompatible");
        assert!(err.contains("Cannot compare"), "err={err}");
    }
}
