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
use arrow::array::{Array, ArrayRef, BooleanArray};
use arrow::compute::kernels::boolean::{and_kleene, is_not_null, is_null};
use arrow::compute::filter_record_batch;
use std::sync::Arc;

pub fn eval_is_null(arena: &ExprArena, child: ExprId, chunk: &Chunk) -> Result<ArrayRef, String> {
    let v = arena.eval(child, chunk)?;
    let out = is_null(v.as_ref()).map_err(|e| e.to_string())?;
    Ok(Arc::new(out))
}

pub fn eval_is_not_null(
    arena: &ExprArena,
    child: ExprId,
    chunk: &Chunk,
) -> Result<ArrayRef, String> {
    let v = arena.eval(child, chunk)?;
    let out = is_not_null(v.as_ref()).map_err(|e| e.to_string())?;
    Ok(Arc::new(out))
}

/// Kleene AND of every conjunct. `None` when there are no conjuncts.
///
/// The filter kernel treats NULL mask entries as false.
pub fn conjuncts_mask(
    arena: &ExprArena,
    conjuncts: &[ExprId],
    chunk: &Chunk,
) -> Result<Option<BooleanArray>, String> {
    let mut mask: Option<BooleanArray> = None;
    for conjunct in conjuncts {
        let v = arena.eval(*conjunct, chunk)?;
        let b = v
            .as_any()
            .downcast_ref::<BooleanArray>()
            .ok_or_else(|| {
                format!(
                    "conjunct {} must return boolean array, got {:?}",
                    conjunct.0,
                    v.data_type()
                )
            })?;
        mask = Some(match mask {
            None => b.clone(),
            Some(prev) => and_kleene(&prev, b).map_err(|e| e.to_string())?,
        });
    }
    Ok(mask)
}

/// Keep the rows of `chunk` for which every conjunct is true.
pub fn filter_chunk(
    arena: &ExprArena,
    conjuncts: &[ExprId],
    chunk: Chunk,
) -> Result<Chunk, String> {
    if conjuncts.is_empty() || chunk.is_empty() {
        return Ok(chunk);
    }
    let Some(mask) = conjuncts_mask(arena, conjuncts, &chunk)? else {
        return Ok(chunk);
    };
    if mask.true_count() == mask.len() {
        return Ok(chunk);
    }
    let filtered = filter_record_batch(&chunk.batch, &mask)
        .map_err(|e| format!("Filter failed: {}", e))?;
    Chunk::try_new(filtered)
}

#[cfg(test)]
mod tests {
    use super::filter_chunk;
    use crate::common::ids::SlotId;
    use crate::exec::chunk::{Chunk, field_with_slot_id};
    use crate::exec::expr::{ExprArena, ExprNode, LiteralValue};
    use arrow::array::{Array, Int64Array};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    #[test]
    fn null_predicate_result_drops_row() {
        let schema = Arc::new(Schema::new(vec![field_with_slot_id(
            Field::new("v", DataType::Int64, true),
            SlotId::new(3),
        )]));
        let chunk = Chunk::try_from_columns(
            schema,
            vec![Arc::new(Int64Array::from(vec![Some(1), None, Some(5)]))],
            3,
        )
        .expect("chunk");
        let mut arena = ExprArena::default();
        let slot = arena.push_typed(ExprNode::SlotId(SlotId::new(3)), DataType::Int64);
        let lit = arena.push_typed(ExprNode::Literal(LiteralValue::Int64(0)), DataType::Int64);
        let gt = arena.push_typed(ExprNode::Gt(slot, lit), DataType::Boolean);
        let not_null = arena.push_typed(ExprNode::IsNotNull(slot), DataType::Boolean);

        let out = filter_chunk(&arena, &[gt, not_null], chunk).expect("filter");
        assert_eq!(out.len(), 2);
        let col = out.column_by_slot_id(SlotId::new(3)).expect("col");
        let col = col.as_any().downcast_ref::<Int64Array>().expect("i64");
        assert_eq!(col.values().to_vec(), vec![1, 5]);
        assert_eq!(col.null_count(), 0);
    }
}
