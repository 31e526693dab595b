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

use arrow::array::{Array, ArrayRef, make_array, new_empty_array, new_null_array};
use arrow::compute::concat;
use arrow::datatypes::DataType;
use arrow_data::transform::MutableArrayData;

/// Append-only column under construction.
///
/// Appended pieces are kept as Arrow arrays and concatenated once in `finish`, so repeated
/// small appends (one per generator call) stay cheap.
#[derive(Debug)]
pub struct ColumnBuilder {
    data_type: DataType,
    nullable: bool,
    parts: Vec<ArrayRef>,
    len: usize,
}

impl ColumnBuilder {
    pub fn new(data_type: DataType, nullable: bool) -> Self {
        Self {
            data_type,
            nullable,
            parts: Vec::new(),
            len: 0,
        }
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append the value at `offset` of `src` repeated `count` times.
    pub fn append_many_from(
        &mut self,
        src: &ArrayRef,
        offset: usize,
        count: usize,
    ) -> Result<(), String> {
        self.check_source(src)?;
        if count == 0 {
            return Ok(());
        }
        if offset >= src.len() {
            return Err(format!(
                "append_many_from offset {} out of bounds (source rows={})",
                offset,
                src.len()
            ));
        }
        let data = src.to_data();
        let mut mutable = MutableArrayData::new(vec![&data], false, count);
        for _ in 0..count {
            mutable.extend(0, offset, offset + 1);
        }
        self.push_part(make_array(mutable.freeze()));
        Ok(())
    }

    /// Append `count` consecutive values of `src` starting at `offset`.
    pub fn append_range_from(
        &mut self,
        src: &ArrayRef,
        offset: usize,
        count: usize,
    ) -> Result<(), String> {
        self.check_source(src)?;
        if count == 0 {
            return Ok(());
        }
        let end = offset.checked_add(count).unwrap_or(usize::MAX);
        if end > src.len() {
            return Err(format!(
                "append_range_from range {}..{} out of bounds (source rows={})",
                offset,
                end,
                src.len()
            ));
        }
        self.push_part(src.slice(offset, count));
        Ok(())
    }

    pub fn append_array(&mut self, src: ArrayRef) -> Result<(), String> {
        self.check_source(&src)?;
        if !src.is_empty() {
            self.push_part(src);
        }
        Ok(())
    }

    /// Nulls for nullable columns, zero/empty values otherwise.
    pub fn append_many_defaults(&mut self, count: usize) -> Result<(), String> {
        if count == 0 {
            return Ok(());
        }
        let part = if self.nullable {
            new_null_array(&self.data_type, count)
        } else {
            default_array(&self.data_type, count)?
        };
        self.push_part(part);
        Ok(())
    }

    /// Concatenate everything appended so far and reset the builder.
    pub fn finish(&mut self) -> Result<ArrayRef, String> {
        let parts = std::mem::take(&mut self.parts);
        self.len = 0;
        match parts.as_slice() {
            [] => Ok(new_empty_array(&self.data_type)),
            [single] => Ok(Arc::clone(single)),
            _ => {
                let refs = parts.iter().map(|a| a.as_ref()).collect::<Vec<_>>();
                concat(&refs).map_err(|e| format!("concat column parts failed: {e}"))
            }
        }
    }

    fn check_source(&self, src: &ArrayRef) -> Result<(), String> {
        if src.data_type() != &self.data_type {
            return Err(format!(
                "column type mismatch: builder={:?} source={:?}",
                self.data_type,
                src.data_type()
            ));
        }
        Ok(())
    }

    fn push_part(&mut self, part: ArrayRef) {
        self.len += part.len();
        self.parts.push(part);
    }
}

/// `count` non-null default values of `data_type`: zeroed fixed-width slots, empty
/// strings and empty lists.
fn default_array(data_type: &DataType, count: usize) -> Result<ArrayRef, String> {
    if matches!(data_type, DataType::Null) {
        return Ok(new_null_array(data_type, count));
    }
    let data = new_null_array(data_type, count)
        .to_data()
        .into_builder()
        .nulls(None)
        .build()
        .map_err(|e| format!("build default values for {:?} failed: {e}", data_type))?;
    Ok(make_array(data))
}

#[cfg(test)]
mod tests {
    use super::ColumnBuilder;
    use arrow::array::{Array, ArrayRef, Int64Array, StringArray};
    use arrow::datatypes::DataType;
    use std::sync::Arc;

    #[test]
    fn append_many_from_replicates_one_value() {
        let src: ArrayRef = Arc::new(Int64Array::from(vec![7, 8, 9]));
        let mut b = ColumnBuilder::new(DataType::Int64, true);
        b.append_many_from(&src, 1, 3).expect("append");
        b.append_many_from(&src, 2, 0).expect("append nothing");
        assert_eq!(b.len(), 3);
        let out = b.finish().expect("finish");
        let out = out.as_any().downcast_ref::<Int64Array>().expect("int64");
        assert_eq!(out.values().to_vec(), vec![8, 8, 8]);
        assert_eq!(out.null_count(), 0);
    }

    #[test]
    fn range_and_defaults_concatenate_in_order() {
        let src: ArrayRef = Arc::new(StringArray::from(vec!["a", "b", "c"]));
        let mut b = ColumnBuilder::new(DataType::Utf8, false);
        b.append_range_from(&src, 1, 2).expect("range");
        b.append_many_defaults(2).expect("defaults");
        let out = b.finish().expect("finish");
        let out = out.as_any().downcast_ref::<StringArray>().expect("utf8");
        assert_eq!(out.len(), 4);
        assert_eq!(out.null_count(), 0);
        assert_eq!(out.value(0), "b");
        assert_eq!(out.value(1), "c");
        assert_eq!(out.value(2), "");
        assert_eq!(out.value(3), "");
    }

    #[test]
    fn nullable_defaults_are_nulls() {
        let mut b = ColumnBuilder::new(DataType::Int64, true);
        b.append_many_defaults(2).expect("defaults");
        let out = b.finish().expect("finish");
        assert_eq!(out.null_count(), 2);
        assert!(b.is_empty());
    }

    #[test]
    fn type_mismatch_and_bounds_are_errors() {
        let src: ArrayRef = Arc::new(Int64Array::from(vec![1]));
        let mut b = ColumnBuilder::new(DataType::Utf8, true);
        let err = b.append_many_from(&src, 0, 1).expect_err("mismatch");
        assert!(err.contains("type mismatch"), "err={err}");

        let mut b = ColumnBuilder::new(DataType::Int64, true);
        assert!(b.append_many_from(&src, 1, 1).is_err());
        assert!(b.append_range_from(&src, 0, 2).is_err());
    }
}
