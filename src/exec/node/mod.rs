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
//! Plan-node definitions consumed by operator factories.
//!
//! Key exported interfaces:
//! - Types: `SlotDescriptor`, `TableFunctionNode`, `TableFunctionCall`.

pub mod table_function;

pub use table_function::{TableFunctionCall, TableFunctionNode};

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};

use crate::common::ids::SlotId;
use crate::exec::chunk::field_with_slot_id;

/// Typed output position of a plan node.
#[derive(Clone, Debug, PartialEq)]
pub struct SlotDescriptor {
    pub id: SlotId,
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl SlotDescriptor {
    pub fn new(id: u32, name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            id: SlotId::new(id),
            name: name.into(),
            data_type,
            nullable,
        }
    }

    pub fn to_field(&self) -> Field {
        field_with_slot_id(
            Field::new(self.name.clone(), self.data_type.clone(), self.nullable),
            self.id,
        )
    }
}

pub fn schema_for_slots(slots: &[SlotDescriptor]) -> SchemaRef {
    Arc::new(Schema::new(
        slots.iter().map(SlotDescriptor::to_field).collect::<Vec<_>>(),
    ))
}
