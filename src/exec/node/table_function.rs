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

use arrow::datatypes::DataType;

use crate::common::ids::SlotId;
use crate::exec::expr::{ExprArena, ExprId};
use crate::exec::node::SlotDescriptor;

/// One table-function invocation in a lateral view.
#[derive(Clone, Debug)]
pub struct TableFunctionCall {
    pub function_name: String,
    pub param_slots: Vec<SlotId>,
    pub param_types: Vec<DataType>,
}

impl TableFunctionCall {
    pub fn new(
        function_name: impl Into<String>,
        param_slots: Vec<SlotId>,
        param_types: Vec<DataType>,
    ) -> Self {
        Self {
            function_name: function_name.into(),
            param_slots,
            param_types,
        }
    }
}

/// Lateral view over N table functions.
///
/// Output columns are `child_slots` in order followed by one column per entry of
/// `fn_result_slots`. Child slots missing from `output_slot_ids` are never read downstream.
#[derive(Clone, Debug)]
pub struct TableFunctionNode {
    pub node_id: i32,
    pub child_slots: Vec<SlotDescriptor>,
    pub fn_calls: Vec<TableFunctionCall>,
    pub fn_result_slots: Vec<SlotDescriptor>,
    pub output_slot_ids: Vec<SlotId>,
    pub arena: Arc<ExprArena>,
    pub conjuncts: Vec<ExprId>,
    pub limit: Option<usize>,
}

impl TableFunctionNode {
    pub fn new(
        node_id: i32,
        child_slots: Vec<SlotDescriptor>,
        fn_calls: Vec<TableFunctionCall>,
        fn_result_slots: Vec<SlotDescriptor>,
    ) -> Self {
        let output_slot_ids = child_slots
            .iter()
            .chain(fn_result_slots.iter())
            .map(|s| s.id)
            .collect();
        Self {
            node_id,
            child_slots,
            fn_calls,
            fn_result_slots,
            output_slot_ids,
            arena: Arc::new(ExprArena::default()),
            conjuncts: Vec::new(),
            limit: None,
        }
    }

    pub fn with_output_slot_ids(mut self, output_slot_ids: Vec<SlotId>) -> Self {
        self.output_slot_ids = output_slot_ids;
        self
    }

    pub fn with_conjuncts(mut self, arena: Arc<ExprArena>, conjuncts: Vec<ExprId>) -> Self {
        self.arena = arena;
        self.conjuncts = conjuncts;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }
}
