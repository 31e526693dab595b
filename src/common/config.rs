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
use crate::lateralis_config::config as lateralis_app_config;

pub(crate) fn debug_exec_node_output() -> bool {
    lateralis_app_config()
        .ok()
        .map(|c| c.debug.exec_node_output)
        .unwrap_or(false)
}

pub(crate) fn explode_split_max_parts() -> usize {
    lateralis_app_config()
        .ok()
        .map(|c| c.debug.explode_split_max_parts)
        .unwrap_or(0)
}

pub(crate) fn default_batch_size() -> usize {
    lateralis_app_config()
        .ok()
        .map(|c| c.runtime.batch_size)
        .unwrap_or(4096)
}

pub fn pipeline_dop() -> usize {
    lateralis_app_config()
        .ok()
        .map(|c| c.runtime.pipeline_dop)
        .unwrap_or(1)
}
