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
//! Pipeline operator implementations.
//!
//! Key exported interfaces:
//! - Types: `TableFunctionProcessorFactory`, `ValuesSourceFactory`, `ChunkCollectSinkFactory`.

pub mod chunk_collect_sink;
pub mod table_function;
pub mod values_source;

pub use chunk_collect_sink::{ChunkCollectHandle, ChunkCollectSinkFactory};
pub use table_function::TableFunctionProcessorFactory;
pub use values_source::ValuesSourceFactory;
