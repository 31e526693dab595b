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
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::common::config;

/// Query-level options an operator can read while executing.
#[derive(Clone, Debug, Default)]
pub struct QueryOptions {
    /// Maximum rows per output chunk; `None` falls back to the configured default.
    pub batch_size: Option<usize>,
}

/// RuntimeState is the per-query execution context shared by every driver instance.
///
/// It carries the query options, the first error raised by any instance and the cooperative
/// cancellation flag polled by long-running operators.
#[derive(Debug, Clone)]
pub struct RuntimeState {
    query_options: QueryOptions,
    error_state: Arc<RuntimeErrorState>,
}

#[derive(Debug, Default)]
pub struct RuntimeErrorState {
    error: Mutex<Option<String>>,
    cancelled: AtomicBool,
}

impl RuntimeErrorState {
    /// Keeps the first error; later ones are dropped.
    pub fn set_error(&self, err: String) {
        let mut guard = self.error.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_none() {
            *guard = Some(err);
        }
    }

    pub fn error(&self) -> Option<String> {
        self.error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self::new(QueryOptions::default())
    }
}

impl RuntimeState {
    pub fn new(query_options: QueryOptions) -> Self {
        Self {
            query_options,
            error_state: Arc::new(RuntimeErrorState::default()),
        }
    }

    pub fn with_batch_size(batch_size: usize) -> Self {
        Self::new(QueryOptions {
            batch_size: Some(batch_size),
        })
    }

    pub fn query_options(&self) -> &QueryOptions {
        &self.query_options
    }

    pub fn chunk_size(&self) -> usize {
        self.query_options
            .batch_size
            .filter(|v| *v > 0)
            .unwrap_or_else(config::default_batch_size)
            .max(1)
    }

    pub fn error_state(&self) -> Arc<RuntimeErrorState> {
        Arc::clone(&self.error_state)
    }

    pub fn set_error(&self, err: String) {
        self.error_state.set_error(err);
    }

    pub fn error(&self) -> Option<String> {
        self.error_state.error()
    }

    /// Request cooperative cancellation of every instance sharing this state.
    pub fn cancel(&self) {
        self.error_state.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.error_state.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::RuntimeState;

    #[test]
    fn chunk_size_is_at_least_one() {
        assert_eq!(RuntimeState::with_batch_size(3).chunk_size(), 3);
        assert!(RuntimeState::with_batch_size(0).chunk_size() >= 1);
    }

    #[test]
    fn clones_share_error_and_cancel_flag() {
        let state = RuntimeState::default();
        let other = state.clone();
        other.set_error("first".to_string());
        other.set_error("second".to_string());
        other.cancel();
        assert_eq!(state.error().as_deref(), Some("first"));
        assert!(state.is_cancelled());
    }
}
