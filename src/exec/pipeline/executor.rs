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
//! Top-level pipeline executor entrypoint.
//!
//! Responsibilities:
//! - Runs every instance of a pipeline on its own scoped thread until all of them finish.
//! - Records the first failure in the shared error state and cancels the other instances.
//!
//! Key exported interfaces:
//! - Types: `PipelineExecutor`.

use std::sync::Arc;
use std::thread;

use super::driver::DriverState;
use super::operator_factory::OperatorFactory;
use super::pipeline::Pipeline;
use crate::lateralis_logging::{info, warn};
use crate::runtime::profile::RuntimeProfile;
use crate::runtime::runtime_state::RuntimeState;

/// Executes one pipeline with a configurable degree of parallelism.
pub struct PipelineExecutor {
    pipeline: Pipeline,
    runtime_state: Arc<RuntimeState>,
    profile: Option<RuntimeProfile>,
}

impl PipelineExecutor {
    pub fn new(
        op_factories: Vec<Box<dyn OperatorFactory>>,
        runtime_state: Arc<RuntimeState>,
    ) -> Self {
        Self {
            pipeline: Pipeline::new(0, op_factories),
            runtime_state,
            profile: None,
        }
    }

    /// Collect operator counters under `profile`.
    pub fn with_profile(mut self, profile: RuntimeProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn runtime_state(&self) -> &Arc<RuntimeState> {
        &self.runtime_state
    }

    /// Run `dop` instances to completion. Returns the first recorded error, or a
    /// cancellation error when the query was cancelled from outside.
    pub fn run(&self, dop: i32) -> Result<(), String> {
        let drivers = self.pipeline.instantiate_drivers(
            dop,
            self.profile.as_ref(),
            &self.runtime_state,
        )?;
        info!(
            "pipeline execution start: pipeline_id={} dop={} chunk_size={}",
            self.pipeline.id(),
            drivers.len(),
            self.runtime_state.chunk_size()
        );

        let states = thread::scope(|scope| {
            let handles = drivers
                .into_iter()
                .map(|mut driver| {
                    let runtime_state = Arc::clone(&self.runtime_state);
                    scope.spawn(move || {
                        let state = driver.run();
                        if let DriverState::Failed(err) = &state {
                            runtime_state.set_error(err.clone());
                            runtime_state.cancel();
                        }
                        (driver.driver_id(), state)
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|h| {
                    h.join().unwrap_or_else(|_| {
                        self.runtime_state
                            .set_error("pipeline driver thread panicked".to_string());
                        self.runtime_state.cancel();
                        (-1, DriverState::Failed("pipeline driver thread panicked".to_string()))
                    })
                })
                .collect::<Vec<_>>()
        });

        if let Some(err) = self.runtime_state.error() {
            warn!(
                "pipeline execution failed: pipeline_id={} error={}",
                self.pipeline.id(),
                err
            );
            return Err(err);
        }
        if let Some((driver_id, _)) = states
            .iter()
            .find(|(_, s)| matches!(s, DriverState::Canceled))
        {
            warn!(
                "pipeline execution cancelled: pipeline_id={} driver_id={}",
                self.pipeline.id(),
                driver_id
            );
            return Err("query cancelled".to_string());
        }
        info!(
            "pipeline execution finished: pipeline_id={} drivers={}",
            self.pipeline.id(),
            states.len()
        );
        Ok(())
    }
}
