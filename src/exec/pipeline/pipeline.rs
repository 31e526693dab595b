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
//! Pipeline structure metadata.
//!
//! Responsibilities:
//! - Represents one pipeline as an ordered chain of operator factories.
//! - Instantiates one driver per parallel instance, validating source and sink placement.
//!
//! Key exported interfaces:
//! - Types: `Pipeline`.

use std::sync::Arc;

use super::driver::PipelineDriver;
use super::operator_factory::OperatorFactory;
use crate::lateralis_logging::debug;
use crate::runtime::profile::{OperatorProfiles, RuntimeProfile};
use crate::runtime::runtime_state::RuntimeState;

/// One pipeline definition: a source, zero or more processors, then a sink.
pub struct Pipeline {
    id: i32,
    op_factories: Vec<Box<dyn OperatorFactory>>,
}

impl Pipeline {
    pub fn new(id: i32, op_factories: Vec<Box<dyn OperatorFactory>>) -> Self {
        Self { id, op_factories }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub(crate) fn instantiate_drivers(
        &self,
        dop: i32,
        profile: Option<&RuntimeProfile>,
        runtime_state: &Arc<RuntimeState>,
    ) -> Result<Vec<PipelineDriver>, String> {
        let dop = dop.max(1);
        let mut drivers = Vec::with_capacity(dop as usize);
        let pipeline_profile = profile.map(|p| p.child(format!("Pipeline (id={})", self.id)));
        let op_names = self
            .op_factories
            .iter()
            .map(|factory| factory.name())
            .collect::<Vec<_>>()
            .join(" -> ");
        for driver_id in 0..dop {
            debug!(
                "Pipeline driver created: pipeline_id={} driver_id={} dop={} operators={}",
                self.id, driver_id, dop, op_names
            );
            let mut operators = Vec::with_capacity(self.op_factories.len());
            let mut operator_profiles = Vec::new();
            let mut source_idx = None;
            let mut sink_idx = None;
            let driver_profile = pipeline_profile
                .as_ref()
                .map(|p| p.child(format!("PipelineDriver (id={driver_id})")));
            for (idx, factory) in self.op_factories.iter().enumerate() {
                if factory.is_source() {
                    if source_idx.is_some() {
                        return Err("pipeline has multiple source operators".to_string());
                    }
                    source_idx = Some(idx);
                }
                if factory.is_sink() {
                    if sink_idx.is_some() {
                        return Err("pipeline has multiple sink operators".to_string());
                    }
                    sink_idx = Some(idx);
                }
                let mut op = factory.create(dop, driver_id);
                if let Some(driver_profile) = driver_profile.as_ref() {
                    let profiles =
                        OperatorProfiles::new(driver_profile.child(op.name().to_string()));
                    op.set_profiles(profiles.clone());
                    operator_profiles.push(profiles);
                }
                op.prepare()?;
                operators.push(op);
            }
            let source_idx =
                source_idx.ok_or_else(|| "pipeline missing source operator".to_string())?;
            let sink_idx = sink_idx.ok_or_else(|| "pipeline missing sink operator".to_string())?;
            if source_idx != 0 {
                return Err("pipeline source must be the first operator".to_string());
            }
            if sink_idx + 1 != operators.len() {
                return Err("pipeline sink must be the last operator".to_string());
            }
            drivers.push(PipelineDriver::new(
                driver_id,
                operators,
                driver_profile,
                operator_profiles,
                Arc::clone(runtime_state),
            ));
        }
        Ok(drivers)
    }
}
