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
//! Pipeline driver execution loop.
//!
//! Responsibilities:
//! - Moves chunks between adjacent operators through single-slot edge buffers until the sink
//!   finishes.
//! - Propagates upstream completion as `set_finishing` and closes operators in reverse order.
//! - Observes the query's cancellation flag and shared error state on every step.
//!
//! Key exported interfaces:
//! - Types: `DriverState`, `PipelineDriver`.

use std::sync::Arc;
use std::time::Instant;

use super::operator::{BlockedReason, Operator};
use crate::exec::chunk::Chunk;
use crate::lateralis_logging::{debug, error};
use crate::runtime::profile::{
    CounterRef, CounterUnit, OperatorProfiles, RuntimeProfile, clamp_u128_to_i64,
};
use crate::runtime::runtime_state::RuntimeState;

#[derive(Clone, Debug, PartialEq, Eq)]
/// Runtime state for a single pipeline driver.
///
/// ```text
///   Ready ──► Running ──┬─ completes normally ──► Finished
///                       ├─ no operator can move ─► Blocked(reason)
///                       ├─ canceled ────────────► Canceled
///                       └─ fatal error ─────────► Failed(err)
/// ```
pub enum DriverState {
    Ready,
    Running,
    Blocked(BlockedReason),
    Finished,
    Canceled,
    Failed(String),
}

impl DriverState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DriverState::Finished | DriverState::Canceled | DriverState::Failed(_)
        )
    }
}

/// Executes one operator chain for one parallel instance.
pub struct PipelineDriver {
    driver_id: i32,
    operators: Vec<Box<dyn Operator>>,
    profile: Option<RuntimeProfile>,
    driver_total_time: Option<CounterRef>,
    operator_counters: Vec<OperatorCounters>,
    runtime_state: Arc<RuntimeState>,
    state: DriverState,
    closed: bool,

    edge_chunks: Vec<Option<Chunk>>,
    edge_closed: Vec<bool>,
    operator_finishing_set: Vec<bool>,
}

#[derive(Clone)]
struct OperatorCounters {
    push_total_time: CounterRef,
    pull_total_time: CounterRef,
    set_finishing_time: CounterRef,
    close_time: CounterRef,
    push_row_num: CounterRef,
    pull_row_num: CounterRef,
}

impl PipelineDriver {
    pub fn new(
        driver_id: i32,
        operators: Vec<Box<dyn Operator>>,
        profile: Option<RuntimeProfile>,
        operator_profiles: Vec<OperatorProfiles>,
        runtime_state: Arc<RuntimeState>,
    ) -> Self {
        let operator_count = operators.len();
        let edge_count = operator_count.saturating_sub(1);
        let driver_total_time = profile.as_ref().map(|p| p.add_timer("DriverTotalTime"));
        let operator_counters = if profile.is_some() {
            debug_assert_eq!(
                operators.len(),
                operator_profiles.len(),
                "operator_profiles must be created when profiling is enabled"
            );
            operator_profiles
                .iter()
                .map(|p| OperatorCounters {
                    push_total_time: p.common.add_timer("PushTotalTime"),
                    pull_total_time: p.common.add_timer("PullTotalTime"),
                    set_finishing_time: p.common.add_timer("SetFinishingTime"),
                    close_time: p.common.add_timer("CloseTime"),
                    push_row_num: p.common.add_counter("PushRowNum", CounterUnit::Unit),
                    pull_row_num: p.common.add_counter("PullRowNum", CounterUnit::Unit),
                })
                .collect::<Vec<_>>()
        } else {
            Vec::new()
        };
        Self {
            driver_id,
            operators,
            profile,
            driver_total_time,
            operator_counters,
            runtime_state,
            state: DriverState::Ready,
            closed: false,

            edge_chunks: vec![None; edge_count],
            edge_closed: vec![false; edge_count],
            operator_finishing_set: vec![false; operator_count],
        }
    }

    pub fn driver_id(&self) -> i32 {
        self.driver_id
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    /// Drive the chain until it reaches a terminal state or stops making progress.
    pub fn process(&mut self) -> DriverState {
        let start = Instant::now();
        let state = self.process_inner();
        if let Some(counter) = self.driver_total_time.as_ref() {
            counter.add(clamp_u128_to_i64(start.elapsed().as_nanos()));
        }
        state
    }

    /// Run to a terminal state. Operators here never wait on external events, so a blocked
    /// driver can not be resumed and is reported as failed.
    pub fn run(&mut self) -> DriverState {
        loop {
            match self.process() {
                DriverState::Blocked(reason) => {
                    let err = format!(
                        "pipeline driver {} stalled: blocked on {:?}",
                        self.driver_id, reason
                    );
                    return self.finish_with_state(DriverState::Failed(err));
                }
                state if state.is_terminal() => return state,
                _ => {}
            }
        }
    }

    fn process_inner(&mut self) -> DriverState {
        if self.state.is_terminal() {
            return self.state.clone();
        }
        self.state = DriverState::Running;

        loop {
            if self.runtime_state.is_cancelled() {
                return self.finish_with_state(DriverState::Canceled);
            }
            if let Some(err) = self.runtime_state.error() {
                return self.finish_with_state(DriverState::Failed(err));
            }

            if self.is_finished() {
                return self.finish_with_state(DriverState::Finished);
            }

            let mut made_progress = false;

            let step = self
                .propagate_edge_closure(&mut made_progress)
                .and_then(|_| self.drive_set_finishing(&mut made_progress))
                .and_then(|_| self.drive_dataflow(&mut made_progress));
            if let Err(err) = step {
                let state = if self.runtime_state.is_cancelled() {
                    DriverState::Canceled
                } else {
                    DriverState::Failed(err)
                };
                return self.finish_with_state(state);
            }

            if made_progress {
                continue;
            }

            let has_buffered = self.edge_chunks.iter().any(|c| c.is_some());
            if let Some(sink) = self.operators.last() {
                let need_input = sink
                    .as_processor_ref()
                    .map(|p| p.need_input())
                    .unwrap_or(false);
                if has_buffered && !sink.is_finished() && !need_input {
                    return self.block(BlockedReason::OutputFull);
                }
            }
            return self.block(BlockedReason::InputEmpty);
        }
    }

    fn is_finished(&self) -> bool {
        self.operators
            .last()
            .map(|op| op.is_finished())
            .unwrap_or(true)
    }

    fn block(&mut self, reason: BlockedReason) -> DriverState {
        debug!(
            "Driver blocked: driver_id={} reason={:?}",
            self.driver_id, reason
        );
        self.state = DriverState::Blocked(reason);
        self.state.clone()
    }

    fn finish_with_state(&mut self, state: DriverState) -> DriverState {
        match &state {
            DriverState::Finished => {
                let last_op = self
                    .operators
                    .last()
                    .map(|op| op.name())
                    .unwrap_or("unknown");
                debug!(
                    "Driver finished: driver_id={} last_op={}",
                    self.driver_id, last_op
                );
            }
            DriverState::Canceled => {
                self.cancel_operators();
                debug!("Driver canceled: driver_id={}", self.driver_id);
            }
            DriverState::Failed(err) => {
                self.cancel_operators();
                error!("Driver failed: driver_id={} error={}", self.driver_id, err);
            }
            _ => {}
        }
        if state.is_terminal() {
            self.close_operators();
        }
        self.state = state;
        self.state.clone()
    }

    fn cancel_operators(&mut self) {
        for op in self.operators.iter_mut() {
            op.cancel();
        }
    }

    fn close_operators(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for chunk in self.edge_chunks.iter_mut() {
            let _ = chunk.take();
        }
        for idx in (0..self.operators.len()).rev() {
            let op = &mut self.operators[idx];
            let start = Instant::now();
            if let Err(err) = op.close() {
                error!("operator close failed: {}: {}", op.name(), err);
            }
            if let Some(counters) = self.operator_counters.get(idx) {
                counters
                    .close_time
                    .add(clamp_u128_to_i64(start.elapsed().as_nanos()));
            }
        }
        if let Some(profile) = self.profile.as_ref() {
            profile.add_info_string("State", format!("{:?}", self.state));
        }
    }

    fn drive_dataflow(&mut self, made_progress: &mut bool) -> Result<(), String> {
        if self.edge_chunks.is_empty() {
            return Ok(());
        }
        self.drive_push_edges(made_progress)?;
        self.drive_pull_edges(made_progress)?;
        self.drive_push_edges(made_progress)?;
        Ok(())
    }

    fn drive_push_edges(&mut self, made_progress: &mut bool) -> Result<(), String> {
        for e in (0..self.edge_chunks.len()).rev() {
            let downstream_idx = e + 1;
            let downstream_op = self
                .operators
                .get_mut(downstream_idx)
                .ok_or_else(|| "pipeline operator index out of bounds".to_string())?;
            let downstream_name = downstream_op.name().to_string();
            let downstream = downstream_op.as_processor_mut().ok_or_else(|| {
                format!("pipeline operator {downstream_name} missing processor operator")
            })?;
            if !downstream.need_input() {
                continue;
            }
            let Some(chunk) = self.edge_chunks[e].take() else {
                continue;
            };
            let push_rows = chunk.len();
            let start = Instant::now();
            downstream.push_chunk(self.runtime_state.as_ref(), chunk)?;
            if let Some(counters) = self.operator_counters.get(downstream_idx) {
                counters
                    .push_total_time
                    .add(clamp_u128_to_i64(start.elapsed().as_nanos()));
                counters.push_row_num.add(push_rows as i64);
            }
            *made_progress = true;
        }
        Ok(())
    }

    fn drive_pull_edges(&mut self, made_progress: &mut bool) -> Result<(), String> {
        for e in 0..self.edge_chunks.len() {
            if self.edge_chunks[e].is_some() {
                continue;
            }
            let upstream_idx = e;
            let downstream_idx = e + 1;

            let (left, right) = self.operators.split_at_mut(downstream_idx);
            let upstream_op = &mut left[upstream_idx];
            let downstream_op = &mut right[0];

            let upstream_name = upstream_op.name().to_string();
            let upstream = upstream_op.as_processor_mut().ok_or_else(|| {
                format!("pipeline operator {upstream_name} missing processor operator")
            })?;
            let downstream_name = downstream_op.name().to_string();
            let downstream = downstream_op.as_processor_mut().ok_or_else(|| {
                format!("pipeline operator {downstream_name} missing processor operator")
            })?;

            if !upstream.has_output() || !downstream.need_input() {
                continue;
            }

            let start = Instant::now();
            let maybe = upstream.pull_chunk(self.runtime_state.as_ref())?;
            if let Some(counters) = self.operator_counters.get(upstream_idx) {
                counters
                    .pull_total_time
                    .add(clamp_u128_to_i64(start.elapsed().as_nanos()));
                if let Some(chunk) = maybe.as_ref() {
                    counters.pull_row_num.add(chunk.len() as i64);
                }
            }
            // An empty pull still advances the upstream state machine.
            *made_progress = true;
            if let Some(chunk) = maybe {
                self.edge_chunks[e] = Some(chunk);
            }
        }
        Ok(())
    }

    fn propagate_edge_closure(&mut self, made_progress: &mut bool) -> Result<(), String> {
        for e in 0..self.edge_chunks.len() {
            if self.edge_closed[e] || self.edge_chunks[e].is_some() {
                continue;
            }
            let Some(upstream) = self.operators.get(e) else {
                continue;
            };
            if upstream.is_finished() {
                self.edge_closed[e] = true;
                debug!(
                    "Driver edge closed: driver_id={} edge={} upstream_op={}",
                    self.driver_id,
                    e,
                    upstream.name()
                );
                *made_progress = true;
            }
        }
        Ok(())
    }

    fn drive_set_finishing(&mut self, made_progress: &mut bool) -> Result<(), String> {
        for idx in 1..self.operators.len() {
            let in_edge = idx - 1;
            if self.operator_finishing_set[idx]
                || !self.edge_closed[in_edge]
                || self.edge_chunks[in_edge].is_some()
            {
                continue;
            }
            let op = self
                .operators
                .get_mut(idx)
                .ok_or_else(|| "pipeline operator index out of bounds".to_string())?;
            let op_name = op.name().to_string();
            let proc = op.as_processor_mut().ok_or_else(|| {
                format!("pipeline operator {op_name} missing processor operator")
            })?;
            let start = Instant::now();
            proc.set_finishing(self.runtime_state.as_ref())?;
            if let Some(counters) = self.operator_counters.get(idx) {
                counters
                    .set_finishing_time
                    .add(clamp_u128_to_i64(start.elapsed().as_nanos()));
            }
            debug!(
                "Driver set_finishing: driver_id={} op_idx={} op_name={}",
                self.driver_id, idx, op_name
            );
            self.operator_finishing_set[idx] = true;
            *made_progress = true;
        }
        Ok(())
    }
}

impl Drop for PipelineDriver {
    fn drop(&mut self) {
        self.close_operators();
    }
}
