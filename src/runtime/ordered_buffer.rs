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
//! Reassembles partition outputs in partition-index order.
//!
//! Producers complete slots in any order; the consumer blocks until the
//! lowest unreleased slot is filled. The byte budget is charged when a
//! partition completes, so an oversized result fails before the consumer has
//! seen all of it.

use std::sync::{Condvar, Mutex, MutexGuard};

use crate::common::byte_size::format_bytes;
use crate::common::error::{ConversionError, Result};
use crate::common::logging::debug;

#[derive(Debug)]
struct BufferState<T> {
    slots: Vec<Option<T>>,
    next: usize,
    completed: usize,
    total_bytes: u64,
    error: Option<ConversionError>,
    failed: bool,
    cancelled: bool,
}

#[derive(Debug)]
pub struct OrderedPartitionBuffer<T> {
    state: Mutex<BufferState<T>>,
    cv: Condvar,
    max_bytes: Option<u64>,
}

impl<T> OrderedPartitionBuffer<T> {
    pub fn new(num_partitions: usize, max_bytes: Option<u64>) -> Self {
        let mut slots = Vec::with_capacity(num_partitions);
        slots.resize_with(num_partitions, || None);
        Self {
            state: Mutex::new(BufferState {
                slots,
                next: 0,
                completed: 0,
                total_bytes: 0,
                error: None,
                failed: false,
                cancelled: false,
            }),
            cv: Condvar::new(),
            max_bytes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BufferState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn num_partitions(&self) -> usize {
        self.lock().slots.len()
    }

    /// Store the output of partition `index`, charging `bytes` to the budget.
    pub fn complete(&self, index: usize, item: T, bytes: u64) {
        let mut state = self.lock();
        if state.cancelled || state.failed || state.error.is_some() {
            return;
        }
        let Some(slot) = state.slots.get_mut(index) else {
            state.error = Some(ConversionError::PartitionFailed {
                index,
                message: "partition index out of range".to_string(),
            });
            self.cv.notify_all();
            return;
        };
        *slot = Some(item);
        state.completed += 1;
        state.total_bytes = state.total_bytes.saturating_add(bytes);
        debug!(
            "partition {} completed ({} of {}), total {}",
            index,
            state.completed,
            state.slots.len(),
            format_bytes(state.total_bytes)
        );
        if let Some(limit) = self.max_bytes
            && state.total_bytes > limit
        {
            state.error = Some(ConversionError::ResultSizeExceeded(format!(
                "Total size of results of {} partitions ({}) is bigger than driver.maxResultSize ({})",
                state.completed,
                format_bytes(state.total_bytes),
                format_bytes(limit)
            )));
        }
        self.cv.notify_all();
    }

    /// Record a failure; the first one wins.
    pub fn fail(&self, err: ConversionError) {
        let mut state = self.lock();
        if state.cancelled || state.failed || state.error.is_some() {
            return;
        }
        state.error = Some(err);
        self.cv.notify_all();
    }

    pub fn cancel(&self) {
        let mut state = self.lock();
        state.cancelled = true;
        for slot in state.slots.iter_mut() {
            slot.take();
        }
        self.cv.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        let state = self.lock();
        state.cancelled || state.failed || state.error.is_some()
    }

    /// Next partition in index order. Blocks until it is available.
    ///
    /// Returns `None` once every partition was released, after an error was
    /// reported, or after cancellation.
    pub fn next(&self) -> Option<Result<T>> {
        let mut state = self.lock();
        loop {
            if state.failed || state.cancelled {
                return None;
            }
            if let Some(err) = state.error.take() {
                state.failed = true;
                for slot in state.slots.iter_mut() {
                    slot.take();
                }
                return Some(Err(err));
            }
            if state.next >= state.slots.len() {
                return None;
            }
            let next = state.next;
            if let Some(item) = state.slots[next].take() {
                state.next += 1;
                return Some(Ok(item));
            }
            state = self.cv.wait(state).unwrap_or_else(|e| e.into_inner());
        }
    }
}
