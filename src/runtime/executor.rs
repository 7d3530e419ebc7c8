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
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, OnceLock};

use threadpool::ThreadPool;

use crate::common::error::ConversionError;
use crate::runtime::ordered_buffer::OrderedPartitionBuffer;

/// Fixed-size pool that computes partitions.
pub struct PartitionExecutor {
    pool: ThreadPool,
}

impl PartitionExecutor {
    pub fn new(num_threads: usize) -> Self {
        let threads = num_threads.max(1);
        Self {
            pool: ThreadPool::with_name("partition_task".to_string(), threads),
        }
    }

    /// Run `task` for partition `index` and deliver its outcome to `buffer`.
    ///
    /// Skipped once the buffer is cancelled. A panicking task fails the
    /// buffer instead of leaving its slot empty forever.
    pub fn submit<T, F>(&self, buffer: &Arc<OrderedPartitionBuffer<T>>, index: usize, task: F)
    where
        T: Send + 'static,
        F: FnOnce() -> Result<(T, u64), ConversionError> + Send + 'static,
    {
        let buffer = Arc::clone(buffer);
        self.pool.execute(move || {
            if buffer.is_cancelled() {
                return;
            }
            match catch_unwind(AssertUnwindSafe(task)) {
                Ok(Ok((item, bytes))) => buffer.complete(index, item, bytes),
                Ok(Err(err)) => buffer.fail(err),
                Err(payload) => buffer.fail(ConversionError::PartitionFailed {
                    index,
                    message: panic_message(payload.as_ref()),
                }),
            }
        });
    }

    pub fn threads(&self) -> usize {
        self.pool.max_count()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

static PARTITION_EXECUTOR: OnceLock<PartitionExecutor> = OnceLock::new();

pub fn partition_executor() -> &'static PartitionExecutor {
    PARTITION_EXECUTOR.get_or_init(|| {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        PartitionExecutor::new(threads)
    })
}
