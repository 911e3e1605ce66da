//! Task generation for driving workers.
//!
//! Produces batches of tasks with monotonically increasing nonzero ids,
//! cycling through the built-in skills. Request payloads come from each
//! skill's registered payload factory so generated work always decodes on
//! the worker side.

use crate::message::Task;
use crate::pool::TaskPool;
use crate::skills::{skill_ids, SkillRegistry};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Skills a generated workload cycles through, in order.
const GENERATED_SKILLS: [u32; 4] = [
    skill_ids::STRING_REVERSE,
    skill_ids::MATH_OP,
    skill_ids::VECTOR_MATH,
    skill_ids::FUSED_MULTIPLY_ADD,
];

/// Producer of synthetic task batches.
pub struct TaskGenerator {
    next_task_id: AtomicU32,
    stopped: AtomicBool,
}

impl TaskGenerator {
    /// Create a generator; ids start at 1 (0 is the invalid sentinel).
    pub fn new() -> Self {
        Self {
            next_task_id: AtomicU32::new(1),
            stopped: AtomicBool::new(false),
        }
    }

    /// Build `count` tasks cycling through the built-in skills.
    ///
    /// Returns an empty batch once stopped.
    pub fn make_tasks(&self, count: u32) -> Vec<Task> {
        if self.stopped.load(Ordering::Acquire) || count == 0 {
            return Vec::new();
        }

        let registry = SkillRegistry::global();
        let mut tasks = Vec::with_capacity(count as usize);
        for i in 0..count {
            if self.stopped.load(Ordering::Acquire) {
                break;
            }
            let task_id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
            let skill_id = GENERATED_SKILLS[(i as usize) % GENERATED_SKILLS.len()];
            let payload = match registry.payload_factory(skill_id) {
                Some(factory) => factory.sample_request(task_id),
                None => Bytes::from(format!("task data {task_id}")),
            };
            tasks.push(Task::new(task_id, skill_id, payload));
        }
        tasks
    }

    /// Build `count` tasks and enqueue them directly into a pool.
    pub fn generate_tasks(&self, pool: &TaskPool, count: u32) {
        let tasks = self.make_tasks(count);
        if !tasks.is_empty() {
            pool.add_tasks(tasks);
        }
    }

    /// Stop producing; subsequent batches are empty.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}

impl Default for TaskGenerator {
    fn default() -> Self {
        Self::new()
    }
}
