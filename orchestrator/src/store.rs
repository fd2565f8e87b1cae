//! Persistence contract for tasks and handoffs

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::StoreError;
use crate::types::{Handoff, Task, TaskStatus};

/// Where tasks and their handoff history live
///
/// Calls are synchronous; backends are expected to be local and fast.
pub trait Store: Send + Sync {
    /// Create and persist a pending task
    fn create_task(&self, description: &str) -> Result<Task, StoreError>;

    fn update_task_status(&self, task_id: &str, status: TaskStatus) -> Result<(), StoreError>;

    /// Append a handoff to a task's history
    fn save_handoff(&self, task_id: &str, handoff: &Handoff) -> Result<(), StoreError>;

    /// A task's handoffs in the order they were saved
    fn load_handoffs(&self, task_id: &str) -> Result<Vec<Handoff>, StoreError>;

    fn get_task(&self, task_id: &str) -> Result<Option<Task>, StoreError>;

    /// All tasks, newest first
    fn list_tasks(&self) -> Result<Vec<Task>, StoreError>;
}

/// Store that keeps everything in process memory
#[derive(Default)]
pub struct MemoryStore {
    tasks: Mutex<Vec<Task>>,
    handoffs: Mutex<HashMap<String, Vec<Handoff>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tasks(&self) -> MutexGuard<'_, Vec<Task>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handoffs(&self) -> MutexGuard<'_, HashMap<String, Vec<Handoff>>> {
        self.handoffs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Store for MemoryStore {
    fn create_task(&self, description: &str) -> Result<Task, StoreError> {
        let task = Task::new(description);
        self.tasks().push(task.clone());
        Ok(task)
    }

    fn update_task_status(&self, task_id: &str, status: TaskStatus) -> Result<(), StoreError> {
        let mut tasks = self.tasks();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))?;
        task.status = status;
        Ok(())
    }

    fn save_handoff(&self, task_id: &str, handoff: &Handoff) -> Result<(), StoreError> {
        if !self.tasks().iter().any(|t| t.id == task_id) {
            return Err(StoreError::TaskNotFound(task_id.to_string()));
        }
        self.handoffs()
            .entry(task_id.to_string())
            .or_default()
            .push(handoff.clone());
        Ok(())
    }

    fn load_handoffs(&self, task_id: &str) -> Result<Vec<Handoff>, StoreError> {
        Ok(self.handoffs().get(task_id).cloned().unwrap_or_default())
    }

    fn get_task(&self, task_id: &str) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks().iter().find(|t| t.id == task_id).cloned())
    }

    fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self.tasks().iter().rev().cloned().collect();
        // Stable sort keeps reverse insertion order for equal timestamps
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Artifacts, Context, Role};

    #[test]
    fn test_task_lifecycle() {
        let store = MemoryStore::new();
        let task = store.create_task("Build a cache").unwrap();
        assert_eq!(task.status, TaskStatus::Pending);

        store
            .update_task_status(&task.id, TaskStatus::InProgress)
            .unwrap();
        let loaded = store.get_task(&task.id).unwrap().unwrap();
        assert_eq!(loaded.status, TaskStatus::InProgress);

        assert!(store.get_task("missing").unwrap().is_none());
        assert!(matches!(
            store.update_task_status("missing", TaskStatus::Failed),
            Err(StoreError::TaskNotFound(_))
        ));
    }

    #[test]
    fn test_handoffs_keep_order() {
        let store = MemoryStore::new();
        let task = store.create_task("t").unwrap();

        for (from, to) in [
            (Role::Human, Role::Architect),
            (Role::Architect, Role::Implementer),
        ] {
            let handoff = Handoff::new(&task.id, from, to, Context::new("x"), Artifacts::default());
            store.save_handoff(&task.id, &handoff).unwrap();
        }

        let handoffs = store.load_handoffs(&task.id).unwrap();
        assert_eq!(handoffs.len(), 2);
        assert_eq!(handoffs[0].to_role, Role::Architect);
        assert_eq!(handoffs[1].to_role, Role::Implementer);
        assert!(store.load_handoffs("other").unwrap().is_empty());
    }

    #[test]
    fn test_list_newest_first() {
        let store = MemoryStore::new();
        let first = store.create_task("first").unwrap();
        let second = store.create_task("second").unwrap();

        let tasks = store.list_tasks().unwrap();
        assert_eq!(tasks[0].id, second.id);
        assert_eq!(tasks[1].id, first.id);
    }
}
