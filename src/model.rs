//! Stored document shape for a user and everything the user owns.
//!
//! One [`UserDocument`] is the unit of storage: lists and tasks only exist
//! nested inside it.

use serde::{Deserialize, Serialize};

/// Identifier of the implicit list used when a task operation names no list.
pub const DEFAULT_LIST_ID: &str = "default";

/// Display name given to the default list when it is materialized.
pub const DEFAULT_LIST_NAME: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub done: bool,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            name: name.into(),
            done: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl TaskList {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.id == task_id)
    }

    /// Removes the task if present; returns whether anything was removed.
    pub fn remove_task(&mut self, task_id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != task_id);
        self.tasks.len() != before
    }

    pub fn summary(&self) -> ListSummary {
        ListSummary {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// The `{id, name}` projection of a list returned by list queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDocument {
    pub username: String,
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub lists: Vec<TaskList>,
}

impl UserDocument {
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password_hash: Some(password_hash.into()),
            lists: Vec::new(),
        }
    }

    // Legacy documents may hold several lists with one id; the first one wins.
    pub fn list(&self, list_id: &str) -> Option<&TaskList> {
        self.lists.iter().find(|list| list.id == list_id)
    }

    pub fn list_mut(&mut self, list_id: &str) -> Option<&mut TaskList> {
        self.lists.iter_mut().find(|list| list.id == list_id)
    }

    /// Returns the list, appending an empty one named `name` when it does not exist yet.
    pub fn list_or_insert(&mut self, list_id: &str, name: &str) -> &mut TaskList {
        let index = match self.lists.iter().position(|list| list.id == list_id) {
            Some(index) => index,
            None => {
                self.lists.push(TaskList::new(list_id, name));
                self.lists.len() - 1
            }
        };
        &mut self.lists[index]
    }

    pub fn remove_list(&mut self, list_id: &str) -> bool {
        match self.lists.iter().position(|list| list.id == list_id) {
            Some(index) => {
                self.lists.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn summaries(&self) -> Vec<ListSummary> {
        self.lists.iter().map(TaskList::summary).collect()
    }
}

/// Generates a fresh list or task identifier.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
