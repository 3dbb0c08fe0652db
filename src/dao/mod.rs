//! Data access for users, their lists and their tasks.
//!
//! [`TodoDao`] is the per-operation contract the web layer and the
//! authenticator talk to. [`DocumentTodoDao`] implements it on top of any
//! [`DocumentStore`], expressing every mutation as one atomic
//! read-modify-write of the user's document.

pub mod document_dao;
pub mod sqlite;
pub mod store;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{DEFAULT_LIST_ID, ListSummary, Task};

pub use document_dao::{DocumentTodoDao, RetryPolicy};
pub use sqlite::SqliteStore;
pub use store::{DocumentStore, MemoryStore, StoreError};

#[derive(Debug, Error)]
pub enum TodoError {
    #[error("Unknown user: {0}")]
    UnknownUser(String),
    #[error("Unknown list: {0}")]
    UnknownList(String),
    #[error("Unknown task: {0}")]
    UnknownTask(String),
    #[error("User already exists: {0}")]
    UserAlreadyExists(String),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Storage(StoreError),
}

impl From<StoreError> for TodoError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Missing(user) => Self::UnknownUser(user),
            StoreError::Duplicate(user) => Self::UserAlreadyExists(user),
            other => Self::Storage(other),
        }
    }
}

pub type TodoResult<T> = Result<T, TodoError>;

/// Which list a task operation targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListSelector {
    Default,
    Named(String),
}

impl ListSelector {
    /// Builds a selector from an optional request parameter; blank selects the default list.
    pub fn from_param(list: Option<&str>) -> Self {
        match list.map(str::trim) {
            None | Some("") => Self::Default,
            Some(id) => Self::Named(id.to_string()),
        }
    }

    /// Selector for an explicit list id, with the same blank handling as [`Self::from_param`].
    pub fn of_list(list_id: &str) -> Self {
        Self::from_param(Some(list_id))
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Default => DEFAULT_LIST_ID,
            Self::Named(id) if id.trim().is_empty() => DEFAULT_LIST_ID,
            Self::Named(id) => id,
        }
    }

    pub fn is_default(&self) -> bool {
        self.id() == DEFAULT_LIST_ID
    }
}

#[async_trait]
pub trait TodoDao: Send + Sync + 'static {
    async fn register_user(&self, user: &str, password_hash: &str) -> TodoResult<()>;

    /// Returns the stored hash; `None` when the record carries no hash.
    async fn get_user_password_hash(&self, user: &str) -> TodoResult<Option<String>>;

    async fn create_list(&self, user: &str, name: &str) -> TodoResult<String>;
    async fn get_lists(&self, user: &str) -> TodoResult<Vec<ListSummary>>;
    async fn rename_list(&self, user: &str, list_id: &str, new_name: &str) -> TodoResult<()>;
    async fn delete_list(&self, user: &str, list_id: &str) -> TodoResult<()>;

    async fn get_tasks(&self, user: &str, list: &ListSelector) -> TodoResult<Vec<Task>>;
    async fn create_task(&self, user: &str, list: &ListSelector, name: &str)
    -> TodoResult<String>;
    async fn rename_task(
        &self,
        user: &str,
        list: &ListSelector,
        task_id: &str,
        new_name: &str,
    ) -> TodoResult<()>;
    async fn set_task_done(
        &self,
        user: &str,
        list: &ListSelector,
        task_id: &str,
        done: bool,
    ) -> TodoResult<()>;
    async fn delete_task(&self, user: &str, list: &ListSelector, task_id: &str)
    -> TodoResult<()>;

    async fn get_tasks_of_list(&self, user: &str, list_id: &str) -> TodoResult<Vec<Task>> {
        self.get_tasks(user, &ListSelector::of_list(list_id)).await
    }

    async fn get_default_tasks(&self, user: &str) -> TodoResult<Vec<Task>> {
        self.get_tasks(user, &ListSelector::Default).await
    }

    async fn create_list_task(&self, user: &str, list_id: &str, name: &str) -> TodoResult<String> {
        self.create_task(user, &ListSelector::of_list(list_id), name)
            .await
    }

    async fn create_default_task(&self, user: &str, name: &str) -> TodoResult<String> {
        self.create_task(user, &ListSelector::Default, name).await
    }

    async fn rename_list_task(
        &self,
        user: &str,
        list_id: &str,
        task_id: &str,
        new_name: &str,
    ) -> TodoResult<()> {
        self.rename_task(user, &ListSelector::of_list(list_id), task_id, new_name)
            .await
    }

    async fn rename_default_task(
        &self,
        user: &str,
        task_id: &str,
        new_name: &str,
    ) -> TodoResult<()> {
        self.rename_task(user, &ListSelector::Default, task_id, new_name)
            .await
    }

    async fn set_list_task_done(
        &self,
        user: &str,
        list_id: &str,
        task_id: &str,
        done: bool,
    ) -> TodoResult<()> {
        self.set_task_done(user, &ListSelector::of_list(list_id), task_id, done)
            .await
    }

    async fn set_default_task_done(&self, user: &str, task_id: &str, done: bool) -> TodoResult<()> {
        self.set_task_done(user, &ListSelector::Default, task_id, done)
            .await
    }

    async fn delete_list_task(&self, user: &str, list_id: &str, task_id: &str) -> TodoResult<()> {
        self.delete_task(user, &ListSelector::of_list(list_id), task_id)
            .await
    }

    async fn delete_default_task(&self, user: &str, task_id: &str) -> TodoResult<()> {
        self.delete_task(user, &ListSelector::Default, task_id).await
    }
}
