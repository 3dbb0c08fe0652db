//! [`TodoDao`] over a [`DocumentStore`].
//!
//! Every operation is one blocking store call run on tokio's blocking pool.
//! Transient storage failures are retried with exponential backoff; logical
//! failures (unknown user/list/task, conflicts, validation) are returned at once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::store::{DocumentStore, StoreError};
use super::{ListSelector, TodoDao, TodoError, TodoResult};
use crate::model::{DEFAULT_LIST_NAME, ListSummary, Task, TaskList, UserDocument, generate_id};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(10))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(25),
        }
    }
}

pub struct DocumentTodoDao<S> {
    store: Arc<S>,
    retry: RetryPolicy,
}

impl<S: DocumentStore> DocumentTodoDao<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn run<T, Op>(&self, operation: &'static str, username: &str, op: Op) -> TodoResult<T>
    where
        T: Send + 'static,
        Op: Fn(&S, &str) -> TodoResult<T> + Send + Sync + 'static,
    {
        let op = Arc::new(op);
        let mut attempt = 0;
        loop {
            let store = Arc::clone(&self.store);
            let op = Arc::clone(&op);
            let user = username.to_string();
            let result =
                tokio::task::spawn_blocking(move || op.as_ref()(store.as_ref(), user.as_str()))
                    .await
                    .map_err(|err| {
                        TodoError::Storage(StoreError::Backend(format!(
                            "storage task failed: {err}"
                        )))
                    })?;

            match result {
                Err(TodoError::Storage(err))
                    if err.is_transient() && attempt < self.retry.max_retries =>
                {
                    let delay = self.retry.delay_for(attempt);
                    attempt += 1;
                    warn!(
                        operation,
                        user = username,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient storage failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(TodoError::Storage(err)) => {
                    error!(operation, user = username, error = %err, "storage failure");
                    return Err(TodoError::Storage(err));
                }
                other => return other,
            }
        }
    }

    async fn read<T, F>(&self, operation: &'static str, username: &str, view: F) -> TodoResult<T>
    where
        T: Send + 'static,
        F: Fn(&UserDocument) -> TodoResult<T> + Send + Sync + 'static,
    {
        self.run(operation, username, move |store, user| {
            let document = store
                .find(user)?
                .ok_or_else(|| TodoError::UnknownUser(user.to_string()))?;
            view(&document)
        })
        .await
    }

    async fn modify<T, F>(
        &self,
        operation: &'static str,
        username: &str,
        mutate: F,
    ) -> TodoResult<T>
    where
        T: Send + 'static,
        F: Fn(&mut UserDocument) -> TodoResult<T> + Send + Sync + 'static,
    {
        self.run(operation, username, move |store, user| {
            store.modify(user, |document| mutate(document))
        })
        .await
    }
}

fn required_name(value: &str, what: &str) -> TodoResult<String> {
    if value.trim().is_empty() {
        return Err(TodoError::Validation(format!("Missing {what} name")));
    }
    Ok(value.to_string())
}

fn task_mut<'a>(
    document: &'a mut UserDocument,
    list: &ListSelector,
    task_id: &str,
) -> TodoResult<&'a mut Task> {
    let target = match document.list_mut(list.id()) {
        Some(target) => target,
        // An unmaterialized default list holds no tasks.
        None if list.is_default() => return Err(TodoError::UnknownTask(task_id.to_string())),
        None => return Err(TodoError::UnknownList(list.id().to_string())),
    };
    target
        .task_mut(task_id)
        .ok_or_else(|| TodoError::UnknownTask(task_id.to_string()))
}

#[async_trait]
impl<S: DocumentStore> TodoDao for DocumentTodoDao<S> {
    async fn register_user(&self, user: &str, password_hash: &str) -> TodoResult<()> {
        if user.trim().is_empty() {
            return Err(TodoError::Validation("Missing user name".to_string()));
        }
        let password_hash = password_hash.to_string();
        self.run("register_user", user, move |store, user| {
            store.insert(UserDocument::new(user, password_hash.clone()))?;
            Ok(())
        })
        .await?;
        info!(user, "registered user");
        Ok(())
    }

    async fn get_user_password_hash(&self, user: &str) -> TodoResult<Option<String>> {
        self.read("get_user_password_hash", user, |document| {
            Ok(document.password_hash.clone())
        })
        .await
    }

    async fn create_list(&self, user: &str, name: &str) -> TodoResult<String> {
        let name = required_name(name, "list")?;
        let list_id = self
            .modify("create_list", user, move |document| {
                let list = TaskList::new(generate_id(), name.clone());
                let id = list.id.clone();
                document.lists.push(list);
                Ok(id)
            })
            .await?;
        info!(user, list = %list_id, "created list");
        Ok(list_id)
    }

    async fn get_lists(&self, user: &str) -> TodoResult<Vec<ListSummary>> {
        self.read("get_lists", user, |document| Ok(document.summaries()))
            .await
    }

    async fn rename_list(&self, user: &str, list_id: &str, new_name: &str) -> TodoResult<()> {
        let new_name = required_name(new_name, "list")?;
        let list_id = list_id.to_string();
        self.modify("rename_list", user, move |document| {
            let list = document
                .list_mut(&list_id)
                .ok_or_else(|| TodoError::UnknownList(list_id.clone()))?;
            list.name = new_name.clone();
            Ok(())
        })
        .await
    }

    async fn delete_list(&self, user: &str, list_id: &str) -> TodoResult<()> {
        let owned_id = list_id.to_string();
        self.modify("delete_list", user, move |document| {
            if document.remove_list(&owned_id) {
                Ok(())
            } else {
                Err(TodoError::UnknownList(owned_id.clone()))
            }
        })
        .await?;
        info!(user, list = list_id, "deleted list");
        Ok(())
    }

    async fn get_tasks(&self, user: &str, list: &ListSelector) -> TodoResult<Vec<Task>> {
        let list = list.clone();
        self.read("get_tasks", user, move |document| {
            match document.list(list.id()) {
                Some(target) => Ok(target.tasks.clone()),
                None if list.is_default() => Ok(Vec::new()),
                None => Err(TodoError::UnknownList(list.id().to_string())),
            }
        })
        .await
    }

    async fn create_task(
        &self,
        user: &str,
        list: &ListSelector,
        name: &str,
    ) -> TodoResult<String> {
        let name = required_name(name, "task")?;
        let selector = list.clone();
        let task_id = self
            .modify("create_task", user, move |document| {
                let display_name = if selector.is_default() {
                    DEFAULT_LIST_NAME
                } else {
                    selector.id()
                };
                // Materializing the list and appending the task is one atomic update.
                let target = document.list_or_insert(selector.id(), display_name);
                let task = Task::new(name.clone());
                let id = task.id.clone();
                target.tasks.push(task);
                Ok(id)
            })
            .await?;
        debug!(user, list = list.id(), task = %task_id, "created task");
        Ok(task_id)
    }

    async fn rename_task(
        &self,
        user: &str,
        list: &ListSelector,
        task_id: &str,
        new_name: &str,
    ) -> TodoResult<()> {
        let new_name = required_name(new_name, "task")?;
        let list = list.clone();
        let task_id = task_id.to_string();
        self.modify("rename_task", user, move |document| {
            task_mut(document, &list, &task_id)?.name = new_name.clone();
            Ok(())
        })
        .await
    }

    async fn set_task_done(
        &self,
        user: &str,
        list: &ListSelector,
        task_id: &str,
        done: bool,
    ) -> TodoResult<()> {
        let list = list.clone();
        let task_id = task_id.to_string();
        self.modify("set_task_done", user, move |document| {
            task_mut(document, &list, &task_id)?.done = done;
            Ok(())
        })
        .await
    }

    async fn delete_task(&self, user: &str, list: &ListSelector, task_id: &str) -> TodoResult<()> {
        let selector = list.clone();
        let owned_id = task_id.to_string();
        let removed = self
            .modify("delete_task", user, move |document| {
                match document.list_mut(selector.id()) {
                    Some(target) => Ok(target.remove_task(&owned_id)),
                    None if selector.is_default() => Ok(false),
                    None => Err(TodoError::UnknownList(selector.id().to_string())),
                }
            })
            .await?;
        debug!(user, list = list.id(), task = task_id, removed, "deleted task");
        Ok(())
    }
}
