//! Knowledge store: where workflows, tasks and tools are looked up.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use weaver_core::{Error, Result, Task, ToolRecord, Workflow, WorkflowStep};

/// Source of workflow, task and tool definitions for the dispatcher.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Load a workflow by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTaskOrTool`] if no workflow has this name.
    async fn workflow(&self, name: &str) -> Result<Workflow>;

    /// Load a task by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTaskOrTool`] if no task has this name.
    async fn task(&self, name: &str) -> Result<Task>;

    /// Load a raw tool record by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTaskOrTool`] if no tool has this name.
    async fn tool(&self, name: &str) -> Result<ToolRecord>;
}

#[derive(Default)]
struct Records {
    tools: HashMap<String, ToolRecord>,
    tasks: HashMap<String, Task>,
    workflows: HashMap<String, Workflow>,
}

/// In-memory [`KnowledgeStore`] that keeps workflow step orders contiguous from 1.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Records>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a tool record
    pub fn insert_tool(&self, record: ToolRecord) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.tools.insert(record.name.clone(), record);
    }

    /// Add or replace a task
    pub fn insert_task(&self, task: Task) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.tasks.insert(task.name.clone(), task);
    }

    /// Create a workflow from task names, numbered in the given order
    pub fn create_workflow<S: AsRef<str>>(&self, name: &str, description: &str, tasks: &[S]) {
        let steps = (1..)
            .zip(tasks)
            .map(|(order, task)| WorkflowStep {
                order,
                task: task.as_ref().to_owned(),
            })
            .collect();
        let workflow = Workflow {
            name: name.to_owned(),
            description: description.to_owned(),
            steps,
        };
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.workflows.insert(name.to_owned(), workflow);
    }

    /// Insert `task` at position `order`, shifting later steps up by one.
    ///
    /// An order past the end appends.
    ///
    /// # Errors
    /// Returns [`Error::UnknownTaskOrTool`] if the workflow does not exist
    pub fn add_task_to_workflow(&self, workflow: &str, task: &str, order: u32) -> Result<()> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let entry = records
            .workflows
            .get_mut(workflow)
            .ok_or_else(|| Error::UnknownTaskOrTool(workflow.to_owned()))?;

        let last = u32::try_from(entry.steps.len()).unwrap_or(u32::MAX);
        let order = order.clamp(1, last.saturating_add(1));
        for step in &mut entry.steps {
            if step.order >= order {
                step.order += 1;
            }
        }
        entry.steps.push(WorkflowStep {
            order,
            task: task.to_owned(),
        });
        entry.steps.sort_by_key(|step| step.order);
        Ok(())
    }

    /// Remove the first step running `task`, shifting later steps down by one.
    ///
    /// Returns whether a step was removed.
    ///
    /// # Errors
    /// Returns [`Error::UnknownTaskOrTool`] if the workflow does not exist
    pub fn remove_task_from_workflow(&self, workflow: &str, task: &str) -> Result<bool> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let entry = records
            .workflows
            .get_mut(workflow)
            .ok_or_else(|| Error::UnknownTaskOrTool(workflow.to_owned()))?;

        entry.steps.sort_by_key(|step| step.order);
        let Some(position) = entry.steps.iter().position(|step| step.task == task) else {
            return Ok(false);
        };
        let removed = entry.steps.remove(position);
        for step in &mut entry.steps {
            if step.order > removed.order {
                step.order -= 1;
            }
        }
        Ok(true)
    }

    /// Every task, sorted by name
    pub fn list_tasks(&self) -> Vec<Task> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut tasks: Vec<Task> = records.tasks.values().cloned().collect();
        tasks.sort_by(|left, right| left.name.cmp(&right.name));
        tasks
    }
}

#[async_trait]
impl KnowledgeStore for MemoryStore {
    async fn workflow(&self, name: &str) -> Result<Workflow> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .workflows
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownTaskOrTool(name.to_owned()))
    }

    async fn task(&self, name: &str) -> Result<Task> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tasks
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownTaskOrTool(name.to_owned()))
    }

    async fn tool(&self, name: &str) -> Result<ToolRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tools
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownTaskOrTool(name.to_owned()))
    }
}
