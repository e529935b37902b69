//! Sequential task dispatch over one shared context.

use std::sync::Arc;

use weaver_core::{
    CodeTool, EngineConfig, Error, ImportRef, Result, SharedContext, Tool, ToolKind, ToolReturn,
    WorkerPolicy, bind_inputs, fold, parse_literal,
};
use weaver_runtime::{SubmitOptions, WorkerId, WorkerPool, submit, synthesize};

use crate::report::{RunReport, RunState, TaskFailure};
use crate::resolver::SymbolResolver;
use crate::store::KnowledgeStore;

/// Runs a workflow's tasks one after another, folding each result into the
/// shared context and halting on the first failure.
///
/// Code tools run inside pool workers; import tools run in-process through
/// the symbol resolver. Both fold their return value the same way.
pub struct TaskDispatcher {
    store: Arc<dyn KnowledgeStore>,
    resolver: Arc<dyn SymbolResolver>,
    pool: Arc<WorkerPool>,
    policy: WorkerPolicy,
    submission: SubmitOptions,
}

impl TaskDispatcher {
    /// Create a dispatcher with the default worker policy and submission options
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        resolver: Arc<dyn SymbolResolver>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self {
            store,
            resolver,
            pool,
            policy: WorkerPolicy::default(),
            submission: SubmitOptions::default(),
        }
    }

    /// Use this worker allocation policy for code tools
    #[must_use]
    pub fn with_policy(mut self, policy: WorkerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use these submission options for code tools
    #[must_use]
    pub fn with_submission(mut self, options: SubmitOptions) -> Self {
        self.submission = options;
        self
    }

    /// Apply the dispatch and submission sections of `config`
    #[must_use]
    pub fn with_config(self, config: &EngineConfig) -> Self {
        self.with_policy(config.dispatch.worker_policy.clone())
            .with_submission(SubmitOptions::from(&config.submission))
    }

    /// The pool code tools run in
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Run `workflow` starting from `initial`.
    ///
    /// Task failures are reported in the returned [`RunReport`].
    ///
    /// # Errors
    /// Returns [`Error::UnknownTaskOrTool`] if the workflow itself does not exist
    pub async fn execute(&self, workflow: &str, initial: SharedContext) -> Result<RunReport> {
        self.run(workflow, initial, &self.policy).await
    }

    /// Run `workflow` with every code task on worker `worker_id`.
    ///
    /// The worker is started if it is not registered and is left running
    /// afterwards.
    ///
    /// # Errors
    /// Returns [`Error::UnknownTaskOrTool`] if the workflow itself does not exist
    pub async fn execute_pinned(
        &self,
        workflow: &str,
        initial: SharedContext,
        worker_id: &WorkerId,
    ) -> Result<RunReport> {
        let policy = WorkerPolicy::Pinned(worker_id.to_string());
        self.run(workflow, initial, &policy).await
    }

    async fn run(
        &self,
        name: &str,
        initial: SharedContext,
        policy: &WorkerPolicy,
    ) -> Result<RunReport> {
        let workflow = self.store.workflow(name).await?;
        let mut report = RunReport {
            workflow: workflow.name.clone(),
            state: RunState::Ready,
            context: initial,
            completed_tasks: Vec::new(),
            failure: None,
        };
        tracing::info!(
            workflow = name,
            steps = workflow.steps.len(),
            "Starting workflow"
        );

        for step in workflow.ordered_steps() {
            report.state = RunState::Running(step.order);
            tracing::info!(task = %step.task, order = step.order, "Running task");

            match self.run_task(&step.task, &report.context, policy).await {
                Ok((function, returned)) => {
                    fold(&mut report.context, &function, returned);
                    report.completed_tasks.push(step.task.clone());
                }
                Err(error) => {
                    let failure = TaskFailure {
                        task: step.task.clone(),
                        order: step.order,
                        error,
                    };
                    tracing::warn!(
                        task = %step.task,
                        order = step.order,
                        worker_fault = failure.error.is_worker_fault(),
                        "{failure}"
                    );
                    report.state = RunState::Failed;
                    report.failure = Some(failure);
                    return Ok(report);
                }
            }
        }

        report.state = RunState::Succeeded;
        tracing::info!(
            workflow = name,
            completed = report.completed_tasks.len(),
            "Workflow completed"
        );
        Ok(report)
    }

    /// Run one task; returns the function name and its unfolded return value
    async fn run_task(
        &self,
        name: &str,
        context: &SharedContext,
        policy: &WorkerPolicy,
    ) -> Result<(String, ToolReturn)> {
        let task = self.store.task(name).await?;
        let tool = Tool::try_from(self.store.tool(&task.tool).await?)?;

        match tool.kind {
            ToolKind::Code(code) => {
                let returned = self.run_code(&code, context, policy).await?;
                Ok((code.function, returned))
            }
            ToolKind::Import(reference) => self.run_import(&reference, context).await,
        }
    }

    async fn run_code(
        &self,
        code: &CodeTool,
        context: &SharedContext,
        policy: &WorkerPolicy,
    ) -> Result<ToolReturn> {
        let program = synthesize(code, context)?;

        let (worker_id, release) = match policy {
            WorkerPolicy::FreshPerTask => (self.pool.start(None).await?, true),
            WorkerPolicy::Pinned(id) => {
                let id = WorkerId::new(id.as_str());
                (self.pool.acquire(Some(&id)).await?, false)
            }
        };

        let submission = submit(&self.pool, &worker_id, &program, &self.submission).await;
        tracing::debug!(
            worker_id = %worker_id,
            elapsed_secs = submission.elapsed.as_secs_f64(),
            "Code tool finished"
        );

        if release {
            if submission.timed_out() {
                tracing::warn!(
                    worker_id = %worker_id,
                    "Leaving timed-out worker in the pool until cleanup"
                );
            } else {
                self.pool.stop(&worker_id).await;
            }
        }

        match submission.outcome?.result {
            Some(text) => Ok(ToolReturn::from(parse_literal(&text)?)),
            None => Ok(ToolReturn::Nothing),
        }
    }

    async fn run_import(
        &self,
        reference: &ImportRef,
        context: &SharedContext,
    ) -> Result<(String, ToolReturn)> {
        let function = self
            .resolver
            .resolve(&reference.module, &reference.symbol)
            .ok_or_else(|| Error::UnresolvedImport {
                module: reference.module.clone(),
                symbol: reference.symbol.clone(),
            })?;

        let bound = bind_inputs(function.inputs(), context)?;
        let returned = function.call(bound).await?;
        Ok((function.name().to_owned(), returned))
    }
}
