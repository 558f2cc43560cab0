//! Dashboard-visible tool tasks
//!
//! Every dynamic tool execution runs as a tracked task so the operator can
//! list and cancel long-running tool work. Builtin tools are instantaneous
//! and are not tracked.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::descriptor::ToolHandler;
use crate::error::AgentError;

const KEEP_FINISHED_TASKS: usize = 64;

/// Lifecycle of a tool task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Handler still executing
    Running,
    /// Handler returned a result
    Completed,
    /// Handler returned an error
    Failed,
    /// Aborted from the dashboard
    Cancelled,
}

/// One tracked tool execution
#[derive(Debug, Clone, Serialize)]
pub struct ToolTask {
    /// Task id, unique per process
    pub id: u64,
    /// Agent that owned the tool
    pub agent: String,
    /// Tool name
    pub tool: String,
    /// When execution started
    pub started_at: DateTime<Utc>,
    /// Current state
    pub state: TaskState,
}

struct TaskEntry {
    info: ToolTask,
    abort: Option<AbortHandle>,
}

/// Registry of running and recently finished tool tasks
pub struct TaskRegistry {
    next_id: AtomicU64,
    tasks: DashMap<u64, TaskEntry>,
}

impl TaskRegistry {
    /// Empty registry
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(1),
            tasks: DashMap::new(),
        })
    }

    /// Run a dynamic handler as a tracked, cancellable task
    pub async fn run(
        &self,
        agent: &str,
        tool: &str,
        handler: Arc<dyn ToolHandler>,
        args: Value,
    ) -> Result<String, AgentError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let join = tokio::spawn(async move { handler.call(args).await });
        self.tasks.insert(
            id,
            TaskEntry {
                info: ToolTask {
                    id,
                    agent: agent.to_string(),
                    tool: tool.to_string(),
                    started_at: Utc::now(),
                    state: TaskState::Running,
                },
                abort: Some(join.abort_handle()),
            },
        );
        debug!(id, agent, tool, "tool task started");

        let result = match join.await {
            Ok(Ok(output)) => {
                self.finish(id, TaskState::Completed);
                Ok(output)
            }
            Ok(Err(e)) => {
                self.finish(id, TaskState::Failed);
                Err(e)
            }
            Err(join_err) if join_err.is_cancelled() => {
                self.finish(id, TaskState::Cancelled);
                Err(AgentError::Cancelled)
            }
            Err(join_err) => {
                self.finish(id, TaskState::Failed);
                Err(AgentError::Tool {
                    reason: join_err.to_string(),
                })
            }
        };
        self.prune();
        result
    }

    fn finish(&self, id: u64, state: TaskState) {
        if let Some(mut entry) = self.tasks.get_mut(&id) {
            entry.info.state = state;
            entry.abort = None;
        }
    }

    fn prune(&self) {
        let finished: Vec<u64> = self
            .tasks
            .iter()
            .filter(|e| e.info.state != TaskState::Running)
            .map(|e| e.info.id)
            .collect();
        if finished.len() > KEEP_FINISHED_TASKS {
            let mut ids = finished;
            ids.sort_unstable();
            for id in &ids[..ids.len() - KEEP_FINISHED_TASKS] {
                self.tasks.remove(id);
            }
        }
    }

    /// Snapshot for `GET /tasks`, newest first
    pub fn list(&self) -> Vec<ToolTask> {
        let mut tasks: Vec<ToolTask> = self.tasks.iter().map(|e| e.info.clone()).collect();
        tasks.sort_by_key(|t| std::cmp::Reverse(t.id));
        tasks
    }

    /// Abort a running task. Returns whether anything was cancelled.
    pub fn cancel(&self, id: u64) -> bool {
        if let Some(mut entry) = self.tasks.get_mut(&id) {
            if let Some(abort) = entry.abort.take() {
                abort.abort();
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    struct SlowTool;

    #[async_trait]
    impl ToolHandler for SlowTool {
        async fn call(&self, _args: Value) -> Result<String, AgentError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("done".into())
        }
    }

    struct EchoTool;

    #[async_trait]
    impl ToolHandler for EchoTool {
        async fn call(&self, args: Value) -> Result<String, AgentError> {
            Ok(args["text"].as_str().unwrap_or("").to_string())
        }
    }

    #[tokio::test]
    async fn completed_task_returns_output() {
        let registry = TaskRegistry::new();
        let result = registry
            .run(
                "main_agent",
                "echo",
                Arc::new(EchoTool),
                serde_json::json!({"text": "hi"}),
            )
            .await
            .unwrap();
        assert_eq!(result, "hi");
        let tasks = registry.list();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].state, TaskState::Completed);
    }

    #[tokio::test]
    async fn cancel_aborts_running_task() {
        let registry = TaskRegistry::new();
        let registry2 = registry.clone();
        let run = tokio::spawn(async move {
            registry2
                .run("main_agent", "slow", Arc::new(SlowTool), Value::Null)
                .await
        });
        // Wait for the task to appear, then cancel it.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let id = registry.list()[0].id;
        assert!(registry.cancel(id));

        let result = run.await.unwrap();
        assert!(matches!(result, Err(AgentError::Cancelled)));
        assert_eq!(registry.list()[0].state, TaskState::Cancelled);
    }

    #[tokio::test]
    async fn cancel_unknown_task_is_false() {
        let registry = TaskRegistry::new();
        assert!(!registry.cancel(404));
    }
}
