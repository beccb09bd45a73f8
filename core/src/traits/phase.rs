use anyhow::Result;
use async_trait::async_trait;

use crate::agent::TaskContext;

#[async_trait]
pub trait Observer: Send + Sync {
    async fn observe(&self, ctx: TaskContext) -> Result<TaskContext>;
}

#[async_trait]
pub trait Judge: Send + Sync {
    async fn judge(&self, ctx: TaskContext) -> Result<TaskContext>;
}

#[async_trait]
pub trait Actor: Send + Sync {
    async fn act(&self, ctx: TaskContext) -> Result<TaskContext>;
}

#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, ctx: TaskContext) -> Result<TaskContext>;
}
