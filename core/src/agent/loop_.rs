use std::collections::VecDeque;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::agent::context::{Phase, PhaseError, TaskContext};
use crate::config::AgentConfig;
use crate::traits::{Actor, Evaluator, Judge, Observer};

/// One snapshot per loop pass; a write-only observability log.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryEntry {
    pub timestamp: i64,
    pub task: String,
    pub context: TaskContext,
}

/// The observe → judge → act → evaluate cycle. Handlers are registered
/// per phase and run in registration order; a failing handler is logged
/// and recorded, and the pass continues with that handler's input
/// context.
pub struct AgentLoop {
    observers: Vec<Box<dyn Observer>>,
    judges: Vec<Box<dyn Judge>>,
    actors: Vec<Box<dyn Actor>>,
    evaluators: Vec<Box<dyn Evaluator>>,
    memory: VecDeque<MemoryEntry>,
    max_iterations: usize,
    memory_size: usize,
}

impl AgentLoop {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            observers: Vec::new(),
            judges: Vec::new(),
            actors: Vec::new(),
            evaluators: Vec::new(),
            memory: VecDeque::new(),
            max_iterations: config.max_iterations,
            memory_size: config.memory_size,
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_memory_size(mut self, size: usize) -> Self {
        self.memory_size = size;
        self
    }

    pub fn register_observer(&mut self, observer: Box<dyn Observer>) {
        self.observers.push(observer);
    }

    pub fn register_judge(&mut self, judge: Box<dyn Judge>) {
        self.judges.push(judge);
    }

    pub fn register_actor(&mut self, actor: Box<dyn Actor>) {
        self.actors.push(actor);
    }

    pub fn register_evaluator(&mut self, evaluator: Box<dyn Evaluator>) {
        self.evaluators.push(evaluator);
    }

    pub fn memory(&self) -> &VecDeque<MemoryEntry> {
        &self.memory
    }

    fn recover(phase: Phase, snapshot: TaskContext, error: anyhow::Error) -> TaskContext {
        error!("{phase} error: {error}");
        let mut ctx = snapshot;
        ctx.phase_errors.push(PhaseError {
            phase,
            message: error.to_string(),
        });
        ctx
    }

    async fn observe(&self, mut ctx: TaskContext) -> TaskContext {
        debug!("Observing environment");
        for observer in &self.observers {
            let snapshot = ctx.clone();
            ctx = match observer.observe(ctx).await {
                Ok(next) => next,
                Err(e) => Self::recover(Phase::Observe, snapshot, e),
            };
        }
        ctx
    }

    async fn judge(&self, mut ctx: TaskContext) -> TaskContext {
        debug!("Making judgment");
        for judge in &self.judges {
            let snapshot = ctx.clone();
            ctx = match judge.judge(ctx).await {
                Ok(next) => next,
                Err(e) => Self::recover(Phase::Judge, snapshot, e),
            };
        }
        ctx
    }

    async fn act(&self, mut ctx: TaskContext) -> TaskContext {
        debug!("Taking action");
        for actor in &self.actors {
            let snapshot = ctx.clone();
            ctx = match actor.act(ctx).await {
                Ok(next) => next,
                Err(e) => Self::recover(Phase::Act, snapshot, e),
            };
        }
        ctx
    }

    async fn evaluate(&self, mut ctx: TaskContext) -> TaskContext {
        debug!("Evaluating results");
        for evaluator in &self.evaluators {
            let snapshot = ctx.clone();
            ctx = match evaluator.evaluate(ctx).await {
                Ok(next) => next,
                Err(e) => Self::recover(Phase::Evaluate, snapshot, e),
            };
        }
        ctx
    }

    fn add_to_memory(&mut self, entry: MemoryEntry) {
        self.memory.push_back(entry);
        while self.memory.len() > self.memory_size {
            self.memory.pop_front();
        }
    }

    /// Run one pass of the four phases and record a memory snapshot.
    pub async fn run_once(&mut self, mut ctx: TaskContext) -> TaskContext {
        ctx.timestamp = Some(Utc::now().timestamp());

        let ctx = self.observe(ctx).await;
        let ctx = self.judge(ctx).await;
        let ctx = self.act(ctx).await;
        let ctx = self.evaluate(ctx).await;

        self.add_to_memory(MemoryEntry {
            timestamp: ctx.timestamp.unwrap_or_default(),
            task: ctx.task.clone(),
            context: ctx.clone(),
        });

        ctx
    }

    /// Drive the loop for a task until it reports completion or the
    /// iteration cap is reached. Returns the final context either way.
    pub async fn run(&mut self, task: &str, initial_context: Option<TaskContext>) -> TaskContext {
        let mut ctx = initial_context.unwrap_or_default();
        ctx.task = task.to_string();
        ctx.iterations = 0;
        ctx.complete = false;

        info!("Starting task: {task}");

        while !ctx.complete && ctx.iterations < self.max_iterations {
            ctx.iterations += 1;
            info!("Iteration {}/{}", ctx.iterations, self.max_iterations);

            ctx = self.run_once(ctx).await;

            if ctx.complete {
                info!("Task completed in {} iterations", ctx.iterations);
                break;
            }
        }

        if !ctx.complete {
            warn!("Task not completed after {} iterations", self.max_iterations);
        }

        ctx
    }
}
