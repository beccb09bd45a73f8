pub mod agent;
pub mod browser;
pub mod config;
pub mod providers;
pub mod tools;
pub mod traits;

pub use agent::{
    ActionDescriptor, ActionResults, Agent, AgentLoop, Evaluation, MemoryEntry, Observations,
    TaskContext,
};
pub use browser::{Browser, BrowserManager};
pub use config::*;
pub use providers::*;
pub use tools::*;
pub use traits::*;
