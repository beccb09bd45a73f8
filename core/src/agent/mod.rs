pub mod context;
pub mod loop_;

pub use context::{
    ActionDescriptor, ActionResults, Evaluation, Observations, Phase, PhaseError, TaskContext,
};
pub use loop_::{AgentLoop, MemoryEntry};

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::error;

use crate::browser::BrowserManager;
use crate::config::{AgentConfig, Config};
use crate::providers::{ChatMessage, LlmClient, next_action_prompts};
use crate::tools;
use crate::traits::{Actor, Evaluator, Judge, Observer};

/// Wires one handler per loop phase to the LLM client, the browser
/// manager, and the code tools.
pub struct Agent {
    agent_loop: AgentLoop,
}

impl Agent {
    pub fn new(config: &Config) -> Self {
        let llm = Arc::new(LlmClient::new(&config.llm));
        let browser = Arc::new(Mutex::new(BrowserManager::new(&config.browser)));

        let mut agent_loop = AgentLoop::new(&config.agent);
        agent_loop.register_observer(Box::new(EnvironmentObserver {
            browser: browser.clone(),
        }));
        agent_loop.register_judge(Box::new(NextActionJudge {
            llm,
            agent_config: config.agent.clone(),
        }));
        agent_loop.register_actor(Box::new(ActionActor { browser }));
        agent_loop.register_evaluator(Box::new(ResultEvaluator));

        Self { agent_loop }
    }

    pub async fn run(&mut self, task: &str, initial_context: Option<TaskContext>) -> TaskContext {
        self.agent_loop.run(task, initial_context).await
    }

    pub fn memory(&self) -> &std::collections::VecDeque<MemoryEntry> {
        self.agent_loop.memory()
    }
}

/// Observe phase: refresh page content (and optionally a screenshot) for
/// the URL the task is currently on.
struct EnvironmentObserver {
    browser: Arc<Mutex<BrowserManager>>,
}

impl EnvironmentObserver {
    async fn observe_browser(
        manager: &mut BrowserManager,
        url: &str,
        ctx: &TaskContext,
    ) -> Result<Observations> {
        let browser = manager.acquire().await?;
        browser.open(url).await?;

        let mut observations = Observations {
            browser_content: Some(browser.get_content().await),
            ..Default::default()
        };

        if ctx.take_screenshot {
            let path = std::env::temp_dir().join(format!("rondo_screenshot_{}.png", ctx.iterations));
            if browser.screenshot(&path).await {
                observations.screenshot_path = Some(path.display().to_string());
            }
        }

        Ok(observations)
    }
}

#[async_trait]
impl Observer for EnvironmentObserver {
    async fn observe(&self, mut ctx: TaskContext) -> Result<TaskContext> {
        let mut observations = Observations::default();

        if let Some(url) = ctx.browser_url.clone() {
            let mut manager = self.browser.lock().await;
            match Self::observe_browser(&mut manager, &url, &ctx).await {
                Ok(browsed) => observations = browsed,
                Err(e) => {
                    error!("Error observing browser: {e}");
                    observations.browser_error = Some(e.to_string());
                }
            }
            manager.release().await;
        }

        ctx.observations = observations;
        Ok(ctx)
    }
}

/// Judge phase: ask the model for the next action and parse its answer.
struct NextActionJudge {
    llm: Arc<LlmClient>,
    agent_config: AgentConfig,
}

#[async_trait]
impl Judge for NextActionJudge {
    async fn judge(&self, mut ctx: TaskContext) -> Result<TaskContext> {
        let (system_prompt, user_message) = next_action_prompts(&self.agent_config, &ctx);
        let response = self
            .llm
            .generate(
                &[ChatMessage::user(user_message)],
                Some(&system_prompt),
                None,
                None,
            )
            .await;

        ctx.parsed_action = Some(ActionDescriptor::parse(&response));
        ctx.next_action = Some(response);
        Ok(ctx)
    }
}

/// Act phase: dispatch the parsed action to the browser or code tools.
/// Missing parameters and downstream failures land in the result's
/// `error` field; the handler itself never fails the pass.
struct ActionActor {
    browser: Arc<Mutex<BrowserManager>>,
}

impl ActionActor {
    async fn dispatch(&self, action: &ActionDescriptor, ctx: &mut TaskContext) -> ActionResults {
        match action.action.as_str() {
            "browse" => self.browse(action, ctx).await,
            "click" => self.click(action, ctx).await,
            "type" => self.type_text(action, ctx).await,
            "execute_code" => Self::execute_code(action).await,
            "search_code" => Self::search_code(action),
            "analyze_code" => Self::analyze_code(action).await,
            "complete" => {
                ctx.complete = true;
                ActionResults::with_message("Task completed successfully")
            }
            other => ActionResults::with_error(format!("Unknown action: {other}")),
        }
    }

    async fn browse(&self, action: &ActionDescriptor, ctx: &mut TaskContext) -> ActionResults {
        let Some(url) = action.str_param("url") else {
            return ActionResults::with_error("No URL provided for browse action");
        };

        let mut manager = self.browser.lock().await;
        let outcome = Self::open_and_read(&mut manager, url).await;
        manager.release().await;

        match outcome {
            Ok(content) => {
                // Remember the URL so the observe phase keeps watching it.
                ctx.browser_url = Some(url.to_string());
                ActionResults::with_browser_content(content)
            }
            Err(e) => {
                error!("Error executing action browse: {e}");
                ActionResults::with_error(e.to_string())
            }
        }
    }

    async fn click(&self, action: &ActionDescriptor, ctx: &mut TaskContext) -> ActionResults {
        let (Some(selector), Some(url)) = (action.str_param("selector"), ctx.browser_url.clone())
        else {
            return ActionResults::with_error(
                "No selector or browser URL provided for click action",
            );
        };

        let mut manager = self.browser.lock().await;
        let outcome = async {
            let browser = manager.acquire().await?;
            browser.open(&url).await?;
            browser.click(selector).await?;
            Ok::<_, anyhow::Error>(browser.get_content().await)
        }
        .await;
        manager.release().await;

        match outcome {
            Ok(content) => ActionResults::with_browser_content(content),
            Err(e) => {
                error!("Error executing action click: {e}");
                ActionResults::with_error(e.to_string())
            }
        }
    }

    async fn type_text(&self, action: &ActionDescriptor, ctx: &mut TaskContext) -> ActionResults {
        let (Some(selector), Some(text), Some(url)) = (
            action.str_param("selector"),
            action.str_param("text"),
            ctx.browser_url.clone(),
        ) else {
            return ActionResults::with_error(
                "No selector, text, or browser URL provided for type action",
            );
        };

        let mut manager = self.browser.lock().await;
        let outcome = async {
            let browser = manager.acquire().await?;
            browser.open(&url).await?;
            browser.type_text(selector, text).await?;
            Ok::<_, anyhow::Error>(browser.get_content().await)
        }
        .await;
        manager.release().await;

        match outcome {
            Ok(content) => ActionResults::with_browser_content(content),
            Err(e) => {
                error!("Error executing action type: {e}");
                ActionResults::with_error(e.to_string())
            }
        }
    }

    async fn open_and_read(manager: &mut BrowserManager, url: &str) -> Result<String> {
        let browser = manager.acquire().await?;
        browser.open(url).await?;
        Ok(browser.get_content().await)
    }

    async fn execute_code(action: &ActionDescriptor) -> ActionResults {
        let Some(code) = action.str_param("code") else {
            return ActionResults::with_error("No code provided for execute_code action");
        };
        let language = action.str_param("language").unwrap_or("python");

        let execution = tools::execute_code(code, language).await;
        ActionResults {
            error: (!execution.success).then(|| execution.error.clone()),
            execution: Some(execution),
            ..Default::default()
        }
    }

    fn search_code(action: &ActionDescriptor) -> ActionResults {
        let Some(query) = action.str_param("query") else {
            return ActionResults::with_error("No query provided for search_code action");
        };
        let language = action.str_param("language");

        ActionResults {
            search: Some(tools::search_code(query, language)),
            ..Default::default()
        }
    }

    async fn analyze_code(action: &ActionDescriptor) -> ActionResults {
        let Some(code) = action.str_param("code") else {
            return ActionResults::with_error("No code provided for analyze_code action");
        };
        let language = action.str_param("language").unwrap_or("python");

        ActionResults {
            analysis: Some(tools::analyze_code(code, language).await),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Actor for ActionActor {
    async fn act(&self, mut ctx: TaskContext) -> Result<TaskContext> {
        let action = ctx
            .parsed_action
            .clone()
            .unwrap_or_else(|| ActionDescriptor::unknown(""));

        let results = self.dispatch(&action, &mut ctx).await;
        ctx.action_results = Some(results);
        Ok(ctx)
    }
}

/// Evaluate phase: success is simply the absence of an action error.
struct ResultEvaluator;

#[async_trait]
impl Evaluator for ResultEvaluator {
    async fn evaluate(&self, mut ctx: TaskContext) -> Result<TaskContext> {
        let action = ctx
            .parsed_action
            .as_ref()
            .map(|a| a.action.clone())
            .unwrap_or_else(|| "unknown".to_string());
        let results = ctx.action_results.clone().unwrap_or_default();

        ctx.evaluation = Some(match results.error {
            Some(e) => Evaluation {
                success: false,
                feedback: format!("Error: {e}"),
            },
            None => Evaluation {
                success: true,
                feedback: format!("Action {action} executed successfully"),
            },
        });

        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrowserConfig;

    fn test_actor() -> ActionActor {
        ActionActor {
            browser: Arc::new(Mutex::new(BrowserManager::new(&BrowserConfig::default()))),
        }
    }

    #[tokio::test]
    async fn browse_without_url_reports_error_and_stays_incomplete() {
        let actor = test_actor();
        let mut ctx = TaskContext::default();
        ctx.parsed_action = Some(ActionDescriptor::new("browse"));

        let ctx = actor.act(ctx).await.unwrap();

        let results = ctx.action_results.unwrap();
        assert_eq!(
            results.error.as_deref(),
            Some("No URL provided for browse action")
        );
        assert!(!ctx.complete);
    }

    #[tokio::test]
    async fn click_without_selector_or_url_reports_error() {
        let actor = test_actor();
        let mut ctx = TaskContext::default();
        ctx.parsed_action = Some(ActionDescriptor::new("click"));

        let ctx = actor.act(ctx).await.unwrap();

        assert_eq!(
            ctx.action_results.unwrap().error.as_deref(),
            Some("No selector or browser URL provided for click action")
        );
    }

    #[tokio::test]
    async fn type_without_parameters_reports_error() {
        let actor = test_actor();
        let mut ctx = TaskContext::default();
        ctx.browser_url = Some("https://example.com".to_string());
        ctx.parsed_action = Some(ActionDescriptor::new("type").with_param("selector", "#input"));

        let ctx = actor.act(ctx).await.unwrap();

        assert_eq!(
            ctx.action_results.unwrap().error.as_deref(),
            Some("No selector, text, or browser URL provided for type action")
        );
    }

    #[tokio::test]
    async fn complete_action_marks_context_complete() {
        let actor = test_actor();
        let mut ctx = TaskContext::default();
        ctx.parsed_action = Some(ActionDescriptor::new("complete"));

        let ctx = actor.act(ctx).await.unwrap();

        assert!(ctx.complete);
        assert_eq!(
            ctx.action_results.unwrap().message.as_deref(),
            Some("Task completed successfully")
        );
    }

    #[tokio::test]
    async fn unknown_action_reports_error() {
        let actor = test_actor();
        let mut ctx = TaskContext::default();
        ctx.parsed_action = Some(ActionDescriptor::new("levitate"));

        let ctx = actor.act(ctx).await.unwrap();

        assert_eq!(
            ctx.action_results.unwrap().error.as_deref(),
            Some("Unknown action: levitate")
        );
    }

    #[tokio::test]
    async fn search_code_action_returns_snippets() {
        let actor = test_actor();
        let mut ctx = TaskContext::default();
        ctx.parsed_action = Some(
            ActionDescriptor::new("search_code")
                .with_param("query", "sorting")
                .with_param("language", "python"),
        );

        let ctx = actor.act(ctx).await.unwrap();

        let results = ctx.action_results.unwrap();
        assert!(results.error.is_none());
        assert!(!results.search.unwrap().results.is_empty());
    }

    #[tokio::test]
    async fn evaluator_reports_success_without_error() {
        let mut ctx = TaskContext::default();
        ctx.parsed_action = Some(ActionDescriptor::new("complete"));
        ctx.action_results = Some(ActionResults::with_message("Task completed successfully"));

        let ctx = ResultEvaluator.evaluate(ctx).await.unwrap();

        let evaluation = ctx.evaluation.unwrap();
        assert!(evaluation.success);
        assert_eq!(evaluation.feedback, "Action complete executed successfully");
    }

    #[tokio::test]
    async fn evaluator_reports_failure_on_error() {
        let mut ctx = TaskContext::default();
        ctx.parsed_action = Some(ActionDescriptor::new("browse"));
        ctx.action_results = Some(ActionResults::with_error("No URL provided for browse action"));

        let ctx = ResultEvaluator.evaluate(ctx).await.unwrap();

        let evaluation = ctx.evaluation.unwrap();
        assert!(!evaluation.success);
        assert_eq!(
            evaluation.feedback,
            "Error: No URL provided for browse action"
        );
    }

    #[tokio::test]
    async fn complete_action_ends_the_loop_early() {
        struct CompleteJudge;

        #[async_trait]
        impl Judge for CompleteJudge {
            async fn judge(&self, mut ctx: TaskContext) -> Result<TaskContext> {
                ctx.parsed_action = Some(ActionDescriptor::new("complete"));
                Ok(ctx)
            }
        }

        let config = Config::default();
        let mut agent_loop = AgentLoop::new(&config.agent);
        agent_loop.register_judge(Box::new(CompleteJudge));
        agent_loop.register_actor(Box::new(ActionActor {
            browser: Arc::new(Mutex::new(BrowserManager::new(&config.browser))),
        }));
        agent_loop.register_evaluator(Box::new(ResultEvaluator));

        let result = agent_loop.run("finish immediately", None).await;

        assert!(result.complete);
        assert_eq!(result.iterations, 1);
        assert!(result.evaluation.unwrap().success);
    }
}
