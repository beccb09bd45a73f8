use anyhow::Result;
use clap::Parser;

use rondo_core::Agent;
use rondo_core::config::Config;

mod server;

#[derive(Parser)]
#[command(name = "rondo")]
#[command(about = "rondo - an observe/judge/act/evaluate agent for browsing and programming tasks", long_about = None)]
struct Cli {
    /// API key for the LLM provider
    #[arg(long)]
    api_key: Option<String>,

    /// Host for the web server
    #[arg(long)]
    host: Option<String>,

    /// Port for the web server
    #[arg(long)]
    port: Option<u16>,

    /// Run the browser in headless mode
    #[arg(long)]
    headless: bool,

    /// Run a single task and exit
    #[arg(long)]
    task: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let cli = Cli::parse();

    let mut config = Config::load_or_default()?;
    if let Some(api_key) = cli.api_key {
        config.llm.api_key = api_key;
    }
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.headless {
        config.browser.headless = true;
    }

    if let Some(task) = cli.task {
        run_task(&config, &task).await;
        return Ok(());
    }

    server::run(config).await
}

async fn run_task(config: &Config, task: &str) {
    let mut agent = Agent::new(config);
    let result = agent.run(task, None).await;

    println!("\nTask result:");
    println!("Task: {task}");
    println!("Completed: {}", result.complete);
    println!("Iterations: {}", result.iterations);

    if let Some(results) = &result.action_results {
        println!("\nAction results:");
        match serde_json::to_string_pretty(results) {
            Ok(rendered) => println!("{rendered}"),
            Err(_) => println!("{results:?}"),
        }
    }

    if let Some(evaluation) = &result.evaluation {
        println!("\nEvaluation:");
        println!("success: {}", evaluation.success);
        println!("feedback: {}", evaluation.feedback);
    }
}
