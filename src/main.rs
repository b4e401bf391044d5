use sales_agent::config::AgentConfig;
use sales_agent::db::{init_pool, MySqlExecutor};
use sales_agent::observability::{logger::DEFAULT_HISTORY, QueryLogger};
use sales_agent::{CompanyId, LlmClient, SalesAgent, SessionContext};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sales-agent")]
#[command(about = "Ask questions about your sales data in plain English")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Hide the intent and SQL footer under each answer
    #[arg(long, global = true)]
    hide_sql: bool,

    /// Never ask the model to phrase single-row answers
    #[arg(long, global = true)]
    no_summaries: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one question and exit
    Ask {
        /// The question in natural language
        question: String,

        /// Company the question is scoped to
        #[arg(short, long)]
        company: CompanyId,
    },
    /// Interactive session pinned to one company
    Chat {
        #[arg(short, long)]
        company: CompanyId,
    },
    /// Show how a question would be resolved, without touching the database
    Explain {
        question: String,

        #[arg(short, long)]
        company: CompanyId,
    },
    /// List company ids that have sales
    Companies,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = AgentConfig::from_env().context("failed to load configuration")?;
    if args.hide_sql {
        config.show_sql = false;
    }
    if args.no_summaries {
        config.llm_summaries = false;
    }

    match args.command {
        Commands::Explain { question, company } => {
            let llm = Arc::new(LlmClient::new(&config.llm)?);
            let agent = SalesAgent::new(&config, llm, Arc::new(OfflineExecutor));
            println!("{}", agent.plan(&question, company));
        }
        Commands::Companies => {
            let executor = connect(&config).await?;
            let companies = executor.list_companies().await?;
            if companies.is_empty() {
                println!("No companies with sales found.");
            }
            for id in companies {
                println!("{}", id);
            }
            executor.close().await;
        }
        Commands::Ask { question, company } => {
            let agent = build_agent(&config).await?;
            let session = SessionContext::new(company);
            println!("{}", agent.process(&session, &question).await);
        }
        Commands::Chat { company } => {
            let agent = build_agent(&config).await?;
            run_chat(&agent, &SessionContext::new(company)).await?;
        }
    }

    Ok(())
}

async fn connect(config: &AgentConfig) -> Result<MySqlExecutor> {
    let database = config.require_database()?;
    let pool = init_pool(database)
        .await
        .with_context(|| format!("failed to connect to {}", database.describe()))?;
    Ok(MySqlExecutor::new(pool, Duration::from_secs(config.query_timeout_secs)))
}

async fn build_agent(config: &AgentConfig) -> Result<SalesAgent> {
    let executor = Arc::new(connect(config).await?);
    let llm = Arc::new(LlmClient::new(&config.llm)?);
    info!("Using {} model {}", llm.provider(), llm.model());
    let logger = Arc::new(QueryLogger::new(config.query_log_path.clone(), DEFAULT_HISTORY));
    Ok(SalesAgent::new(config, llm, executor).with_logger(logger))
}

async fn run_chat(agent: &SalesAgent, session: &SessionContext) -> Result<()> {
    println!("💬 Sales chat for company {}. Type 'exit' to quit.", session.company_id());
    let stdin = io::stdin();
    loop {
        print!("\n> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }
        println!("\n{}", agent.process(session, question).await);
    }
    Ok(())
}

/// Executor for dry runs; `explain` never executes anything.
struct OfflineExecutor;

#[async_trait::async_trait]
impl sales_agent::QueryExecutor for OfflineExecutor {
    async fn execute(&self, _sql: &str) -> sales_agent::Result<Vec<sales_agent::ResultRow>> {
        Err(sales_agent::AgentError::Config("no database in dry-run mode".to_string()))
    }
}
