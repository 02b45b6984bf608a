use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use aegis_core::config::AppConfig;
use aegis_core::event::{EventBus, WorkflowEvent};
use aegis_core::state::SessionState;
use aegis_core::traits::{Checkpointer, DecisionStrategy, LlmClient, RouteStrategy};
use aegis_core::types::{RunOutcome, ScenarioCode, SessionId};

use aegis_agents::{
    ActionExecutor, Adjudicator, ContextGatherer, Conversational, DeterministicRouter,
    GenerativeDecision, GenerativeRouter, Investigator, LogDispatcher, RuleTable,
};
use aegis_graph::WorkflowEngine;
use aegis_lookup::{FixtureDataset, LookupSet};
use aegis_store::SqliteCheckpointStore;

#[derive(Parser)]
#[command(name = "aegis", version, about = "Multi-agent compliance alert resolution")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "aegis.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve an alert end to end
    Resolve {
        /// Alert series code (A-001..A-005) or typology name
        #[arg(long)]
        alert: String,
        /// Session ID (auto-generated if not provided)
        #[arg(short, long)]
        session: Option<String>,
        /// Resume the session from its last checkpoint instead of starting fresh
        #[arg(long)]
        resume: bool,
    },
    /// Ask a question about an alert without resolving it
    Ask {
        /// Alert series code (A-001..A-005) or typology name
        #[arg(long)]
        alert: String,
        /// The question to ask
        #[arg(trailing_var_arg = true, required = true)]
        query: Vec<String>,
    },
    /// List the demo alert catalog
    Scenarios,
    /// Inspect stored checkpoints
    Checkpoints {
        #[command(subcommand)]
        action: CheckpointAction,
    },
    /// Show current configuration
    Config,
}

#[derive(Subcommand)]
enum CheckpointAction {
    /// List stored sessions, newest first
    List,
    /// Delete checkpoints, for one session or all of them
    Clear {
        /// Session ID to clear (omit to clear everything)
        #[arg(short, long)]
        session: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("aegis=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Resolve {
            alert,
            session,
            resume,
        } => {
            let alert = aegis_lookup::scenarios::by_code(ScenarioCode::parse(&alert)?);
            let session_id = session
                .as_deref()
                .map(SessionId::from_str)
                .unwrap_or_default();

            let events = Arc::new(EventBus::default());
            let printer = spawn_event_printer(&events);
            let engine = build_engine(&config, events)?;

            info!(alert = %alert.alert_id, session = %session_id, "Resolving alert");
            let outcome = if resume {
                engine.resume(&session_id).await?
            } else {
                engine
                    .run(SessionState::new_resolve(session_id.clone(), alert))
                    .await?
            };
            printer.await.ok();
            report_outcome(&session_id, outcome);
        }
        Commands::Ask { alert, query } => {
            let alert = aegis_lookup::scenarios::by_code(ScenarioCode::parse(&alert)?);
            let query = query.join(" ");
            let session_id = SessionId::new();

            let events = Arc::new(EventBus::default());
            let printer = spawn_event_printer(&events);
            let engine = build_engine(&config, events)?;

            let outcome = engine
                .run(SessionState::new_conversation(
                    session_id.clone(),
                    alert,
                    query,
                ))
                .await?;
            printer.await.ok();
            match outcome {
                RunOutcome::Conversation { response } => println!("{response}"),
                other => anyhow::bail!("unexpected outcome for a question: {other:?}"),
            }
        }
        Commands::Scenarios => {
            for alert in aegis_lookup::scenarios::all() {
                println!(
                    "{}  {:<35} {}  {}",
                    alert.alert_id, alert.scenario_name, alert.subject_id, alert.trigger_details
                );
            }
        }
        Commands::Checkpoints { action } => {
            let store = SqliteCheckpointStore::open(&config.checkpoint_db_path())?;
            match action {
                CheckpointAction::List => {
                    let summaries = store.list()?;
                    if summaries.is_empty() {
                        println!("No stored sessions.");
                    } else {
                        for s in summaries {
                            println!(
                                "{}  step {:<3} next {:<16} {}",
                                s.session_id,
                                s.step,
                                s.next_node,
                                s.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
                            );
                        }
                    }
                }
                CheckpointAction::Clear { session } => {
                    let removed = match session {
                        Some(id) => store.delete(&SessionId::from_str(&id))?,
                        None => {
                            let mut removed = 0;
                            for s in store.list()? {
                                removed += store.delete(&s.session_id)?;
                            }
                            removed
                        }
                    };
                    println!("Removed {removed} checkpoint(s).");
                }
            }
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Wire the full engine from config: fixture-backed lookups, the configured
/// routing and adjudication strategies, and SQLite checkpointing.
fn build_engine(config: &AppConfig, events: Arc<EventBus>) -> anyhow::Result<WorkflowEngine> {
    let lookups = Arc::new(LookupSet::with_fixtures(Arc::new(FixtureDataset::seeded())));

    let router: Arc<dyn RouteStrategy> = if config.workflow.generative_router {
        let model = config.require_model()?.clone();
        let llm = make_llm(config, &model);
        Arc::new(GenerativeRouter::new(llm, model))
    } else {
        Arc::new(DeterministicRouter)
    };

    let decision: Arc<dyn DecisionStrategy> = if config.workflow.generative_adjudicator {
        let model = config.require_model()?.clone();
        let llm = make_llm(config, &model);
        Arc::new(GenerativeDecision::new(llm, model))
    } else {
        Arc::new(RuleTable)
    };

    let mut engine = WorkflowEngine::new(router, config.workflow.clone())
        .with_events(events)
        .with_agent(Arc::new(Investigator::new(lookups.clone())))
        .with_agent(Arc::new(ContextGatherer::new(lookups.clone())))
        .with_agent(Arc::new(Adjudicator::new(decision)))
        .with_agent(Arc::new(ActionExecutor::new(Arc::new(LogDispatcher))));

    // The conversational flow needs a model; the resolution flow runs
    // fully deterministic without one.
    if let Some(model) = &config.model {
        let llm = make_llm(config, model);
        engine = engine.with_agent(Arc::new(Conversational::new(llm, model.clone(), lookups)));
    }

    if config.checkpoint.enabled {
        let store = SqliteCheckpointStore::open(&config.checkpoint_db_path())?;
        engine = engine.with_checkpointer(Arc::new(store) as Arc<dyn Checkpointer>);
    }

    Ok(engine)
}

fn make_llm(config: &AppConfig, model: &aegis_core::config::ModelConfig) -> Arc<dyn LlmClient> {
    Arc::new(aegis_llm::RetryingClient::new(
        aegis_llm::create_client(model),
        config.retry.clone(),
    ))
}

/// Print workflow progress to stderr until the run ends.
fn spawn_event_printer(events: &EventBus) -> tokio::task::JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event {
                WorkflowEvent::NodeStarted { node, step } => {
                    eprintln!("[step {step}] {node}");
                }
                WorkflowEvent::DirectiveChosen { next, reasoning } => {
                    eprintln!("  -> {next}: {reasoning}");
                }
                WorkflowEvent::NodeRetry { node, failures } => {
                    eprintln!("  [retry] {node} has failed {failures} time(s)");
                }
                WorkflowEvent::ActionDispatched { action } => {
                    eprintln!("  [dispatched] {action}");
                }
                WorkflowEvent::RunCompleted { .. } | WorkflowEvent::RunStuck { .. } => break,
                _ => {}
            }
        }
    })
}

fn report_outcome(session_id: &SessionId, outcome: RunOutcome) {
    match outcome {
        RunOutcome::Completed {
            resolution,
            execution,
        } => {
            println!("Resolution: {}", resolution.action);
            println!("Rule:       {}", resolution.rule_id);
            println!("Confidence: {:.2}", resolution.confidence);
            println!("Rationale:  {}", resolution.rationale);
            if let Some(record) = execution {
                let dispatched: Vec<&str> =
                    record.dispatched.iter().map(|a| a.as_str()).collect();
                println!("Dispatched: {}", dispatched.join(", "));
            }
        }
        RunOutcome::Conversation { response } => println!("{response}"),
        RunOutcome::Stuck { reason } => {
            eprintln!("Session {session_id} is stuck: {reason}");
            eprintln!("Resume it with: aegis resolve --resume --session {session_id} --alert <code>");
        }
    }
}
