//! End-to-end runs over the seeded fixture dataset: real agents, real rule
//! table, deterministic routing, captured side effects.

use std::sync::Arc;

use aegis_agents::{
    ActionExecutor, Adjudicator, ContextGatherer, Conversational, DeterministicRouter,
    Investigator, RuleTable,
};
use aegis_core::config::WorkflowConfig;
use aegis_core::state::SessionState;
use aegis_core::types::{
    AlertContext, OutboundAction, ResolutionAction, RunOutcome, ScenarioCode, SessionId,
};
use aegis_graph::WorkflowEngine;
use aegis_lookup::{FixtureDataset, LookupSet};
use aegis_store::SqliteCheckpointStore;
use aegis_test_utils::{demo_alert, test_model_config, CapturingDispatcher, ScriptedLlm};

fn fixture_lookups() -> Arc<LookupSet> {
    Arc::new(LookupSet::with_fixtures(Arc::new(FixtureDataset::seeded())))
}

fn engine_with(
    dispatcher: Arc<CapturingDispatcher>,
    store: Option<Arc<SqliteCheckpointStore>>,
) -> WorkflowEngine {
    let lookups = fixture_lookups();
    let mut engine = WorkflowEngine::new(Arc::new(DeterministicRouter), WorkflowConfig::default())
        .with_agent(Arc::new(Investigator::new(lookups.clone())))
        .with_agent(Arc::new(ContextGatherer::new(lookups)))
        .with_agent(Arc::new(Adjudicator::new(Arc::new(RuleTable))))
        .with_agent(Arc::new(ActionExecutor::new(dispatcher)));
    if let Some(store) = store {
        engine = engine.with_checkpointer(store);
    }
    engine
}

#[tokio::test]
async fn structuring_alert_escalates_to_sar() {
    let dispatcher = Arc::new(CapturingDispatcher::new());
    let engine = engine_with(dispatcher.clone(), None);

    let outcome = engine
        .run(SessionState::new_resolve(
            SessionId::new(),
            demo_alert(ScenarioCode::Structuring),
        ))
        .await
        .unwrap();

    match outcome {
        RunOutcome::Completed {
            resolution,
            execution,
        } => {
            // CUST-102's linked aggregate of $28,500 crosses the $28k line.
            assert_eq!(resolution.action, ResolutionAction::EscalateSar);
            assert_eq!(resolution.rule_id, "A-002.1");
            let record = execution.unwrap();
            assert_eq!(
                record.dispatched,
                vec![OutboundAction::SarFiling, OutboundAction::CaseToHumanQueue]
            );
        }
        other => panic!("expected completion, got {other:?}"),
    }
    assert_eq!(
        dispatcher.dispatched(),
        vec![OutboundAction::SarFiling, OutboundAction::CaseToHumanQueue]
    );
}

#[tokio::test]
async fn confirmed_watchlist_hit_blocks_the_account() {
    let dispatcher = Arc::new(CapturingDispatcher::new());
    let engine = engine_with(dispatcher.clone(), None);

    // Mahmoud Al-Hassan matches the seeded watchlist at 0.98 confidence.
    let alert = AlertContext::new(
        "A-004",
        ScenarioCode::SanctionsHit,
        "CUST-104",
        "Counterparty 'Mahmoud Al-Hassan' exact match against consolidated watchlists",
    );
    let outcome = engine
        .run(SessionState::new_resolve(SessionId::new(), alert))
        .await
        .unwrap();

    match outcome {
        RunOutcome::Completed { resolution, .. } => {
            assert_eq!(resolution.action, ResolutionAction::BlockAccount);
            assert_eq!(resolution.rule_id, "A-004.1");
        }
        other => panic!("expected completion, got {other:?}"),
    }
    assert_eq!(
        dispatcher.dispatched(),
        vec![
            OutboundAction::AccountFreeze,
            OutboundAction::SanctionsTeamNotice,
            OutboundAction::LegalEscalation,
        ]
    );
}

#[tokio::test]
async fn weak_fuzzy_match_closes_as_false_positive() {
    let dispatcher = Arc::new(CapturingDispatcher::new());
    let engine = engine_with(dispatcher.clone(), None);

    // The demo A-004 alert names 'Deepak', a 0.15-confidence fuzzy match.
    let outcome = engine
        .run(SessionState::new_resolve(
            SessionId::new(),
            demo_alert(ScenarioCode::SanctionsHit),
        ))
        .await
        .unwrap();

    match outcome {
        RunOutcome::Completed { resolution, .. } => {
            assert_eq!(resolution.action, ResolutionAction::FalsePositive);
            assert_eq!(resolution.rule_id, "A-004.3");
        }
        other => panic!("expected completion, got {other:?}"),
    }
    assert_eq!(dispatcher.dispatched(), vec![OutboundAction::ClosureRecord]);
}

#[tokio::test]
async fn dormant_reactivation_rfi_includes_ivr_callback() {
    let dispatcher = Arc::new(CapturingDispatcher::new());
    let engine = engine_with(dispatcher.clone(), None);

    // CUST-105: dormant 16 months, high risk rating, so the SAR rule wins.
    let outcome = engine
        .run(SessionState::new_resolve(
            SessionId::new(),
            demo_alert(ScenarioCode::DormantReactivation),
        ))
        .await
        .unwrap();

    match outcome {
        RunOutcome::Completed { resolution, .. } => {
            assert_eq!(resolution.action, ResolutionAction::EscalateSar);
            assert_eq!(resolution.rule_id, "A-005.1");
        }
        other => panic!("expected completion, got {other:?}"),
    }
}

#[tokio::test]
async fn conversation_flow_answers_without_resolving() {
    let llm = Arc::new(
        ScriptedLlm::new().respond("CUST-102 made three cash deposits just under $10k each."),
    );
    let lookups = fixture_lookups();
    let engine = WorkflowEngine::new(Arc::new(DeterministicRouter), WorkflowConfig::default())
        .with_agent(Arc::new(Conversational::new(
            llm,
            test_model_config(),
            lookups,
        )));

    let outcome = engine
        .run(SessionState::new_conversation(
            SessionId::new(),
            demo_alert(ScenarioCode::Structuring),
            "What deposit pattern triggered this alert?",
        ))
        .await
        .unwrap();

    match outcome {
        RunOutcome::Conversation { response } => {
            assert!(response.contains("three cash deposits"));
        }
        other => panic!("expected conversation outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn completed_session_resumes_to_the_same_resolution() {
    let store = Arc::new(SqliteCheckpointStore::in_memory().unwrap());
    let dispatcher = Arc::new(CapturingDispatcher::new());
    let engine = engine_with(dispatcher, Some(store.clone()));

    let session_id = SessionId::new();
    let first = engine
        .run(SessionState::new_resolve(
            session_id.clone(),
            demo_alert(ScenarioCode::VelocitySpike),
        ))
        .await
        .unwrap();
    let RunOutcome::Completed { resolution, .. } = first else {
        panic!("expected completion");
    };

    // The final checkpoint survives completion; resuming replays the
    // terminal step from durable state without re-running any agent.
    let resumed = engine.resume(&session_id).await.unwrap();
    match resumed {
        RunOutcome::Completed {
            resolution: replayed,
            ..
        } => {
            assert_eq!(replayed.action, resolution.action);
            assert_eq!(replayed.rule_id, resolution.rule_id);
        }
        other => panic!("expected completion on resume, got {other:?}"),
    }
}
