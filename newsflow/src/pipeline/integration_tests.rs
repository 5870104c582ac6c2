//! End-to-end tests for pipeline execution.

use super::*;
use crate::agents::{AgentConfigOverrides, AgentRole, ANALYSIS_AGENT, LEARNING_AGENT, SELECTED_STYLE_KEY};
use crate::errors::NewsflowError;
use crate::events::CollectingEventSink;
use crate::services::Services;
use crate::testing::{
    context_with_analysis, context_with_article, object, MockChatService, ScriptedAgent,
    SAMPLE_URL,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;

const LOW_CONFIDENCE: &str =
    r#"{"styled_text": "Maybe?", "confidence": 0.2, "style_options": ["brief", "formal"]}"#;

fn mock_pipeline(config: PipelineConfig) -> Pipeline {
    Pipeline::with_services(config, Services::mock().unwrap())
}

fn scripted(config: PipelineConfig, agents: &[Arc<ScriptedAgent>]) -> Pipeline {
    let mut pipeline = Pipeline::new(config);
    for agent in agents {
        pipeline.add_agent(agent.clone());
    }
    pipeline
}

fn processed(result: &PipelineResult) -> Vec<String> {
    result
        .context()
        .processed_by()
        .iter()
        .map(|r| r.agent.clone())
        .collect()
}

// Default agents in mock mode

#[tokio::test]
async fn test_invalid_url_stops_at_validation() {
    let pipeline = mock_pipeline(PipelineConfig::mock());

    let result = pipeline.run("not-a-url").await;

    assert!(!result.success());
    assert_eq!(result.status(), PipelineStatus::Failed);
    assert!(result.error().unwrap().contains("Invalid URL"));
    assert_eq!(result.agent_names(), vec!["ValidationAgent"]);
    assert!(result.final_analysis().is_none());
    assert!(!result.context().is_valid());
}

#[tokio::test]
async fn test_mock_run_completes_every_agent() {
    let pipeline = mock_pipeline(PipelineConfig::mock());
    assert!(pipeline.is_mock_mode());

    let result = pipeline.run(SAMPLE_URL).await;

    assert!(result.success(), "error: {:?}", result.error());
    assert_eq!(
        result.agent_names(),
        vec![
            "ValidationAgent",
            "ThumbnailAgent",
            "AnalysisAgent",
            "InterpretAgent",
            "LearningAgent"
        ]
    );
    assert!(!result.has_failures());
    let final_analysis = result.final_analysis().unwrap();
    assert!(final_analysis["translation_summary"].as_str().is_some());
    assert_eq!(processed(&result), result.agent_names());
    assert!(result.context().get_metadata(RUN_ID_KEY).is_some());
}

#[tokio::test]
async fn test_disabled_agents_are_not_registered() {
    let config = PipelineConfig {
        enable_interpret: false,
        enable_learning: false,
        ..PipelineConfig::mock()
    };
    let pipeline = mock_pipeline(config);

    let result = pipeline.run(SAMPLE_URL).await;

    assert!(result.success());
    assert_eq!(result.len(), 3);
    assert_eq!(
        pipeline.agent_names(),
        vec!["ValidationAgent", "ThumbnailAgent", "AnalysisAgent"]
    );
    assert!(result.final_analysis().is_some());
}

#[tokio::test]
async fn test_outputs_reach_the_final_context() {
    let pipeline = mock_pipeline(PipelineConfig::mock());

    let result = pipeline.run(SAMPLE_URL).await;
    let ctx = result.context();

    let article = ctx.article_data().unwrap();
    assert_eq!(article.url, SAMPLE_URL);
    assert!(article
        .image_url
        .as_deref()
        .unwrap()
        .starts_with("https://thumbnails.newsflow.local/"));

    let analysis = ctx.analysis_result().unwrap();
    assert_eq!(analysis.key_points.len(), 3);
    assert!(analysis.audio_url.is_some());
}

#[tokio::test]
async fn test_run_agent_in_isolation() {
    let pipeline = mock_pipeline(PipelineConfig::mock());

    let result = pipeline
        .run_agent(ANALYSIS_AGENT, &context_with_article(SAMPLE_URL))
        .await
        .unwrap();

    assert!(result.is_success());
    assert!(result.get("key_points").unwrap().as_array().is_some());
    assert!(pipeline.results().is_empty());
    assert!(pipeline.agent(ANALYSIS_AGENT).unwrap().is_ready());
}

#[tokio::test]
async fn test_run_agent_learning_with_prepared_analysis() {
    let pipeline = mock_pipeline(PipelineConfig::mock());

    let result = pipeline
        .run_agent(LEARNING_AGENT, &context_with_analysis(SAMPLE_URL))
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(
        result.get_str("styled_analysis"),
        Some("In short: Lawmakers approved a ten-year transit plan.")
    );
}

#[tokio::test]
async fn test_agent_overrides_reach_the_agent() {
    let config = PipelineConfig::mock().with_agent_overrides(
        ANALYSIS_AGENT,
        AgentConfigOverrides::default().with_max_attempts(7),
    );
    let pipeline = mock_pipeline(config);

    let settings = pipeline.agent(ANALYSIS_AGENT).unwrap().config_map();

    assert_eq!(settings["max_attempts"], json!(7));
    assert_eq!(settings["timeout_secs"], json!(60));
}

#[tokio::test]
async fn test_run_agent_unknown_name() {
    let pipeline = mock_pipeline(PipelineConfig::mock());

    let err = pipeline
        .run_agent("NopeAgent", &context_with_article(SAMPLE_URL))
        .await
        .unwrap_err();

    assert!(matches!(err, NewsflowError::AgentNotFound(name) if name == "NopeAgent"));
}

#[tokio::test]
async fn test_low_confidence_halts_then_resumes() {
    let chat = Arc::new(MockChatService::new().with_reply("learning", LOW_CONFIDENCE));
    let services = Services::mock().unwrap().with_chat(chat);
    let pipeline = Pipeline::with_services(PipelineConfig::mock(), services);

    let halted = pipeline.run(SAMPLE_URL).await;

    assert_eq!(halted.status(), PipelineStatus::NeedsClarification);
    assert!(!halted.success());
    assert!(halted.error().is_none());
    assert_eq!(
        halted.clarification_data().unwrap()["style_options"],
        json!(["brief", "formal"])
    );
    assert_eq!(
        halted.context().get_metadata(PENDING_AGENT_KEY),
        Some(&json!(LEARNING_AGENT))
    );
    assert!(halted.final_analysis().is_some());

    let ctx = halted
        .context()
        .with_metadata(SELECTED_STYLE_KEY, json!("formal"));
    let resumed = pipeline.resume(ctx, LEARNING_AGENT).await.unwrap();

    assert!(resumed.success());
    assert_eq!(resumed.agent_names(), vec![LEARNING_AGENT]);
    let learning = resumed.agent_result(LEARNING_AGENT).unwrap();
    assert_eq!(learning.get_str("style"), Some("formal"));
    assert_eq!(
        resumed.context().get_metadata(RUN_ID_KEY),
        halted.context().get_metadata(RUN_ID_KEY)
    );
}

#[tokio::test]
async fn test_resume_unknown_agent() {
    let pipeline = mock_pipeline(PipelineConfig::mock());

    let err = pipeline
        .resume(context_with_article(SAMPLE_URL), "NopeAgent")
        .await
        .unwrap_err();

    assert!(matches!(err, NewsflowError::AgentNotFound(_)));
}

#[tokio::test]
async fn test_transient_chat_failure_is_retried() {
    let chat = Arc::new(MockChatService::new().with_transient_failures(1));
    let services = Services::mock().unwrap().with_chat(chat.clone());
    let config = PipelineConfig {
        enable_thumbnail: false,
        enable_interpret: false,
        enable_learning: false,
        ..PipelineConfig::mock()
    }
    .with_agent_overrides(
        ANALYSIS_AGENT,
        AgentConfigOverrides::default().with_retry_base_delay_ms(0),
    );
    let pipeline = Pipeline::with_services(config, services);

    let result = pipeline.run(SAMPLE_URL).await;

    assert!(result.success(), "error: {:?}", result.error());
    assert_eq!(chat.calls_tagged("analysis").len(), 2);
}

#[tokio::test]
async fn test_events_cover_the_run() {
    let sink = Arc::new(CollectingEventSink::new());
    let pipeline =
        Pipeline::with_services_and_events(PipelineConfig::mock(), Services::mock().unwrap(), sink.clone());

    pipeline.run(SAMPLE_URL).await;

    let types = sink.event_types();
    assert_eq!(types.first().map(String::as_str), Some("pipeline.started"));
    assert_eq!(types.last().map(String::as_str), Some("pipeline.completed"));
    assert_eq!(sink.events_of_type("agent.started").len(), 5);
    assert_eq!(sink.events_of_type("agent.completed").len(), 5);
    assert!(sink.events_of_type("agent.failed").is_empty());
}

#[tokio::test]
async fn test_last_run_is_kept() {
    let pipeline = mock_pipeline(PipelineConfig::mock());
    assert!(pipeline.final_result().is_none());
    assert!(pipeline.results().is_empty());

    pipeline.run(SAMPLE_URL).await;

    let last = pipeline.final_result().unwrap();
    assert!(last.success());
    let names: Vec<_> = pipeline.results().into_iter().map(|r| r.name).collect();
    assert_eq!(names, last.agent_names());
}

#[tokio::test]
async fn test_repeated_runs_reuse_initialized_agents() {
    let pipeline = mock_pipeline(PipelineConfig::mock());

    let first = pipeline.run(SAMPLE_URL).await;
    let second = pipeline.run("https://news.example.com/2024/05/follow-up").await;

    assert!(first.success() && second.success());
    assert_ne!(
        first.context().get_metadata(RUN_ID_KEY),
        second.context().get_metadata(RUN_ID_KEY)
    );
    let interpret = second.agent_result("InterpretAgent").unwrap();
    assert_eq!(interpret.get("enriched"), Some(&json!(true)));
}

#[tokio::test]
async fn test_rerunning_a_story_does_not_match_itself() {
    let pipeline = mock_pipeline(PipelineConfig::mock());

    pipeline.run(SAMPLE_URL).await;
    let again = pipeline.run(SAMPLE_URL).await;

    assert!(again.success());
    let interpret = again.agent_result("InterpretAgent").unwrap();
    assert_eq!(interpret.get("enriched"), Some(&json!(false)));
    assert_eq!(interpret.get("similar_items"), Some(&json!([])));
}

fn analysis_reply_pipeline(reply: &str, enable_learning: bool) -> Pipeline {
    let chat = Arc::new(MockChatService::new().with_reply("analysis", reply));
    let services = Services::mock().unwrap().with_chat(chat);
    let config = PipelineConfig {
        enable_thumbnail: false,
        enable_interpret: false,
        enable_learning,
        ..PipelineConfig::mock()
    };
    Pipeline::with_services(config, services)
}

#[tokio::test]
async fn test_structured_commentary_reaches_the_context() {
    let pipeline = analysis_reply_pipeline(
        r#"{"translation_summary":"S","key_points":["a","b"],"critical_analysis":{"why_important":"x","future_prediction":{"short_term":"y","long_term":"z"}}}"#,
        false,
    );

    let result = pipeline.run(SAMPLE_URL).await;

    assert!(result.success());
    let analysis = result.context().analysis_result().unwrap();
    assert_eq!(analysis.translation_summary, "S");
    assert_eq!(analysis.key_points, vec!["a", "b"]);
    assert_eq!(
        analysis.critical_analysis.future_prediction.as_deref(),
        Some("short_term: y; long_term: z")
    );
}

#[tokio::test]
async fn test_null_summary_still_feeds_later_agents() {
    let pipeline = analysis_reply_pipeline(r#"{"translation_summary":null,"key_points":["a","b"]}"#, true);

    let result = pipeline.run(SAMPLE_URL).await;

    assert!(result.success(), "error: {:?}", result.error());
    assert_eq!(result.context().analysis_result().unwrap().key_points, vec!["a", "b"]);
    assert!(result.agent_result(LEARNING_AGENT).unwrap().is_success());
}

#[tokio::test]
async fn test_to_json_of_a_mock_run() {
    let pipeline = mock_pipeline(PipelineConfig::mock());

    let json = pipeline.run(SAMPLE_URL).await.to_json();

    assert_eq!(json["success"], true);
    assert_eq!(json["status"], "completed");
    assert_eq!(json["error"], Value::Null);
    assert_eq!(json["results"].as_object().unwrap().len(), 5);
    assert!(json["final_analysis"].is_object());
}

// Sequencer state machine with scripted agents

#[tokio::test]
async fn test_failure_stops_the_run_by_default() {
    let a = Arc::new(ScriptedAgent::succeeding("a"));
    let b = Arc::new(ScriptedAgent::failing("b", "boom"));
    let c = Arc::new(ScriptedAgent::succeeding("c"));
    let pipeline = scripted(PipelineConfig::default(), &[a.clone(), b, c.clone()]);

    let result = pipeline.run(SAMPLE_URL).await;

    assert_eq!(result.status(), PipelineStatus::Failed);
    assert_eq!(result.error(), Some("boom"));
    assert_eq!(result.agent_names(), vec!["a", "b"]);
    assert_eq!(c.call_count(), 0);
    assert_eq!(a.call_count(), 1);
    assert_eq!(result.context().errors().len(), 1);
    assert_eq!(processed(&result), vec!["a"]);
}

#[tokio::test]
async fn test_failure_is_tolerated_when_configured() {
    let b = Arc::new(ScriptedAgent::failing("b", "boom"));
    let c = Arc::new(ScriptedAgent::succeeding("c"));
    let config = PipelineConfig::default().with_stop_on_failure(false);
    let pipeline = scripted(config, &[Arc::new(ScriptedAgent::succeeding("a")), b, c.clone()]);

    let result = pipeline.run(SAMPLE_URL).await;

    assert!(result.success());
    assert!(result.has_failures());
    assert_eq!(result.len(), 3);
    assert_eq!(processed(&result), vec!["a", "c"]);

    let seen = &c.seen_contexts()[0];
    assert_eq!(seen.errors().len(), 1);
    assert_eq!(seen.errors()[0].agent, "b");
    assert!(!seen.is_valid());
}

#[tokio::test]
async fn test_clarification_halts_even_when_tolerating_failures() {
    let b = Arc::new(ScriptedAgent::clarifying(
        "b",
        object(json!({"question": "which style?"})),
    ));
    let c = Arc::new(ScriptedAgent::succeeding("c"));
    let config = PipelineConfig::default().with_stop_on_failure(false);
    let pipeline = scripted(config, &[Arc::new(ScriptedAgent::succeeding("a")), b, c.clone()]);

    let result = pipeline.run(SAMPLE_URL).await;

    assert_eq!(result.status(), PipelineStatus::NeedsClarification);
    assert_eq!(
        result.clarification_data().unwrap()["question"],
        "which style?"
    );
    assert_eq!(c.call_count(), 0);
    assert_eq!(result.context().get_metadata(PENDING_AGENT_KEY), Some(&json!("b")));
    assert!(!result.context().was_processed_by("b"));
}

#[tokio::test]
async fn test_error_leaves_context_unmodified() {
    let c = Arc::new(ScriptedAgent::succeeding("c"));
    let config = PipelineConfig::default().with_stop_on_failure(false);
    let pipeline = scripted(
        config,
        &[
            Arc::new(ScriptedAgent::succeeding("a")),
            Arc::new(ScriptedAgent::erroring("b", "exploded")),
            c.clone(),
        ],
    );

    let result = pipeline.run(SAMPLE_URL).await;

    let failed = result.agent_result("b").unwrap();
    assert!(failed.is_failure());
    assert!(failed.error_message().unwrap().starts_with("b: "));
    assert!(failed.error_message().unwrap().contains("exploded"));

    let seen = &c.seen_contexts()[0];
    assert!(seen.errors().is_empty());
    assert!(seen.was_processed_by("a"));
    assert!(!seen.was_processed_by("b"));
}

#[tokio::test]
async fn test_panic_becomes_failure() {
    let pipeline = scripted(
        PipelineConfig::default(),
        &[Arc::new(ScriptedAgent::panicking("b", "kaboom"))],
    );

    let result = pipeline.run(SAMPLE_URL).await;

    assert_eq!(result.status(), PipelineStatus::Failed);
    let error = result.error().unwrap();
    assert!(error.contains("b: panicked"));
    assert!(error.contains("kaboom"));
}

#[tokio::test]
async fn test_initialization_failure_fails_before_any_processing() {
    let a = Arc::new(ScriptedAgent::succeeding("a"));
    let b = Arc::new(ScriptedAgent::succeeding("b").with_init_error("missing prompt"));
    let pipeline = scripted(PipelineConfig::default(), &[a.clone(), b]);

    let result = pipeline.run(SAMPLE_URL).await;

    assert_eq!(result.status(), PipelineStatus::Failed);
    assert!(result.error().unwrap().contains("b initialization failed"));
    assert_eq!(result.agent_names(), vec!["b"]);
    assert_eq!(a.call_count(), 0);
    assert_eq!(a.init_count(), 1);
}

#[tokio::test]
async fn test_agents_are_initialized_once_per_pipeline() {
    let a = Arc::new(ScriptedAgent::succeeding("a"));
    let pipeline = scripted(PipelineConfig::default(), &[a.clone()]);

    pipeline.run(SAMPLE_URL).await;
    pipeline.run(SAMPLE_URL).await;
    pipeline
        .run_agent("a", &context_with_article(SAMPLE_URL))
        .await
        .unwrap();

    assert_eq!(a.init_count(), 1);
    assert_eq!(a.call_count(), 3);
}

#[tokio::test]
async fn test_failed_initialization_is_retried_next_run() {
    let b = Arc::new(ScriptedAgent::succeeding("b").with_init_error("missing prompt"));
    let pipeline = scripted(PipelineConfig::default(), &[b.clone()]);

    pipeline.run(SAMPLE_URL).await;
    pipeline.run(SAMPLE_URL).await;

    assert_eq!(b.init_count(), 2);
    assert_eq!(b.call_count(), 0);
}

#[tokio::test]
async fn test_analysis_role_output_is_merged() {
    let analysis = Arc::new(
        ScriptedAgent::returning(
            "custom-analysis",
            object(json!({"translation_summary": "S", "key_points": ["k1"]})),
        )
        .with_role(AgentRole::Analysis),
    );
    let observer = Arc::new(ScriptedAgent::succeeding("observer"));
    let pipeline = scripted(PipelineConfig::default(), &[analysis, observer.clone()]);

    let result = pipeline.run(SAMPLE_URL).await;

    let seen = &observer.seen_contexts()[0];
    assert_eq!(seen.analysis_result().unwrap().key_points, vec!["k1"]);
    assert_eq!(
        result.final_analysis(),
        Some(json!({"translation_summary": "S", "key_points": ["k1"]}))
    );
}

#[tokio::test]
async fn test_custom_role_output_is_not_merged() {
    let custom = Arc::new(ScriptedAgent::returning(
        "custom",
        object(json!({"translation_summary": "S"})),
    ));
    let pipeline = scripted(PipelineConfig::default(), &[custom]);

    let result = pipeline.run(SAMPLE_URL).await;

    assert!(result.success());
    assert!(result.context().analysis_result().is_none());
    assert!(result.final_analysis().is_none());
}

#[tokio::test]
async fn test_empty_pipeline_completes() {
    let pipeline = Pipeline::new(PipelineConfig::default());
    assert!(pipeline.is_empty());

    let result = pipeline.run(SAMPLE_URL).await;

    assert!(result.success());
    assert!(result.is_empty());
}
