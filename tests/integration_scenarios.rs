//! End-to-end query scenarios against the simulated environment
//!
//! Each test drives the real registry, reasoner and execution loop with a
//! scripted LLM client, then checks both the outcome and what the engine
//! was shown on every round trip.

use std::sync::Arc;

use serde_json::{Value, json};
use skyquery::agent::{ExecutionLoop, ExecutionStep, LlmReasoner, LoopConfig, QueryOutcome, Terminal};
use skyquery::backend::AwsCliConfig;
use skyquery::environment::{ActiveEnvironment, EnvironmentManager, EnvironmentMode};
use skyquery::error::Result;
use skyquery::llm::{CompletionRequest, CompletionResponse, ContentBlock, MessageContent, MockLlmClient, StopReason};
use skyquery::session::InteractiveSession;
use skyquery::tools::{ToolContext, ToolRegistry};

struct Harness {
    env: ActiveEnvironment,
    client: Arc<MockLlmClient>,
    execution: ExecutionLoop<LlmReasoner<MockLlmClient>>,
}

fn harness(responses: Vec<CompletionResponse>) -> Harness {
    let env = EnvironmentManager::new(EnvironmentMode::Simulated, AwsCliConfig::default())
        .activate()
        .unwrap();
    let registry = ToolRegistry::inspection_catalog(ToolContext::new(env.backend())).unwrap();
    let client = Arc::new(MockLlmClient::new(responses));
    let reasoner = LlmReasoner::new(client.clone());
    let execution = ExecutionLoop::with_config(Arc::new(reasoner), Arc::new(registry), LoopConfig::default());
    Harness { env, client, execution }
}

/// Content of the tool_result block at the end of a request
fn last_tool_result(request: &CompletionRequest) -> (String, bool) {
    let last = request.messages.last().unwrap();
    match &last.content {
        MessageContent::Blocks(blocks) => match &blocks[0] {
            ContentBlock::ToolResult { content, is_error, .. } => (content.clone(), *is_error),
            other => panic!("expected tool_result, got {other:?}"),
        },
        other => panic!("expected blocks, got {other:?}"),
    }
}

fn tool_names(outcome: &QueryOutcome) -> Vec<&str> {
    outcome.steps().iter().filter_map(ExecutionStep::tool_name).collect()
}

#[tokio::test]
async fn scenario_a_list_storage_containers() -> Result<()> {
    let h = harness(vec![
        CompletionResponse::tool_use("toolu_a1", "s3_list_buckets", json!({})),
        CompletionResponse::text(
            "There are five buckets: private-backups, test-bucket-1, test-bucket-2, test-bucket-3 and test-bucket-4.",
        ),
    ]);

    let outcome = h.execution.run("list all storage containers").await?;

    assert_eq!(outcome.terminal(), Terminal::Answered);
    assert_eq!(tool_names(&outcome), vec!["s3_list_buckets"]);
    assert_eq!(h.client.call_count(), 2);

    let requests = h.client.requests();
    let (observation, is_error) = last_tool_result(&requests[1]);
    assert!(!is_error);
    let names: Vec<String> = serde_json::from_str(&observation)?;
    assert_eq!(
        names,
        vec!["private-backups", "test-bucket-1", "test-bucket-2", "test-bucket-3", "test-bucket-4"]
    );
    assert!(outcome.display_text().contains("private-backups"));
    Ok(())
}

#[tokio::test]
async fn scenario_b_database_server_size() -> Result<()> {
    let fixtures = EnvironmentManager::new(EnvironmentMode::Simulated, AwsCliConfig::default())
        .activate()?
        .fixtures()
        .unwrap();
    let db_id = fixtures
        .instances
        .iter()
        .find(|i| i.tags.get("Name").map(String::as_str) == Some("Database Server"))
        .map(|i| i.instance_id.clone())
        .unwrap();

    let h = harness(vec![
        CompletionResponse::tool_use("toolu_b1", "ec2_list_instances", json!({})),
        CompletionResponse::tool_use("toolu_b2", "ec2_instance_size", json!({ "instance_id": &db_id })),
        CompletionResponse::text(format!("The Database Server ({db_id}) is an m5.large instance.")),
    ]);

    let outcome = h.execution.run("what size is the Database Server instance").await?;

    assert!(outcome.is_answered());
    assert_eq!(outcome.iterations(), 3);
    assert_eq!(tool_names(&outcome), vec!["ec2_list_instances", "ec2_instance_size"]);

    let requests = h.client.requests();
    let (listing, _) = last_tool_result(&requests[1]);
    assert!(listing.contains("Database Server"));
    assert!(listing.contains(&db_id));

    let (sizes, is_error) = last_tool_result(&requests[2]);
    assert!(!is_error);
    let sizes: Value = serde_json::from_str(&sizes)?;
    assert_eq!(sizes[&db_id], "m5.large");
    assert!(outcome.display_text().contains("m5.large"));
    Ok(())
}

#[tokio::test]
async fn scenario_c_read_only_user_permissions() -> Result<()> {
    let h = harness(vec![
        CompletionResponse::tool_use("toolu_c1", "iam_user_permissions", json!({ "username": "grinch" })),
        CompletionResponse::text("grinch has ReadOnlyAccessPolicy attached."),
    ]);

    let outcome = h.execution.run("what permissions does grinch have").await?;

    assert!(outcome.is_answered());
    let (observation, is_error) = last_tool_result(&h.client.requests()[1]);
    assert!(!is_error);
    assert_eq!(observation, r#"["ReadOnlyAccessPolicy"]"#);
    assert!(!outcome.display_text().contains("Administrator"));
    Ok(())
}

#[tokio::test]
async fn scenario_d_recovers_from_unparseable_reply() -> Result<()> {
    let garbled = CompletionResponse {
        malformed: vec!["tool_use block without an id".to_string()],
        stop_reason: StopReason::ToolUse,
        ..Default::default()
    };
    let h = harness(vec![
        garbled,
        CompletionResponse::tool_use("toolu_d1", "s3_public_buckets", json!({})),
        CompletionResponse::text("Four buckets are public: test-bucket-1 to test-bucket-4."),
    ]);

    let outcome = h.execution.run("which buckets are public").await?;

    assert_eq!(outcome.terminal(), Terminal::Answered);
    assert_eq!(outcome.iterations(), 3);
    assert!(matches!(outcome.steps()[0], ExecutionStep::Unparseable { .. }));

    let requests = h.client.requests();
    let retry = &requests[1];
    assert_eq!(retry.messages.len(), 3);
    assert!(retry.messages[2].text().contains("could not be used"));
    assert!(retry.messages[2].text().contains("without an id"));

    let (observation, _) = last_tool_result(&requests[2]);
    assert!(!observation.contains("private-backups"));
    Ok(())
}

#[tokio::test]
async fn failure_observation_names_the_bucket() -> Result<()> {
    let h = harness(vec![
        CompletionResponse::tool_use("toolu_e1", "s3_bucket_contents", json!({ "bucket_name": "no-such-bucket" })),
        CompletionResponse::text("That bucket does not exist."),
    ]);

    let outcome = h.execution.run("what is in no-such-bucket").await?;

    assert!(outcome.is_answered());
    let (observation, is_error) = last_tool_result(&h.client.requests()[1]);
    assert!(is_error);
    assert!(observation.contains("no-such-bucket"));
    assert!(observation.contains("NoSuchBucket"));
    Ok(())
}

#[tokio::test]
async fn ceiling_bounds_round_trips() -> Result<()> {
    let h = harness(vec![
        CompletionResponse::tool_use("toolu_1", "s3_list_buckets", json!({})),
        CompletionResponse::tool_use("toolu_2", "ec2_list_instances", json!({})),
        CompletionResponse::tool_use("toolu_3", "iam_list_users", json!({})),
        CompletionResponse::text("unreachable"),
    ]);

    let outcome = h.execution.run("tell me everything").await?;

    assert_eq!(outcome.terminal(), Terminal::Incomplete);
    assert_eq!(h.client.call_count(), 3);
    assert_eq!(h.client.remaining(), 1);
    assert_eq!(
        tool_names(&outcome),
        vec!["s3_list_buckets", "ec2_list_instances", "iam_list_users"]
    );
    assert!(outcome.display_text().starts_with("Unable to complete"));
    Ok(())
}

#[tokio::test]
async fn replay_is_deterministic_across_activations() -> Result<()> {
    let script = || {
        vec![
            CompletionResponse::tool_use("toolu_1", "ec2_instance_size", json!({})),
            CompletionResponse::tool_use("toolu_2", "iam_user_permissions", json!({ "username": "santa" })),
            CompletionResponse::text("done"),
        ]
    };

    let first = harness(script());
    first.execution.run("sizes and santa").await?;
    let first_requests = serde_json::to_string(&first.client.requests())?;
    drop(first);

    let second = harness(script());
    second.execution.run("sizes and santa").await?;
    let second_requests = serde_json::to_string(&second.client.requests())?;

    assert_eq!(first_requests, second_requests);
    Ok(())
}

#[tokio::test]
async fn tools_fail_cleanly_after_environment_closes() -> Result<()> {
    let h = harness(vec![
        CompletionResponse::tool_use("toolu_1", "iam_list_users", json!({})),
        CompletionResponse::text("The environment is gone."),
    ]);
    let Harness { env, client, execution } = h;
    env.deactivate();

    let outcome = execution.run("who are the users").await?;

    assert!(outcome.is_answered());
    let (observation, is_error) = last_tool_result(&client.requests()[1]);
    assert!(is_error);
    assert!(observation.contains("EnvironmentInactive"));
    assert!(!observation.contains("grinch"));
    Ok(())
}

#[tokio::test]
async fn session_runs_queries_end_to_end() {
    let h = harness(vec![
        CompletionResponse::tool_use("toolu_1", "iam_list_users", json!({})),
        CompletionResponse::text("The users are grinch, santa and max."),
    ]);
    let session = InteractiveSession::new(h.execution, EnvironmentMode::Simulated.label());

    let mut output = Vec::new();
    let summary = session
        .run("\nwho are the users\nmore please\nexit\n".as_bytes(), &mut output)
        .await
        .unwrap();
    let output = String::from_utf8(output).unwrap();

    assert!(output.contains("Skyquery (Simulated AWS)"));
    assert!(output.contains("Please enter a valid query."));
    assert!(output.contains("The users are grinch, santa and max."));
    assert!(output.contains("Error:"));
    assert!(output.contains("Exiting session."));
    assert_eq!(summary.queries, 2);
    assert_eq!(summary.answered, 1);
    assert_eq!(summary.failed, 1);
    drop(h.env);
}
