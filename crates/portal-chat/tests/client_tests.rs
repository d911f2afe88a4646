//! Session client behaviour against scripted and blocking agents.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use portal_chat::{Author, ChatError, ConversationalSessionClient, SessionState};
use portal_core::config::{ChatConfig, GatewayConfig};
use portal_core::{RuntimeProfile, ServiceResult};
use portal_gateway::backend::{AgentBackend, ServiceContext};
use portal_gateway::memory::ScriptedAgent;
use portal_gateway::{
    ConverseReply, ConverseRequest, Credentials, ReplyOrigin, ServiceBackends, ServiceGateway,
    AGENT_FALLBACK_MESSAGE,
};
use portal_observe::{MemoryMetricsBackend, MemorySink, MetricsSink, StructuredLogger};

// =============================================================================
// Helpers
// =============================================================================

/// Agent that parks every call until released.
#[derive(Default)]
struct GatedAgent {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl AgentBackend for GatedAgent {
    async fn converse(
        &self,
        _ctx: ServiceContext<'_>,
        request: &ConverseRequest,
    ) -> ServiceResult<ConverseReply> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(ConverseReply {
            messages: vec![format!("ack: {}", request.utterance)],
            session_id: request.session_id.clone(),
            intent: None,
            dialog_state: None,
            origin: ReplyOrigin::Backend,
        })
    }
}

fn gateway(agent: Arc<dyn AgentBackend>, credentials: Option<Credentials>) -> Arc<ServiceGateway> {
    let profile = RuntimeProfile::NonProduction;
    let log = Arc::new(MemorySink::new());
    let sink = Arc::new(MetricsSink::new(
        profile,
        Arc::new(MemoryMetricsBackend::new()),
        log.clone(),
        Duration::from_secs(5),
    ));
    let logger = Arc::new(StructuredLogger::new(profile, "ReinsurancePortal", log, sink));
    Arc::new(ServiceGateway::new(
        profile,
        &GatewayConfig::default(),
        credentials,
        ServiceBackends::in_memory().with_agent(agent),
        logger,
    ))
}

fn creds() -> Option<Credentials> {
    Some(Credentials::new("AKIAEXAMPLE", "secret"))
}

fn client_with(agent: Arc<dyn AgentBackend>) -> ConversationalSessionClient {
    ConversationalSessionClient::new(gateway(agent, creds()), ChatConfig::default())
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_multi_message_reply_appended_in_order() {
    let agent = Arc::new(ScriptedAgent::with_script(vec![
        "First".to_string(),
        "".to_string(),
        "Second".to_string(),
    ]));
    let client = client_with(agent);

    let exchange = client.send_message("  what is covered?  ").await.unwrap();
    assert!(!exchange.fell_back);
    assert_eq!(exchange.user.text, "what is covered?");

    let transcript = client.transcript();
    let texts: Vec<&str> = transcript.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["what is covered?", "First", "Second"]);
    assert_eq!(transcript[0].author, Author::User);
    assert!(transcript[1..].iter().all(|m| m.author == Author::Bot));
    assert_eq!(client.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_gateway_failure_renders_single_fallback() {
    let agent = Arc::new(ScriptedAgent::new());
    agent.set_failing(true);
    let client = client_with(agent);

    let exchange = client.send_message("hello").await.unwrap();
    assert!(exchange.fell_back);
    assert_eq!(exchange.replies.len(), 1);

    let transcript = client.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[1].author, Author::Bot);
    assert_eq!(transcript[1].text, AGENT_FALLBACK_MESSAGE);
    assert_eq!(client.state(), SessionState::IdleWithError);
}

#[tokio::test]
async fn test_empty_reply_renders_single_fallback() {
    let agent = Arc::new(ScriptedAgent::with_script(vec!["  ".to_string()]));
    let client = client_with(agent);

    let exchange = client.send_message("hello").await.unwrap();
    assert!(exchange.fell_back);
    assert_eq!(client.transcript().len(), 2);
    assert_eq!(client.transcript()[1].text, AGENT_FALLBACK_MESSAGE);
}

#[tokio::test]
async fn test_recovery_clears_error_state() {
    let agent = Arc::new(ScriptedAgent::new());
    agent.set_failing(true);
    let client = client_with(agent.clone());
    client.send_message("one").await.unwrap();
    assert_eq!(client.state(), SessionState::IdleWithError);

    agent.set_failing(false);
    client.send_message("two").await.unwrap();
    assert_eq!(client.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_blank_input_is_ignored() {
    let agent = Arc::new(ScriptedAgent::new());
    let client = client_with(agent.clone());
    assert_eq!(client.send_message("   \n\t").await, Err(ChatError::EmptyMessage));
    assert!(client.transcript().is_empty());
    assert_eq!(agent.calls(), 0);
}

#[tokio::test]
async fn test_second_send_while_in_flight_is_noop() {
    let agent = Arc::new(GatedAgent::default());
    let client = Arc::new(client_with(agent.clone()));

    let first = {
        let client = client.clone();
        tokio::spawn(async move { client.send_message("first").await })
    };
    agent.entered.notified().await;
    assert_eq!(client.state(), SessionState::Sending);

    let second = client.send_message("second").await;
    assert_eq!(second, Err(ChatError::SendInFlight));
    assert_eq!(client.transcript().len(), 1);

    agent.release.notify_one();
    let exchange = first.await.unwrap().unwrap();
    assert_eq!(exchange.replies[0].text, "ack: first");

    let texts: Vec<String> = client.transcript().into_iter().map(|m| m.text).collect();
    assert_eq!(texts, vec!["first", "ack: first"]);
    assert_eq!(client.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_mock_mode_session_gets_canned_reply() {
    let client = ConversationalSessionClient::new(
        gateway(Arc::new(ScriptedAgent::new()), None),
        ChatConfig::default(),
    );
    let exchange = client.send_message("How do I file a claim?").await.unwrap();
    assert!(!exchange.fell_back);
    assert_eq!(exchange.replies.len(), 1);
    assert!(exchange.replies[0].text.contains("Claims"));
}

#[tokio::test(start_paused = true)]
async fn test_rapid_submissions_collapse_to_last() {
    let agent = Arc::new(ScriptedAgent::new());
    let client = Arc::new(client_with(agent.clone()));

    let mut handles = Vec::new();
    for text in ["draft", "draft 2", "final"] {
        let client = client.clone();
        handles.push(tokio::spawn(async move { client.submit(text).await }));
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    assert_eq!(results[0], Err(ChatError::Superseded));
    assert_eq!(results[1], Err(ChatError::Superseded));
    assert_eq!(results[2].as_ref().unwrap().user.text, "final");
    assert_eq!(agent.calls(), 1);
    assert_eq!(client.transcript().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_spaced_submissions_all_send() {
    let agent = Arc::new(ScriptedAgent::new());
    let client = client_with(agent.clone());
    client.submit("one").await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    client.submit("two").await.unwrap();
    assert_eq!(agent.calls(), 2);
    assert_eq!(client.transcript().len(), 4);
}
