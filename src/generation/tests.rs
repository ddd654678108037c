use super::*;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

/// Plays back scripted results, then answers "ok"
struct ScriptedClient {
    script: Mutex<Vec<Result<String, GenerationError>>>,
    delay: Duration,
    calls: AtomicU32,
}

impl ScriptedClient {
    fn new(mut script: Vec<Result<String, GenerationError>>) -> Self {
        script.reverse();
        Self {
            script: Mutex::new(script),
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(Vec::new())
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.script
            .lock()
            .expect("script lock")
            .pop()
            .unwrap_or_else(|| Ok("ok".to_string()))
    }
}

fn request() -> GenerationRequest {
    GenerationRequest {
        messages: vec![ChatMessage::user("hello")],
    }
}

#[test]
fn roles_serialize_lowercase() {
    let message = ChatMessage::assistant("hi");
    let json = serde_json::to_value(&message).expect("should serialize");
    assert_eq!(json, serde_json::json!({"role": "assistant", "content": "hi"}));
}

#[test]
fn transient_errors() {
    assert!(GenerationError::Timeout(Duration::from_secs(1)).is_transient());
    assert!(GenerationError::Backend(OllamaError::Status { status: 502 }).is_transient());
    assert!(!GenerationError::Backend(OllamaError::Status { status: 404 }).is_transient());
    assert!(!GenerationError::Cancelled.is_transient());
}

#[tokio::test]
async fn success_is_returned_directly() {
    let client = ScriptedClient::new(vec![Ok("answer".to_string())]);

    let answer = generate_with_retry(
        &client,
        &request(),
        Duration::from_secs(5),
        &CancellationToken::new(),
    )
    .await
    .expect("should succeed");

    assert_eq!(answer, "answer");
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn transient_failure_is_retried_once() {
    let client = ScriptedClient::new(vec![
        Err(GenerationError::Backend(OllamaError::Status { status: 500 })),
        Ok("second time lucky".to_string()),
    ]);

    let answer = generate_with_retry(
        &client,
        &request(),
        Duration::from_secs(5),
        &CancellationToken::new(),
    )
    .await
    .expect("retry should succeed");

    assert_eq!(answer, "second time lucky");
    assert_eq!(client.calls(), 2);
}

#[tokio::test]
async fn retry_happens_only_once() {
    let client = ScriptedClient::new(vec![
        Err(GenerationError::Backend(OllamaError::Transport("reset".to_string()))),
        Err(GenerationError::Backend(OllamaError::Transport("reset".to_string()))),
        Ok("never reached".to_string()),
    ]);

    let result = generate_with_retry(
        &client,
        &request(),
        Duration::from_secs(5),
        &CancellationToken::new(),
    )
    .await;

    assert!(matches!(
        result,
        Err(GenerationError::Backend(OllamaError::Transport(_)))
    ));
    assert_eq!(client.calls(), 2);
}

#[tokio::test]
async fn permanent_failure_is_not_retried() {
    let client = ScriptedClient::new(vec![Err(GenerationError::Backend(
        OllamaError::Status { status: 404 },
    ))]);

    let result = generate_with_retry(
        &client,
        &request(),
        Duration::from_secs(5),
        &CancellationToken::new(),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn slow_backend_times_out_after_one_retry() {
    let client = ScriptedClient::slow(Duration::from_secs(10));

    let result = generate_with_retry(
        &client,
        &request(),
        Duration::from_millis(50),
        &CancellationToken::new(),
    )
    .await;

    assert!(matches!(result, Err(GenerationError::Timeout(_))));
    assert_eq!(client.calls(), 2);
}

#[tokio::test]
async fn cancellation_returns_without_waiting() {
    let client = ScriptedClient::slow(Duration::from_secs(30));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result = generate_with_retry(&client, &request(), Duration::from_secs(60), &cancel).await;

    assert!(matches!(result, Err(GenerationError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn already_cancelled_token_skips_the_call() {
    let client = ScriptedClient::new(Vec::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = generate_with_retry(&client, &request(), Duration::from_secs(5), &cancel).await;

    assert!(matches!(result, Err(GenerationError::Cancelled)));
}
