//! Scripted query backend shared by the integration tests
//!
//! Each `query` call plays one fake CLI session: it emits an `init` message,
//! then answers every user message from a responder closure with an
//! assistant message and a `result`.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::StreamExt;
use kodegen_claude_pool::channel::InputStream;
use kodegen_claude_pool::pool::DEFAULT_WARMUP_PROMPT;
use kodegen_claude_pool::{
    ClaudeAgentOptions, ClaudeError, CommandPool, Message, MessageStream, PoolConfig, QueryBackend,
    parse_message,
};
use parking_lot::Mutex;
use serde_json::json;

/// One user message as seen by the fake CLI
#[derive(Debug, Clone)]
pub struct Call {
    /// Model the session was started with
    pub model: String,
    /// Text of the user message
    pub prompt: String,
    /// 1-based index of the session that received it
    pub session: usize,
}

/// How the fake CLI answers one user message
#[derive(Debug, Clone)]
pub enum Reply {
    /// Successful result with this text
    Text(String),
    /// Successful result with this text after a delay
    Delayed(Duration, String),
    /// Result flagged as an error, without text
    Error,
    /// Never answer
    Hang,
    /// Close the output stream
    End,
    /// Fail the output stream
    Fail(String),
}

type Responder = dyn Fn(&Call) -> Reply + Send + Sync;

#[derive(Default)]
struct Shared {
    invocations: AtomicUsize,
    live: AtomicUsize,
    models: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
}

/// Decrements the live session count when a fake session's stream is dropped
struct LiveGuard(Arc<Shared>);

impl LiveGuard {
    fn new(shared: &Arc<Shared>) -> Self {
        shared.live.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(shared))
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Fake Claude Code backend driven by a responder closure
#[derive(Clone)]
pub struct ScriptedBackend {
    shared: Arc<Shared>,
    responder: Arc<Responder>,
}

impl ScriptedBackend {
    /// Backend that answers the warmup with `READY` and echoes everything else
    /// as `<model>:<prompt>`
    pub fn echo() -> Self {
        Self::new(|call| {
            if call.prompt == DEFAULT_WARMUP_PROMPT {
                Reply::Text("READY".into())
            } else {
                Reply::Text(format!("{}:{}", call.model, call.prompt))
            }
        })
    }

    /// Backend that echoes, except for prompts `script` has an answer for
    pub fn scripted(script: impl Fn(&Call) -> Option<Reply> + Send + Sync + 'static) -> Self {
        Self::new(move |call| {
            script(call).unwrap_or_else(|| {
                if call.prompt == DEFAULT_WARMUP_PROMPT {
                    Reply::Text("READY".into())
                } else {
                    Reply::Text(format!("{}:{}", call.model, call.prompt))
                }
            })
        })
    }

    /// Backend with a custom responder
    pub fn new(responder: impl Fn(&Call) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            responder: Arc::new(responder),
        }
    }

    /// Number of sessions started
    pub fn invocations(&self) -> usize {
        self.shared.invocations.load(Ordering::SeqCst)
    }

    /// Number of sessions whose output stream is still held by someone
    pub fn live_sessions(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    /// Model of every session started, in order
    pub fn models(&self) -> Vec<String> {
        self.shared.models.lock().clone()
    }

    /// Every user message received, in order, warmups included
    pub fn prompts(&self) -> Vec<String> {
        self.shared.prompts.lock().clone()
    }

    /// User messages received, warmups excluded
    pub fn requests(&self) -> Vec<String> {
        self.prompts()
            .into_iter()
            .filter(|p| p != DEFAULT_WARMUP_PROMPT)
            .collect()
    }
}

fn message(value: serde_json::Value) -> Message {
    parse_message(value).expect("scripted message must parse")
}

fn init(session: usize, model: &str) -> Message {
    message(json!({
        "type": "system",
        "subtype": "init",
        "session_id": format!("session-{session}"),
        "model": model,
    }))
}

fn assistant(model: &str, text: &str) -> Message {
    message(json!({
        "type": "assistant",
        "message": {
            "model": model,
            "content": [{ "type": "text", "text": text }]
        }
    }))
}

fn result(session: usize, text: Option<&str>, is_error: bool) -> Message {
    message(json!({
        "type": "result",
        "subtype": if is_error { "error_during_execution" } else { "success" },
        "duration_ms": 3,
        "duration_api_ms": 2,
        "is_error": is_error,
        "num_turns": 1,
        "session_id": format!("session-{session}"),
        "result": text,
    }))
}

impl QueryBackend for ScriptedBackend {
    fn query(&self, input: InputStream, options: ClaudeAgentOptions) -> MessageStream {
        let shared = Arc::clone(&self.shared);
        let responder = Arc::clone(&self.responder);
        let model = options.model.unwrap_or_default();

        let session = shared.invocations.fetch_add(1, Ordering::SeqCst) + 1;
        shared.models.lock().push(model.clone());

        Box::pin(async_stream::stream! {
            let _live = LiveGuard::new(&shared);
            let mut input = input;

            yield Ok(init(session, &model));

            while let Some(envelope) = input.next().await {
                let prompt = envelope.content().to_string();
                shared.prompts.lock().push(prompt.clone());

                let call = Call { model: model.clone(), prompt, session };
                match responder(&call) {
                    Reply::Text(text) => {
                        yield Ok(assistant(&model, &text));
                        yield Ok(result(session, Some(&text), false));
                    }
                    Reply::Delayed(delay, text) => {
                        tokio::time::sleep(delay).await;
                        yield Ok(result(session, Some(&text), false));
                    }
                    Reply::Error => yield Ok(result(session, None, true)),
                    Reply::Hang => std::future::pending::<()>().await,
                    Reply::End => break,
                    Reply::Fail(reason) => {
                        yield Err(ClaudeError::transport(reason));
                        break;
                    }
                }
            }
        })
    }
}

/// Configuration with a warmup timeout short enough for tests
pub fn test_config() -> PoolConfig {
    PoolConfig::builder()
        .warmup_timeout(Duration::from_secs(2))
        .build()
}

/// Pool over `backend`, not yet activated
pub fn pool(backend: &ScriptedBackend) -> CommandPool {
    let _ = env_logger::builder().is_test(true).try_init();
    CommandPool::new(test_config(), backend.clone()).expect("test config is valid")
}

/// Pool over `backend`, activated
pub async fn warm_pool(backend: &ScriptedBackend) -> CommandPool {
    let pool = pool(backend);
    pool.activate().await.expect("warmup succeeds");
    pool
}

/// Poll `condition` until it holds or two seconds pass
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
