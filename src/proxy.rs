//! Request orchestration: classify → route → cache → dispatch → commit.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use tracing::{Span, debug, field, instrument};

use crate::cache::{CacheKey, CachedAnswer, CachedValue, ResponseCache, compute_key};
use crate::classify::{Classifier, KeywordClassifier};
use crate::ledger::{self, UsageTracker};
use crate::routing::PolicyTable;
use crate::stream::{
    ByteStream, Captured, CommitHook, DEFAULT_MAX_CAPTURE_BYTES, InterceptedStream, sse,
};
use crate::types::{Category, ChatReply, ChatRequest};
use crate::upstream::{Dispatched, Gateway};
use crate::{HermodError, Result};

/// A streaming answer ready to be written to the client.
pub struct StreamReply {
    pub model: String,
    pub category: Category,
    /// Whether the body is a replay of a cached answer.
    pub cached: bool,
    pub body: ByteStream,
}

impl std::fmt::Debug for StreamReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamReply")
            .field("model", &self.model)
            .field("category", &self.category)
            .field("cached", &self.cached)
            .finish_non_exhaustive()
    }
}

/// Outcome of [`ChatProxy::handle`].
#[derive(Debug)]
pub enum Reply {
    Json(ChatReply),
    Stream(StreamReply),
}

/// The proxy pipeline with its injected services.
///
/// ```rust,ignore
/// let proxy = ChatProxy::new(gateway, policy)
///     .cache(Arc::new(ResponseCache::new(&CacheConfig::default())))
///     .usage(UsageTracker::new(ledger).monthly_cap(100_000));
/// let reply = proxy.handle(ChatRequest::new("crie um poema")).await?;
/// ```
pub struct ChatProxy {
    classifier: Arc<dyn Classifier>,
    policy: PolicyTable,
    cache: Arc<ResponseCache>,
    usage: UsageTracker,
    gateway: Gateway,
    max_capture_bytes: usize,
}

impl ChatProxy {
    pub fn new(gateway: Gateway, policy: PolicyTable) -> Self {
        Self {
            classifier: Arc::new(KeywordClassifier::default()),
            policy,
            cache: Arc::new(ResponseCache::default()),
            usage: UsageTracker::disabled(),
            gateway,
            max_capture_bytes: DEFAULT_MAX_CAPTURE_BYTES,
        }
    }

    pub fn classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn usage(mut self, usage: UsageTracker) -> Self {
        self.usage = usage;
        self
    }

    /// Capture limit for streamed answers. Default: 256 KiB.
    pub fn max_capture_bytes(mut self, bytes: usize) -> Self {
        self.max_capture_bytes = bytes;
        self
    }

    pub fn response_cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Serve one chat request.
    ///
    /// Cache hits are answered without consulting the quota or the
    /// upstream. Everything else passes the quota check before exactly one
    /// dispatch.
    #[instrument(
        skip_all,
        fields(
            user = ledger::identifier(request.user_id.as_deref()),
            category = field::Empty,
            cached = field::Empty,
        )
    )]
    pub async fn handle(&self, request: ChatRequest) -> Result<Reply> {
        request.validate()?;

        let category = self.classifier.classify(&request.message);
        Span::current().record("category", category.as_str());

        let mut decision = self
            .policy
            .resolve_with_history(category, &request.history)?;
        if let Some(stream) = request.stream {
            decision = decision.with_streaming(stream);
        }

        let key = compute_key(&request.message, category);
        if let Some(answer) = self.cache.get_answer(&key).await {
            Span::current().record("cached", true);
            return Ok(cached_reply(answer, category, decision.streaming));
        }
        Span::current().record("cached", false);

        let identifier = ledger::identifier(request.user_id.as_deref()).to_string();
        self.usage.check(&identifier).await?;

        let payload = self
            .gateway
            .prepare(&decision, &request.history, &request.message);
        let payload_chars = payload.char_len();

        match self.gateway.send(&decision, payload).await? {
            Dispatched::Buffered(completion) => {
                self.cache
                    .set(
                        key,
                        CachedValue::text(completion.text.clone(), completion.model.clone()),
                    )
                    .await;
                self.usage
                    .record(&identifier, payload_chars, completion.text.chars().count())
                    .await;
                Ok(Reply::Json(ChatReply {
                    text: completion.text,
                    model: completion.model,
                    cls: category,
                    cached: false,
                }))
            }
            Dispatched::Streaming(upstream) => {
                debug!(model = %upstream.model, "streaming upstream answer");
                let hook = self.commit_hook(key, upstream.model.clone(), identifier, payload_chars);
                let body = InterceptedStream::new(upstream.stream, hook)
                    .max_capture_bytes(self.max_capture_bytes);
                Ok(Reply::Stream(StreamReply {
                    model: upstream.model,
                    category,
                    cached: false,
                    body: Box::pin(body),
                }))
            }
        }
    }

    fn commit_hook(
        &self,
        key: CacheKey,
        model: String,
        identifier: String,
        payload_chars: usize,
    ) -> CommitHook {
        let cache = self.cache.clone();
        let usage = self.usage.clone();
        Box::new(move |captured: Captured| -> BoxFuture<'static, ()> {
            Box::pin(async move {
                let value = match captured.answer {
                    Some(text) => CachedValue::text(text, model),
                    None => CachedValue::Streamed,
                };
                cache.set(key, value).await;
                usage
                    .record(&identifier, payload_chars, captured.response_chars)
                    .await;
            })
        })
    }
}

/// Replies with the model that produced the cached text, which can differ
/// from the one routing picks now.
fn cached_reply(answer: CachedAnswer, category: Category, streaming: bool) -> Reply {
    let CachedAnswer { text, model } = answer;
    if streaming {
        let replay: Bytes = sse::replay(&text, &model);
        let body = futures_util::stream::once(async move { Ok::<_, HermodError>(replay) });
        return Reply::Stream(StreamReply {
            model,
            category,
            cached: true,
            body: Box::pin(body),
        });
    }
    Reply::Json(ChatReply {
        text,
        model,
        cls: category,
        cached: true,
    })
}
