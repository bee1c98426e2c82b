//! Upstream dispatch: payload assembly, racing, retry and timeouts.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::instrument;

use super::payload::{Completion, CompletionRequest, DEFAULT_HISTORY_TURNS};
use super::race::{Winner, race};
use super::retry::{RetryConfig, with_retry};
use super::traits::CompletionProvider;
use crate::routing::{ModelTiers, RoutingDecision};
use crate::stream::ByteStream;
use crate::telemetry;
use crate::types::Message;
use crate::{HermodError, Result};

/// Default budget for one upstream call (and for each idle gap in a stream).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Gateway behaviour knobs.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Hard budget per upstream call; for streams, the longest allowed gap
    /// between chunks. Default: 60s.
    pub timeout: Duration,
    /// History turns forwarded upstream. Default: 10.
    pub history_turns: usize,
    /// Race the cheap tier against the decided model for technical and
    /// creative requests. Default: off.
    pub race: bool,
    pub retry: RetryConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            history_turns: DEFAULT_HISTORY_TURNS,
            race: false,
            retry: RetryConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn history_turns(mut self, turns: usize) -> Self {
        self.history_turns = turns;
        self
    }

    pub fn race(mut self, enabled: bool) -> Self {
        self.race = enabled;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// A live upstream stream.
pub struct UpstreamStream {
    /// Model serving the stream.
    pub model: String,
    pub stream: ByteStream,
}

impl std::fmt::Debug for UpstreamStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamStream")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// Result of a dispatch, shaped by the request's streaming flag.
#[derive(Debug)]
pub enum Dispatched {
    Buffered(Completion),
    Streaming(UpstreamStream),
}

impl Dispatched {
    pub fn model(&self) -> &str {
        match self {
            Dispatched::Buffered(c) => &c.model,
            Dispatched::Streaming(s) => &s.model,
        }
    }
}

/// Sends routed requests upstream.
pub struct Gateway {
    provider: Arc<dyn CompletionProvider>,
    tiers: ModelTiers,
    config: GatewayConfig,
}

impl Gateway {
    pub fn new(provider: Arc<dyn CompletionProvider>, tiers: ModelTiers) -> Self {
        Self::with_config(provider, tiers, GatewayConfig::default())
    }

    pub fn with_config(
        provider: Arc<dyn CompletionProvider>,
        tiers: ModelTiers,
        config: GatewayConfig,
    ) -> Self {
        Self {
            provider,
            tiers,
            config,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Build the upstream payload for a decision.
    pub fn prepare(
        &self,
        decision: &RoutingDecision,
        history: &[Message],
        message: &str,
    ) -> CompletionRequest {
        CompletionRequest::build(decision, history, message, self.config.history_turns)
    }

    /// Build the payload and send it.
    pub async fn dispatch(
        &self,
        decision: &RoutingDecision,
        history: &[Message],
        message: &str,
    ) -> Result<Dispatched> {
        let request = self.prepare(decision, history, message);
        self.send(decision, request).await
    }

    /// Send a prepared payload.
    ///
    /// The first attempt may race; transient failures are retried against
    /// the cheapest configured model. Timeouts are final.
    #[instrument(
        skip_all,
        fields(
            provider = self.provider.name(),
            category = %decision.category,
            model = %request.model,
            stream = request.stream,
        )
    )]
    pub async fn send(
        &self,
        decision: &RoutingDecision,
        request: CompletionRequest,
    ) -> Result<Dispatched> {
        let mode = if request.stream { "streaming" } else { "buffered" };
        let fallback_model = self
            .tiers
            .cheapest()
            .unwrap_or(request.model.as_str())
            .to_string();
        let start = Instant::now();

        let result = with_retry(&self.config.retry, mode, |attempt| {
            let request = if attempt == 0 {
                request.clone()
            } else {
                request.with_model(fallback_model.as_str())
            };
            async move {
                if attempt == 0 {
                    self.first_attempt(decision, request).await
                } else {
                    call(self.provider.clone(), request, self.config.timeout).await
                }
            }
        })
        .await;

        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(telemetry::REQUESTS_TOTAL, "mode" => mode, "status" => status)
            .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS, "mode" => mode)
            .record(start.elapsed().as_secs_f64());
        result
    }

    async fn first_attempt(
        &self,
        decision: &RoutingDecision,
        request: CompletionRequest,
    ) -> Result<Dispatched> {
        let challenger_model = self
            .tiers
            .cheapest()
            .filter(|cheap| *cheap != request.model)
            .map(str::to_string);

        match challenger_model {
            Some(cheap) if self.config.race && decision.category.is_raceable() => {
                let challenger = request.with_model(cheap);
                let timeout = self.config.timeout;
                let (result, winner) = race(
                    call(self.provider.clone(), request, timeout),
                    call(self.provider.clone(), challenger, timeout),
                )
                .await;
                metrics::counter!(telemetry::RACE_TOTAL, "winner" => winner.as_str()).increment(1);
                if winner == Winner::Challenger {
                    tracing::debug!("cheap tier won the race");
                }
                result
            }
            _ => call(self.provider.clone(), request, self.config.timeout).await,
        }
    }
}

/// One bounded upstream call.
async fn call(
    provider: Arc<dyn CompletionProvider>,
    request: CompletionRequest,
    budget: Duration,
) -> Result<Dispatched> {
    if request.stream {
        let stream = tokio::time::timeout(budget, provider.complete_stream(&request))
            .await
            .map_err(|_| HermodError::Timeout(budget))??;
        Ok(Dispatched::Streaming(UpstreamStream {
            model: request.model,
            stream: idle_timeout(stream, budget),
        }))
    } else {
        let completion = tokio::time::timeout(budget, provider.complete(&request))
            .await
            .map_err(|_| HermodError::Timeout(budget))??;
        Ok(Dispatched::Buffered(completion))
    }
}

/// Fail the stream when no chunk arrives within `budget`.
fn idle_timeout(stream: ByteStream, budget: Duration) -> ByteStream {
    let timed = tokio_stream::StreamExt::timeout(stream, budget);
    Box::pin(futures_util::StreamExt::map(timed, move |item| {
        item.unwrap_or_else(|_| Err(HermodError::Timeout(budget)))
    }))
}
