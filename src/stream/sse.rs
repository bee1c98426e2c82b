//! Server-sent event helpers for OpenAI-compatible completion streams.

use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct Chunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<Delta>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

/// Whether a transcript looks like an SSE event stream.
///
/// Decided by the first non-blank line: a `data:`, `event:`, `id:` field or
/// a `:` comment.
pub fn is_sse(transcript: &str) -> bool {
    transcript
        .lines()
        .map(str::trim_start)
        .find(|line| !line.is_empty())
        .is_some_and(|line| {
            line.starts_with("data:")
                || line.starts_with("event:")
                || line.starts_with("id:")
                || line.starts_with(':')
        })
}

/// Concatenate the answer text carried by an SSE transcript.
///
/// Each `data:` payload contributes `choices[0].delta.content`, or
/// `choices[0].text` for legacy completion chunks. `[DONE]`, comments and
/// payloads that are not JSON are skipped.
pub fn extract_content(transcript: &str) -> String {
    let mut text = String::new();
    for line in transcript.lines() {
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            continue;
        }
        let Ok(chunk) = serde_json::from_str::<Chunk>(data) else {
            continue;
        };
        let Some(choice) = chunk.choices.into_iter().next() else {
            continue;
        };
        let piece = choice.delta.and_then(|d| d.content).or(choice.text);
        if let Some(piece) = piece {
            text.push_str(&piece);
        }
    }
    text
}

/// Synthesize a complete SSE transcript carrying `text` as one delta.
///
/// Used to answer a streaming request from the cache in the same shape the
/// upstream would have produced.
pub fn replay(text: &str, model: &str) -> Bytes {
    let chunk = json!({
        "object": "chat.completion.chunk",
        "model": model,
        "choices": [{"index": 0, "delta": {"role": "assistant", "content": text}, "finish_reason": null}],
    });
    let done = json!({
        "object": "chat.completion.chunk",
        "model": model,
        "choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}],
    });
    Bytes::from(format!("data: {chunk}\n\ndata: {done}\n\ndata: [DONE]\n\n"))
}

/// In-band error marker appended when a stream fails after it started.
pub fn error_event(message: &str) -> Bytes {
    let payload = json!({ "error": message });
    Bytes::from(format!("event: error\ndata: {payload}\n\n"))
}
