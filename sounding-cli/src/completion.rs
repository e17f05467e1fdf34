//! Completion client for OpenAI-compatible `/completions` endpoints.

use log::debug;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use sounding_core::config::LlmConfig;
use sounding_core::{Completion, CompletionClient, CompletionError, CompletionFuture, StreamEvent};

use crate::CliResult;

/// Reqwest-backed [`CompletionClient`].
pub(crate) struct HttpCompletionClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(rename = "type", default)]
    kind: String,
}

impl HttpCompletionClient {
    /// Build a client for the endpoint described by `config`.
    pub(crate) fn new(config: &LlmConfig) -> CliResult<Self> {
        let client = Client::builder()
            .user_agent("sounding-cli")
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            stream: config.stream,
        })
    }

    async fn send(&self, prompt: &str) -> Result<Completion, CompletionError> {
        let request = CompletionRequest {
            model: &self.model,
            prompt,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: self.stream,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        if self.stream {
            read_stream(response).await
        } else {
            let body: CompletionResponse = response
                .json()
                .await
                .map_err(|err| CompletionError::Unavailable(format!("invalid response: {err}")))?;
            if let Some(error) = body.error {
                return Err(api_error(error));
            }
            let text = body
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.text)
                .ok_or_else(|| CompletionError::Unavailable("response has no choices".to_string()))?;
            Ok(Completion::Text(text))
        }
    }
}

impl CompletionClient for HttpCompletionClient {
    fn complete<'a>(&'a self, prompt: &'a str) -> CompletionFuture<'a> {
        Box::pin(self.send(prompt))
    }
}

async fn read_stream(mut response: Response) -> Result<Completion, CompletionError> {
    let mut events = Vec::new();
    let mut buffer: Vec<u8> = Vec::new();

    loop {
        let chunk = match response.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(err) if err.is_timeout() => return Err(CompletionError::Timeout),
            Err(err) => {
                debug!("stream read failed: {err}");
                return Err(CompletionError::Interrupted);
            }
        };
        buffer.extend_from_slice(&chunk);
        while let Some(newline) = buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            match parse_sse_line(&line) {
                Some(Ok(StreamEvent::Done)) => {
                    events.push(StreamEvent::Done);
                    return Ok(Completion::Stream(events));
                }
                Some(Ok(event)) => events.push(event),
                Some(Err(err)) => return Err(err),
                None => {}
            }
        }
    }

    if !buffer.is_empty() {
        let line = String::from_utf8_lossy(&buffer).into_owned();
        match parse_sse_line(&line) {
            Some(Ok(event)) => events.push(event),
            Some(Err(err)) => return Err(err),
            None => {}
        }
    }
    Ok(Completion::Stream(events))
}

/// Decode one server-sent-event line.
///
/// Only `data:` lines produce events; a JSON `error` object maps to the
/// matching [`CompletionError`].
fn parse_sse_line(line: &str) -> Option<Result<StreamEvent, CompletionError>> {
    let data = line.trim().strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(Ok(StreamEvent::Done));
    }
    let chunk: CompletionResponse = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(err) => {
            debug!("skipping unparseable stream chunk: {err}");
            return None;
        }
    };
    if let Some(error) = chunk.error {
        return Some(Err(api_error(error)));
    }
    let text = chunk.choices.into_iter().next().and_then(|choice| choice.text)?;
    Some(Ok(StreamEvent::Token(text)))
}

fn transport_error(err: reqwest::Error) -> CompletionError {
    if err.is_timeout() {
        CompletionError::Timeout
    } else {
        CompletionError::Unavailable(err.to_string())
    }
}

fn status_error(status: StatusCode, body: String) -> CompletionError {
    let detail = if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{status}: {}", body.trim())
    };
    match status.as_u16() {
        401 | 403 => CompletionError::AuthError(detail),
        408 => CompletionError::Timeout,
        429 => CompletionError::RateLimited,
        400 | 404 | 422 => CompletionError::MalformedRequest(detail),
        code if code >= 500 => CompletionError::Unavailable(detail),
        _ => CompletionError::MalformedRequest(detail),
    }
}

fn api_error(error: ApiError) -> CompletionError {
    let kind = error.kind.to_ascii_lowercase();
    if kind.contains("rate_limit") {
        CompletionError::RateLimited
    } else if kind.contains("auth") || kind.contains("permission") || kind.contains("api_key") {
        CompletionError::AuthError(error.message)
    } else if kind.contains("invalid_request") {
        CompletionError::MalformedRequest(error.message)
    } else if kind.contains("timeout") {
        CompletionError::Timeout
    } else {
        CompletionError::Unavailable(error.message)
    }
}
