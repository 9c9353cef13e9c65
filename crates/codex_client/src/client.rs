use std::collections::VecDeque;

use chat_model::{ModelDelta, ModelOutput};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;

use crate::assembler::ResponseAssembler;
use crate::config::CodexConfig;
use crate::error::{status_message, CodexClientError};
use crate::headers::build_headers;
use crate::payload::ResponsesRequest;
use crate::sse::SseFrameParser;

/// Cooperative-concurrency client for the responses endpoint.
#[derive(Debug)]
pub struct CodexClient {
    http: reqwest::Client,
    config: CodexConfig,
}

impl CodexClient {
    pub fn new(config: CodexConfig) -> Result<Self, CodexClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(CodexClientError::from_reqwest)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &CodexConfig {
        &self.config
    }

    /// Buffered invocation: reads the whole exchange, then assembles.
    pub async fn invoke(
        &self,
        request: &ResponsesRequest,
    ) -> Result<ModelOutput, CodexClientError> {
        let response = self.send(request).await?;
        let body = response
            .bytes()
            .await
            .map_err(CodexClientError::from_reqwest)?;

        let mut assembler = ResponseAssembler::new();
        for event in SseFrameParser::parse_frames(&String::from_utf8_lossy(&body)) {
            assembler.absorb(event)?;
        }
        Ok(assembler.finish())
    }

    /// Streaming invocation: returns a lazy pull-based delta sequence.
    ///
    /// Dropping the returned stream abandons the underlying connection; no
    /// separate cancellation signal exists.
    pub async fn stream(
        &self,
        request: &ResponsesRequest,
    ) -> Result<CodexStream, CodexClientError> {
        let response = self.send(request).await?;
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();

        Ok(CodexStream {
            bytes,
            parser: SseFrameParser::default(),
            assembler: ResponseAssembler::new(),
            pending: VecDeque::new(),
            done: false,
        })
    }

    async fn send(
        &self,
        request: &ResponsesRequest,
    ) -> Result<reqwest::Response, CodexClientError> {
        let headers = build_headers(&self.config)?;
        let response = self
            .http
            .post(self.config.responses_endpoint())
            .headers(headers)
            .json(request)
            .send()
            .await
            .map_err(CodexClientError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CodexClientError::Status(
                status,
                status_message(status, &body),
            ));
        }

        Ok(response)
    }
}

/// Lazily-consumed streaming response.
///
/// Network chunks carry no event-boundary alignment guarantee; the embedded
/// parser re-frames them and the shared assembler reduces them to deltas.
pub struct CodexStream {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    parser: SseFrameParser,
    assembler: ResponseAssembler,
    pending: VecDeque<ModelDelta>,
    done: bool,
}

impl CodexStream {
    /// Pulls the next incremental result, suspending between network reads.
    pub async fn next(&mut self) -> Option<Result<ModelDelta, CodexClientError>> {
        loop {
            if let Some(delta) = self.pending.pop_front() {
                return Some(Ok(delta));
            }
            if self.done {
                return None;
            }

            match self.bytes.next().await {
                Some(Ok(chunk)) => {
                    for event in self.parser.feed(&chunk) {
                        match self.assembler.absorb(event) {
                            Ok(deltas) => self.pending.extend(deltas),
                            Err(error) => {
                                self.done = true;
                                return Some(Err(error));
                            }
                        }
                    }
                    if self.parser.is_terminated() {
                        self.done = true;
                    }
                }
                Some(Err(error)) => {
                    self.done = true;
                    return Some(Err(CodexClientError::from_reqwest(error)));
                }
                None => self.done = true,
            }
        }
    }

    /// Consumes the stream, returning the state assembled so far.
    ///
    /// Matches the final [`ModelDelta::Completed`] payload once the stream
    /// has been drained.
    #[must_use]
    pub fn into_output(self) -> ModelOutput {
        self.assembler.finish()
    }
}
