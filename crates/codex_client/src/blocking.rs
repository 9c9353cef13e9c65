use std::collections::VecDeque;
use std::io::Read;

use chat_model::{ModelDelta, ModelOutput};

use crate::assembler::ResponseAssembler;
use crate::config::CodexConfig;
use crate::error::{status_message, CodexClientError};
use crate::headers::build_headers;
use crate::payload::ResponsesRequest;
use crate::sse::SseFrameParser;

/// Fixed read size for the synchronous chunk loop.
const READ_CHUNK_BYTES: usize = 4096;

/// Blocking client for the responses endpoint.
///
/// Must not be used from inside an async runtime; [`crate::CodexClient`] is
/// the cooperative counterpart.
#[derive(Debug)]
pub struct BlockingCodexClient {
    http: reqwest::blocking::Client,
    config: CodexConfig,
}

impl BlockingCodexClient {
    pub fn new(config: CodexConfig) -> Result<Self, CodexClientError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(CodexClientError::from_reqwest)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &CodexConfig {
        &self.config
    }

    /// Buffered invocation: reads the whole exchange, then assembles.
    pub fn invoke(&self, request: &ResponsesRequest) -> Result<ModelOutput, CodexClientError> {
        let response = self.send(request)?;
        let body = response.bytes().map_err(CodexClientError::from_reqwest)?;

        let mut assembler = ResponseAssembler::new();
        for event in SseFrameParser::parse_frames(&String::from_utf8_lossy(&body)) {
            assembler.absorb(event)?;
        }
        Ok(assembler.finish())
    }

    /// Streaming invocation: returns a lazy delta iterator.
    ///
    /// Dropping the iterator closes the underlying connection.
    pub fn stream(
        &self,
        request: &ResponsesRequest,
    ) -> Result<BlockingCodexStream, CodexClientError> {
        let response = self.send(request)?;
        Ok(BlockingCodexStream {
            response,
            parser: SseFrameParser::default(),
            assembler: ResponseAssembler::new(),
            pending: VecDeque::new(),
            done: false,
        })
    }

    fn send(
        &self,
        request: &ResponsesRequest,
    ) -> Result<reqwest::blocking::Response, CodexClientError> {
        let headers = build_headers(&self.config)?;
        let response = self
            .http
            .post(self.config.responses_endpoint())
            .headers(headers)
            .json(request)
            .send()
            .map_err(CodexClientError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CodexClientError::Status(
                status,
                status_message(status, &body),
            ));
        }

        Ok(response)
    }
}

/// Lazily-consumed streaming response over synchronous reads.
pub struct BlockingCodexStream {
    response: reqwest::blocking::Response,
    parser: SseFrameParser,
    assembler: ResponseAssembler,
    pending: VecDeque<ModelDelta>,
    done: bool,
}

impl BlockingCodexStream {
    /// Consumes the stream, returning the state assembled so far.
    #[must_use]
    pub fn into_output(self) -> ModelOutput {
        self.assembler.finish()
    }
}

impl Iterator for BlockingCodexStream {
    type Item = Result<ModelDelta, CodexClientError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut chunk = [0u8; READ_CHUNK_BYTES];

        loop {
            if let Some(delta) = self.pending.pop_front() {
                return Some(Ok(delta));
            }
            if self.done {
                return None;
            }

            match self.response.read(&mut chunk) {
                Ok(0) => self.done = true,
                Ok(read) => {
                    for event in self.parser.feed(&chunk[..read]) {
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
                Err(error) => {
                    self.done = true;
                    if error.kind() == std::io::ErrorKind::TimedOut {
                        return Some(Err(CodexClientError::Timeout));
                    }
                    return Some(Err(CodexClientError::Read(error)));
                }
            }
        }
    }
}
