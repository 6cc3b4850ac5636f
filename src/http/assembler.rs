//! Request assembler - incremental, bounded reads from a connection
//!
//! Bytes are accumulated in a single growable buffer until the header
//! terminator shows up, the header cap is hit, or the idle retry budget is
//! spent. Once the headers are in, the body is read up to the declared
//! Content-Length. Bytes past the end of one request stay buffered for the
//! next one, so pipelined requests on a persistent connection are preserved.
//! A POST without Content-Length takes whatever follows the terminator as its
//! body; its framing is unknown, so the connection is not reused.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::request::header_value;
use super::HEADER_TERMINATOR;
use crate::config::ReadPolicy;

/// Outcome of one assembly attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembly {
    /// No bytes arrived (probe, idle keep-alive or peer closed)
    Empty,
    /// A request block; `complete` is false when limits cut it short or the
    /// body length was not declared
    Request { block: Vec<u8>, complete: bool },
}

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("Request body of {declared} bytes exceeds limit of {limit} bytes")]
    BodyTooLarge { declared: usize, limit: usize },
    #[error("Invalid Content-Length: {0}")]
    InvalidContentLength(String),
    #[error("Failed to read from connection: {0}")]
    Io(#[from] std::io::Error),
}

/// Locate the end of the header block (index just past `\r\n\r\n`)
pub fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
        .map(|pos| pos + HEADER_TERMINATOR.len())
}

/// Body length announced by a header block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyLength {
    Absent,
    Declared(usize),
    Invalid(String),
}

pub fn declared_body_length(header_block: &[u8]) -> BodyLength {
    let headers = String::from_utf8_lossy(header_block);
    match header_value(&headers, "Content-Length") {
        None => BodyLength::Absent,
        Some(raw) => match raw.parse::<usize>() {
            Ok(n) => BodyLength::Declared(n),
            Err(_) => BodyLength::Invalid(raw),
        },
    }
}

fn is_post(buffer: &[u8]) -> bool {
    buffer.len() >= 5 && buffer[..5].eq_ignore_ascii_case(b"POST ")
}

pub struct RequestAssembler<R> {
    reader: R,
    policy: ReadPolicy,
    buffer: Vec<u8>,
    eof: bool,
}

impl<R: AsyncRead + Unpin> RequestAssembler<R> {
    pub fn new(reader: R, policy: ReadPolicy) -> Self {
        Self {
            reader,
            policy,
            buffer: Vec::with_capacity(1024),
            eof: false,
        }
    }

    /// Bytes currently held for a request not yet handed out
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the peer has closed its write side
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Assemble the next request.
    ///
    /// When `first_byte_timeout` is set and nothing is buffered, the
    /// assembler first waits that long for any byte to arrive (used between
    /// requests on a kept-alive connection) before applying the idle policy.
    pub async fn next_request(
        &mut self,
        first_byte_timeout: Option<Duration>,
    ) -> Result<Assembly, AssembleError> {
        if self.buffer.is_empty() {
            if self.eof {
                return Ok(Assembly::Empty);
            }
            if let Some(wait) = first_byte_timeout {
                let limit = self.policy.max_request_bytes;
                match timeout(wait, self.read_chunk(limit)).await {
                    Err(_) => {
                        debug!("Keep-alive wait of {:?} elapsed without data", wait);
                        return Ok(Assembly::Empty);
                    }
                    Ok(read) => {
                        if read? == 0 {
                            self.eof = true;
                            return Ok(Assembly::Empty);
                        }
                    }
                }
            }
        }

        let header_end = self.read_headers().await?;

        let Some(header_end) = header_end else {
            if self.buffer.is_empty() {
                return Ok(Assembly::Empty);
            }
            warn!(
                "Header block incomplete after {} bytes, handing over what arrived",
                self.buffer.len()
            );
            let block = std::mem::take(&mut self.buffer);
            return Ok(Assembly::Request {
                block,
                complete: false,
            });
        };

        let declared = match declared_body_length(&self.buffer[..header_end]) {
            BodyLength::Declared(n) => n,
            BodyLength::Invalid(raw) => {
                self.buffer.clear();
                return Err(AssembleError::InvalidContentLength(raw));
            }
            BodyLength::Absent if is_post(&self.buffer) => {
                return self.take_undeclared_body(header_end).await;
            }
            BodyLength::Absent => 0,
        };
        if declared > self.policy.max_body_bytes {
            self.buffer.clear();
            return Err(AssembleError::BodyTooLarge {
                declared,
                limit: self.policy.max_body_bytes,
            });
        }

        let total = header_end + declared;
        let mut idle = 0;
        while self.buffer.len() < total {
            if !self.fill(total, &mut idle).await? {
                break;
            }
        }

        if self.buffer.len() < total {
            warn!(
                "Body incomplete: expected {} bytes, received {}",
                declared,
                self.buffer.len() - header_end
            );
            let block = std::mem::take(&mut self.buffer);
            return Ok(Assembly::Request {
                block,
                complete: false,
            });
        }

        let rest = self.buffer.split_off(total);
        let block = std::mem::replace(&mut self.buffer, rest);
        Ok(Assembly::Request {
            block,
            complete: true,
        })
    }

    /// Everything after the terminator is the body. When nothing followed the
    /// headers yet, one more read within the idle budget picks up a body sent
    /// separately.
    async fn take_undeclared_body(&mut self, header_end: usize) -> Result<Assembly, AssembleError> {
        if self.buffer.len() == header_end {
            let limit = header_end + self.policy.max_body_bytes;
            let mut idle = 0;
            self.fill(limit, &mut idle).await?;
        }
        debug!(
            "POST without Content-Length, taking {} buffered body bytes",
            self.buffer.len() - header_end
        );
        Ok(Assembly::Request {
            block: std::mem::take(&mut self.buffer),
            complete: false,
        })
    }

    /// Read until the terminator is buffered; None when a limit stopped us first
    async fn read_headers(&mut self) -> Result<Option<usize>, AssembleError> {
        let mut idle = 0;
        loop {
            if let Some(end) = find_header_end(&self.buffer) {
                return Ok(Some(end));
            }
            if self.buffer.len() >= self.policy.max_request_bytes {
                return Ok(None);
            }
            if !self.fill(self.policy.max_request_bytes, &mut idle).await? {
                return Ok(find_header_end(&self.buffer));
            }
        }
    }

    /// One successful read towards `limit`, retrying idle waits per the policy.
    /// Returns false once the peer closed or the idle budget is spent.
    async fn fill(&mut self, limit: usize, idle: &mut u32) -> Result<bool, AssembleError> {
        let max_retries = self.policy.max_idle_retries.max(1);
        loop {
            if self.eof {
                return Ok(false);
            }

            let wait = self
                .policy
                .backoff
                .delay(self.policy.idle_retry_interval, *idle);

            match timeout(wait, self.read_chunk(limit)).await {
                Ok(read) => {
                    if read? == 0 {
                        self.eof = true;
                        return Ok(false);
                    }
                    *idle = 0;
                    return Ok(true);
                }
                Err(_) => {
                    *idle += 1;
                    if *idle >= max_retries {
                        debug!("Idle retry budget exhausted after {} attempts", *idle);
                        return Ok(false);
                    }
                }
            }
        }
    }

    /// Read at most one chunk without growing the buffer past `limit`
    async fn read_chunk(&mut self, limit: usize) -> std::io::Result<usize> {
        let room = limit
            .saturating_sub(self.buffer.len())
            .min(self.policy.chunk_size)
            .max(1);
        let mut chunk = vec![0u8; room];
        let n = self.reader.read(&mut chunk).await?;
        self.buffer.extend_from_slice(&chunk[..n]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_header_end() {
        assert_eq!(find_header_end(b"GET / HTTP/1.1\r\n\r\n"), Some(18));
        assert_eq!(find_header_end(b"GET / HTTP/1.1\r\nHost: x\r\n"), None);
        assert_eq!(find_header_end(b""), None);
    }

    #[test]
    fn test_declared_body_length() {
        assert_eq!(
            declared_body_length(b"POST /mcp HTTP/1.1\r\ncontent-length: 42\r\n\r\n"),
            BodyLength::Declared(42)
        );
        assert_eq!(
            declared_body_length(b"GET / HTTP/1.1\r\n\r\n"),
            BodyLength::Absent
        );
        assert_eq!(
            declared_body_length(b"POST / HTTP/1.1\r\nContent-Length: nope\r\n\r\n"),
            BodyLength::Invalid("nope".to_string())
        );
    }

    #[test]
    fn test_is_post() {
        assert!(is_post(b"POST /mcp HTTP/1.1"));
        assert!(is_post(b"post /mcp HTTP/1.1"));
        assert!(!is_post(b"GET /mcp HTTP/1.1"));
        assert!(!is_post(b"POS"));
    }
}
