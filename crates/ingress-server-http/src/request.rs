//! HTTP/1.x request head parsing using httparse
//!
//! Only the request line and headers are parsed. Every byte read from the
//! socket, including any body bytes that arrived with the head, is kept in
//! [`ParsedRequest::raw`] so it can be replayed to the tunnel untouched.

use bytes::{Bytes, BytesMut};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

/// Maximum number of headers to parse
const MAX_HEADERS: usize = 100;

/// Read granularity while waiting for the end of the head
const READ_CHUNK: usize = 4096;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("connection closed before any request was sent")]
    Empty,

    #[error("connection closed in the middle of the request head")]
    UnexpectedEof,

    #[error("malformed request: {0}")]
    Malformed(#[from] httparse::Error),

    #[error("request head larger than {0} bytes")]
    TooLarge(usize),

    #[error("malformed Host header")]
    InvalidHost,

    #[error("no request received within {0:?}")]
    Timeout(Duration),
}

/// One parsed request head
#[derive(Debug, Clone)]
pub struct ParsedRequest {
    pub method: String,
    /// Request target as sent (`/path`, `http://host/path`, `host:port`)
    pub target: String,
    /// Minor HTTP version (0 or 1)
    pub version: u8,
    /// Virtual host the request is addressed to (empty when none was given)
    pub host: String,
    /// Headers in arrival order; values are raw bytes
    pub headers: Vec<(String, Vec<u8>)>,
    /// Length of the request line plus headers, including the final CRLF
    pub head_len: usize,
    /// Everything read from the connection so far
    pub raw: Bytes,
}

impl ParsedRequest {
    /// First value of a header, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }

    pub fn authorization(&self) -> Option<&[u8]> {
        self.header("authorization")
    }
}

/// Read bytes from `reader` until one complete request head is buffered.
pub async fn read_request<R>(reader: &mut R, max_head: usize) -> Result<ParsedRequest, RequestError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = BytesMut::with_capacity(READ_CHUNK);

    loop {
        buffer.reserve(READ_CHUNK);
        let n = reader.read_buf(&mut buffer).await?;
        if n == 0 {
            return Err(if buffer.is_empty() {
                RequestError::Empty
            } else {
                RequestError::UnexpectedEof
            });
        }
        trace!("Read {} bytes of request head ({} total)", n, buffer.len());

        if let Some(request) = parse_request_head(&buffer)? {
            if request.head_len > max_head {
                return Err(RequestError::TooLarge(max_head));
            }
            let raw = buffer.freeze();
            return Ok(ParsedRequest { raw, ..request });
        }

        if buffer.len() >= max_head {
            return Err(RequestError::TooLarge(max_head));
        }
    }
}

/// Parse a request head from `data`.
///
/// Returns `Ok(None)` while the head is still incomplete. The returned
/// request's `raw` field holds only the head; [`read_request`] replaces it
/// with everything read.
pub fn parse_request_head(data: &[u8]) -> Result<Option<ParsedRequest>, RequestError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);

    let head_len = match req.parse(data)? {
        httparse::Status::Complete(len) => len,
        httparse::Status::Partial => return Ok(None),
    };

    // Complete parses always fill method, path and version
    let method = req.method.unwrap_or_default().to_string();
    let target = req.path.unwrap_or_default().to_string();
    let version = req.version.unwrap_or(1);

    let headers: Vec<(String, Vec<u8>)> = req
        .headers
        .iter()
        .map(|h| (h.name.to_string(), h.value.trim_ascii().to_vec()))
        .collect();

    let host = resolve_host(&method, &target, &headers)?;

    Ok(Some(ParsedRequest {
        method,
        target,
        version,
        host,
        headers,
        head_len,
        raw: Bytes::copy_from_slice(&data[..head_len]),
    }))
}

/// Pick the virtual host: absolute-form target first, then the first Host
/// header, else empty. Only an unusable host is an error; routing decides
/// the rest.
fn resolve_host(
    method: &str,
    target: &str,
    headers: &[(String, Vec<u8>)],
) -> Result<String, RequestError> {
    if let Some(authority) = target_authority(method, target) {
        return validate_host(authority.as_bytes());
    }

    match headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("host"))
    {
        Some((_, value)) => validate_host(value),
        None => Ok(String::new()),
    }
}

/// Authority of an absolute-form (`http://host/...`) or authority-form
/// (`CONNECT host:port`) request target.
fn target_authority<'a>(method: &str, target: &'a str) -> Option<&'a str> {
    if method.eq_ignore_ascii_case("CONNECT") {
        return Some(target).filter(|t| !t.is_empty());
    }

    let (scheme, rest) = target.split_once("://")?;
    let is_scheme = |c: char| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.');
    if scheme.is_empty() || !scheme.chars().all(is_scheme) {
        return None;
    }
    let end = rest
        .find(|c: char| matches!(c, '/' | '?' | '#'))
        .unwrap_or(rest.len());
    let authority = &rest[..end];
    // userinfo is never part of the routed host
    let authority = authority.rsplit('@').next().unwrap_or(authority);
    Some(authority).filter(|a| !a.is_empty())
}

/// The host is echoed into the 404 body, so line breaks and NULs are refused
fn validate_host(value: &[u8]) -> Result<String, RequestError> {
    if value.iter().any(|b| matches!(b, b'\r' | b'\n' | b'\0')) {
        return Err(RequestError::InvalidHost);
    }
    String::from_utf8(value.to_vec()).map_err(|_| RequestError::InvalidHost)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(data: &[u8]) -> Result<Option<ParsedRequest>, RequestError> {
        parse_request_head(data)
    }

    #[test]
    fn test_parse_simple_request() {
        let request = parse(b"GET / HTTP/1.1\r\nHost: foo.example.com\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.target, "/");
        assert_eq!(request.version, 1);
        assert_eq!(request.host, "foo.example.com");
        assert_eq!(request.head_len, 41);
        assert!(request.authorization().is_none());
    }

    #[test]
    fn test_parse_partial_request() {
        assert!(parse(b"GET / HTTP/1.1\r\nHost: foo").unwrap().is_none());
        assert!(parse(b"").unwrap().is_none());
    }

    #[test]
    fn test_authorization_is_case_insensitive_and_trimmed() {
        let request = parse(b"GET / HTTP/1.1\r\nHost: a\r\nauthorization:   secret  \r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(request.authorization(), Some(b"secret".as_slice()));
    }

    #[test]
    fn test_first_authorization_header_wins() {
        let request = parse(
            b"GET / HTTP/1.1\r\nHost: a\r\nAuthorization: one\r\nAuthorization: two\r\n\r\n",
        )
        .unwrap()
        .unwrap();
        assert_eq!(request.authorization(), Some(b"one".as_slice()));
    }

    #[test]
    fn test_host_keeps_port() {
        let request = parse(b"GET / HTTP/1.1\r\nHost: foo.example.com:8080\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(request.host, "foo.example.com:8080");
    }

    #[test]
    fn test_absolute_target_overrides_host_header() {
        let request =
            parse(b"GET http://user@bar.example.com/x?y HTTP/1.1\r\nHost: foo.example.com\r\n\r\n")
                .unwrap()
                .unwrap();
        assert_eq!(request.host, "bar.example.com");
    }

    #[test]
    fn test_origin_form_with_url_in_query_uses_host_header() {
        let request = parse(b"GET /login?next=http://evil.example.com/ HTTP/1.1\r\nHost: foo.example.com\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(request.host, "foo.example.com");
    }

    #[test]
    fn test_connect_uses_authority_target() {
        let request = parse(b"CONNECT foo.example.com:443 HTTP/1.1\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(request.host, "foo.example.com:443");
    }

    #[test]
    fn test_http10_without_host_is_empty() {
        let request = parse(b"GET / HTTP/1.0\r\n\r\n").unwrap().unwrap();
        assert_eq!(request.version, 0);
        assert_eq!(request.host, "");
    }

    #[test]
    fn test_http11_without_host_routes_on_empty_host() {
        let request = parse(b"GET / HTTP/1.1\r\nAccept: */*\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(request.version, 1);
        assert_eq!(request.host, "");
    }

    #[test]
    fn test_first_host_header_wins() {
        let request = parse(b"GET / HTTP/1.1\r\nHost: a.com\r\nhost: b.com\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(request.host, "a.com");
    }

    #[test]
    fn test_host_with_inner_space_is_kept() {
        let request = parse(b"GET / HTTP/1.1\r\nHost: a b\r\n\r\n").unwrap().unwrap();
        assert_eq!(request.host, "a b");
    }

    #[test]
    fn test_host_that_is_not_utf8_is_rejected() {
        assert!(matches!(
            parse(b"GET / HTTP/1.1\r\nHost: \xff\xfe.example.com\r\n\r\n"),
            Err(RequestError::InvalidHost)
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            parse(b"\x16\x03\x01\x02\x00\x01\x00\x01\xfc\x03\x03"),
            Err(RequestError::Malformed(_))
        ));
        assert!(matches!(
            parse(b"HELLO\r\n\r\n"),
            Err(RequestError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_read_request_keeps_body_prefix() {
        let data = b"POST /upload HTTP/1.1\r\nHost: a\r\nContent-Length: 5\r\n\r\nhello".to_vec();
        let mut reader = std::io::Cursor::new(data.clone());

        let request = read_request(&mut reader, 8192).await.unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(&request.raw[..], &data[..]);
        assert_eq!(&request.raw[request.head_len..], b"hello");
    }

    #[tokio::test]
    async fn test_read_request_across_reads() {
        let (mut client, mut server) = tokio::io::duplex(8);
        let writer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            client
                .write_all(b"GET /slow HTTP/1.1\r\nHost: slow.example.com\r\n\r\n")
                .await
                .unwrap();
            client
        });

        let request = read_request(&mut server, 8192).await.unwrap();
        assert_eq!(request.host, "slow.example.com");
        assert_eq!(request.target, "/slow");
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn test_read_request_errors() {
        let mut empty = std::io::Cursor::new(Vec::new());
        assert!(matches!(
            read_request(&mut empty, 8192).await,
            Err(RequestError::Empty)
        ));

        let mut truncated = std::io::Cursor::new(b"GET / HTTP/1.1\r\nHost: a\r\n".to_vec());
        assert!(matches!(
            read_request(&mut truncated, 8192).await,
            Err(RequestError::UnexpectedEof)
        ));

        let mut huge = std::io::Cursor::new(
            format!("GET / HTTP/1.1\r\nHost: a\r\nX-Pad: {}\r\n\r\n", "x".repeat(200)).into_bytes(),
        );
        assert!(matches!(
            read_request(&mut huge, 64).await,
            Err(RequestError::TooLarge(64))
        ));
    }
}
