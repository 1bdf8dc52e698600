//! One-shot localhost listener that receives the authorization redirect.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};
use url::Url;

use crate::error::AuthorizationFailure;
use crate::oauth::config::PortRange;

const MAX_REQUEST_BYTES: usize = 8192;
// Browsers open speculative connections that never send a request.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

const SUCCESS_HTML: &str = "<html><head><title>gplus</title></head><body>\
<h2>Received verification code.</h2><p>You may now close this window.</p></body></html>";
const FAILURE_HTML: &str = "<html><head><title>gplus</title></head><body>\
<h2>Authorization failed.</h2><p>You may close this window and try again.</p></body></html>";
const NOT_FOUND_HTML: &str = "<html><body><h2>Not found</h2></body></html>";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallbackPayload {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackPayload {
    /// Checks the provider's answer and extracts the authorization code.
    pub fn into_code(self, expected_state: &str) -> Result<String, AuthorizationFailure> {
        if let Some(error) = self.error {
            let reason = match self.error_description {
                Some(description) => format!("{} ({})", error, description),
                None => error,
            };
            return Err(AuthorizationFailure::Denied(reason));
        }
        match self.state.as_deref() {
            Some(state) if state == expected_state => {}
            Some(_) => {
                return Err(AuthorizationFailure::MalformedRedirect(
                    "state parameter mismatch".to_string(),
                ))
            }
            None => {
                return Err(AuthorizationFailure::MalformedRedirect(
                    "callback is missing the state parameter".to_string(),
                ))
            }
        }
        match self.code {
            Some(code) if !code.is_empty() => Ok(code),
            _ => Err(AuthorizationFailure::MalformedRedirect(
                "callback is missing the authorization code".to_string(),
            )),
        }
    }
}

#[derive(Debug)]
pub struct CallbackListener {
    listener: TcpListener,
    addr: SocketAddr,
    path: String,
}

impl CallbackListener {
    /// Binds the first free port in `ports` on `host`.
    pub async fn bind(
        host: IpAddr,
        ports: PortRange,
        path: &str,
    ) -> Result<Self, AuthorizationFailure> {
        let mut last_error = None;
        for port in ports.ports() {
            match TcpListener::bind((host, port)).await {
                Ok(listener) => {
                    let addr = listener.local_addr().map_err(AuthorizationFailure::Listener)?;
                    debug!(%addr, "callback listener bound");
                    return Ok(Self {
                        listener,
                        addr,
                        path: path.to_string(),
                    });
                }
                Err(e) => {
                    debug!(port, error = %e, "callback port unavailable");
                    last_error = Some(e);
                }
            }
        }
        Err(AuthorizationFailure::Listener(last_error.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "empty port range")
        })))
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Waits for the single redirect, answers it, and closes the listener.
    pub async fn wait_for_code(
        self,
        expected_state: &str,
        timeout: Duration,
    ) -> Result<String, AuthorizationFailure> {
        let (payload, mut socket) = tokio::time::timeout(timeout, self.accept_callback())
            .await
            .map_err(|_| AuthorizationFailure::Timeout)??;

        let outcome = payload.into_code(expected_state);
        let (status, body) = match &outcome {
            Ok(_) => ("200 OK", SUCCESS_HTML),
            Err(_) => ("400 Bad Request", FAILURE_HTML),
        };
        respond(&mut socket, status, body).await;
        outcome
    }

    async fn accept_callback(
        &self,
    ) -> Result<(CallbackPayload, TcpStream), AuthorizationFailure> {
        loop {
            let (mut socket, peer) = self
                .listener
                .accept()
                .await
                .map_err(AuthorizationFailure::Listener)?;

            let request_line =
                match tokio::time::timeout(READ_TIMEOUT, read_request_line(&mut socket)).await {
                    Ok(Ok(line)) => line,
                    Ok(Err(e)) => {
                        warn!(%peer, error = %e, "dropping unreadable callback connection");
                        continue;
                    }
                    Err(_) => {
                        debug!(%peer, "dropping idle callback connection");
                        continue;
                    }
                };

            match parse_request_line(&request_line, &self.path) {
                Some(payload) => return Ok((payload, socket)),
                None => {
                    debug!(%peer, request = %request_line, "ignoring request off the callback path");
                    respond(&mut socket, "404 Not Found", NOT_FOUND_HTML).await;
                }
            }
        }
    }
}

async fn read_request_line(socket: &mut TcpStream) -> std::io::Result<String> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        // Drain the whole request head so closing the socket does not reset it.
        if buffer.windows(4).any(|w| w == b"\r\n\r\n") || buffer.len() >= MAX_REQUEST_BYTES {
            break;
        }
    }
    if buffer.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "empty request",
        ));
    }
    let text = String::from_utf8_lossy(&buffer);
    Ok(text.lines().next().unwrap_or_default().to_string())
}

/// Parses `GET <target> HTTP/1.1`; `None` unless it is a GET on `path`.
pub fn parse_request_line(line: &str, path: &str) -> Option<CallbackPayload> {
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    if method != "GET" {
        return None;
    }
    let url = Url::parse(&format!("http://127.0.0.1{}", target)).ok()?;
    if url.path() != path {
        return None;
    }

    let mut payload = CallbackPayload::default();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => payload.code = Some(value.into_owned()),
            "state" => payload.state = Some(value.into_owned()),
            "error" => payload.error = Some(value.into_owned()),
            "error_description" => payload.error_description = Some(value.into_owned()),
            _ => {}
        }
    }
    Some(payload)
}

async fn respond(socket: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}
