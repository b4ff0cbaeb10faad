//! Rendering through a `PlantUML` server.

use std::time::Duration;

use ureq::Agent;
use ureq::tls::TlsConfig;

use super::{RenderBackend, RenderError, RenderJob, RenderOutcome};

/// Raw HTTP response from a diagram server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// HTTP seam used by [`ServerRenderer`].
pub trait DiagramServer {
    /// Issue a GET request.
    ///
    /// Any status code is a successful response; only transport failures
    /// are errors.
    fn get(&self, url: &str) -> Result<ServerResponse, RenderError>;
}

impl<S: DiagramServer + ?Sized> DiagramServer for &S {
    fn get(&self, url: &str) -> Result<ServerResponse, RenderError> {
        (**self).get(url)
    }
}

/// [`DiagramServer`] backed by a blocking `ureq` agent.
#[derive(Debug, Clone)]
pub struct HttpServer {
    agent: Agent,
}

impl HttpServer {
    /// Create a client with a global request timeout.
    ///
    /// `disable_tls_verification` accepts any server certificate, for
    /// self-hosted servers with private certificates.
    #[must_use]
    pub fn new(timeout: Duration, disable_tls_verification: bool) -> Self {
        let mut config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false);
        if disable_tls_verification {
            config = config.tls_config(TlsConfig::builder().disable_verification(true).build());
        }
        Self {
            agent: config.build().into(),
        }
    }
}

impl DiagramServer for HttpServer {
    fn get(&self, url: &str) -> Result<ServerResponse, RenderError> {
        let http_error = |message: String| RenderError::Http {
            url: url.to_owned(),
            message,
        };

        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| http_error(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .into_body()
            .read_to_vec()
            .map_err(|e| http_error(e.to_string()))?;

        Ok(ServerResponse { status, body })
    }
}

/// Fetches `<server>/<format>/<token>`.
///
/// A non-200 status skips the variant; transport errors abort the diagram.
#[derive(Debug, Clone)]
pub struct ServerRenderer<S> {
    server: S,
    base_url: String,
}

impl<S: DiagramServer> ServerRenderer<S> {
    #[must_use]
    pub fn new(server: S, base_url: &str) -> Self {
        Self {
            server,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Request URL for a token.
    #[must_use]
    pub fn url(&self, format: &str, token: &str) -> String {
        diagram_url(&self.base_url, format, token)
    }
}

/// `<base_url>/<format>/<token>`, ignoring trailing slashes on the base.
#[must_use]
pub fn diagram_url(base_url: &str, format: &str, token: &str) -> String {
    format!("{}/{format}/{token}", base_url.trim_end_matches('/'))
}

impl<S: DiagramServer> RenderBackend for ServerRenderer<S> {
    fn render(&self, job: &RenderJob<'_>) -> Result<RenderOutcome, RenderError> {
        let url = self.url(job.format, job.token);
        tracing::debug!(%url, "Requesting diagram");

        let response = self.server.get(&url)?;
        if response.status != 200 {
            let detail = String::from_utf8_lossy(&response.body);
            tracing::warn!(
                %url,
                status = response.status,
                body = detail.trim(),
                "Diagram server returned an error status"
            );
            return Ok(RenderOutcome::Skipped {
                reason: format!("server returned HTTP {}", response.status),
            });
        }

        Ok(RenderOutcome::Rendered(response.body))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::catalog::Variant;
    use crate::render::MockServer;
    use pretty_assertions::assert_eq;

    fn job(token: &str) -> RenderJob<'_> {
        RenderJob {
            source_path: Path::new("a.puml"),
            flattened: "",
            token,
            variant: Variant::Normal,
            format: "png",
        }
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        let renderer = ServerRenderer::new(MockServer::new(), "http://localhost:8080/plantuml/");
        assert_eq!(
            renderer.url("svg", "SyfFKj2rKt3CoKnELR1Io4ZDoSa70000"),
            "http://localhost:8080/plantuml/svg/SyfFKj2rKt3CoKnELR1Io4ZDoSa70000"
        );
    }

    #[test]
    fn test_ok_response_is_rendered() {
        let server = MockServer::new().with_response(200, b"\x89PNG\r\n\x1a\n\x00\xff".to_vec());
        let renderer = ServerRenderer::new(&server, "http://localhost:8080");

        let outcome = renderer.render(&job("abc")).unwrap();

        assert_eq!(
            outcome,
            RenderOutcome::Rendered(b"\x89PNG\r\n\x1a\n\x00\xff".to_vec())
        );
        assert_eq!(server.requests(), vec!["http://localhost:8080/png/abc"]);
    }

    #[test]
    fn test_error_status_is_skipped() {
        let server = MockServer::new().with_response(400, b"Syntax error".to_vec());
        let renderer = ServerRenderer::new(&server, "http://localhost:8080");

        let outcome = renderer.render(&job("abc")).unwrap();

        assert_eq!(
            outcome,
            RenderOutcome::Skipped {
                reason: "server returned HTTP 400".to_owned()
            }
        );
    }

    #[test]
    fn test_transport_error_is_propagated() {
        let server = MockServer::new();
        let renderer = ServerRenderer::new(&server, "http://localhost:8080");

        let err = renderer.render(&job("abc")).unwrap_err();

        assert!(matches!(err, RenderError::Http { url, .. } if url == "http://localhost:8080/png/abc"));
    }

    #[test]
    fn test_http_server_connection_refused() {
        let server = HttpServer::new(Duration::from_secs(2), false);
        let err = server.get("http://127.0.0.1:1/png/abc").unwrap_err();
        assert!(matches!(err, RenderError::Http { .. }));
    }
}
