//! HTTP probe implementation.

use chrono::Utc;
use reqwest::tls::TlsInfo;
use reqwest::StatusCode;
use std::error::Error as StdError;
use std::time::{Duration, Instant};

use super::{cert_days_remaining, Outcome, ProbeError};
use crate::catalog::Target;

/// Issues probe requests. Cheap to clone; all clones share one client.
#[derive(Debug, Clone)]
pub struct Prober {
    client: reqwest::Client,
    timeout: Duration,
}

impl Prober {
    /// Build a prober whose requests are abandoned after `timeout`.
    ///
    /// Redirects are not followed and idle connections are not kept, so a
    /// large rotating target set does not pile up open sockets.
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        Self::with_builder(reqwest::Client::builder(), timeout)
    }

    fn with_builder(
        builder: reqwest::ClientBuilder,
        timeout: Duration,
    ) -> Result<Self, ProbeError> {
        let client = builder
            .user_agent(concat!("pulsewatch/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(0)
            .tls_info(true)
            .build()
            .map_err(|e| ProbeError::Network(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// Probe a target once. Never fails; errors become unsuccessful outcomes.
    pub async fn probe(&self, target: &Target) -> Outcome {
        let requested_at = Utc::now();

        match self.request(target, requested_at).await {
            Ok(outcome) => outcome,
            Err(ProbeError::DescriptorExhausted(e)) => {
                tracing::warn!(
                    "Probe of {} failed, worker count may exceed the file descriptor limit: {}",
                    target.url,
                    e
                );
                Outcome::failed(&target.url, requested_at)
            }
            Err(e) => {
                tracing::debug!("Probe of {} failed: {}", target.url, e);
                Outcome::failed(&target.url, requested_at)
            }
        }
    }

    async fn request(
        &self,
        target: &Target,
        requested_at: chrono::DateTime<Utc>,
    ) -> Result<Outcome, ProbeError> {
        let start = Instant::now();

        let mut response = self
            .client
            .request(target.method.as_reqwest(), &target.url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        // reqwest exposes only the peer's leaf certificate, not the chain.
        let cert_days_remaining = response
            .extensions()
            .get::<TlsInfo>()
            .and_then(|info| info.peer_certificate())
            .and_then(|der| cert_days_remaining([der], requested_at));

        // Drain the full body to measure complete transfer time
        loop {
            match response.chunk().await {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(e) if e.is_timeout() => return Err(ProbeError::Timeout(self.timeout)),
                Err(e) => return Err(ProbeError::Body(error_chain(&e))),
            }
        }
        let latency = start.elapsed();

        if status != StatusCode::OK {
            tracing::trace!("Unsuccessful status for {}: {}", target.url, status);
        }

        Ok(Outcome {
            target: target.url.clone(),
            requested_at,
            succeeded: status == StatusCode::OK,
            latency: Some(latency),
            cert_days_remaining,
        })
    }

    fn classify(&self, e: reqwest::Error) -> ProbeError {
        if e.is_timeout() {
            ProbeError::Timeout(self.timeout)
        } else if is_descriptor_exhaustion(&e) {
            ProbeError::DescriptorExhausted(error_chain(&e))
        } else {
            ProbeError::Network(error_chain(&e))
        }
    }
}

/// Render an error with all of its sources, outermost first.
fn error_chain(e: &(dyn StdError + 'static)) -> String {
    let mut out = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}

/// True if any error in the chain reports EMFILE/ENFILE.
fn is_descriptor_exhaustion(e: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(e);
    while let Some(err) = current {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if is_emfile(io) || io.to_string().to_lowercase().contains("too many open files") {
                return true;
            }
        }
        current = err.source();
    }
    false
}

#[cfg(unix)]
fn is_emfile(io: &std::io::Error) -> bool {
    matches!(io.raw_os_error(), Some(libc::EMFILE) | Some(libc::ENFILE))
}

#[cfg(not(unix))]
fn is_emfile(_io: &std::io::Error) -> bool {
    false
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::catalog::Method;
    use axum::{
        http::{Method as HttpMethod, StatusCode as HttpStatus},
        response::Redirect,
        routing::{any, get},
        Router,
    };
    use rcgen::{BasicConstraints, CertificateParams, IsCa, KeyPair};
    use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    const LARGE_BODY: usize = 8 * 1024 * 1024;

    /// Serve a handful of canned endpoints on an ephemeral local port.
    pub(crate) async fn spawn_test_server() -> SocketAddr {
        let app = Router::new()
            .route("/ok", get(|| async { "ok" }))
            .route("/missing", get(|| async { (HttpStatus::NOT_FOUND, "nope") }))
            .route(
                "/unavailable",
                get(|| async { HttpStatus::SERVICE_UNAVAILABLE }),
            )
            .route("/moved", get(|| async { Redirect::permanent("/ok") }))
            .route("/large", get(|| async { vec![b'x'; LARGE_BODY] }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
            .route(
                "/head-only",
                any(|method: HttpMethod| async move {
                    if method == HttpMethod::HEAD {
                        HttpStatus::OK
                    } else {
                        HttpStatus::METHOD_NOT_ALLOWED
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    /// Serve HTTPS on an ephemeral local port with a leaf certificate valid
    /// until `now + valid_for`, signed by a fresh CA. Returns the CA to trust.
    async fn spawn_tls_server(valid_for: time::Duration) -> (SocketAddr, reqwest::Certificate) {
        let now = time::OffsetDateTime::now_utc();

        let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let ca_key = KeyPair::generate().unwrap();
        let ca_cert = ca_params.self_signed(&ca_key).unwrap();

        let mut leaf_params =
            CertificateParams::new(vec!["localhost".to_string(), "127.0.0.1".to_string()])
                .unwrap();
        leaf_params.not_before = now - time::Duration::days(1);
        leaf_params.not_after = now + valid_for;
        let leaf_key = KeyPair::generate().unwrap();
        let leaf_cert = leaf_params.signed_by(&leaf_key, &ca_cert, &ca_key).unwrap();

        let chain = vec![leaf_cert.der().clone(), ca_cert.der().clone()];
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(leaf_key.serialize_der()));
        let config = rustls::ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(chain, key)
        .unwrap();
        let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(config));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    let Ok(mut tls) = acceptor.accept(stream).await else {
                        return;
                    };
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match tls.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let _ = tls
                        .write_all(
                            b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok",
                        )
                        .await;
                    let _ = tls.shutdown().await;
                });
            }
        });

        let root = reqwest::Certificate::from_der(ca_cert.der()).unwrap();
        (addr, root)
    }

    fn target(addr: SocketAddr, path: &str) -> Target {
        Target::fixed(format!("http://{}{}", addr, path), Method::Get)
    }

    #[tokio::test]
    async fn test_status_200_succeeds() {
        let addr = spawn_test_server().await;
        let prober = Prober::new(Duration::from_secs(5)).unwrap();

        let outcome = prober.probe(&target(addr, "/ok")).await;

        assert!(outcome.succeeded);
        assert!(outcome.latency.is_some());
        assert_eq!(outcome.target, format!("http://{}/ok", addr));
        assert_eq!(outcome.cert_days_remaining, None);
    }

    #[tokio::test]
    async fn test_non_200_fails() {
        let addr = spawn_test_server().await;
        let prober = Prober::new(Duration::from_secs(5)).unwrap();

        for path in ["/missing", "/unavailable"] {
            let outcome = prober.probe(&target(addr, path)).await;
            assert!(!outcome.succeeded, "{} should not succeed", path);
            assert!(outcome.latency.is_some());
        }
    }

    #[tokio::test]
    async fn test_redirect_is_not_followed() {
        let addr = spawn_test_server().await;
        let prober = Prober::new(Duration::from_secs(5)).unwrap();

        let outcome = prober.probe(&target(addr, "/moved")).await;

        assert!(!outcome.succeeded);
    }

    #[tokio::test]
    async fn test_timeout_yields_no_latency() {
        let addr = spawn_test_server().await;
        let prober = Prober::new(Duration::from_millis(200)).unwrap();

        let outcome = prober.probe(&target(addr, "/slow")).await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.latency, None);
    }

    #[tokio::test]
    async fn test_large_body_is_drained() {
        let addr = spawn_test_server().await;
        let prober = Prober::new(Duration::from_secs(5)).unwrap();

        let outcome = prober.probe(&target(addr, "/large")).await;

        assert!(outcome.succeeded);
        assert!(outcome.latency.is_some());
    }

    #[tokio::test]
    async fn test_https_reports_leaf_certificate_days() {
        let valid_for = time::Duration::days(30) + time::Duration::hours(1);
        let (addr, root) = spawn_tls_server(valid_for).await;
        let builder = reqwest::Client::builder().add_root_certificate(root);
        let prober = Prober::with_builder(builder, Duration::from_secs(5)).unwrap();

        let url = format!("https://127.0.0.1:{}/", addr.port());
        let outcome = prober.probe(&Target::fixed(url, Method::Get)).await;

        assert!(outcome.succeeded);
        assert!(outcome.latency.is_some());
        assert_eq!(outcome.cert_days_remaining, Some(30));
    }

    #[tokio::test]
    async fn test_untrusted_certificate_fails() {
        let (addr, _root) = spawn_tls_server(time::Duration::days(30)).await;
        let prober = Prober::new(Duration::from_secs(5)).unwrap();

        let url = format!("https://127.0.0.1:{}/", addr.port());
        let outcome = prober.probe(&Target::fixed(url, Method::Get)).await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.latency, None);
        assert_eq!(outcome.cert_days_remaining, None);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let prober = Prober::new(Duration::from_secs(2)).unwrap();
        let outcome = prober.probe(&target(addr, "/ok")).await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.latency, None);
    }

    #[tokio::test]
    async fn test_configured_method_is_used() {
        let addr = spawn_test_server().await;
        let prober = Prober::new(Duration::from_secs(5)).unwrap();
        let url = format!("http://{}/head-only", addr);

        let head = prober.probe(&Target::fixed(url.clone(), Method::Head)).await;
        let get = prober.probe(&Target::fixed(url, Method::Get)).await;

        assert!(head.succeeded);
        assert!(!get.succeeded);
    }

    #[tokio::test]
    async fn test_invalid_url_fails() {
        let prober = Prober::new(Duration::from_secs(1)).unwrap();
        let outcome = prober
            .probe(&Target::fixed("not a url", Method::Get))
            .await;
        assert!(!outcome.succeeded);
    }

    #[cfg(unix)]
    #[test]
    fn test_emfile_is_descriptor_exhaustion() {
        let emfile = std::io::Error::from_raw_os_error(libc::EMFILE);
        assert!(is_descriptor_exhaustion(&emfile));
    }

    #[test]
    fn test_descriptor_exhaustion_detection() {
        let custom = std::io::Error::new(std::io::ErrorKind::Other, "Too many open files");
        assert!(is_descriptor_exhaustion(&custom));

        let refused = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        assert!(!is_descriptor_exhaustion(&refused));
    }
}
