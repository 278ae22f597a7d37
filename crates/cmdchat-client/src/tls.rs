//! Client-side TLS (supplementing §4.13a for the client half): `--tls`
//! opts in, `--ca-file` supplies a custom trust root (falling back to the
//! bundled Mozilla roots via `webpki-roots`), and `--tls-insecure` disables
//! certificate verification entirely for local testing.
//!
//! Grounded on the original's `client/tls.py::create_ssl_context` for the
//! three-flag contract, reimplemented with `tokio-rustls` to match the
//! server half.

use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio_rustls::TlsConnector;

pub trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Stream for T {}

pub type BoxedStream = Box<dyn Stream>;

/// Accepts any server certificate without validation. Used only when the
/// user explicitly passes `--tls-insecure`.
#[derive(Debug)]
struct NoVerification;

impl ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, tokio_rustls::rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ED25519,
            SignatureScheme::RSA_PSS_SHA256,
        ]
    }
}

/// Builds a connector when `tls` is requested, or `None` for plain TCP.
pub fn build_connector(
    tls: bool,
    tls_insecure: bool,
    ca_file: Option<&Path>,
) -> anyhow::Result<Option<TlsConnector>> {
    if !tls {
        return Ok(None);
    }

    let config = if tls_insecure {
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerification))
            .with_no_client_auth()
    } else {
        let mut roots = RootCertStore::empty();
        if let Some(ca_file) = ca_file {
            let file = std::fs::File::open(ca_file)
                .with_context(|| format!("opening CA bundle {}", ca_file.display()))?;
            let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut BufReader::new(file))
                .collect::<Result<_, _>>()
                .context("parsing CA bundle as PEM certificates")?;
            for cert in certs {
                roots.add(cert).context("adding CA certificate to trust store")?;
            }
        } else {
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        }
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth()
    };

    Ok(Some(TlsConnector::from(Arc::new(config))))
}

/// Wraps a connected `TcpStream` in TLS when `connector` is `Some`.
pub async fn maybe_wrap(
    stream: TcpStream,
    connector: Option<&TlsConnector>,
    host: &str,
) -> anyhow::Result<BoxedStream> {
    match connector {
        Some(connector) => {
            let server_name = tokio_rustls::rustls::pki_types::ServerName::try_from(host.to_string())
                .context("invalid server name for TLS SNI")?;
            let tls_stream = connector
                .connect(server_name, stream)
                .await
                .context("TLS handshake failed")?;
            Ok(Box::new(tls_stream))
        }
        None => Ok(Box::new(stream)),
    }
}
