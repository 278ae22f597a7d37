//! Server-side TLS (§4.13a): both-or-neither cert/key contract.
//!
//! Grounded on the original implementation's `server/tls.py::create_ssl_context`
//! for the "only enabled when both are present" rule, reimplemented with
//! `tokio-rustls` — the TLS family the rest of this example pack reaches for
//! (`reqwest`/`tokio-tungstenite` with `rustls-tls*` features), rather than
//! introducing `native-tls`/OpenSSL with no pack precedent.

use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

/// A byte stream this daemon can read/write frames over, TLS or not. Boxing
/// behind this trait lets the handshake/dispatcher code stay oblivious to
/// which transport accepted the connection.
pub trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Stream for T {}

pub type BoxedStream = Box<dyn Stream>;

/// Loads a server TLS acceptor from a cert chain and private key file, or
/// returns `None` when either path is absent — matching the spec's "when
/// either is absent, TLS is disabled" rule exactly; this function does not
/// itself decide whether to call that an error.
pub fn load_acceptor(
    certfile: Option<&Path>,
    keyfile: Option<&Path>,
) -> anyhow::Result<Option<TlsAcceptor>> {
    let (Some(certfile), Some(keyfile)) = (certfile, keyfile) else {
        return Ok(None);
    };

    let cert_file = std::fs::File::open(certfile)
        .with_context(|| format!("opening certfile {}", certfile.display()))?;
    let certs: Vec<CertificateDer<'static>> =
        rustls_pemfile::certs(&mut BufReader::new(cert_file))
            .collect::<Result<_, _>>()
            .context("parsing certfile as PEM certificates")?;

    let key_file = std::fs::File::open(keyfile)
        .with_context(|| format!("opening keyfile {}", keyfile.display()))?;
    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut BufReader::new(key_file))
        .context("parsing keyfile as a PEM private key")?
        .context("keyfile contained no private key")?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("building TLS server config")?;

    Ok(Some(TlsAcceptor::from(Arc::new(config))))
}

/// Wraps an accepted `TcpStream` in TLS when `acceptor` is `Some`, otherwise
/// passes it through as plain TCP.
pub async fn maybe_wrap(
    stream: TcpStream,
    acceptor: Option<&TlsAcceptor>,
) -> anyhow::Result<BoxedStream> {
    match acceptor {
        Some(acceptor) => {
            let tls_stream = acceptor.accept(stream).await.context("TLS handshake failed")?;
            Ok(Box::new(tls_stream))
        }
        None => Ok(Box::new(stream)),
    }
}
