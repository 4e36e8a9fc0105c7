//! TCP/TLS-Transport zur ServerQuery-Schnittstelle
//!
//! Liefert einen geboxten Bytestrom; Zeilenbildung und Protokoll liegen
//! im Adapter.

use std::io;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tsquery_protocol::{QueryError, QueryResult};

use crate::config::ConnectionConfig;

/// Bytestrom, ueber den der Adapter spricht (TCP, TLS oder Test-Pipe)
pub trait QueryStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> QueryStream for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

pub type BoxedStream = Box<dyn QueryStream>;

/// Baut die Verbindung gemaess Konfiguration auf
///
/// Fehler sind immer [`QueryError::Transport`] und tragen die Meldung des
/// Betriebssystems (Namensaufloesung, Verbindung abgelehnt, Timeout).
pub async fn verbinden(config: &ConnectionConfig) -> QueryResult<BoxedStream> {
    let adresse = config.adresse();
    tracing::debug!(adresse = %adresse, tls = config.tls, "Verbinde");

    let verbindung = TcpStream::connect((config.host.as_str(), config.query_port));
    let ergebnis = match config.timeout() {
        Some(dauer) => tokio::time::timeout(dauer, verbindung).await.map_err(|_| {
            QueryError::transport(
                io::ErrorKind::TimedOut,
                format!(
                    "Verbindung zu {adresse} nach {} ms abgebrochen",
                    config.timeout_ms
                ),
            )
        })?,
        None => verbindung.await,
    };
    let stream = ergebnis.map_err(|e| {
        QueryError::Transport(io::Error::new(
            e.kind(),
            format!("Verbindung zu {adresse} fehlgeschlagen: {e}"),
        ))
    })?;
    stream.set_nodelay(true)?;

    if !config.tls {
        return Ok(Box::new(stream));
    }

    let connector = tls_connector(config)?;
    let name = ServerName::try_from(config.host.clone()).map_err(|e| {
        QueryError::transport(
            io::ErrorKind::InvalidInput,
            format!("Ungueltiger TLS-Servername '{}': {e}", config.host),
        )
    })?;
    let tls = connector.connect(name, stream).await.map_err(|e| {
        QueryError::Transport(io::Error::new(
            e.kind(),
            format!("TLS-Handshake mit {adresse} fehlgeschlagen: {e}"),
        ))
    })?;
    tracing::debug!(adresse = %adresse, "TLS-Verbindung hergestellt");
    Ok(Box::new(tls))
}

fn tls_connector(config: &ConnectionConfig) -> QueryResult<TlsConnector> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(pfad) = &config.tls_ca_datei {
        let datei = std::fs::File::open(pfad).map_err(|e| {
            QueryError::Transport(io::Error::new(
                e.kind(),
                format!("CA-Datei '{pfad}' nicht lesbar: {e}"),
            ))
        })?;
        let mut reader = io::BufReader::new(datei);
        for zertifikat in rustls_pemfile::certs(&mut reader) {
            roots.add(zertifikat?).map_err(|e| {
                QueryError::transport(
                    io::ErrorKind::InvalidData,
                    format!("Ungueltiges CA-Zertifikat in '{pfad}': {e}"),
                )
            })?;
        }
    }

    let tls_config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| {
                QueryError::transport(io::ErrorKind::Other, format!("TLS-Konfiguration: {e}"))
            })?
            .with_root_certificates(roots)
            .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(tls_config)))
}
