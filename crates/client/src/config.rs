//! Verbindungs-Konfiguration
//!
//! Wird typischerweise als Abschnitt einer TOML-Datei geladen. Alle Felder
//! haben Standardwerte, eine leere Tabelle ergibt eine Verbindung zu
//! `127.0.0.1:10011` ohne Login.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Standard-Port der ServerQuery-Schnittstelle
pub const DEFAULT_QUERY_PORT: u16 = 10011;

/// Alles, was zum Aufbau einer Verbindung und zur Auswahl eines Ziels noetig ist
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Hostname oder IP-Adresse der Instanz
    pub host: String,
    /// Port der ServerQuery-Schnittstelle
    pub query_port: u16,
    /// Lese- und Verbindungs-Timeout in ms (0 = kein Timeout)
    pub timeout_ms: u64,
    /// `false`: `wait_for_event` wartet nicht, sondern fragt nur ab
    pub blocking: bool,
    /// TLS ueber die Query-Verbindung
    pub tls: bool,
    /// Zusaetzliche CA-Zertifikate (PEM) fuer TLS
    pub tls_ca_datei: Option<String>,

    // --- Login ---
    pub username: Option<String>,
    pub password: Option<String>,

    // --- Auswahl ---
    pub server_id: Option<u32>,
    pub server_port: Option<u16>,
    pub server_uid: Option<String>,
    pub channel_id: Option<u32>,
    pub channel_name: Option<String>,
    pub client_id: Option<u32>,
    pub client_name: Option<String>,
    /// Nickname der Query-Verbindung, wird nach jedem `use` gesetzt
    pub nickname: Option<String>,

    // --- Traversierung ---
    pub use_offline_as_virtual: bool,
    pub clients_before_channels: bool,
    pub no_query_clients: bool,

    // --- Puffer ---
    /// Kapazitaet der Ereignis-Queue
    pub event_queue: usize,
    /// Maximale Laenge einer Zeile in Bytes
    pub max_zeilen_bytes: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            query_port: DEFAULT_QUERY_PORT,
            timeout_ms: 10_000,
            blocking: true,
            tls: false,
            tls_ca_datei: None,
            username: None,
            password: None,
            server_id: None,
            server_port: None,
            server_uid: None,
            channel_id: None,
            channel_name: None,
            client_id: None,
            client_name: None,
            nickname: None,
            use_offline_as_virtual: false,
            clients_before_channels: false,
            no_query_clients: false,
            event_queue: 256,
            max_zeilen_bytes: tsquery_protocol::codec::DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl ConnectionConfig {
    /// Konfiguration fuer Host und Port, Rest Standard
    pub fn neu(host: impl Into<String>, query_port: u16) -> Self {
        Self {
            host: host.into(),
            query_port,
            ..Self::default()
        }
    }

    /// `host:port` fuer Logs und Fehlermeldungen
    pub fn adresse(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.query_port)
        } else {
            format!("{}:{}", self.host, self.query_port)
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    pub fn politik(&self) -> TraversalPolicy {
        TraversalPolicy {
            use_offline_as_virtual: self.use_offline_as_virtual,
            clients_before_channels: self.clients_before_channels,
            no_query_clients: self.no_query_clients,
        }
    }
}

// Passwort taucht nie in Logs auf
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("query_port", &self.query_port)
            .field("timeout_ms", &self.timeout_ms)
            .field("blocking", &self.blocking)
            .field("tls", &self.tls)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("server_id", &self.server_id)
            .field("server_port", &self.server_port)
            .field("server_uid", &self.server_uid)
            .field("nickname", &self.nickname)
            .finish_non_exhaustive()
    }
}

/// Reine Darstellungs- und Traversierungsregeln des Knotenmodells
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalPolicy {
    /// `use ... -virtual`: auch gestoppte Server auswaehlen
    pub use_offline_as_virtual: bool,
    /// Clientliste vor der Channelliste laden und im Baum zuerst zeigen
    pub clients_before_channels: bool,
    /// Query-Clients (`client_type=1`) ausblenden
    pub no_query_clients: bool,
}
