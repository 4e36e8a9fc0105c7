//! CLI-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Fehlt die Datei, wird mit
//! Standardwerten gearbeitet (lokale Instanz, kein Login).
//!
//! ```toml
//! [verbindung]
//! host = "ts.example.org"
//! username = "serveradmin"
//! password = "..."
//! server_port = 9987
//!
//! [logging]
//! level = "debug"
//! ```

use serde::{Deserialize, Serialize};
use tsquery_client::ConnectionConfig;
use tsquery_observability::LoggingEinstellungen;

/// Vollstaendige CLI-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Verbindung und Zielauswahl
    pub verbindung: ConnectionConfig,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

impl CliConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei
    ///
    /// Falls die Datei nicht existiert, werden Standardwerte verwendet.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => Self::aus_toml(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}")),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    pub fn aus_toml(inhalt: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(inhalt)
    }
}
