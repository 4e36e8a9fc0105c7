//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Datei (`[logging]`) und Umgebungsvariable, die
//! Umgebung gewinnt:
//! - `TSQ_LOG_LEVEL`: Filter-Direktive (z.B. `debug` oder
//!   `info,tsquery_client=trace`), Standard: info
//! - `TSQ_LOG_FORMAT`: Format (text/json), Standard: text
//!
//! Einzelne Protokollzeilen loggt der Adapter auf `trace`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

pub const ENV_LEVEL: &str = "TSQ_LOG_LEVEL";
pub const ENV_FORMAT: &str = "TSQ_LOG_FORMAT";

/// Ausgabeformat der Log-Zeilen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            anderes => anyhow::bail!("Unbekanntes Log-Format '{anderes}' (erlaubt: text, json)"),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Json => "json",
        })
    }
}

/// `[logging]`-Abschnitt der Konfiguration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingEinstellungen {
    /// Uebernimmt `TSQ_LOG_LEVEL` / `TSQ_LOG_FORMAT`, falls gesetzt
    pub fn aus_umgebung(self) -> anyhow::Result<Self> {
        self.mit_variablen(|name| std::env::var(name).ok())
    }

    fn mit_variablen(mut self, lesen: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        if let Some(level) = lesen(ENV_LEVEL).filter(|l| !l.is_empty()) {
            self.level = level;
        }
        if let Some(format) = lesen(ENV_FORMAT).filter(|f| !f.is_empty()) {
            self.format = format.parse()?;
        }
        Ok(self)
    }

    fn filter(&self) -> anyhow::Result<EnvFilter> {
        EnvFilter::try_new(&self.level)
            .map_err(|e| anyhow::anyhow!("Ungueltiger Log-Level '{}': {e}", self.level))
    }
}

/// Initialisiert das Logging-System.
///
/// Schlaegt fehl, wenn der Level keine gueltige Filter-Direktive ist oder
/// bereits ein globaler Subscriber installiert wurde.
pub fn logging_initialisieren(einstellungen: &LoggingEinstellungen) -> anyhow::Result<()> {
    let filter = einstellungen.filter()?;

    let ergebnis = match einstellungen.format {
        LogFormat::Json => tfmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .try_init(),
        LogFormat::Text => tfmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .try_init(),
    };
    ergebnis.map_err(|e| anyhow::anyhow!("Logging bereits initialisiert: {e}"))
}
