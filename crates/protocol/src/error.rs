//! Fehlertypen fuer tsquery
//!
//! Zentraler Fehler-Enum fuer Codec, Reply-Parser, Adapter und Knotenmodell.
//! Server-Fehler behalten ID und Originaltext, da Aufrufer auf beides matchen.

use std::io;

use thiserror::Error;

use crate::value::Properties;

/// Globaler Result-Alias fuer tsquery
pub type QueryResult<T> = std::result::Result<T, QueryError>;

/// Alle moeglichen Fehler beim Sprechen des ServerQuery-Protokolls
#[derive(Debug, Error)]
pub enum QueryError {
    // --- Verbindung ---
    /// Verbindungsaufbau, Lesen oder Schreiben fehlgeschlagen (inkl. Timeout)
    #[error("Transportfehler: {0}")]
    Transport(#[from] io::Error),

    // --- Protokoll ---
    /// Unlesbare Daten vom Server
    #[error("Protokollfehler: {0}")]
    Protokoll(String),

    /// Der Server hat den Befehl mit `error id != 0` abgelehnt
    #[error("ServerQuery-Fehler {code:#x}: {message}")]
    ServerQuery {
        code: u32,
        message: String,
        extra: Properties,
    },

    /// Ungueltige Backslash-Sequenz in einem Feldwert
    #[error("Ungueltige Escape-Sequenz '{sequenz}' an Position {position}")]
    MalformedEscape { sequenz: String, position: usize },

    // --- Daten ---
    /// Ein Eintrag besitzt die angeforderte Eigenschaft nicht
    #[error("Schluessel nicht gefunden: {0}")]
    KeyNotFound(String),

    /// Kein Knoten passt zur Auswahl (ID, Name, UID)
    #[error("Knoten nicht gefunden: {0}")]
    NodeNotFound(String),
}

impl QueryError {
    /// Erstellt einen Server-Fehler ohne Zusatzfelder
    pub fn server_query(code: u32, message: impl Into<String>) -> Self {
        Self::ServerQuery {
            code,
            message: message.into(),
            extra: Properties::new(),
        }
    }

    /// Erstellt einen Protokollfehler aus einer beliebigen Nachricht
    pub fn protokoll(msg: impl Into<String>) -> Self {
        Self::Protokoll(msg.into())
    }

    /// Transportfehler einer bestimmten Art (Timeout, EOF, ...)
    pub fn transport(art: io::ErrorKind, msg: impl Into<String>) -> Self {
        Self::Transport(io::Error::new(art, msg.into()))
    }

    /// Numerische Fehler-ID des Servers, falls es ein Server-Fehler ist
    pub fn code(&self) -> Option<u32> {
        match self {
            Self::ServerQuery { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Originale Fehlermeldung des Servers bzw. die Anzeige des Fehlers
    pub fn message(&self) -> String {
        match self {
            Self::ServerQuery { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// true wenn die Verbindung als unbrauchbar gelten muss
    pub fn ist_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Bekannte Fehler-IDs des ServerQuery-Servers
pub mod codes {
    pub const OK: u32 = 0x000;
    pub const COMMAND_NOT_FOUND: u32 = 0x100;
    pub const CLIENT_INVALID_ID: u32 = 0x200;
    pub const CHANNEL_INVALID_ID: u32 = 0x300;
    pub const CHANNEL_INVALID_FLAGS: u32 = 0x307;
    pub const SERVER_INVALID_ID: u32 = 0x400;
    pub const DATABASE: u32 = 0x500;
    pub const DATABASE_EMPTY_RESULT: u32 = 0x501;
    pub const PARAMETER_INVALID: u32 = 0x602;
    pub const PARAMETER_NOT_FOUND: u32 = 0x603;
    pub const PARAMETER_MISSING: u32 = 0x606;
    pub const FILE_INVALID_NAME: u32 = 0x800;
    pub const FILE_ALREADY_EXISTS: u32 = 0x802;
    pub const FILE_NOT_FOUND: u32 = 0x803;
    pub const FILE_IO_ERROR: u32 = 0x804;
    pub const FILE_INVALID_PATH: u32 = 0x806;
}
