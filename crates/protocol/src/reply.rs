//! Antwort auf einen ServerQuery-Befehl
//!
//! Eine [`Reply`] entsteht aus allen Zeilen einer Antwort inklusive Trailer.
//! Die Tabelle (Zeilen -> Eintraege) ist die einzige Quelle; alle anderen
//! Sichten werden daraus abgeleitet und veraendern nichts.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;

use crate::error::{QueryError, QueryResult};
use crate::value::{Properties, Value};
use crate::wire::{
    is_error_trailer, is_notify_line, parse_error_trailer, parse_notify_line, split_records,
    unescape, ErrorInfo, NotifyEvent, Record,
};

/// Geparste Antwort eines Befehls
#[derive(Debug, Clone)]
pub struct Reply {
    command: String,
    lines: Vec<String>,
    table: Vec<Vec<Record>>,
    events: Vec<NotifyEvent>,
    error: ErrorInfo,
}

impl Reply {
    /// Parst die Rohzeilen einer Antwort
    ///
    /// Die letzte Zeile muss der `error`-Trailer sein. `notify`-Zeilen
    /// davor werden als Ereignisse abgetrennt. Unlesbare Datenzeilen
    /// ergeben einen Protokollfehler.
    pub fn parse<I, S>(zeilen: I, command: impl Into<String>) -> QueryResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut zeilen: Vec<String> = zeilen.into_iter().map(Into::into).collect();

        let trailer = match zeilen.pop() {
            Some(z) if is_error_trailer(&z) => z,
            Some(z) => {
                return Err(QueryError::protokoll(format!(
                    "Antwort endet nicht mit error-Trailer: {z}"
                )))
            }
            None => return Err(QueryError::protokoll("Leere Antwort ohne error-Trailer")),
        };
        let error = parse_error_trailer(&trailer)?;

        let mut lines = Vec::with_capacity(zeilen.len());
        let mut table = Vec::with_capacity(zeilen.len());
        let mut events = Vec::new();

        for zeile in zeilen {
            if is_notify_line(&zeile) {
                events.push(parse_notify_line(&zeile).map_err(als_protokollfehler)?);
                continue;
            }
            table.push(split_records(&zeile).map_err(als_protokollfehler)?);
            lines.push(zeile);
        }

        Ok(Self {
            command: command.into(),
            lines,
            table,
            events,
            error,
        })
    }

    // --- Rohsichten ---

    /// Datenzeilen ohne Trailer, unveraendert wie vom Draht
    pub fn to_lines(&self) -> &[String] {
        &self.lines
    }

    /// Datenzeilen entescaped und mit `\n` verbunden
    pub fn to_text(&self) -> QueryResult<String> {
        let zeilen = self
            .lines
            .iter()
            .map(|z| unescape(z))
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(zeilen.join("\n"))
    }

    /// Zeilen -> Eintraege in Reihenfolge des Servers
    pub fn to_table(&self) -> &[Vec<Record>] {
        &self.table
    }

    // --- Abgeleitete Sichten ---

    /// Eintraege der ersten Datenzeile als typisierte Eigenschaften
    pub fn to_array(&self) -> Vec<Properties> {
        self.table
            .first()
            .map(|records| records.iter().map(Record::to_properties).collect())
            .unwrap_or_default()
    }

    /// Wie [`to_array`](Self::to_array), aber nach dem Wert von `schluessel` indiziert
    ///
    /// Numerische Schluesselwerte werden zu `Int`. Doppelte Schluessel:
    /// der letzte Eintrag gewinnt.
    pub fn to_assoc_array(&self, schluessel: &str) -> QueryResult<BTreeMap<Value, Properties>> {
        let mut out = BTreeMap::new();
        for props in self.to_array() {
            let key = match props.get(schluessel) {
                Some(Value::Str(text)) => Value::numerisch_oder_text(text),
                Some(andere) => andere.clone(),
                None => return Err(QueryError::KeyNotFound(schluessel.to_string())),
            };
            out.insert(key, props);
        }
        Ok(out)
    }

    /// Eigenschaften des einzigen Eintrags (leer wenn keiner vorhanden)
    pub fn to_list(&self) -> QueryResult<Properties> {
        let anzahl: usize = self.table.iter().map(Vec::len).sum();
        if anzahl > 1 {
            return Err(QueryError::protokoll(format!(
                "Einzelner Eintrag erwartet, {anzahl} erhalten"
            )));
        }
        Ok(self
            .table
            .iter()
            .flatten()
            .next()
            .map(Record::to_properties)
            .unwrap_or_default())
    }

    /// Eintraege der ersten Datenzeile als Strukturen des Aufrufers
    ///
    /// Geht ueber `serde_json::Value`, d.h. `Null` wird zu `None`,
    /// `Int` zu Zahl, `Str` zu String.
    pub fn to_object_array<T: DeserializeOwned>(&self) -> QueryResult<Vec<T>> {
        self.to_array()
            .into_iter()
            .map(|props| {
                let json = serde_json::to_value(props).map_err(|e| {
                    QueryError::protokoll(format!("Eintrag nicht serialisierbar: {e}"))
                })?;
                serde_json::from_value(json).map_err(|e| {
                    QueryError::protokoll(format!("Eintrag passt nicht zur Struktur: {e}"))
                })
            })
            .collect()
    }

    // --- Metadaten ---

    /// Befehl, der diese Antwort ausgeloest hat (leer wenn keiner)
    pub fn command_string(&self) -> &str {
        &self.command
    }

    /// Ereigniszeilen, die innerhalb der Antwort ankamen
    pub fn notify_events(&self) -> &[NotifyEvent] {
        &self.events
    }

    pub fn error(&self) -> &ErrorInfo {
        &self.error
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_ok()
    }

    /// Eigenschaft des Trailers, `Null` wenn sie fehlt
    pub fn error_property(&self, name: &str) -> Value {
        self.error.property(name).unwrap_or(Value::Null)
    }

    /// Wandelt einen Fehler-Trailer in [`QueryError::ServerQuery`]
    pub fn check(self) -> QueryResult<Self> {
        match self.error.to_error() {
            Some(fehler) => Err(fehler),
            None => Ok(self),
        }
    }
}

fn als_protokollfehler(e: QueryError) -> QueryError {
    match e {
        QueryError::MalformedEscape { .. } => {
            QueryError::protokoll(format!("Unlesbare Antwortzeile: {e}"))
        }
        andere => andere,
    }
}
