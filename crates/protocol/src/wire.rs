//! Wire-Format des ServerQuery-Protokolls
//!
//! Eine Antwortzeile besteht aus Eintraegen, getrennt durch `|`.
//! Ein Eintrag besteht aus Feldern, getrennt durch Leerzeichen:
//!
//! ```text
//! cid=1 pid=0 channel_name=Default\sChannel|cid=2 pid=1 channel_name=Sub
//! error id=0 msg=ok
//! ```
//!
//! Ein Feld ohne `=` ist ein vorhandener Schluessel ohne Wert (null),
//! `key=` dagegen ein leerer Wert. Sonderzeichen in Werten werden mit
//! Backslash-Sequenzen kodiert (siehe [`escape`]).

use std::fmt;

use crate::error::{QueryError, QueryResult};
use crate::value::{Properties, Value};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Erste Zeile der Willkommensnachricht
pub const PROTO_IDENT: &str = "TS3";

/// Praefix asynchroner Ereigniszeilen
pub const NOTIFY_PREFIX: &str = "notify";

/// Schluesselwort des Abschlusstrailers
pub const ERROR_PREFIX: &str = "error";

/// Trenner zwischen Eintraegen einer Zeile
pub const SEPARATOR_LIST: char = '|';

/// Trenner zwischen Feldern eines Eintrags
pub const SEPARATOR_CELL: char = ' ';

/// Trenner zwischen Name und Wert eines Felds
pub const SEPARATOR_PAIR: char = '=';

// ---------------------------------------------------------------------------
// Escaping
// ---------------------------------------------------------------------------

/// Kodiert einen Feldwert fuer den Draht
///
/// Ersetzt `\`, `/`, Leerzeichen, `|` und die Steuerzeichen BEL, BS, TAB,
/// LF, CR und VT durch ihre Zwei-Zeichen-Sequenzen.
pub fn escape(roh: &str) -> String {
    let mut out = String::with_capacity(roh.len() + 8);
    for c in roh.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '/' => out.push_str("\\/"),
            ' ' => out.push_str("\\s"),
            '|' => out.push_str("\\p"),
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x0B' => out.push_str("\\v"),
            andere => out.push(andere),
        }
    }
    out
}

/// Dekodiert einen Feldwert vom Draht
///
/// Unbekannte Sequenzen und ein einzelner Backslash am Ende sind Fehler.
/// `\f` (Formfeed) wird beim Lesen akzeptiert, da der Server es sendet.
pub fn unescape(draht: &str) -> QueryResult<String> {
    let mut out = String::with_capacity(draht.len());
    let mut zeichen = draht.char_indices();

    while let Some((pos, c)) = zeichen.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let dekodiert = match zeichen.next() {
            Some((_, '\\')) => '\\',
            Some((_, '/')) => '/',
            Some((_, 's')) => ' ',
            Some((_, 'p')) => '|',
            Some((_, 'a')) => '\x07',
            Some((_, 'b')) => '\x08',
            Some((_, 'f')) => '\x0C',
            Some((_, 't')) => '\t',
            Some((_, 'n')) => '\n',
            Some((_, 'r')) => '\r',
            Some((_, 'v')) => '\x0B',
            Some((_, andere)) => {
                return Err(QueryError::MalformedEscape {
                    sequenz: format!("\\{andere}"),
                    position: pos,
                })
            }
            None => {
                return Err(QueryError::MalformedEscape {
                    sequenz: "\\".into(),
                    position: pos,
                })
            }
        };
        out.push(dekodiert);
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Eintraege
// ---------------------------------------------------------------------------

/// Ein Feld eines Eintrags (Wert bereits entescaped)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    /// `None` fuer nackte Schluessel ohne `=`
    pub value: Option<String>,
}

/// Geordnete Abbildung Feldname -> Rohwert
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<Field>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Haengt ein Feld an (Reihenfolge bleibt erhalten)
    pub fn push(&mut self, name: impl Into<String>, value: Option<String>) {
        self.fields.push(Field {
            name: name.into(),
            value,
        });
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// Rohwert eines Felds: `None` = fehlt, `Some(None)` = nackter Schluessel
    pub fn get(&self, name: &str) -> Option<Option<&str>> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_deref())
    }

    /// Typisierter Wert eines Felds (siehe [`Value::coerce`])
    pub fn value(&self, name: &str) -> Option<Value> {
        self.get(name).map(|roh| Value::coerce(name, roh))
    }

    /// Alle Felder als typisierte Eigenschaften
    pub fn to_properties(&self) -> Properties {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), Value::coerce(&f.name, f.value.as_deref())))
            .collect()
    }
}

/// Wire-Darstellung eines Eintrags (Werte wieder escaped)
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, feld) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match &feld.value {
                Some(v) => write!(f, "{}={}", feld.name, escape(v))?,
                None => f.write_str(&feld.name)?,
            }
        }
        Ok(())
    }
}

/// Zerlegt eine Antwortzeile in Eintraege
///
/// Trennt an `|`, dann an Leerzeichen, dann am ersten `=`. Da `|` und
/// Leerzeichen in Werten immer escaped sind, ist jedes rohe Vorkommen ein
/// Trenner. Eine leere Zeile ergibt keine Eintraege.
pub fn split_records(zeile: &str) -> QueryResult<Vec<Record>> {
    if zeile.trim().is_empty() {
        return Ok(Vec::new());
    }
    zeile.split(SEPARATOR_LIST).map(parse_record).collect()
}

fn parse_record(teil: &str) -> QueryResult<Record> {
    let mut record = Record::new();
    for token in teil.split(SEPARATOR_CELL).filter(|t| !t.is_empty()) {
        match token.split_once(SEPARATOR_PAIR) {
            Some((name, wert)) => record.push(name, Some(unescape(wert)?)),
            None => record.push(token, None),
        }
    }
    Ok(record)
}

// ---------------------------------------------------------------------------
// Trailer und Ereignisse
// ---------------------------------------------------------------------------

/// true wenn die Zeile ein `error id=... msg=...`-Trailer ist
pub fn is_error_trailer(zeile: &str) -> bool {
    zeile == ERROR_PREFIX
        || zeile
            .strip_prefix(ERROR_PREFIX)
            .is_some_and(|rest| rest.starts_with(SEPARATOR_CELL))
}

/// true wenn die Zeile ein asynchrones Ereignis (`notify...`) ist
pub fn is_notify_line(zeile: &str) -> bool {
    zeile.starts_with(NOTIFY_PREFIX)
}

/// Inhalt des Abschlusstrailers einer Antwort
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    /// 0 = Erfolg
    pub id: u32,
    /// Meldung im Klartext (entescaped)
    pub msg: String,
    /// Weitere Felder, z.B. `failed_permid` oder `extra_msg`
    pub extra: Record,
}

impl ErrorInfo {
    /// Trailer eines erfolgreichen Befehls
    pub fn ok() -> Self {
        Self {
            id: 0,
            msg: "ok".into(),
            extra: Record::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.id == 0
    }

    /// Eigenschaft des Trailers; `id` ist immer `Int`, `msg` immer `Str`
    pub fn property(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::Int(i64::from(self.id))),
            "msg" => Some(Value::Str(self.msg.clone())),
            andere => self.extra.value(andere),
        }
    }

    /// Server-Fehler fuer einen nicht erfolgreichen Trailer
    pub fn to_error(&self) -> Option<QueryError> {
        if self.is_ok() {
            return None;
        }
        Some(QueryError::ServerQuery {
            code: self.id,
            message: self.msg.clone(),
            extra: self.extra.to_properties(),
        })
    }
}

/// Parst eine `error id=<n> msg=<text> [...]`-Zeile
pub fn parse_error_trailer(zeile: &str) -> QueryResult<ErrorInfo> {
    if !is_error_trailer(zeile) {
        return Err(QueryError::protokoll(format!(
            "Kein error-Trailer: {zeile}"
        )));
    }
    let rest = &zeile[ERROR_PREFIX.len()..];
    let record = split_records(rest)?.into_iter().next().unwrap_or_default();

    let id = match record.get("id") {
        Some(Some(roh)) => roh.parse::<u32>().map_err(|_| {
            QueryError::protokoll(format!("Nicht-numerische Fehler-ID im Trailer: {roh}"))
        })?,
        _ => {
            return Err(QueryError::protokoll(format!(
                "Fehler-ID fehlt im Trailer: {zeile}"
            )))
        }
    };
    let msg = record.get("msg").flatten().unwrap_or_default().to_string();

    let mut extra = Record::new();
    for feld in record.fields() {
        if feld.name != "id" && feld.name != "msg" {
            extra.push(feld.name.clone(), feld.value.clone());
        }
    }

    Ok(ErrorInfo { id, msg, extra })
}

/// Ein asynchron gepushtes Ereignis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyEvent {
    name: String,
    records: Vec<Record>,
}

impl NotifyEvent {
    /// Ereignisname, z.B. `notifycliententerview`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Erster (in der Praxis einziger) Eintrag des Ereignisses
    pub fn data(&self) -> Record {
        self.records.first().cloned().unwrap_or_default()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn property(&self, name: &str) -> Option<Value> {
        self.records.first().and_then(|r| r.value(name))
    }
}

/// Parst eine `notify...`-Zeile in ein Ereignis
pub fn parse_notify_line(zeile: &str) -> QueryResult<NotifyEvent> {
    if !is_notify_line(zeile) {
        return Err(QueryError::protokoll(format!("Keine Ereigniszeile: {zeile}")));
    }
    let (name, rest) = zeile.split_once(SEPARATOR_CELL).unwrap_or((zeile, ""));
    Ok(NotifyEvent {
        name: name.to_string(),
        records: split_records(rest)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_ersetzt_alle_sonderzeichen() {
        assert_eq!(escape("a b"), "a\\sb");
        assert_eq!(escape("a/b|c"), "a\\/b\\pc");
        assert_eq!(escape("\\"), "\\\\");
        assert_eq!(escape("\x07\x08\t\n\r\x0B"), "\\a\\b\\t\\n\\r\\v");
    }

    #[test]
    fn escape_backslash_wird_nicht_doppelt_escaped() {
        // "\s" als Rohtext muss als "\\s" raus, nicht als Leerzeichen zurueckkommen
        let roh = "\\s";
        assert_eq!(escape(roh), "\\\\s");
        assert_eq!(unescape(&escape(roh)).unwrap(), roh);
    }

    #[test]
    fn unescape_round_trip() {
        for roh in [
            "",
            "TeamSpeak ]I[ Server",
            "pfad/zur/datei.txt",
            "a|b|c",
            "mehr\nzeilen\r\nund\ttabs",
            "glocke\x07 rueck\x08 vt\x0B",
            "\\\\ doppelt",
            "Umlaute: äöü ß",
        ] {
            assert_eq!(unescape(&escape(roh)).unwrap(), roh);
        }
    }

    #[test]
    fn unescape_formfeed_wird_akzeptiert() {
        assert_eq!(unescape("a\\fb").unwrap(), "a\x0Cb");
    }

    #[test]
    fn unescape_unbekannte_sequenz() {
        let err = unescape("abc\\x").unwrap_err();
        match err {
            QueryError::MalformedEscape { sequenz, position } => {
                assert_eq!(sequenz, "\\x");
                assert_eq!(position, 3);
            }
            andere => panic!("Falscher Fehler: {andere:?}"),
        }
    }

    #[test]
    fn unescape_backslash_am_ende() {
        assert!(matches!(
            unescape("abc\\"),
            Err(QueryError::MalformedEscape { .. })
        ));
    }

    #[test]
    fn split_records_null_und_leer() {
        let records = split_records("a=1 b= c").unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.get("a"), Some(Some("1")));
        assert_eq!(r.get("b"), Some(Some("")));
        assert_eq!(r.get("c"), Some(None));
        assert_eq!(r.get("d"), None);
    }

    #[test]
    fn split_records_mehrere_eintraege() {
        let zeile = "clid=1 client_nickname=serveradmin\\sfrom\\s[::1]:59642|clid=2 client_nickname=Unknown";
        let records = split_records(zeile).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].get("client_nickname"),
            Some(Some("serveradmin from [::1]:59642"))
        );
        assert_eq!(records[1].value("clid"), Some(Value::Int(2)));
    }

    #[test]
    fn split_records_wert_mit_gleichheitszeichen() {
        let records = split_records("client_unique_identifier=abc+def=").unwrap();
        assert_eq!(
            records[0].get("client_unique_identifier"),
            Some(Some("abc+def="))
        );
    }

    #[test]
    fn split_records_leere_zeile() {
        assert!(split_records("").unwrap().is_empty());
        assert!(split_records("   ").unwrap().is_empty());
    }

    #[test]
    fn record_display_ist_wire_format() {
        let records = split_records("name=Mein\\sKanal flag").unwrap();
        assert_eq!(records[0].to_string(), "name=Mein\\sKanal flag");
    }

    #[test]
    fn trailer_ok() {
        let info = parse_error_trailer("error id=0 msg=ok").unwrap();
        assert!(info.is_ok());
        assert_eq!(info.msg, "ok");
        assert!(info.extra.is_empty());
        assert!(info.to_error().is_none());
    }

    #[test]
    fn trailer_mit_zusatzfeldern() {
        let info =
            parse_error_trailer("error id=2568 msg=insufficient\\sclient\\spermissions failed_permid=4")
                .unwrap();
        assert_eq!(info.id, 2568);
        assert_eq!(info.msg, "insufficient client permissions");
        assert_eq!(info.property("failed_permid"), Some(Value::Int(4)));
        assert_eq!(info.property("gibts_nicht"), None);

        let fehler = info.to_error().unwrap();
        assert_eq!(fehler.code(), Some(2568));
        assert_eq!(fehler.message(), "insufficient client permissions");
    }

    #[test]
    fn trailer_ohne_id_ist_protokollfehler() {
        assert!(matches!(
            parse_error_trailer("error msg=ok"),
            Err(QueryError::Protokoll(_))
        ));
        assert!(matches!(
            parse_error_trailer("error id=abc msg=ok"),
            Err(QueryError::Protokoll(_))
        ));
        assert!(matches!(
            parse_error_trailer("cid=1"),
            Err(QueryError::Protokoll(_))
        ));
    }

    #[test]
    fn trailer_erkennung() {
        assert!(is_error_trailer("error id=0 msg=ok"));
        assert!(is_error_trailer("error"));
        assert!(!is_error_trailer("errors=5"));
        assert!(!is_error_trailer("virtualserver_id=1"));
    }

    #[test]
    fn notify_zeile_parsen() {
        let evt = parse_notify_line(
            "notifycliententerview cfid=0 ctid=1 reasonid=0 clid=5 client_nickname=Gast\\s1",
        )
        .unwrap();
        assert_eq!(evt.name(), "notifycliententerview");
        assert_eq!(evt.property("clid"), Some(Value::Int(5)));
        assert_eq!(evt.data().get("client_nickname"), Some(Some("Gast 1")));
    }

    #[test]
    fn notify_ohne_daten() {
        let evt = parse_notify_line("notifyserveredited").unwrap();
        assert_eq!(evt.name(), "notifyserveredited");
        assert!(evt.records().is_empty());
        assert!(evt.data().is_empty());
    }
}
