//! Geschlossener Werttyp fuer Protokollfelder
//!
//! Auf dem Draht ist alles Text. An der Reply-Grenze wird jedes Feld in
//! [`Value`] ueberfuehrt: `Null` fuer nackte Schluessel ohne `=`, `Int` fuer
//! Felder aus der Whitelist [`NUMERIC_PROPERTIES`], sonst `Str`.
//! Es wird bewusst nicht am Wert geraten ("1" in einem Namen bleibt Text).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Eigenschaften eines Eintrags, nach Name sortiert
pub type Properties = BTreeMap<String, Value>;

/// Wert eines Protokollfelds
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Schluessel ohne Wert (`key` statt `key=`)
    Null,
    Int(i64),
    Str(String),
}

impl Value {
    /// Ueberfuehrt ein rohes (bereits entescaptes) Feld gemaess Whitelist
    pub fn coerce(name: &str, roh: Option<&str>) -> Self {
        match roh {
            None => Self::Null,
            Some(text) if ist_numerisch(name) => match text.parse::<i64>() {
                Ok(n) => Self::Int(n),
                Err(_) => Self::Str(text.to_string()),
            },
            Some(text) => Self::Str(text.to_string()),
        }
    }

    /// Wandelt Text in `Int`, sofern er vollstaendig numerisch ist
    ///
    /// Nur fuer Gruppierungsschluessel gedacht (siehe `Reply::to_assoc_array`).
    pub fn numerisch_oder_text(text: &str) -> Self {
        match text.parse::<i64>() {
            Ok(n) => Self::Int(n),
            Err(_) => Self::Str(text.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Str(s) => s.parse().ok(),
            Self::Null => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Wahrheitswert nach Protokollkonvention (`1` = an)
    pub fn as_bool(&self) -> bool {
        self.as_int().is_some_and(|n| n != 0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Self::Str(s.clone())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<u16> for Value {
    fn from(n: u16) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

/// Protokollkonvention: `1` / `0`
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Int(i64::from(b))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(o: Option<T>) -> Self {
        o.map_or(Self::Null, Into::into)
    }
}

/// Eigenschaften, deren Werte als Ganzzahl geliefert werden
///
/// Gruppiert nach den Befehlen, die sie liefern. Alles, was hier fehlt,
/// bleibt Text.
pub const NUMERIC_PROPERTIES: &[&str] = &[
    // error-Trailer
    "id",
    "failed_permid",
    // serverlist / serverinfo / serveridgetbyport / servercreate
    "server_id",
    "sid",
    "virtualserver_id",
    "virtualserver_port",
    "virtualserver_clientsonline",
    "virtualserver_queryclientsonline",
    "virtualserver_channelsonline",
    "virtualserver_maxclients",
    "virtualserver_reserved_slots",
    "virtualserver_uptime",
    "virtualserver_autostart",
    "virtualserver_flag_password",
    "virtualserver_default_server_group",
    "virtualserver_default_channel_group",
    "virtualserver_icon_id",
    // whoami
    "client_id",
    "client_channel_id",
    "client_database_id",
    "client_origin_server_id",
    // channellist / channelinfo / channelcreate
    "cid",
    "pid",
    "cpid",
    "channel_order",
    "channel_codec",
    "channel_codec_quality",
    "channel_maxclients",
    "channel_maxfamilyclients",
    "channel_flag_permanent",
    "channel_flag_semi_permanent",
    "channel_flag_default",
    "channel_flag_password",
    "channel_flag_maxclients_unlimited",
    "channel_flag_maxfamilyclients_unlimited",
    "channel_flag_maxfamilyclients_inherited",
    "channel_needed_talk_power",
    "channel_needed_subscribe_power",
    "channel_icon_id",
    "seconds_empty",
    "total_clients",
    "total_clients_family",
    // clientlist / clientinfo
    "clid",
    "cldbid",
    "client_type",
    "client_away",
    "client_talk_power",
    "client_is_talker",
    "client_input_muted",
    "client_output_muted",
    "client_is_channel_commander",
    "client_is_recording",
    "client_flag_talking",
    "client_idle_time",
    "client_channel_group_id",
    "client_icon_id",
    "client_created",
    "client_lastconnected",
    // *permlist
    "permid",
    "permvalue",
    "permnegated",
    "permskip",
    // banclient
    "banid",
    // ftgetfilelist / ftgetfileinfo
    "size",
    "datetime",
    "type",
    // hostinfo / instanceinfo / version
    "instance_uptime",
    "host_timestamp_utc",
    "virtualservers_running_total",
    "virtualservers_total_maxclients",
    "virtualservers_total_clients_online",
    "virtualservers_total_channels_online",
    "serverinstance_database_version",
    "serverinstance_filetransfer_port",
    "serverinstance_max_download_total_bandwidth",
    "serverinstance_max_upload_total_bandwidth",
    "serverinstance_serverquery_flood_commands",
    "serverinstance_serverquery_flood_time",
    "serverinstance_serverquery_ban_time",
    "build",
];

/// true wenn die Eigenschaft laut Whitelist numerisch ist
pub fn ist_numerisch(name: &str) -> bool {
    NUMERIC_PROPERTIES.contains(&name)
}
