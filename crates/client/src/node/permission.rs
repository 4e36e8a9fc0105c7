//! Berechtigungen an Channels, Clients und Channel-Client-Paaren

use std::fmt;

use tsquery_protocol::{Command, Properties, QueryError, QueryResult, Reply, Value};

/// Berechtigung per numerischer ID oder per Name (`permsid`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PermissionKey {
    Id(u32),
    Name(String),
}

impl PermissionKey {
    /// Haengt `permid=` bzw. `permsid=` an einen Befehl
    pub(crate) fn anhaengen(&self, cmd: Command) -> Command {
        match self {
            Self::Id(id) => cmd.param("permid", *id),
            Self::Name(name) => cmd.param("permsid", name.as_str()),
        }
    }
}

impl From<u32> for PermissionKey {
    fn from(id: u32) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for PermissionKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for PermissionKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Ein Eintrag einer `*permlist`-Antwort
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    pub key: PermissionKey,
    pub value: i64,
    pub negated: bool,
    pub skip: bool,
}

impl Permission {
    fn aus_eigenschaften(props: &Properties) -> QueryResult<Self> {
        let key = match (props.get("permid"), props.get("permsid")) {
            (Some(Value::Int(id)), _) => PermissionKey::Id(u32::try_from(*id).map_err(|_| {
                QueryError::protokoll(format!("Ungueltige Berechtigungs-ID {id}"))
            })?),
            (_, Some(Value::Str(name))) => PermissionKey::Name(name.clone()),
            _ => return Err(QueryError::KeyNotFound("permid".into())),
        };
        let flag = |name: &str| props.get(name).is_some_and(Value::as_bool);
        Ok(Self {
            key,
            value: props.get("permvalue").and_then(Value::as_int).unwrap_or(0),
            negated: flag("permnegated"),
            skip: flag("permskip"),
        })
    }
}

/// Liest alle Eintraege einer `*permlist`-Antwort in Serverreihenfolge
pub(crate) fn aus_antwort(reply: &Reply) -> QueryResult<Vec<Permission>> {
    reply
        .to_array()
        .iter()
        .map(Permission::aus_eigenschaften)
        .collect()
}
