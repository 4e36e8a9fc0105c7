//! Knotenmodell: Host -> Server -> Channel / Client
//!
//! Handles sind billig klonbar und zeigen auf gemeinsam genutzte
//! Eigenschaften im Cache des Hosts. Zwei Handles fuer dieselbe ID teilen
//! sich dieselben Eigenschaften, bis der Cache verworfen wird.
//! Rueckverweise (Channel -> Server) sind Nachschlagen per ID, kein Besitz.

pub mod channel;
pub mod client;
pub mod host;
pub mod permission;
pub mod server;
pub mod spacer;
pub mod tree;

use std::sync::Arc;

use parking_lot::RwLock;
use tsquery_protocol::{Properties, QueryError, QueryResult, Value};

pub use channel::Channel;
pub use client::{Client, KickReason, SERVERQUERY_UID};
pub use host::{Host, Target};
pub use permission::{Permission, PermissionKey};
pub use server::Server;
pub use spacer::{SpacerAlign, SpacerType};
pub use tree::{TreeEntry, TreeNode};

/// Gemeinsam genutzte Eigenschaften eines Knotens
pub type Eigenschaften = Arc<RwLock<Properties>>;

pub(crate) fn eigenschaften(props: Properties) -> Eigenschaften {
    Arc::new(RwLock::new(props))
}

/// Gemeinsame Sicht auf alle Knoten
pub trait Node {
    /// Protokoll-ID (0 fuer den Host)
    fn id(&self) -> u32;

    fn eigenschaften(&self) -> &Eigenschaften;

    fn property(&self, name: &str) -> Option<Value> {
        self.eigenschaften().read().get(name).cloned()
    }

    /// Wie [`property`](Self::property), aber `KeyNotFound` statt `None`
    fn get_property(&self, name: &str) -> QueryResult<Value> {
        self.property(name)
            .ok_or_else(|| QueryError::KeyNotFound(name.to_string()))
    }

    /// Eigenschaft als Text; `None` wenn sie fehlt oder null ist
    fn property_str(&self, name: &str) -> Option<String> {
        match self.property(name)? {
            Value::Null => None,
            v => Some(v.to_string()),
        }
    }

    fn property_int(&self, name: &str) -> Option<i64> {
        self.property(name).and_then(|v| v.as_int())
    }

    /// Momentaufnahme aller Eigenschaften
    fn properties(&self) -> Properties {
        self.eigenschaften().read().clone()
    }

    /// true wenn beide Handles auf denselben Cache-Eintrag zeigen
    fn same_node(&self, other: &Self) -> bool
    where
        Self: Sized,
    {
        Arc::ptr_eq(self.eigenschaften(), other.eigenschaften())
    }
}

/// Liest eine ID-Eigenschaft als `u32`
pub(crate) fn id_feld(props: &Properties, feld: &str) -> QueryResult<u32> {
    props
        .get(feld)
        .and_then(Value::as_int)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| QueryError::KeyNotFound(feld.to_string()))
}

/// Uebernimmt neue Werte in bestehende Eigenschaften
pub(crate) fn zusammenfuehren(ziel: &Eigenschaften, neu: Properties) {
    ziel.write().extend(neu);
}
