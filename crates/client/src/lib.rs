//! tsquery-client – Async-Client fuer die TeamSpeak3-ServerQuery
//!
//! ## Architektur
//!
//! ```text
//! ConnectionConfig
//!     |
//!     v
//! transport::verbinden  (TCP, optional TLS)
//!     |
//!     v
//! Connection            (Banner, Befehl -> Antwort, Ereignis-Queue)
//!     |
//!     v
//! Host                  (Login, Serverauswahl per `use`, Caches)
//!     +-- Server
//!           +-- Channel
//!           +-- Client
//! ```

pub mod adapter;
pub mod config;
pub mod node;
pub mod transport;

pub use adapter::Connection;
pub use config::{ConnectionConfig, TraversalPolicy, DEFAULT_QUERY_PORT};
pub use node::{
    Channel, Client, Host, KickReason, Node, Permission, PermissionKey, Server, SpacerAlign,
    SpacerType, Target, TreeEntry, TreeNode, SERVERQUERY_UID,
};

pub use tsquery_protocol::{Command, NotifyEvent, Properties, QueryError, QueryResult, Reply, Value};
