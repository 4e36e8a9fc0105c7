//! tsquery-protocol – Wire-Format des TeamSpeak3-ServerQuery-Protokolls
//!
//! Reine Datenschicht ohne Sockets: Escaping, Zerlegung von Antwortzeilen,
//! Zeilen-Codec fuer `tokio_util::codec`, Befehlsaufbau und Fehlertypen.

pub mod codec;
pub mod command;
pub mod error;
pub mod reply;
pub mod value;
pub mod wire;

pub use codec::QueryCodec;
pub use command::Command;
pub use error::{codes, QueryError, QueryResult};
pub use reply::Reply;
pub use value::{Properties, Value};
pub use wire::{ErrorInfo, NotifyEvent, Record};
