//! # tsquery-observability
//!
//! Structured Logging via tracing-subscriber fuer CLI und Anwendungen,
//! die den ServerQuery-Client einbetten. Der Client selbst loggt nur ueber
//! `tracing`-Makros und installiert keinen Subscriber.

pub mod logging;

pub use logging::{logging_initialisieren, LogFormat, LoggingEinstellungen};
