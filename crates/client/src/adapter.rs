//! Befehlsadapter einer ServerQuery-Verbindung
//!
//! Ein Lesetask zieht fortlaufend Zeilen vom Strom und sortiert sie:
//!
//! ```text
//!            +--> notify...  --> Ereignis-Queue (begrenzt, FIFO)
//! Strom -----+
//!            +--> alles andere --> Antwortkanal --> execute() bis "error ..."
//! ```
//!
//! Das Protokoll markiert Antworten nicht, deshalb laeuft immer nur ein
//! Befehl gleichzeitig. Der Mutex um den Schreibteil ist die Warteschlange.
//! Wird eine Anfrage nach dem Senden abgebrochen (Future gedroppt), ist die
//! Zuordnung der restlichen Antwortzeilen verloren und die Verbindung gilt
//! als geschlossen.
//!
//! Eine unlesbare Ereigniszeile landet als [`QueryError`] in der
//! Ereignis-Queue, damit der Empfaenger sie sieht.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{ReadHalf, WriteHalf};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tsquery_protocol::wire::{is_error_trailer, is_notify_line, parse_notify_line, PROTO_IDENT};
use tsquery_protocol::{Command, NotifyEvent, QueryCodec, QueryError, QueryResult, Reply};

use crate::config::ConnectionConfig;
use crate::transport::{self, BoxedStream, QueryStream};

type Leser = FramedRead<ReadHalf<BoxedStream>, QueryCodec>;
type Schreiber = FramedWrite<WriteHalf<BoxedStream>, QueryCodec>;

/// Schreibteil plus Antwortkanal, nur unter dem Anfrage-Mutex zugaenglich
struct Anfragekanal {
    schreiber: Schreiber,
    antworten: mpsc::UnboundedReceiver<QueryResult<String>>,
}

/// Eine offene ServerQuery-Verbindung
pub struct Connection {
    anfragen: Mutex<Anfragekanal>,
    events: Mutex<mpsc::Receiver<QueryResult<NotifyEvent>>>,
    leser: parking_lot::Mutex<Option<JoinHandle<()>>>,
    geschlossen: AtomicBool,
    timeout: Option<Duration>,
    begruessung: String,
    adresse: String,
}

impl Connection {
    /// Baut Transport und Adapter gemaess Konfiguration auf
    pub async fn connect(config: &ConnectionConfig) -> QueryResult<Self> {
        let stream = transport::verbinden(config).await?;
        let verbindung = Self::from_boxed(stream, config).await?;
        tracing::info!(adresse = %verbindung.adresse, "ServerQuery-Verbindung hergestellt");
        Ok(verbindung)
    }

    /// Startet den Adapter auf einem bereits offenen Strom
    ///
    /// Liest und prueft die zweizeilige Begruessung (`TS3` + Text).
    pub async fn from_stream<S: QueryStream>(
        stream: S,
        config: &ConnectionConfig,
    ) -> QueryResult<Self> {
        Self::from_boxed(Box::new(stream), config).await
    }

    async fn from_boxed(stream: BoxedStream, config: &ConnectionConfig) -> QueryResult<Self> {
        let (lesehaelfte, schreibhaelfte) = tokio::io::split(stream);
        let mut leser =
            FramedRead::new(lesehaelfte, QueryCodec::with_max_length(config.max_zeilen_bytes));
        let schreiber =
            FramedWrite::new(schreibhaelfte, QueryCodec::with_max_length(config.max_zeilen_bytes));
        let timeout = config.timeout();

        let kennung = banner_zeile(&mut leser, timeout).await?;
        if !kennung.starts_with(PROTO_IDENT) {
            return Err(QueryError::protokoll(format!(
                "Kein ServerQuery-Dienst (erwartet '{PROTO_IDENT}', erhalten '{kennung}')"
            )));
        }
        let begruessung = banner_zeile(&mut leser, timeout).await?;

        let (antwort_tx, antwort_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(config.event_queue.max(1));
        let handle = tokio::spawn(leser_schleife(leser, antwort_tx, event_tx));

        Ok(Self {
            anfragen: Mutex::new(Anfragekanal {
                schreiber,
                antworten: antwort_rx,
            }),
            events: Mutex::new(event_rx),
            leser: parking_lot::Mutex::new(Some(handle)),
            geschlossen: AtomicBool::new(false),
            timeout,
            begruessung,
            adresse: config.adresse(),
        })
    }

    /// Zweite Zeile der Begruessung
    pub fn greeting(&self) -> &str {
        &self.begruessung
    }

    pub fn is_closed(&self) -> bool {
        self.geschlossen.load(Ordering::Acquire)
    }

    /// Sendet einen Befehl und liefert die Antwort, auch bei `error id != 0`
    pub async fn request(&self, cmd: &Command) -> QueryResult<Reply> {
        if self.is_closed() {
            return Err(nicht_verbunden());
        }
        let zeile = cmd.to_wire_line();

        let mut kanal = self.anfragen.lock().await;
        // Vorgaenger kann waehrend des Wartens abgebrochen worden sein
        if self.is_closed() {
            return Err(nicht_verbunden());
        }

        // Reste frueherer Antworten (z.B. nach Timeout des Vorgaengers)
        while let Ok(rest) = kanal.antworten.try_recv() {
            match rest {
                Ok(z) => tracing::warn!(zeile = %z, "Verwaiste Antwortzeile verworfen"),
                Err(e) => return Err(self.unbrauchbar(e)),
            }
        }

        tracing::debug!(befehl = cmd.verb(), "Sende Befehl");
        let mut ausstehend = Ausstehend {
            verbindung: self,
            befehl: cmd.verb(),
            offen: true,
        };
        if let Err(e) = kanal.schreiber.send(zeile.clone()).await {
            return Err(self.unbrauchbar(e));
        }

        let mut zeilen = Vec::new();
        loop {
            let naechste = match self.timeout {
                Some(dauer) => match tokio::time::timeout(dauer, kanal.antworten.recv()).await {
                    Ok(n) => n,
                    Err(_) => {
                        return Err(self.unbrauchbar(QueryError::transport(
                            io::ErrorKind::TimedOut,
                            format!(
                                "Keine Antwort auf '{}' innerhalb von {} ms",
                                cmd.verb(),
                                dauer.as_millis()
                            ),
                        )))
                    }
                },
                None => kanal.antworten.recv().await,
            };

            let antwortzeile = match naechste {
                Some(Ok(z)) => z,
                Some(Err(e)) => return Err(self.unbrauchbar(e)),
                None => {
                    return Err(self.unbrauchbar(QueryError::transport(
                        io::ErrorKind::UnexpectedEof,
                        format!("Verbindung vor Ende der Antwort auf '{}' getrennt", cmd.verb()),
                    )))
                }
            };
            tracing::trace!(zeile = %antwortzeile, "Antwortzeile");

            let ende = is_error_trailer(&antwortzeile);
            zeilen.push(antwortzeile);
            if ende {
                break;
            }
        }
        ausstehend.offen = false;
        drop(kanal);

        let reply = Reply::parse(zeilen, zeile)?;
        tracing::debug!(
            befehl = cmd.verb(),
            id = reply.error().id,
            msg = %reply.error().msg,
            "Antwort erhalten"
        );
        Ok(reply)
    }

    /// Wie [`request`](Self::request), aber `error id != 0` wird zu
    /// [`QueryError::ServerQuery`]
    pub async fn execute(&self, cmd: &Command) -> QueryResult<Reply> {
        self.request(cmd).await?.check()
    }

    /// Wartet auf das naechste Ereignis; `None` wenn die Verbindung zu ist
    ///
    /// `Some(Err(_))` steht fuer eine Ereigniszeile, die nicht zerlegt
    /// werden konnte.
    pub async fn next_event(&self) -> Option<QueryResult<NotifyEvent>> {
        self.events.lock().await.recv().await
    }

    /// Naechstes bereits empfangenes Ereignis, ohne zu warten
    pub fn try_next_event(&self) -> Option<QueryResult<NotifyEvent>> {
        self.events.try_lock().ok()?.try_recv().ok()
    }

    /// Beendet Lesetask und Schreibrichtung
    ///
    /// Ein laufendes `request` schlaegt danach mit einem Transportfehler fehl.
    pub async fn close(&self) -> QueryResult<()> {
        if self.geschlossen.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(handle) = self.leser.lock().take() {
            handle.abort();
        }
        let mut kanal = self.anfragen.lock().await;
        let ergebnis = kanal.schreiber.close().await;
        tracing::info!(adresse = %self.adresse, "ServerQuery-Verbindung geschlossen");
        ergebnis
    }

    /// Markiert die Verbindung als unbrauchbar und reicht den Fehler weiter
    fn unbrauchbar(&self, fehler: QueryError) -> QueryError {
        if !self.geschlossen.swap(true, Ordering::AcqRel) {
            tracing::warn!(adresse = %self.adresse, fehler = %fehler, "Verbindung unbrauchbar");
        }
        if let Some(handle) = self.leser.lock().take() {
            handle.abort();
        }
        fehler
    }
}

/// Offene Anfrage zwischen Senden und Trailer
///
/// Wird sie vorher gedroppt, gehoeren die noch kommenden Zeilen niemandem.
struct Ausstehend<'a> {
    verbindung: &'a Connection,
    befehl: &'a str,
    offen: bool,
}

impl Drop for Ausstehend<'_> {
    fn drop(&mut self) {
        if self.offen {
            let grund = QueryError::transport(
                io::ErrorKind::Interrupted,
                format!("Anfrage '{}' vor Ende der Antwort abgebrochen", self.befehl),
            );
            drop(self.verbindung.unbrauchbar(grund));
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(handle) = self.leser.get_mut().take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("adresse", &self.adresse)
            .field("geschlossen", &self.is_closed())
            .finish()
    }
}

fn nicht_verbunden() -> QueryError {
    QueryError::transport(io::ErrorKind::NotConnected, "Verbindung ist geschlossen")
}

async fn banner_zeile(leser: &mut Leser, timeout: Option<Duration>) -> QueryResult<String> {
    let naechste = match timeout {
        Some(dauer) => tokio::time::timeout(dauer, leser.next()).await.map_err(|_| {
            QueryError::transport(io::ErrorKind::TimedOut, "Keine Begruessung vom Server")
        })?,
        None => leser.next().await,
    };
    match naechste {
        Some(zeile) => zeile,
        None => Err(QueryError::protokoll(
            "Verbindung vor Ende der Begruessung getrennt",
        )),
    }
}

/// Sortiert eingehende Zeilen in Ereignisse und Antwortzeilen
async fn leser_schleife(
    mut leser: Leser,
    antworten: mpsc::UnboundedSender<QueryResult<String>>,
    events: mpsc::Sender<QueryResult<NotifyEvent>>,
) {
    while let Some(ergebnis) = leser.next().await {
        match ergebnis {
            Ok(zeile) if is_notify_line(&zeile) => {
                let event = parse_notify_line(&zeile);
                if let Err(e) = &event {
                    tracing::warn!(fehler = %e, zeile = %zeile, "Unlesbare Ereigniszeile");
                }
                match events.try_send(event) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!("Ereignis-Queue voll, Ereignis verworfen")
                    }
                    Err(TrySendError::Closed(_)) => {}
                }
            }
            Ok(zeile) => {
                if antworten.send(Ok(zeile)).is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = antworten.send(Err(e));
                break;
            }
        }
    }
    tracing::debug!("Lesetask beendet");
}
