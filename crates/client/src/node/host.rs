//! Wurzel des Knotenmodells
//!
//! Der Host besitzt die Verbindung und alle Caches. Eine Query-Session kann
//! immer nur einen virtuellen Server adressieren; die aktuelle Auswahl wird
//! hier gefuehrt und vor jedem serverbezogenen Befehl hergestellt.

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tsquery_protocol::{Command, NotifyEvent, Properties, QueryError, QueryResult, Reply, Value};

use super::channel::Channel;
use super::client::Client;
use super::server::Server;
use super::{eigenschaften, id_feld, zusammenfuehren, Eigenschaften, Node};
use crate::adapter::Connection;
use crate::config::{ConnectionConfig, TraversalPolicy};

/// Zwischengespeicherte Kinderliste eines Servers (Channels oder Clients)
struct ListenCache {
    server_id: u32,
    aktuell: bool,
    eintraege: Vec<(u32, Eigenschaften)>,
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum Liste {
    Channels,
    Clients,
}

#[derive(Default)]
struct HostCache {
    server: BTreeMap<u32, Eigenschaften>,
    server_liste_aktuell: bool,
    channels: Option<ListenCache>,
    clients: Option<ListenCache>,
    whoami: Option<Properties>,
    nickname: Option<String>,
}

impl HostCache {
    fn liste(&mut self, art: Liste) -> &mut Option<ListenCache> {
        match art {
            Liste::Channels => &mut self.channels,
            Liste::Clients => &mut self.clients,
        }
    }
}

struct HostInner {
    verbindung: Connection,
    politik: TraversalPolicy,
    blockierend: bool,
    /// Aktuell per `use` ausgewaehlter Server; gehalten ueber `use` + Befehl
    auswahl: Mutex<Option<u32>>,
    cache: parking_lot::Mutex<HostCache>,
    props: Eigenschaften,
}

/// Die ServerQuery-Instanz hinter einer Verbindung
#[derive(Clone)]
pub struct Host {
    inner: Arc<HostInner>,
}

/// Ergebnis von [`Host::connect_target`]
#[derive(Debug, Clone)]
pub enum Target {
    Host(Host),
    Server(Server),
    Channel(Channel),
    Client(Client),
}

impl Host {
    /// Verbindet, meldet sich ggf. an und liefert den Host
    pub async fn connect(config: &ConnectionConfig) -> QueryResult<Self> {
        let verbindung = Connection::connect(config).await?;
        Self::from_connection(verbindung, config).await
    }

    /// Baut den Host auf einer bestehenden Verbindung auf
    pub async fn from_connection(
        verbindung: Connection,
        config: &ConnectionConfig,
    ) -> QueryResult<Self> {
        let host = Self {
            inner: Arc::new(HostInner {
                verbindung,
                politik: config.politik(),
                blockierend: config.blocking,
                auswahl: Mutex::new(None),
                cache: parking_lot::Mutex::new(HostCache {
                    nickname: config.nickname.clone(),
                    ..Default::default()
                }),
                props: eigenschaften(Properties::new()),
            }),
        };
        if let (Some(user), Some(passwort)) = (&config.username, &config.password) {
            host.login(user, passwort).await?;
        }
        Ok(host)
    }

    /// Verbindet und loest die konfigurierte Auswahl auf
    ///
    /// Server per UID, Port oder ID; darin Channel per ID oder Name,
    /// sonst Client per ID oder Name. Ohne Serverauswahl bleibt es der Host.
    pub async fn connect_target(config: &ConnectionConfig) -> QueryResult<Target> {
        let host = Self::connect(config).await?;
        host.resolve_target(config).await
    }

    /// Loest die Auswahl aus der Konfiguration auf diesem Host auf
    pub async fn resolve_target(&self, config: &ConnectionConfig) -> QueryResult<Target> {
        let server = if let Some(uid) = &config.server_uid {
            self.server_get_by_uid(uid).await?
        } else if let Some(port) = config.server_port {
            self.server_get_by_port(port).await?
        } else if let Some(sid) = config.server_id {
            self.server_get_by_id(sid).await?
        } else {
            return Ok(Target::Host(self.clone()));
        };
        self.server_select(server.id()).await?;

        if let Some(cid) = config.channel_id {
            return Ok(Target::Channel(server.channel_get_by_id(cid).await?));
        }
        if let Some(name) = &config.channel_name {
            return Ok(Target::Channel(server.channel_get_by_name(name).await?));
        }
        if let Some(clid) = config.client_id {
            return Ok(Target::Client(server.client_get_by_id(clid).await?));
        }
        if let Some(name) = &config.client_name {
            return Ok(Target::Client(server.client_get_by_name(name).await?));
        }
        Ok(Target::Server(server))
    }

    pub fn connection(&self) -> &Connection {
        &self.inner.verbindung
    }

    pub fn policy(&self) -> TraversalPolicy {
        self.inner.politik
    }

    // -----------------------------------------------------------------------
    // Rohbefehle
    // -----------------------------------------------------------------------

    /// Rohbefehl ohne Auswahl und ohne Fehlerumwandlung
    ///
    /// Ein manuelles `use` verwirft die gefuehrte Auswahl.
    pub async fn request(&self, cmd: &Command) -> QueryResult<Reply> {
        if cmd.verb() == "use" {
            let mut auswahl = self.inner.auswahl.lock().await;
            let reply = self.inner.verbindung.request(cmd).await?;
            *auswahl = None;
            self.kinder_verwerfen();
            return Ok(reply);
        }
        self.inner.verbindung.request(cmd).await
    }

    /// Rohbefehl; `error id != 0` wird zum Fehler
    pub async fn execute(&self, cmd: &Command) -> QueryResult<Reply> {
        self.request(cmd).await?.check()
    }

    /// Fuehrt einen Befehl im Kontext eines virtuellen Servers aus
    pub(crate) async fn execute_on(&self, sid: u32, cmd: &Command) -> QueryResult<Reply> {
        self.sitzung(sid).await?.execute(cmd).await
    }

    /// Waehlt `sid` aus und haelt die Auswahl, bis die Sitzung gedroppt wird
    pub(crate) async fn sitzung(&self, sid: u32) -> QueryResult<ServerSitzung<'_>> {
        let mut auswahl = self.inner.auswahl.lock().await;
        if *auswahl != Some(sid) {
            self.auswaehlen(&mut auswahl, sid).await?;
        }
        Ok(ServerSitzung {
            host: self,
            _auswahl: auswahl,
        })
    }

    async fn auswaehlen(&self, auswahl: &mut Option<u32>, sid: u32) -> QueryResult<()> {
        let mut cmd = Command::new("use").param("sid", sid);
        if self.inner.politik.use_offline_as_virtual {
            cmd = cmd.option("virtual");
        }
        self.inner.verbindung.execute(&cmd).await?;

        let vorher = auswahl.replace(sid);
        let nickname = {
            let mut cache = self.inner.cache.lock();
            if vorher != Some(sid) {
                cache.channels = None;
                cache.clients = None;
            }
            cache.whoami = None;
            cache.nickname.clone()
        };
        tracing::debug!(server_id = sid, "Virtueller Server ausgewaehlt");

        if let Some(nick) = nickname {
            let cmd = Command::new("clientupdate").param("client_nickname", nick);
            self.inner.verbindung.execute(&cmd).await?;
        }
        Ok(())
    }

    fn kinder_verwerfen(&self) {
        let mut cache = self.inner.cache.lock();
        cache.channels = None;
        cache.clients = None;
        cache.whoami = None;
    }

    // -----------------------------------------------------------------------
    // Instanz
    // -----------------------------------------------------------------------

    pub async fn login(&self, benutzer: &str, passwort: &str) -> QueryResult<()> {
        let cmd = Command::new("login")
            .param("client_login_name", benutzer)
            .param("client_login_password", passwort);
        self.execute(&cmd).await?;
        self.whoami_reset();
        tracing::info!(benutzer = benutzer, "Angemeldet");
        Ok(())
    }

    pub async fn logout(&self) -> QueryResult<()> {
        let mut auswahl = self.inner.auswahl.lock().await;
        self.inner.verbindung.execute(&Command::new("logout")).await?;
        *auswahl = None;
        self.kinder_verwerfen();
        tracing::info!("Abgemeldet");
        Ok(())
    }

    /// Eigenschaften der eigenen Query-Session (zwischengespeichert)
    pub async fn whoami(&self) -> QueryResult<Properties> {
        let gemerkt = self.inner.cache.lock().whoami.clone();
        if let Some(props) = gemerkt {
            return Ok(props);
        }
        let props = self.execute(&Command::new("whoami")).await?.to_list()?;
        self.inner.cache.lock().whoami = Some(props.clone());
        Ok(props)
    }

    pub async fn whoami_get(&self, name: &str) -> QueryResult<Value> {
        self.whoami()
            .await?
            .remove(name)
            .ok_or_else(|| QueryError::KeyNotFound(name.to_string()))
    }

    pub fn whoami_reset(&self) {
        self.inner.cache.lock().whoami = None;
    }

    pub async fn version(&self) -> QueryResult<Properties> {
        self.execute(&Command::new("version")).await?.to_list()
    }

    /// `hostinfo`; die Werte landen auch in den Eigenschaften des Hosts
    pub async fn host_info(&self) -> QueryResult<Properties> {
        let props = self.execute(&Command::new("hostinfo")).await?.to_list()?;
        zusammenfuehren(&self.inner.props, props.clone());
        Ok(props)
    }

    pub async fn instance_info(&self) -> QueryResult<Properties> {
        self.execute(&Command::new("instanceinfo")).await?.to_list()
    }

    /// Setzt den Nickname, der nach jedem `use` gesetzt wird
    pub fn set_nickname(&self, nickname: Option<String>) {
        self.inner.cache.lock().nickname = nickname;
    }

    // -----------------------------------------------------------------------
    // Virtuelle Server
    // -----------------------------------------------------------------------

    /// Alle virtuellen Server, nach ID sortiert
    pub async fn server_list(&self) -> QueryResult<Vec<Server>> {
        {
            let cache = self.inner.cache.lock();
            if cache.server_liste_aktuell {
                return Ok(self.server_aus_cache(&cache.server));
            }
        }

        let reply = self
            .execute(&Command::new("serverlist").option("uid"))
            .await?;
        let mut neu = Vec::new();
        for props in reply.to_array() {
            neu.push((id_feld(&props, "virtualserver_id")?, props));
        }

        let mut cache = self.inner.cache.lock();
        let mut alt = std::mem::take(&mut cache.server);
        for (sid, props) in neu {
            let bag = match alt.remove(&sid) {
                Some(bag) => {
                    *bag.write() = props;
                    bag
                }
                None => eigenschaften(props),
            };
            cache.server.insert(sid, bag);
        }
        cache.server_liste_aktuell = true;
        Ok(self.server_aus_cache(&cache.server))
    }

    fn server_aus_cache(&self, server: &BTreeMap<u32, Eigenschaften>) -> Vec<Server> {
        server
            .iter()
            .map(|(sid, bag)| Server::neu(self.clone(), *sid, bag.clone()))
            .collect()
    }

    /// Die naechste `server_list` fragt neu; bestehende Handles bleiben gueltig
    pub fn server_list_reset(&self) {
        self.inner.cache.lock().server_liste_aktuell = false;
    }

    async fn server_suchen(
        &self,
        beschreibung: String,
        passt: impl Fn(&Server) -> bool,
    ) -> QueryResult<Server> {
        self.server_list()
            .await?
            .into_iter()
            .find(|s| passt(s))
            .ok_or(QueryError::NodeNotFound(beschreibung))
    }

    pub async fn server_get_by_id(&self, sid: u32) -> QueryResult<Server> {
        self.server_suchen(format!("Server mit ID {sid}"), |s| s.id() == sid)
            .await
    }

    pub async fn server_get_by_uid(&self, uid: &str) -> QueryResult<Server> {
        self.server_suchen(format!("Server mit UID {uid}"), |s| {
            s.property_str("virtualserver_unique_identifier").as_deref() == Some(uid)
        })
        .await
    }

    pub async fn server_get_by_name(&self, name: &str) -> QueryResult<Server> {
        self.server_suchen(format!("Server mit Namen {name}"), |s| {
            s.property_str("virtualserver_name").as_deref() == Some(name)
        })
        .await
    }

    pub async fn server_get_by_port(&self, port: u16) -> QueryResult<Server> {
        let sid = self.server_id_get_by_port(port).await?;
        self.server_get_by_id(sid).await
    }

    /// `serveridgetbyport`
    pub async fn server_id_get_by_port(&self, port: u16) -> QueryResult<u32> {
        let cmd = Command::new("serveridgetbyport").param("virtualserver_port", port);
        id_feld(&self.execute(&cmd).await?.to_list()?, "server_id")
    }

    /// Waehlt einen virtuellen Server aus (immer mit `use`)
    pub async fn server_select(&self, sid: u32) -> QueryResult<()> {
        let mut auswahl = self.inner.auswahl.lock().await;
        self.auswaehlen(&mut auswahl, sid).await
    }

    pub async fn server_selected_id(&self) -> Option<u32> {
        *self.inner.auswahl.lock().await
    }

    /// Handle fuer eine Server-ID ohne Netzwerkzugriff
    pub(crate) fn server_handle(&self, sid: u32) -> Server {
        let bag = self
            .inner
            .cache
            .lock()
            .server
            .entry(sid)
            .or_insert_with(|| {
                let mut props = Properties::new();
                props.insert("virtualserver_id".into(), Value::from(sid));
                eigenschaften(props)
            })
            .clone();
        Server::neu(self.clone(), sid, bag)
    }

    /// `servercreate`; liefert `sid`, `token` und `virtualserver_port`
    pub async fn server_create(&self, props: Properties) -> QueryResult<Properties> {
        let cmd = Command::from_parts("servercreate", props, Vec::<String>::new());
        let ergebnis = self.execute(&cmd).await?.to_list()?;
        self.server_list_reset();
        tracing::info!(server_id = ?ergebnis.get("sid"), "Virtueller Server erstellt");
        Ok(ergebnis)
    }

    pub async fn server_delete(&self, sid: u32) -> QueryResult<()> {
        let mut auswahl = self.inner.auswahl.lock().await;
        self.inner
            .verbindung
            .execute(&Command::new("serverdelete").param("sid", sid))
            .await?;
        if *auswahl == Some(sid) {
            *auswahl = None;
            self.kinder_verwerfen();
        }
        let mut cache = self.inner.cache.lock();
        cache.server.remove(&sid);
        cache.server_liste_aktuell = false;
        tracing::info!(server_id = sid, "Virtueller Server geloescht");
        Ok(())
    }

    pub async fn server_start(&self, sid: u32) -> QueryResult<()> {
        self.execute(&Command::new("serverstart").param("sid", sid))
            .await?;
        self.server_list_reset();
        Ok(())
    }

    pub async fn server_stop(&self, sid: u32) -> QueryResult<()> {
        self.execute(&Command::new("serverstop").param("sid", sid))
            .await?;
        self.server_list_reset();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Kinderlisten (Channels, Clients) des ausgewaehlten Servers
    // -----------------------------------------------------------------------

    pub(crate) fn liste_lesen(&self, art: Liste, sid: u32) -> Option<Vec<(u32, Eigenschaften)>> {
        let mut cache = self.inner.cache.lock();
        match cache.liste(art) {
            Some(l) if l.server_id == sid && l.aktuell => Some(l.eintraege.clone()),
            _ => None,
        }
    }

    /// Ersetzt eine Liste; Eintraege mit bekannter ID behalten ihre Identitaet
    pub(crate) fn liste_schreiben(
        &self,
        art: Liste,
        sid: u32,
        neu: Vec<(u32, Properties)>,
    ) -> Vec<(u32, Eigenschaften)> {
        let mut cache = self.inner.cache.lock();
        let slot = cache.liste(art);
        let mut alt: BTreeMap<u32, Eigenschaften> = match slot.take() {
            Some(l) if l.server_id == sid => l.eintraege.into_iter().collect(),
            _ => BTreeMap::new(),
        };
        let eintraege: Vec<_> = neu
            .into_iter()
            .map(|(id, props)| {
                let bag = match alt.remove(&id) {
                    Some(bag) => {
                        *bag.write() = props;
                        bag
                    }
                    None => eigenschaften(props),
                };
                (id, bag)
            })
            .collect();
        *slot = Some(ListenCache {
            server_id: sid,
            aktuell: true,
            eintraege: eintraege.clone(),
        });
        eintraege
    }

    pub(crate) fn liste_verwerfen(&self, art: Liste, sid: u32) {
        let mut cache = self.inner.cache.lock();
        if let Some(l) = cache.liste(art).as_mut() {
            if l.server_id == sid {
                l.aktuell = false;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Ereignisse und Ende
    // -----------------------------------------------------------------------

    /// Naechstes Ereignis
    ///
    /// Blockierend: wartet, bis eines ankommt. Nicht blockierend: liefert
    /// `None`, wenn gerade keines vorliegt.
    pub async fn wait_for_event(&self) -> QueryResult<Option<NotifyEvent>> {
        if !self.inner.blockierend {
            return self.inner.verbindung.try_next_event().transpose();
        }
        match self.inner.verbindung.next_event().await {
            Some(event) => event.map(Some),
            None => Err(QueryError::transport(
                io::ErrorKind::UnexpectedEof,
                "Verbindung geschlossen, keine weiteren Ereignisse",
            )),
        }
    }

    /// Sendet `quit` und schliesst die Verbindung
    pub async fn quit(&self) -> QueryResult<()> {
        if let Err(e) = self.inner.verbindung.request(&Command::new("quit")).await {
            tracing::debug!(fehler = %e, "quit ohne Antwort");
        }
        self.inner.verbindung.close().await
    }
}

/// Mehrere Befehle auf einem virtuellen Server ohne zwischenzeitliches `use`
///
/// Andere Aufrufer, die einen Server brauchen, warten so lange.
pub(crate) struct ServerSitzung<'a> {
    host: &'a Host,
    _auswahl: MutexGuard<'a, Option<u32>>,
}

impl ServerSitzung<'_> {
    pub(crate) async fn execute(&self, cmd: &Command) -> QueryResult<Reply> {
        self.host.inner.verbindung.execute(cmd).await
    }

    /// `whoami` auf dem ausgewaehlten Server
    ///
    /// Der Cache wird bei jedem `use` geleert und gilt deshalb hier.
    pub(crate) async fn whoami(&self) -> QueryResult<Properties> {
        let gemerkt = self.host.inner.cache.lock().whoami.clone();
        if let Some(props) = gemerkt {
            return Ok(props);
        }
        let props = self.execute(&Command::new("whoami")).await?.to_list()?;
        self.host.inner.cache.lock().whoami = Some(props.clone());
        Ok(props)
    }
}

impl Node for Host {
    fn id(&self) -> u32 {
        0
    }

    fn eigenschaften(&self) -> &Eigenschaften {
        &self.inner.props
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("verbindung", &self.inner.verbindung)
            .field("politik", &self.inner.politik)
            .finish()
    }
}
