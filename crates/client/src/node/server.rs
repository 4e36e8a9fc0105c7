//! Virtueller Server
//!
//! Alle Befehle laufen ueber [`Host::execute_on`], das vorher per `use`
//! auf diesen Server umschaltet, falls noetig.

use std::collections::VecDeque;

use tsquery_protocol::{codes, Command, Properties, QueryError, QueryResult, Value};

use super::channel::Channel;
use super::client::{Client, KickReason};
use super::host::{Host, Liste};
use super::permission::{self, Permission, PermissionKey};
use super::spacer::{self, SpacerAlign, SpacerType};
use super::tree::{self, Einordnung, TreeEntry};
use super::{id_feld, zusammenfuehren, Eigenschaften, Node};

/// Textnachricht-Ziele (`targetmode`)
pub(crate) const TEXTMSG_CLIENT: u32 = 1;
pub(crate) const TEXTMSG_CHANNEL: u32 = 2;
pub(crate) const TEXTMSG_SERVER: u32 = 3;

/// Codec fuer neue Spacer (Opus Voice)
const SPACER_CODEC: u32 = 4;

/// Handle auf einen virtuellen Server
#[derive(Clone)]
pub struct Server {
    host: Host,
    id: u32,
    props: Eigenschaften,
}

impl Server {
    pub(crate) fn neu(host: Host, id: u32, props: Eigenschaften) -> Self {
        Self { host, id, props }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub(crate) async fn execute(&self, cmd: &Command) -> QueryResult<tsquery_protocol::Reply> {
        self.host.execute_on(self.id, cmd).await
    }

    // -----------------------------------------------------------------------
    // Server selbst
    // -----------------------------------------------------------------------

    /// `serverinfo`; aktualisiert die Eigenschaften dieses Handles
    pub async fn info(&self) -> QueryResult<Properties> {
        let props = self.execute(&Command::new("serverinfo")).await?.to_list()?;
        zusammenfuehren(&self.props, props);
        Ok(self.properties())
    }

    /// `serveredit`
    pub async fn modify(&self, props: Properties) -> QueryResult<()> {
        let cmd = Command::from_parts("serveredit", props.clone(), Vec::<String>::new());
        self.execute(&cmd).await?;
        zusammenfuehren(&self.props, props);
        Ok(())
    }

    /// Textnachricht an den ganzen Server
    pub async fn message(&self, text: &str) -> QueryResult<()> {
        let cmd = Command::new("sendtextmessage")
            .param("targetmode", TEXTMSG_SERVER)
            .param("target", self.id)
            .param("msg", text);
        self.execute(&cmd).await?;
        Ok(())
    }

    /// `servernotifyregister event=<event> [id=<cid>]`
    pub async fn notify_register(&self, event: &str, id: Option<u32>) -> QueryResult<()> {
        let cmd = Command::new("servernotifyregister")
            .param("event", event)
            .param("id", id);
        self.execute(&cmd).await?;
        tracing::debug!(server_id = self.id, event = event, "Ereignisse registriert");
        Ok(())
    }

    pub async fn notify_unregister(&self) -> QueryResult<()> {
        self.execute(&Command::new("servernotifyunregister")).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Channels
    // -----------------------------------------------------------------------

    /// Alle Channels in Anzeigereihenfolge
    pub async fn channel_list(&self) -> QueryResult<Vec<Channel>> {
        if let Some(eintraege) = self.host.liste_lesen(Liste::Channels, self.id) {
            return Ok(self.channels_aus(eintraege));
        }
        if self.host.policy().clients_before_channels {
            self.client_list().await?;
        }

        let cmd = Command::new("channellist")
            .option("topic")
            .option("flags")
            .option("voice")
            .option("limits")
            .option("icon")
            .option("secondsempty");
        let records = self.execute(&cmd).await?.to_array();

        let mut einordnung = Vec::with_capacity(records.len());
        let mut nach_id = std::collections::BTreeMap::new();
        for props in records {
            let cid = id_feld(&props, "cid")?;
            einordnung.push(Einordnung {
                cid,
                pid: id_feld(&props, "pid").unwrap_or(0),
                order: id_feld(&props, "channel_order").unwrap_or(0),
            });
            nach_id.insert(cid, props);
        }
        let sortiert = tree::anzeige_reihenfolge(&einordnung)
            .into_iter()
            .filter_map(|cid| nach_id.remove(&cid).map(|p| (cid, p)))
            .collect();

        let eintraege = self.host.liste_schreiben(Liste::Channels, self.id, sortiert);
        Ok(self.channels_aus(eintraege))
    }

    fn channels_aus(&self, eintraege: Vec<(u32, Eigenschaften)>) -> Vec<Channel> {
        eintraege
            .into_iter()
            .map(|(cid, bag)| Channel::neu(self.host.clone(), self.id, cid, bag))
            .collect()
    }

    pub fn channel_list_reset(&self) {
        self.host.liste_verwerfen(Liste::Channels, self.id);
    }

    async fn channel_suchen(
        &self,
        beschreibung: String,
        passt: impl Fn(&Channel) -> bool,
    ) -> QueryResult<Channel> {
        self.channel_list()
            .await?
            .into_iter()
            .find(|c| passt(c))
            .ok_or(QueryError::NodeNotFound(beschreibung))
    }

    pub async fn channel_get_by_id(&self, cid: u32) -> QueryResult<Channel> {
        self.channel_suchen(format!("Channel mit ID {cid}"), |c| c.id() == cid)
            .await
    }

    /// Erster Channel mit diesem Namen
    pub async fn channel_get_by_name(&self, name: &str) -> QueryResult<Channel> {
        self.channel_suchen(format!("Channel mit Namen {name}"), |c| {
            c.property_str("channel_name").as_deref() == Some(name)
        })
        .await
    }

    /// Standard-Channel (`channel_flag_default=1`)
    pub async fn channel_get_default(&self) -> QueryResult<Channel> {
        self.channel_suchen("Standard-Channel".into(), |c| {
            c.property("channel_flag_default")
                .is_some_and(|v| v.as_bool())
        })
        .await
    }

    /// `channelcreate`; liefert die neue Channel-ID
    pub async fn channel_create(&self, props: Properties) -> QueryResult<u32> {
        let cmd = Command::from_parts("channelcreate", props, Vec::<String>::new());
        let cid = id_feld(&self.execute(&cmd).await?.to_list()?, "cid")?;
        self.channel_list_reset();
        tracing::debug!(server_id = self.id, cid = cid, "Channel erstellt");
        Ok(cid)
    }

    pub async fn channel_delete(&self, cid: u32, force: bool) -> QueryResult<()> {
        let cmd = Command::new("channeldelete")
            .param("cid", cid)
            .param("force", force);
        self.execute(&cmd).await?;
        self.channel_list_reset();
        Ok(())
    }

    /// `channelmove`; `order` ist die ID des neuen Vorgaengers
    pub async fn channel_move(&self, cid: u32, pid: u32, order: Option<u32>) -> QueryResult<()> {
        let cmd = Command::new("channelmove")
            .param("cid", cid)
            .param("cpid", pid)
            .param("order", order);
        self.execute(&cmd).await?;
        self.channel_list_reset();
        Ok(())
    }

    pub fn channel_is_spacer(&self, channel: &Channel) -> bool {
        channel.is_spacer()
    }

    /// Legt einen Spacer an und liefert dessen Channel-ID
    pub async fn channel_spacer_create(
        &self,
        kennung: &str,
        typ: SpacerType,
        ausrichtung: SpacerAlign,
        order: Option<u32>,
        max_clients: u32,
    ) -> QueryResult<u32> {
        let mut props = Properties::new();
        props.insert(
            "channel_name".into(),
            Value::from(spacer::name_bauen(kennung, typ, ausrichtung)),
        );
        props.insert("channel_name_phonetic".into(), Value::from("channel spacer"));
        props.insert("channel_codec".into(), Value::from(SPACER_CODEC));
        props.insert("channel_codec_quality".into(), Value::Int(0));
        props.insert("channel_flag_permanent".into(), Value::from(true));
        props.insert("channel_flag_maxclients_unlimited".into(), Value::from(false));
        props.insert(
            "channel_flag_maxfamilyclients_unlimited".into(),
            Value::from(false),
        );
        props.insert(
            "channel_flag_maxfamilyclients_inherited".into(),
            Value::from(false),
        );
        props.insert("channel_maxclients".into(), Value::from(max_clients));
        props.insert("channel_order".into(), Value::from(order));
        self.channel_create(props).await
    }

    pub async fn channel_spacer_get_type(&self, cid: u32) -> QueryResult<SpacerType> {
        self.channel_get_by_id(cid).await?.spacer_type()
    }

    pub async fn channel_spacer_get_align(&self, cid: u32) -> QueryResult<SpacerAlign> {
        self.channel_get_by_id(cid).await?.spacer_align()
    }

    // -----------------------------------------------------------------------
    // Channel-Berechtigungen
    // -----------------------------------------------------------------------

    pub async fn channel_perm_list(&self, cid: u32, permsid: bool) -> QueryResult<Vec<Permission>> {
        let mut cmd = Command::new("channelpermlist").param("cid", cid);
        if permsid {
            cmd = cmd.option("permsid");
        }
        permission::aus_antwort(&self.execute(&cmd).await?)
    }

    pub async fn channel_perm_assign(
        &self,
        cid: u32,
        key: impl Into<PermissionKey>,
        wert: i64,
    ) -> QueryResult<()> {
        let cmd = key
            .into()
            .anhaengen(Command::new("channeladdperm").param("cid", cid))
            .param("permvalue", wert);
        self.execute(&cmd).await?;
        Ok(())
    }

    pub async fn channel_perm_remove(&self, cid: u32, key: impl Into<PermissionKey>) -> QueryResult<()> {
        let cmd = key
            .into()
            .anhaengen(Command::new("channeldelperm").param("cid", cid));
        self.execute(&cmd).await?;
        Ok(())
    }

    pub async fn channel_client_perm_list(
        &self,
        cid: u32,
        cldbid: u32,
        permsid: bool,
    ) -> QueryResult<Vec<Permission>> {
        let mut cmd = Command::new("channelclientpermlist")
            .param("cid", cid)
            .param("cldbid", cldbid);
        if permsid {
            cmd = cmd.option("permsid");
        }
        permission::aus_antwort(&self.execute(&cmd).await?)
    }

    pub async fn channel_client_perm_assign(
        &self,
        cid: u32,
        cldbid: u32,
        key: impl Into<PermissionKey>,
        wert: i64,
    ) -> QueryResult<()> {
        let basis = Command::new("channelclientaddperm")
            .param("cid", cid)
            .param("cldbid", cldbid);
        let cmd = key.into().anhaengen(basis).param("permvalue", wert);
        self.execute(&cmd).await?;
        Ok(())
    }

    pub async fn channel_client_perm_remove(
        &self,
        cid: u32,
        cldbid: u32,
        key: impl Into<PermissionKey>,
    ) -> QueryResult<()> {
        let basis = Command::new("channelclientdelperm")
            .param("cid", cid)
            .param("cldbid", cldbid);
        self.execute(&key.into().anhaengen(basis)).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Dateien
    // -----------------------------------------------------------------------

    /// `ftgetfilelist`; jeder Eintrag bekommt `src` (Pfad + Name)
    ///
    /// `cpw = None` laesst das Passwort weg, dann antwortet der Server mit
    /// "parameter not found". Rekursiv werden Verzeichnisse (`type=0`)
    /// nachgeladen; leere Unterverzeichnisse zaehlen nicht als Fehler.
    pub async fn channel_file_list(
        &self,
        cid: u32,
        cpw: Option<&str>,
        pfad: &str,
        rekursiv: bool,
    ) -> QueryResult<Vec<Properties>> {
        let mut out = Vec::new();
        let mut offen = VecDeque::from([pfad.to_string()]);
        let mut erste = true;

        while let Some(pfad) = offen.pop_front() {
            let cmd = Command::new("ftgetfilelist")
                .param("cid", cid)
                .param("cpw", cpw)
                .param("path", pfad.as_str());
            let eintraege = match self.execute(&cmd).await {
                Ok(reply) => reply.to_array(),
                Err(e) if !erste && e.code() == Some(codes::DATABASE_EMPTY_RESULT) => Vec::new(),
                Err(e) => return Err(e),
            };
            erste = false;

            for mut datei in eintraege {
                let name = datei
                    .get("name")
                    .map(ToString::to_string)
                    .unwrap_or_default();
                let src = pfad_verbinden(&pfad, &name);
                let ist_verzeichnis = datei.get("type").and_then(Value::as_int) == Some(0);
                if rekursiv && ist_verzeichnis {
                    offen.push_back(format!("{src}/"));
                }
                datei.insert("src".into(), Value::from(src));
                out.push(datei);
            }
        }
        Ok(out)
    }

    /// `ftgetfileinfo`
    pub async fn channel_file_info(
        &self,
        cid: u32,
        cpw: Option<&str>,
        name: &str,
    ) -> QueryResult<Properties> {
        let cmd = Command::new("ftgetfileinfo")
            .param("cid", cid)
            .param("cpw", cpw)
            .param("name", name);
        // Mehrere Eintraege sind moeglich, gefragt ist nur einer
        Ok(self
            .execute(&cmd)
            .await?
            .to_array()
            .into_iter()
            .next()
            .unwrap_or_default())
    }

    /// `ftrenamefile`; mit `ziel` wird in einen anderen Channel verschoben
    pub async fn channel_file_rename(
        &self,
        cid: u32,
        cpw: Option<&str>,
        alt: &str,
        neu: &str,
        ziel: Option<(u32, Option<&str>)>,
    ) -> QueryResult<()> {
        let (tcid, tcpw) = match ziel {
            Some((tcid, tcpw)) => (Some(tcid), tcpw),
            None => (None, None),
        };
        let cmd = Command::new("ftrenamefile")
            .param("cid", cid)
            .param("cpw", cpw)
            .param("tcid", tcid)
            .param("tcpw", tcpw)
            .param("oldname", alt)
            .param("newname", neu);
        self.execute(&cmd).await?;
        Ok(())
    }

    /// `ftdeletefile`
    pub async fn channel_file_delete(&self, cid: u32, cpw: Option<&str>, name: &str) -> QueryResult<()> {
        let cmd = Command::new("ftdeletefile")
            .param("cid", cid)
            .param("cpw", cpw)
            .param("name", name);
        self.execute(&cmd).await?;
        Ok(())
    }

    /// `ftcreatedir`
    pub async fn channel_dir_create(&self, cid: u32, cpw: Option<&str>, verzeichnis: &str) -> QueryResult<()> {
        let cmd = Command::new("ftcreatedir")
            .param("cid", cid)
            .param("cpw", cpw)
            .param("dirname", verzeichnis);
        self.execute(&cmd).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Clients
    // -----------------------------------------------------------------------

    /// Verbundene Clients (Query-Clients je nach Politik ausgeblendet)
    pub async fn client_list(&self) -> QueryResult<Vec<Client>> {
        let eintraege = match self.host.liste_lesen(Liste::Clients, self.id) {
            Some(e) => e,
            None => {
                let cmd = Command::new("clientlist")
                    .option("uid")
                    .option("away")
                    .option("voice")
                    .option("times")
                    .option("groups")
                    .option("info")
                    .option("icon")
                    .option("country");
                let mut neu = Vec::new();
                for props in self.execute(&cmd).await?.to_array() {
                    neu.push((id_feld(&props, "clid")?, props));
                }
                self.host.liste_schreiben(Liste::Clients, self.id, neu)
            }
        };

        let ohne_query = self.host.policy().no_query_clients;
        Ok(eintraege
            .into_iter()
            .map(|(clid, bag)| Client::neu(self.host.clone(), self.id, clid, bag))
            .filter(|c| !(ohne_query && c.is_query_client()))
            .collect())
    }

    pub fn client_list_reset(&self) {
        self.host.liste_verwerfen(Liste::Clients, self.id);
    }

    async fn client_suchen(
        &self,
        beschreibung: String,
        passt: impl Fn(&Client) -> bool,
    ) -> QueryResult<Client> {
        self.client_list()
            .await?
            .into_iter()
            .find(|c| passt(c))
            .ok_or(QueryError::NodeNotFound(beschreibung))
    }

    pub async fn client_get_by_id(&self, clid: u32) -> QueryResult<Client> {
        self.client_suchen(format!("Client mit ID {clid}"), |c| c.id() == clid)
            .await
    }

    /// Erster Client mit diesem Nickname
    pub async fn client_get_by_name(&self, nickname: &str) -> QueryResult<Client> {
        self.client_suchen(format!("Client mit Nickname {nickname}"), |c| {
            c.property_str("client_nickname").as_deref() == Some(nickname)
        })
        .await
    }

    /// Client per eindeutiger ID; Query-Clients haben die UID `ServerQuery`
    pub async fn client_get_by_uid(&self, uid: &str) -> QueryResult<Client> {
        self.client_suchen(format!("Client mit UID {uid}"), |c| {
            c.unique_identifier().as_deref() == Some(uid)
        })
        .await
    }

    pub async fn client_get_by_dbid(&self, cldbid: u32) -> QueryResult<Client> {
        self.client_suchen(format!("Client mit Datenbank-ID {cldbid}"), |c| {
            c.database_id() == Some(cldbid)
        })
        .await
    }

    pub async fn client_kick(&self, clid: u32, grund: KickReason, nachricht: Option<&str>) -> QueryResult<()> {
        let cmd = Command::new("clientkick")
            .param("clid", clid)
            .param("reasonid", grund as u32)
            .param("reasonmsg", nachricht);
        self.execute(&cmd).await?;
        self.client_list_reset();
        Ok(())
    }

    pub async fn client_poke(&self, clid: u32, nachricht: &str) -> QueryResult<()> {
        let cmd = Command::new("clientpoke")
            .param("clid", clid)
            .param("msg", nachricht);
        self.execute(&cmd).await?;
        Ok(())
    }

    pub async fn client_move(&self, clid: u32, cid: u32, cpw: Option<&str>) -> QueryResult<()> {
        let cmd = Command::new("clientmove")
            .param("clid", clid)
            .param("cid", cid)
            .param("cpw", cpw);
        self.execute(&cmd).await?;
        self.client_list_reset();
        Ok(())
    }

    /// `banclient`; liefert die IDs der angelegten Bans
    pub async fn client_ban(
        &self,
        clid: u32,
        dauer_sekunden: Option<u32>,
        grund: Option<&str>,
    ) -> QueryResult<Vec<u32>> {
        let cmd = Command::new("banclient")
            .param("clid", clid)
            .param("time", dauer_sekunden)
            .param("banreason", grund);
        let reply = self.execute(&cmd).await?;
        self.client_list_reset();
        Ok(reply
            .to_table()
            .iter()
            .flatten()
            .filter_map(|r| r.value("banid"))
            .filter_map(|v| v.as_int())
            .filter_map(|n| u32::try_from(n).ok())
            .collect())
    }

    // -----------------------------------------------------------------------
    // Client-Berechtigungen
    // -----------------------------------------------------------------------

    pub async fn client_perm_list(&self, cldbid: u32, permsid: bool) -> QueryResult<Vec<Permission>> {
        let mut cmd = Command::new("clientpermlist").param("cldbid", cldbid);
        if permsid {
            cmd = cmd.option("permsid");
        }
        permission::aus_antwort(&self.execute(&cmd).await?)
    }

    pub async fn client_perm_assign(
        &self,
        cldbid: u32,
        key: impl Into<PermissionKey>,
        wert: i64,
        skip: bool,
    ) -> QueryResult<()> {
        let cmd = key
            .into()
            .anhaengen(Command::new("clientaddperm").param("cldbid", cldbid))
            .param("permvalue", wert)
            .param("permskip", skip);
        self.execute(&cmd).await?;
        Ok(())
    }

    pub async fn client_perm_remove(&self, cldbid: u32, key: impl Into<PermissionKey>) -> QueryResult<()> {
        let cmd = key
            .into()
            .anhaengen(Command::new("clientdelperm").param("cldbid", cldbid));
        self.execute(&cmd).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Baum
    // -----------------------------------------------------------------------

    /// Channels in Anzeigereihenfolge mit ihren Clients
    pub async fn channel_tree(&self) -> QueryResult<Vec<TreeEntry>> {
        let clients_zuerst = self.host.policy().clients_before_channels;
        let (channels, clients) = if clients_zuerst {
            let clients = self.client_list().await?;
            (self.channel_list().await?, clients)
        } else {
            let channels = self.channel_list().await?;
            (channels, self.client_list().await?)
        };
        Ok(tree::baum(&channels, &clients, clients_zuerst))
    }
}

fn pfad_verbinden(pfad: &str, name: &str) -> String {
    if pfad.ends_with('/') {
        format!("{pfad}{name}")
    } else {
        format!("{pfad}/{name}")
    }
}

impl Node for Server {
    fn id(&self) -> u32 {
        self.id
    }

    fn eigenschaften(&self) -> &Eigenschaften {
        &self.props
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("id", &self.id)
            .field("name", &self.property_str("virtualserver_name"))
            .finish()
    }
}
