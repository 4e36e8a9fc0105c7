//! Channel-Knoten
//!
//! Dateioperationen setzen das Channel-Passwort automatisch ein
//! (`channel_password`, sonst leer).

use tsquery_protocol::{Command, Properties, QueryResult};

use super::client::Client;
use super::host::Host;
use super::permission::{Permission, PermissionKey};
use super::server::{Server, TEXTMSG_CHANNEL};
use super::spacer::{self, SpacerAlign, SpacerType};
use super::{id_feld, zusammenfuehren, Eigenschaften, Node};

#[derive(Clone)]
pub struct Channel {
    host: Host,
    server_id: u32,
    id: u32,
    props: Eigenschaften,
}

impl Channel {
    pub(crate) fn neu(host: Host, server_id: u32, id: u32, props: Eigenschaften) -> Self {
        Self {
            host,
            server_id,
            id,
            props,
        }
    }

    pub fn server_id(&self) -> u32 {
        self.server_id
    }

    /// ID des Eltern-Channels, 0 auf oberster Ebene
    pub fn parent_id(&self) -> u32 {
        id_feld(&self.properties(), "pid").unwrap_or(0)
    }

    pub fn name(&self) -> String {
        self.property_str("channel_name").unwrap_or_default()
    }

    /// Der Server dieses Channels (Nachschlagen, kein Besitz)
    pub fn server(&self) -> Server {
        self.host.server_handle(self.server_id)
    }

    fn passwort(&self) -> String {
        self.property_str("channel_password").unwrap_or_default()
    }

    /// `channelinfo`; aktualisiert die Eigenschaften
    pub async fn info(&self) -> QueryResult<Properties> {
        let cmd = Command::new("channelinfo").param("cid", self.id);
        let props = self.server().execute(&cmd).await?.to_list()?;
        zusammenfuehren(&self.props, props);
        Ok(self.properties())
    }

    /// `channeledit`
    pub async fn modify(&self, props: Properties) -> QueryResult<()> {
        let cmd = Command::from_parts("channeledit", props.clone(), Vec::<String>::new())
            .param("cid", self.id);
        self.server().execute(&cmd).await?;
        zusammenfuehren(&self.props, props);
        Ok(())
    }

    pub async fn delete(&self, force: bool) -> QueryResult<()> {
        self.server().channel_delete(self.id, force).await
    }

    pub async fn move_to(&self, pid: u32, order: Option<u32>) -> QueryResult<()> {
        self.server().channel_move(self.id, pid, order).await
    }

    /// Direkte Unter-Channels in Anzeigereihenfolge
    pub async fn sub_channels(&self) -> QueryResult<Vec<Channel>> {
        Ok(self
            .server()
            .channel_list()
            .await?
            .into_iter()
            .filter(|c| c.parent_id() == self.id)
            .collect())
    }

    /// Clients in diesem Channel
    pub async fn clients(&self) -> QueryResult<Vec<Client>> {
        Ok(self
            .server()
            .client_list()
            .await?
            .into_iter()
            .filter(|c| c.channel_id() == self.id)
            .collect())
    }

    pub fn is_spacer(&self) -> bool {
        spacer::ist_spacer(&self.name())
    }

    pub fn spacer_type(&self) -> QueryResult<SpacerType> {
        spacer::typ_aus_namen(&self.name())
    }

    pub fn spacer_align(&self) -> QueryResult<SpacerAlign> {
        spacer::ausrichtung_aus_namen(&self.name())
    }

    pub async fn perm_list(&self, permsid: bool) -> QueryResult<Vec<Permission>> {
        self.server().channel_perm_list(self.id, permsid).await
    }

    pub async fn perm_assign(&self, key: impl Into<PermissionKey>, wert: i64) -> QueryResult<()> {
        self.server().channel_perm_assign(self.id, key, wert).await
    }

    pub async fn perm_remove(&self, key: impl Into<PermissionKey>) -> QueryResult<()> {
        self.server().channel_perm_remove(self.id, key).await
    }

    pub async fn client_perm_list(&self, cldbid: u32, permsid: bool) -> QueryResult<Vec<Permission>> {
        self.server()
            .channel_client_perm_list(self.id, cldbid, permsid)
            .await
    }

    pub async fn client_perm_assign(
        &self,
        cldbid: u32,
        key: impl Into<PermissionKey>,
        wert: i64,
    ) -> QueryResult<()> {
        self.server()
            .channel_client_perm_assign(self.id, cldbid, key, wert)
            .await
    }

    pub async fn client_perm_remove(&self, cldbid: u32, key: impl Into<PermissionKey>) -> QueryResult<()> {
        self.server()
            .channel_client_perm_remove(self.id, cldbid, key)
            .await
    }

    pub async fn file_list(&self, pfad: &str, rekursiv: bool) -> QueryResult<Vec<Properties>> {
        let cpw = self.passwort();
        self.server()
            .channel_file_list(self.id, Some(&cpw), pfad, rekursiv)
            .await
    }

    pub async fn file_info(&self, name: &str) -> QueryResult<Properties> {
        let cpw = self.passwort();
        self.server().channel_file_info(self.id, Some(&cpw), name).await
    }

    /// Benennt um; mit `ziel` wird in einen anderen Channel verschoben
    pub async fn file_rename(&self, alt: &str, neu: &str, ziel: Option<&Channel>) -> QueryResult<()> {
        let cpw = self.passwort();
        let ziel_pw = ziel.map(Channel::passwort);
        let ziel = ziel.map(|c| (c.id, ziel_pw.as_deref()));
        self.server()
            .channel_file_rename(self.id, Some(&cpw), alt, neu, ziel)
            .await
    }

    pub async fn file_delete(&self, name: &str) -> QueryResult<()> {
        let cpw = self.passwort();
        self.server().channel_file_delete(self.id, Some(&cpw), name).await
    }

    pub async fn dir_create(&self, verzeichnis: &str) -> QueryResult<()> {
        let cpw = self.passwort();
        self.server()
            .channel_dir_create(self.id, Some(&cpw), verzeichnis)
            .await
    }

    /// Textnachricht in diesen Channel
    ///
    /// Channel-Nachrichten gehen immer in den Channel der eigenen Session,
    /// deshalb wird der Query-Client vorher hineinbewegt. `whoami`, Bewegen
    /// und Senden laufen unter einer Serverauswahl, da die Client-ID der
    /// Session bei jedem `use` neu vergeben wird.
    pub async fn message(&self, text: &str) -> QueryResult<()> {
        let sitzung = self.host.sitzung(self.server_id).await?;
        let ich = sitzung.whoami().await?;
        let bewegt = id_feld(&ich, "client_channel_id").ok() != Some(self.id);
        if bewegt {
            let pw = self.passwort();
            let cmd = Command::new("clientmove")
                .param("clid", id_feld(&ich, "client_id")?)
                .param("cid", self.id)
                .param("cpw", (!pw.is_empty()).then_some(pw.as_str()));
            sitzung.execute(&cmd).await?;
            self.host.whoami_reset();
        }
        let cmd = Command::new("sendtextmessage")
            .param("targetmode", TEXTMSG_CHANNEL)
            .param("target", self.id)
            .param("msg", text);
        sitzung.execute(&cmd).await?;
        drop(sitzung);

        if bewegt {
            self.server().client_list_reset();
        }
        Ok(())
    }
}

impl Node for Channel {
    fn id(&self) -> u32 {
        self.id
    }

    fn eigenschaften(&self) -> &Eigenschaften {
        &self.props
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("server_id", &self.server_id)
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}
