//! Client-Knoten

use tsquery_protocol::{Command, Properties, QueryError, QueryResult};

use super::channel::Channel;
use super::host::Host;
use super::permission::{Permission, PermissionKey};
use super::server::{Server, TEXTMSG_CLIENT};
use super::{id_feld, zusammenfuehren, Eigenschaften, Node};

/// UID, unter der Query-Clients gefuehrt werden
///
/// Der Server liefert fuer sie keine oder eine leere `client_unique_identifier`.
pub const SERVERQUERY_UID: &str = "ServerQuery";

/// Grund fuer `clientkick`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KickReason {
    Channel = 4,
    Server = 5,
}

#[derive(Clone)]
pub struct Client {
    host: Host,
    server_id: u32,
    id: u32,
    props: Eigenschaften,
}

impl Client {
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

    pub fn server(&self) -> Server {
        self.host.server_handle(self.server_id)
    }

    /// Channel, in dem der Client gerade ist
    pub fn channel_id(&self) -> u32 {
        id_feld(&self.properties(), "cid").unwrap_or(0)
    }

    pub fn nickname(&self) -> String {
        self.property_str("client_nickname").unwrap_or_default()
    }

    pub fn database_id(&self) -> Option<u32> {
        id_feld(&self.properties(), "client_database_id").ok()
    }

    /// `client_type=1`
    pub fn is_query_client(&self) -> bool {
        self.property_int("client_type") == Some(1)
    }

    /// Eindeutige ID; Query-Clients bekommen [`SERVERQUERY_UID`]
    pub fn unique_identifier(&self) -> Option<String> {
        match self.property_str("client_unique_identifier") {
            Some(uid) if !uid.is_empty() => Some(uid),
            _ if self.is_query_client() => Some(SERVERQUERY_UID.to_string()),
            _ => None,
        }
    }

    fn dbid(&self) -> QueryResult<u32> {
        self.database_id()
            .ok_or_else(|| QueryError::KeyNotFound("client_database_id".into()))
    }

    pub async fn channel(&self) -> QueryResult<Channel> {
        self.server().channel_get_by_id(self.channel_id()).await
    }

    /// `clientinfo`; aktualisiert die Eigenschaften
    pub async fn info(&self) -> QueryResult<Properties> {
        let cmd = Command::new("clientinfo").param("clid", self.id);
        let props = self.server().execute(&cmd).await?.to_list()?;
        zusammenfuehren(&self.props, props);
        Ok(self.properties())
    }

    /// `clientedit`
    pub async fn modify(&self, props: Properties) -> QueryResult<()> {
        let cmd = Command::from_parts("clientedit", props.clone(), Vec::<String>::new())
            .param("clid", self.id);
        self.server().execute(&cmd).await?;
        zusammenfuehren(&self.props, props);
        Ok(())
    }

    pub async fn kick(&self, grund: KickReason, nachricht: Option<&str>) -> QueryResult<()> {
        self.server().client_kick(self.id, grund, nachricht).await
    }

    pub async fn poke(&self, nachricht: &str) -> QueryResult<()> {
        self.server().client_poke(self.id, nachricht).await
    }

    pub async fn move_to(&self, cid: u32, cpw: Option<&str>) -> QueryResult<()> {
        self.server().client_move(self.id, cid, cpw).await
    }

    /// Bannt den Client; liefert die Ban-IDs
    pub async fn ban(&self, dauer_sekunden: Option<u32>, grund: Option<&str>) -> QueryResult<Vec<u32>> {
        self.server().client_ban(self.id, dauer_sekunden, grund).await
    }

    /// Private Textnachricht
    pub async fn message(&self, text: &str) -> QueryResult<()> {
        let cmd = Command::new("sendtextmessage")
            .param("targetmode", TEXTMSG_CLIENT)
            .param("target", self.id)
            .param("msg", text);
        self.server().execute(&cmd).await?;
        Ok(())
    }

    pub async fn perm_list(&self, permsid: bool) -> QueryResult<Vec<Permission>> {
        self.server().client_perm_list(self.dbid()?, permsid).await
    }

    pub async fn perm_assign(
        &self,
        key: impl Into<PermissionKey>,
        wert: i64,
        skip: bool,
    ) -> QueryResult<()> {
        self.server()
            .client_perm_assign(self.dbid()?, key, wert, skip)
            .await
    }

    pub async fn perm_remove(&self, key: impl Into<PermissionKey>) -> QueryResult<()> {
        self.server().client_perm_remove(self.dbid()?, key).await
    }
}

impl Node for Client {
    fn id(&self) -> u32 {
        self.id
    }

    fn eigenschaften(&self) -> &Eigenschaften {
        &self.props
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("server_id", &self.server_id)
            .field("id", &self.id)
            .field("nickname", &self.nickname())
            .finish()
    }
}
