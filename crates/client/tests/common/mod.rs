//! Gemeinsame Test-Infrastruktur: ServerQuery-Attrappe ueber eine In-Memory-Pipe

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tsquery_client::{Connection, ConnectionConfig, Host};
use tsquery_protocol::wire::unescape;

pub const BEGRUESSUNG: &str =
    "Welcome to the TeamSpeak 3 ServerQuery interface, type \"help\" for a list of commands.";

/// Alle Befehlszeilen, die die Attrappe empfangen hat
pub type Mitschnitt = Arc<Mutex<Vec<String>>>;

/// Startet die Attrappe; `None` aus dem Handler trennt die Verbindung
pub fn attrappe<F>(mut handler: F) -> (DuplexStream, Mitschnitt)
where
    F: FnMut(&str) -> Option<Vec<String>> + Send + 'static,
{
    let (client, server) = tokio::io::duplex(256 * 1024);
    let mitschnitt: Mitschnitt = Arc::default();
    let log = mitschnitt.clone();

    tokio::spawn(async move {
        let (lesen, mut schreiben) = tokio::io::split(server);
        let mut zeilen = BufReader::new(lesen).lines();
        schreiben
            .write_all(format!("TS3\n\r{BEGRUESSUNG}\n\r").as_bytes())
            .await?;

        while let Some(zeile) = zeilen.next_line().await? {
            let zeile = zeile.trim_end_matches('\r').to_string();
            log.lock().push(zeile.clone());
            let Some(antwort) = handler(&zeile) else {
                break;
            };
            for z in antwort {
                schreiben.write_all(format!("{z}\n\r").as_bytes()).await?;
            }
        }
        Ok::<_, std::io::Error>(())
    });

    (client, mitschnitt)
}

pub fn testconfig() -> ConnectionConfig {
    ConnectionConfig {
        timeout_ms: 2_000,
        ..Default::default()
    }
}

pub async fn verbindung<F>(handler: F, config: &ConnectionConfig) -> (Connection, Mitschnitt)
where
    F: FnMut(&str) -> Option<Vec<String>> + Send + 'static,
{
    let (stream, log) = attrappe(handler);
    let verbindung = Connection::from_stream(stream, config)
        .await
        .expect("Adapter startet nicht");
    (verbindung, log)
}

/// Host auf der Standard-Instanz
pub async fn host(config: &ConnectionConfig) -> (Host, Mitschnitt) {
    host_mit(instanz, config).await
}

pub async fn host_mit<F>(handler: F, config: &ConnectionConfig) -> (Host, Mitschnitt)
where
    F: FnMut(&str) -> Option<Vec<String>> + Send + 'static,
{
    let (verbindung, log) = verbindung(handler, config).await;
    let host = Host::from_connection(verbindung, config)
        .await
        .expect("Host startet nicht");
    (host, log)
}

/// Befehlszeile zerlegt in Verb und unescapte Parameter
pub fn zerlegen(zeile: &str) -> (String, BTreeMap<String, String>) {
    let mut teile = zeile.split(' ');
    let verb = teile.next().unwrap_or_default().to_string();
    let params = teile
        .filter(|t| !t.starts_with('-'))
        .filter_map(|t| t.split_once('='))
        .map(|(k, v)| (k.to_string(), unescape(v).expect("Escape im Befehl")))
        .collect();
    (verb, params)
}

pub fn ok() -> String {
    "error id=0 msg=ok".into()
}

pub fn fehler(id: u32, msg: &str) -> String {
    format!("error id={id} msg={}", tsquery_protocol::wire::escape(msg))
}

fn antwort(daten: &[&str]) -> Option<Vec<String>> {
    let mut zeilen: Vec<String> = daten.iter().map(|z| z.to_string()).collect();
    zeilen.push(ok());
    Some(zeilen)
}

/// Wie oft ein Verb im Mitschnitt vorkommt
pub fn anzahl(log: &Mitschnitt, verb: &str) -> usize {
    log.lock()
        .iter()
        .filter(|z| z.split(' ').next() == Some(verb))
        .count()
}

/// Eine Instanz mit zwei virtuellen Servern
///
/// Channels 1..=4 (Lobby, Spacer, Dateien mit Passwort, Unter-Channel von
/// Lobby) und zwei Clients, einer davon Query-Client. Die Attrappe liefert
/// fuer beide Server dieselben Listen.
pub fn instanz(zeile: &str) -> Option<Vec<String>> {
    let (verb, p) = zerlegen(zeile);
    let sid = || p.get("sid").map(String::as_str);

    match verb.as_str() {
        "login" | "logout" | "clientupdate" | "sendtextmessage" | "clientmove"
        | "servernotifyregister" | "clientpoke" | "channeladdperm" | "clientkick" => {
            Some(vec![ok()])
        }
        "quit" => None,
        "use" => match sid() {
            Some("1") | Some("2") => Some(vec![ok()]),
            _ => Some(vec![fehler(1024, "invalid serverID")]),
        },
        "version" => antwort(&["version=3.13.7 build=1655727713 platform=Linux"]),
        "whoami" => antwort(&[
            "virtualserver_status=online virtualserver_id=1 virtualserver_unique_identifier=uidA \
             virtualserver_port=9987 client_id=6 client_channel_id=1 client_nickname=serveradmin \
             client_database_id=1 client_login_name=serveradmin",
        ]),
        "serverlist" => antwort(&[
            "virtualserver_id=1 virtualserver_port=9987 virtualserver_status=online \
             virtualserver_clientsonline=2 virtualserver_name=Alpha\\sServer \
             virtualserver_unique_identifier=uidA|virtualserver_id=2 virtualserver_port=9988 \
             virtualserver_status=online virtualserver_clientsonline=0 virtualserver_name=Beta \
             virtualserver_unique_identifier=uidB",
        ]),
        "serveridgetbyport" => match p.get("virtualserver_port").map(String::as_str) {
            Some("9987") => antwort(&["server_id=1"]),
            Some("9988") => antwort(&["server_id=2"]),
            _ => Some(vec![fehler(1033, "server is not running")]),
        },
        "channellist" => antwort(&[
            // Absichtlich nicht in Anzeigereihenfolge
            "cid=3 pid=0 channel_order=2 channel_name=Dateien channel_password=geheim \
             channel_flag_default=0 total_clients=0|cid=4 pid=1 channel_order=0 \
             channel_name=Unterraum channel_flag_default=0 total_clients=0|cid=1 pid=0 \
             channel_order=0 channel_name=Lobby channel_flag_default=1 total_clients=2|cid=2 \
             pid=0 channel_order=1 channel_name=[cspacer1]--- channel_flag_default=0 total_clients=0",
        ]),
        "clientlist" => antwort(&[
            "clid=5 cid=4 client_database_id=10 client_nickname=Alice client_type=0 \
             client_unique_identifier=aliceUID|clid=6 cid=1 client_database_id=1 \
             client_nickname=serveradmin client_type=1 client_unique_identifier",
        ]),
        "clientinfo" => match p.get("clid").map(String::as_str) {
            Some("5") => antwort(&["cid=4 client_nickname=Alice client_version=3.6.2"]),
            _ => Some(vec![fehler(512, "invalid clientID")]),
        },
        "channelcreate" => antwort(&["cid=20"]),
        "channelpermlist" => antwort(&[
            "cid=1 permid=8471 permvalue=75 permnegated=0 permskip=0|permid=8474 permvalue=50 \
             permnegated=1 permskip=0|permid=8473 permvalue=0 permnegated=0 permskip=1",
        ]),
        "banclient" => antwort(&["banid=7", "banid=8"]),
        "ftgetfilelist" => {
            if !p.contains_key("cpw") {
                return Some(vec![fehler(0x603, "parameter not found")]);
            }
            if p.get("cpw").map(String::as_str) != Some("geheim") {
                return Some(vec![fehler(781, "invalid channel password")]);
            }
            match p.get("path").map(String::as_str) {
                Some("/") => antwort(&[
                    "cid=3 path=\\/ name=docs size=0 datetime=1700000000 type=0|name=a.txt \
                     size=5 datetime=1700000000 type=1",
                ]),
                Some("/docs/") => Some(vec![fehler(0x501, "database empty result set")]),
                _ => Some(vec![fehler(0x501, "database empty result set")]),
            }
        }
        "ftcreatedir" => Some(vec![fehler(0x802, "file already exists")]),
        "ftdeletefile" => Some(vec![fehler(0x806, "invalid file path")]),
        _ => Some(vec![fehler(256, "command not found")]),
    }
}
