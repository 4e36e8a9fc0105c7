//! Integration-Tests fuer Channel- und Client-Knoten

mod common;

use common::{anzahl, host, host_mit, instanz, ok, testconfig, zerlegen};
use tsquery_client::{
    KickReason, Node, PermissionKey, QueryError, Server, SpacerAlign, SpacerType, TreeNode, Value,
    SERVERQUERY_UID,
};

async fn alpha(config: &tsquery_client::ConnectionConfig) -> (Server, common::Mitschnitt) {
    let (host, log) = host(config).await;
    (host.server_get_by_id(1).await.unwrap(), log)
}

fn ids<N: Node>(knoten: &[N]) -> Vec<u32> {
    knoten.iter().map(Node::id).collect()
}

#[tokio::test]
async fn channels_in_anzeigereihenfolge() {
    let (server, _) = alpha(&testconfig()).await;
    let channels = server.channel_list().await.unwrap();
    assert_eq!(ids(&channels), [1, 4, 2, 3]);
    assert_eq!(channels[1].parent_id(), 1);
}

#[tokio::test]
async fn channel_identitaet_bleibt_nach_reset() {
    let (server, log) = alpha(&testconfig()).await;
    let vorher = server.channel_get_by_name("Lobby").await.unwrap();
    server.channel_list_reset();
    let nachher = server.channel_get_by_id(1).await.unwrap();
    assert_eq!(anzahl(&log, "channellist"), 2);
    assert!(vorher.same_node(&nachher));

    let default = server.channel_get_default().await.unwrap();
    assert!(default.same_node(&vorher));
}

#[tokio::test]
async fn unbekannter_channel() {
    let (server, _) = alpha(&testconfig()).await;
    let err = server.channel_get_by_id(99).await.unwrap_err();
    assert!(matches!(err, QueryError::NodeNotFound(_)), "{err:?}");
}

#[tokio::test]
async fn unter_channels_und_clients() {
    let (server, _) = alpha(&testconfig()).await;
    let lobby = server.channel_get_by_id(1).await.unwrap();

    assert_eq!(ids(&lobby.sub_channels().await.unwrap()), [4]);
    assert_eq!(ids(&lobby.clients().await.unwrap()), [6]);

    let alice = server.client_get_by_name("Alice").await.unwrap();
    assert_eq!(alice.channel().await.unwrap().name(), "Unterraum");
    assert!(alice.channel().await.unwrap().server().same_node(&server));
}

#[tokio::test]
async fn channelbaum() {
    let (server, _) = alpha(&testconfig()).await;
    let baum: Vec<(usize, String)> = server
        .channel_tree()
        .await
        .unwrap()
        .into_iter()
        .map(|e| {
            let name = match e.knoten {
                TreeNode::Channel(c) => c.name(),
                TreeNode::Client(c) => format!("@{}", c.nickname()),
            };
            (e.tiefe, name)
        })
        .collect();

    let erwartet = [
        (0, "Lobby"),
        (1, "Unterraum"),
        (2, "@Alice"),
        (1, "@serveradmin"),
        (0, "[cspacer1]---"),
        (0, "Dateien"),
    ];
    let erwartet: Vec<(usize, String)> = erwartet.iter().map(|(t, n)| (*t, n.to_string())).collect();
    assert_eq!(baum, erwartet);
}

#[tokio::test]
async fn channelbaum_clients_zuerst() {
    let mut config = testconfig();
    config.clients_before_channels = true;
    let (server, log) = alpha(&config).await;

    let baum = server.channel_tree().await.unwrap();
    let lobby_kinder: Vec<bool> = baum[1..3]
        .iter()
        .map(|e| matches!(e.knoten, TreeNode::Client(_)))
        .collect();
    assert_eq!(lobby_kinder, [true, false]);

    let befehle = log.lock().clone();
    let pos_clients = befehle.iter().position(|z| z.starts_with("clientlist")).unwrap();
    let pos_channels = befehle.iter().position(|z| z.starts_with("channellist")).unwrap();
    assert!(pos_clients < pos_channels);
}

#[tokio::test]
async fn spacer_erkennen() {
    let (server, _) = alpha(&testconfig()).await;
    let spacer = server.channel_get_by_id(2).await.unwrap();
    let lobby = server.channel_get_by_id(1).await.unwrap();

    assert!(server.channel_is_spacer(&spacer));
    assert!(!lobby.is_spacer());
    assert_eq!(server.channel_spacer_get_type(2).await.unwrap(), SpacerType::Dash);
    assert_eq!(server.channel_spacer_get_align(2).await.unwrap(), SpacerAlign::Center);

    let err = server.channel_spacer_get_type(1).await.unwrap_err();
    assert_eq!(err.code(), Some(0x307));
    let err = lobby.spacer_align().unwrap_err();
    assert_eq!(err.code(), Some(0x307));
}

#[tokio::test]
async fn spacer_anlegen() {
    let (server, log) = alpha(&testconfig()).await;
    let cid = server
        .channel_spacer_create("7", SpacerType::DashDot, SpacerAlign::Repeat, Some(3), 0)
        .await
        .unwrap();
    assert_eq!(cid, 20);

    let zeile = log
        .lock()
        .iter()
        .find(|z| z.starts_with("channelcreate"))
        .cloned()
        .unwrap();
    let (_, p) = common::zerlegen(&zeile);
    assert_eq!(p["channel_name"], "[*spacer7]-.-");
    assert_eq!(p["channel_flag_permanent"], "1");
    assert_eq!(p["channel_maxclients"], "0");
    assert_eq!(p["channel_flag_maxclients_unlimited"], "0");
    assert_eq!(p["channel_order"], "3");
    assert_eq!(p["channel_codec_quality"], "0");
}

#[tokio::test]
async fn query_client_mit_platzhalter_uid() {
    let (server, _) = alpha(&testconfig()).await;

    let query = server.client_get_by_uid(SERVERQUERY_UID).await.unwrap();
    assert_eq!(query.id(), 6);
    assert!(query.is_query_client());
    assert_eq!(query.property("client_unique_identifier"), Some(Value::Null));

    let alice = server.client_get_by_uid("aliceUID").await.unwrap();
    assert!(alice.same_node(&server.client_get_by_dbid(10).await.unwrap()));
}

#[tokio::test]
async fn query_clients_ausblenden() {
    let mut config = testconfig();
    config.no_query_clients = true;
    let (server, _) = alpha(&config).await;

    assert_eq!(ids(&server.client_list().await.unwrap()), [5]);
    let err = server.client_get_by_uid(SERVERQUERY_UID).await.unwrap_err();
    assert!(matches!(err, QueryError::NodeNotFound(_)));
}

#[tokio::test]
async fn clientinfo_bei_ungueltiger_id() {
    let (server, _) = alpha(&testconfig()).await;
    let query = server.client_get_by_id(6).await.unwrap();

    let err = query.info().await.unwrap_err();
    assert_eq!(err.code(), Some(0x200));
    assert_eq!(err.message(), "invalid clientID");

    let alice = server.client_get_by_id(5).await.unwrap();
    let props = alice.info().await.unwrap();
    assert_eq!(props["client_version"], Value::from("3.6.2"));
    assert_eq!(alice.property_str("client_version").as_deref(), Some("3.6.2"));
}

#[tokio::test]
async fn dateiliste_rekursiv_mit_passwort() {
    let (server, log) = alpha(&testconfig()).await;
    let dateien = server.channel_get_by_id(3).await.unwrap();

    let liste = dateien.file_list("/", true).await.unwrap();
    let quellen: Vec<String> = liste.iter().map(|d| d["src"].to_string()).collect();
    assert_eq!(quellen, ["/docs", "/a.txt"]);

    // Leeres Unterverzeichnis ist kein Fehler
    assert!(log.lock().iter().any(|z| z.contains(r"path=\/docs\/")));
    assert!(log.lock().iter().all(|z| !z.starts_with("ftgetfilelist") || z.contains("cpw=geheim")));
}

#[tokio::test]
async fn dateifehler() {
    let (server, _) = alpha(&testconfig()).await;

    // Ohne Passwort fehlt der Parameter
    let err = server.channel_file_list(3, None, "/", false).await.unwrap_err();
    assert_eq!(err.code(), Some(0x603));

    // Lobby hat kein Passwort, gesendet wird trotzdem cpw=
    let lobby = server.channel_get_by_id(1).await.unwrap();
    let err = lobby.file_list("/", false).await.unwrap_err();
    assert_eq!(err.code(), Some(781));

    let dateien = server.channel_get_by_id(3).await.unwrap();
    let err = dateien.dir_create("/docs").await.unwrap_err();
    assert_eq!(err.code(), Some(0x802));
    let err = dateien.file_delete("/../x").await.unwrap_err();
    assert_eq!(err.code(), Some(0x806));
}

#[tokio::test]
async fn berechtigungen_in_serverreihenfolge() {
    let (server, log) = alpha(&testconfig()).await;
    let lobby = server.channel_get_by_id(1).await.unwrap();

    let perms = lobby.perm_list(false).await.unwrap();
    let keys: Vec<_> = perms.iter().map(|p| p.key.clone()).collect();
    assert_eq!(
        keys,
        [PermissionKey::Id(8471), PermissionKey::Id(8474), PermissionKey::Id(8473)]
    );
    assert!(perms[1].negated);
    assert!(perms[2].skip);

    lobby.perm_assign("i_channel_needed_join_power", 50).await.unwrap();
    assert!(log
        .lock()
        .iter()
        .any(|z| z == "channeladdperm cid=1 permsid=i_channel_needed_join_power permvalue=50"));
}

#[tokio::test]
async fn channel_nachricht_bewegt_query_client() {
    let (server, log) = alpha(&testconfig()).await;
    let dateien = server.channel_get_by_id(3).await.unwrap();
    dateien.message("hallo Welt").await.unwrap();

    let befehle = log.lock().clone();
    let n = befehle.len();
    assert_eq!(befehle[n - 2], "clientmove clid=6 cid=3 cpw=geheim");
    assert_eq!(befehle[n - 1], r"sendtextmessage targetmode=2 target=3 msg=hallo\sWelt");

    // Bereits im Channel: kein clientmove
    let lobby = server.channel_get_by_id(1).await.unwrap();
    lobby.message("hi").await.unwrap();
    assert_eq!(anzahl(&log, "clientmove"), 1);
}

#[tokio::test]
async fn channel_nachricht_nutzt_client_id_des_eigenen_servers() {
    // Die Query-Session hat auf jedem Server eine eigene Client-ID
    let mut gewaehlt = String::new();
    let (host, log) = host_mit(
        move |zeile| {
            let (verb, p) = zerlegen(zeile);
            match verb.as_str() {
                "use" => gewaehlt = p.get("sid").cloned().unwrap_or_default(),
                "serverinfo" => return Some(vec![format!("virtualserver_id={gewaehlt}"), ok()]),
                "whoami" if gewaehlt == "2" => {
                    return Some(vec![
                        "virtualserver_id=2 client_id=9 client_channel_id=1 \
                         client_nickname=serveradmin"
                            .into(),
                        ok(),
                    ])
                }
                _ => {}
            }
            instanz(zeile)
        },
        &testconfig(),
    )
    .await;

    let beta = host.server_get_by_id(2).await.unwrap();
    let dateien = beta.channel_get_by_id(3).await.unwrap();
    host.server_get_by_id(1).await.unwrap().info().await.unwrap();
    dateien.message("hi").await.unwrap();

    let befehle = log.lock().clone();
    let n = befehle.len();
    assert_eq!(
        &befehle[n - 4..],
        [
            "use sid=2",
            "whoami",
            "clientmove clid=9 cid=3 cpw=geheim",
            "sendtextmessage targetmode=2 target=3 msg=hi",
        ]
    );
}

#[tokio::test]
async fn client_aktionen() {
    let (server, log) = alpha(&testconfig()).await;
    let alice = server.client_get_by_id(5).await.unwrap();

    alice.poke("hey").await.unwrap();
    alice.message("privat").await.unwrap();
    assert_eq!(alice.ban(Some(600), Some("spam")).await.unwrap(), [7, 8]);
    alice.kick(KickReason::Server, None).await.unwrap();

    let befehle = log.lock().clone();
    assert!(befehle.contains(&"clientpoke clid=5 msg=hey".to_string()));
    assert!(befehle.contains(&"sendtextmessage targetmode=1 target=5 msg=privat".to_string()));
    assert!(befehle.contains(&"banclient clid=5 time=600 banreason=spam".to_string()));
    assert!(befehle.contains(&"clientkick clid=5 reasonid=5".to_string()));
}
