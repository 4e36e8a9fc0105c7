//! Integration-Tests fuer Host und Serverauswahl

mod common;

use common::{anzahl, host, host_mit, instanz, ok, testconfig, zerlegen};
use tsquery_client::{Command, Host, Node, QueryError, Target, Value};

#[tokio::test]
async fn server_identitaet_ueber_alle_zugriffswege() {
    let (host, _) = host(&testconfig()).await;

    let per_id = host.server_get_by_id(2).await.unwrap();
    let per_uid = host.server_get_by_uid("uidB").await.unwrap();
    let per_port = host.server_get_by_port(9988).await.unwrap();
    let per_name = host.server_get_by_name("Beta").await.unwrap();

    assert!(per_id.same_node(&per_uid));
    assert!(per_id.same_node(&per_port));
    assert!(per_id.same_node(&per_name));
    assert!(!per_id.same_node(&host.server_get_by_id(1).await.unwrap()));
}

#[tokio::test]
async fn serverliste_nach_reset_behaelt_identitaet() {
    let (host, log) = host(&testconfig()).await;

    let vorher = host.server_get_by_id(1).await.unwrap();
    host.server_list().await.unwrap();
    assert_eq!(anzahl(&log, "serverlist"), 1);

    host.server_list_reset();
    let nachher = host.server_get_by_id(1).await.unwrap();
    assert_eq!(anzahl(&log, "serverlist"), 2);
    assert!(vorher.same_node(&nachher));
    assert_eq!(
        nachher.property_str("virtualserver_name").as_deref(),
        Some("Alpha Server")
    );
}

#[tokio::test]
async fn unbekannter_server() {
    let (host, _) = host(&testconfig()).await;
    let err = host.server_get_by_id(42).await.unwrap_err();
    assert!(matches!(err, QueryError::NodeNotFound(_)), "{err:?}");
}

#[tokio::test]
async fn automatische_auswahl_und_cache() {
    let (host, log) = host(&testconfig()).await;
    let beta = host.server_get_by_id(2).await.unwrap();
    let alpha = host.server_get_by_id(1).await.unwrap();

    beta.channel_list().await.unwrap();
    beta.channel_list().await.unwrap();
    assert_eq!(anzahl(&log, "use"), 1);
    assert_eq!(anzahl(&log, "channellist"), 1);
    assert_eq!(host.server_selected_id().await, Some(2));

    // Serverwechsel verwirft die Kinderlisten
    alpha.channel_list().await.unwrap();
    beta.channel_list().await.unwrap();
    assert_eq!(anzahl(&log, "use"), 3);
    assert_eq!(anzahl(&log, "channellist"), 3);

    let befehle = log.lock().clone();
    let pos_use = befehle.iter().position(|z| z == "use sid=2").unwrap();
    let pos_liste = befehle.iter().position(|z| z.starts_with("channellist")).unwrap();
    assert!(pos_use < pos_liste);
}

#[tokio::test]
async fn manuelles_use_verwirft_auswahl() {
    let (host, log) = host(&testconfig()).await;
    let alpha = host.server_get_by_id(1).await.unwrap();
    alpha.channel_list().await.unwrap();
    assert_eq!(host.server_selected_id().await, Some(1));

    host.request(&Command::new("use").param("sid", 2u32))
        .await
        .unwrap();
    assert_eq!(host.server_selected_id().await, None);

    alpha.channel_list().await.unwrap();
    assert_eq!(anzahl(&log, "channellist"), 2);
    assert_eq!(host.server_selected_id().await, Some(1));
}

#[tokio::test]
async fn offline_server_als_virtual() {
    let mut config = testconfig();
    config.use_offline_as_virtual = true;
    let (host, log) = host(&config).await;

    host.server_select(1).await.unwrap();
    assert!(log.lock().iter().any(|z| z == "use sid=1 -virtual"));
}

#[tokio::test]
async fn nickname_nach_jedem_use() {
    let mut config = testconfig();
    config.nickname = Some("Mein Bot".into());
    let (host, log) = host(&config).await;

    host.server_select(1).await.unwrap();
    host.server_select(2).await.unwrap();

    let befehle = log.lock().clone();
    let updates: Vec<_> = befehle
        .iter()
        .filter(|z| z.starts_with("clientupdate"))
        .collect();
    assert_eq!(updates, [r"clientupdate client_nickname=Mein\sBot"; 2]);
}

#[tokio::test]
async fn login_aus_konfiguration() {
    let mut config = testconfig();
    config.username = Some("serveradmin".into());
    config.password = Some("g3h31m".into());
    let (_host, log) = host(&config).await;

    assert_eq!(
        log.lock()[0],
        "login client_login_name=serveradmin client_login_password=g3h31m"
    );
}

#[tokio::test]
async fn fehlgeschlagener_login() {
    let mut config = testconfig();
    config.username = Some("serveradmin".into());
    config.password = Some("falsch".into());
    let (verbindung, _) = common::verbindung(
        |_| Some(vec![common::fehler(520, "invalid loginname or password")]),
        &config,
    )
    .await;

    let err = Host::from_connection(verbindung, &config).await.unwrap_err();
    assert_eq!(err.code(), Some(520));
}

#[tokio::test]
async fn whoami_wird_zwischengespeichert() {
    let (host, log) = host(&testconfig()).await;

    assert_eq!(
        host.whoami_get("client_nickname").await.unwrap().to_string(),
        "serveradmin"
    );
    host.whoami().await.unwrap();
    assert_eq!(anzahl(&log, "whoami"), 1);

    host.whoami_reset();
    host.whoami().await.unwrap();
    assert_eq!(anzahl(&log, "whoami"), 2);

    let err = host.whoami_get("gibts_nicht").await.unwrap_err();
    assert!(matches!(err, QueryError::KeyNotFound(_)));
}

#[tokio::test]
async fn ziel_aus_konfiguration() {
    let mut config = testconfig();
    config.server_port = Some(9987);
    config.channel_name = Some("Lobby".into());
    let (host, _) = host(&config).await;

    match host.resolve_target(&config).await.unwrap() {
        Target::Channel(ch) => {
            assert_eq!(ch.id(), 1);
            assert_eq!(ch.server_id(), 1);
        }
        anderes => panic!("Channel erwartet, erhalten {anderes:?}"),
    }

    let mut config = testconfig();
    config.server_uid = Some("uidA".into());
    config.client_name = Some("Alice".into());
    match host.resolve_target(&config).await.unwrap() {
        Target::Client(c) => assert_eq!(c.id(), 5),
        anderes => panic!("Client erwartet, erhalten {anderes:?}"),
    }

    assert!(matches!(
        host.resolve_target(&testconfig()).await.unwrap(),
        Target::Host(_)
    ));
}

#[tokio::test]
async fn ereignisse_nicht_blockierend() {
    let mut config = testconfig();
    config.blocking = false;
    let (host, _) = host(&config).await;
    assert!(host.wait_for_event().await.unwrap().is_none());
}

#[tokio::test]
async fn ereignisse_blockierend() {
    let (host, _) = host_mit(
        |zeile| {
            if zeile.starts_with("servernotifyregister") {
                Some(vec![
                    ok(),
                    "notifycliententerview cfid=0 ctid=1 clid=9 client_nickname=Bob".into(),
                ])
            } else {
                instanz(zeile)
            }
        },
        &testconfig(),
    )
    .await;

    let server = host.server_get_by_id(1).await.unwrap();
    server.notify_register("server", None).await.unwrap();

    let event = host.wait_for_event().await.unwrap().unwrap();
    assert_eq!(event.name(), "notifycliententerview");
    assert_eq!(event.property("clid").and_then(|v| v.as_int()), Some(9));
}

#[tokio::test]
async fn quit_schliesst_verbindung() {
    let (host, log) = host(&testconfig()).await;
    host.quit().await.unwrap();
    assert!(host.connection().is_closed());
    assert_eq!(log.lock().last().map(String::as_str), Some("quit"));
}

#[tokio::test]
async fn gleichzeitige_server_behalten_ihre_auswahl() {
    let mut gewaehlt = String::new();
    let (host, log) = host_mit(
        move |zeile| {
            let (verb, p) = zerlegen(zeile);
            match verb.as_str() {
                "use" => {
                    gewaehlt = p.get("sid").cloned().unwrap_or_default();
                    instanz(zeile)
                }
                "serverinfo" => Some(vec![format!("virtualserver_id={gewaehlt}"), ok()]),
                _ => instanz(zeile),
            }
        },
        &testconfig(),
    )
    .await;
    let alpha = host.server_get_by_id(1).await.unwrap();
    let beta = host.server_get_by_id(2).await.unwrap();

    let (a1, b1, a2, b2) = tokio::join!(alpha.info(), beta.info(), alpha.info(), beta.info());
    for (props, sid) in [(a1, 1), (b1, 2), (a2, 1), (b2, 2)] {
        assert_eq!(props.unwrap()["virtualserver_id"], Value::Int(sid));
    }

    // Jedes serverinfo laeuft unter dem zuletzt gesendeten use
    let mut aktuell = None;
    let mut je_server = [0usize; 3];
    for zeile in log.lock().iter() {
        let (verb, p) = zerlegen(zeile);
        match verb.as_str() {
            "use" => aktuell = p.get("sid").and_then(|s| s.parse::<usize>().ok()),
            "serverinfo" => je_server[aktuell.expect("serverinfo ohne use")] += 1,
            _ => {}
        }
    }
    assert_eq!(je_server, [0, 2, 2]);
}
