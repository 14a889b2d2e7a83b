//! End-to-End-Tests: echter TCP-Server, echte Clients

use cipherchat_client::{ChatClient, ClientError, ClientEvent, Message};
use cipherchat_observability::CipherchatMetrics;
use cipherchat_protocol::control::{DirectMessageRequest, JoinRequest};
use cipherchat_protocol::{ControlMessage, ControlPayload, ErrorCode, FrameCodec};
use cipherchat_signaling::{SignalingConfig, SignalingServer, SignalingState};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_util::codec::Framed;

const FRIST: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    state: Arc<SignalingState>,
    shutdown_tx: watch::Sender<bool>,
}

async fn server_starten() -> TestServer {
    server_starten_mit(SignalingConfig::default()).await
}

async fn server_starten_mit(config: SignalingConfig) -> TestServer {
    let state = SignalingState::neu(config, CipherchatMetrics::neu().unwrap());
    let server = SignalingServer::binden(Arc::clone(&state), "127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = server.lokale_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(server.starten(shutdown_rx));
    TestServer {
        addr,
        state,
        shutdown_tx,
    }
}

async fn beigetreten(addr: SocketAddr, name: &str) -> ChatClient {
    let mut client = ChatClient::verbinden(addr).await.unwrap();
    client.beitreten(name).await.unwrap();
    client
}

async fn ereignis(client: &mut ChatClient) -> ClientEvent {
    timeout(FRIST, client.naechstes_ereignis())
        .await
        .expect("Ereignis kam nicht rechtzeitig")
        .unwrap()
}

/// Wartet bis das Verzeichnis die erwartete Groesse hat
async fn warten_auf_anzahl(state: &SignalingState, anzahl: usize) {
    timeout(FRIST, async {
        while state.directory.anzahl() != anzahl {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("Verzeichnis erreichte die erwartete Groesse nicht");
}

#[tokio::test]
async fn aushandlung_und_direktnachricht() {
    let server = server_starten().await;

    let mut alice = beigetreten(server.addr, "alice").await;
    let mut bob = beigetreten(server.addr, "bob").await;

    match ereignis(&mut alice).await {
        ClientEvent::PeerBeigetreten(name) => assert_eq!(name, "bob"),
        other => panic!("Erwartet PeerBeigetreten, erhalten {:?}", other),
    }

    // bob handelt mit alice aus, alice erhaelt genau eine Aushandlung
    bob.aushandeln("alice").await.unwrap();
    match ereignis(&mut alice).await {
        ClientEvent::AushandlungEmpfangen { von } => assert_eq!(von, "bob"),
        other => panic!("Erwartet AushandlungEmpfangen, erhalten {:?}", other),
    }

    let bei_alice = alice.peer("bob").unwrap().schluessel().unwrap().clone();
    let bei_bob = bob.peer("alice").unwrap().schluessel().unwrap().clone();
    assert_eq!(bei_alice, bei_bob);

    // Nachrichten in beide Richtungen
    bob.nachricht_senden("alice", "Hallo Alice").await.unwrap();
    match ereignis(&mut alice).await {
        ClientEvent::NachrichtEmpfangen { von, text } => {
            assert_eq!(von, "bob");
            assert_eq!(text, "Hallo Alice");
        }
        other => panic!("Erwartet NachrichtEmpfangen, erhalten {:?}", other),
    }

    alice.nachricht_senden("bob", "Hallo Bob").await.unwrap();
    match ereignis(&mut bob).await {
        ClientEvent::NachrichtEmpfangen { von, text } => {
            assert_eq!(von, "alice");
            assert_eq!(text, "Hallo Bob");
        }
        other => panic!("Erwartet NachrichtEmpfangen, erhalten {:?}", other),
    }

    assert_eq!(
        alice.peer("bob").unwrap().verlauf(),
        &[Message::empfangene("Hallo Alice"), Message::eigene("Hallo Bob")]
    );
    assert_eq!(server.state.metriken.negotiations_relayed_total.get(), 1);
    assert_eq!(server.state.metriken.messages_relayed_total.get(), 2);
}

#[tokio::test]
async fn unbekanntes_ziel_laesst_verbindung_nutzbar() {
    let server = server_starten().await;
    let mut alice = beigetreten(server.addr, "alice").await;

    let fehler = alice
        .anfrage(ControlPayload::DirectMessage(DirectMessageRequest {
            target_username: "bob".to_string(),
            envelope: vec![0u8; 48],
        }))
        .await
        .unwrap_err();
    assert_eq!(fehler.server_code(), Some(ErrorCode::TargetNotFound));

    // Verbindung bleibt nutzbar
    let users = alice.benutzer_auflisten().await.unwrap();
    assert_eq!(users.len(), 1);
    assert!(alice.ping().await.is_ok());
}

#[tokio::test]
async fn relay_ohne_beitritt() {
    let server = server_starten().await;
    let _alice = beigetreten(server.addr, "alice").await;
    let mut fremd = ChatClient::verbinden(server.addr).await.unwrap();

    let fehler = fremd
        .anfrage(ControlPayload::DirectMessage(DirectMessageRequest {
            target_username: "alice".to_string(),
            envelope: vec![0u8; 48],
        }))
        .await
        .unwrap_err();
    assert_eq!(fehler.server_code(), Some(ErrorCode::SourceNotFound));
}

#[tokio::test]
async fn doppelter_name() {
    let server = server_starten().await;
    let _alice = beigetreten(server.addr, "alice").await;

    let mut zweite = ChatClient::verbinden(server.addr).await.unwrap();
    let fehler = zweite.beitreten("alice").await.unwrap_err();
    assert_eq!(fehler.server_code(), Some(ErrorCode::UsernameTaken));

    // Ein anderer Name funktioniert auf derselben Verbindung
    zweite.beitreten("alice2").await.unwrap();
    let fehler = zweite.beitreten("alice3").await.unwrap_err();
    assert_eq!(fehler.server_code(), Some(ErrorCode::AlreadyJoined));
}

#[tokio::test]
async fn trennen_gibt_namen_frei() {
    let server = server_starten().await;
    let alice = beigetreten(server.addr, "alice").await;
    let mut bob = beigetreten(server.addr, "bob").await;

    alice.trennen().await.unwrap();

    match ereignis(&mut bob).await {
        ClientEvent::PeerVerlassen(name) => assert_eq!(name, "alice"),
        other => panic!("Erwartet PeerVerlassen, erhalten {:?}", other),
    }
    assert!(bob.peer("alice").is_none());
    assert!(server.state.directory.suchen("alice").is_err());

    // Nachricht an die getrennte alice scheitert
    let fehler = bob
        .anfrage(ControlPayload::DirectMessage(DirectMessageRequest {
            target_username: "alice".to_string(),
            envelope: vec![0u8; 48],
        }))
        .await
        .unwrap_err();
    assert_eq!(fehler.server_code(), Some(ErrorCode::TargetNotFound));

    // Neuer Beitritt als alice gelingt
    let _neue_alice = beigetreten(server.addr, "alice").await;
    match ereignis(&mut bob).await {
        ClientEvent::PeerBeigetreten(name) => assert_eq!(name, "alice"),
        other => panic!("Erwartet PeerBeigetreten, erhalten {:?}", other),
    }
    // Neue Sitzung, kein alter Schluessel
    assert!(!bob.peer("alice").unwrap().hat_schluessel());
}

#[tokio::test]
async fn veralteter_schluessel_nach_neuer_aushandlung() {
    let server = server_starten().await;
    let mut alice = beigetreten(server.addr, "alice").await;
    let mut bob = beigetreten(server.addr, "bob").await;
    ereignis(&mut alice).await; // bob beigetreten

    bob.aushandeln("alice").await.unwrap();
    ereignis(&mut alice).await;

    // alice handelt neu aus, beide Seiten nutzen danach den neuen Schluessel
    alice.aushandeln("bob").await.unwrap();
    ereignis(&mut bob).await;

    bob.nachricht_senden("alice", "nach Neuaushandlung").await.unwrap();
    match ereignis(&mut alice).await {
        ClientEvent::NachrichtEmpfangen { text, .. } => assert_eq!(text, "nach Neuaushandlung"),
        other => panic!("Erwartet NachrichtEmpfangen, erhalten {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn gleichzeitiger_beitritt_ueber_tcp() {
    let server = server_starten().await;

    let mut aufgaben = Vec::new();
    for _ in 0..16 {
        let addr = server.addr;
        aufgaben.push(tokio::spawn(async move {
            let mut client = ChatClient::verbinden(addr).await.unwrap();
            let ergebnis = client.beitreten("alice").await;
            (client, ergebnis)
        }));
    }

    let mut gewinner = 0;
    let mut clients = Vec::new();
    for aufgabe in aufgaben {
        let (client, ergebnis) = aufgabe.await.unwrap();
        match ergebnis {
            Ok(_) => gewinner += 1,
            Err(ClientError::Server { code, .. }) => assert_eq!(code, ErrorCode::UsernameTaken),
            Err(e) => panic!("Unerwarteter Fehler: {e}"),
        }
        clients.push(client);
    }

    assert_eq!(gewinner, 1);
    assert_eq!(server.state.directory.anzahl(), 1);
}

#[tokio::test]
async fn verbindungsabbruch_raeumt_verzeichnis_auf() {
    let server = server_starten().await;
    {
        let _alice = beigetreten(server.addr, "alice").await;
        warten_auf_anzahl(&server.state, 1).await;
    }
    // Drop ohne trennen() schliesst den Socket ebenfalls
    warten_auf_anzahl(&server.state, 0).await;
    assert_eq!(server.state.metriken.joined_users.get(), 0);
}

#[tokio::test]
async fn verbindungslimit() {
    let config = SignalingConfig {
        max_verbindungen: 1,
        ..SignalingConfig::default()
    };
    let server = server_starten_mit(config).await;

    let mut erste = ChatClient::verbinden(server.addr).await.unwrap();
    erste.beitreten("alice").await.unwrap();

    let mut zweite = ChatClient::verbinden(server.addr).await.unwrap();
    let ergebnis = timeout(FRIST, zweite.beitreten("bob")).await.unwrap();
    assert!(matches!(
        ergebnis,
        Err(ClientError::Getrennt) | Err(ClientError::Wire(_))
    ));
}

#[tokio::test]
async fn shutdown_trennt_clients() {
    let server = server_starten().await;
    let mut alice = beigetreten(server.addr, "alice").await;

    server.shutdown_tx.send(true).unwrap();

    let ergebnis = timeout(FRIST, alice.naechstes_ereignis()).await.unwrap();
    assert!(ergebnis.is_err());
    warten_auf_anzahl(&server.state, 0).await;
}

#[tokio::test]
async fn stummer_client_wird_nach_timeout_getrennt() {
    let config = SignalingConfig {
        keepalive_sek: 1,
        verbindungs_timeout_sek: 1,
        ..SignalingConfig::default()
    };
    let server = server_starten_mit(config).await;

    // Roher Socket: beantwortet keine Pings
    let _roh = tokio::net::TcpStream::connect(server.addr).await.unwrap();

    timeout(FRIST, async {
        while server.state.broadcaster.verbindung_anzahl() != 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        while server.state.broadcaster.verbindung_anzahl() != 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("stumme Verbindung wurde nicht getrennt");
}

#[tokio::test]
async fn zu_grosses_ereignis_trennt_den_empfaenger_nicht() {
    let config = SignalingConfig {
        max_frame_groesse: 4096,
        ..SignalingConfig::default()
    };
    let server = server_starten_mit(config).await;
    let mut alice = beigetreten(server.addr, "alice").await;
    let mut bob = beigetreten(server.addr, "bob_der_absender").await;

    // Die Anfrage passt in 4096 Bytes, das Ereignis fuer alice nicht
    let fehler = bob
        .anfrage(ControlPayload::DirectMessage(DirectMessageRequest {
            target_username: "alice".to_string(),
            envelope: vec![0x5A; 2990],
        }))
        .await
        .unwrap_err();
    assert_eq!(fehler.server_code(), Some(ErrorCode::PayloadTooLarge));

    // Ein ueberlanger Name wird abgelehnt, niemand fliegt aus dem Verzeichnis
    let mut mallory = ChatClient::verbinden(server.addr).await.unwrap();
    let fehler = mallory.beitreten(&"m".repeat(3980)).await.unwrap_err();
    assert_eq!(fehler.server_code(), Some(ErrorCode::InvalidRequest));

    assert_eq!(server.state.directory.anzahl(), 2);
    assert!(server.state.directory.suchen("alice").is_ok());
    alice.ping().await.unwrap();
    bob.ping().await.unwrap();
    let fehlschlaege = server
        .state
        .metriken
        .relay_failures_total
        .with_label_values(&["payload_too_large"])
        .get();
    assert_eq!(fehlschlaege, 1);
}

#[tokio::test]
async fn client_der_nicht_mehr_liest_wird_getrennt() {
    let config = SignalingConfig {
        keepalive_sek: 1,
        verbindungs_timeout_sek: 2,
        ..SignalingConfig::default()
    };
    let server = server_starten_mit(config).await;

    // Tritt bei und liest danach nichts mehr
    let stream = tokio::net::TcpStream::connect(server.addr).await.unwrap();
    let mut stumm = Framed::new(stream, FrameCodec::new());
    stumm
        .send(ControlMessage::new(
            1,
            ControlPayload::Join(JoinRequest {
                username: "stumm".to_string(),
                public_key: vec![1u8; 32],
            }),
        ))
        .await
        .unwrap();
    let antwort = timeout(FRIST, stumm.next()).await.unwrap().unwrap().unwrap();
    assert!(matches!(antwort.payload, ControlPayload::UserList(_)));

    let mut bob = beigetreten(server.addr, "bob").await;
    for _ in 0..40 {
        // Schlaegt fehl sobald stumm entfernt wurde
        let _ = bob
            .anfrage(ControlPayload::DirectMessage(DirectMessageRequest {
                target_username: "stumm".to_string(),
                envelope: vec![0xEE; 700 * 1024],
            }))
            .await;
    }

    // bob bleibt durch Pings aktiv, nur stumm darf fliegen
    timeout(Duration::from_secs(15), async {
        while server.state.directory.suchen("stumm").is_ok() {
            bob.ping().await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    })
    .await
    .expect("blockierter Client wurde nicht getrennt");

    assert!(server.state.directory.suchen("bob").is_ok());
    drop(stumm);
}
