//! Integrationstest: kompletter Server aus einer Konfiguration

use cipherchat_client::{ChatClient, ClientEvent};
use cipherchat_server::{config::ServerConfig, Server};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

const FRIST: Duration = Duration::from_secs(5);

fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.netzwerk.bind_adresse = "127.0.0.1".into();
    config.netzwerk.tcp_port = 0;
    config.observability.aktiviert = false;
    config
}

#[tokio::test]
async fn server_relayt_zwischen_zwei_clients() {
    let gebunden = Server::neu(test_config()).binden().await.unwrap();
    let addr = gebunden.tcp_addr();
    let health = gebunden.health().clone();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(gebunden.laufen(shutdown_rx));

    let mut alice = ChatClient::verbinden(addr).await.unwrap();
    alice.beitreten("alice").await.unwrap();
    let mut bob = ChatClient::verbinden(addr).await.unwrap();
    bob.beitreten("bob").await.unwrap();
    assert!(health.listener_bereit());

    let beigetreten = timeout(FRIST, alice.naechstes_ereignis()).await.unwrap().unwrap();
    assert!(matches!(beigetreten, ClientEvent::PeerBeigetreten(ref name) if name == "bob"));

    alice.aushandeln("bob").await.unwrap();
    let ereignis = timeout(FRIST, bob.naechstes_ereignis()).await.unwrap().unwrap();
    assert!(matches!(ereignis, ClientEvent::AushandlungEmpfangen { ref von } if von == "alice"));

    alice.nachricht_senden("bob", "hallo bob").await.unwrap();
    match timeout(FRIST, bob.naechstes_ereignis()).await.unwrap().unwrap() {
        ClientEvent::NachrichtEmpfangen { von, text } => {
            assert_eq!(von, "alice");
            assert_eq!(text, "hallo bob");
        }
        anderes => panic!("Erwartet Nachricht, erhalten {:?}", anderes),
    }

    shutdown_tx.send(true).unwrap();
    timeout(FRIST, handle).await.unwrap().unwrap().unwrap();
    assert!(!health.listener_bereit());
}

#[tokio::test]
async fn ungueltige_konfiguration_startet_nicht() {
    let mut config = test_config();
    config.verbindung.keepalive_sek = 0;
    assert!(Server::neu(config).binden().await.is_err());
}
