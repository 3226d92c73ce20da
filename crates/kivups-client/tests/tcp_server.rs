//! End-to-end flow over real loopback TCP against a scripted server.

use std::time::Duration;

use kivups_client::prelude::*;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

const TS: &str = "2024-11-05 18:42:07.531902";
const PING_TS: &str = "2024-11-05 18:42:09.120000";

fn line(id: &str, ts: &str, params: &str) -> String {
    format!("KIVUPS{id}{ts}{{Alice123}}{params}\n")
}

#[tokio::test]
async fn test_login_ping_and_logout_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
    let addr = listener.local_addr().expect("local addr").to_string();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();

        let login = lines.next_line().await.unwrap().expect("login frame");
        assert!(login.starts_with("KIVUPS01"));
        assert!(login.ends_with("{Alice123}{}"));
        let games = line(
            "33",
            TS,
            r#"{"gameList":"[{"gameName":"G1","maxPlayers":"4","connectedPlayers":"2"}]"}"#,
        );
        write.write_all(games.as_bytes()).await.unwrap();

        // A ping and an update in one write.
        let mut burst = line("50", PING_TS, "{}");
        burst.push_str(&line("44", TS, r#"{"gameList":"[]"}"#));
        write.write_all(burst.as_bytes()).await.unwrap();

        let ping_ack = lines.next_line().await.unwrap().expect("ping ack");
        assert_eq!(ping_ack, format!("KIVUPS60{PING_TS}{{Alice123}}{{}}"));
        let update_ack = lines.next_line().await.unwrap().expect("update ack");
        assert!(update_ack.starts_with(&format!("KIVUPS60{TS}")));

        let logout = lines.next_line().await.unwrap().expect("logout frame");
        assert!(logout.starts_with("KIVUPS07"));
        write.write_all(line("30", TS, "{}").as_bytes()).await.unwrap();

        // The client closes after logging out.
        assert!(lines.next_line().await.unwrap().is_none());
    });

    let client = Dispatcher::builder()
        .read_timeout(Duration::from_secs(5))
        .poll_interval(Duration::from_secs(2))
        .build();

    let games = client
        .login(&addr, "Alice123")
        .await
        .expect("login")
        .connected()
        .expect("connected");
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].name, "G1");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut page = LobbyPage::new(tx);
    let mut updates = Vec::new();
    while updates.is_empty() {
        let outcome = client.receive_batch(&mut page).await.expect("batch");
        assert_eq!(outcome, Outcome::Connected(Flow::Continue));
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
    }
    assert_eq!(updates, [Update::GameList(vec![])]);

    let outcome = client.logout().await.expect("logout");
    assert_eq!(outcome, Outcome::Connected(()));
    assert!(!client.is_connected().await);

    server.await.expect("server task");
}

#[tokio::test]
async fn test_server_hangup_without_reconnect_target() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
    let addr = listener.local_addr().expect("local addr").to_string();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        lines.next_line().await.unwrap().expect("login frame");
        write
            .write_all(line("33", TS, r#"{"gameList":"[]"}"#).as_bytes())
            .await
            .unwrap();
        lines.next_line().await.unwrap().expect("join frame");
        // Hang up and stop listening, so reconnects are refused.
    });

    let client = Dispatcher::builder()
        .read_timeout(Duration::from_secs(5))
        .reconnect_attempts(2)
        .reconnect_backoff(Duration::from_millis(10))
        .build();
    client.login(&addr, "Alice123").await.expect("login");

    let join = client.join_game("G1");
    let (outcome, served) = tokio::join!(join, server);
    served.expect("server task");

    assert!(outcome.expect("no error").is_disconnected());
    assert_eq!(client.state(), SessionState::Start);
}
