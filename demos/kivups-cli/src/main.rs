//! Minimal terminal front-end: logs in, watches the lobby for a while and
//! logs out again.
//!
//! ```text
//! kivups-cli [NICKNAME] [ADDRESS]
//! RUST_LOG=kivups_client=debug kivups-cli Alice123 127.0.0.1:10000
//! ```

use std::time::Duration;

use kivups_client::prelude::*;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// How long the lobby is watched before logging out.
const WATCH_FOR: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let nickname = args.next().unwrap_or_else(|| "Player1".to_string());
    let address = args.next().unwrap_or_else(|| DEFAULT_SERVER_ADDR.to_string());

    let client = Dispatcher::builder().build();

    match client.login(&address, &nickname).await? {
        Outcome::Connected(games) => {
            println!("{}", serde_json::to_string_pretty(&games)?);
        }
        Outcome::Resumed(resume) => {
            println!("resumed: {}", serde_json::to_string(&resume)?);
        }
        Outcome::Disconnected => {
            eprintln!("could not reach {address}");
            return Ok(());
        }
    }

    if client.state() == SessionState::Lobby {
        let (tx, mut rx) = mpsc::unbounded_channel();
        client.listen(LobbyPage::new(tx)).await;

        let deadline = tokio::time::sleep(WATCH_FOR);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                update = rx.recv() => match update {
                    Some(Update::GameList(games)) => {
                        println!("{}", serde_json::to_string(&games)?);
                    }
                    Some(other) => println!("{other:?}"),
                    None => break,
                },
                () = &mut deadline => break,
            }
        }

        if let Some(exit) = client.stop_listening().await {
            tracing::info!(?exit, "lobby listener finished");
        }
    }

    if client.is_connected().await && client.state() == SessionState::Lobby {
        client.logout().await?;
    } else {
        client.close().await;
    }
    Ok(())
}
