//! End-to-end checks of the wire format: raw server lines in, typed
//! collections out, and client frames exactly as the server expects them.

use kivups_protocol::model::{self, Collection};
use kivups_protocol::{
    Codec, CommandId, CubeRoll, GameSummary, Message, Nickname, ProtocolError, TextCodec,
    Timestamp,
};

const TS: &str = "2024-11-05 18:42:07.531902";

fn line(id: &str, nick: &str, params: &str) -> Vec<u8> {
    format!("KIVUPS{id}{TS}{{{nick}}}{params}\n").into_bytes()
}

#[test]
fn test_login_answer_converts_to_game_summaries() {
    let bytes = line(
        "33",
        "Alice123",
        r#"{"gameList":"[{"gameName":"G1","maxPlayers":"4","connectedPlayers":"2"};{"gameName":"G2","maxPlayers":"2","connectedPlayers":"0"}]"}"#,
    );
    let msg = TextCodec.decode(&bytes).unwrap();
    let games = match model::convert(&msg).unwrap() {
        Some(Collection::Games(games)) => games,
        other => panic!("expected games, got {other:?}"),
    };
    assert_eq!(
        games,
        vec![
            GameSummary {
                name: "G1".into(),
                connected_players: 2,
                max_players: 4,
            },
            GameSummary {
                name: "G2".into(),
                connected_players: 0,
                max_players: 2,
            },
        ]
    );
}

#[test]
fn test_select_cubes_answer_converts_to_rolls() {
    let bytes = line(
        "34",
        "Alice123",
        r#"{"cubeValues":"[{"value":"1"};{"value":"5"}]"}"#,
    );
    let msg = TextCodec.decode(&bytes).unwrap();
    let Some(Collection::Cubes(cubes)) = model::convert(&msg).unwrap() else {
        panic!("expected cubes");
    };
    let values: Vec<u8> = cubes.into_iter().map(CubeRoll::value).collect();
    assert_eq!(values, [1, 5]);
}

#[test]
fn test_list_with_wrong_field_names_fails_conversion() {
    // Decodes fine (names of the top-level parameter match), but the
    // records do not carry the game list fields.
    let bytes = line("44", "Alice123", r#"{"gameList":"[{"name":"G1"}]"}"#);
    let msg = TextCodec.decode(&bytes).unwrap();
    assert!(matches!(
        model::convert(&msg),
        Err(ProtocolError::InvalidField { .. })
    ));
}

#[test]
fn test_ack_echoes_server_timestamp() {
    let ping = TextCodec.decode(&line("50", "Alice123", "{}")).unwrap();
    let ack = Message::with_timestamp(
        CommandId::RESPONSE_CLIENT_SUCCESS,
        ping.nickname.clone(),
        ping.timestamp.clone(),
        vec![],
    );
    let bytes = TextCodec.encode(&ack).unwrap();
    assert_eq!(bytes, line("60", "Alice123", "{}"));
}

#[test]
fn test_selected_cubes_frame_matches_server_format() {
    let cubes = [CubeRoll::new(1).unwrap(), CubeRoll::new(1).unwrap()];
    let msg = Message::with_timestamp(
        CommandId::CLIENT_SELECTED_CUBES,
        Nickname::parse("Alice123").unwrap(),
        Timestamp::parse(TS).unwrap(),
        vec![model::to_param("cubeValues", &cubes)],
    );
    let bytes = TextCodec.encode(&msg).unwrap();
    assert_eq!(
        bytes,
        line("61", "Alice123", r#"{"cubeValues":"[{"value":"1"};{"value":"1"}]"}"#)
    );
}
