//! Integration tests for the Tidewatch server over real WebSocket
//! connections.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tidewatch::prelude::*;
use tidewatch_protocol::{
    AnswerKeyEntry, AnswerSubmission, ErrorKind, PlayerId, SessionCode, unix_millis,
};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn start_server_with(builder: TidewatchServerBuilder) -> String {
    let server = builder
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn start_server() -> String {
    start_server_with(TidewatchServer::builder()).await
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, msg: &ClientMessage) {
    let text = serde_json::to_string(msg).unwrap();
    ws.send(Message::Text(text.into())).await.unwrap();
}

async fn recv(ws: &mut ClientWs) -> Envelope<ServerMessage> {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("valid envelope");
        }
    }
}

async fn recv_msg(ws: &mut ClientWs) -> ServerMessage {
    recv(ws).await.message
}

/// Connects and consumes the `Welcome`.
async fn join_server(addr: &str) -> (ClientWs, PlayerId) {
    let mut ws = connect(addr).await;
    match recv_msg(&mut ws).await {
        ServerMessage::Welcome { player_id } => (ws, player_id),
        other => panic!("expected Welcome, got {other:?}"),
    }
}

/// Host creates a session, guest joins. Both rosters consumed.
async fn lobby(addr: &str) -> (SessionCode, ClientWs, ClientWs) {
    let (mut host, _) = join_server(addr).await;
    let (mut guest, _) = join_server(addr).await;

    send(&mut host, &ClientMessage::CreateSession { name: "Ana".into() }).await;
    let code = match recv_msg(&mut host).await {
        ServerMessage::SessionCreated { code, host: true } => code,
        other => panic!("expected SessionCreated, got {other:?}"),
    };
    assert!(matches!(recv_msg(&mut host).await, ServerMessage::Roster { .. }));

    send(
        &mut guest,
        &ClientMessage::JoinSession {
            code: code.as_str().into(),
            name: "Ben".into(),
        },
    )
    .await;
    for ws in [&mut host, &mut guest] {
        match recv_msg(ws).await {
            ServerMessage::Roster { players, .. } => assert_eq!(players.len(), 2),
            other => panic!("expected Roster, got {other:?}"),
        }
    }
    (code, host, guest)
}

// =========================================================================
// Connection
// =========================================================================

#[tokio::test]
async fn test_connect_receives_welcome_with_distinct_ids() {
    let addr = start_server().await;
    let (_a, id_a) = join_server(&addr).await;
    let (_b, id_b) = join_server(&addr).await;
    assert_ne!(id_a, id_b);
}

#[tokio::test]
async fn test_envelope_seq_counts_per_connection() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    assert_eq!(recv(&mut ws).await.seq, 1);

    send(&mut ws, &ClientMessage::Heartbeat { client_time: 5 }).await;
    let env = recv(&mut ws).await;
    assert_eq!(env.seq, 2);
    assert!(env.timestamp > 0);
    match env.message {
        ServerMessage::HeartbeatAck { client_time, .. } => assert_eq!(client_time, 5),
        other => panic!("expected HeartbeatAck, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_frame_gets_bad_request_and_connection_survives() {
    let addr = start_server().await;
    let (mut ws, _) = join_server(&addr).await;

    ws.send(Message::Text("{not json".into())).await.unwrap();
    match recv_msg(&mut ws).await {
        ServerMessage::Error { code, kind, .. } => {
            assert_eq!(code, 400);
            assert_eq!(kind, ErrorKind::BadRequest);
        }
        other => panic!("expected Error, got {other:?}"),
    }

    send(&mut ws, &ClientMessage::Heartbeat { client_time: 1 }).await;
    assert!(matches!(
        recv_msg(&mut ws).await,
        ServerMessage::HeartbeatAck { .. }
    ));
}

#[tokio::test]
async fn test_idle_connection_is_dropped() {
    let addr = start_server_with(
        TidewatchServer::builder().idle_timeout(Duration::from_millis(100)),
    )
    .await;
    let (mut ws, _) = join_server(&addr).await;

    let next = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("server should close the idle connection");
    assert!(matches!(next, None | Some(Ok(Message::Close(_))) | Some(Err(_))));
}

// =========================================================================
// Game flow
// =========================================================================

#[tokio::test]
async fn test_stage_flow_over_websocket() {
    let addr = start_server().await;
    let (_code, mut host, mut guest) = lobby(&addr).await;

    send(
        &mut host,
        &ClientMessage::StartSession {
            answers: vec![AnswerKeyEntry {
                question_id: "custom-1".into(),
                correct_answer: "Green".into(),
            }],
        },
    )
    .await;
    for ws in [&mut host, &mut guest] {
        assert_eq!(recv_msg(ws).await, ServerMessage::GameStarted { stage: 1 });
    }

    send(
        &mut guest,
        &ClientMessage::SubmitAnswer(AnswerSubmission {
            stage: 1,
            question_id: "custom-1".into(),
            answer: "Hawksbill".into(),
            presented_at: unix_millis(),
        }),
    )
    .await;
    match recv_msg(&mut guest).await {
        ServerMessage::AnswerResult(result) => {
            assert!(!result.correct);
            assert_eq!(result.base_points, -25);
            assert_eq!(result.canonical_answer, "Green");
        }
        other => panic!("expected AnswerResult, got {other:?}"),
    }
    for ws in [&mut host, &mut guest] {
        assert!(matches!(
            recv_msg(ws).await,
            ServerMessage::Leaderboard { .. }
        ));
    }

    send(&mut host, &ClientMessage::StageComplete { stage: 1 }).await;
    send(&mut guest, &ClientMessage::StageComplete { stage: 1 }).await;
    for ws in [&mut host, &mut guest] {
        match recv_msg(ws).await {
            ServerMessage::StageTransition {
                next_stage,
                stage_results,
                ..
            } => {
                assert_eq!(next_stage, 2);
                // Host scored 0, guest -25.
                assert_eq!(stage_results[1].stage_score, -25);
            }
            other => panic!("expected StageTransition, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_guest_cannot_start() {
    let addr = start_server().await;
    let (_code, _host, mut guest) = lobby(&addr).await;

    send(&mut guest, &ClientMessage::StartSession { answers: vec![] }).await;
    match recv_msg(&mut guest).await {
        ServerMessage::Error { code, kind, .. } => {
            assert_eq!(code, 403);
            assert_eq!(kind, ErrorKind::NotHost);
        }
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_disconnect_message_updates_roster() {
    let addr = start_server().await;
    let (_code, mut host, mut guest) = lobby(&addr).await;

    send(
        &mut host,
        &ClientMessage::Disconnect {
            reason: "done".into(),
        },
    )
    .await;

    match recv_msg(&mut guest).await {
        ServerMessage::Roster { host: h, players, .. } => {
            assert_eq!(players.len(), 1);
            assert_eq!(h, players[0].id);
        }
        other => panic!("expected Roster, got {other:?}"),
    }
}
