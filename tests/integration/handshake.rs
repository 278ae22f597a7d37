//! Scenarios 1–2 of §8: handshake success and auth rejection.

use crate::protocol::TestClient;
use crate::spawn_daemon;

#[tokio::test]
async fn handshake_success_reports_defaults_and_no_join_announce() {
    let daemon = match spawn_daemon(None).await {
        Ok(d) => d,
        Err(e) => {
            eprintln!("SKIP: {e}");
            return;
        }
    };

    let (mut client, outcome) = TestClient::connect(daemon.port, "Alice", "Lobby", None)
        .await
        .expect("handshake should succeed with no tokens configured");

    assert_eq!(outcome.client_id, 1);
    assert_eq!(outcome.room, "lobby");
    assert_eq!(outcome.renderer, "rich");
    assert_eq!(outcome.buffer_size, 200);
    assert_eq!(outcome.heartbeat_interval, 15);

    // Sole occupant of the room: nothing else should arrive promptly.
    let nothing = client.recv_timeout(300).await;
    assert!(nothing.is_err(), "lone client should not receive a join announce");
}

#[tokio::test]
async fn handshake_without_a_valid_token_is_rejected() {
    let daemon = match spawn_daemon(Some("sesame")).await {
        Ok(d) => d,
        Err(e) => {
            eprintln!("SKIP: {e}");
            return;
        }
    };

    let err = TestClient::connect(daemon.port, "Alice", "lobby", None)
        .await
        .expect_err("handshake without a token must be rejected when tokens are configured");
    assert!(err.to_string().contains("unauthorized"), "unexpected rejection reason: {err}");

    let (_client, outcome) = TestClient::connect(daemon.port, "Alice", "lobby", Some("sesame"))
        .await
        .expect("the correct token should be accepted");
    assert_eq!(outcome.client_id, 1, "the rejected attempt must not have consumed an id");
}
