//! Scenario 6 of §8: the 13th chat frame within the rate window is
//! throttled with a sender-only warning; the other 12 still reach everyone.

use crate::protocol::TestClient;
use crate::spawn_daemon;

#[tokio::test]
async fn thirteenth_rapid_chat_is_throttled_to_sender_only() {
    let daemon = match spawn_daemon(None).await {
        Ok(d) => d,
        Err(e) => {
            eprintln!("SKIP: {e}");
            return;
        }
    };

    let (mut alice, _) = TestClient::connect(daemon.port, "Alice", "lobby", None).await.unwrap();
    let (mut bob, _) = TestClient::connect(daemon.port, "Bob", "lobby", None).await.unwrap();
    alice.recv_system_matching("Bob joined the chat.", 1_000).await.unwrap();

    for i in 0..13 {
        alice.send_chat(&format!("msg {i}")).await.unwrap();
    }

    for expected_sequence in 1..=12 {
        let payload = bob.recv().await.unwrap();
        assert_eq!(payload["type"], "chat");
        assert_eq!(payload["sequence"], expected_sequence);
    }
    // Bob never sees the 13th — only a rate-limit warning reaches Alice.
    assert!(bob.recv_timeout(500).await.is_err(), "observer should not see the throttled 13th message");

    let mut saw_warning = false;
    for _ in 0..12 {
        let payload = alice.recv().await.unwrap();
        if payload["type"] == "system" {
            assert_eq!(payload["message"], "Slow down \u{2013} message rate limit reached.");
            saw_warning = true;
            break;
        }
    }
    assert!(saw_warning, "sender should receive the rate-limit warning");
}
