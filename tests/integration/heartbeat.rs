//! Scenario 7 of §8: a client that stops reading and writing is evicted by
//! the heartbeat supervisor within `HEARTBEAT_INTERVAL + HEARTBEAT_TIMEOUT`
//! wall-clock seconds (15 + 45 = 60s here), announced to its last room.
//!
//! This test genuinely waits out real wall-clock time — there is no
//! shortcut without changing the production constants — so it is the
//! slowest test in the suite by a wide margin.

use crate::protocol::TestClient;
use crate::spawn_daemon;

#[tokio::test]
async fn an_idle_client_is_evicted_and_announced_within_the_heartbeat_bound() {
    let daemon = match spawn_daemon(None).await {
        Ok(d) => d,
        Err(e) => {
            eprintln!("SKIP: {e}");
            return;
        }
    };

    let (alice, _) = TestClient::connect(daemon.port, "Alice", "lobby", None).await.unwrap();
    let (mut bob, _) = TestClient::connect(daemon.port, "Bob", "lobby", None).await.unwrap();

    // Alice never reads or writes again after this point — the connection
    // stays open (no FIN), so only the heartbeat timeout can evict her.
    let left = bob.recv_system_matching("Alice left the chat.", 65_000).await;
    assert!(left.is_ok(), "Alice should be evicted within the heartbeat bound: {left:?}");

    drop(alice);
}
