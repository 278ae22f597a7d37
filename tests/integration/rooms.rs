//! Scenario 5 of §8: switching rooms is visible to both the old and new
//! room's occupants, and privately confirmed to the mover.

use crate::protocol::TestClient;
use crate::spawn_daemon;

#[tokio::test]
async fn switching_rooms_notifies_both_rooms_and_the_mover() {
    let daemon = match spawn_daemon(None).await {
        Ok(d) => d,
        Err(e) => {
            eprintln!("SKIP: {e}");
            return;
        }
    };

    let (mut alicia, _) = TestClient::connect(daemon.port, "Alicia", "lobby", None).await.unwrap();
    let (mut bob, _) = TestClient::connect(daemon.port, "Bob", "lobby", None).await.unwrap();
    alicia.recv_system_matching("Bob joined the chat.", 1_000).await.unwrap();

    let (mut carol, _) = TestClient::connect(daemon.port, "Carol", "devs", None).await.unwrap();

    alicia.send_switch_room("devs").await.unwrap();

    let left = bob.recv_system_matching("Alicia left the room.", 1_000).await.unwrap();
    assert_eq!(left["room"], "lobby");

    let joined = carol.recv_system_matching("Alicia joined the room.", 1_000).await.unwrap();
    assert_eq!(joined["room"], "devs");

    let confirmation = alicia.recv_system_matching("Joined room devs.", 1_000).await.unwrap();
    assert_eq!(confirmation["room"], "devs");
}
