//! Scenarios 3–4 of §8: chat fan-out with sequence numbers, and rename
//! propagation.

use crate::protocol::TestClient;
use crate::spawn_daemon;

#[tokio::test]
async fn two_clients_exchange_chat_with_sequence_numbers() {
    let daemon = match spawn_daemon(None).await {
        Ok(d) => d,
        Err(e) => {
            eprintln!("SKIP: {e}");
            return;
        }
    };

    let (mut alice, _) = TestClient::connect(daemon.port, "Alice", "lobby", None).await.unwrap();
    let (mut bob, _) = TestClient::connect(daemon.port, "Bob", "lobby", None).await.unwrap();

    // Alice sees Bob's join announce before sending anything herself.
    let join = alice.recv_system_matching("Bob joined the chat.", 1_000).await.unwrap();
    assert_eq!(join["type"], "system");

    alice.send_chat("hi").await.unwrap();

    let bob_view = bob.recv().await.unwrap();
    assert_eq!(bob_view["type"], "chat");
    assert_eq!(bob_view["sender"], "Alice");
    assert_eq!(bob_view["message"], "hi");
    assert_eq!(bob_view["room"], "lobby");
    assert_eq!(bob_view["sequence"], 1);

    let alice_view = alice.recv().await.unwrap();
    assert_eq!(alice_view["sender"], "Alice");
    assert_eq!(alice_view["sequence"], 1);
}

#[tokio::test]
async fn rename_is_announced_and_reflected_in_the_next_chat() {
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

    alice.send_rename("Alicia").await.unwrap();
    let renamed = bob.recv_system_matching("Alice is now known as Alicia.", 1_000).await.unwrap();
    assert_eq!(renamed["type"], "system");

    alice.send_chat("hi again").await.unwrap();
    let chat = bob.recv().await.unwrap();
    assert_eq!(chat["sender"], "Alicia");
}

#[tokio::test]
async fn client_authored_system_message_is_rebroadcast_to_the_room_including_the_sender() {
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

    alice.send_system("server going down for maintenance").await.unwrap();

    // Rebroadcast with no exclude: both the sender and the rest of the room see it.
    let bob_view = bob.recv_system_matching("server going down for maintenance", 1_000).await.unwrap();
    assert_eq!(bob_view["type"], "system");
    let alice_view = alice.recv_system_matching("server going down for maintenance", 1_000).await.unwrap();
    assert_eq!(alice_view["type"], "system");
}
