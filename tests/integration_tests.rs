//! Integration tests for the game server
//!
//! These tests drive the model and server crates together, from configuration
//! loading through the UDP boundary.

use model::protocol::{ErrorCode, Packet, MAX_DATAGRAM_SIZE};
use model::{Direction, MapId, Position};
use server::app::Application;
use server::config::parse_game;
use server::network::{Server, ServerMessage};
use server::persistence::InMemoryRepository;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

const CONFIG: &str = r#"{
    "defaultDogSpeed": 1.0,
    "defaultBagCapacity": 2,
    "dogRetirementTime": 10.0,
    "lootGeneratorConfig": { "period": 5.0, "probability": 0.0 },
    "maps": [{
        "id": "map1",
        "name": "Map 1",
        "lootTypes": [{ "name": "key", "value": 10 }, { "name": "wallet", "value": 30 }],
        "roads": [{ "x0": 0, "y0": 0, "x1": 10 }, { "x0": 10, "y0": 0, "y1": 10 }],
        "buildings": [{ "x": 2, "y": 2, "w": 5, "h": 5 }],
        "offices": [{ "id": "o0", "x": 6, "y": 0, "offsetX": 0, "offsetY": 0 }]
    }]
}"#;

fn new_app() -> Application {
    let game = parse_game(CONFIG, false).unwrap();
    Application::new(game, Arc::new(InMemoryRepository::new()))
}

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    async fn exchange(socket: &UdpSocket, server: std::net::SocketAddr, packet: Packet) -> Packet {
        socket.send_to(&packet.encode().unwrap(), server).await.unwrap();
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, _) = timeout(Duration::from_secs(5), socket.recv_from(&mut buf))
            .await
            .expect("server did not answer")
            .unwrap();
        Packet::decode(&buf[..len]).unwrap()
    }

    /// Tests a full player session over real UDP sockets
    #[tokio::test]
    async fn join_move_tick_over_udp() {
        let mut server = Server::new("127.0.0.1:0", new_app(), None, None)
            .await
            .unwrap();
        let server_addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let handle = tokio::spawn(async move { server.run().await.map_err(|e| e.to_string()) });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let token = match exchange(
            &client,
            server_addr,
            Packet::Join {
                map_id: "map1".to_string(),
                user_name: "Rex".to_string(),
            },
        )
        .await
        {
            Packet::Joined { token, player_id } => {
                assert_eq!(player_id, 0);
                assert_eq!(token.len(), 32);
                token
            }
            other => panic!("Unexpected packet: {:?}", other),
        };

        let ack = exchange(
            &client,
            server_addr,
            Packet::Move {
                token: token.clone(),
                direction: Some(Direction::East),
            },
        )
        .await;
        assert_eq!(ack, Packet::Ack);

        let ack = exchange(&client, server_addr, Packet::Tick { delta_ms: 3000 }).await;
        assert_eq!(ack, Packet::Ack);

        match exchange(&client, server_addr, Packet::GetState { token }).await {
            Packet::State { players, .. } => {
                assert_eq!(players.len(), 1);
                assert_eq!(players[0].position, Position::new(3.0, 0.0));
            }
            other => panic!("Unexpected packet: {:?}", other),
        }

        shutdown.send(ServerMessage::Shutdown).unwrap();
        handle.await.unwrap().unwrap();
    }

    /// Tests that a datagram built with plain bincode is understood by the server
    #[tokio::test]
    async fn raw_bincode_datagram_accepted() {
        let mut server = Server::new("127.0.0.1:0", new_app(), None, None)
            .await
            .unwrap();
        let server_addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let handle = tokio::spawn(async move { server.run().await.map_err(|e| e.to_string()) });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let request = bincode::serialize(&Packet::GetMap {
            map_id: "map1".to_string(),
        })
        .unwrap();
        client.send_to(&request, server_addr).await.unwrap();

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, _) = timeout(Duration::from_secs(5), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        match bincode::deserialize::<Packet>(&buf[..len]).unwrap() {
            Packet::MapInfo { map } => assert_eq!(map.id, "map1"),
            other => panic!("Unexpected packet: {:?}", other),
        }

        shutdown.send(ServerMessage::Shutdown).unwrap();
        handle.await.unwrap().unwrap();
    }

    /// Tests that garbage datagrams get an error instead of silence
    #[tokio::test]
    async fn malformed_datagram_reports_bad_request() {
        let mut server = Server::new("127.0.0.1:0", new_app(), None, None)
            .await
            .unwrap();
        let server_addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let handle = tokio::spawn(async move { server.run().await.map_err(|e| e.to_string()) });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(&[0xff; 7], server_addr).await.unwrap();

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, _) = timeout(Duration::from_secs(5), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            Packet::decode(&buf[..len]).unwrap(),
            Packet::Error {
                code: ErrorCode::BadRequest,
                ..
            }
        ));

        shutdown.send(ServerMessage::Shutdown).unwrap();
        handle.await.unwrap().unwrap();
    }
}

/// GAME LOGIC TESTS
mod game_logic_tests {
    use super::*;
    use model::LootItem;
    use server::snapshot::{load_from_file, SnapshotSaver};

    /// Tests pickup, deposit and retirement ending up on the leaderboard
    #[tokio::test]
    async fn collect_deposit_and_retire() {
        let mut app = new_app();
        let joined = app.join_game("map1", "Rex").unwrap();
        let token = joined.token.to_string();

        app.game_mut()
            .session_mut(&MapId::new("map1"))
            .unwrap()
            .restore_loot(LootItem {
                id: 0,
                item_type: 1,
                position: Position::new(2.0, 0.0),
            })
            .unwrap();

        app.action_move(&token, Some(Direction::East)).unwrap();
        app.tick(Duration::from_secs(3)).await.unwrap();
        {
            let session = app.game_state(&token).unwrap();
            let dog = session.dog(joined.player_id).unwrap();
            assert_eq!(dog.bag().len(), 1);
            assert!(session.loot().is_empty());
        }

        app.tick(Duration::from_secs(4)).await.unwrap();
        {
            let dog = app.game_state(&token).unwrap().dog(joined.player_id).unwrap();
            assert_eq!(dog.score(), 30);
            assert!(dog.bag().is_empty());
        }

        app.action_move(&token, None).unwrap();
        let retired = app.tick(Duration::from_secs(10)).await.unwrap();
        assert_eq!(retired.len(), 1);
        assert!(app.game_state(&token).is_err());

        let records = app.records(None, None).await.unwrap();
        assert!(app.records(Some(1), None).await.unwrap().is_empty());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Rex");
        assert_eq!(records[0].score, 30);
        assert_eq!(records[0].play_time, Duration::from_secs(17));
    }

    /// Tests that the loot generator keeps one item per dog at most
    #[tokio::test]
    async fn loot_never_exceeds_dogs() {
        let json = CONFIG.replace("\"probability\": 0.0", "\"probability\": 1.0");
        let mut app = Application::new(
            parse_game(&json, true).unwrap(),
            Arc::new(InMemoryRepository::new()),
        );
        let token = app.join_game("map1", "a").unwrap().token.to_string();
        app.join_game("map1", "b").unwrap();

        for _ in 0..20 {
            app.tick(Duration::from_millis(100)).await.unwrap();
            let session = app.game_state(&token).unwrap();
            assert!(session.loot().len() <= session.dogs().len());
        }
    }

    /// Tests saving on a period and restoring into a fresh application
    #[tokio::test]
    async fn snapshot_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.bin");

        let mut app = new_app();
        let joined = app.join_game("map1", "Rex").unwrap();
        app.action_move(joined.token.as_str(), Some(Direction::East))
            .unwrap();
        app.tick(Duration::from_millis(1500)).await.unwrap();

        let mut saver = SnapshotSaver::new(path.clone(), Some(Duration::from_secs(1)));
        assert!(saver.on_tick(Duration::from_millis(1500), &app).unwrap());

        let mut restarted = new_app();
        load_from_file(&path)
            .unwrap()
            .unwrap()
            .restore(&mut restarted)
            .unwrap();

        let session = restarted.game_state(joined.token.as_str()).unwrap();
        let dog = session.dog(joined.player_id).unwrap();
        assert_eq!(dog.position(), Position::new(1.5, 0.0));
        assert_eq!(dog.direction(), Direction::East);
        assert!(dog.is_stopped());
    }
}

/// Tests leaderboard paging outside a runtime-driven test
#[test]
fn records_paging_blocking() {
    let mut app = new_app();
    for name in ["a", "b", "c"] {
        app.join_game("map1", name).unwrap();
    }
    let retired = tokio_test::block_on(app.tick(Duration::from_secs(10))).unwrap();
    assert_eq!(retired.len(), 3);

    let page = tokio_test::block_on(app.records(Some(1), Some(1))).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].name, "b");
}

/// STRESS TESTS
mod stress_tests {
    use super::*;

    /// Tests many players joining and moving without corrupting the session
    #[tokio::test]
    async fn many_players_stay_on_roads() {
        let mut app = new_app();
        let directions = [Direction::North, Direction::South, Direction::West, Direction::East];
        let mut tokens = Vec::new();
        for i in 0..200 {
            let token = app.join_game("map1", &format!("dog{}", i)).unwrap().token;
            app.action_move(token.as_str(), Some(directions[i % directions.len()]))
                .unwrap();
            tokens.push(token);
        }

        for _ in 0..40 {
            app.tick(Duration::from_millis(200)).await.unwrap();
        }

        let session = app.game_state(tokens[0].as_str()).unwrap();
        assert_eq!(session.dogs().len(), 200);
        for dog in session.dogs().values() {
            let pos = dog.position();
            let on_horizontal = (-0.4..=10.4).contains(&pos.x) && (-0.4..=0.4).contains(&pos.y);
            let on_vertical = (9.6..=10.4).contains(&pos.x) && (-0.4..=10.4).contains(&pos.y);
            assert!(on_horizontal || on_vertical, "dog left the roads at {:?}", pos);
        }
    }
}
