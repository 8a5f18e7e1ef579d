use model::protocol::{Packet, MAX_DATAGRAM_SIZE};
use model::Direction;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

async fn request(
    socket: &UdpSocket,
    server_addr: SocketAddr,
    packet: &Packet,
) -> Result<Packet, Box<dyn std::error::Error>> {
    socket.send_to(&packet.encode()?, server_addr).await?;

    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf)).await??;
    Ok(Packet::decode(&buf[..len])?)
}

/// Joins the first map, walks in a square and prints the state after every step.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);

    let server_addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8080".to_string())
        .parse::<SocketAddr>()?;

    let map_id = match request(&socket, server_addr, &Packet::ListMaps).await? {
        Packet::Maps { maps } if !maps.is_empty() => {
            for map in &maps {
                println!("Map {}: {}", map.id, map.name);
            }
            maps[0].id.clone()
        }
        other => {
            println!("No maps available: {:?}", other);
            return Ok(());
        }
    };

    let join = Packet::Join {
        map_id: map_id.clone(),
        user_name: "test-client".to_string(),
    };
    let token = match request(&socket, server_addr, &join).await? {
        Packet::Joined { token, player_id } => {
            println!("Joined {} as player {}", map_id, player_id);
            token
        }
        other => {
            println!("Join failed: {:?}", other);
            return Ok(());
        }
    };

    let route = [
        Some(Direction::East),
        Some(Direction::South),
        Some(Direction::West),
        Some(Direction::North),
        None,
    ];
    for direction in route {
        let step = Packet::Move {
            token: token.clone(),
            direction,
        };
        println!("Moving {:?}: {:?}", direction, request(&socket, server_addr, &step).await?);

        sleep(Duration::from_secs(1)).await;

        match request(&socket, server_addr, &Packet::GetState { token: token.clone() }).await? {
            Packet::State {
                players,
                lost_objects,
            } => {
                for dog in players {
                    println!(
                        "  Dog {}: pos=({:.2}, {:.2}) dir={} bag={} score={}",
                        dog.id,
                        dog.position.x,
                        dog.position.y,
                        dog.direction,
                        dog.bag.len(),
                        dog.score
                    );
                }
                println!("  {} loot items on the map", lost_objects.len());
            }
            other => println!("Unexpected packet: {:?}", other),
        }
    }

    Ok(())
}
