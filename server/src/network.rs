//! Server network layer: UDP transport and the serialized game loop

use crate::app::{load_records, ApiError, Application};
use crate::persistence::RetiredDog;
use crate::snapshot::SnapshotSaver;
use log::{debug, error, info, warn};
use model::protocol::{
    DogView, ErrorCode, LootView, MapSummary, MapView, Packet, PlayerView, RecordView,
    MAX_DATAGRAM_SIZE,
};
use model::GameSession;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    Shutdown,
}

/// Messages sent from the game loop and record readers to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
}

/// UDP front end owning the [`Application`].
///
/// Every request is handled on the task running [`Server::run`], one at a time, so
/// ticks, joins, moves and state reads never overlap. Leaderboard reads are the
/// exception: they only need the repository and run on their own task.
pub struct Server {
    socket: Arc<UdpSocket>,
    app: Application,
    tick_period: Option<Duration>,
    saver: Option<SnapshotSaver>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        app: Application,
        tick_period: Option<Duration>,
        saver: Option<SnapshotSaver>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        if tick_period.is_some_and(|period| period.is_zero()) {
            return Err("tick period must be non-zero".into());
        }
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            app,
            tick_period,
            saver,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Handle for asking a running server to stop.
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    pub fn app(&self) -> &Application {
        &self.app
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();
        let game_tx = self.game_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match Packet::decode(&buffer[..len]) {
                        Ok(packet) if !packet.is_request() => {
                            warn!("Client at {} sent a reply packet: {:?}", addr, packet);
                            let packet = Packet::error(ErrorCode::BadRequest, "Unexpected packet");
                            if game_tx.send(GameMessage::SendPacket { packet, addr }).is_err() {
                                break;
                            }
                        }
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("Failed to deserialize packet from {}: {}", addr, e);
                            let packet = Packet::error(ErrorCode::BadRequest, "Malformed packet");
                            if game_tx.send(GameMessage::SendPacket { packet, addr }).is_err() {
                                break;
                            }
                        }
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(GameMessage::SendPacket { packet, addr }) = game_rx.recv().await {
                if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                    error!("Failed to send packet to {}: {}", addr, e);
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = packet.encode()?;
        if data.len() > MAX_DATAGRAM_SIZE {
            return Err(format!("packet of {} bytes exceeds datagram size", data.len()).into());
        }
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Handles one request. Returns the reply, or `None` when the reply is sent
    /// later by a spawned task.
    async fn respond(&mut self, packet: Packet, addr: SocketAddr) -> Option<Packet> {
        let reply = match packet {
            Packet::ListMaps => Ok(Packet::Maps {
                maps: self
                    .app
                    .list_maps()
                    .iter()
                    .map(|map| MapSummary {
                        id: map.id().to_string(),
                        name: map.name().to_string(),
                    })
                    .collect(),
            }),

            Packet::GetMap { map_id } => self.app.find_map(&map_id).map(|map| Packet::MapInfo {
                map: MapView::from(map.as_ref()),
            }),

            Packet::Join { map_id, user_name } => {
                self.app
                    .join_game(&map_id, &user_name)
                    .map(|joined| {
                        info!("{} joined map {} from {}", user_name, map_id, addr);
                        Packet::Joined {
                            token: joined.token.to_string(),
                            player_id: joined.player_id,
                        }
                    })
            }

            Packet::ListPlayers { token } => self
                .app
                .list_players(&token)
                .map(players_packet),

            Packet::GetState { token } => self
                .app
                .game_state(&token)
                .map(state_packet),

            Packet::Move { token, direction } => self
                .app
                .action_move(&token, direction)
                .map(|_| Packet::Ack),

            Packet::Tick { delta_ms } => {
                if self.tick_period.is_some() {
                    Err(ApiError::BadRequest("Invalid endpoint".to_string()))
                } else {
                    self.advance(Duration::from_millis(delta_ms))
                        .await
                        .map(|_| Packet::Ack)
                }
            }

            Packet::Records { start, max_items } => {
                let repository = self.app.repository();
                let game_tx = self.game_tx.clone();
                tokio::spawn(async move {
                    let packet = match load_records(repository, start, max_items).await {
                        Ok(records) => fit_datagram(Packet::RecordList {
                            records: records.iter().map(record_view).collect(),
                        }),
                        Err(e) => Packet::error(e.code(), e.to_string()),
                    };
                    if let Err(e) = game_tx.send(GameMessage::SendPacket { packet, addr }) {
                        error!("Failed to queue records reply: {}", e);
                    }
                });
                return None;
            }

            other => {
                warn!("Unexpected packet type from client at {}: {:?}", addr, other);
                Err(ApiError::BadRequest("Unexpected packet".to_string()))
            }
        };

        match reply {
            Ok(packet) => Some(fit_datagram(packet)),
            Err(e) => {
                debug!("Request from {} failed: {}", addr, e);
                Some(Packet::error(e.code(), e.to_string()))
            }
        }
    }

    /// Ticks the application and lets the snapshot saver account for the time.
    async fn advance(&mut self, delta: Duration) -> Result<(), ApiError> {
        let result = self.app.tick(delta).await;
        if let Some(saver) = self.saver.as_mut() {
            if let Err(e) = saver.on_tick(delta, &self.app) {
                error!("Failed to save snapshot: {}", e);
            }
        }
        result.map(|_| ())
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();

        let mut ticker = self.tick_period.map(|period| {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            if let Some(reply) = self.respond(packet, addr).await {
                                self.send_packet(reply, addr);
                            }
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = next_tick(&mut ticker) => {
                    let now = Instant::now();
                    let delta = now.duration_since(last_tick);
                    last_tick = now;

                    if let Err(e) = self.advance(delta).await {
                        error!("Tick failed: {}", e);
                    }
                },
            }
        }

        if let Some(saver) = &self.saver {
            saver.save(&self.app)?;
            info!("Saved game state to {}", saver.path().display());
        }
        Ok(())
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Swaps a reply too large for one datagram for an `Internal` error, so the client
/// always hears back.
fn fit_datagram(packet: Packet) -> Packet {
    match packet.encode() {
        Ok(bytes) if bytes.len() <= MAX_DATAGRAM_SIZE => packet,
        Ok(bytes) => {
            warn!(
                "Reply of {} bytes exceeds the {} byte datagram limit",
                bytes.len(),
                MAX_DATAGRAM_SIZE
            );
            Packet::error(ErrorCode::Internal, "Reply does not fit in a datagram")
        }
        Err(e) => {
            error!("Failed to encode reply: {}", e);
            Packet::error(ErrorCode::Internal, "Failed to encode reply")
        }
    }
}

fn players_packet(session: &GameSession) -> Packet {
    Packet::Players {
        players: session
            .dogs()
            .values()
            .map(|dog| PlayerView {
                id: dog.id(),
                name: dog.name().to_string(),
            })
            .collect(),
    }
}

fn state_packet(session: &GameSession) -> Packet {
    Packet::State {
        players: session
            .dogs()
            .values()
            .map(|dog| DogView {
                id: dog.id(),
                position: dog.position(),
                velocity: dog.velocity(),
                direction: dog.direction(),
                bag: dog.bag().to_vec(),
                score: dog.score(),
            })
            .collect(),
        lost_objects: session
            .loot()
            .iter()
            .map(|loot| LootView {
                id: loot.id,
                item_type: loot.item_type,
                position: loot.position,
            })
            .collect(),
    }
}

fn record_view(record: &RetiredDog) -> RecordView {
    RecordView {
        name: record.name.clone(),
        score: record.score,
        play_time: record.play_time.as_secs_f64(),
    }
}
