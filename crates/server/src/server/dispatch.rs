//! Dispatcher actor.
//!
//! One task owns every room, the room directory and the connection registry.
//! Transports feed it [`Command`]s over a channel; the AI and sweep timers are
//! selected in the same loop, so no two mutations ever interleave.

use crate::config::Config;
use crate::connection::{ConnectionId, Outbound};
use crate::directory::RoomDirectory;
use crate::error::RoomError;
use crate::map::{MapGenerator, NoiseMapGenerator, RoomMap, SeedOnly};
use crate::registry::{Binding, ConnectionRegistry};
use protocol::{
    ClientMessage, ConfigPatch, GameFrame, Inbound, RoomConfig, ServerMessage, classify,
};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

const MAX_NAME_LEN: usize = 24;

/// Input to the dispatcher.
#[derive(Debug)]
pub enum Command {
    /// A transport connection opened.
    Connect {
        conn: ConnectionId,
        outbound: Outbound,
    },
    /// A text frame arrived.
    Frame { conn: ConnectionId, text: String },
    /// The transport connection closed.
    Disconnect { conn: ConnectionId },
}

/// Cloneable front door to a running dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    tx: mpsc::UnboundedSender<Command>,
    next_conn: Arc<AtomicU64>,
}

impl DispatcherHandle {
    pub fn new(tx: mpsc::UnboundedSender<Command>) -> Self {
        Self {
            tx,
            next_conn: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Register a new connection. Frames for it arrive on the returned receiver.
    pub fn open(&self) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let conn = self.next_conn.fetch_add(1, Ordering::Relaxed);
        let (outbound, rx) = Outbound::channel(conn);
        self.send(Command::Connect { conn, outbound });
        (conn, rx)
    }

    pub fn frame(&self, conn: ConnectionId, text: impl Into<String>) -> bool {
        self.send(Command::Frame {
            conn,
            text: text.into(),
        })
    }

    pub fn close(&self, conn: ConnectionId) {
        self.send(Command::Disconnect { conn });
    }

    fn send(&self, command: Command) -> bool {
        if self.tx.send(command).is_err() {
            warn!("Dispatcher is gone; dropping command");
            return false;
        }
        true
    }
}

/// Dispatcher tuning taken from [`Config`].
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub room_defaults: RoomConfig,
    pub map_width: u32,
    pub map_height: u32,
    pub ai_tick: Duration,
    pub sweep_interval: Duration,
    pub room_timeout: Duration,
}

impl From<&Config> for DispatchSettings {
    fn from(config: &Config) -> Self {
        Self {
            room_defaults: config.rooms.room_config(),
            map_width: config.map.width,
            map_height: config.map.height,
            ai_tick: config.server.ai_tick(),
            sweep_interval: config.server.sweep_interval(),
            room_timeout: config.server.room_timeout(),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Owner of all room state.
pub struct Dispatcher {
    directory: RoomDirectory,
    registry: ConnectionRegistry,
    connections: HashMap<ConnectionId, Outbound>,
    generator: Box<dyn MapGenerator>,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(config: &Config) -> Self {
        let generator: Box<dyn MapGenerator> = if config.map.generate {
            Box::new(NoiseMapGenerator::default())
        } else {
            Box::new(SeedOnly)
        };
        Self::with_generator(DispatchSettings::from(config), generator)
    }

    pub fn with_generator(settings: DispatchSettings, generator: Box<dyn MapGenerator>) -> Self {
        Self {
            directory: RoomDirectory::new(settings.room_timeout),
            registry: ConnectionRegistry::new(),
            connections: HashMap::new(),
            generator,
            settings,
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn directory(&self) -> &RoomDirectory {
        &self.directory
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn handle(&mut self, command: Command, now: Instant) {
        match command {
            Command::Connect { conn, outbound } => {
                debug!("Connection {} registered", conn);
                self.connections.insert(conn, outbound);
            }
            Command::Frame { conn, text } => self.handle_frame(conn, &text, now),
            Command::Disconnect { conn } => self.disconnect(conn, now),
        }
    }

    /// Classify one inbound frame and apply it.
    pub fn handle_frame(&mut self, conn: ConnectionId, text: &str, now: Instant) {
        if !self.connections.contains_key(&conn) {
            debug!("Dropping frame from unknown connection {}", conn);
            return;
        }
        let result = match classify(text) {
            Inbound::Lobby(message) => self.handle_lobby(conn, message, now),
            Inbound::Handshake {
                room_code,
                player_id,
            } => self.game_connect(conn, &room_code, player_id, now),
            Inbound::Game(raw) => {
                self.game_frame(conn, raw, now);
                Ok(())
            }
            Inbound::Malformed(e) => {
                warn!("Malformed control frame from connection {}: {}", conn, e);
                Ok(())
            }
        };
        if let Err(e) = result {
            debug!("Request from connection {} rejected: {}", conn, e);
            self.send(conn, &ServerMessage::error(e.to_string()));
        }
    }

    fn handle_lobby(
        &mut self,
        conn: ConnectionId,
        message: ClientMessage,
        now: Instant,
    ) -> Result<(), RoomError> {
        match message {
            ClientMessage::CreateRoom {
                player_name,
                config,
            } => self.create_room(conn, &player_name, &config, now),
            ClientMessage::JoinRoom {
                room_code,
                player_name,
            } => self.join_room(conn, &room_code, &player_name, now),
            ClientMessage::LeaveRoom => self.leave_room(conn, now),
            ClientMessage::UpdateConfig { config } => self.update_config(conn, &config, now),
            ClientMessage::StartGame => self.start_game(conn, now),
            ClientMessage::GameConnect {
                room_code,
                player_id,
            } => self.game_connect(conn, &room_code, player_id, now),
        }
    }

    fn create_room(
        &mut self,
        conn: ConnectionId,
        name: &str,
        patch: &ConfigPatch,
        now: Instant,
    ) -> Result<(), RoomError> {
        self.leave_current(conn, now);
        let Some(outbound) = self.connections.get(&conn).cloned() else {
            return Ok(());
        };

        let config = self.settings.room_defaults.merged(patch);
        let seed: u32 = rand::rng().random();
        let map = RoomMap::generate(
            self.generator.as_ref(),
            seed,
            self.settings.map_width,
            self.settings.map_height,
        );

        let room = self.directory.create_room(config, map, now);
        let id = room.add_player(Some(outbound), &display_name(name), now)?;
        let code = room.code.clone();
        let reply = ServerMessage::RoomCreated {
            room_code: code.clone(),
            player_id: id,
            room: room.snapshot(),
        };
        room.send_to(id, &reply.to_json());
        self.registry.bind(conn, id, &code);
        Ok(())
    }

    fn join_room(
        &mut self,
        conn: ConnectionId,
        code: &str,
        name: &str,
        now: Instant,
    ) -> Result<(), RoomError> {
        let Some(outbound) = self.connections.get(&conn).cloned() else {
            return Ok(());
        };

        // Reject before touching the current membership.
        let room = self.directory.get_room(code).ok_or(RoomError::RoomNotFound)?;
        let rejoining = self
            .registry
            .lookup(conn)
            .is_some_and(|b| b.room_code == room.code && room.player(b.player_id).is_some());
        let occupancy = room.occupancy() - usize::from(rejoining);
        if occupancy >= room.config().max_players as usize {
            return Err(RoomError::RoomFull);
        }
        self.leave_current(conn, now);

        let room = self.directory.get_room_mut(code).ok_or(RoomError::RoomNotFound)?;
        let name = display_name(name);
        let id = room.add_player(Some(outbound), &name, now)?;
        let code = room.code.clone();
        self.registry.bind(conn, id, &code);

        if room.is_started() {
            // Late join: straight into game state.
            let redirect = ServerMessage::GameStarting {
                room_code: code.clone(),
                player_id: Some(id),
                late_join: true,
                config: *room.config(),
                players: room.summaries(),
            };
            room.send_to(id, &redirect.to_json());
            for frame in room.join_frames(id) {
                room.emit(frame, Some(id));
            }
            info!("Room {}: player {} joined late", code, id);
        } else {
            let reply = ServerMessage::RoomJoined {
                room_code: code.clone(),
                player_id: id,
                room: room.snapshot(),
            };
            room.send_to(id, &reply.to_json());
            let notice = ServerMessage::PlayerJoined {
                player_id: id,
                player_name: name,
                room: room.snapshot(),
            };
            room.broadcast_to_room(&notice.to_json(), Some(id));
        }
        Ok(())
    }

    fn leave_room(&mut self, conn: ConnectionId, now: Instant) -> Result<(), RoomError> {
        let binding = self.registry.unbind(conn).ok_or(RoomError::NotInRoom)?;
        self.depart(&binding, now);
        Ok(())
    }

    /// Leave whatever room `conn` is in, if any.
    fn leave_current(&mut self, conn: ConnectionId, now: Instant) {
        if let Some(binding) = self.registry.unbind(conn) {
            self.depart(&binding, now);
        }
    }

    fn depart(&mut self, binding: &Binding, now: Instant) {
        let Some(room) = self.directory.get_room_mut(&binding.room_code) else {
            return;
        };
        let id = binding.player_id;
        if room.remove_player(id, now).is_none() {
            return;
        }
        self.registry.release_player(&binding.room_code, id);

        if room.is_started() {
            room.emit(GameFrame::Exit { id }.encode(), None);
        } else {
            let notice = ServerMessage::PlayerLeft {
                player_id: id,
                host_id: room.host_id().unwrap_or(0),
                room: room.snapshot(),
            };
            room.broadcast_to_room(&notice.to_json(), None);
        }
    }

    fn update_config(
        &mut self,
        conn: ConnectionId,
        patch: &ConfigPatch,
        now: Instant,
    ) -> Result<(), RoomError> {
        let binding = self.registry.lookup(conn).ok_or(RoomError::NotInRoom)?;
        let room = self
            .directory
            .get_room_mut(&binding.room_code)
            .ok_or(RoomError::RoomNotFound)?;
        if !room.is_host(binding.player_id) {
            return Err(RoomError::NotHost);
        }
        let config = room.config().merged(patch);
        room.update_config(config, now)?;
        room.broadcast_to_room(&ServerMessage::RoomConfigUpdated { config }.to_json(), None);
        Ok(())
    }

    fn start_game(&mut self, conn: ConnectionId, now: Instant) -> Result<(), RoomError> {
        let binding = self.registry.lookup(conn).ok_or(RoomError::NotInRoom)?;
        let room = self
            .directory
            .get_room_mut(&binding.room_code)
            .ok_or(RoomError::RoomNotFound)?;
        if !room.is_host(binding.player_id) {
            return Err(RoomError::NotHost);
        }
        room.begin_start(now)?;

        let notice = ServerMessage::GameStarting {
            room_code: room.code.clone(),
            player_id: None,
            late_join: false,
            config: *room.config(),
            players: room.summaries(),
        };
        // Everyone gets the attempt before the flag flips.
        let delivered = room.broadcast_to_room(&notice.to_json(), None);
        room.mark_started();
        debug!("Room {}: start notice delivered to {} players", room.code, delivered);
        Ok(())
    }

    /// Bind a game socket to an existing player and bring it up to date.
    fn game_connect(
        &mut self,
        conn: ConnectionId,
        code: &str,
        player_id: u32,
        now: Instant,
    ) -> Result<(), RoomError> {
        let Some(outbound) = self.connections.get(&conn).cloned() else {
            return Ok(());
        };
        let room = self.directory.get_room_mut(code).ok_or(RoomError::RoomNotFound)?;
        if !room.is_started() {
            return Err(RoomError::NotStarted);
        }
        if room.player(player_id).is_none() {
            return Err(RoomError::PlayerNotFound);
        }
        let code = room.code.clone();

        let previous = self.registry.bind(conn, player_id, &code);
        if let Some(previous) = previous {
            if previous.room_code != code || previous.player_id != player_id {
                self.depart(&previous, now);
            }
        }

        let Some(room) = self.directory.get_room_mut(&code) else {
            return Err(RoomError::RoomNotFound);
        };
        room.rebind(player_id, outbound.clone())?;
        room.touch(now);

        let mut frames = Vec::with_capacity(room.get_trace().len() + 3);
        frames.push(room.map().frame().to_string());
        frames.push(GameFrame::Config(room.config().to_json()).encode());
        frames.push(
            ServerMessage::GameConnected {
                room_code: code.clone(),
                player_id,
            }
            .to_json(),
        );
        frames.extend(room.get_trace().iter().cloned());

        let replayed = frames.len() - 3;
        for frame in frames {
            if let Err(e) = outbound.send(frame) {
                warn!("Room {}: game connect for player {} aborted: {}", code, player_id, e);
                break;
            }
        }
        info!(
            "Room {}: player {} game socket bound, replayed {} frames",
            code, player_id, replayed
        );
        Ok(())
    }

    /// Trace and relay a game frame, then let the AI react.
    fn game_frame(&mut self, conn: ConnectionId, raw: &str, now: Instant) {
        let Some(binding) = self.registry.lookup(conn).cloned() else {
            debug!("Dropping game frame from unbound connection {}", conn);
            return;
        };
        let Some(room) = self.directory.get_room_mut(&binding.room_code) else {
            return;
        };
        room.touch(now);
        room.emit(raw.to_string(), Some(binding.player_id));

        match GameFrame::parse(raw) {
            Ok(frame) => {
                let observed = room.observe_frame(&frame, now);
                for follow_up in observed.follow_up {
                    room.emit(follow_up, None);
                }
                if let Some(player) = observed.exited {
                    self.registry.release_player(&binding.room_code, player.id);
                }
            }
            Err(e) => debug!(
                "Room {}: relayed unparsed frame from player {}: {}",
                binding.room_code, binding.player_id, e
            ),
        }

        if let Some(room) = self.directory.get_room_mut(&binding.room_code) {
            if room.is_started() && !room.roster().is_empty() {
                room.run_ai_tick(now);
            }
        }
    }

    fn disconnect(&mut self, conn: ConnectionId, now: Instant) {
        self.connections.remove(&conn);
        let Some(binding) = self.registry.unbind(conn) else {
            debug!("Connection {} closed", conn);
            return;
        };
        let started = self
            .directory
            .get_room(&binding.room_code)
            .is_some_and(|room| room.is_started());

        if started {
            // Keep the player: the game socket may be about to take over.
            if let Some(room) = self.directory.get_room_mut(&binding.room_code) {
                room.detach(binding.player_id, conn);
            }
            debug!(
                "Room {}: player {} connection {} closed",
                binding.room_code, binding.player_id, conn
            );
        } else {
            self.depart(&binding, now);
        }
    }

    /// Advance AI in every started room that has agents.
    pub fn ai_tick_all(&mut self, now: Instant) {
        let started = Instant::now();
        let mut rooms = 0;
        for room in self.directory.rooms_mut() {
            if room.is_started() && !room.roster().is_empty() {
                room.run_ai_tick(now);
                rooms += 1;
            }
        }
        let elapsed = started.elapsed();
        if elapsed > self.settings.ai_tick.mul_f32(0.9) {
            warn!(
                "AI tick over {} rooms took {:.2}ms (interval {}ms)",
                rooms,
                elapsed.as_secs_f64() * 1000.0,
                self.settings.ai_tick.as_millis()
            );
        }
    }

    /// Drop inactive rooms and every binding that still points at them.
    pub fn sweep(&mut self, now: Instant) -> Vec<String> {
        let removed = self.directory.cleanup_inactive_rooms(now);
        for code in &removed {
            let released = self.registry.release_room(code);
            if released > 0 {
                debug!("Released {} bindings of room {}", released, code);
            }
        }
        removed
    }

    fn send(&self, conn: ConnectionId, message: &ServerMessage) {
        let Some(outbound) = self.connections.get(&conn) else {
            return;
        };
        if let Err(e) = outbound.send(message.to_json()) {
            warn!("Failed to send {} to connection {}: {}", message.kind(), conn, e);
        }
    }
}

fn display_name(raw: &str) -> String {
    let name = raw.trim();
    if name.is_empty() {
        return "Player".to_string();
    }
    name.chars().take(MAX_NAME_LEN).collect()
}

/// Start the dispatcher task.
pub fn spawn_dispatcher(config: &Config) -> DispatcherHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher::new(config);
    tokio::spawn(run_dispatcher(dispatcher, rx));
    DispatcherHandle::new(tx)
}

/// Drive `dispatcher` until every handle is dropped.
pub async fn run_dispatcher(mut dispatcher: Dispatcher, mut rx: mpsc::UnboundedReceiver<Command>) {
    let ai_period = dispatcher.settings.ai_tick;
    let sweep_period = dispatcher.settings.sweep_interval;
    let start = tokio::time::Instant::now();

    let mut ai_timer = interval_at(start + ai_period, ai_period);
    ai_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut sweep_timer = interval_at(start + sweep_period, sweep_period);
    sweep_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "Dispatcher running (AI every {}ms, sweep every {}s)",
        ai_period.as_millis(),
        sweep_period.as_secs()
    );

    loop {
        tokio::select! {
            command = rx.recv() => {
                match command {
                    Some(command) => dispatcher.handle(command, Instant::now()),
                    None => break,
                }
            }
            _ = ai_timer.tick() => dispatcher.ai_tick_all(Instant::now()),
            _ = sweep_timer.tick() => {
                let removed = dispatcher.sweep(Instant::now());
                if !removed.is_empty() {
                    info!("Sweep removed {} rooms, {} left", removed.len(), dispatcher.directory.len());
                }
            }
        }
    }
    info!("Dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{AI_ID_BASE, encode_text};
    use serde_json::{Value, json};
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Client {
        conn: ConnectionId,
        rx: UnboundedReceiver<String>,
    }

    impl Client {
        fn drain(&mut self) -> Vec<String> {
            let mut frames = Vec::new();
            while let Ok(frame) = self.rx.try_recv() {
                frames.push(frame);
            }
            frames
        }

        fn drain_json(&mut self) -> Vec<Value> {
            self.drain()
                .iter()
                .filter_map(|f| serde_json::from_str(f).ok())
                .collect()
        }
    }

    fn dispatcher() -> Dispatcher {
        let settings = DispatchSettings {
            map_width: 400,
            map_height: 200,
            ..DispatchSettings::default()
        };
        Dispatcher::with_generator(settings, Box::new(SeedOnly))
    }

    fn connect(d: &mut Dispatcher, conn: ConnectionId) -> Client {
        let (outbound, rx) = Outbound::channel(conn);
        d.handle(Command::Connect { conn, outbound }, Instant::now());
        Client { conn, rx }
    }

    fn send(d: &mut Dispatcher, client: &Client, value: Value) {
        d.handle_frame(client.conn, &value.to_string(), Instant::now());
    }

    /// Host creates a room; returns the room code.
    fn create(d: &mut Dispatcher, host: &mut Client, config: Value) -> String {
        send(
            d,
            host,
            json!({"type": "CREATE_ROOM", "playerName": "host", "config": config}),
        );
        let created = host.drain_json();
        assert_eq!(created[0]["type"], "ROOM_CREATED");
        assert_eq!(created[0]["playerId"], 1);
        created[0]["roomCode"].as_str().unwrap().to_string()
    }

    fn join(d: &mut Dispatcher, client: &Client, code: &str, name: &str) {
        send(
            d,
            client,
            json!({"type": "JOIN_ROOM", "roomCode": code, "playerName": name}),
        );
    }

    #[test]
    fn fifth_player_is_rejected_from_full_room() {
        let mut d = dispatcher();
        let mut host = connect(&mut d, 1);
        let code = create(&mut d, &mut host, json!({"maxPlayers": 4}));

        let mut others: Vec<Client> = (2..=4).map(|c| connect(&mut d, c)).collect();
        for (i, c) in others.iter().enumerate() {
            join(&mut d, c, &code, &format!("p{i}"));
        }
        assert_eq!(others[0].drain_json()[0]["type"], "ROOM_JOINED");

        let mut fifth = connect(&mut d, 5);
        join(&mut d, &fifth, &code, "late");
        let reply = fifth.drain_json();
        assert_eq!(reply[0]["type"], "ERROR");
        assert_eq!(reply[0]["message"], "Room is full");
        assert_eq!(d.directory().get_room(&code).unwrap().player_count(), 4);
        assert!(d.registry().lookup(5).is_none());
    }

    #[test]
    fn start_spawns_ai_and_notifies_every_human() {
        let mut d = dispatcher();
        let mut host = connect(&mut d, 1);
        let code = create(
            &mut d,
            &mut host,
            json!({"maxPlayers": 6, "aiOpponents": {"count": 2, "difficulty": "easy"}}),
        );
        let mut others: Vec<Client> = (2..=4).map(|c| connect(&mut d, c)).collect();
        for c in &others {
            join(&mut d, c, &code, "p");
        }
        host.drain();
        for c in &mut others {
            c.drain();
        }

        // Only the host may start.
        send(&mut d, &others[0], json!({"type": "START_GAME"}));
        assert_eq!(others[0].drain_json()[0]["message"], "Only the host can do that");

        send(&mut d, &host, json!({"type": "START_GAME"}));
        let room = d.directory().get_room(&code).unwrap();
        assert!(room.is_started());
        let ids: Vec<u32> = room.roster().agents.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![AI_ID_BASE, AI_ID_BASE + 1]);

        for c in std::iter::once(&mut host).chain(others.iter_mut()) {
            let msgs = c.drain_json();
            assert_eq!(msgs.len(), 1);
            assert_eq!(msgs[0]["type"], "GAME_STARTING");
            assert_eq!(msgs[0]["lateJoin"], false);
            assert_eq!(msgs[0]["players"].as_array().unwrap().len(), 4);
        }

        send(&mut d, &host, json!({"type": "START_GAME"}));
        assert_eq!(host.drain_json()[0]["message"], "Game already started");
    }

    #[test]
    fn game_frames_are_traced_and_relayed_to_others() {
        let mut d = dispatcher();
        let mut host = connect(&mut d, 1);
        let code = create(&mut d, &mut host, json!({}));
        let mut b = connect(&mut d, 2);
        let mut c = connect(&mut d, 3);
        join(&mut d, &b, &code, "b");
        join(&mut d, &c, &code, "c");
        host.drain();
        b.drain();
        c.drain();

        let raw = format!("M 3 100 200 6 950 9 2 {} 3", encode_text("c"));
        d.handle_frame(c.conn, &raw, Instant::now());

        let room = d.directory().get_room(&code).unwrap();
        assert_eq!(room.get_trace(), [raw.clone()]);
        assert_eq!(host.drain(), vec![raw.clone()]);
        assert_eq!(b.drain(), vec![raw]);
        assert!(c.drain().is_empty());
    }

    #[test]
    fn unparseable_game_frames_are_still_relayed() {
        let mut d = dispatcher();
        let mut host = connect(&mut d, 1);
        let code = create(&mut d, &mut host, json!({}));
        let mut b = connect(&mut d, 2);
        join(&mut d, &b, &code, "b");
        b.drain();

        d.handle_frame(host.conn, "Q something odd", Instant::now());
        assert_eq!(b.drain(), vec!["Q something odd"]);
        assert_eq!(d.directory().get_room(&code).unwrap().get_trace().len(), 1);
    }

    #[test]
    fn late_join_is_redirected_into_the_game() {
        let mut d = dispatcher();
        let mut host = connect(&mut d, 1);
        let code = create(&mut d, &mut host, json!({}));
        send(&mut d, &host, json!({"type": "START_GAME"}));
        host.drain();

        let mut late = connect(&mut d, 2);
        join(&mut d, &late, &code, "late");
        let reply = late.drain_json();
        assert_eq!(reply.len(), 1);
        assert_eq!(reply[0]["type"], "GAME_STARTING");
        assert_eq!(reply[0]["lateJoin"], true);
        assert_eq!(reply[0]["playerId"], 2);

        let announced = host.drain();
        assert_eq!(announced, vec!["J 2".to_string(), format!("N 2 {}", encode_text("late"))]);
        let trace = d.directory().get_room(&code).unwrap().get_trace();
        assert_eq!(&trace[trace.len() - 2..], announced.as_slice());
    }

    #[test]
    fn game_connect_delivers_map_config_identity_then_trace() {
        let mut d = dispatcher();
        let mut host = connect(&mut d, 1);
        let code = create(&mut d, &mut host, json!({"aiOpponents": {"count": 1}}));
        send(&mut d, &host, json!({"type": "START_GAME"}));
        d.handle_frame(host.conn, "F 1", Instant::now());

        // Lobby socket goes away; the player survives the handoff.
        d.handle(Command::Disconnect { conn: host.conn }, Instant::now());
        assert_eq!(d.directory().get_room(&code).unwrap().player_count(), 1);

        let mut game = connect(&mut d, 10);
        send(
            &mut d,
            &game,
            json!({"type": "GAME_CONNECT", "roomCode": code.to_lowercase(), "playerId": 1}),
        );
        let frames = game.drain();
        let trace = d.directory().get_room(&code).unwrap().get_trace().to_vec();

        assert!(frames[0].starts_with("S "));
        assert!(frames[1].starts_with("C {"));
        let identity: Value = serde_json::from_str(&frames[2]).unwrap();
        assert_eq!(identity["type"], "GAME_CONNECTED");
        assert_eq!(identity["playerId"], 1);
        assert_eq!(&frames[3..], trace.as_slice());
        assert!(trace.contains(&"F 1".to_string()));
        assert_eq!(d.registry().lookup(10).map(|b| b.player_id), Some(1));
    }

    #[test]
    fn game_connect_rejections() {
        let mut d = dispatcher();
        let mut host = connect(&mut d, 1);
        let code = create(&mut d, &mut host, json!({}));
        let mut game = connect(&mut d, 2);

        send(&mut d, &game, json!({"type": "GAME_CONNECT", "roomCode": "ZZZZZZ", "playerId": 1}));
        assert_eq!(game.drain_json()[0]["message"], "Room not found");
        send(&mut d, &game, json!({"type": "GAME_CONNECT", "roomCode": code, "playerId": 1}));
        assert_eq!(game.drain_json()[0]["message"], "Game has not started");

        send(&mut d, &host, json!({"type": "START_GAME"}));
        send(&mut d, &game, json!({"type": "GAME_CONNECT", "roomCode": code, "playerId": 9}));
        assert_eq!(game.drain_json()[0]["message"], "Player not found in room");
    }

    #[test]
    fn handoff_does_not_detach_the_new_socket() {
        let mut d = dispatcher();
        let mut host = connect(&mut d, 1);
        let code = create(&mut d, &mut host, json!({}));
        send(&mut d, &host, json!({"type": "START_GAME"}));

        let mut game = connect(&mut d, 2);
        send(&mut d, &game, json!({"type": "GAME_CONNECT", "roomCode": code, "playerId": 1}));
        game.drain();
        // Lobby socket closes after the game socket bound.
        d.handle(Command::Disconnect { conn: host.conn }, Instant::now());

        let room = d.directory().get_room(&code).unwrap();
        assert!(room.player(1).unwrap().is_connected());
        assert_eq!(room.connected_count(), 1);
    }

    #[test]
    fn lobby_leave_and_disconnect_notify_and_migrate_host() {
        let mut d = dispatcher();
        let mut host = connect(&mut d, 1);
        let code = create(&mut d, &mut host, json!({}));
        let mut b = connect(&mut d, 2);
        let mut c = connect(&mut d, 3);
        join(&mut d, &b, &code, "b");
        join(&mut d, &c, &code, "c");
        b.drain();
        c.drain();

        send(&mut d, &host, json!({"type": "LEAVE_ROOM"}));
        let left = c.drain_json();
        assert_eq!(left[0]["type"], "PLAYER_LEFT");
        assert_eq!(left[0]["playerId"], 1);
        assert_eq!(left[0]["hostId"], 2);

        d.handle(Command::Disconnect { conn: b.conn }, Instant::now());
        let left = c.drain_json();
        assert_eq!(left[0]["playerId"], 2);
        assert_eq!(left[0]["hostId"], 3);

        send(&mut d, &host, json!({"type": "LEAVE_ROOM"}));
        assert_eq!(host.drain_json().last().unwrap()["message"], "You are not in a room");
    }

    #[test]
    fn leaving_a_started_room_emits_exit() {
        let mut d = dispatcher();
        let mut host = connect(&mut d, 1);
        let code = create(&mut d, &mut host, json!({}));
        let mut b = connect(&mut d, 2);
        join(&mut d, &b, &code, "b");
        send(&mut d, &host, json!({"type": "START_GAME"}));
        host.drain();
        b.drain();

        send(&mut d, &b, json!({"type": "LEAVE_ROOM"}));
        assert_eq!(host.drain(), vec!["X 2"]);
        let room = d.directory().get_room(&code).unwrap();
        assert_eq!(room.player_ids(), vec![1]);
        assert_eq!(room.get_trace().last().map(String::as_str), Some("X 2"));
    }

    #[test]
    fn config_updates_are_host_only_and_broadcast() {
        let mut d = dispatcher();
        let mut host = connect(&mut d, 1);
        let code = create(&mut d, &mut host, json!({}));
        let mut b = connect(&mut d, 2);
        join(&mut d, &b, &code, "b");
        host.drain();
        b.drain();

        send(&mut d, &b, json!({"type": "UPDATE_CONFIG", "config": {"maxLives": 9}}));
        assert_eq!(b.drain_json()[0]["message"], "Only the host can do that");

        send(&mut d, &host, json!({"type": "UPDATE_CONFIG", "config": {"maxLives": 5}}));
        for client in [&mut host, &mut b] {
            let msgs = client.drain_json();
            assert_eq!(msgs[0]["type"], "ROOM_CONFIG_UPDATED");
            assert_eq!(msgs[0]["config"]["maxLives"], 5);
            assert_eq!(msgs[0]["config"]["maxPlayers"], 8);
        }
    }

    #[test]
    fn malformed_control_json_is_dropped_silently() {
        let mut d = dispatcher();
        let mut host = connect(&mut d, 1);
        send(&mut d, &host, json!({"type": "JOIN_ROOM", "roomCode": 5}));
        assert!(host.drain().is_empty());
        assert!(d.directory().is_empty());
    }

    #[test]
    fn join_unknown_room_reports_not_found() {
        let mut d = dispatcher();
        let mut a = connect(&mut d, 1);
        join(&mut d, &a, "NOPE42", "a");
        assert_eq!(a.drain_json()[0]["message"], "Room not found");
    }

    #[test]
    fn creating_again_leaves_the_previous_room() {
        let mut d = dispatcher();
        let mut host = connect(&mut d, 1);
        let first = create(&mut d, &mut host, json!({}));
        let second = create(&mut d, &mut host, json!({}));
        assert_ne!(first, second);
        assert_eq!(d.directory().get_room(&first).unwrap().player_count(), 0);
        assert_eq!(
            d.registry().lookup(1).map(|b| b.room_code.clone()),
            Some(second)
        );
    }

    #[test]
    fn sweep_releases_bindings_of_removed_rooms() {
        let mut d = dispatcher();
        let mut host = connect(&mut d, 1);
        let code = create(&mut d, &mut host, json!({}));
        send(&mut d, &host, json!({"type": "START_GAME"}));
        d.handle(Command::Disconnect { conn: host.conn }, Instant::now());

        let mut game = connect(&mut d, 2);
        send(&mut d, &game, json!({"type": "GAME_CONNECT", "roomCode": code, "playerId": 1}));
        game.drain();
        assert!(d.sweep(Instant::now() + Duration::from_secs(3600)).is_empty());

        // Game socket drops too; now the room is empty of connections.
        drop(game);
        let removed = d.sweep(Instant::now() + Duration::from_secs(3600));
        assert_eq!(removed, vec![code]);
        assert!(d.registry().lookup(2).is_none());
    }

    #[test]
    fn ai_timer_only_touches_started_rooms_with_agents() {
        let mut d = dispatcher();
        let mut host = connect(&mut d, 1);
        let code = create(&mut d, &mut host, json!({"aiOpponents": {"count": 1}}));
        d.ai_tick_all(Instant::now());
        assert!(d.directory().get_room(&code).unwrap().get_trace().is_empty());

        send(&mut d, &host, json!({"type": "START_GAME"}));
        host.drain();
        let before = d.directory().get_room(&code).unwrap().get_trace().len();
        d.ai_tick_all(Instant::now());
        let after = d.directory().get_room(&code).unwrap().get_trace().len();
        assert!(after > before);
        assert_eq!(host.drain().len(), after - before);
    }

    #[test]
    fn failed_join_keeps_the_current_room() {
        let mut d = dispatcher();
        let mut host = connect(&mut d, 1);
        let code = create(&mut d, &mut host, json!({}));
        let mut b = connect(&mut d, 2);
        join(&mut d, &b, &code, "b");
        host.drain();
        b.drain();

        join(&mut d, &b, "ZZZZZZ", "b");
        assert_eq!(b.drain_json()[0]["message"], "Room not found");

        let mut other = connect(&mut d, 3);
        let full = create(&mut d, &mut other, json!({"maxPlayers": 1}));
        join(&mut d, &b, &full, "b");
        assert_eq!(b.drain_json()[0]["message"], "Room is full");

        assert!(host.drain().is_empty());
        assert_eq!(d.directory().get_room(&code).unwrap().player_ids(), vec![1, 2]);
        assert_eq!(
            d.registry().lookup(2).map(|b| (b.room_code.clone(), b.player_id)),
            Some((code, 2))
        );
    }

    #[test]
    fn rejoining_a_full_room_moves_the_player_within_it() {
        let mut d = dispatcher();
        let mut host = connect(&mut d, 1);
        let code = create(&mut d, &mut host, json!({"maxPlayers": 2}));
        let mut b = connect(&mut d, 2);
        join(&mut d, &b, &code, "b");
        b.drain();

        join(&mut d, &b, &code, "b again");
        assert_eq!(b.drain_json()[0]["type"], "ROOM_JOINED");
        assert_eq!(d.directory().get_room(&code).unwrap().player_ids(), vec![1, 3]);
    }

    #[test]
    fn oversized_configs_are_clamped() {
        let mut d = dispatcher();
        let mut host = connect(&mut d, 1);
        send(
            &mut d,
            &host,
            json!({
                "type": "CREATE_ROOM",
                "playerName": "host",
                "config": {"maxPlayers": 4_000_000_000u64, "aiOpponents": {"count": 3000, "personality": "mixed"}}
            }),
        );
        let created = host.drain_json();
        assert_eq!(created[0]["type"], "ROOM_CREATED");
        let config = &created[0]["room"]["config"];
        assert_eq!(config["maxPlayers"], protocol::MAX_PLAYERS);
        assert_eq!(config["aiOpponents"]["count"], protocol::MAX_PLAYERS - 1);
        assert_eq!(config["aiOpponents"]["personality"], "mixed");

        send(&mut d, &host, json!({"type": "START_GAME"}));
        let code = created[0]["roomCode"].as_str().unwrap();
        let room = d.directory().get_room(code).unwrap();
        assert_eq!(room.roster().len(), protocol::MAX_PLAYERS as usize - 1);
    }

    #[test]
    fn ai_reactions_are_traced_right_after_the_human_frame() {
        let mut d = dispatcher();
        let mut host = connect(&mut d, 1);
        let code = create(&mut d, &mut host, json!({"aiOpponents": {"count": 1}}));
        let mut b = connect(&mut d, 2);
        join(&mut d, &b, &code, "b");
        send(&mut d, &host, json!({"type": "START_GAME"}));
        host.drain();
        b.drain();

        let before = d.directory().get_room(&code).unwrap().get_trace().len();
        d.handle_frame(host.conn, "F 1", Instant::now());
        let trace = d.directory().get_room(&code).unwrap().get_trace().to_vec();

        assert_eq!(trace[before], "F 1");
        let reactions = &trace[before + 1..];
        assert!(!reactions.is_empty());
        assert!(reactions.iter().any(|f| f.starts_with(&format!("M {AI_ID_BASE} "))));
        assert_eq!(host.drain(), reactions);
        assert_eq!(b.drain(), trace[before..]);
    }

    #[test]
    fn extreme_dig_frames_do_not_stop_the_dispatcher() {
        let mut d = dispatcher();
        let mut host = connect(&mut d, 1);
        let code = create(&mut d, &mut host, json!({"aiOpponents": {"count": 1}}));
        send(&mut d, &host, json!({"type": "START_GAME"}));

        d.handle_frame(host.conn, "D 2147483647 0 10 10", Instant::now());
        d.handle_frame(host.conn, "B 1000 2147483647 2147483647 2147483647 2147483647", Instant::now());
        d.ai_tick_all(Instant::now());

        let room = d.directory().get_room(&code).unwrap();
        assert!(room.bases()[&AI_ID_BASE].fits_within(400, 200));
        assert!(room.get_trace().contains(&"D 2147483647 0 10 10".to_string()));
    }

    #[test]
    fn display_names_are_trimmed_and_capped() {
        assert_eq!(display_name("   "), "Player");
        assert_eq!(display_name(" Ann "), "Ann");
        assert_eq!(display_name(&"x".repeat(100)).len(), MAX_NAME_LEN);
    }
}
