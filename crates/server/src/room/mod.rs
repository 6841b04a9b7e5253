//! One game session: members, host, configuration, trace, map and AI.
//!
//! A room moves `Lobby -> Starting -> Started` and never goes back. Game
//! frames are relayed verbatim; the room parses them only to keep its
//! mirrors (player tanks, bases, terrain) current for AI agents and
//! reconnecting players.

mod player;
mod trace;

pub use player::Player;
pub use trace::Trace;

use crate::ai::{AiAction, AiRoster, LossOutcome, TankView, WorldState};
use crate::connection::{ConnectionId, Outbound};
use crate::error::RoomError;
use crate::map::{RoomMap, Terrain};
use protocol::{GameFrame, PlayerId, PlayerSummary, Rect, RoomConfig, RoomSnapshot};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Room lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Accepting joins; configuration mutable by the host.
    Lobby,
    /// AI spawned, start notification going out.
    Starting,
    /// Game frames flow; joins are late joins.
    Started,
}

/// Side effects of a game frame the caller has to finish.
#[derive(Debug, Default)]
pub struct Observed {
    /// Frames to trace and broadcast right after the triggering one.
    pub follow_up: Vec<String>,
    /// Player removed by an `X` frame.
    pub exited: Option<Player>,
}

#[derive(Debug)]
pub struct Room {
    pub code: String,
    host: Option<u32>,
    config: RoomConfig,
    next_player_id: u32,
    phase: Phase,
    last_activity: Instant,
    players: BTreeMap<u32, Player>,
    trace: Trace,
    map: RoomMap,
    /// Working terrain, kept current with dig frames.
    terrain: Terrain,
    roster: AiRoster,
    /// Announced bases by owner id.
    bases: HashMap<u32, Rect>,
}

impl Room {
    pub fn new(code: String, config: RoomConfig, map: RoomMap, now: Instant) -> Self {
        let terrain = map.terrain();
        Self {
            code,
            host: None,
            config,
            next_player_id: 1,
            phase: Phase::Lobby,
            last_activity: now,
            players: BTreeMap::new(),
            trace: Trace::new(),
            map,
            terrain,
            roster: AiRoster::new(),
            bases: HashMap::new(),
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_started(&self) -> bool {
        self.phase == Phase::Started
    }

    pub fn host_id(&self) -> Option<u32> {
        self.host
    }

    pub fn map(&self) -> &RoomMap {
        &self.map
    }

    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    pub fn roster(&self) -> &AiRoster {
        &self.roster
    }

    pub fn bases(&self) -> &HashMap<u32, Rect> {
        &self.bases
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    pub fn player(&self, id: u32) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn player_ids(&self) -> Vec<u32> {
        self.players.keys().copied().collect()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn connected_count(&self) -> usize {
        self.players.values().filter(|p| p.is_connected()).count()
    }

    /// Humans plus AI slots: configured ones in the lobby, live agents once started.
    pub fn occupancy(&self) -> usize {
        let ai = match self.phase {
            Phase::Lobby => self.config.ai_opponents.count as usize,
            Phase::Starting | Phase::Started => self.roster.len(),
        };
        self.players.len() + ai
    }

    pub fn is_full(&self) -> bool {
        self.occupancy() >= self.config.max_players as usize
    }

    /// Allocate the next player id and store the player. Capacity is the caller's check.
    ///
    /// The first player added becomes host.
    pub fn add_player(
        &mut self,
        connection: Option<Outbound>,
        name: &str,
        now: Instant,
    ) -> Result<u32, RoomError> {
        let id = self.next_player_id;
        if !PlayerId::is_valid_human(id) {
            return Err(RoomError::IdsExhausted);
        }
        self.next_player_id += 1;
        self.players.insert(id, Player::new(id, name, connection));
        if self.host.is_none() {
            self.host = Some(id);
        }
        self.last_activity = now;
        info!("Room {}: player {} '{}' joined", self.code, id, name);
        Ok(id)
    }

    /// Remove a player. A departing host hands over to the lowest remaining id.
    pub fn remove_player(&mut self, id: u32, now: Instant) -> Option<Player> {
        let removed = self.players.remove(&id);
        self.last_activity = now;
        if removed.is_some() {
            info!("Room {}: player {} left", self.code, id);
        }
        if self.host == Some(id) {
            self.host = self.players.keys().next().copied();
            if let Some(host) = self.host {
                info!("Room {}: host migrated to player {}", self.code, host);
            }
        }
        removed
    }

    pub fn is_host(&self, id: u32) -> bool {
        self.host == Some(id)
    }

    pub fn can_start(&self) -> bool {
        let humans = self.players.len();
        humans >= 1
            && humans + self.config.ai_opponents.count as usize <= self.config.max_players as usize
    }

    /// Replace the configuration wholesale. Host rights are the caller's check.
    pub fn update_config(&mut self, config: RoomConfig, now: Instant) -> Result<(), RoomError> {
        if self.phase != Phase::Lobby {
            return Err(RoomError::AlreadyStarted);
        }
        self.config = config;
        self.last_activity = now;
        Ok(())
    }

    /// Point a player at a new connection. The player keeps its id.
    pub fn rebind(&mut self, id: u32, connection: Outbound) -> Result<(), RoomError> {
        let player = self.players.get_mut(&id).ok_or(RoomError::PlayerNotFound)?;
        player.connection = Some(connection);
        Ok(())
    }

    /// Forget a player's connection without removing the player.
    ///
    /// Only clears the handle if it still belongs to `conn`; the game socket
    /// may already have replaced the lobby socket.
    pub fn detach(&mut self, id: u32, conn: ConnectionId) -> bool {
        let Some(player) = self.players.get_mut(&id) else {
            return false;
        };
        if player.connection.as_ref().is_some_and(|c| c.id() == conn) {
            player.connection = None;
            return true;
        }
        false
    }

    /// Send `frame` to every connected player except `exclude`.
    ///
    /// A failed send is logged and skipped. Returns the number of deliveries.
    pub fn broadcast_to_room(&self, frame: &str, exclude: Option<u32>) -> usize {
        let mut delivered = 0;
        for player in self.players.values() {
            if Some(player.id) == exclude || !player.is_connected() {
                continue;
            }
            match player.send(frame) {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Room {}: delivery to player {} failed: {}", self.code, player.id, e),
            }
        }
        delivered
    }

    /// Send to one player. Returns whether the frame was queued.
    pub fn send_to(&self, id: u32, frame: &str) -> bool {
        let Some(player) = self.players.get(&id) else {
            return false;
        };
        match player.send(frame) {
            Ok(()) => true,
            Err(e) => {
                warn!("Room {}: delivery to player {} failed: {}", self.code, id, e);
                false
            }
        }
    }

    pub fn add_to_trace(&mut self, frame: impl Into<String>) {
        self.trace.push(frame);
    }

    pub fn get_trace(&self) -> &[String] {
        self.trace.frames()
    }

    /// Append to the trace, then deliver to everyone but `exclude`.
    pub fn emit(&mut self, frame: String, exclude: Option<u32>) -> usize {
        let delivered = self.broadcast_to_room(&frame, exclude);
        self.trace.push(frame);
        delivered
    }

    /// Whether the room should survive a sweep at `now`.
    pub fn is_active(&self, now: Instant, timeout: Duration) -> bool {
        self.connected_count() > 0 || now.saturating_duration_since(self.last_activity) < timeout
    }

    pub fn summaries(&self) -> Vec<PlayerSummary> {
        self.players
            .values()
            .map(|p| p.summary(self.is_host(p.id)))
            .collect()
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            code: self.code.clone(),
            host_id: self.host.unwrap_or(0),
            started: self.is_started(),
            map_seed: self.map.seed,
            config: self.config,
            players: self.summaries(),
        }
    }

    /// Enter `Starting`: spawn the configured AI and trace their announcements.
    ///
    /// The caller broadcasts the start notification and then calls
    /// [`Room::mark_started`].
    pub fn begin_start(&mut self, now: Instant) -> Result<Vec<u32>, RoomError> {
        if self.phase != Phase::Lobby {
            return Err(RoomError::AlreadyStarted);
        }
        if !self.can_start() {
            return Err(RoomError::CannotStart);
        }
        self.phase = Phase::Starting;
        self.last_activity = now;

        let lives = self.config.max_lives.max(1) as i32;
        let ids = self.roster.spawn_all(
            &self.config.ai_opponents,
            lives,
            self.map.width,
            self.map.height,
            self.map.seed,
        );
        for &id in &ids {
            let Some(agent) = self.roster.get(id) else {
                continue;
            };
            self.terrain.clear(agent.base);
            self.bases.insert(id, agent.base);
            for frame in agent.announce_frames() {
                self.trace.push(frame);
            }
        }
        info!("Room {}: starting with {} AI opponents", self.code, ids.len());
        Ok(ids)
    }

    /// One-way switch into `Started`.
    pub fn mark_started(&mut self) {
        if self.phase == Phase::Starting {
            self.phase = Phase::Started;
            info!("Room {}: game started", self.code);
        }
    }

    /// Frames that announce a late joiner to players already in game.
    pub fn join_frames(&self, id: u32) -> Vec<String> {
        let mut frames = vec![GameFrame::Join { id }.encode()];
        if let Some(player) = self.players.get(&id) {
            frames.push(
                GameFrame::Name {
                    id,
                    name: player.name.clone(),
                }
                .encode(),
            );
        }
        frames
    }

    /// Mirror what a relayed game frame says about the world.
    pub fn observe_frame(&mut self, frame: &GameFrame, now: Instant) -> Observed {
        let mut observed = Observed::default();
        match frame {
            GameFrame::Move(tank) => {
                if let Some(player) = self.players.get_mut(&tank.id) {
                    player.tank = Some(tank.clone());
                }
            }
            GameFrame::Name { id, name } => {
                if let Some(player) = self.players.get_mut(id) {
                    player.name = name.clone();
                }
            }
            GameFrame::Base { id, rect } => {
                if rect.fits_within(self.terrain.width(), self.terrain.height()) {
                    self.bases.insert(*id, *rect);
                } else {
                    debug!("Room {}: ignoring base {:?} of {} outside the map", self.code, rect, id);
                }
            }
            GameFrame::Dig(rect) => {
                self.terrain.dig(*rect);
            }
            GameFrame::Lost { id, by } => {
                self.apply_loss(*id, *by, now, &mut observed);
            }
            GameFrame::Exit { id } => {
                if PlayerId::from_wire(*id).is_ai() {
                    if self.roster_remove(*id) {
                        debug!("Room {}: AI {} exited", self.code, id);
                    }
                } else if self.is_started() {
                    observed.exited = self.remove_player(*id, now);
                }
            }
            _ => {}
        }
        observed
    }

    fn apply_loss(&mut self, victim: u32, by: u32, now: Instant, observed: &mut Observed) {
        let outcome = match self.roster.get_mut(victim) {
            Some(agent) => agent.lose_life(now),
            None => return,
        };
        if outcome == LossOutcome::Ignored {
            return;
        }

        if let Some(killer) = self.roster.get_mut(by) {
            killer.credit_kill();
        } else if let Some(tank) = self.players.get_mut(&by).and_then(|p| p.tank.as_mut()) {
            tank.score += 1;
        }

        match outcome {
            LossOutcome::Respawned => {
                if let Some(agent) = self.roster.get(victim) {
                    observed.follow_up.push(agent.move_frame());
                }
            }
            LossOutcome::Eliminated => {
                self.roster_remove(victim);
                info!("Room {}: AI {} eliminated", self.code, victim);
                observed.follow_up.push(GameFrame::Exit { id: victim }.encode());
            }
            LossOutcome::Ignored => {}
        }
    }

    fn roster_remove(&mut self, id: u32) -> bool {
        self.bases.remove(&id);
        self.roster.remove(id).is_some()
    }

    /// Advance every AI agent once against a shared snapshot.
    ///
    /// Actions are collected from all agents before any is applied; the
    /// resulting frames are traced and broadcast to every player. Returns
    /// the number of frames emitted.
    pub fn run_ai_tick(&mut self, now: Instant) -> usize {
        if !self.is_started() || self.roster.is_empty() {
            return 0;
        }

        let mut tanks: Vec<TankView> = self.players.values().filter_map(Player::view).collect();
        tanks.extend(self.roster.views());
        let world = WorldState {
            now,
            terrain: &self.terrain,
            tanks,
            bases: &self.bases,
        };
        let results = self.roster.update(&world);

        let mut frames = Vec::new();
        for (id, actions) in results {
            let mut moved = false;
            let mut fired = false;
            for action in actions {
                match action {
                    AiAction::Dig(rect) => {
                        self.terrain.dig(rect);
                        frames.push(GameFrame::Dig(rect).encode());
                    }
                    AiAction::Move(_) => moved = true,
                    AiAction::Fire => fired = true,
                }
            }
            if moved {
                if let Some(agent) = self.roster.get(id) {
                    frames.push(agent.move_frame());
                }
            }
            if fired {
                frames.push(GameFrame::Fire { id }.encode());
            }
        }

        let count = frames.len();
        for frame in frames {
            self.emit(frame, None);
        }
        count
    }
}
