use super::direction::Direction;
use super::memory::Memory;
use super::profile::DifficultyProfile;
use super::world::{TankView, WorldState};
use super::{MAX_ENERGY, MAX_HEALTH, TANK_SIZE};
use glam::Vec2;
use protocol::{Difficulty, GameFrame, Personality, Rect, TankState};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};
use tracing::debug;

/// Bot names to use.
const BOT_NAMES: &[&str] = &[
    "Patton", "Rommel", "Zhukov", "Guderian", "Monty", "Abrams", "Sherman", "Tiger",
    "Crusader", "Centurion", "Leopard", "Cromwell", "Matilda", "Chaffee", "Pershing", "Valentine",
];

/// Travel speed, pixels per second.
const SPEED: f32 = 60.0;
/// Longest elapsed time a single tick may integrate.
const MAX_STEP: Duration = Duration::from_millis(250);
/// Elapsed time assumed for the very first tick.
const FIRST_STEP: Duration = Duration::from_millis(200);
const SIGHT_RADIUS: f32 = 220.0;
const FIRE_RANGE: f32 = 160.0;
/// Distance at which an attacker stops closing in.
const STANDOFF: f32 = 24.0;
const DEFEND_RADIUS: f32 = 90.0;
/// Energy ratio that forces refueling regardless of tier.
const CRITICAL_ENERGY: f32 = 0.1;
const MOVE_COST: i32 = 1;
const DIG_COST: i32 = 3;
const FIRE_COST: i32 = 8;
const ENERGY_REGEN: i32 = 25;
const HEALTH_REGEN: i32 = 1;
/// Every client may report the same loss; count one per window.
const LOSS_DEBOUNCE: Duration = Duration::from_secs(1);
/// How far ahead exploration looks when scoring directions.
const EXPLORE_PROBE: f32 = 48.0;
const PATROL_CHANCE: f64 = 0.3;

/// High-level behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AiState {
    Idle,
    Attacking,
    Defending,
    Retreating,
    Refueling,
    Exploring,
}

/// Discrete action, identical to what a human client can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiAction {
    Move(Direction),
    Fire,
    Dig(Rect),
}

/// Result of reporting a lost tank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossOutcome {
    /// Duplicate report or already eliminated.
    Ignored,
    Respawned,
    Eliminated,
}

/// A tank controlled by AI.
#[derive(Debug, Clone)]
pub struct AiAgent {
    /// Wire id (AI range).
    pub id: u32,
    pub name: String,
    pub difficulty: Difficulty,
    pub personality: Personality,
    profile: DifficultyProfile,
    pub pos: Vec2,
    pub dir: Direction,
    pub energy: i32,
    pub health: i32,
    pub score: i32,
    pub lives: i32,
    pub state: AiState,
    /// Current attack target.
    pub target: Option<u32>,
    /// Base announced for this agent at spawn.
    pub base: Rect,
    spawn: Vec2,
    last_decision: Option<Instant>,
    last_step: Option<Instant>,
    last_loss: Option<Instant>,
    ticks_since_fire: u32,
    explore_heading: Option<Direction>,
    memory: Memory,
    rng: StdRng,
}

impl AiAgent {
    /// Create an agent sitting in the middle of its base.
    pub fn new(
        id: u32,
        difficulty: Difficulty,
        personality: Personality,
        base: Rect,
        lives: i32,
        seed: u64,
    ) -> Self {
        let profile = DifficultyProfile::for_difficulty(difficulty);
        let (cx, cy) = base.center();
        let spawn = Vec2::new(cx as f32, cy as f32);
        let name = format!("{} [AI]", BOT_NAMES[id as usize % BOT_NAMES.len()]);

        Self {
            id,
            name,
            difficulty,
            personality,
            profile,
            pos: spawn,
            dir: Direction::Right,
            energy: MAX_ENERGY,
            health: MAX_HEALTH,
            score: 0,
            lives: lives.max(1),
            state: AiState::Idle,
            target: None,
            base,
            spawn,
            last_decision: None,
            last_step: None,
            last_loss: None,
            ticks_since_fire: profile.fire_cooldown_ticks,
            explore_heading: None,
            memory: Memory::default(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn profile(&self) -> &DifficultyProfile {
        &self.profile
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn is_alive(&self) -> bool {
        self.lives > 0
    }

    /// Run one tick: maybe re-decide, then act on the current state.
    pub fn update(&mut self, world: &WorldState<'_>) -> Vec<AiAction> {
        let mut actions = Vec::new();
        if !self.is_alive() {
            return actions;
        }

        let elapsed = match self.last_step {
            Some(t) => world.now.saturating_duration_since(t).min(MAX_STEP),
            None => FIRST_STEP,
        };
        self.last_step = Some(world.now);
        let step = SPEED * elapsed.as_secs_f32();

        self.observe(world);
        self.regenerate();
        self.ticks_since_fire = self.ticks_since_fire.saturating_add(1);

        let due = self.last_decision.is_none_or(|t| {
            world.now.saturating_duration_since(t) >= self.profile.decision_interval
        });
        if due {
            self.decide(world);
            self.last_decision = Some(world.now);
        }

        match self.state {
            AiState::Idle => {}
            AiState::Attacking => self.attack(world, step, &mut actions),
            AiState::Defending => self.defend(world, step, &mut actions),
            AiState::Retreating => self.retreat(world, step, &mut actions),
            AiState::Refueling => self.refuel(world, step, &mut actions),
            AiState::Exploring => self.explore(world, step, &mut actions),
        }
        actions
    }

    /// Apply a reported loss of this tank.
    pub fn lose_life(&mut self, now: Instant) -> LossOutcome {
        if !self.is_alive() {
            return LossOutcome::Ignored;
        }
        if let Some(last) = self.last_loss {
            if now.saturating_duration_since(last) < LOSS_DEBOUNCE {
                return LossOutcome::Ignored;
            }
        }
        self.last_loss = Some(now);
        self.lives -= 1;
        if self.lives <= 0 {
            self.state = AiState::Idle;
            self.target = None;
            return LossOutcome::Eliminated;
        }
        self.respawn();
        LossOutcome::Respawned
    }

    pub fn credit_kill(&mut self) {
        self.score += 1;
    }

    pub fn view(&self) -> TankView {
        TankView {
            id: self.id,
            pos: self.pos,
            health: self.health,
            energy: self.energy,
            lives: self.lives,
        }
    }

    pub fn tank_state(&self) -> TankState {
        TankState {
            id: self.id,
            x: self.pos.x.round() as i32,
            y: self.pos.y.round() as i32,
            dir: self.dir.code(),
            energy: self.energy,
            health: self.health,
            score: self.score,
            name: self.name.clone(),
            lives: self.lives,
        }
    }

    pub fn move_frame(&self) -> String {
        GameFrame::Move(self.tank_state()).encode()
    }

    /// Frames that make a freshly spawned agent visible to clients.
    pub fn announce_frames(&self) -> Vec<String> {
        vec![
            GameFrame::Join { id: self.id }.encode(),
            GameFrame::Name {
                id: self.id,
                name: self.name.clone(),
            }
            .encode(),
            GameFrame::Base {
                id: self.id,
                rect: self.base,
            }
            .encode(),
            self.move_frame(),
        ]
    }

    fn respawn(&mut self) {
        self.pos = self.spawn;
        self.energy = MAX_ENERGY;
        self.health = MAX_HEALTH;
        self.state = AiState::Idle;
        self.target = None;
        self.last_decision = None;
        self.explore_heading = None;
    }

    /// Own base, as learned from snapshots.
    fn home(&self) -> Option<Rect> {
        self.memory.bases.get(&self.id).copied()
    }

    fn observe(&mut self, world: &WorldState<'_>) {
        for tank in world.enemies_near(self.id, self.pos, SIGHT_RADIUS) {
            self.memory.record_sighting(tank.id, tank.pos, world.now);
        }
        let mut owners: Vec<u32> = world.bases.keys().copied().collect();
        owners.sort_unstable();
        for owner in owners {
            if let Some(rect) = world.bases.get(&owner) {
                self.memory.record_base(owner, *rect);
            }
        }
        self.memory.prune(world.now);
    }

    fn regenerate(&mut self) {
        let Some(home) = self.home() else {
            return;
        };
        if home.contains(self.pos.x as i32, self.pos.y as i32) {
            self.energy = (self.energy + ENERGY_REGEN).min(MAX_ENERGY);
            self.health = (self.health + HEALTH_REGEN).min(MAX_HEALTH);
        }
    }

    fn decide(&mut self, world: &WorldState<'_>) {
        let nearby = world.enemies_near(self.id, self.pos, SIGHT_RADIUS);
        let health = self.health as f32 / MAX_HEALTH as f32;
        let energy = self.energy as f32 / MAX_ENERGY as f32;

        let (state, target) = if health < self.profile.retreat_health || energy < CRITICAL_ENERGY {
            (AiState::Refueling, None)
        } else if !nearby.is_empty() && health < 0.5 {
            (AiState::Retreating, None)
        } else if self.personality == Personality::Aggressive && !nearby.is_empty() {
            (AiState::Attacking, self.nearest(&nearby).map(|t| t.id))
        } else if self.personality == Personality::Defensive {
            (AiState::Defending, None)
        } else if energy < self.profile.energy_threshold {
            (AiState::Refueling, None)
        } else if !nearby.is_empty() && self.rng.random_bool(self.profile.aggression) {
            (AiState::Attacking, self.select_target(&nearby).map(|t| t.id))
        } else {
            (AiState::Exploring, None)
        };

        if state != self.state {
            debug!("AI {} {:?} -> {:?} (target {:?})", self.id, self.state, state, target);
        }
        self.state = state;
        self.target = target;
    }

    fn nearest(&self, tanks: &[TankView]) -> Option<TankView> {
        tanks
            .iter()
            .min_by(|a, b| {
                a.pos
                    .distance(self.pos)
                    .total_cmp(&b.pos.distance(self.pos))
                    .then(a.id.cmp(&b.id))
            })
            .copied()
    }

    fn weakest(&self, tanks: &[TankView]) -> Option<TankView> {
        tanks
            .iter()
            .min_by(|a, b| {
                a.health
                    .cmp(&b.health)
                    .then(a.pos.distance(self.pos).total_cmp(&b.pos.distance(self.pos)))
                    .then(a.id.cmp(&b.id))
            })
            .copied()
    }

    fn select_target(&self, tanks: &[TankView]) -> Option<TankView> {
        match self.personality {
            Personality::Aggressive | Personality::Defensive => self.nearest(tanks),
            Personality::Balanced | Personality::Digger => self.weakest(tanks),
        }
    }

    fn attack(&mut self, world: &WorldState<'_>, step: f32, actions: &mut Vec<AiAction>) {
        let target = self
            .target
            .and_then(|id| world.tank(id))
            .filter(|t| t.is_alive())
            .copied();
        let Some(target) = target else {
            self.explore(world, step, actions);
            return;
        };

        let delta = target.pos - self.pos;
        let aim = Direction::from_vector(delta.x, delta.y);
        if delta.length() > STANDOFF {
            self.steer(world, aim, step, actions);
        } else {
            self.face(aim, actions);
        }
        self.fire_if_aligned(target.pos, actions);
    }

    fn defend(&mut self, world: &WorldState<'_>, step: f32, actions: &mut Vec<AiAction>) {
        let Some(home) = self.home() else {
            self.explore(world, step, actions);
            return;
        };
        let (cx, cy) = home.center();
        let center = Vec2::new(cx as f32, cy as f32);

        if self.pos.distance(center) > DEFEND_RADIUS {
            self.move_toward(world, center, step, actions);
            return;
        }

        let intruders = world.enemies_near(self.id, center, DEFEND_RADIUS + FIRE_RANGE);
        if let Some(enemy) = self.nearest(&intruders) {
            self.target = Some(enemy.id);
            let delta = enemy.pos - self.pos;
            let aim = Direction::from_vector(delta.x, delta.y);
            if delta.length() > FIRE_RANGE {
                self.steer(world, aim, step, actions);
            } else {
                self.face(aim, actions);
            }
            self.fire_if_aligned(enemy.pos, actions);
        } else if self.rng.random_bool(PATROL_CHANCE) {
            let dir = Direction::ALL[self.rng.random_range(0..Direction::ALL.len())];
            self.steer(world, dir, step, actions);
        }
    }

    fn retreat(&mut self, world: &WorldState<'_>, step: f32, actions: &mut Vec<AiAction>) {
        let nearby = world.enemies_near(self.id, self.pos, SIGHT_RADIUS);
        let threat = self.nearest(&nearby);

        match (self.home(), threat) {
            (Some(home), threat) => {
                if !home.contains(self.pos.x as i32, self.pos.y as i32) {
                    let (cx, cy) = home.center();
                    self.move_toward(world, Vec2::new(cx as f32, cy as f32), step, actions);
                } else if let Some(threat) = threat {
                    // Cornered at home: turn and shoot back.
                    let delta = threat.pos - self.pos;
                    self.face(Direction::from_vector(delta.x, delta.y), actions);
                    self.fire_if_aligned(threat.pos, actions);
                }
            }
            (None, Some(threat)) => {
                let away = self.pos - threat.pos;
                self.steer(world, Direction::from_vector(away.x, away.y), step, actions);
            }
            (None, None) => self.explore(world, step, actions),
        }
    }

    fn refuel(&mut self, world: &WorldState<'_>, step: f32, actions: &mut Vec<AiAction>) {
        let Some(home) = self.home() else {
            self.explore(world, step, actions);
            return;
        };
        if !home.contains(self.pos.x as i32, self.pos.y as i32) {
            let (cx, cy) = home.center();
            self.move_toward(world, Vec2::new(cx as f32, cy as f32), step, actions);
        }
    }

    fn explore(&mut self, world: &WorldState<'_>, step: f32, actions: &mut Vec<AiAction>) {
        self.memory.explored.visit(self.pos);

        if self.personality == Personality::Aggressive {
            if let Some((_, sighting)) = self.memory.latest_sighting() {
                if sighting.pos.distance(self.pos) > STANDOFF {
                    self.move_toward(world, sighting.pos, step, actions);
                    return;
                }
            }
        }

        let keep = self
            .explore_heading
            .filter(|&d| self.explore_score(world, d) < 1.0);
        let heading = match keep {
            Some(d) => d,
            None => self.pick_explore_heading(world),
        };
        self.explore_heading = Some(heading);
        self.steer(world, heading, step, actions);
    }

    /// Lower is better: revisits and obstacles cost.
    fn explore_score(&self, world: &WorldState<'_>, dir: Direction) -> f32 {
        let probe = self.pos + dir.vector() * EXPLORE_PROBE;
        let ahead = footprint(self.pos + dir.vector() * TANK_SIZE as f32);
        let mut score = 0.0;
        if self.memory.explored.contains(probe) {
            score += 1.0;
        }
        if world.terrain.rect_blocked(ahead) {
            score += 10.0;
        } else if self.personality != Personality::Digger && world.terrain.rect_has_dirt(ahead) {
            score += 0.5;
        }
        score
    }

    fn pick_explore_heading(&mut self, world: &WorldState<'_>) -> Direction {
        let scores: Vec<(Direction, f32)> = Direction::ALL
            .into_iter()
            .map(|d| (d, self.explore_score(world, d)))
            .collect();
        let best = scores
            .iter()
            .map(|(_, s)| *s)
            .fold(f32::INFINITY, f32::min);
        let candidates: Vec<Direction> = scores
            .into_iter()
            .filter(|(_, s)| (*s - best).abs() < 1e-3)
            .map(|(d, _)| d)
            .collect();
        if candidates.is_empty() {
            return Direction::ALL[self.rng.random_range(0..Direction::ALL.len())];
        }
        candidates[self.rng.random_range(0..candidates.len())]
    }

    fn move_toward(
        &mut self,
        world: &WorldState<'_>,
        goal: Vec2,
        step: f32,
        actions: &mut Vec<AiAction>,
    ) {
        let delta = goal - self.pos;
        if delta.length() < 1.0 {
            return;
        }
        self.steer(world, Direction::from_vector(delta.x, delta.y), step, actions);
    }

    /// Move roughly in `desired`, bending around rock and digging through dirt.
    fn steer(
        &mut self,
        world: &WorldState<'_>,
        desired: Direction,
        step: f32,
        actions: &mut Vec<AiAction>,
    ) -> bool {
        for offset in [0, 1, -1, 2, -2, 3, -3, 4] {
            let dir = desired.rotate(offset);
            let probe = footprint(self.pos + dir.vector() * step.max(1.0));
            if world.terrain.rect_blocked(probe) {
                continue;
            }
            if world.terrain.rect_has_dirt(probe) {
                actions.push(AiAction::Dig(probe));
                self.spend(DIG_COST);
            }
            self.pos += dir.vector() * step;
            self.dir = dir;
            self.spend(MOVE_COST);
            actions.push(AiAction::Move(dir));
            return true;
        }
        false
    }

    /// Turn on the spot.
    fn face(&mut self, dir: Direction, actions: &mut Vec<AiAction>) {
        self.dir = dir;
        actions.push(AiAction::Move(dir));
    }

    fn fire_if_aligned(&mut self, target: Vec2, actions: &mut Vec<AiAction>) {
        let delta = target - self.pos;
        if delta.length() > FIRE_RANGE || Direction::from_vector(delta.x, delta.y) != self.dir {
            return;
        }
        if self.ticks_since_fire < self.profile.fire_cooldown_ticks || self.energy < FIRE_COST {
            return;
        }
        if !self.rng.random_bool(self.profile.fire_chance) {
            return;
        }
        if !self.rng.random_bool(self.profile.accuracy) {
            return;
        }
        self.ticks_since_fire = 0;
        self.spend(FIRE_COST);
        actions.push(AiAction::Fire);
    }

    fn spend(&mut self, cost: i32) {
        self.energy = (self.energy - cost).clamp(0, MAX_ENERGY);
    }
}

/// Tank footprint centred on `pos`.
fn footprint(pos: Vec2) -> Rect {
    Rect::centered(pos.x.round() as i32, pos.y.round() as i32, TANK_SIZE, TANK_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{CELL_DIRT, CELL_ROCK, Terrain};
    use std::collections::HashMap;

    fn base_at(x: i32, y: i32) -> Rect {
        Rect::centered(x, y, 40, 32)
    }

    fn agent(personality: Personality, difficulty: Difficulty) -> AiAgent {
        AiAgent::new(1000, difficulty, personality, base_at(100, 100), 3, 42)
    }

    fn world<'a>(
        now: Instant,
        terrain: &'a Terrain,
        bases: &'a HashMap<u32, Rect>,
        tanks: Vec<TankView>,
    ) -> WorldState<'a> {
        WorldState {
            now,
            terrain,
            tanks,
            bases,
        }
    }

    fn enemy(id: u32, x: f32, y: f32, health: i32) -> TankView {
        TankView {
            id,
            pos: Vec2::new(x, y),
            health,
            energy: MAX_ENERGY,
            lives: 3,
        }
    }

    #[test]
    fn aggressive_agent_attacks_nearest() {
        let terrain = Terrain::open(400, 400);
        let mut bases = HashMap::new();
        let mut bot = agent(Personality::Aggressive, Difficulty::Hard);
        bases.insert(bot.id, bot.base);
        let tanks = vec![enemy(1, 150.0, 100.0, 10), enemy(2, 250.0, 100.0, 1)];
        let w = world(Instant::now(), &terrain, &bases, tanks);

        let actions = bot.update(&w);
        assert_eq!(bot.state, AiState::Attacking);
        assert_eq!(bot.target, Some(1));
        assert!(actions.contains(&AiAction::Move(Direction::Right)));
    }

    #[test]
    fn balanced_agent_picks_weakest_target() {
        let terrain = Terrain::open(400, 400);
        let bases = HashMap::new();
        // Hard balanced agents engage with probability 0.8; try a few seeds.
        let engaged = (0..16).any(|seed| {
            let mut bot = AiAgent::new(
                1000,
                Difficulty::Hard,
                Personality::Balanced,
                base_at(100, 100),
                3,
                seed,
            );
            let tanks = vec![enemy(1, 120.0, 100.0, 9), enemy(2, 200.0, 100.0, 2)];
            let w = world(Instant::now(), &terrain, &bases, tanks);
            bot.update(&w);
            bot.state == AiState::Attacking && bot.target == Some(2)
        });
        assert!(engaged);
    }

    #[test]
    fn low_health_forces_refueling() {
        let terrain = Terrain::open(400, 400);
        let mut bases = HashMap::new();
        let mut bot = agent(Personality::Aggressive, Difficulty::Normal);
        bot.health = 1;
        bot.pos = Vec2::new(300.0, 300.0);
        bases.insert(bot.id, bot.base);
        let w = world(Instant::now(), &terrain, &bases, vec![enemy(1, 310.0, 300.0, 10)]);

        let actions = bot.update(&w);
        assert_eq!(bot.state, AiState::Refueling);
        // Heads back up-left towards the base at (100, 100).
        assert!(actions.contains(&AiAction::Move(Direction::UpLeft)));
    }

    #[test]
    fn hurt_agent_retreats_from_nearby_enemy() {
        let terrain = Terrain::open(400, 400);
        let bases = HashMap::new();
        let mut bot = agent(Personality::Balanced, Difficulty::Easy);
        bot.health = 4;
        let w = world(Instant::now(), &terrain, &bases, vec![enemy(1, 130.0, 100.0, 10)]);

        let actions = bot.update(&w);
        assert_eq!(bot.state, AiState::Retreating);
        // No base known: flee directly away from the threat.
        assert_eq!(actions, vec![AiAction::Move(Direction::Left)]);
    }

    #[test]
    fn defending_without_base_degrades_to_exploring_moves() {
        let terrain = Terrain::open(400, 400);
        let bases = HashMap::new();
        let mut bot = agent(Personality::Defensive, Difficulty::Normal);
        let w = world(Instant::now(), &terrain, &bases, Vec::new());

        let actions = bot.update(&w);
        assert_eq!(bot.state, AiState::Defending);
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], AiAction::Move(_)));
    }

    #[test]
    fn missing_target_degrades_to_exploring() {
        let terrain = Terrain::open(400, 400);
        let bases = HashMap::new();
        let mut bot = agent(Personality::Aggressive, Difficulty::Easy);
        let now = Instant::now();
        bot.update(&world(now, &terrain, &bases, vec![enemy(1, 120.0, 100.0, 10)]));
        assert_eq!(bot.state, AiState::Attacking);

        // Target vanished before the next decision is due.
        let actions = bot.update(&world(now + Duration::from_millis(50), &terrain, &bases, Vec::new()));
        assert_eq!(bot.state, AiState::Attacking);
        assert!(matches!(actions.as_slice(), [AiAction::Move(_)]));
    }

    #[test]
    fn decisions_respect_interval() {
        let terrain = Terrain::open(400, 400);
        let bases = HashMap::new();
        let mut bot = agent(Personality::Aggressive, Difficulty::Easy);
        let now = Instant::now();
        bot.update(&world(now, &terrain, &bases, Vec::new()));
        assert_eq!(bot.state, AiState::Exploring);

        // An enemy appears, but easy bots re-decide only once a second.
        let near = vec![enemy(1, 120.0, 100.0, 10)];
        bot.update(&world(now + Duration::from_millis(300), &terrain, &bases, near.clone()));
        assert_eq!(bot.state, AiState::Exploring);
        bot.update(&world(now + Duration::from_millis(1000), &terrain, &bases, near));
        assert_eq!(bot.state, AiState::Attacking);
    }

    #[test]
    fn update_is_deterministic_for_identical_state() {
        let terrain = Terrain::open(400, 400);
        let bases = HashMap::new();
        let bot = agent(Personality::Balanced, Difficulty::Normal);
        let now = Instant::now();
        let tanks = vec![enemy(1, 150.0, 120.0, 5)];

        let mut a = bot.clone();
        let mut b = bot;
        let wa = world(now, &terrain, &bases, tanks.clone());
        let wb = world(now, &terrain, &bases, tanks);
        assert_eq!(a.update(&wa), b.update(&wb));
        assert_eq!(a.pos, b.pos);
        assert_eq!(a.state, b.state);
    }

    #[test]
    fn digs_through_dirt_and_avoids_rock() {
        let mut cells = vec![CELL_DIRT; 200 * 200];
        // Rock wall directly to the right of the spawn.
        for y in 0..200 {
            for x in 108..112 {
                cells[y * 200 + x] = CELL_ROCK;
            }
        }
        let terrain = Terrain::from_cells(200, 200, cells).unwrap();
        let bases = HashMap::new();
        let mut bot = agent(Personality::Digger, Difficulty::Normal);
        let mut actions = Vec::new();
        bot.steer(
            &world(Instant::now(), &terrain, &bases, Vec::new()),
            Direction::Right,
            12.0,
            &mut actions,
        );
        assert!(matches!(actions[0], AiAction::Dig(_)));
        assert!(matches!(actions[1], AiAction::Move(d) if d != Direction::Right));
        assert!(bot.energy < MAX_ENERGY);
    }

    #[test]
    fn fire_respects_cooldown_and_alignment() {
        let mut bot = agent(Personality::Aggressive, Difficulty::Hard);
        bot.dir = Direction::Right;
        let mut fired = 0;
        for _ in 0..50 {
            let mut actions = Vec::new();
            bot.ticks_since_fire = bot.ticks_since_fire.saturating_add(1);
            bot.fire_if_aligned(Vec2::new(150.0, 100.0), &mut actions);
            if actions.contains(&AiAction::Fire) {
                fired += 1;
                assert_eq!(bot.ticks_since_fire, 0);
            }
        }
        assert!(fired > 0);
        assert!(fired <= 25);

        // Target straight above: not aligned with a right-facing tank.
        let mut actions = Vec::new();
        bot.ticks_since_fire = 100;
        bot.fire_if_aligned(Vec2::new(100.0, 20.0), &mut actions);
        assert!(actions.is_empty());
    }

    #[test]
    fn losses_are_debounced_and_eliminate() {
        let mut bot = agent(Personality::Balanced, Difficulty::Normal);
        bot.pos = Vec2::new(300.0, 300.0);
        bot.energy = 10;
        let now = Instant::now();
        assert_eq!(bot.lose_life(now), LossOutcome::Respawned);
        assert_eq!(bot.pos, Vec2::new(100.0, 100.0));
        assert_eq!(bot.energy, MAX_ENERGY);
        assert_eq!(bot.lose_life(now + Duration::from_millis(100)), LossOutcome::Ignored);
        assert_eq!(bot.lose_life(now + Duration::from_secs(2)), LossOutcome::Respawned);
        assert_eq!(bot.lose_life(now + Duration::from_secs(4)), LossOutcome::Eliminated);
        assert!(!bot.is_alive());
        assert!(bot.update(&world(now, &Terrain::open(10, 10), &HashMap::new(), Vec::new())).is_empty());
    }

    #[test]
    fn regenerates_inside_own_base() {
        let terrain = Terrain::open(400, 400);
        let mut bot = agent(Personality::Defensive, Difficulty::Normal);
        let mut bases = HashMap::new();
        bases.insert(bot.id, bot.base);
        bot.energy = 500;
        bot.health = 8;
        bot.update(&world(Instant::now(), &terrain, &bases, Vec::new()));
        assert_eq!(bot.health, 9);
        assert!(bot.energy > 500);
        assert!(bot.energy <= MAX_ENERGY);
    }

    #[test]
    fn announce_frames_use_ai_range_id() {
        let bot = agent(Personality::Digger, Difficulty::Easy);
        let frames = bot.announce_frames();
        assert_eq!(frames[0], "J 1000");
        assert!(frames[1].starts_with("N 1000 "));
        assert_eq!(frames[2], "B 1000 80 84 40 32");
        assert!(frames[3].starts_with("M 1000 100 100 6 1000 10 0 "));
    }
}
