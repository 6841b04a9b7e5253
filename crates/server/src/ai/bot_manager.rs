use super::agent::{AiAction, AiAgent};
use super::world::{TankView, WorldState};
use super::{BASE_HEIGHT, BASE_WIDTH};
use protocol::{AiOpponents, Personality, PlayerId, Rect};

/// AI agents of one room.
#[derive(Debug, Default)]
pub struct AiRoster {
    /// Active agents, in spawn order.
    pub agents: Vec<AiAgent>,
    /// Next agent index; wire ids are never reused.
    next_index: u32,
}

impl AiRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn every agent described by `ai`, spread across a `width`x`height` map.
    ///
    /// Returns the ids of the new agents. Bases are laid out left to right,
    /// alternating above and below the middle of the map.
    pub fn spawn_all(
        &mut self,
        ai: &AiOpponents,
        lives: i32,
        width: u32,
        height: u32,
        seed: u32,
    ) -> Vec<u32> {
        let count = ai.count;
        let mut ids = Vec::with_capacity(count as usize);
        for i in 0..count {
            let x = (width as i64 * (i as i64 + 1) / (count as i64 + 1)) as i32;
            let quarter = height as i32 / 4;
            let y = if i % 2 == 0 {
                height as i32 / 2 - quarter
            } else {
                height as i32 / 2 + quarter
            };
            let base = clamp_base(Rect::centered(x, y, BASE_WIDTH, BASE_HEIGHT), width, height);
            let personality = ai
                .personality
                .fixed()
                .unwrap_or(Personality::ALL[i as usize % Personality::ALL.len()]);
            ids.push(self.spawn(ai.difficulty, personality, base, lives, seed));
        }
        ids
    }

    /// Spawn one agent and return its wire id.
    pub fn spawn(
        &mut self,
        difficulty: protocol::Difficulty,
        personality: Personality,
        base: Rect,
        lives: i32,
        seed: u32,
    ) -> u32 {
        let id = PlayerId::Ai(self.next_index).wire();
        self.next_index += 1;
        let agent_seed = ((seed as u64) << 32) ^ id as u64;
        self.agents
            .push(AiAgent::new(id, difficulty, personality, base, lives, agent_seed));
        id
    }

    pub fn get(&self, id: u32) -> Option<&AiAgent> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut AiAgent> {
        self.agents.iter_mut().find(|a| a.id == id)
    }

    pub fn remove(&mut self, id: u32) -> Option<AiAgent> {
        let index = self.agents.iter().position(|a| a.id == id)?;
        Some(self.agents.remove(index))
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn views(&self) -> impl Iterator<Item = TankView> + '_ {
        self.agents.iter().map(AiAgent::view)
    }

    /// Run every agent against the same snapshot. Nothing is applied here.
    pub fn update(&mut self, world: &WorldState<'_>) -> Vec<(u32, Vec<AiAction>)> {
        self.agents
            .iter_mut()
            .map(|agent| (agent.id, agent.update(world)))
            .collect()
    }
}

/// Keep a base fully inside the map.
fn clamp_base(rect: Rect, width: u32, height: u32) -> Rect {
    let max_x = (width as i32 - rect.w).max(0);
    let max_y = (height as i32 - rect.h).max(0);
    Rect::new(rect.x.clamp(0, max_x), rect.y.clamp(0, max_y), rect.w, rect.h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{AI_ID_BASE, Difficulty, PersonalityMode};

    fn opponents(count: u32) -> AiOpponents {
        AiOpponents {
            count,
            difficulty: Difficulty::Normal,
            personality: PersonalityMode::Mixed,
        }
    }

    #[test]
    fn spawn_assigns_ai_range_ids() {
        let mut roster = AiRoster::new();
        let ids = roster.spawn_all(&opponents(2), 3, 800, 400, 7);
        assert_eq!(ids, vec![AI_ID_BASE, AI_ID_BASE + 1]);
        assert_eq!(roster.len(), 2);
        assert!(ids.iter().all(|&id| PlayerId::from_wire(id).is_ai()));
    }

    #[test]
    fn bases_are_spread_and_inside_the_map() {
        let mut roster = AiRoster::new();
        roster.spawn_all(&opponents(5), 3, 800, 400, 1);
        let bases: Vec<Rect> = roster.agents.iter().map(|a| a.base).collect();
        for pair in bases.windows(2) {
            assert!(pair[1].x > pair[0].x);
            assert_ne!(pair[1].y, pair[0].y);
        }
        for b in &bases {
            assert!(b.x >= 0 && b.y >= 0 && b.x + b.w <= 800 && b.y + b.h <= 400);
        }
    }

    #[test]
    fn personalities_rotate_unless_fixed() {
        let mut roster = AiRoster::new();
        roster.spawn_all(&opponents(4), 3, 800, 400, 1);
        let tags: Vec<Personality> = roster.agents.iter().map(|a| a.personality).collect();
        assert_eq!(tags, Personality::ALL.to_vec());

        let mut fixed = AiRoster::new();
        let ai = AiOpponents {
            personality: PersonalityMode::Digger,
            ..opponents(3)
        };
        fixed.spawn_all(&ai, 3, 800, 400, 1);
        assert!(fixed.agents.iter().all(|a| a.personality == Personality::Digger));
    }

    #[test]
    fn removed_ids_are_not_reused() {
        let mut roster = AiRoster::new();
        roster.spawn_all(&opponents(2), 3, 800, 400, 1);
        assert!(roster.remove(AI_ID_BASE).is_some());
        assert!(roster.remove(AI_ID_BASE).is_none());
        let id = roster.spawn(Difficulty::Easy, Personality::Balanced, Rect::new(0, 0, 40, 32), 3, 1);
        assert_eq!(id, AI_ID_BASE + 2);
    }
}
