//! # Monster Behaviour
//!
//! Each monster carries a [`Behavior`] strategy picked from its template at
//! spawn. Once per turn the turn engine asks the strategy for a
//! [`MonsterIntent`] given a read-only [`WorldView`], then carries the intent
//! out itself. Deciding never mutates anything.

use crate::content::{ContentTables, MonsterTemplate, SpellEffect};
use crate::game::{fov, Direction, Monster, Position, RulesConfig, StatusKind, TileGrid};
use crate::utils::{next_step_toward, GameRng};
use serde::{Deserialize, Serialize};

/// Strategy tag stored on templates and monsters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    /// Close in and fight
    #[default]
    MeleePursue,
    /// Shoot from a distance, fight when cornered
    Ranged,
    /// Mix spells into melee pursuit
    Spellcaster,
    /// Always run once badly hurt
    FleeWhenLow,
    /// Hunt in groups and regroup when the player is out of sight
    Pack,
    /// Never moves
    Stationary,
}

/// What a monster wants to do this turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonsterIntent {
    Idle,
    Step(Position),
    MeleeAttack,
    RangedAttack,
    Cast { spell_id: String },
    /// Start fleeing, stepping away when there is room
    Flee { step: Option<Position> },
}

/// Read-only view of the level a monster decides against.
pub struct WorldView<'a> {
    pub grid: &'a TileGrid,
    pub player_position: Position,
    /// Every monster on the level, the deciding one included
    pub monsters: &'a [Monster],
    pub template: &'a MonsterTemplate,
    pub content: &'a ContentTables,
    pub rules: &'a RulesConfig,
}

impl WorldView<'_> {
    /// Whether a monster could step onto this cell.
    pub fn is_free(&self, pos: Position) -> bool {
        self.grid.is_walkable(pos)
            && pos != self.player_position
            && !self.monsters.iter().any(|other| other.position == pos)
    }

    /// The player is within detection range and in line of sight.
    pub fn can_see_player(&self, monster: &Monster) -> bool {
        monster.position.chebyshev_distance(self.player_position) <= self.template.detection_range
            && fov::line_of_sight(self.grid, monster.position, self.player_position)
    }
}

/// Turns a world view into an intent.
pub trait DecideAction {
    fn decide_action(&self, monster: &Monster, view: &WorldView, rng: &mut GameRng) -> MonsterIntent;
}

impl DecideAction for Behavior {
    fn decide_action(&self, monster: &Monster, view: &WorldView, rng: &mut GameRng) -> MonsterIntent {
        if monster.effects.has(StatusKind::Confused) {
            return random_step(monster, view, rng);
        }
        if !monster.hostile {
            return wander(monster, view, rng);
        }
        if monster.effects.has(StatusKind::Fleeing) || monster.effects.has(StatusKind::Fear) {
            return match flee_step(monster, view) {
                Some(step) => MonsterIntent::Step(step),
                None if is_adjacent(monster, view) => MonsterIntent::MeleeAttack,
                None => MonsterIntent::Idle,
            };
        }

        if !view.can_see_player(monster) {
            return match self {
                Behavior::Stationary => MonsterIntent::Idle,
                Behavior::Pack => regroup(monster, view).unwrap_or(MonsterIntent::Idle),
                _ => wander(monster, view, rng),
            };
        }

        if monster.hp_fraction() < view.rules.flee_threshold {
            let runs = match self {
                Behavior::FleeWhenLow => true,
                Behavior::Stationary => false,
                _ => rng.chance(view.template.flee_chance),
            };
            if runs {
                return MonsterIntent::Flee {
                    step: flee_step(monster, view),
                };
            }
        }

        let distance = monster.position.chebyshev_distance(view.player_position);

        if *self == Behavior::Spellcaster
            && distance <= view.rules.cast_range
            && rng.chance(view.rules.cast_chance)
        {
            if let Some(spell_id) = choose_spell(monster, view, rng) {
                return MonsterIntent::Cast { spell_id };
            }
        }

        if let Some(ranged) = &view.template.ranged {
            if distance > 1 && distance <= ranged.range {
                return MonsterIntent::RangedAttack;
            }
        }

        if distance <= 1 {
            return MonsterIntent::MeleeAttack;
        }

        match self {
            Behavior::Stationary => MonsterIntent::Idle,
            _ => pursue(monster, view),
        }
    }
}

fn is_adjacent(monster: &Monster, view: &WorldView) -> bool {
    monster.position.chebyshev_distance(view.player_position) == 1
}

/// One step along an A* path to the player, around other monsters.
fn pursue(monster: &Monster, view: &WorldView) -> MonsterIntent {
    let goal = view.player_position;
    next_step_toward(monster.position, goal, |pos| view.is_free(pos))
        .filter(|&step| step != goal)
        .map(MonsterIntent::Step)
        .unwrap_or(MonsterIntent::Idle)
}

/// The free neighbour that takes the monster farthest from the player,
/// if any of them improves on where it stands.
pub fn flee_step(monster: &Monster, view: &WorldView) -> Option<Position> {
    let player = view.player_position;
    let here = monster.position.euclidean_distance(player);
    monster
        .position
        .adjacent_positions()
        .into_iter()
        .filter(|&pos| view.is_free(pos))
        .map(|pos| (pos, pos.euclidean_distance(player)))
        .filter(|&(_, distance)| distance > here)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(pos, _)| pos)
}

fn random_step(monster: &Monster, view: &WorldView, rng: &mut GameRng) -> MonsterIntent {
    let directions = Direction::all();
    match rng.choose(&directions) {
        Some(&direction) => {
            let target = monster.position.step(direction);
            if target == view.player_position && monster.hostile {
                MonsterIntent::MeleeAttack
            } else if view.is_free(target) {
                MonsterIntent::Step(target)
            } else {
                MonsterIntent::Idle
            }
        }
        None => MonsterIntent::Idle,
    }
}

/// Unaware monsters drift about half the time.
fn wander(monster: &Monster, view: &WorldView, rng: &mut GameRng) -> MonsterIntent {
    if !rng.chance(0.5) {
        return MonsterIntent::Idle;
    }
    let directions = Direction::all();
    match rng.choose(&directions) {
        Some(&direction) if view.is_free(monster.position.step(direction)) => {
            MonsterIntent::Step(monster.position.step(direction))
        }
        _ => MonsterIntent::Idle,
    }
}

/// Moves a pack member toward its nearest packmate when it has strayed.
fn regroup(monster: &Monster, view: &WorldView) -> Option<MonsterIntent> {
    let pack = monster.pack_id?;
    let mate = view
        .monsters
        .iter()
        .filter(|other| other.id != monster.id && other.pack_id == Some(pack))
        .min_by_key(|other| other.position.chebyshev_distance(monster.position))?;
    if mate.position.chebyshev_distance(monster.position) <= 2 {
        return None;
    }
    next_step_toward(monster.position, mate.position, |pos| view.is_free(pos))
        .filter(|&step| step != mate.position)
        .map(MonsterIntent::Step)
}

/// Mana a monster pays for a spell: the cheapest class cost.
pub fn monster_spell_cost(content: &ContentTables, spell_id: &str) -> Option<i32> {
    let spell = content.spell(spell_id).ok()?;
    spell.classes.values().map(|info| info.mana).min()
}

fn choose_spell(monster: &Monster, view: &WorldView, rng: &mut GameRng) -> Option<String> {
    let sees = fov::line_of_sight(view.grid, monster.position, view.player_position);
    let castable: Vec<&String> = view
        .template
        .spells
        .iter()
        .filter(|id| {
            let Some(cost) = monster_spell_cost(view.content, id) else {
                return false;
            };
            if cost > monster.mana {
                return false;
            }
            match view.content.spell(id).map(|spell| &spell.effect) {
                Ok(SpellEffect::Bolt { .. }) => sees,
                Ok(SpellEffect::Heal { .. }) => monster.hp < monster.max_hp,
                Ok(SpellEffect::ApplyStatus { .. }) => true,
                Ok(SpellEffect::SleepMonsters { .. }) => sees,
                _ => false,
            }
        })
        .collect();
    rng.choose(&castable).map(|id| (*id).clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        grid: TileGrid,
        content: ContentTables,
        rules: RulesConfig,
    }

    fn fixture() -> Fixture {
        let grid = TileGrid::from_rows(
            1,
            &[
                "############",
                "#<.........#",
                "#..........#",
                "#..........#",
                "#.........>#",
                "############",
            ],
        )
        .unwrap();
        Fixture {
            grid,
            content: ContentTables::builtin().unwrap(),
            rules: RulesConfig::default(),
        }
    }

    fn spawn(content: &ContentTables, id: &str, pos: Position) -> Monster {
        let mut monster = Monster::from_template(content.monster(id).unwrap(), pos, &mut GameRng::new(1));
        monster.asleep = false;
        monster
    }

    fn view<'a>(f: &'a Fixture, monsters: &'a [Monster], player: Position, id: &str) -> WorldView<'a> {
        WorldView {
            grid: &f.grid,
            player_position: player,
            monsters,
            template: f.content.monster(id).unwrap(),
            content: &f.content,
            rules: &f.rules,
        }
    }

    #[test]
    fn test_adjacent_melee() {
        let f = fixture();
        let monsters = vec![spawn(&f.content, "kobold", Position::new(3, 2))];
        let v = view(&f, &monsters, Position::new(2, 2), "kobold");
        let intent = Behavior::MeleePursue.decide_action(&monsters[0], &v, &mut GameRng::new(1));
        assert_eq!(intent, MonsterIntent::MeleeAttack);
    }

    #[test]
    fn test_pursuit_closes_distance() {
        let f = fixture();
        let monsters = vec![spawn(&f.content, "kobold", Position::new(8, 3))];
        let player = Position::new(2, 3);
        let v = view(&f, &monsters, player, "kobold");
        match Behavior::MeleePursue.decide_action(&monsters[0], &v, &mut GameRng::new(1)) {
            MonsterIntent::Step(step) => {
                assert!(step.chebyshev_distance(player) < monsters[0].position.chebyshev_distance(player))
            }
            other => panic!("expected a step, got {:?}", other),
        }
    }

    #[test]
    fn test_ranged_shoots_at_distance() {
        let f = fixture();
        let monsters = vec![spawn(&f.content, "kobold_archer", Position::new(6, 2))];
        let v = view(&f, &monsters, Position::new(2, 2), "kobold_archer");
        let intent = Behavior::Ranged.decide_action(&monsters[0], &v, &mut GameRng::new(1));
        assert_eq!(intent, MonsterIntent::RangedAttack);
    }

    #[test]
    fn test_stationary_never_moves() {
        let f = fixture();
        let monsters = vec![spawn(&f.content, "floating_eye", Position::new(8, 3))];
        let v = view(&f, &monsters, Position::new(2, 3), "floating_eye");
        for seed in 0..10 {
            let intent = Behavior::Stationary.decide_action(&monsters[0], &v, &mut GameRng::new(seed));
            assert_eq!(intent, MonsterIntent::Idle);
        }
    }

    #[test]
    fn test_flee_when_low_runs() {
        let f = fixture();
        let mut goblin = spawn(&f.content, "goblin_skulker", Position::new(5, 2));
        goblin.hp = 1;
        goblin.max_hp = 20;
        let monsters = vec![goblin];
        let v = view(&f, &monsters, Position::new(4, 2), "goblin_skulker");
        match Behavior::FleeWhenLow.decide_action(&monsters[0], &v, &mut GameRng::new(3)) {
            MonsterIntent::Flee { step: Some(step) } => {
                assert!(step.chebyshev_distance(Position::new(4, 2)) >= 1);
                assert!(step.x > 5);
            }
            other => panic!("expected to flee, got {:?}", other),
        }
    }

    #[test]
    fn test_fleeing_monster_steps_away() {
        let f = fixture();
        let mut kobold = spawn(&f.content, "kobold", Position::new(5, 2));
        kobold.effects.add(StatusKind::Fleeing, 5, 0);
        let monsters = vec![kobold];
        let player = Position::new(4, 2);
        let v = view(&f, &monsters, player, "kobold");
        match Behavior::MeleePursue.decide_action(&monsters[0], &v, &mut GameRng::new(1)) {
            MonsterIntent::Step(step) => assert!(step.euclidean_distance(player) > 1.0),
            other => panic!("expected a step, got {:?}", other),
        }
    }

    #[test]
    fn test_unaware_pack_regroups() {
        let f = fixture();
        let mut a = spawn(&f.content, "jackal", Position::new(2, 1));
        let mut b = spawn(&f.content, "jackal", Position::new(9, 4));
        b.id = GameRng::new(99).uuid();
        a.pack_id = Some(0);
        b.pack_id = Some(0);
        let monsters = vec![a, b];
        // Far outside the jackal's detection range.
        let mut far = f.content.monster("jackal").unwrap().clone();
        far.detection_range = 0;
        let v = WorldView {
            grid: &f.grid,
            player_position: Position::new(10, 1),
            monsters: &monsters,
            template: &far,
            content: &f.content,
            rules: &f.rules,
        };
        match Behavior::Pack.decide_action(&monsters[0], &v, &mut GameRng::new(1)) {
            MonsterIntent::Step(step) => assert!(
                step.chebyshev_distance(Position::new(9, 4)) < Position::new(2, 1).chebyshev_distance(Position::new(9, 4))
            ),
            other => panic!("expected to regroup, got {:?}", other),
        }
    }

    #[test]
    fn test_peaceful_never_attacks() {
        let f = fixture();
        let monsters = vec![spawn(&f.content, "scruffy_dog", Position::new(3, 2))];
        let v = view(&f, &monsters, Position::new(2, 2), "scruffy_dog");
        for seed in 0..20 {
            let intent = Behavior::MeleePursue.decide_action(&monsters[0], &v, &mut GameRng::new(seed));
            assert!(matches!(intent, MonsterIntent::Idle | MonsterIntent::Step(_)));
        }
    }

    #[test]
    fn test_caster_needs_mana() {
        let f = fixture();
        let mut shaman = spawn(&f.content, "orc_shaman", Position::new(6, 2));
        shaman.mana = 0;
        let monsters = vec![shaman];
        let v = view(&f, &monsters, Position::new(2, 2), "orc_shaman");
        for seed in 0..20 {
            let intent = Behavior::Spellcaster.decide_action(&monsters[0], &v, &mut GameRng::new(seed));
            assert!(!matches!(intent, MonsterIntent::Cast { .. }));
        }
        assert_eq!(monster_spell_cost(&f.content, "magic_missile"), Some(1));
    }
}
