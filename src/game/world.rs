//! # World Representation
//!
//! Tile grids, visibility maps, ground items and the per-depth level cache.
//!
//! Grids and visibility maps serialize as rows of glyphs so save files stay
//! compact and readable.

use crate::game::{EntityId, ItemStack, Monster, Position, Trap};
use crate::{GloomError, GloomResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// State of a door tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DoorState {
    Closed,
    Open,
    /// Looks and behaves like a wall until found by searching
    SecretHidden,
    /// A discovered secret door; behaves like a closed door
    SecretFound,
}

/// The terrain occupying a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terrain {
    Wall,
    Floor,
    Door(DoorState),
    StairsUp,
    StairsDown,
    QuartzVein,
    MagmaVein,
    Rubble,
}

impl Terrain {
    /// Whether a creature can stand on this cell.
    pub fn is_walkable(self) -> bool {
        matches!(
            self,
            Terrain::Floor | Terrain::Door(DoorState::Open) | Terrain::StairsUp | Terrain::StairsDown
        )
    }

    /// Whether the cell stops line of sight.
    pub fn blocks_sight(self) -> bool {
        !self.is_walkable()
    }

    /// Whether the cell connects areas for level-validity purposes.
    ///
    /// Doors count in every state; a closed or secret door is still a way
    /// through.
    pub fn is_connective(self) -> bool {
        self.is_walkable() || matches!(self, Terrain::Door(_))
    }

    /// A closed door the player can open by walking into it.
    pub fn is_openable_door(self) -> bool {
        matches!(
            self,
            Terrain::Door(DoorState::Closed) | Terrain::Door(DoorState::SecretFound)
        )
    }

    /// Digging hardness, or `None` for terrain that cannot be tunnelled.
    pub fn hardness(self) -> Option<u32> {
        match self {
            Terrain::Rubble => Some(1),
            Terrain::QuartzVein => Some(3),
            Terrain::MagmaVein => Some(5),
            Terrain::Wall => Some(8),
            _ => None,
        }
    }

    /// Glyph written into save files. Every terrain has a distinct glyph.
    pub fn save_glyph(self) -> char {
        match self {
            Terrain::Wall => '#',
            Terrain::Floor => '.',
            Terrain::Door(DoorState::Closed) => '+',
            Terrain::Door(DoorState::Open) => '\'',
            Terrain::Door(DoorState::SecretHidden) => 'S',
            Terrain::Door(DoorState::SecretFound) => 's',
            Terrain::StairsUp => '<',
            Terrain::StairsDown => '>',
            Terrain::QuartzVein => '%',
            Terrain::MagmaVein => '*',
            Terrain::Rubble => ':',
        }
    }

    /// Glyph shown to the player. Hidden secret doors look like walls.
    pub fn display_glyph(self) -> char {
        match self {
            Terrain::Door(DoorState::SecretHidden) => '#',
            Terrain::Door(DoorState::SecretFound) => '+',
            other => other.save_glyph(),
        }
    }

    /// Parses a save glyph back into terrain.
    pub fn from_save_glyph(glyph: char) -> Option<Terrain> {
        let terrain = match glyph {
            '#' => Terrain::Wall,
            '.' => Terrain::Floor,
            '+' => Terrain::Door(DoorState::Closed),
            '\'' => Terrain::Door(DoorState::Open),
            'S' => Terrain::Door(DoorState::SecretHidden),
            's' => Terrain::Door(DoorState::SecretFound),
            '<' => Terrain::StairsUp,
            '>' => Terrain::StairsDown,
            '%' => Terrain::QuartzVein,
            '*' => Terrain::MagmaVein,
            ':' => Terrain::Rubble,
            _ => return None,
        };
        Some(terrain)
    }
}

/// A fixed-size rectangular grid of terrain for one depth.
///
/// # Examples
///
/// ```
/// use gloomdeep::{Position, Terrain, TileGrid};
///
/// let grid = TileGrid::from_rows(1, &["#####", "#<.>#", "#####"]).unwrap();
/// assert_eq!(grid.width, 5);
/// assert_eq!(grid.get(Position::new(2, 1)), Some(Terrain::Floor));
/// assert_eq!(grid.entry, Position::new(1, 1));
/// assert_eq!(grid.stairs_down, Some(Position::new(3, 1)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GridRecord", into = "GridRecord")]
pub struct TileGrid {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    cells: Vec<Terrain>,
    /// Where the player arrives when entering from above (stairs-up in the
    /// dungeon, the road in town)
    pub entry: Position,
    /// The single stairs-down cell, if any
    pub stairs_down: Option<Position>,
}

impl TileGrid {
    /// Creates a grid filled entirely with wall.
    pub fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
            cells: vec![Terrain::Wall; (width * height) as usize],
            entry: Position::new(1, 1),
            stairs_down: None,
        }
    }

    /// A walled room with `<` in the top-left corner and `>` in the
    /// bottom-right one.
    pub fn open_room(width: u32, height: u32, depth: u32) -> Self {
        let mut grid = Self::new(width, height, depth);
        let exit = Position::new(width as i32 - 2, height as i32 - 2);
        let cells = grid
            .positions()
            .map(|pos| {
                if grid.is_border(pos) {
                    Terrain::Wall
                } else if pos == exit {
                    Terrain::StairsDown
                } else if pos == grid.entry {
                    Terrain::StairsUp
                } else {
                    Terrain::Floor
                }
            })
            .collect();
        grid.cells = cells;
        grid.stairs_down = Some(exit);
        grid
    }

    /// Builds a grid from save glyph rows.
    ///
    /// The entry is the first `<` found (or the first floor cell when there is
    /// none) and `stairs_down` the first `>`.
    pub fn from_rows<S: AsRef<str>>(depth: u32, rows: &[S]) -> GloomResult<Self> {
        let height = rows.len() as u32;
        let width = rows
            .first()
            .map(|row| row.as_ref().chars().count() as u32)
            .unwrap_or(0);
        if width == 0 || height == 0 {
            return Err(GloomError::CorruptSave("empty tile grid".to_string()));
        }

        let mut grid = TileGrid::new(width, height, depth);
        let mut entry = None;
        let mut first_floor = None;

        for (y, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.chars().count() as u32 != width {
                return Err(GloomError::CorruptSave(format!(
                    "grid row {} has length {}, expected {}",
                    y,
                    row.chars().count(),
                    width
                )));
            }
            for (x, glyph) in row.chars().enumerate() {
                let terrain = Terrain::from_save_glyph(glyph).ok_or_else(|| {
                    GloomError::CorruptSave(format!("unknown terrain glyph '{}'", glyph))
                })?;
                let pos = Position::new(x as i32, y as i32);
                grid.set(pos, terrain)?;
                match terrain {
                    Terrain::StairsUp if entry.is_none() => entry = Some(pos),
                    Terrain::StairsDown if grid.stairs_down.is_none() => {
                        grid.stairs_down = Some(pos)
                    }
                    Terrain::Floor if first_floor.is_none() => first_floor = Some(pos),
                    _ => {}
                }
            }
        }

        grid.entry = entry.or(first_floor).unwrap_or(Position::new(1, 1));
        Ok(grid)
    }

    /// Renders the grid back into save glyph rows.
    pub fn to_rows(&self) -> Vec<String> {
        (0..self.height as i32)
            .map(|y| {
                (0..self.width as i32)
                    .map(|x| self.cells[self.index(Position::new(x, y))].save_glyph())
                    .collect()
            })
            .collect()
    }

    /// Checks whether a position lies inside the grid.
    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width as i32 && pos.y < self.height as i32
    }

    /// Whether a position lies on the outermost ring of cells.
    pub fn is_border(&self, pos: Position) -> bool {
        self.in_bounds(pos)
            && (pos.x == 0
                || pos.y == 0
                || pos.x == self.width as i32 - 1
                || pos.y == self.height as i32 - 1)
    }

    /// Clamps a position to the nearest in-bounds cell.
    pub fn clamp(&self, pos: Position) -> Position {
        Position::new(
            pos.x.clamp(0, self.width as i32 - 1),
            pos.y.clamp(0, self.height as i32 - 1),
        )
    }

    fn index(&self, pos: Position) -> usize {
        (pos.y as u32 * self.width + pos.x as u32) as usize
    }

    /// Terrain at a position, or `None` outside the grid.
    pub fn get(&self, pos: Position) -> Option<Terrain> {
        if self.in_bounds(pos) {
            Some(self.cells[self.index(pos)])
        } else {
            None
        }
    }

    /// Replaces the terrain at a position.
    pub fn set(&mut self, pos: Position, terrain: Terrain) -> GloomResult<()> {
        if !self.in_bounds(pos) {
            return Err(GloomError::InvalidState(format!(
                "position ({}, {}) is outside the {}x{} grid",
                pos.x, pos.y, self.width, self.height
            )));
        }
        let index = self.index(pos);
        self.cells[index] = terrain;
        Ok(())
    }

    /// Whether a creature may stand at this position.
    pub fn is_walkable(&self, pos: Position) -> bool {
        self.get(pos).map(Terrain::is_walkable).unwrap_or(false)
    }

    /// Whether this position blocks sight; out of bounds counts as opaque.
    pub fn blocks_sight(&self, pos: Position) -> bool {
        self.get(pos).map(Terrain::blocks_sight).unwrap_or(true)
    }

    /// Iterates over every position in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.height as i32)
            .flat_map(move |y| (0..self.width as i32).map(move |x| Position::new(x, y)))
    }

    /// All positions holding terrain that satisfies `predicate`.
    pub fn find<F>(&self, predicate: F) -> Vec<Position>
    where
        F: Fn(Terrain) -> bool,
    {
        self.positions()
            .filter(|&pos| self.get(pos).map(&predicate).unwrap_or(false))
            .collect()
    }

    /// Number of cells holding terrain that satisfies `predicate`.
    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(Terrain) -> bool,
    {
        self.cells.iter().filter(|&&terrain| predicate(terrain)).count()
    }
}

/// Serialized shape of a [`TileGrid`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GridRecord {
    depth: u32,
    rows: Vec<String>,
    entry: Position,
    #[serde(default)]
    stairs_down: Option<Position>,
}

impl TryFrom<GridRecord> for TileGrid {
    type Error = GloomError;

    fn try_from(record: GridRecord) -> GloomResult<Self> {
        let mut grid = TileGrid::from_rows(record.depth, &record.rows)?;
        if !grid.in_bounds(record.entry) {
            return Err(GloomError::CorruptSave("entry lies outside the grid".to_string()));
        }
        grid.entry = record.entry;
        grid.stairs_down = record.stairs_down;
        Ok(grid)
    }
}

impl From<TileGrid> for GridRecord {
    fn from(grid: TileGrid) -> Self {
        GridRecord {
            depth: grid.depth,
            rows: grid.to_rows(),
            entry: grid.entry,
            stairs_down: grid.stairs_down,
        }
    }
}

/// What the player knows about a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    Unseen,
    Remembered,
    Visible,
}

impl Visibility {
    fn digit(self) -> char {
        match self {
            Visibility::Unseen => '0',
            Visibility::Remembered => '1',
            Visibility::Visible => '2',
        }
    }

    fn from_digit(digit: char) -> Option<Self> {
        match digit {
            '0' => Some(Visibility::Unseen),
            '1' => Some(Visibility::Remembered),
            '2' => Some(Visibility::Visible),
            _ => None,
        }
    }
}

/// Per-cell visibility for one grid, updated in place by the FOV engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "VisibilityRecord", into = "VisibilityRecord")]
pub struct VisibilityMap {
    pub width: u32,
    pub height: u32,
    cells: Vec<Visibility>,
}

impl VisibilityMap {
    /// Creates a map where every cell is unseen.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![Visibility::Unseen; (width * height) as usize],
        }
    }

    /// Creates an unseen map matching a grid's dimensions.
    pub fn for_grid(grid: &TileGrid) -> Self {
        Self::new(grid.width, grid.height)
    }

    fn index(&self, pos: Position) -> Option<usize> {
        if pos.x >= 0 && pos.y >= 0 && pos.x < self.width as i32 && pos.y < self.height as i32 {
            Some((pos.y as u32 * self.width + pos.x as u32) as usize)
        } else {
            None
        }
    }

    /// Visibility at a position; out of bounds reads as unseen.
    pub fn get(&self, pos: Position) -> Visibility {
        self.index(pos)
            .map(|index| self.cells[index])
            .unwrap_or(Visibility::Unseen)
    }

    pub fn set(&mut self, pos: Position, visibility: Visibility) {
        if let Some(index) = self.index(pos) {
            self.cells[index] = visibility;
        }
    }

    pub fn is_visible(&self, pos: Position) -> bool {
        self.get(pos) == Visibility::Visible
    }

    /// Whether the cell has ever been seen.
    pub fn is_known(&self, pos: Position) -> bool {
        self.get(pos) != Visibility::Unseen
    }

    /// Turns every visible cell into a remembered one.
    pub fn fade_visible(&mut self) {
        for cell in &mut self.cells {
            if *cell == Visibility::Visible {
                *cell = Visibility::Remembered;
            }
        }
    }

    /// Marks every cell visible.
    pub fn reveal_all(&mut self) {
        self.cells.fill(Visibility::Visible);
    }

    pub fn count(&self, visibility: Visibility) -> usize {
        self.cells.iter().filter(|&&cell| cell == visibility).count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VisibilityRecord {
    width: u32,
    rows: Vec<String>,
}

impl TryFrom<VisibilityRecord> for VisibilityMap {
    type Error = GloomError;

    fn try_from(record: VisibilityRecord) -> GloomResult<Self> {
        let height = record.rows.len() as u32;
        let mut map = VisibilityMap::new(record.width, height);
        for (y, row) in record.rows.iter().enumerate() {
            if row.chars().count() as u32 != record.width {
                return Err(GloomError::CorruptSave(format!(
                    "visibility row {} has the wrong length",
                    y
                )));
            }
            for (x, digit) in row.chars().enumerate() {
                let visibility = Visibility::from_digit(digit).ok_or_else(|| {
                    GloomError::CorruptSave(format!("unknown visibility digit '{}'", digit))
                })?;
                map.set(Position::new(x as i32, y as i32), visibility);
            }
        }
        Ok(map)
    }
}

impl From<VisibilityMap> for VisibilityRecord {
    fn from(map: VisibilityMap) -> Self {
        let rows = map
            .cells
            .chunks(map.width.max(1) as usize)
            .map(|row| row.iter().map(|cell| cell.digit()).collect())
            .collect();
        VisibilityRecord {
            width: map.width,
            rows,
        }
    }
}

/// Something lying on the floor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroundItem {
    Gold(u32),
    Item(ItemStack),
}

/// All ground items on one cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundPile {
    pub position: Position,
    pub items: Vec<GroundItem>,
}

/// Everything cached for one depth: terrain, what the player has seen,
/// the live monsters and the floor loot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub grid: TileGrid,
    pub visibility: VisibilityMap,
    /// Live monsters in spawn order; this is also their turn order
    #[serde(default)]
    pub monsters: Vec<Monster>,
    #[serde(default)]
    pub ground: Vec<GroundPile>,
    #[serde(default)]
    pub traps: Vec<Trap>,
    /// Partial tunnelling progress per cell
    #[serde(default)]
    pub dig_progress: BTreeMap<String, u32>,
}

impl Level {
    /// Wraps a freshly generated grid with an empty cache.
    pub fn new(grid: TileGrid) -> Self {
        let visibility = VisibilityMap::for_grid(&grid);
        Self {
            grid,
            visibility,
            monsters: Vec::new(),
            ground: Vec::new(),
            traps: Vec::new(),
            dig_progress: BTreeMap::new(),
        }
    }

    pub fn depth(&self) -> u32 {
        self.grid.depth
    }

    /// The monster standing on a cell, if any.
    pub fn monster_at(&self, pos: Position) -> Option<&Monster> {
        self.monsters.iter().find(|monster| monster.position == pos)
    }

    pub fn monster_index_at(&self, pos: Position) -> Option<usize> {
        self.monsters.iter().position(|monster| monster.position == pos)
    }

    pub fn monster(&self, id: EntityId) -> Option<&Monster> {
        self.monsters.iter().find(|monster| monster.id == id)
    }

    pub fn monster_mut(&mut self, id: EntityId) -> Option<&mut Monster> {
        self.monsters.iter_mut().find(|monster| monster.id == id)
    }

    pub fn trap_at(&self, pos: Position) -> Option<&Trap> {
        self.traps.iter().find(|trap| trap.position == pos)
    }

    pub fn trap_at_mut(&mut self, pos: Position) -> Option<&mut Trap> {
        self.traps.iter_mut().find(|trap| trap.position == pos)
    }

    /// Takes the trap off a cell.
    pub fn remove_trap(&mut self, pos: Position) -> Option<Trap> {
        let index = self.traps.iter().position(|trap| trap.position == pos)?;
        Some(self.traps.remove(index))
    }

    /// Whether a monster could step onto this cell.
    pub fn is_free(&self, pos: Position) -> bool {
        self.grid.is_walkable(pos) && self.monster_at(pos).is_none()
    }

    /// Items lying on a cell.
    pub fn items_at(&self, pos: Position) -> &[GroundItem] {
        self.ground
            .iter()
            .find(|pile| pile.position == pos)
            .map(|pile| pile.items.as_slice())
            .unwrap_or(&[])
    }

    /// Drops an item on a cell, merging gold with any gold already there.
    pub fn add_ground_item(&mut self, pos: Position, item: GroundItem) {
        let index = match self.ground.iter().position(|pile| pile.position == pos) {
            Some(index) => index,
            None => {
                self.ground.push(GroundPile {
                    position: pos,
                    items: Vec::new(),
                });
                self.ground.len() - 1
            }
        };
        let pile = &mut self.ground[index];

        if let GroundItem::Gold(amount) = item {
            for existing in &mut pile.items {
                if let GroundItem::Gold(total) = existing {
                    *total += amount;
                    return;
                }
            }
        }
        pile.items.push(item);
    }

    /// Removes and returns everything on a cell.
    pub fn take_ground_items(&mut self, pos: Position) -> Vec<GroundItem> {
        match self.ground.iter().position(|pile| pile.position == pos) {
            Some(index) => self.ground.remove(index).items,
            None => Vec::new(),
        }
    }

    /// Removes and returns only the gold on a cell.
    pub fn take_gold(&mut self, pos: Position) -> u32 {
        let Some(index) = self.ground.iter().position(|pile| pile.position == pos) else {
            return 0;
        };
        let mut gold = 0;
        self.ground[index].items.retain(|item| match item {
            GroundItem::Gold(amount) => {
                gold += amount;
                false
            }
            GroundItem::Item(_) => true,
        });
        if self.ground[index].items.is_empty() {
            self.ground.remove(index);
        }
        gold
    }

    /// Removes the first item stack on a cell, leaving gold behind.
    pub fn take_first_item(&mut self, pos: Position) -> Option<ItemStack> {
        let index = self.ground.iter().position(|pile| pile.position == pos)?;
        let slot = self.ground[index]
            .items
            .iter()
            .position(|item| matches!(item, GroundItem::Item(_)))?;
        let taken = self.ground[index].items.remove(slot);
        if self.ground[index].items.is_empty() {
            self.ground.remove(index);
        }
        match taken {
            GroundItem::Item(stack) => Some(stack),
            GroundItem::Gold(_) => None,
        }
    }

    pub(crate) fn dig_key(pos: Position) -> String {
        format!("{},{}", pos.x, pos.y)
    }
}

/// The cache of every depth visited so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    /// Seed that all level seeds derive from
    pub seed: u64,
    pub levels: BTreeMap<u32, Level>,
    pub current_depth: u32,
}

impl World {
    /// Creates an empty world.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            levels: BTreeMap::new(),
            current_depth: 0,
        }
    }

    /// Seed used to generate the level at `depth`.
    pub fn level_seed(&self, depth: u32) -> u64 {
        self.seed.wrapping_add(depth as u64 * 1000)
    }

    pub fn current_level(&self) -> Option<&Level> {
        self.levels.get(&self.current_depth)
    }

    pub fn current_level_mut(&mut self) -> Option<&mut Level> {
        self.levels.get_mut(&self.current_depth)
    }

    pub fn get_level(&self, depth: u32) -> Option<&Level> {
        self.levels.get(&depth)
    }

    pub fn has_level(&self, depth: u32) -> bool {
        self.levels.contains_key(&depth)
    }

    /// Stores a level under its grid's depth, replacing any previous one.
    pub fn add_level(&mut self, level: Level) {
        self.levels.insert(level.depth(), level);
    }
}
