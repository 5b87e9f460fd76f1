use std::collections::BTreeMap;

use crate::constants::{CORRECTION_SEARCH_RADIUS, GRID_HEIGHT, GRID_WIDTH};
use crate::error::RelayError;
use crate::maps::{builtin_maps, MapDefinition};
use crate::types::GridPos;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellKind {
    Free,
    Interactive,
    Wall,
    Path,
    Inaccessible,
}

impl CellKind {
    fn parse(symbol: u8) -> Option<Self> {
        match symbol {
            b'.' => Some(Self::Free),
            b'o' => Some(Self::Interactive),
            b'#' => Some(Self::Wall),
            b'=' => Some(Self::Path),
            b'~' => Some(Self::Inaccessible),
            _ => None,
        }
    }

    pub fn is_player_walkable(self) -> bool {
        matches!(self, Self::Free | Self::Interactive | Self::Path)
    }

    pub fn is_agent_walkable(self) -> bool {
        self == Self::Path
    }
}

#[derive(Clone, Debug)]
pub struct CollisionGrid {
    pub name: String,
    pub width: i32,
    pub height: i32,
    pub spawn: GridPos,
    pub safe_player: GridPos,
    pub safe_agent: GridPos,
    cells: Vec<CellKind>,
}

impl CollisionGrid {
    pub fn from_definition(definition: &MapDefinition) -> Result<Self, RelayError> {
        let invalid = |reason: String| RelayError::InvalidMapData {
            map: definition.name.to_string(),
            reason,
        };

        if definition.rows.len() != GRID_HEIGHT as usize {
            return Err(invalid(format!(
                "expected {GRID_HEIGHT} rows, found {}",
                definition.rows.len()
            )));
        }

        let mut cells = Vec::with_capacity((GRID_WIDTH * GRID_HEIGHT) as usize);
        for (y, row) in definition.rows.iter().enumerate() {
            if row.len() != GRID_WIDTH as usize {
                return Err(invalid(format!(
                    "row {y} has {} cells, expected {GRID_WIDTH}",
                    row.len()
                )));
            }
            for (x, symbol) in row.bytes().enumerate() {
                let Some(kind) = CellKind::parse(symbol) else {
                    return Err(invalid(format!("unknown symbol at ({x}, {y})")));
                };
                cells.push(kind);
            }
        }

        let grid = Self {
            name: definition.name.to_string(),
            width: GRID_WIDTH,
            height: GRID_HEIGHT,
            spawn: definition.spawn,
            safe_player: definition.safe_player,
            safe_agent: definition.safe_agent,
            cells,
        };

        if !grid.is_player_walkable(grid.spawn) {
            return Err(invalid("spawn is not player walkable".to_string()));
        }
        if !grid.is_player_walkable(grid.safe_player) {
            return Err(invalid("safe player cell is not player walkable".to_string()));
        }
        if !grid.is_agent_walkable(grid.safe_agent) {
            return Err(invalid("safe agent cell is not a path".to_string()));
        }
        Ok(grid)
    }

    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    pub fn cell(&self, pos: GridPos) -> Option<CellKind> {
        if !self.in_bounds(pos) {
            return None;
        }
        self.cells
            .get((pos.y * self.width + pos.x) as usize)
            .copied()
    }

    pub fn is_player_walkable(&self, pos: GridPos) -> bool {
        self.cell(pos)
            .map(CellKind::is_player_walkable)
            .unwrap_or(false)
    }

    pub fn is_agent_walkable(&self, pos: GridPos) -> bool {
        self.cell(pos)
            .map(CellKind::is_agent_walkable)
            .unwrap_or(false)
    }

    /// Falls back to the safe player cell once the search radius is exhausted.
    pub fn nearest_player_walkable(&self, pos: GridPos) -> GridPos {
        self.nearest_matching(pos, CORRECTION_SEARCH_RADIUS, |cell| {
            self.is_player_walkable(cell)
        })
        .unwrap_or(self.safe_player)
    }

    pub fn nearest_agent_walkable(&self, pos: GridPos) -> GridPos {
        self.nearest_matching(pos, CORRECTION_SEARCH_RADIUS, |cell| {
            self.is_agent_walkable(cell)
        })
        .unwrap_or(self.safe_agent)
    }

    pub fn nearest_matching(
        &self,
        pos: GridPos,
        radius: i32,
        accept: impl Fn(GridPos) -> bool,
    ) -> Option<GridPos> {
        let origin = GridPos::new(
            pos.x.clamp(0, self.width - 1),
            pos.y.clamp(0, self.height - 1),
        );

        for ring in 0..=radius {
            let mut best: Option<GridPos> = None;
            for dy in -ring..=ring {
                for dx in -ring..=ring {
                    if dx.abs() != ring && dy.abs() != ring {
                        continue;
                    }
                    let candidate = origin.offset(dx, dy);
                    if !self.in_bounds(candidate) || !accept(candidate) {
                        continue;
                    }
                    let closer = best
                        .map(|current| candidate.distance_sq(pos) < current.distance_sq(pos))
                        .unwrap_or(true);
                    if closer {
                        best = Some(candidate);
                    }
                }
            }
            if best.is_some() {
                return best;
            }
        }
        None
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapRegistry {
    grids: BTreeMap<String, CollisionGrid>,
}

impl MapRegistry {
    pub fn builtin() -> Result<Self, RelayError> {
        let mut registry = Self::default();
        for definition in builtin_maps() {
            registry.insert(CollisionGrid::from_definition(&definition)?);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, grid: CollisionGrid) {
        self.grids.insert(grid.name.clone(), grid);
    }

    pub fn get(&self, map: &str) -> Option<&CollisionGrid> {
        self.grids.get(map)
    }

    pub fn contains(&self, map: &str) -> bool {
        self.grids.contains_key(map)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.grids.keys().map(String::as_str)
    }
}
