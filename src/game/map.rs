//! Tile map store - ground and decal grids loaded once per process

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::physics::Rect;

/// One cell of a tile layer; `id` is the sprite sheet index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub id: u32,
    #[serde(default)]
    pub gid: u32,
}

/// Immutable tile grids. Any decal cell that is present is solid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapGrid {
    pub ground: Vec<Vec<Tile>>,
    pub decal: Vec<Vec<Option<Tile>>>,
    #[serde(skip, default = "default_tile_size")]
    tile_size: f32,
}

fn default_tile_size() -> f32 {
    32.0
}

impl MapGrid {
    /// Build a grid from explicit layers
    pub fn new(ground: Vec<Vec<Tile>>, decal: Vec<Vec<Option<Tile>>>, tile_size: f32) -> Self {
        Self {
            ground,
            decal,
            tile_size,
        }
    }

    /// Open map of `cells x cells` plain ground with no decals
    pub fn open(cells: usize, tile_size: f32) -> Self {
        let ground = vec![vec![Tile { id: 0, gid: 1 }; cells]; cells];
        let decal = vec![vec![None; cells]; cells];
        Self::new(ground, decal, tile_size)
    }

    /// Parse a map document
    pub fn from_json(json: &str, tile_size: f32) -> Result<Self, MapError> {
        let mut grid: MapGrid = serde_json::from_str(json)?;
        grid.tile_size = tile_size;
        grid.validate()?;
        Ok(grid)
    }

    /// Load the map file, or fall back to an open map sized to the world
    pub fn load_or_open(path: &Path, world_size: f32, tile_size: f32) -> Self {
        let result = std::fs::read_to_string(path)
            .map_err(MapError::from)
            .and_then(|json| Self::from_json(&json, tile_size));

        match result {
            Ok(grid) => {
                info!(
                    path = %path.display(),
                    rows = grid.rows(),
                    cols = grid.cols(),
                    solid_tiles = grid.solid_count(),
                    "Loaded map"
                );
                grid
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Map unavailable, using open map");
                Self::open((world_size / tile_size).ceil() as usize, tile_size)
            }
        }
    }

    fn validate(&self) -> Result<(), MapError> {
        let width = self.decal.first().map(Vec::len).unwrap_or(0);
        if self.decal.iter().any(|row| row.len() != width) {
            return Err(MapError::Shape("decal rows have different lengths"));
        }
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.decal.len()
    }

    pub fn cols(&self) -> usize {
        self.decal.first().map(Vec::len).unwrap_or(0)
    }

    /// Whether the decal cell at (row, col) blocks movement
    pub fn is_solid(&self, row: usize, col: usize) -> bool {
        self.decal
            .get(row)
            .and_then(|r| r.get(col))
            .is_some_and(Option::is_some)
    }

    fn solid_count(&self) -> usize {
        self.decal.iter().flatten().filter(|t| t.is_some()).count()
    }

    /// Bounding box of the tile at (row, col)
    pub fn tile_rect(&self, row: usize, col: usize) -> Rect {
        Rect {
            x: col as f32 * self.tile_size,
            y: row as f32 * self.tile_size,
            w: self.tile_size,
            h: self.tile_size,
        }
    }

    /// Solid tiles whose cells the rectangle can touch
    pub fn solid_tiles_near(&self, rect: &Rect) -> impl Iterator<Item = Rect> + '_ {
        let ts = self.tile_size;
        let to_cell = |v: f32| (v / ts).floor().max(0.0) as usize;
        let col_lo = to_cell(rect.x);
        let col_hi = to_cell(rect.x + rect.w).min(self.cols().saturating_sub(1));
        let row_lo = to_cell(rect.y);
        let row_hi = to_cell(rect.y + rect.h).min(self.rows().saturating_sub(1));

        (row_lo..=row_hi)
            .flat_map(move |row| (col_lo..=col_hi).map(move |col| (row, col)))
            .filter(|&(row, col)| self.is_solid(row, col))
            .map(|(row, col)| self.tile_rect(row, col))
    }
}

/// Map loading errors
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Failed to read map: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse map: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Malformed map: {0}")]
    Shape(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sparse_decal_layer() {
        let json = r#"{
            "ground": [[{"id":1,"gid":2},{"id":1,"gid":2}],[{"id":1,"gid":2},{"id":1,"gid":2}]],
            "decal": [[null,{"id":7,"gid":8}],[null,null]]
        }"#;
        let grid = MapGrid::from_json(json, 32.0).unwrap();
        assert_eq!(grid.rows(), 2);
        assert_eq!(grid.cols(), 2);
        assert!(grid.is_solid(0, 1));
        assert!(!grid.is_solid(0, 0));
        assert!(!grid.is_solid(5, 5));
    }

    #[test]
    fn ragged_decal_rows_are_rejected() {
        let json = r#"{"ground": [], "decal": [[null],[null,null]]}"#;
        assert!(matches!(
            MapGrid::from_json(json, 32.0),
            Err(MapError::Shape(_))
        ));
    }

    #[test]
    fn missing_file_falls_back_to_open_map() {
        let grid = MapGrid::load_or_open(Path::new("/nonexistent/map.json"), 3200.0, 32.0);
        assert_eq!(grid.rows(), 100);
        assert_eq!(grid.solid_count(), 0);
    }

    #[test]
    fn nearby_tiles_cover_only_touched_cells() {
        let mut grid = MapGrid::open(4, 32.0);
        grid.decal[1][1] = Some(Tile { id: 3, gid: 4 });
        grid.decal[3][3] = Some(Tile { id: 3, gid: 4 });

        let probe = Rect { x: 10.0, y: 10.0, w: 32.0, h: 32.0 };
        let near: Vec<Rect> = grid.solid_tiles_near(&probe).collect();
        assert_eq!(near, vec![grid.tile_rect(1, 1)]);
    }
}
