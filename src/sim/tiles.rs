//! Spatial tile index
//!
//! The table plane (plus a pocket-sized margin) is cut into a fixed grid.
//! A ball belongs to every tile whose rectangle, grown by the ball's radius,
//! contains the ball's centre. Two touching balls therefore always share a
//! tile, which is what lets the broad phase look only at co-occupants.
//!
//! Membership changes only through scheduled enter/leave events whose times
//! come from the same line-crossing solver used for cushions.

use std::collections::{BTreeMap, BTreeSet};

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::collision::{CollisionSolver, Trajectory};
use super::state::{Ball, BallId};
use super::table::{Orientation, Table};
use crate::settings::SimSettings;

const SIDES: [Orientation; 4] = [
    Orientation::North,
    Orientation::East,
    Orientation::South,
    Orientation::West,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId(pub u32);

/// Static table feature referenced by index into the [`Table`] lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Obstacle {
    Cushion(usize),
    Pocket(usize),
    Corner(usize),
}

/// One grid cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tile {
    pub id: TileId,
    pub min: DVec2,
    pub max: DVec2,
    /// Indexed North, East, South, West
    neighbors: [Option<TileId>; 4],
    obstacles: Vec<Obstacle>,
    balls: BTreeSet<BallId>,
}

impl Tile {
    pub fn neighbor(&self, side: Orientation) -> Option<TileId> {
        self.neighbors[side_index(side)]
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn balls(&self) -> impl Iterator<Item = BallId> + '_ {
        self.balls.iter().copied()
    }

    pub fn holds(&self, ball: BallId) -> bool {
        self.balls.contains(&ball)
    }

    /// Whether a circle at `center` counts as inside this tile
    pub fn overlaps(&self, center: DVec2, radius: f64) -> bool {
        center.x > self.min.x - radius
            && center.x < self.max.x + radius
            && center.y > self.min.y - radius
            && center.y < self.max.y + radius
    }

    /// Boundary line shared with the neighbour on `side`: a point on it and
    /// the unit normal pointing back into this tile
    fn edge(&self, side: Orientation) -> (DVec2, DVec2) {
        match side {
            Orientation::North => (self.max, DVec2::NEG_Y),
            Orientation::East => (self.max, DVec2::NEG_X),
            Orientation::South => (self.min, DVec2::Y),
            Orientation::West => (self.min, DVec2::X),
        }
    }
}

fn side_index(side: Orientation) -> usize {
    match side {
        Orientation::North => 0,
        Orientation::East => 1,
        Orientation::South => 2,
        Orientation::West => 3,
    }
}

/// Fixed grid of tiles plus the ball → tiles membership map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileGrid {
    tiles: Vec<Tile>,
    columns: u32,
    rows: u32,
    origin: DVec2,
    tile_size: DVec2,
    membership: BTreeMap<BallId, BTreeSet<TileId>>,
}

impl TileGrid {
    /// Grid over the table grown by two pocket radii on every side, with
    /// every obstacle filed under each tile it can be touched from.
    pub fn new(table: &Table, settings: &SimSettings) -> Self {
        let columns = settings.tiles_x.max(1);
        let rows = settings.tiles_y.max(1);
        let margin = 2.0 * table.pocket_radius;
        let origin = DVec2::splat(-margin);
        let tile_size = DVec2::new(
            (table.width + 2.0 * margin) / columns as f64,
            (table.length + 2.0 * margin) / rows as f64,
        );

        let mut tiles = Vec::with_capacity((columns * rows) as usize);
        for row in 0..rows {
            for col in 0..columns {
                let min = origin + DVec2::new(col as f64, row as f64) * tile_size;
                let id = |c: u32, r: u32| TileId(r * columns + c);
                tiles.push(Tile {
                    id: id(col, row),
                    min,
                    max: min + tile_size,
                    neighbors: [
                        (row + 1 < rows).then(|| id(col, row + 1)),
                        (col + 1 < columns).then(|| id(col + 1, row)),
                        (row > 0).then(|| id(col, row - 1)),
                        (col > 0).then(|| id(col - 1, row)),
                    ],
                    obstacles: Vec::new(),
                    balls: BTreeSet::new(),
                });
            }
        }

        // A ball touching an obstacle has its centre inside some tile grown
        // by one radius, so the contact point lies inside that tile grown by
        // two radii.
        let reach = 2.0 * table.ball_radius + settings.space_epsilon;
        for tile in &mut tiles {
            let (lo, hi) = (tile.min - reach, tile.max + reach);
            for (i, cushion) in table.cushions.iter().enumerate() {
                let (a, b) = cushion.endpoints();
                let (smin, smax) = (a.min(b), a.max(b));
                if smin.x <= hi.x && smax.x >= lo.x && smin.y <= hi.y && smax.y >= lo.y {
                    tile.obstacles.push(Obstacle::Cushion(i));
                }
            }
            for (i, pocket) in table.pockets.iter().enumerate() {
                if circle_meets_rect(pocket.position, pocket.radius, lo, hi) {
                    tile.obstacles.push(Obstacle::Pocket(i));
                }
            }
            for (i, corner) in table.corners.iter().enumerate() {
                if circle_meets_rect(corner.position, corner.radius, lo, hi) {
                    tile.obstacles.push(Obstacle::Corner(i));
                }
            }
        }

        log::debug!(
            "tile grid {columns}x{rows}, tile size {:.3}x{:.3}",
            tile_size.x,
            tile_size.y
        );

        Self {
            tiles,
            columns,
            rows,
            origin,
            tile_size,
            membership: BTreeMap::new(),
        }
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id.0 as usize)
    }

    /// Tiles a circle counts as inside (same rule as [`Tile::overlaps`])
    pub fn tiles_overlapping(&self, center: DVec2, radius: f64) -> BTreeSet<TileId> {
        let span = |lo: f64, hi: f64, origin: f64, size: f64, count: u32| {
            let first = ((lo - origin) / size).floor().max(0.0);
            let last = ((hi - origin) / size).floor().min(count as f64 - 1.0);
            (first as i64)..=(last as i64)
        };
        let cols = span(center.x - radius, center.x + radius, self.origin.x, self.tile_size.x, self.columns);
        let rows = span(center.y - radius, center.y + radius, self.origin.y, self.tile_size.y, self.rows);

        let mut found = BTreeSet::new();
        for row in rows {
            for col in cols.clone() {
                let id = TileId(row as u32 * self.columns + col as u32);
                if self.tiles[id.0 as usize].overlaps(center, radius) {
                    found.insert(id);
                }
            }
        }
        found
    }

    /// Tiles a ball is registered in
    pub fn tiles_of(&self, ball: BallId) -> impl Iterator<Item = TileId> + '_ {
        self.membership.get(&ball).into_iter().flatten().copied()
    }

    pub fn contains(&self, ball: BallId, tile: TileId) -> bool {
        self.membership.get(&ball).is_some_and(|set| set.contains(&tile))
    }

    /// Register a ball in every tile it currently overlaps
    pub fn place(&mut self, ball: &Ball) {
        self.remove_everywhere(ball.id);
        for id in self.tiles_overlapping(ball.position, ball.radius) {
            self.insert(ball.id, id);
        }
    }

    pub fn insert(&mut self, ball: BallId, tile: TileId) -> bool {
        let Some(t) = self.tiles.get_mut(tile.0 as usize) else {
            return false;
        };
        t.balls.insert(ball);
        self.membership.entry(ball).or_default().insert(tile)
    }

    pub fn remove(&mut self, ball: BallId, tile: TileId) -> bool {
        if let Some(t) = self.tiles.get_mut(tile.0 as usize) {
            t.balls.remove(&ball);
        }
        match self.membership.get_mut(&ball) {
            Some(set) => set.remove(&tile),
            None => false,
        }
    }

    pub fn remove_everywhere(&mut self, ball: BallId) {
        if let Some(set) = self.membership.remove(&ball) {
            for tile in set {
                self.tiles[tile.0 as usize].balls.remove(&ball);
            }
        }
    }

    /// Candidate entries into the neighbours of `tile` the ball is not yet
    /// registered in, as `(absolute time, neighbour)` pairs
    pub fn enter_events(&self, solver: &CollisionSolver, ball: &Ball, tile: TileId) -> Vec<(f64, TileId)> {
        let Some(current) = self.tile(tile) else {
            return Vec::new();
        };
        let path = Trajectory::of(ball);
        SIDES
            .iter()
            .filter_map(|&side| {
                let neighbor = current.neighbor(side)?;
                if self.contains(ball.id, neighbor) {
                    return None;
                }
                let t = entry_crossing(solver, ball, &path, current, side)?;
                Some((ball.time + t, neighbor))
            })
            .collect()
    }

    /// Entries into `target` seen from the tiles the ball still occupies, as
    /// `(absolute time, occupied tile)` pairs. Used after the ball has left
    /// `target`, since a sliding ball can curve back.
    pub fn entries_into(&self, solver: &CollisionSolver, ball: &Ball, target: TileId) -> Vec<(f64, TileId)> {
        let path = Trajectory::of(ball);
        let mut found = Vec::new();
        for from in self.tiles_of(ball.id) {
            let Some(current) = self.tile(from) else {
                continue;
            };
            for &side in &SIDES {
                if current.neighbor(side) != Some(target) {
                    continue;
                }
                if let Some(t) = entry_crossing(solver, ball, &path, current, side) {
                    found.push((ball.time + t, from));
                }
            }
        }
        found
    }

    /// Absolute time the ball stops overlapping `tile`
    pub fn leave_event(&self, solver: &CollisionSolver, ball: &Ball, tile: TileId) -> Option<f64> {
        let current = self.tile(tile)?;
        let path = Trajectory::of(ball);
        SIDES
            .iter()
            .filter_map(|&side| {
                let (point, normal) = current.edge(side);
                // Outward crossing: the line sits one radius beyond the edge
                solver.line_crossing(ball, &path, point, normal, -ball.radius)
            })
            .min_by(|a, b| a.total_cmp(b))
            .map(|t| ball.time + t)
    }
}

/// Elapsed time until the ball's leading edge reaches the `side` boundary
/// of `tile` from inside
fn entry_crossing(solver: &CollisionSolver, ball: &Ball, path: &Trajectory, tile: &Tile, side: Orientation) -> Option<f64> {
    let (point, normal) = tile.edge(side);
    solver.line_crossing(ball, path, point, normal, ball.radius)
}

fn circle_meets_rect(center: DVec2, radius: f64, lo: DVec2, hi: DVec2) -> bool {
    center.clamp(lo, hi).distance(center) <= radius
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::{BallKind, MotionPhase};

    fn grid() -> (Table, TileGrid) {
        let table = Table::snooker();
        let grid = TileGrid::new(&table, &SimSettings::default());
        (table, grid)
    }

    #[test]
    fn test_grid_dimensions_and_links() {
        let (_, grid) = grid();
        assert_eq!(grid.tiles().len(), 12);
        let corner = grid.tile(TileId(0)).unwrap();
        assert_eq!(corner.neighbor(Orientation::East), Some(TileId(1)));
        assert_eq!(corner.neighbor(Orientation::North), Some(TileId(3)));
        assert_eq!(corner.neighbor(Orientation::South), None);
        assert_eq!(corner.neighbor(Orientation::West), None);
    }

    #[test]
    fn test_every_obstacle_is_filed() {
        let (table, grid) = grid();
        let filed: BTreeSet<Obstacle> = grid.tiles().iter().flat_map(|t| t.obstacles().iter().copied()).collect();
        assert_eq!(
            filed.len(),
            table.cushions.len() + table.pockets.len() + table.corners.len()
        );
    }

    #[test]
    fn test_centre_ball_in_one_tile() {
        let (table, grid) = grid();
        let centre = DVec2::new(0.5 * table.width, 0.6 * table.length);
        let tiles = grid.tiles_overlapping(centre, table.ball_radius);
        assert_eq!(tiles.len(), 1);
    }

    #[test]
    fn test_ball_on_boundary_in_two_tiles() {
        let (table, grid) = grid();
        let boundary_x = grid.tile(TileId(0)).unwrap().max.x;
        let tiles = grid.tiles_overlapping(DVec2::new(boundary_x, 0.6 * table.length), table.ball_radius);
        assert_eq!(tiles.len(), 2);
    }

    #[test]
    fn test_place_and_remove() {
        let (table, mut grid) = grid();
        let ball = Ball::new(BallId(4), BallKind::Red, DVec2::new(0.3, 0.3)).with_radius(table.ball_radius);
        grid.place(&ball);
        let registered: Vec<_> = grid.tiles_of(ball.id).collect();
        assert!(!registered.is_empty());
        for id in &registered {
            assert!(grid.tile(*id).unwrap().holds(ball.id));
        }
        grid.remove_everywhere(ball.id);
        assert_eq!(grid.tiles_of(ball.id).count(), 0);
        assert!(grid.tiles().iter().all(|t| !t.holds(ball.id)));
    }

    #[test]
    fn test_enter_and_leave_times_match_geometry() {
        let (table, mut grid) = grid();
        let solver = CollisionSolver::new(&SimSettings::default());
        let tile = grid.tile(TileId(4)).unwrap().clone();
        let start = DVec2::new(tile.max.x - 0.2, 0.5 * (tile.min.y + tile.max.y));

        let mut ball = Ball::new(BallId(0), BallKind::Cue, start).with_radius(table.ball_radius);
        ball.phase = MotionPhase::Sliding;
        ball.velocity = DVec2::new(3.0, 0.0);
        grid.place(&ball);
        assert_eq!(grid.tiles_of(ball.id).collect::<Vec<_>>(), vec![TileId(4)]);

        let enters = grid.enter_events(&solver, &ball, TileId(4));
        assert_eq!(enters.len(), 1);
        let (t_enter, neighbor) = enters[0];
        assert_eq!(neighbor, TileId(5));
        let x = ball.at(t_enter).position.x;
        assert!((x - (tile.max.x - ball.radius)).abs() < 1e-6);

        let t_leave = grid.leave_event(&solver, &ball, TileId(4)).unwrap();
        assert!(t_leave > t_enter);
        let x = ball.at(t_leave).position.x;
        assert!((x - (tile.max.x + ball.radius)).abs() < 1e-6);
    }

    #[test]
    fn test_ball_curving_back_reenters() {
        let (table, mut grid) = grid();
        let solver = CollisionSolver::new(&SimSettings::default());
        let east = grid.tile(TileId(5)).unwrap().clone();
        // Just past the point of leaving tile 5 westwards, with heavy draw
        let x = east.min.x - table.ball_radius - 1e-4;
        let y = 0.5 * (east.min.y + east.max.y);
        let mut ball = Ball::new(BallId(0), BallKind::Cue, DVec2::new(x, y)).with_radius(table.ball_radius);
        ball.phase = MotionPhase::Sliding;
        ball.velocity = DVec2::new(-0.3, 0.0);
        ball.angular_velocity = glam::DVec3::new(0.0, 200.0, 0.0);
        grid.place(&ball);
        assert!(!grid.contains(ball.id, TileId(5)));

        let entries = grid.entries_into(&solver, &ball, TileId(5));
        assert_eq!(entries.len(), 1);
        let (t, from) = entries[0];
        assert_eq!(from, TileId(4));
        assert!(t > 0.0 && t < ball.phase_end());
        assert!((ball.at(t).position.x - (east.min.x - ball.radius)).abs() < 1e-6);
    }

    #[test]
    fn test_resting_ball_has_no_tile_events() {
        let (table, mut grid) = grid();
        let solver = CollisionSolver::new(&SimSettings::default());
        let ball = Ball::new(BallId(0), BallKind::Cue, DVec2::new(0.5, 0.5)).with_radius(table.ball_radius);
        grid.place(&ball);
        let tile = grid.tiles_of(ball.id).next().unwrap();
        assert!(grid.enter_events(&solver, &ball, tile).is_empty());
        assert_eq!(grid.leave_event(&solver, &ball, tile), None);
    }
}
