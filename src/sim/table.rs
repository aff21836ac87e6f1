//! Table geometry
//!
//! Coordinates: origin at the bottom-left corner of the playing surface,
//! x across the width, y along the length (baulk end at y = 0).

use std::f64::consts::SQRT_2;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::state::{Ball, BallId, BallKind};
use crate::consts::*;

/// Gap left between racked reds so they start out of contact
const RACK_SPACING: f64 = 1e-5;

/// Which side of the table a cushion lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    North,
    East,
    South,
    West,
}

impl Orientation {
    /// Unit normal pointing into the playing area
    pub fn inward_normal(&self) -> DVec2 {
        match self {
            Orientation::North => DVec2::NEG_Y,
            Orientation::East => DVec2::NEG_X,
            Orientation::South => DVec2::Y,
            Orientation::West => DVec2::X,
        }
    }

    /// Unit direction along the cushion
    pub fn tangent(&self) -> DVec2 {
        match self {
            Orientation::North | Orientation::South => DVec2::X,
            Orientation::East | Orientation::West => DVec2::Y,
        }
    }
}

/// Straight cushion segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cushion {
    /// Midpoint of the segment, on the cushion line
    pub center: DVec2,
    pub length: f64,
    pub orientation: Orientation,
}

impl Cushion {
    pub fn new(center: DVec2, length: f64, orientation: Orientation) -> Self {
        Self {
            center,
            length,
            orientation,
        }
    }

    pub fn normal(&self) -> DVec2 {
        self.orientation.inward_normal()
    }

    pub fn endpoints(&self) -> (DVec2, DVec2) {
        let half = 0.5 * self.length * self.orientation.tangent();
        (self.center - half, self.center + half)
    }

    /// Whether `point` projects onto the segment (not its extension)
    pub fn spans(&self, point: DVec2) -> bool {
        let along = (point - self.center).dot(self.orientation.tangent());
        along.abs() <= 0.5 * self.length
    }
}

/// Circular sink. A ball drops once its centre enters the circle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pocket {
    pub position: DVec2,
    pub radius: f64,
    /// Unit vector pointing from the pocket into the table
    pub orientation: DVec2,
}

/// Rounded jaw at a pocket mouth
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PocketCorner {
    pub position: DVec2,
    pub radius: f64,
}

/// Immutable table description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub width: f64,
    pub length: f64,
    pub ball_radius: f64,
    pub pocket_radius: f64,
    pub corner_radius: f64,
    pub baulk_line: f64,
    pub d_radius: f64,
    pub black_distance: f64,
    pub cushions: Vec<Cushion>,
    pub pockets: Vec<Pocket>,
    pub corners: Vec<PocketCorner>,
}

impl Table {
    /// Full-size snooker table
    pub fn snooker() -> Self {
        Self::new(
            TABLE_WIDTH,
            TABLE_LENGTH,
            BALL_RADIUS,
            POCKET_RADIUS,
            POCKET_CORNER_RADIUS,
        )
    }

    /// Six pockets, twelve jaws and six cushions laid out for the given size
    pub fn new(width: f64, length: f64, ball_radius: f64, pocket_radius: f64, corner_radius: f64) -> Self {
        let diagonal = pocket_radius / SQRT_2;
        let pockets = vec![
            Pocket {
                position: DVec2::new(-diagonal, -diagonal),
                radius: pocket_radius,
                orientation: DVec2::new(1.0, 1.0).normalize(),
            },
            Pocket {
                position: DVec2::new(width + diagonal, -diagonal),
                radius: pocket_radius,
                orientation: DVec2::new(-1.0, 1.0).normalize(),
            },
            Pocket {
                position: DVec2::new(-diagonal, length + diagonal),
                radius: pocket_radius,
                orientation: DVec2::new(1.0, -1.0).normalize(),
            },
            Pocket {
                position: DVec2::new(width + diagonal, length + diagonal),
                radius: pocket_radius,
                orientation: DVec2::new(-1.0, -1.0).normalize(),
            },
            Pocket {
                position: DVec2::new(-pocket_radius, 0.5 * length),
                radius: pocket_radius,
                orientation: DVec2::X,
            },
            Pocket {
                position: DVec2::new(width + pocket_radius, 0.5 * length),
                radius: pocket_radius,
                orientation: DVec2::NEG_X,
            },
        ];

        // Distance from a table corner to where the cushion starts
        let offset = SQRT_2 * pocket_radius + (SQRT_2 - 1.0) * corner_radius;
        let (cx, cy) = (0.5 * width, 0.5 * length);

        let mut corners = Vec::with_capacity(12);
        for sx in [-1.0, 1.0] {
            for sy in [-1.0, 1.0] {
                corners.push(PocketCorner {
                    position: DVec2::new(cx + sx * (cx - offset), cy + sy * (cy + corner_radius)),
                    radius: corner_radius,
                });
                corners.push(PocketCorner {
                    position: DVec2::new(cx + sx * (cx + corner_radius), cy + sy * (cy - offset)),
                    radius: corner_radius,
                });
            }
        }
        for x in [-corner_radius, width + corner_radius] {
            for sy in [-1.0, 1.0] {
                corners.push(PocketCorner {
                    position: DVec2::new(x, cy + sy * (pocket_radius + corner_radius)),
                    radius: corner_radius,
                });
            }
        }

        let side = 0.5 * length - offset - pocket_radius - corner_radius;
        let end = width - 2.0 * offset;
        let cushions = vec![
            Cushion::new(DVec2::new(0.0, offset + 0.5 * side), side, Orientation::West),
            Cushion::new(DVec2::new(0.0, length - offset - 0.5 * side), side, Orientation::West),
            Cushion::new(DVec2::new(width, offset + 0.5 * side), side, Orientation::East),
            Cushion::new(DVec2::new(width, length - offset - 0.5 * side), side, Orientation::East),
            Cushion::new(DVec2::new(cx, 0.0), end, Orientation::South),
            Cushion::new(DVec2::new(cx, length), end, Orientation::North),
        ];

        Self {
            width,
            length,
            ball_radius,
            pocket_radius,
            corner_radius,
            baulk_line: BAULK_LINE,
            d_radius: D_RADIUS,
            black_distance: BLACK_SPOT_DISTANCE,
            cushions,
            pockets,
            corners,
        }
    }

    /// Bare playing surface with no cushions, pockets or jaws
    pub fn open(width: f64, length: f64) -> Self {
        Self {
            cushions: Vec::new(),
            pockets: Vec::new(),
            corners: Vec::new(),
            ..Self::new(width, length, BALL_RADIUS, POCKET_RADIUS, POCKET_CORNER_RADIUS)
        }
    }

    /// Spot of a colour, `None` for reds and the cue ball
    pub fn spot(&self, kind: BallKind) -> Option<DVec2> {
        let cx = 0.5 * self.width;
        match kind {
            BallKind::Brown => Some(DVec2::new(cx, self.baulk_line)),
            BallKind::Yellow => Some(DVec2::new(cx + self.d_radius, self.baulk_line)),
            BallKind::Green => Some(DVec2::new(cx - self.d_radius, self.baulk_line)),
            BallKind::Blue => Some(DVec2::new(cx, 0.5 * self.length)),
            BallKind::Pink => Some(DVec2::new(cx, 0.75 * self.length)),
            BallKind::Black => Some(DVec2::new(cx, self.length - self.black_distance)),
            BallKind::Cue | BallKind::Red => None,
        }
    }

    /// Fifteen reds packed in a triangle behind the pink, apex first
    pub fn red_spots(&self) -> Vec<DVec2> {
        let pink = DVec2::new(0.5 * self.width, 0.75 * self.length);
        let step = self.ball_radius + RACK_SPACING;
        let mut spots = Vec::with_capacity(15);
        for row in 0..5 {
            for col in (-row..=row).step_by(2) {
                spots.push(DVec2::new(
                    pink.x + col as f64 * step,
                    pink.y + 2.0 * step + row as f64 * 3f64.sqrt() * step,
                ));
            }
        }
        spots
    }

    /// Full frame: cue ball in the D, colours on their spots, reds racked.
    /// Ids: cue 0, reds 1..=15, then yellow to black.
    pub fn frame_layout(&self) -> Vec<Ball> {
        let mut balls = Vec::with_capacity(22);
        let cue_spot = DVec2::new(0.5 * self.width - 0.5 * self.d_radius, self.baulk_line);
        balls.push(self.ball(BallId(0), BallKind::Cue, cue_spot));

        for (i, spot) in self.red_spots().into_iter().enumerate() {
            balls.push(self.ball(BallId(1 + i as u32), BallKind::Red, spot));
        }

        let colours = [
            BallKind::Yellow,
            BallKind::Green,
            BallKind::Brown,
            BallKind::Blue,
            BallKind::Pink,
            BallKind::Black,
        ];
        for (i, kind) in colours.into_iter().enumerate() {
            if let Some(spot) = self.spot(kind) {
                balls.push(self.ball(BallId(16 + i as u32), kind, spot));
            }
        }
        balls
    }

    fn ball(&self, id: BallId, kind: BallKind, position: DVec2) -> Ball {
        Ball::new(id, kind, position).with_radius(self.ball_radius)
    }
}
