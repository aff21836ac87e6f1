//! Velocity-aligned reference frame
//!
//! Friction always acts along a fixed direction during a motion phase, so the
//! closed-form trajectories are written in a frame whose x axis is that
//! direction and rotated back to table coordinates afterwards.

use glam::{DVec2, DVec3};

/// Rotation of the table plane about the vertical axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    /// Unit x axis of the frame, in table coordinates
    axis: DVec2,
}

impl Frame {
    /// Frame whose x axis points along `direction`. A zero direction yields
    /// the table frame.
    pub fn aligned_with(direction: DVec2) -> Self {
        Self {
            axis: direction.try_normalize().unwrap_or(DVec2::X),
        }
    }

    pub fn axis(&self) -> DVec2 {
        self.axis
    }

    pub fn to_local(&self, v: DVec2) -> DVec2 {
        DVec2::new(self.axis.x, -self.axis.y).rotate(v)
    }

    pub fn to_world(&self, v: DVec2) -> DVec2 {
        self.axis.rotate(v)
    }

    /// Rotate the horizontal part of a 3D vector back to table coordinates
    pub fn to_world3(&self, v: DVec3) -> DVec3 {
        let xy = self.to_world(DVec2::new(v.x, v.y));
        DVec3::new(xy.x, xy.y, v.z)
    }

    pub fn to_local3(&self, v: DVec3) -> DVec3 {
        let xy = self.to_local(DVec2::new(v.x, v.y));
        DVec3::new(xy.x, xy.y, v.z)
    }
}
