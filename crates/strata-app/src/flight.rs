//! Scripted viewer path for the headless run.

use glam::Vec2;

/// Fixed simulation step: 60 Hz.
pub const FIXED_DT: f32 = 1.0 / 60.0;

/// A viewer moving in a straight line at constant speed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Flight {
    position: Vec2,
    velocity: Vec2,
}

impl Flight {
    /// `heading_degrees` is measured from +x towards +z (the second component
    /// of the ground-plane vector).
    pub fn new(start: Vec2, speed: f32, heading_degrees: f32) -> Self {
        let heading = heading_degrees.to_radians();
        Self {
            position: start,
            velocity: Vec2::new(heading.cos(), heading.sin()) * speed,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Advance by `dt` seconds and return the new position.
    pub fn step(&mut self, dt: f32) -> Vec2 {
        self.position += self.velocity * dt;
        self.position
    }
}
