use nalgebra::Point2;

/// Raw X-junction candidate produced by a corner detector.
///
/// `orientation` is the direction of the bright-square diagonal in radians,
/// defined modulo `π`. Grid axes sit at roughly ±45° from it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Corner {
    pub position: Point2<f32>,
    pub orientation: f32,
    pub strength: f32,
}

impl Corner {
    pub fn new(x: f32, y: f32, orientation: f32, strength: f32) -> Self {
        Self {
            position: Point2::new(x, y),
            orientation,
            strength,
        }
    }
}
