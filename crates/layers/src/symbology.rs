#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OverlayStyle {
    pub opacity: f32,
    /// Stacking order; imagery sits above base tiles and below vector layers.
    pub z_index: i32,
    pub interactive: bool,
}

impl OverlayStyle {
    pub const fn new(opacity: f32, z_index: i32, interactive: bool) -> Self {
        Self {
            opacity,
            z_index,
            interactive,
        }
    }
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            z_index: 1000,
            interactive: false,
        }
    }
}
