//! Color values exchanged with native color picker dialogs.

/// An RGBA color with every channel a normalized float in `[0, 1]`.
///
/// Channels are clamped on construction; NaN becomes `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rgba([f32; 4]);

impl Rgba {
    pub const BLACK: Self = Self([0.0, 0.0, 0.0, 1.0]);
    pub const WHITE: Self = Self([1.0, 1.0, 1.0, 1.0]);

    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self([clamp(r), clamp(g), clamp(b), clamp(a)])
    }

    pub fn r(self) -> f32 {
        self.0[0]
    }

    pub fn g(self) -> f32 {
        self.0[1]
    }

    pub fn b(self) -> f32 {
        self.0[2]
    }

    pub fn a(self) -> f32 {
        self.0[3]
    }

    pub fn to_array(self) -> [f32; 4] {
        self.0
    }

    /// Same color with a different alpha.
    pub fn with_alpha(self, a: f32) -> Self {
        Self::new(self.r(), self.g(), self.b(), a)
    }

    /// Quantize to 8 bits per channel.
    pub fn to_rgba8(self) -> [u8; 4] {
        self.0.map(|channel| (channel * 255.0).round() as u8)
    }

    pub fn from_rgba8(rgba: [u8; 4]) -> Self {
        let [r, g, b, a] = rgba.map(|channel| channel as f32 / 255.0);
        Self::new(r, g, b, a)
    }
}

impl From<[f32; 4]> for Rgba {
    fn from([r, g, b, a]: [f32; 4]) -> Self {
        Self::new(r, g, b, a)
    }
}

impl From<Rgba> for [f32; 4] {
    fn from(color: Rgba) -> Self {
        color.0
    }
}

fn clamp(channel: f32) -> f32 {
    if channel.is_nan() {
        0.0
    } else {
        channel.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_clamped() {
        let color = Rgba::new(1.5, -0.25, f32::NAN, 0.5);
        assert_eq!(color.to_array(), [1.0, 0.0, 0.0, 0.5]);
    }

    #[test]
    fn rgba8_conversion() {
        let color = Rgba::new(1.0, 0.0, 0.5, 1.0);
        assert_eq!(color.to_rgba8(), [255, 0, 128, 255]);
        assert_eq!(Rgba::from_rgba8([255, 0, 0, 255]), Rgba::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn with_alpha_keeps_color() {
        let color = Rgba::from([0.0, 1.0, 0.0, 1.0]).with_alpha(0.5);
        assert_eq!(<[f32; 4]>::from(color), [0.0, 1.0, 0.0, 0.5]);
    }
}
