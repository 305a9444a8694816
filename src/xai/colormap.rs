use plotters::style::RGBColor;

/// Inferno, sampled at 11 evenly spaced points from dark to light.
const INFERNO: [(u8, u8, u8); 11] = [
    (0x00, 0x00, 0x04),
    (0x16, 0x0b, 0x39),
    (0x42, 0x0a, 0x68),
    (0x6a, 0x17, 0x6e),
    (0x93, 0x26, 0x67),
    (0xbc, 0x37, 0x54),
    (0xdd, 0x51, 0x3a),
    (0xf3, 0x78, 0x19),
    (0xfc, 0xa5, 0x0a),
    (0xf6, 0xd7, 0x46),
    (0xfc, 0xff, 0xa4),
];

/// Inferno at `t` in `[0, 1]`, linearly interpolated between anchors.
/// Out-of-range and NaN inputs clamp to the nearest end.
pub fn inferno(t: f32) -> RGBColor {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let pos = t * (INFERNO.len() - 1) as f32;
    let lo = (pos.floor() as usize).min(INFERNO.len() - 2);
    let frac = pos - lo as f32;
    let (a, b) = (INFERNO[lo], INFERNO[lo + 1]);
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * frac).round() as u8;
    RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

/// Reversed inferno: low attribution is pale, high attribution is dark.
pub fn inferno_r(t: f32) -> RGBColor {
    inferno(1.0 - t.clamp(0.0, 1.0))
}
