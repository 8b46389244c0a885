//! Opaque RGB colors and the hue/saturation/brightness model.
//!
//! HSB conversions follow the classic integer-rounding formulation: an `Rgb8 -> Hsb -> Rgb8`
//! round trip reproduces every channel within ±1.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Hue, saturation and brightness, each in `0..=1`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hsb {
    pub h: f32,
    pub s: f32,
    pub b: f32,
}

/// Saturation of synthesized track colors.
const PALETTE_SATURATION: f32 = 0.8;
/// Brightness of synthesized track colors.
const PALETTE_BRIGHTNESS: f32 = 1.0;

pub const DEFAULT_LINE_WIDTH: f32 = 2.0;

impl Rgb8 {
    pub const WHITE: Rgb8 = Rgb8::new(255, 255, 255);
    pub const BLACK: Rgb8 = Rgb8::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hsb(self) -> Hsb {
        let r = i32::from(self.r);
        let g = i32::from(self.g);
        let b = i32::from(self.b);
        let cmax = r.max(g).max(b);
        let cmin = r.min(g).min(b);

        let brightness = cmax as f32 / 255.0;
        let saturation = if cmax != 0 {
            (cmax - cmin) as f32 / cmax as f32
        } else {
            0.0
        };

        let hue = if saturation == 0.0 {
            0.0
        } else {
            let span = (cmax - cmin) as f32;
            let redc = (cmax - r) as f32 / span;
            let greenc = (cmax - g) as f32 / span;
            let bluec = (cmax - b) as f32 / span;
            let sector = if r == cmax {
                bluec - greenc
            } else if g == cmax {
                2.0 + redc - bluec
            } else {
                4.0 + greenc - redc
            };
            let h = sector / 6.0;
            if h < 0.0 { h + 1.0 } else { h }
        };

        Hsb {
            h: hue,
            s: saturation,
            b: brightness,
        }
    }

    pub fn from_hsb(hsb: Hsb) -> Self {
        fn channel(x: f32) -> u8 {
            (x.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
        }

        let Hsb {
            h: hue,
            s: saturation,
            b: brightness,
        } = hsb;

        if saturation == 0.0 {
            let v = channel(brightness);
            return Rgb8::new(v, v, v);
        }

        let h = (hue - hue.floor()) * 6.0;
        let f = h - h.floor();
        let p = brightness * (1.0 - saturation);
        let q = brightness * (1.0 - saturation * f);
        let t = brightness * (1.0 - saturation * (1.0 - f));
        let (r, g, b) = match h as u32 {
            0 => (brightness, t, p),
            1 => (q, brightness, p),
            2 => (p, brightness, t),
            3 => (p, q, brightness),
            4 => (t, p, brightness),
            _ => (brightness, p, q),
        };
        Rgb8::new(channel(r), channel(g), channel(b))
    }

    /// Same hue and saturation, brightness multiplied by `factor`.
    pub fn scale_brightness(self, factor: f32) -> Self {
        let mut hsb = self.to_hsb();
        hsb.b *= factor.clamp(0.0, 1.0);
        Rgb8::from_hsb(hsb)
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn parse_hex(s: &str) -> Result<Self, String> {
        let s = s.trim();
        let s = s.strip_prefix('#').unwrap_or(s);

        fn hex_byte(pair: &str) -> Result<u8, String> {
            u8::from_str_radix(pair, 16).map_err(|_| format!("invalid hex byte \"{pair}\""))
        }

        if s.len() != 6 || !s.is_ascii() {
            return Err("color must be #RRGGBB (case-insensitive)".to_owned());
        }
        Ok(Rgb8::new(
            hex_byte(&s[0..2])?,
            hex_byte(&s[2..4])?,
            hex_byte(&s[4..6])?,
        ))
    }
}

impl Serialize for Rgb8 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Rgb8 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Rgb8::parse_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Evenly spaced hues around the wheel, one per track.
pub fn hue_palette(count: usize) -> Vec<Rgb8> {
    (0..count)
        .map(|i| {
            Rgb8::from_hsb(Hsb {
                h: i as f32 / count as f32,
                s: PALETTE_SATURATION,
                b: PALETTE_BRIGHTNESS,
            })
        })
        .collect()
}

/// Extend `configured` to `count` entries.
///
/// With no configured colors every track gets its own hue; otherwise the configured list is
/// reused cyclically.
pub fn normalize_colors(configured: &[Rgb8], count: usize) -> Vec<Rgb8> {
    if configured.is_empty() {
        return hue_palette(count);
    }
    cycle_to(configured, count)
}

/// Extend `configured` to `count` entries, defaulting to [`DEFAULT_LINE_WIDTH`].
pub fn normalize_line_widths(configured: &[f32], count: usize) -> Vec<f32> {
    if configured.is_empty() {
        return vec![DEFAULT_LINE_WIDTH; count];
    }
    cycle_to(configured, count)
}

fn cycle_to<T: Copy>(configured: &[T], count: usize) -> Vec<T> {
    let m = configured.len();
    let mut out: Vec<T> = configured.iter().copied().take(count).collect();
    for i in m..count {
        out.push(out[i - m]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsb_round_trip_is_within_one_step() {
        for r in (0..=255u16).step_by(15) {
            for g in (0..=255u16).step_by(17) {
                for b in (0..=255u16).step_by(51) {
                    let c = Rgb8::new(r as u8, g as u8, b as u8);
                    let back = Rgb8::from_hsb(c.to_hsb());
                    assert!((i16::from(c.r) - i16::from(back.r)).abs() <= 1, "{c:?} {back:?}");
                    assert!((i16::from(c.g) - i16::from(back.g)).abs() <= 1, "{c:?} {back:?}");
                    assert!((i16::from(c.b) - i16::from(back.b)).abs() <= 1, "{c:?} {back:?}");
                }
            }
        }
    }

    #[test]
    fn primaries_have_expected_hues() {
        assert_eq!(Rgb8::new(255, 0, 0).to_hsb().h, 0.0);
        assert!((Rgb8::new(0, 255, 0).to_hsb().h - 1.0 / 3.0).abs() < 1e-6);
        assert!((Rgb8::new(0, 0, 255).to_hsb().h - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn scale_brightness_keeps_hue_and_reaches_black() {
        let c = Rgb8::new(200, 40, 40);
        assert_eq!(c.scale_brightness(0.0), Rgb8::BLACK);
        assert_eq!(c.scale_brightness(1.0), c);
        let half = c.scale_brightness(0.5);
        assert!((half.to_hsb().h - c.to_hsb().h).abs() < 0.01);
        assert!(half.r < c.r);
    }

    #[test]
    fn parses_hex() {
        assert_eq!(Rgb8::parse_hex("#ff8000"), Ok(Rgb8::new(255, 128, 0)));
        assert_eq!(Rgb8::parse_hex("00FF00"), Ok(Rgb8::new(0, 255, 0)));
        assert!(Rgb8::parse_hex("#fff").is_err());
        assert!(Rgb8::parse_hex("#gg0000").is_err());
    }

    #[test]
    fn serde_uses_hex_strings() {
        let c: Rgb8 = serde_json::from_value(serde_json::json!("#102030")).unwrap();
        assert_eq!(c, Rgb8::new(0x10, 0x20, 0x30));
        assert_eq!(serde_json::to_value(c).unwrap(), serde_json::json!("#102030"));
    }

    #[test]
    fn missing_colors_cycle_through_configured_ones() {
        let configured = [Rgb8::new(1, 0, 0), Rgb8::new(2, 0, 0)];
        let out = normalize_colors(&configured, 5);
        assert_eq!(out.len(), 5);
        assert_eq!(out[2], out[0]);
        assert_eq!(out[3], out[1]);
        assert_eq!(out[4], out[0]);
    }

    #[test]
    fn no_colors_spread_hues_over_the_wheel() {
        let out = normalize_colors(&[], 4);
        assert_eq!(out.len(), 4);
        let hues: Vec<f32> = out.iter().map(|c| c.to_hsb().h).collect();
        for (i, h) in hues.iter().enumerate() {
            assert!((h - i as f32 / 4.0).abs() < 0.01, "hue {i} was {h}");
        }
        assert_eq!(out[0], Rgb8::new(255, 51, 51));
    }

    #[test]
    fn line_widths_default_and_cycle() {
        assert_eq!(normalize_line_widths(&[], 3), vec![2.0, 2.0, 2.0]);
        assert_eq!(normalize_line_widths(&[1.0, 4.0], 3), vec![1.0, 4.0, 1.0]);
        assert_eq!(normalize_line_widths(&[1.0, 4.0, 5.0], 2), vec![1.0, 4.0]);
    }
}
