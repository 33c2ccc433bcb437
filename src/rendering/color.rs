//! Color math for rank-based attachment tinting.
//!
//! Pure and deterministic: hex parsing, formatting, and linear interpolation
//! between two colors. The formatter fades weaker matches from a category
//! base color toward white.

use crate::{Error, Result};

/// An RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

/// Base color for question attachments.
pub const QUESTION_BASE: Rgb = Rgb {
    r: 0x3A,
    g: 0xA3,
    b: 0xE3,
};

/// Base color for answer attachments.
pub const ANSWER_BASE: Rgb = Rgb {
    r: 0x2E,
    g: 0xB8,
    b: 0x86,
};

/// Fade target for weak matches.
pub const WHITE: Rgb = Rgb {
    r: 0xFF,
    g: 0xFF,
    b: 0xFF,
};

impl Rgb {
    /// Parses a `#RRGGBB` hex literal.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the literal is not exactly seven
    /// characters starting with `#`, or contains non-hex digits.
    pub fn parse(hex: &str) -> Result<Self> {
        let digits = hex
            .strip_prefix('#')
            .ok_or_else(|| Error::InvalidInput(format!("color must start with '#': {hex}")))?;
        if digits.len() != 6 {
            return Err(Error::InvalidInput(format!(
                "color must be six hex digits: {hex}"
            )));
        }
        // get() rather than indexing: a multi-byte char would put a range
        // boundary mid-character and panic
        let channel = |range: std::ops::Range<usize>| {
            digits
                .get(range)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| Error::InvalidInput(format!("invalid hex digits in color: {hex}")))
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    /// Formats as a `#RRGGBB` hex literal.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Linearly interpolates from `self` toward `other` by `fraction`.
    ///
    /// `fraction` is clamped to `[0, 1]`: 0 returns `self` exactly, 1
    /// returns `other` exactly, and each channel moves monotonically in
    /// between.
    #[must_use]
    pub fn mix(self, other: Self, fraction: f64) -> Self {
        let fraction = fraction.clamp(0.0, 1.0);
        let lerp = |a: u8, b: u8| -> u8 {
            let mixed = f64::from(a) + (f64::from(b) - f64::from(a)) * fraction;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                mixed.round().clamp(0.0, 255.0) as u8
            }
        };
        Self {
            r: lerp(self.r, other.r),
            g: lerp(self.g, other.g),
            b: lerp(self.b, other.b),
        }
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
