//! Adapter between a color-selection widget and the flat render parameters.
//!
//! The widget side hands over hex strings (`#rrggbb` or `#rrggbbaa`); the
//! service side expects them under the `fgColor`/`bgColor` parameter names.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use shared::domain::RenderParameters;

pub const FOREGROUND_PARAM: &str = "fgColor";
pub const BACKGROUND_PARAM: &str = "bgColor";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorParseError {
    #[error("invalid length for hex color {0:?}")]
    InvalidLength(String),
    #[error("invalid {component} component in hex color {input:?}")]
    InvalidComponent {
        component: &'static str,
        input: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parses `#rrggbb` or `#rrggbbaa`, case-insensitive; the `#` prefix is
    /// optional. Alpha defaults to 255 in the six-digit form.
    pub fn parse_hex(input: &str) -> Result<Self, ColorParseError> {
        let hex = input.strip_prefix('#').unwrap_or(input);
        if !hex.is_ascii() || (hex.len() != 6 && hex.len() != 8) {
            return Err(ColorParseError::InvalidLength(input.to_string()));
        }

        let component = |range: std::ops::Range<usize>, name: &'static str| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| ColorParseError::InvalidComponent {
                component: name,
                input: input.to_string(),
            })
        };

        let r = component(0..2, "red")?;
        let g = component(2..4, "green")?;
        let b = component(4..6, "blue")?;
        let a = if hex.len() == 8 {
            component(6..8, "alpha")?
        } else {
            255
        };
        Ok(Self { r, g, b, a })
    }

    /// Lowercase `#rrggbbaa`, the widget's canonical output form.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Rgba {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_hex(s)
    }
}

/// The two colors a picker widget feeds into a submission. Either side may be
/// absent, in which case the service applies its own default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorSelection {
    pub foreground: Option<Rgba>,
    pub background: Option<Rgba>,
}

impl ColorSelection {
    pub fn apply(&self, params: &mut RenderParameters) {
        if let Some(fg) = self.foreground {
            params.insert(FOREGROUND_PARAM, fg.to_hex());
        }
        if let Some(bg) = self.background {
            params.insert(BACKGROUND_PARAM, bg.to_hex());
        }
    }
}
