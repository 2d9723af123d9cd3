//! Per-cell style tags.
//!
//! Styles are stored as composable flags rather than CSS strings. The grid
//! widget gets its class list from [`StyleTags::class_names`] and the two
//! free-form colors from [`StyleTags::inline_style`].

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

/// Vertical text alignment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlign {
    Top,
    #[default]
    Middle,
    Bottom,
}

/// Relative font size steps offered by the toolbar.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FontSize {
    XSmall,
    Small,
    #[default]
    Medium,
    Large,
    XLarge,
    XxLarge,
}

impl FontSize {
    fn class_name(self) -> Option<&'static str> {
        match self {
            FontSize::XSmall => Some("text-xs"),
            FontSize::Small => Some("text-sm"),
            FontSize::Medium => None,
            FontSize::Large => Some("text-lg"),
            FontSize::XLarge => Some("text-xl"),
            FontSize::XxLarge => Some("text-2xl"),
        }
    }
}

/// Font family choices.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FontFamily {
    SansSerif,
    Serif,
    Monospace,
}

impl FontFamily {
    fn class_name(self) -> &'static str {
        match self {
            FontFamily::SansSerif => "font-sans",
            FontFamily::Serif => "font-serif",
            FontFamily::Monospace => "font-mono",
        }
    }
}

/// An opaque RGB color, serialized as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color([u8; 3]);

impl Color {
    pub const BLACK: Color = Color([0, 0, 0]);

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color([r, g, b])
    }

    /// Parse `#RRGGBB`, `#RGB` (with or without `#`) or `rgb(R, G, B)`.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();

        if let Some(inner) = trimmed.strip_prefix("rgb(").and_then(|s| s.strip_suffix(')')) {
            let parts: Vec<&str> = inner.split(',').collect();
            if parts.len() != 3 {
                return None;
            }
            let r = parts[0].trim().parse::<u8>().ok()?;
            let g = parts[1].trim().parse::<u8>().ok()?;
            let b = parts[2].trim().parse::<u8>().ok()?;
            return Some(Color([r, g, b]));
        }

        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if !hex.is_ascii() {
            return None;
        }
        match hex.len() {
            3 => {
                let r = u8::from_str_radix(&hex[0..1], 16).ok()?;
                let g = u8::from_str_radix(&hex[1..2], 16).ok()?;
                let b = u8::from_str_radix(&hex[2..3], 16).ok()?;
                Some(Color([r * 17, g * 17, b * 17]))
            }
            6 => {
                let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
                let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
                let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
                Some(Color([r, g, b]))
            }
            _ => None,
        }
    }

    /// Packed `0xRRGGBB`.
    pub fn to_u32(self) -> u32 {
        let [r, g, b] = self.0;
        ((r as u32) << 16) | ((g as u32) << 8) | (b as u32)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{:02X}{:02X}{:02X}", r, g, b)
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::parse(&value).ok_or_else(|| format!("invalid color '{}'", value))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> String {
        color.to_string()
    }
}

/// Formatting attached to one coordinate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct StyleTags {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub align: Align,
    pub vertical_align: VerticalAlign,
    pub font_size: FontSize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<FontFamily>,
    /// Text color; `None` renders in the sheet's default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    /// Fill color; `None` is transparent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Color>,
}

impl StyleTags {
    pub fn bold() -> Self {
        Self { bold: true, ..Default::default() }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Apply only the fields the patch sets.
    pub fn apply(&mut self, patch: &StylePatch) {
        if let Some(v) = patch.bold {
            self.bold = v;
        }
        if let Some(v) = patch.italic {
            self.italic = v;
        }
        if let Some(v) = patch.underline {
            self.underline = v;
        }
        if let Some(v) = patch.strikethrough {
            self.strikethrough = v;
        }
        if let Some(v) = patch.align {
            self.align = v;
        }
        if let Some(v) = patch.vertical_align {
            self.vertical_align = v;
        }
        if let Some(v) = patch.font_size {
            self.font_size = v;
        }
        if let Some(v) = patch.font_family {
            self.font_family = v;
        }
        if let Some(v) = patch.color {
            self.color = v;
        }
        if let Some(v) = patch.background_color {
            self.background_color = v;
        }
    }

    /// Space-separated class list for the grid widget. Defaults emit nothing.
    pub fn class_names(&self) -> String {
        let mut classes: Vec<&str> = Vec::new();
        if self.bold {
            classes.push("font-bold");
        }
        if self.italic {
            classes.push("font-italic");
        }
        if self.underline {
            classes.push("text-underline");
        }
        if self.strikethrough {
            classes.push("text-line-through");
        }
        match self.align {
            Align::Left => {}
            Align::Center => classes.push("text-center"),
            Align::Right => classes.push("text-right"),
        }
        match self.vertical_align {
            VerticalAlign::Middle => {}
            VerticalAlign::Top => classes.push("align-top"),
            VerticalAlign::Bottom => classes.push("align-bottom"),
        }
        if let Some(class) = self.font_size.class_name() {
            classes.push(class);
        }
        if let Some(family) = self.font_family {
            classes.push(family.class_name());
        }
        classes.join(" ")
    }

    /// Inline declarations for the colors, which have no fixed class.
    pub fn inline_style(&self) -> String {
        let mut decls = Vec::new();
        if let Some(color) = self.color {
            decls.push(format!("color: {}", color));
        }
        if let Some(color) = self.background_color {
            decls.push(format!("background-color: {}", color));
        }
        decls.join("; ")
    }
}

/// A partial style change. `None` leaves the field untouched. The optional
/// fields take `Some(None)` (JSON `null`) to clear them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct StylePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strikethrough: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align: Option<Align>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_align: Option<VerticalAlign>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<FontSize>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub font_family: Option<Option<FontFamily>>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub color: Option<Option<Color>>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Option<Color>>,
}

/// A field that is present deserializes to `Some`, even when it is `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
