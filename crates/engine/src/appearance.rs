//! Cell appearance and the cell > column > row > sheet cascade.
//!
//! Resolution is per field, not per object: a cell may take its font from
//! the column override while supplying only its own background.
//!
//! A field counts as set only when it is *present*: an empty string, a zero
//! or NaN number and `None` all fall through to the next layer. An
//! intentional size of `0` therefore cannot be expressed as an override.

use serde::{Deserialize, Serialize};

/// Line drawn along a cell edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Border {
    pub width: f64,
    pub color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextStyle {
    Normal,
    Bold,
    Italic,
    BoldItalic,
}

/// Style of a cell, column, row or the sheet default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Appearance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizontal_border: Option<Border>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_border: Option<Border>,
    /// Text color
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_align: Option<TextAlign>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_style: Option<TextStyle>,
}

impl Appearance {
    /// Sheet default used when no settings are supplied.
    pub fn sheet_default() -> Self {
        Self::from_settings(&websheet_config::Settings::default())
    }

    pub fn from_settings(settings: &websheet_config::Settings) -> Self {
        Self {
            background: settings.background.clone(),
            font_name: Some(settings.font_name.clone()),
            font_size: Some(settings.font_size),
            text: Some(settings.text_color.clone()),
            ..Self::default()
        }
    }

    /// Appearance with only a background set.
    pub fn with_background(color: impl Into<String>) -> Self {
        Self {
            background: Some(color.into()),
            ..Self::default()
        }
    }

    /// Appearance with only a font name set.
    pub fn with_font(name: impl Into<String>) -> Self {
        Self {
            font_name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Whether a field value counts as set for the cascade.
pub trait Presence {
    fn is_present(&self) -> bool;
}

impl Presence for String {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl Presence for f64 {
    fn is_present(&self) -> bool {
        *self != 0.0 && !self.is_nan()
    }
}

impl Presence for Border {
    fn is_present(&self) -> bool {
        true
    }
}

impl Presence for TextAlign {
    fn is_present(&self) -> bool {
        true
    }
}

impl Presence for TextStyle {
    fn is_present(&self) -> bool {
        true
    }
}

/// First present value among the override layers, else the default's value
/// as-is (even when it is itself absent).
fn first_present<T, F>(layers: &[Option<&Appearance>; 3], default: &Appearance, field: F) -> Option<T>
where
    T: Presence + Clone,
    F: Fn(&Appearance) -> Option<&T>,
{
    layers
        .iter()
        .flatten()
        .copied()
        .filter_map(|layer| field(layer))
        .find(|value| value.is_present())
        .or_else(|| field(default))
        .cloned()
}

/// Resolve the effective appearance of one cell.
pub fn cascade(
    cell: Option<&Appearance>,
    column: Option<&Appearance>,
    row: Option<&Appearance>,
    default: &Appearance,
) -> Appearance {
    let layers = [cell, column, row];
    Appearance {
        background: first_present(&layers, default, |a| a.background.as_ref()),
        font_name: first_present(&layers, default, |a| a.font_name.as_ref()),
        font_size: first_present(&layers, default, |a| a.font_size.as_ref()),
        horizontal_border: first_present(&layers, default, |a| a.horizontal_border.as_ref()),
        vertical_border: first_present(&layers, default, |a| a.vertical_border.as_ref()),
        text: first_present(&layers, default, |a| a.text.as_ref()),
        text_align: first_present(&layers, default, |a| a.text_align.as_ref()),
        text_style: first_present(&layers, default, |a| a.text_style.as_ref()),
    }
}
