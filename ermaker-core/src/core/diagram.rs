//! ER-diagram rendering preferences shared by diagram tabs, connection
//! profiles and the global settings panel.

use serde::{Deserialize, Serialize};

/// Notation used to draw entities and relationships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagramStyle {
    #[default]
    Chen,
    CrowsFoot,
}

/// Mermaid colour theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagramTheme {
    #[default]
    Default,
    Forest,
    Dark,
    Neutral,
    Base,
}

/// Edge interpolation. Only meaningful for Chen diagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagramCurve {
    #[default]
    Basis,
    Linear,
    Step,
    MonotoneX,
    MonotoneY,
}

/// Canvas colour used when displaying or exporting a diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagramBackground {
    #[default]
    Light,
    Dark,
    Transparent,
}

/// Full set of rendering preferences for one diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiagramSettings {
    pub style: DiagramStyle,
    pub theme: DiagramTheme,
    pub curve: DiagramCurve,
    pub background: DiagramBackground,
}

impl DiagramSettings {
    /// Returns a copy with every field set in `update` replaced.
    pub fn merged(mut self, update: &DiagramSettingsUpdate) -> Self {
        if let Some(style) = update.style {
            self.style = style;
        }
        if let Some(theme) = update.theme {
            self.theme = theme;
        }
        if let Some(curve) = update.curve {
            self.curve = curve;
        }
        if let Some(background) = update.background {
            self.background = background;
        }
        self
    }
}

/// Partial change to [`DiagramSettings`]; `None` leaves a field as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramSettingsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<DiagramStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<DiagramTheme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<DiagramCurve>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<DiagramBackground>,
}

impl DiagramSettingsUpdate {
    /// Returns `true` when the update would change nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A named style/theme/curve combination offered as a one-click choice.
/// Presets leave the background untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagramPreset {
    pub name: &'static str,
    pub style: DiagramStyle,
    pub theme: DiagramTheme,
    pub curve: DiagramCurve,
}

impl DiagramPreset {
    /// The preset as a partial update.
    pub fn as_update(&self) -> DiagramSettingsUpdate {
        DiagramSettingsUpdate {
            style: Some(self.style),
            theme: Some(self.theme),
            curve: Some(self.curve),
            background: None,
        }
    }
}

/// Named style/theme/curve combinations offered in the settings panel.
pub const DIAGRAM_PRESETS: [DiagramPreset; 5] = [
    DiagramPreset {
        name: "Default",
        style: DiagramStyle::Chen,
        theme: DiagramTheme::Default,
        curve: DiagramCurve::Basis,
    },
    DiagramPreset {
        name: "Dark Mode",
        style: DiagramStyle::Chen,
        theme: DiagramTheme::Dark,
        curve: DiagramCurve::Basis,
    },
    DiagramPreset {
        name: "Forest Chen",
        style: DiagramStyle::Chen,
        theme: DiagramTheme::Forest,
        curve: DiagramCurve::Linear,
    },
    DiagramPreset {
        name: "Crow's Foot Classic",
        style: DiagramStyle::CrowsFoot,
        theme: DiagramTheme::Default,
        curve: DiagramCurve::Basis,
    },
    DiagramPreset {
        name: "Crow's Foot Dark",
        style: DiagramStyle::CrowsFoot,
        theme: DiagramTheme::Dark,
        curve: DiagramCurve::Linear,
    },
];

/// Looks up a preset by its display name.
pub fn find_preset(name: &str) -> Option<&'static DiagramPreset> {
    DIAGRAM_PRESETS.iter().find(|p| p.name == name)
}
