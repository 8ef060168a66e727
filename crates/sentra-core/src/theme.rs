use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Density {
    Comfortable,
    Compact,
}

/// The one mutable platform theme. Personalized copies derive from it and
/// are cached per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub primary_hue: f32,
    pub saturation: f32,
    pub lightness: f32,
    pub spacing_unit: f32,
    pub font_scale: f32,
    pub corner_radius: f32,
    pub density: Density,
    pub mode: ThemeMode,
    pub stamped_ms: u64,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            primary_hue: 222.0,
            saturation: 68.0,
            lightness: 54.0,
            spacing_unit: 8.0,
            font_scale: 1.0,
            corner_radius: 10.0,
            density: Density::Comfortable,
            mode: ThemeMode::Light,
            stamped_ms: 0,
        }
    }
}

impl Theme {
    pub fn adjusted(&self, adjustments: &ThemeAdjustments, at_ms: u64) -> Theme {
        let mut theme = self.clone();
        if let Some(hue) = adjustments.primary_hue {
            theme.primary_hue = hue.rem_euclid(360.0);
        }
        if let Some(saturation) = adjustments.saturation {
            theme.saturation = saturation.clamp(0.0, 100.0);
        }
        if let Some(lightness) = adjustments.lightness {
            theme.lightness = lightness.clamp(0.0, 100.0);
        }
        if let Some(mode) = adjustments.mode {
            theme.mode = mode;
        }
        theme.stamped_ms = at_ms;
        theme
    }

    pub fn personalized(&self, prefs: &ThemePrefs) -> Theme {
        let mut theme = self.clone();
        if let Some(hue) = prefs.hue {
            theme.primary_hue = hue.rem_euclid(360.0);
        }
        if let Some(scale) = prefs.text_scale {
            theme.font_scale = scale.clamp(0.75, 2.0);
        }
        if let Some(dark) = prefs.dark {
            theme.mode = if dark { ThemeMode::Dark } else { ThemeMode::Light };
        }
        theme
    }
}

/// Partial theme mutation carried by a recommendation set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThemeAdjustments {
    pub primary_hue: Option<f32>,
    pub saturation: Option<f32>,
    pub lightness: Option<f32>,
    pub mode: Option<ThemeMode>,
}

impl ThemeAdjustments {
    pub fn is_empty(&self) -> bool {
        self.primary_hue.is_none()
            && self.saturation.is_none()
            && self.lightness.is_none()
            && self.mode.is_none()
    }

    pub fn night_mode() -> Self {
        ThemeAdjustments {
            primary_hue: None,
            saturation: Some(42.0),
            lightness: Some(32.0),
            mode: Some(ThemeMode::Dark),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemePrefs {
    pub hue: Option<f32>,
    pub text_scale: Option<f32>,
    pub dark: Option<bool>,
}
