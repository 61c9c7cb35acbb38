use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Browser viewport emulation for one screenshot sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
    pub is_mobile: bool,
    pub has_touch: bool,
}

impl ViewportConfig {
    pub fn desktop() -> Self {
        Self {
            name: "desktop".to_string(),
            width: 1280,
            height: 800,
            device_scale_factor: 1.0,
            is_mobile: false,
            has_touch: false,
        }
    }

    pub fn mobile() -> Self {
        Self {
            name: "mobile".to_string(),
            width: 375,
            height: 667,
            device_scale_factor: 2.0,
            is_mobile: true,
            has_touch: true,
        }
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self::desktop()
    }
}

/// Which of the built-in viewport presets to sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewportSelection {
    Desktop,
    Mobile,
    #[default]
    Both,
}

impl ViewportSelection {
    pub fn presets(self) -> Vec<ViewportConfig> {
        match self {
            ViewportSelection::Desktop => vec![ViewportConfig::desktop()],
            ViewportSelection::Mobile => vec![ViewportConfig::mobile()],
            ViewportSelection::Both => vec![ViewportConfig::desktop(), ViewportConfig::mobile()],
        }
    }
}

#[derive(Debug, Error)]
pub enum ViewportParseError {
    #[error("Invalid viewport {0:?}: expected desktop, mobile or both")]
    Unknown(String),
}

impl FromStr for ViewportSelection {
    type Err = ViewportParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desktop" => Ok(ViewportSelection::Desktop),
            "mobile" => Ok(ViewportSelection::Mobile),
            "both" | "all" => Ok(ViewportSelection::Both),
            _ => Err(ViewportParseError::Unknown(s.to_string())),
        }
    }
}

impl std::fmt::Display for ViewportSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ViewportSelection::Desktop => "desktop",
            ViewportSelection::Mobile => "mobile",
            ViewportSelection::Both => "both",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert_eq!(
            "desktop".parse::<ViewportSelection>().unwrap(),
            ViewportSelection::Desktop
        );
        assert_eq!(
            " Mobile ".parse::<ViewportSelection>().unwrap(),
            ViewportSelection::Mobile
        );
        assert_eq!(
            "both".parse::<ViewportSelection>().unwrap(),
            ViewportSelection::Both
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!("tablet".parse::<ViewportSelection>().is_err());
        assert!("".parse::<ViewportSelection>().is_err());
        assert!("1440x900".parse::<ViewportSelection>().is_err());
    }

    #[test]
    fn test_presets_order() {
        let names: Vec<String> = ViewportSelection::Both
            .presets()
            .into_iter()
            .map(|vp| vp.name)
            .collect();
        assert_eq!(names, vec!["desktop", "mobile"]);
        assert_eq!(ViewportSelection::Mobile.presets().len(), 1);
    }

    #[test]
    fn test_mobile_preset_emulates_touch() {
        let vp = ViewportConfig::mobile();
        assert!(vp.is_mobile);
        assert!(vp.has_touch);
        assert!(vp.device_scale_factor > 1.0);
        assert!(vp.width < ViewportConfig::desktop().width);
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for sel in [
            ViewportSelection::Desktop,
            ViewportSelection::Mobile,
            ViewportSelection::Both,
        ] {
            assert_eq!(sel.to_string().parse::<ViewportSelection>().unwrap(), sel);
        }
    }
}
