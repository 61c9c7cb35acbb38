use serde::{Deserialize, Serialize};

/// `prefers-color-scheme` emulation applied to a browser context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorScheme {
    Light,
    Dark,
    NoPreference,
}

impl ColorScheme {
    /// Name used in screenshot file names.
    pub fn name(self) -> &'static str {
        match self {
            ColorScheme::Light => "light",
            ColorScheme::Dark => "dark",
            ColorScheme::NoPreference => "default",
        }
    }

    /// Value handed to the browser's media emulation.
    pub fn value(self) -> &'static str {
        match self {
            ColorScheme::Light => "light",
            ColorScheme::Dark => "dark",
            ColorScheme::NoPreference => "no-preference",
        }
    }

    /// Schemes swept by the screenshot plugin.
    pub fn sweep(capture_color_schemes: bool) -> Vec<ColorScheme> {
        if capture_color_schemes {
            vec![ColorScheme::Light, ColorScheme::Dark]
        } else {
            vec![ColorScheme::Light]
        }
    }
}

impl std::fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_defaults_to_light_and_dark() {
        assert_eq!(
            ColorScheme::sweep(true),
            vec![ColorScheme::Light, ColorScheme::Dark]
        );
        assert_eq!(ColorScheme::sweep(false), vec![ColorScheme::Light]);
    }

    #[test]
    fn no_preference_uses_media_keyword() {
        assert_eq!(ColorScheme::NoPreference.value(), "no-preference");
        assert_eq!(ColorScheme::Dark.value(), "dark");
    }

    #[test]
    fn serializes_as_kebab_case() {
        let json = serde_json::to_string(&ColorScheme::NoPreference).unwrap();
        assert_eq!(json, "\"no-preference\"");
    }
}
