use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const MIN_ZOOM: f64 = 0.25;
pub const MAX_ZOOM: f64 = 4.0;

/// Per-user canvas preferences, persisted under the `user_preferences` key.
/// Missing fields take their defaults so older payloads still load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default = "default_zoom")]
    pub zoom: f64,
    #[serde(default = "default_true")]
    pub auto_scroll: bool,
    #[serde(default = "default_true")]
    pub snap_to_grid: bool,
}

fn default_zoom() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            zoom: default_zoom(),
            auto_scroll: true,
            snap_to_grid: true,
        }
    }
}

impl UserPreferences {
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.zoom.is_finite() || !(MIN_ZOOM..=MAX_ZOOM).contains(&self.zoom) {
            return Err(CoreError::Validation(format!(
                "Zoom must be between {MIN_ZOOM} and {MAX_ZOOM}, got {}",
                self.zoom
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn empty_object_loads_defaults() {
        let prefs: UserPreferences = serde_json::from_str("{}").unwrap();
        assert_eq!(prefs, UserPreferences::default());
    }

    #[test]
    fn zoom_range_is_enforced() {
        let mut prefs = UserPreferences::default();
        assert!(prefs.validate().is_ok());
        prefs.zoom = 0.0;
        assert_matches!(prefs.validate(), Err(CoreError::Validation(_)));
        prefs.zoom = f64::NAN;
        assert_matches!(prefs.validate(), Err(CoreError::Validation(_)));
    }
}
