//! Editor layout state.

use serde::{Deserialize, Serialize};

pub const SPLIT_RATIO_RANGE: (f64, f64) = (0.1, 0.9);
pub const SIDEBAR_WIDTH_RANGE: (f64, f64) = (0.1, 0.5);
pub const NOTE_LIST_WIDTH_RANGE: (f64, f64) = (0.1, 0.8);

pub const DEFAULT_SPLIT_RATIO: f64 = 0.5;
pub const DEFAULT_SIDEBAR_WIDTH: f64 = 0.2;
pub const DEFAULT_NOTE_LIST_WIDTH: f64 = 0.25;
pub const COMPACT_SIDEBAR_WIDTH: f64 = 0.15;
pub const COMPACT_NOTE_LIST_WIDTH: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Edit,
    Preview,
    #[default]
    Split,
}

impl ViewMode {
    /// Next mode in the edit → preview → split cycle.
    pub fn next(self) -> Self {
        match self {
            Self::Edit => Self::Preview,
            Self::Preview => Self::Split,
            Self::Split => Self::Edit,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Preview => "preview",
            Self::Split => "split",
        }
    }
}

/// Layout snapshot. Ratios are fractions of the window width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewState {
    pub mode: ViewMode,
    pub split_ratio: f64,
    pub is_fullscreen: bool,
    pub sidebar_visible: bool,
    pub note_list_visible: bool,
    pub sidebar_width: f64,
    pub note_list_width: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            mode: ViewMode::Split,
            split_ratio: DEFAULT_SPLIT_RATIO,
            is_fullscreen: false,
            sidebar_visible: true,
            note_list_visible: true,
            sidebar_width: DEFAULT_SIDEBAR_WIDTH,
            note_list_width: DEFAULT_NOTE_LIST_WIDTH,
        }
    }
}

/// Clamps `value` into `range`; non-finite input yields `fallback`.
pub fn clamp_ratio(value: f64, range: (f64, f64), fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(range.0, range.1)
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::{clamp_ratio, ViewMode, ViewState, SPLIT_RATIO_RANGE};

    #[test]
    fn mode_cycle_wraps() {
        assert_eq!(ViewMode::Edit.next(), ViewMode::Preview);
        assert_eq!(ViewMode::Preview.next(), ViewMode::Split);
        assert_eq!(ViewMode::Split.next(), ViewMode::Edit);
    }

    #[test]
    fn clamp_handles_bounds_and_nan() {
        assert_eq!(clamp_ratio(0.05, SPLIT_RATIO_RANGE, 0.5), 0.1);
        assert_eq!(clamp_ratio(0.95, SPLIT_RATIO_RANGE, 0.5), 0.9);
        assert_eq!(clamp_ratio(f64::NAN, SPLIT_RATIO_RANGE, 0.5), 0.5);
    }

    #[test]
    fn state_serializes_camel_case() {
        let json = serde_json::to_value(ViewState::default()).expect("state should serialize");
        assert_eq!(json["mode"], "split");
        assert_eq!(json["noteListWidth"], 0.25);
        assert_eq!(json["isFullscreen"], false);
    }
}
