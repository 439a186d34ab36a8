//! Single-threaded view-state model.

use crate::model::view_state::{
    clamp_ratio, ViewMode, ViewState, COMPACT_NOTE_LIST_WIDTH, COMPACT_SIDEBAR_WIDTH,
    DEFAULT_NOTE_LIST_WIDTH, DEFAULT_SIDEBAR_WIDTH, DEFAULT_SPLIT_RATIO, NOTE_LIST_WIDTH_RANGE,
    SIDEBAR_WIDTH_RANGE, SPLIT_RATIO_RANGE,
};
use crate::service::events::{call_guarded, EventBus, NotebookEvent};
use log::debug;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewField {
    Mode,
    SplitRatio,
    IsFullscreen,
    SidebarVisible,
    NoteListVisible,
    SidebarWidth,
    NoteListWidth,
}

impl ViewField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mode => "mode",
            Self::SplitRatio => "splitRatio",
            Self::IsFullscreen => "isFullscreen",
            Self::SidebarVisible => "sidebarVisible",
            Self::NoteListVisible => "noteListVisible",
            Self::SidebarWidth => "sidebarWidth",
            Self::NoteListWidth => "noteListWidth",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ViewValue {
    Mode(ViewMode),
    Ratio(f64),
    Flag(bool),
}

/// One field transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewStateChange {
    pub field: ViewField,
    pub old: ViewValue,
    pub new: ViewValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewSubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&ViewStateChange, &ViewState)>;

/// Layout state driven from the UI thread.
///
/// Not `Send`: subscribers are plain UI callbacks.
pub struct ViewStateModel {
    state: ViewState,
    previous_mode: Option<ViewMode>,
    saved_visibility: Option<(bool, bool)>,
    next_id: u64,
    subscribers: Vec<(ViewSubscriptionId, Subscriber)>,
}

impl Default for ViewStateModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewStateModel {
    pub fn new() -> Self {
        Self {
            state: ViewState::default(),
            previous_mode: None,
            saved_visibility: None,
            next_id: 1,
            subscribers: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> ViewState {
        self.state
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        if mode == self.state.mode {
            return;
        }
        self.previous_mode = Some(self.state.mode);
        self.commit(ViewState { mode, ..self.state });
    }

    /// edit → preview → split → edit.
    pub fn toggle_mode(&mut self) {
        self.set_mode(self.state.mode.next());
    }

    /// Returns `false` when there is no earlier mode to go back to.
    pub fn restore_previous_mode(&mut self) -> bool {
        match self.previous_mode {
            Some(previous) => {
                self.set_mode(previous);
                true
            }
            None => false,
        }
    }

    pub fn set_split_ratio(&mut self, ratio: f64) {
        let split_ratio = clamp_ratio(ratio, SPLIT_RATIO_RANGE, self.state.split_ratio);
        self.commit(ViewState {
            split_ratio,
            ..self.state
        });
    }

    pub fn set_sidebar_width(&mut self, width: f64) {
        let sidebar_width = clamp_ratio(width, SIDEBAR_WIDTH_RANGE, self.state.sidebar_width);
        self.commit(ViewState {
            sidebar_width,
            ..self.state
        });
    }

    pub fn set_note_list_width(&mut self, width: f64) {
        let note_list_width =
            clamp_ratio(width, NOTE_LIST_WIDTH_RANGE, self.state.note_list_width);
        self.commit(ViewState {
            note_list_width,
            ..self.state
        });
    }

    pub fn toggle_sidebar(&mut self) {
        self.commit(ViewState {
            sidebar_visible: !self.state.sidebar_visible,
            ..self.state
        });
    }

    pub fn toggle_note_list(&mut self) {
        self.commit(ViewState {
            note_list_visible: !self.state.note_list_visible,
            ..self.state
        });
    }

    /// Entering hides both panes and remembers their visibility; leaving
    /// restores it.
    pub fn toggle_fullscreen(&mut self) {
        let next = if self.state.is_fullscreen {
            let (sidebar_visible, note_list_visible) =
                self.saved_visibility.take().unwrap_or((true, true));
            ViewState {
                is_fullscreen: false,
                sidebar_visible,
                note_list_visible,
                ..self.state
            }
        } else {
            self.saved_visibility = Some((self.state.sidebar_visible, self.state.note_list_visible));
            ViewState {
                is_fullscreen: true,
                sidebar_visible: false,
                note_list_visible: false,
                ..self.state
            }
        };
        self.commit(next);
    }

    pub fn set_compact_mode(&mut self, compact: bool) {
        let (sidebar_width, note_list_width) = if compact {
            (COMPACT_SIDEBAR_WIDTH, COMPACT_NOTE_LIST_WIDTH)
        } else {
            (DEFAULT_SIDEBAR_WIDTH, DEFAULT_NOTE_LIST_WIDTH)
        };
        self.commit(ViewState {
            sidebar_width,
            note_list_width,
            ..self.state
        });
    }

    /// Replaces the whole state, clamping ratios; non-finite ratios fall
    /// back to defaults.
    pub fn load_state(&mut self, state: ViewState) {
        if state.mode != self.state.mode {
            self.previous_mode = Some(self.state.mode);
        }
        self.saved_visibility = None;
        self.commit(ViewState {
            mode: state.mode,
            split_ratio: clamp_ratio(state.split_ratio, SPLIT_RATIO_RANGE, DEFAULT_SPLIT_RATIO),
            is_fullscreen: state.is_fullscreen,
            sidebar_visible: state.sidebar_visible,
            note_list_visible: state.note_list_visible,
            sidebar_width: clamp_ratio(
                state.sidebar_width,
                SIDEBAR_WIDTH_RANGE,
                DEFAULT_SIDEBAR_WIDTH,
            ),
            note_list_width: clamp_ratio(
                state.note_list_width,
                NOTE_LIST_WIDTH_RANGE,
                DEFAULT_NOTE_LIST_WIDTH,
            ),
        });
    }

    pub fn subscribe(
        &mut self,
        subscriber: impl FnMut(&ViewStateChange, &ViewState) + 'static,
    ) -> ViewSubscriptionId {
        let id = ViewSubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    pub fn unsubscribe(&mut self, id: ViewSubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.len() != before
    }

    /// Republishes every change on `bus` as `ViewStateChanged`.
    pub fn forward_to(&mut self, bus: EventBus) -> ViewSubscriptionId {
        self.subscribe(move |change, _| bus.emit(NotebookEvent::ViewStateChanged(*change)))
    }

    fn commit(&mut self, next: ViewState) {
        let changes = diff(&self.state, &next);
        self.state = next;
        if changes.is_empty() {
            return;
        }

        let state = self.state;
        for change in &changes {
            debug!(
                "event=view_change module=view status=ok field={}",
                change.field.as_str()
            );
            for (_, subscriber) in self.subscribers.iter_mut() {
                call_guarded("view", "view_state_changed", || subscriber(change, &state));
            }
        }
    }
}

fn diff(old: &ViewState, new: &ViewState) -> Vec<ViewStateChange> {
    let mut changes = Vec::new();
    let mut push = |field, old_value: ViewValue, new_value: ViewValue| {
        if old_value != new_value {
            changes.push(ViewStateChange {
                field,
                old: old_value,
                new: new_value,
            });
        }
    };

    push(ViewField::Mode, ViewValue::Mode(old.mode), ViewValue::Mode(new.mode));
    push(
        ViewField::SplitRatio,
        ViewValue::Ratio(old.split_ratio),
        ViewValue::Ratio(new.split_ratio),
    );
    push(
        ViewField::IsFullscreen,
        ViewValue::Flag(old.is_fullscreen),
        ViewValue::Flag(new.is_fullscreen),
    );
    push(
        ViewField::SidebarVisible,
        ViewValue::Flag(old.sidebar_visible),
        ViewValue::Flag(new.sidebar_visible),
    );
    push(
        ViewField::NoteListVisible,
        ViewValue::Flag(old.note_list_visible),
        ViewValue::Flag(new.note_list_visible),
    );
    push(
        ViewField::SidebarWidth,
        ViewValue::Ratio(old.sidebar_width),
        ViewValue::Ratio(new.sidebar_width),
    );
    push(
        ViewField::NoteListWidth,
        ViewValue::Ratio(old.note_list_width),
        ViewValue::Ratio(new.note_list_width),
    );
    changes
}
