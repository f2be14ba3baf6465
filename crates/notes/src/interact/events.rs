// ABOUTME: Input events understood by a popover session and the host's listener registration hints.
// ABOUTME: Mirrors pointer, focus, keyboard and click events delivered to a bubble's wrapper.

use serde::Serialize;

/// Keys a bubble reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
    Space,
    Other,
}

impl Key {
    /// Maps a DOM `KeyboardEvent.key` value.
    pub fn from_dom(key: &str) -> Self {
        match key {
            "Escape" | "Esc" => Key::Escape,
            "Enter" => Key::Enter,
            " " | "Spacebar" => Key::Space,
            _ => Key::Other,
        }
    }
}

/// Modifier keys held during a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn any(&self) -> bool {
        self.ctrl || self.meta || self.shift || self.alt
    }
}

/// An event delivered to one bubble's wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    PointerEnter,
    PointerLeave,
    Focus,
    Blur,
    KeyDown(Key),
    Click(Modifiers),
}

/// What the host must do with the originating event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Response {
    /// Suppress the default action (link navigation, page scroll on Space).
    pub prevent_default: bool,
}

impl Response {
    pub fn default_action() -> Self {
        Self {
            prevent_default: false,
        }
    }

    pub fn prevent() -> Self {
        Self {
            prevent_default: true,
        }
    }
}

/// A window-level listener the host registers for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ListenerSpec {
    pub event: &'static str,
    /// A passive listener never blocks scrolling.
    pub passive: bool,
}

/// Window listeners that drive repositioning: scroll is passive, resize is not.
pub const VIEWPORT_LISTENERS: [ListenerSpec; 2] = [
    ListenerSpec {
        event: "scroll",
        passive: true,
    },
    ListenerSpec {
        event: "resize",
        passive: false,
    },
];
