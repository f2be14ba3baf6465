// ABOUTME: Runtime popover behaviour as a deterministic state machine driven by host events.
// ABOUTME: Handles show/hide, the per-bubble hide debounce timer, keyboard toggles and repositioning.

//! Popover interaction session.
//!
//! A host (browser glue, WASM binding, test) owns one [`PopoverSession`] per
//! enhancer and forwards the events its wrappers receive. All handling is
//! synchronous. Time is supplied by the host as a duration since page load,
//! and the only timers are the per-bubble hide-debounce handles, fired by
//! [`PopoverSession::tick`].

pub mod events;

use std::time::Duration;

use crate::position::{compute_placement, Placement, Rect, Size, Viewport};
use crate::result::PopoverReport;

pub use self::events::{Interaction, Key, ListenerSpec, Modifiers, Response, VIEWPORT_LISTENERS};

/// Delay before a bubble hides after the pointer or focus leaves, so moving
/// from the reference onto the bubble does not flicker.
pub const HIDE_DELAY: Duration = Duration::from_millis(60);

/// Layout measurements supplied by the host.
pub trait LayoutProbe {
    fn viewport(&self) -> Viewport;

    /// Rectangle of the wrapper owning `bubble_id`.
    fn wrapper_rect(&self, bubble_id: &str) -> Rect;

    /// Rectangle of the reference inside that wrapper.
    fn reference_rect(&self, bubble_id: &str) -> Rect;

    /// Natural size of the bubble. Only called while the bubble is rendered,
    /// that is `Shown` or `Measuring`.
    fn bubble_size(&self, bubble_id: &str, visibility: Visibility) -> Size;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Hidden,
    Shown,
    /// Rendered for measurement only: laid out but not visible or interactive.
    Measuring,
}

/// A scheduled hide. A handle is only honoured while it is the one stored on
/// its bubble; replacing or clearing it cancels the hide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    pub id: u64,
    pub due: Duration,
}

/// Runtime state of one bubble.
#[derive(Debug, Clone, PartialEq)]
pub struct Bubble {
    element_id: String,
    visibility: Visibility,
    hide_timer: Option<TimerHandle>,
    placement: Option<Placement>,
}

impl Bubble {
    pub fn new(element_id: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            visibility: Visibility::Hidden,
            hide_timer: None,
            placement: None,
        }
    }

    pub fn element_id(&self) -> &str {
        &self.element_id
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_visible(&self) -> bool {
        self.visibility == Visibility::Shown
    }

    pub fn pending_hide(&self) -> Option<TimerHandle> {
        self.hide_timer
    }

    pub fn placement(&self) -> Option<&Placement> {
        self.placement.as_ref()
    }

    /// Recomputes the placement from fresh measurements. Visibility is left
    /// as it was found.
    pub fn reposition(&mut self, probe: &impl LayoutProbe) {
        self.placement = None;

        let wrapper = probe.wrapper_rect(&self.element_id);
        let reference = probe.reference_rect(&self.element_id);

        let was_hidden = self.visibility == Visibility::Hidden;
        if was_hidden {
            self.visibility = Visibility::Measuring;
        }
        let size = probe.bubble_size(&self.element_id, self.visibility);
        if was_hidden {
            self.visibility = Visibility::Hidden;
        }

        self.placement = Some(compute_placement(probe.viewport(), wrapper, reference, size));
    }
}

/// Per-variant interaction settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Behavior {
    pub hide_delay: Duration,
    /// A plain click toggles the bubble instead of following the link.
    pub click_toggles: bool,
}

impl Behavior {
    pub fn citation() -> Self {
        Self {
            hide_delay: HIDE_DELAY,
            click_toggles: false,
        }
    }

    pub fn footnote() -> Self {
        Self {
            hide_delay: HIDE_DELAY,
            click_toggles: true,
        }
    }
}

/// The bubbles of one enhancer and their pending timers.
#[derive(Debug, Clone)]
pub struct PopoverSession {
    behavior: Behavior,
    bubbles: Vec<Bubble>,
    next_timer: u64,
}

impl PopoverSession {
    pub fn new<I, S>(behavior: Behavior, bubble_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            behavior,
            bubbles: bubble_ids.into_iter().map(Bubble::new).collect(),
            next_timer: 0,
        }
    }

    /// Builds a session for the bubbles an enhancer produced.
    pub fn for_report(report: &PopoverReport) -> Self {
        let behavior = Behavior {
            hide_delay: HIDE_DELAY,
            click_toggles: report.click_toggles,
        };
        Self::new(behavior, report.bubbles.iter().map(|b| b.bubble_id.clone()))
    }

    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    pub fn len(&self) -> usize {
        self.bubbles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bubbles.is_empty()
    }

    pub fn bubble(&self, index: usize) -> Option<&Bubble> {
        self.bubbles.get(index)
    }

    pub fn bubbles(&self) -> &[Bubble] {
        &self.bubbles
    }

    pub fn index_of(&self, element_id: &str) -> Option<usize> {
        self.bubbles.iter().position(|b| b.element_id == element_id)
    }

    /// Handles an event delivered to bubble `index`'s wrapper at time `now`.
    pub fn handle(
        &mut self,
        index: usize,
        event: Interaction,
        now: Duration,
        probe: &impl LayoutProbe,
    ) -> Response {
        if index >= self.bubbles.len() {
            tracing::debug!(index, "event for unknown bubble ignored");
            return Response::default_action();
        }

        match event {
            Interaction::PointerEnter | Interaction::Focus => {
                self.show(index, probe);
                Response::default_action()
            }
            Interaction::PointerLeave | Interaction::Blur => {
                self.schedule_hide(index, now);
                Response::default_action()
            }
            Interaction::KeyDown(Key::Escape) => {
                self.hide(index);
                Response::default_action()
            }
            Interaction::KeyDown(Key::Enter) | Interaction::KeyDown(Key::Space) => {
                self.toggle(index, probe);
                Response::prevent()
            }
            Interaction::KeyDown(Key::Other) => Response::default_action(),
            Interaction::Click(modifiers) => {
                if self.behavior.click_toggles && !modifiers.any() {
                    self.toggle(index, probe);
                    Response::prevent()
                } else {
                    Response::default_action()
                }
            }
        }
    }

    /// Fires every hide timer due at `now`. Returns the indices hidden.
    pub fn tick(&mut self, now: Duration) -> Vec<usize> {
        let mut hidden = Vec::new();
        for (index, bubble) in self.bubbles.iter_mut().enumerate() {
            if let Some(timer) = bubble.hide_timer {
                if timer.due <= now {
                    bubble.hide_timer = None;
                    bubble.visibility = Visibility::Hidden;
                    hidden.push(index);
                }
            }
        }
        hidden
    }

    /// Earliest pending hide, so the host knows when to call [`tick`](Self::tick).
    pub fn next_deadline(&self) -> Option<Duration> {
        self.bubbles
            .iter()
            .filter_map(|b| b.hide_timer.map(|t| t.due))
            .min()
    }

    /// Scroll handler: repositions visible bubbles.
    pub fn on_scroll(&mut self, probe: &impl LayoutProbe) -> usize {
        self.reposition_visible(probe)
    }

    /// Resize handler: repositions visible bubbles.
    pub fn on_resize(&mut self, probe: &impl LayoutProbe) -> usize {
        self.reposition_visible(probe)
    }

    fn reposition_visible(&mut self, probe: &impl LayoutProbe) -> usize {
        let mut count = 0;
        for bubble in self.bubbles.iter_mut().filter(|b| b.is_visible()) {
            bubble.reposition(probe);
            count += 1;
        }
        count
    }

    fn show(&mut self, index: usize, probe: &impl LayoutProbe) {
        let bubble = &mut self.bubbles[index];
        bubble.hide_timer = None;
        bubble.visibility = Visibility::Shown;
        bubble.reposition(probe);
    }

    fn hide(&mut self, index: usize) {
        let bubble = &mut self.bubbles[index];
        bubble.hide_timer = None;
        bubble.visibility = Visibility::Hidden;
    }

    fn toggle(&mut self, index: usize, probe: &impl LayoutProbe) {
        if self.bubbles[index].is_visible() {
            self.hide(index);
        } else {
            self.show(index, probe);
        }
    }

    fn schedule_hide(&mut self, index: usize, now: Duration) {
        self.next_timer += 1;
        let handle = TimerHandle {
            id: self.next_timer,
            due: now + self.behavior.hide_delay,
        };
        self.bubbles[index].hide_timer = Some(handle);
    }
}
