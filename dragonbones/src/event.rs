use crate::{ActionData, AnimationStateHandle, UserData};
use std::collections::VecDeque;
use std::fmt;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventKind {
    Start,
    LoopComplete,
    Complete,
    FadeIn,
    FadeInComplete,
    FadeOut,
    FadeOutComplete,
    Frame,
    Sound,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        EventKind::Start,
        EventKind::LoopComplete,
        EventKind::Complete,
        EventKind::FadeIn,
        EventKind::FadeInComplete,
        EventKind::FadeOut,
        EventKind::FadeOutComplete,
        EventKind::Frame,
        EventKind::Sound,
    ];

    /// Event type string as exchanged with host engines.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::LoopComplete => "loopComplete",
            EventKind::Complete => "complete",
            EventKind::FadeIn => "fadeIn",
            EventKind::FadeInComplete => "fadeInComplete",
            EventKind::FadeOut => "fadeOut",
            EventKind::FadeOutComplete => "fadeOutComplete",
            EventKind::Frame => "frameEvent",
            EventKind::Sound => "soundEvent",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle notification of one animation state.
#[derive(Clone, Debug, PartialEq)]
pub struct StateEvent {
    pub kind: EventKind,
    pub armature: String,
    pub state: AnimationStateHandle,
    pub state_name: String,
    pub animation: String,
}

/// A keyed frame or sound event.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameEvent {
    /// [`EventKind::Frame`] or [`EventKind::Sound`].
    pub kind: EventKind,
    pub armature: String,
    pub state: AnimationStateHandle,
    pub animation: String,
    pub name: String,
    pub bone: Option<String>,
    pub slot: Option<String>,
    pub data: Option<UserData>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ArmatureEvent {
    State(StateEvent),
    Frame(FrameEvent),
}

impl ArmatureEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ArmatureEvent::State(e) => e.kind,
            ArmatureEvent::Frame(e) => e.kind,
        }
    }

    pub fn armature(&self) -> &str {
        match self {
            ArmatureEvent::State(e) => &e.armature,
            ArmatureEvent::Frame(e) => &e.armature,
        }
    }

    pub fn animation(&self) -> &str {
        match self {
            ArmatureEvent::State(e) => &e.animation,
            ArmatureEvent::Frame(e) => &e.animation,
        }
    }

    pub fn state(&self) -> AnimationStateHandle {
        match self {
            ArmatureEvent::State(e) => e.state,
            ArmatureEvent::Frame(e) => e.state,
        }
    }
}

pub trait EventListener {
    fn on_event(&mut self, event: &ArmatureEvent);
}

impl<F: FnMut(&ArmatureEvent)> EventListener for F {
    fn on_event(&mut self, event: &ArmatureEvent) {
        self(event)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ListenerId(u64);

/// A play action raised by an action frame, run after the events of the same update.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct PendingAction {
    pub(crate) action: ActionData,
}

/// Everything one update produced, in emission order.
#[derive(Debug, Default)]
pub(crate) struct EventQueue {
    pub(crate) events: VecDeque<ArmatureEvent>,
    pub(crate) actions: Vec<PendingAction>,
}

impl EventQueue {
    pub(crate) fn push(&mut self, event: ArmatureEvent) {
        self.events.push_back(event);
    }

    pub(crate) fn clear(&mut self) {
        self.events.clear();
        self.actions.clear();
    }
}

struct RegisteredListener {
    id: ListenerId,
    kind: Option<EventKind>,
    listener: Box<dyn EventListener>,
}

#[derive(Default)]
pub(crate) struct EventDispatcher {
    listeners: Vec<RegisteredListener>,
    next_id: u64,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl EventDispatcher {
    /// `kind: None` listens to every kind.
    pub(crate) fn add(
        &mut self,
        kind: Option<EventKind>,
        listener: Box<dyn EventListener>,
    ) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.push(RegisteredListener { id, kind, listener });
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    pub(crate) fn has_listener(&self, kind: EventKind) -> bool {
        self.listeners
            .iter()
            .any(|l| l.kind.is_none_or(|k| k == kind))
    }

    pub(crate) fn clear(&mut self) {
        self.listeners.clear();
    }

    pub(crate) fn dispatch(&mut self, events: &mut VecDeque<ArmatureEvent>) {
        while let Some(event) = events.pop_front() {
            let kind = event.kind();
            for registered in &mut self.listeners {
                if registered.kind.is_none_or(|k| k == kind) {
                    registered.listener.on_event(&event);
                }
            }
        }
    }
}
