//! The lifecycle event catalogue.
//!
//! The catalogue is normally derived from the host's interface definition by
//! an external generator; this module carries the two artifacts the runtime
//! needs from it: the enumerated [`EventKind`] set (with per-kind signature
//! revisions) and the [`EventCap`] capability tokens handlers declare at
//! registration. The dispatch engine itself only requires that the set be
//! finite and enumerable, each kind with a fixed parameter list.

use tether_foundation::EntityId;

/// Enumerated kinds of lifecycle events.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The entity came online and its session was accepted.
    Join,
    /// The entity moved to a new position.
    Move,
    /// The entity sent a chat message.
    Chat,
    /// The entity interacted with another entity.
    Interact,
    /// The entity disconnected; the session is about to be torn down.
    Quit,
}

impl EventKind {
    /// Every event kind in the catalogue.
    pub const ALL: [EventKind; 5] = [
        EventKind::Join,
        EventKind::Move,
        EventKind::Chat,
        EventKind::Interact,
        EventKind::Quit,
    ];

    /// Current signature revision of this event.
    ///
    /// Bumped whenever an event's parameter shape changes, so capability
    /// tokens minted against an older catalogue are rejected at handler
    /// registration instead of silently dropping events.
    #[must_use]
    pub const fn signature_revision(self) -> u16 {
        match self {
            EventKind::Join | EventKind::Chat | EventKind::Interact | EventKind::Quit => 1,
            // Positions became 3-D in revision 2.
            EventKind::Move => 2,
        }
    }

    /// Display name of this event kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            EventKind::Join => "Join",
            EventKind::Move => "Move",
            EventKind::Chat => "Chat",
            EventKind::Interact => "Interact",
            EventKind::Quit => "Quit",
        }
    }
}

/// A lifecycle event with its fixed per-kind parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event<'a> {
    /// The entity came online.
    Join,
    /// The entity moved.
    Move {
        /// New position, in world coordinates.
        position: [f64; 3],
    },
    /// The entity sent a chat message.
    Chat {
        /// The message text.
        message: &'a str,
    },
    /// The entity interacted with another entity.
    Interact {
        /// The entity being interacted with.
        target: EntityId,
    },
    /// The entity disconnected.
    Quit,
}

impl Event<'_> {
    /// Returns the kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Event::Join => EventKind::Join,
            Event::Move { .. } => EventKind::Move,
            Event::Chat { .. } => EventKind::Chat,
            Event::Interact { .. } => EventKind::Interact,
            Event::Quit => EventKind::Quit,
        }
    }
}

/// Capability token declaring that a handler type handles one event kind.
///
/// The token pins the event's signature revision at the time the handler's
/// glue was produced. Registration verifies the revision against the current
/// catalogue; a mismatch is a construction-time fatal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EventCap {
    kind: EventKind,
    revision: u16,
}

impl EventCap {
    /// Creates a capability token for `kind` at an explicit revision.
    #[must_use]
    pub const fn new(kind: EventKind, revision: u16) -> Self {
        Self { kind, revision }
    }

    /// Creates a capability token at the current catalogue revision.
    #[must_use]
    pub const fn current(kind: EventKind) -> Self {
        Self::new(kind, kind.signature_revision())
    }

    /// The event kind this capability covers.
    #[must_use]
    pub const fn kind(self) -> EventKind {
        self.kind
    }

    /// The signature revision this capability was minted against.
    #[must_use]
    pub const fn revision(self) -> u16 {
        self.revision
    }

    /// Whether the token matches the current catalogue.
    pub(crate) const fn is_current(self) -> bool {
        self.revision == self.kind.signature_revision()
    }
}

/// Capability tokens at the current catalogue revision, one per event kind.
pub mod caps {
    use super::{EventCap, EventKind};

    /// Capability for [`EventKind::Join`].
    pub const JOIN: EventCap = EventCap::current(EventKind::Join);
    /// Capability for [`EventKind::Move`].
    pub const MOVE: EventCap = EventCap::current(EventKind::Move);
    /// Capability for [`EventKind::Chat`].
    pub const CHAT: EventCap = EventCap::current(EventKind::Chat);
    /// Capability for [`EventKind::Interact`].
    pub const INTERACT: EventCap = EventCap::current(EventKind::Interact);
    /// Capability for [`EventKind::Quit`].
    pub const QUIT: EventCap = EventCap::current(EventKind::Quit);
}
