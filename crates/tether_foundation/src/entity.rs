//! Entity identity and the opaque host subject.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable identifier for an entity.
///
/// An `EntityId` identifies an entity across online and offline states:
/// persistence providers key stored component data by it, so it must not
/// change when the entity disconnects and reconnects. Immutable once
/// assigned.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntityId(Uuid);

impl EntityId {
    /// Creates a fresh random entity ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an entity ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The external subject a session represents (a connected user, an NPC,
/// a fake test entity).
///
/// The runtime treats the entity as opaque: it only needs a stable
/// [`EntityId`]. Hosts recover their concrete type through [`Entity::as_any`].
pub trait Entity: Send + Sync + 'static {
    /// Returns the stable identifier for this entity.
    fn id(&self) -> EntityId;

    /// Upcast for host-side downcasting to the concrete entity type.
    fn as_any(&self) -> &dyn Any;
}

/// Shared reference to an opaque entity.
pub type EntityRef = Arc<dyn Entity>;
