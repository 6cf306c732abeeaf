//! Error types for the Tether runtime.
//!
//! Uses `thiserror` for ergonomic error definition. Errors carry a
//! [`Severity`] so callers can distinguish construction/usage bugs
//! (abort-worthy) from recoverable session conflicts and provider failures.

use thiserror::Error;

use crate::entity::EntityId;

/// Convenience alias for results in this workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error type returned by component providers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for Tether operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind }
    }

    /// Creates a duplicate handler registration error.
    #[must_use]
    pub fn duplicate_handler(handler: &'static str) -> Self {
        Self::new(ErrorKind::DuplicateHandler { handler })
    }

    /// Creates a duplicate provider registration error.
    #[must_use]
    pub fn duplicate_provider(component: &'static str) -> Self {
        Self::new(ErrorKind::DuplicateProvider { component })
    }

    /// Creates a stale handler capability error.
    #[must_use]
    pub fn stale_handler_signature(handler: &'static str, event: &'static str) -> Self {
        Self::new(ErrorKind::StaleHandlerSignature { handler, event })
    }

    /// Creates an error for accepting an entity that already has a session.
    #[must_use]
    pub fn session_exists(entity: EntityId) -> Self {
        Self::new(ErrorKind::SessionExists(entity))
    }

    /// Creates an error for inserting an already-present component type.
    #[must_use]
    pub fn already_present(component: &'static str) -> Self {
        Self::new(ErrorKind::AlreadyPresent { component })
    }

    /// Creates an error for removing or saving an absent component type.
    #[must_use]
    pub fn not_present(component: &'static str) -> Self {
        Self::new(ErrorKind::NotPresent { component })
    }

    /// Creates an error for saving a component type with no provider.
    #[must_use]
    pub fn no_provider(component: &'static str) -> Self {
        Self::new(ErrorKind::NoProvider { component })
    }

    /// Creates an error for mutating a detached (quit) session.
    #[must_use]
    pub fn already_detached() -> Self {
        Self::new(ErrorKind::AlreadyDetached)
    }

    /// Creates a provider load failure error.
    #[must_use]
    pub fn load_failed(component: &'static str, source: BoxError) -> Self {
        Self::new(ErrorKind::Persistence {
            component,
            op: PersistenceOp::Load,
            source,
        })
    }

    /// Creates a provider save failure error.
    #[must_use]
    pub fn save_failed(component: &'static str, source: BoxError) -> Self {
        Self::new(ErrorKind::Persistence {
            component,
            op: PersistenceOp::Save,
            source,
        })
    }

    /// Returns the severity class of this error.
    #[must_use]
    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    /// Returns true for construction/usage bugs that callers should treat
    /// as abort-worthy.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// A handler type was registered more than once.
    #[error("handler type registered twice: {handler}")]
    DuplicateHandler {
        /// Name of the handler type.
        handler: &'static str,
    },

    /// Two providers were registered for the same component type.
    #[error("multiple providers registered for component {component}")]
    DuplicateProvider {
        /// Name of the component type.
        component: &'static str,
    },

    /// A handler declares capability for an event at an outdated signature
    /// revision. Registering it would silently drop events, so registration
    /// fails instead.
    #[error("handler {handler} declares a stale capability for event {event}")]
    StaleHandlerSignature {
        /// Name of the handler type.
        handler: &'static str,
        /// Name of the event whose signature evolved.
        event: &'static str,
    },

    /// The entity already has a live session.
    #[error("entity {0} already has a session")]
    SessionExists(EntityId),

    /// A component of this type is already present in the session.
    #[error("session already holds a component of type {component}")]
    AlreadyPresent {
        /// Name of the component type.
        component: &'static str,
    },

    /// No component of this type is present in the session.
    #[error("session holds no component of type {component}")]
    NotPresent {
        /// Name of the component type.
        component: &'static str,
    },

    /// The component type has no registered provider.
    #[error("no provider registered for component {component}")]
    NoProvider {
        /// Name of the component type.
        component: &'static str,
    },

    /// The session was already torn down by `quit`.
    #[error("session is detached; entity has already quit")]
    AlreadyDetached,

    /// A provider load or save call failed.
    #[error("{op} failed for component {component}: {source}")]
    Persistence {
        /// Name of the component type.
        component: &'static str,
        /// Whether the failure was a load or a save.
        op: PersistenceOp,
        /// The provider's underlying error.
        #[source]
        source: BoxError,
    },
}

impl ErrorKind {
    /// Returns the severity class of this error kind.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::DuplicateHandler { .. }
            | Self::DuplicateProvider { .. }
            | Self::StaleHandlerSignature { .. }
            | Self::AlreadyDetached => Severity::Fatal,
            Self::SessionExists(_)
            | Self::AlreadyPresent { .. }
            | Self::NotPresent { .. }
            | Self::NoProvider { .. } => Severity::Conflict,
            Self::Persistence { .. } => Severity::Persistence,
        }
    }
}

/// Which provider operation failed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PersistenceOp {
    /// Loading persisted state into a component.
    Load,
    /// Writing a component back to storage.
    Save,
}

impl std::fmt::Display for PersistenceOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Load => write!(f, "load"),
            Self::Save => write!(f, "save"),
        }
    }
}

/// Severity class of an error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Construction or usage bug; the process should not proceed.
    Fatal,
    /// Recoverable conflict returned to the caller.
    Conflict,
    /// Provider load/save failure; recoverable, sometimes aggregated.
    Persistence,
}
