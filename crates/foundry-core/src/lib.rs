//! Foundry Agent Core Library
//!
//! Lifecycle management for a self-hosted Foundry VTT unit: install from an
//! uploaded archive, configure and relocate the data directory, run the
//! service under systemd and advertise it to a reverse proxy.

pub mod config;
pub mod context;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod migration;
pub mod state;
pub mod status;
pub mod types;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{AgentConfig, ConfigStore, InstallLayout};

    // Context
    pub use crate::context::AgentContext;

    // Errors
    pub use crate::error::{AgentError, AgentResult, ArtifactError, ErrorKind, PathError};

    // Host collaborators
    pub use crate::host::{
        ArchiveExtractor, ArtifactSource, Host, HostIdentity, PackageManager, ProxyAdvertisement,
        ProxyRelation, ServiceManager, UnitRenderer,
    };

    // Lifecycle
    pub use crate::lifecycle::{DispatchReport, LifecycleController, SignalOutcome};
    pub use crate::migration::{DataMigrator, MigrationPlan, MigrationReport, migration_target};

    // State
    pub use crate::state::{JsonStateStore, MemoryStateStore, StateStore, UnitState};
    pub use crate::status::StatusReport;

    pub use crate::types::{Signal, StatusRecord, UnitStatus};
}
