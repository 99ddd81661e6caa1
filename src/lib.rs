// src/lib.rs

//! Resolution and differencing engine for deployed application
//! distributions.
//!
//! A distribution is declared in a flat property spec naming a core runtime,
//! modules, apps, a frontend bundle, config artifacts and content packages.
//! This crate resolves such specs (parent inheritance, version keyword
//! pinning, transitive module closure), snapshots deployed state, and
//! computes the per-category upgrade plan between the two. Artifact
//! transport is abstracted behind the [`ArtifactStore`] trait; the engine
//! itself never talks to a repository.

mod error;

pub mod artifact;
pub mod content;
pub mod diff;
pub mod distribution;
pub mod resolver;
pub mod spec;
pub mod state;
pub mod store;
pub mod version;

pub use artifact::{parse_coordinates, Artifact, ArtifactType, Category};
pub use content::{
    missing_dependencies, validate_distribution, ContentInstaller, ContentPackage,
    ContentProperties, MissingDependency,
};
pub use diff::{
    ArtifactChanges, ChangeDirection, ChangeRecord, DiffOptions, PropertyChanges, UpgradePlan,
};
pub use distribution::{Distribution, DistributionResolver, EffectiveDistribution};
pub use error::{Error, Result};
pub use resolver::{ModuleResolver, ResolvedModules, UnresolvedModule};
pub use spec::{frontend_properties_from_json, SpecProperties};
pub use state::DeployedState;
pub use store::{ArtifactStore, StoreError, StoreResult};
pub use version::{Version, VersionRequirement};
