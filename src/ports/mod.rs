//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the use-case layer requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `Repository`: Event journal and registry snapshots
//! - `IdentityProvider`: Caller identity and authentication

pub mod identity;
pub mod repository;
