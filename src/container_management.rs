//! Container management subsystem.
//!
//! This module exposes the [`ContainerService`], which resolves container references
//! and runs state-gated lifecycle operations (pause, unpause, stop, restart) against a
//! [`ContainerRuntime`](crate::runtime::ContainerRuntime).
//!
//! Example (non-running):
//! ```ignore
//! use std::sync::Arc;
//! use harbor::container_management::ContainerService;
//! use harbor::runtime::{CliRuntime, LifecycleOptions};
//!
//! let service = ContainerService::new(Arc::new(CliRuntime::new(&Default::default())));
//! service.pause("web", &LifecycleOptions::default()).await?;
//! ```

pub mod container_service;
pub mod lifecycle;
pub mod locator;

pub use container_service::ContainerService;
pub use lifecycle::LifecycleOperation;
