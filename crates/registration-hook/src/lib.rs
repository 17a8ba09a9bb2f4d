//! Synchronous Consul registration for Kubernetes workloads.
//!
//! The hook runs inside a pod lifecycle hook (`postStart` / `preStop`). It
//! reads its own pod from the Kubernetes API, works out which ports should be
//! published as Consul services, and registers or deregisters them through
//! the local Consul agent.
//!
//! ## Flow
//!
//! ```text
//! WorkloadResolver ──► PortStrategy ──► TagComposer
//!   (poll for IP)      (ports/defs)     (tags per record)
//!                                             │
//!                  ┌──────────────────────────┤
//!                  ▼                          ▼
//!           LivenessPoller            orphaned_secured
//!           (local health gate)       (retire stale -secured)
//!                  │                          │
//!                  └──────────► RegistrySink ◄┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use registration_hook::{ConsulAgent, HookConfig, KubeSource, RegistrationHook};
//! use tokio_util::sync::CancellationToken;
//!
//! let source = Arc::new(KubeSource::try_default().await?);
//! let agent = Arc::new(ConsulAgent::new("http://127.0.0.1:8500", None)?);
//! let hook = RegistrationHook::new(source, agent, HookConfig::new("default", "app-7d9f"));
//!
//! hook.register(&CancellationToken::new()).await?;
//! ```

pub mod config;
pub mod error;
pub mod flags;
pub mod hook;
pub mod liveness;
pub mod mapping;
pub mod poll;
pub mod ports;
pub mod probe;
pub mod provider;
pub mod registry;
pub mod resolver;
pub mod secured;
pub mod service;
pub mod source;
pub mod tags;
pub mod workload;

pub use config::HookConfig;
pub use error::{HookError, RegistryError, SourceError};
pub use flags::FlagService;
pub use hook::{RegisterOutcome, RegistrationHook};
pub use ports::{PortDefinition, PortDefinitions};
pub use provider::{Resolution, ServiceProvider};
pub use registry::{ConsulAgent, RegistrySink};
pub use service::{CheckDescriptor, CheckKind, ServiceRecord};
pub use source::{KubeSource, WorkloadSource};
pub use workload::{Container, ContainerPort, Probe, ProbeHandler, WorkloadDescriptor};
