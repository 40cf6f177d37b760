//! dbtc-core - Core library for dbtc
//!
//! This crate turns a YAML description of dbt Cloud resources into a typed,
//! validated configuration, expands it into a dependency graph, diffs that
//! graph against persisted state, and executes the resulting plan against a
//! remote while recording progress after every operation.

pub mod apply;
pub mod config;
pub mod error;
pub mod graph;
pub mod import;
mod newtype_string;
pub mod outputs;
pub mod plan;
pub mod remote;
pub mod resource;
pub mod state;
pub mod validate;

pub use apply::{ApplyJournal, ApplyResult, Executor, RunStatus};
pub use config::{load_raw, parse_raw, ValidatedConfig, VarOverrides};
pub use error::{CoreError, CoreResult};
pub use graph::{ResourceDag, ResourceGraph};
pub use import::{import_snapshot, AccountSnapshot, ImportOptions, ImportResult, SecretHandling};
pub use outputs::{outputs, Outputs};
pub use plan::{plan, plan_destroy, Action, Operation, Plan, PlanSummary};
pub use remote::{RemoteClient, RemoteError, RemoteRequest, RemoteResult, SimulatedRemote};
pub use resource::{redact, Attributes, RemoteId, Resource, ResourceKey, ResourceKind};
pub use state::{ResourceState, StateFile};
pub use validate::{validate, validate_config, ValidationError};
