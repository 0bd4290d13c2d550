//! Publish orchestration for DCC applications.
//!
//! Processes (exporters, proxies, importers) are chained by publish
//! orchestrators against a host scene. Both levels are picked from
//! registries: the process table maps `(category, name)` to a compiled-in
//! process, and the publish factory maps `(application, publish type)` to
//! an orchestrator builder.

pub mod apps;
pub mod asset;
pub mod config;
pub mod factory;
pub mod process;
pub mod publish;
pub mod scene;

pub use asset::{AssetDetail, AssetInfo, ShaderInfo};
pub use config::{current_user, PipelineConfig};
pub use factory::{FactoryError, FactoryResult, PublishBuilder, PublishFactory, SharedPublish};
pub use process::{
    Capability, Exporter, Process, ProcessError, ProcessHandle, ProcessKind, ProcessParams, ProcessRegistry,
    ProcessResult, ProxyCreator, ProxyImporter,
};
pub use publish::{
    Activate, Passive, Publish, PublishArgs, PublishError, PublishOptions, PublishResult, PublishState, Session,
};
pub use scene::{FrameRange, HostScene, MemoryScene, NodeId, NodeType, SceneError, SceneResult};
