//! Publish orchestrators.
//!
//! An orchestrator chains processes (export, proxy, import) against the
//! host scene and reduces their outcomes to a single status: the worst
//! sub-process wins. Configuration mistakes (an unknown process name, a
//! table entry of the wrong kind) come back as `Err`; everything that can
//! go wrong in the scene is recorded in the orchestrator's report.

mod blender;
mod look;
mod model;
mod proxy;
mod work_scene;

pub use blender::ModelPublish;
pub use look::LookPublish;
pub use model::{ModelActivate, ModelPassive};
pub use proxy::CreateProxy;
pub use work_scene::ExportWorkScene;

use std::collections::BTreeMap;
use std::path::PathBuf;

use ptx_factory::{ProcessStatus, StatusReport};
use thiserror::Error;

use crate::asset::{AssetDetail, AssetInfo};
use crate::process::{Process, ProcessError, ProcessRegistry};
use crate::scene::{FrameRange, HostScene, NativeFileType, NodeId, NodeType};

pub(crate) const LOG_TARGET: &str = "ptx::publish";

/// Model activate
pub const MODEL_ACTIVATE: &str = "MDLA";
/// Model passive (Maya) or model publish (Blender)
pub const MODEL_PASSIVE: &str = "MDLP";
/// Proxy from an existing artifact
pub const CREATE_PROXY: &str = "PRXC";
/// Work scene export
pub const WORK_SCENE: &str = "WRKS";
/// Look publish
pub const LOOK_PUBLISH: &str = "LUKP";

#[derive(Error, Debug)]
pub enum PublishError {
    #[error(transparent)]
    Process(#[from] ProcessError),
}

pub type PublishResult<T> = Result<T, PublishError>;

/// Outcome and by-products of a publish.
#[derive(Debug, Clone)]
pub struct PublishState {
    pub report: StatusReport,
    /// Main artifact written by the publish
    pub out_file: Option<PathBuf>,
    /// Extra records for a database or a sidecar file
    pub publish_info: BTreeMap<String, serde_json::Value>,
}

impl PublishState {
    pub fn new() -> Self {
        Self {
            report: StatusReport::new(LOG_TARGET),
            out_file: None,
            publish_info: BTreeMap::new(),
        }
    }

    /// Clear the results of a previous run.
    pub fn begin(&mut self) {
        self.report.begin();
        self.out_file = None;
        self.publish_info.clear();
    }

    pub fn record(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.publish_info.insert(key.to_string(), value.into());
    }

    /// Copy a sub-process's diagnostics and keep its status.
    pub fn absorb(&mut self, process: &dyn Process, statuses: &mut Vec<ProcessStatus>) -> ProcessStatus {
        let status = process.status();
        self.report.absorb(process.report());
        statuses.push(status);
        status
    }

    /// Final status: the worst of the sub-process statuses and of the
    /// orchestrator's own diagnostics.
    pub fn conclude(&mut self, statuses: &[ProcessStatus]) -> ProcessStatus {
        let own = self.report.finish();
        let status = ProcessStatus::aggregate(statuses.iter().copied().chain(std::iter::once(own)));
        log::info!(target: LOG_TARGET, "Publish {}", status);
        self.report.set(status)
    }
}

impl Default for PublishState {
    fn default() -> Self {
        Self::new()
    }
}

/// What a publish runs against.
pub struct Session<'a> {
    pub scene: &'a mut dyn HostScene,
    pub processes: &'a ProcessRegistry,
    /// Upper-cased artist identity
    pub user: String,
}

impl<'a> Session<'a> {
    pub fn new(scene: &'a mut dyn HostScene, processes: &'a ProcessRegistry, user: impl Into<String>) -> Self {
        Self {
            scene,
            processes,
            user: user.into().to_uppercase(),
        }
    }
}

/// Knobs shared by the publish types.
#[derive(Clone, Debug, PartialEq)]
pub struct PublishOptions {
    /// Artifact path; derived from the scene when empty
    pub export_path: String,
    /// Process table entry (`abc`, `usd`, `mae`)
    pub use_process: String,
    pub frame_range: FrameRange,
    /// Also export an alembic when the chosen process is another format
    pub fallback_alembic: bool,
    /// Nodes a proxy replaces
    pub orig_nodes: Vec<NodeId>,
    /// Explicit selection for work scene exports
    pub nodes_to_select: Option<Vec<NodeId>>,
    pub native_file_type: NativeFileType,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            export_path: String::new(),
            use_process: "abc".to_string(),
            frame_range: FrameRange::default(),
            fallback_alembic: false,
            orig_nodes: Vec::new(),
            nodes_to_select: None,
            native_file_type: NativeFileType::default(),
        }
    }
}

/// Construction arguments of every orchestrator.
#[derive(Clone, Debug, PartialEq)]
pub struct PublishArgs {
    pub asset: AssetInfo,
    pub options: PublishOptions,
}

impl PublishArgs {
    pub fn new(asset: AssetInfo) -> Self {
        Self {
            asset,
            options: PublishOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PublishOptions) -> Self {
        self.options = options;
        self
    }
}

pub trait Publish {
    fn asset(&self) -> &AssetInfo;

    fn asset_mut(&mut self) -> &mut AssetInfo;

    fn state(&self) -> &PublishState;

    fn publish(&mut self, session: &mut Session<'_>) -> PublishResult<ProcessStatus>;

    fn status(&self) -> ProcessStatus {
        self.state().report.status()
    }
}

/// Turns a proxy back into editable geometry and takes the asset lock.
pub trait Activate: Publish {
    fn make_active(&mut self, session: &mut Session<'_>) -> PublishResult<ProcessStatus>;

    /// Lock marker written by the last activation.
    fn lock_info(&self) -> &str;

    /// Someone other than `user` holds the asset.
    fn is_asset_locked(&self, user: &str) -> bool {
        self.asset().is_locked_by_other(user)
    }

    /// Take the lock for `user`.
    fn generate_lock_info(&mut self, user: &str) -> String;
}

/// Caches the geometry and replaces it with a proxy.
pub trait Passive: Publish {
    fn make_passive(&mut self, session: &mut Session<'_>) -> PublishResult<ProcessStatus>;
}

/// Root of a model: the first original node, then the recorded root
/// name, then the first asset assembly.
pub(crate) fn find_model_root(scene: &dyn HostScene, asset: &AssetInfo, options: &PublishOptions) -> Option<NodeId> {
    if let Some(node) = options.orig_nodes.first() {
        return Some(*node);
    }
    if let Some(name) = asset.root_node() {
        if let Some(node) = scene.find_node(name) {
            return Some(node);
        }
    }
    scene.asset_assemblies().into_iter().next()
}

/// Record the root and its meshes into the model detail.
pub(crate) fn record_geometry(scene: &dyn HostScene, root: NodeId, asset: &mut AssetInfo) -> usize {
    let geom_list = scene
        .descendants_of_type(root, NodeType::Mesh)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|mesh| scene.full_path(mesh).ok())
        .collect::<Vec<_>>();
    let count = geom_list.len();
    let root_node = scene.node_name(root).unwrap_or_default();

    asset.detail = AssetDetail::Model { root_node, geom_list };
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MemoryScene;

    #[test]
    fn test_conclude_takes_minimum() {
        let mut state = PublishState::new();
        state.begin();
        assert_eq!(
            state.conclude(&[ProcessStatus::Succeeded, ProcessStatus::Warning]),
            ProcessStatus::Warning
        );

        state.begin();
        assert_eq!(
            state.conclude(&[ProcessStatus::Failed, ProcessStatus::Succeeded]),
            ProcessStatus::Failed
        );

        state.begin();
        state.report.warn("own warning");
        assert_eq!(state.conclude(&[ProcessStatus::Succeeded]), ProcessStatus::Warning);
    }

    #[test]
    fn test_model_root_resolution() {
        let mut scene = MemoryScene::new();
        let first = scene.create_node(NodeType::Transform, "Prop", None).unwrap();
        let alien = scene.create_node(NodeType::Transform, "Alien", None).unwrap();
        let asset = AssetInfo::new("Alien", "Character", "MDL", "v001");
        let options = PublishOptions::default();

        assert_eq!(find_model_root(&scene, &asset, &options), Some(first));

        let mut asset = asset;
        record_geometry(&scene, alien, &mut asset);
        assert_eq!(find_model_root(&scene, &asset, &options), Some(alien));

        let options = PublishOptions {
            orig_nodes: vec![first],
            ..PublishOptions::default()
        };
        assert_eq!(find_model_root(&scene, &asset, &options), Some(first));
    }

    #[test]
    fn test_session_upper_cases_user() {
        let mut scene = MemoryScene::new();
        let processes = ProcessRegistry::builtin().unwrap();
        let session = Session::new(&mut scene, &processes, "jdoe");
        assert_eq!(session.user, "JDOE");
    }
}
