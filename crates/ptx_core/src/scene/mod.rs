//! Host scene abstraction.
//!
//! Processes never talk to a DCC directly: they drive a `HostScene`, which
//! wraps node queries, attribute edits and the interchange export/import
//! commands of the host application. `MemoryScene` is an in-process
//! implementation used by the CLI and the tests.

mod memory;

pub use memory::{MemoryScene, NodeSnapshot, SceneSnapshot};

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Assemblies every scene starts with; never treated as asset roots.
pub const DEFAULT_CAMERAS: [&str; 4] = ["persp", "top", "front", "side"];

pub fn is_default_camera(name: &str) -> bool {
    DEFAULT_CAMERAS.contains(&name)
}

/// Errors reported by the host scene.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("node {0} does not exist")]
    NodeNotFound(NodeId),

    #[error("no node named '{0}'")]
    NoSuchNode(String),

    #[error("node '{node}' has no attribute '{attribute}'")]
    MissingAttribute { node: String, attribute: String },

    #[error("the scene has never been saved")]
    Unsaved,

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed scene file {path}: {error}")]
    Snapshot {
        path: PathBuf,
        #[source]
        error: serde_json::Error,
    },
}

pub type SceneResult<T> = Result<T, SceneError>;

/// Handle to a node in a host scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node types the pipeline cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    #[serde(rename = "transform")]
    Transform,
    #[serde(rename = "mesh")]
    Mesh,
    #[serde(rename = "camera")]
    Camera,
    #[serde(rename = "gpuCache")]
    GpuCache,
    #[serde(rename = "mayaUsdProxyShape")]
    UsdProxyShape,
}

impl NodeType {
    /// Host type name.
    pub fn type_name(self) -> &'static str {
        match self {
            NodeType::Transform => "transform",
            NodeType::Mesh => "mesh",
            NodeType::Camera => "camera",
            NodeType::GpuCache => "gpuCache",
            NodeType::UsdProxyShape => "mayaUsdProxyShape",
        }
    }

    /// Shapes live under a transform.
    pub fn is_shape(self) -> bool {
        !matches!(self, NodeType::Transform)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Inclusive frame range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    pub start: i32,
    pub end: i32,
}

impl FrameRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }
}

impl Default for FrameRange {
    fn default() -> Self {
        Self { start: 1, end: 1 }
    }
}

/// Alembic cache export of one root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlembicJob {
    /// Root node, by full path
    pub root: String,
    pub file: PathBuf,
    pub frame_range: FrameRange,
}

impl AlembicJob {
    /// The `AbcExport -j` job string.
    pub fn job_string(&self) -> String {
        format!(
            "-frameRange {} {} -attr project -attr scope -attr taskType -attr artist -noNormals \
             -uvWrite -writeColorSets -writeFaceSets -wholeFrameGeo -worldSpace \
             -root {} -writeVisibility -stripNamespaces -eulerFilter -autoSubd -writeUVSets \
             -dataFormat ogawa -file '{}'",
            self.frame_range.start,
            self.frame_range.end,
            self.root,
            self.file.display()
        )
    }
}

/// USD export of the selection (or of every asset assembly).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UsdExportJob {
    pub file: PathBuf,
    pub append: bool,
    pub convert_materials_to: String,
    pub default_mesh_scheme: String,
    pub default_usd_format: String,
    pub frame_range: FrameRange,
    /// Export the selection only; with nothing selected the asset
    /// assemblies are selected first
    pub selection: bool,
}

impl UsdExportJob {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            append: false,
            convert_materials_to: "UsdPreviewSurface".to_string(),
            default_mesh_scheme: "catmullClark".to_string(),
            default_usd_format: "usda".to_string(),
            frame_range: FrameRange::default(),
            selection: false,
        }
    }
}

/// Native scene file flavour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NativeFileType {
    #[default]
    #[serde(rename = "mayaAscii")]
    MayaAscii,
    #[serde(rename = "mayaBinary")]
    MayaBinary,
}

impl NativeFileType {
    pub fn extension(self) -> &'static str {
        match self {
            NativeFileType::MayaAscii => "ma",
            NativeFileType::MayaBinary => "mb",
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            NativeFileType::MayaAscii => "mayaAscii",
            NativeFileType::MayaBinary => "mayaBinary",
        }
    }

    /// Accepts the type name or the extension.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "mayaAscii" | "ma" => Some(NativeFileType::MayaAscii),
            "mayaBinary" | "mb" => Some(NativeFileType::MayaBinary),
            _ => None,
        }
    }
}

/// Native scene export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NativeExportJob {
    pub file: PathBuf,
    pub file_type: NativeFileType,
    pub force: bool,
    pub preserve_references: bool,
    pub selection_only: bool,
}

/// The scene-graph API of a host application.
pub trait HostScene {
    /// Path of the open scene file, if it was ever saved.
    fn scene_path(&self) -> Option<PathBuf>;

    /// Top-level nodes, in scene order.
    fn assemblies(&self) -> Vec<NodeId>;

    fn selection(&self) -> Vec<NodeId>;

    fn set_selection(&mut self, nodes: &[NodeId]) -> SceneResult<()>;

    fn node_name(&self, node: NodeId) -> SceneResult<String>;

    fn node_type(&self, node: NodeId) -> SceneResult<NodeType>;

    /// `|root|group|node`
    fn full_path(&self, node: NodeId) -> SceneResult<String>;

    fn parent(&self, node: NodeId) -> SceneResult<Option<NodeId>>;

    fn children(&self, node: NodeId) -> SceneResult<Vec<NodeId>>;

    /// All descendants of `node` with the given type, depth first.
    fn descendants_of_type(&self, node: NodeId, node_type: NodeType) -> SceneResult<Vec<NodeId>>;

    /// Find a node by full path (leading `|`) or by name.
    fn find_node(&self, name_or_path: &str) -> Option<NodeId>;

    fn get_attr(&self, node: NodeId, attribute: &str) -> SceneResult<String>;

    fn set_attr(&mut self, node: NodeId, attribute: &str, value: &str) -> SceneResult<()>;

    /// Create a node. A shape created without a parent gets a new
    /// transform parent, as the host does.
    fn create_node(&mut self, node_type: NodeType, name: &str, parent: Option<NodeId>) -> SceneResult<NodeId>;

    fn rename(&mut self, node: NodeId, name: &str) -> SceneResult<()>;

    /// Delete a node and its subtree.
    fn delete(&mut self, node: NodeId) -> SceneResult<()>;

    fn export_alembic(&mut self, job: &AlembicJob) -> SceneResult<()>;

    fn export_usd(&mut self, job: &UsdExportJob) -> SceneResult<()>;

    fn export_native(&mut self, job: &NativeExportJob) -> SceneResult<()>;

    /// Import an alembic as native geometry. Returns the new top-level nodes.
    fn import_alembic(&mut self, path: &Path) -> SceneResult<Vec<NodeId>>;

    fn import_usd(&mut self, path: &Path) -> SceneResult<Vec<NodeId>>;

    fn import_native(&mut self, path: &Path) -> SceneResult<Vec<NodeId>>;

    /// Assemblies that are not default cameras.
    fn asset_assemblies(&self) -> Vec<NodeId> {
        self.assemblies()
            .into_iter()
            .filter(|node| {
                self.node_name(*node)
                    .map(|name| !is_default_camera(&name))
                    .unwrap_or(false)
            })
            .collect()
    }
}

/// `<scene dir>/<scene stem>.<extension>` for the open scene.
pub fn derive_scene_path(scene: &dyn HostScene, extension: &str) -> Option<PathBuf> {
    let scene_path = scene.scene_path()?;
    let stem = scene_path.file_stem()?.to_string_lossy().into_owned();
    let dir = scene_path.parent().unwrap_or_else(|| Path::new(""));
    Some(dir.join(format!("{}.{}", stem, extension)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alembic_job_string() {
        let job = AlembicJob {
            root: "|Alien".to_string(),
            file: PathBuf::from("/show/asset/Alien.abc"),
            frame_range: FrameRange::new(1001, 1010),
        };
        assert_eq!(
            job.job_string(),
            "-frameRange 1001 1010 -attr project -attr scope -attr taskType -attr artist -noNormals \
             -uvWrite -writeColorSets -writeFaceSets -wholeFrameGeo -worldSpace -root |Alien \
             -writeVisibility -stripNamespaces -eulerFilter -autoSubd -writeUVSets -dataFormat ogawa \
             -file '/show/asset/Alien.abc'"
        );
    }

    #[test]
    fn test_native_file_type_names() {
        assert_eq!(NativeFileType::from_name("mayaBinary"), Some(NativeFileType::MayaBinary));
        assert_eq!(NativeFileType::from_name("ma"), Some(NativeFileType::MayaAscii));
        assert_eq!(NativeFileType::from_name("obj"), None);
        assert_eq!(NativeFileType::default().extension(), "ma");
    }

    #[test]
    fn test_derive_scene_path() {
        let mut scene = MemoryScene::new();
        assert_eq!(derive_scene_path(&scene, "abc"), None);

        scene.set_scene_path("/show/work/alien_mdl_v003.ma");
        assert_eq!(
            derive_scene_path(&scene, "abc"),
            Some(PathBuf::from("/show/work/alien_mdl_v003.abc"))
        );
    }

    #[test]
    fn test_default_cameras_are_not_asset_roots() {
        let mut scene = MemoryScene::new();
        let alien = scene.create_node(NodeType::Transform, "Alien", None).unwrap();
        assert_eq!(scene.assemblies().len(), 5);
        assert_eq!(scene.asset_assemblies(), vec![alien]);
    }
}
