//! In-memory host scene.
//!
//! Nodes live in an arena indexed by `NodeId`; deleted slots stay empty so
//! ids are never reused. Interchange files written by this scene are JSON
//! snapshots of the exported subtrees, so an export followed by an import
//! recreates the same hierarchy.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::*;

const LOG_TARGET: &str = "ptx::scene";

#[derive(Clone, Debug)]
struct Node {
    name: String,
    node_type: NodeType,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attributes: BTreeMap<String, String>,
}

/// A node and its subtree, as stored in files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSnapshot>,
}

/// Contents of a scene file or of an exported cache.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    /// `scene`, `alembic`, `usd` or a native file type
    #[serde(default)]
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_range: Option<FrameRange>,
    #[serde(default)]
    pub roots: Vec<NodeSnapshot>,
}

impl SceneSnapshot {
    pub fn read(path: &Path) -> SceneResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| SceneError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|error| SceneError::Snapshot {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Write as pretty JSON, creating parent directories.
    pub fn write(&self, path: &Path) -> SceneResult<()> {
        let io_err = |source| SceneError::Io {
            path: path.to_path_buf(),
            source,
        };
        let content = serde_json::to_string_pretty(self).map_err(|error| SceneError::Snapshot {
            path: path.to_path_buf(),
            error,
        })?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        std::fs::write(path, content).map_err(io_err)
    }
}

/// Arena-backed `HostScene`.
#[derive(Clone, Debug, Default)]
pub struct MemoryScene {
    path: Option<PathBuf>,
    nodes: Vec<Option<Node>>,
    roots: Vec<NodeId>,
    selection: Vec<NodeId>,
}

impl MemoryScene {
    /// An unsaved scene holding the default cameras.
    pub fn new() -> Self {
        let mut scene = Self::default();
        for camera in DEFAULT_CAMERAS {
            let transform = scene.add_node(NodeType::Transform, camera, None);
            scene.add_node(NodeType::Camera, &format!("{}Shape", camera), Some(transform));
        }
        scene
    }

    /// Load a scene file written by `save`.
    pub fn open<P: AsRef<Path>>(path: P) -> SceneResult<Self> {
        let path = path.as_ref();
        let snapshot = SceneSnapshot::read(path)?;

        let mut scene = Self::default();
        for root in &snapshot.roots {
            scene.instantiate(root, None);
        }
        scene.path = Some(path.to_path_buf());

        log::info!(target: LOG_TARGET, "Opened {} ({} nodes)", path.display(), scene.node_count());
        Ok(scene)
    }

    /// Save to the current scene path.
    pub fn save(&self) -> SceneResult<()> {
        let path = self.path.as_ref().ok_or(SceneError::Unsaved)?;
        let snapshot = SceneSnapshot {
            format: "scene".to_string(),
            frame_range: None,
            roots: self.roots.iter().filter_map(|id| self.snapshot(*id)).collect(),
        };
        snapshot.write(path)
    }

    pub fn save_as<P: AsRef<Path>>(&mut self, path: P) -> SceneResult<()> {
        self.path = Some(path.as_ref().to_path_buf());
        self.save()
    }

    /// Set the scene path without writing anything.
    pub fn set_scene_path<P: AsRef<Path>>(&mut self, path: P) {
        self.path = Some(path.as_ref().to_path_buf());
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Snapshot of a subtree.
    pub fn snapshot(&self, id: NodeId) -> Option<NodeSnapshot> {
        let node = self.get(id).ok()?;
        Some(NodeSnapshot {
            name: node.name.clone(),
            node_type: node.node_type,
            attributes: node.attributes.clone(),
            children: node.children.iter().filter_map(|c| self.snapshot(*c)).collect(),
        })
    }

    /// Recreate a snapshot under `parent`. Returns the new subtree root.
    pub fn instantiate(&mut self, snapshot: &NodeSnapshot, parent: Option<NodeId>) -> NodeId {
        let id = self.add_node(snapshot.node_type, &snapshot.name, parent);
        if let Some(Some(node)) = self.nodes.get_mut(id.0) {
            node.attributes = snapshot.attributes.clone();
        }
        for child in &snapshot.children {
            self.instantiate(child, Some(id));
        }
        id
    }

    fn add_node(&mut self, node_type: NodeType, name: &str, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node {
            name: name.to_string(),
            node_type,
            parent,
            children: Vec::new(),
            attributes: BTreeMap::new(),
        }));

        match parent.and_then(|p| self.nodes.get_mut(p.0)).and_then(Option::as_mut) {
            Some(parent) => parent.children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    fn get(&self, id: NodeId) -> SceneResult<&Node> {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(SceneError::NodeNotFound(id))
    }

    fn get_mut(&mut self, id: NodeId) -> SceneResult<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(SceneError::NodeNotFound(id))
    }

    fn collect_descendants(&self, id: NodeId, node_type: NodeType, out: &mut Vec<NodeId>) {
        if let Ok(node) = self.get(id) {
            for child in &node.children {
                if let Ok(c) = self.get(*child) {
                    if c.node_type == node_type {
                        out.push(*child);
                    }
                }
                self.collect_descendants(*child, node_type, out);
            }
        }
    }

    fn remove_subtree(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id.0).and_then(Option::take) {
            for child in node.children {
                self.remove_subtree(child);
            }
        }
    }

    /// Export roots as a snapshot file.
    fn write_export(&self, roots: &[NodeId], format: &str, frame_range: Option<FrameRange>, file: &Path) -> SceneResult<()> {
        let snapshot = SceneSnapshot {
            format: format.to_string(),
            frame_range,
            roots: roots.iter().filter_map(|id| self.snapshot(*id)).collect(),
        };
        snapshot.write(file)?;
        log::info!(
            target: LOG_TARGET,
            "Exported {} root(s) as {} to {}",
            snapshot.roots.len(),
            format,
            file.display()
        );
        Ok(())
    }

    fn read_import(&mut self, path: &Path) -> SceneResult<Vec<NodeId>> {
        let snapshot = SceneSnapshot::read(path)?;
        let ids = snapshot
            .roots
            .iter()
            .map(|root| self.instantiate(root, None))
            .collect::<Vec<_>>();
        log::info!(target: LOG_TARGET, "Imported {} root(s) from {}", ids.len(), path.display());
        Ok(ids)
    }

    /// Selection with descendants of other selected nodes removed.
    fn selected_roots(&self) -> Vec<NodeId> {
        self.selection
            .iter()
            .copied()
            .filter(|id| {
                let mut parent = self.get(*id).ok().and_then(|n| n.parent);
                while let Some(p) = parent {
                    if self.selection.contains(&p) {
                        return false;
                    }
                    parent = self.get(p).ok().and_then(|n| n.parent);
                }
                true
            })
            .collect()
    }
}

impl HostScene for MemoryScene {
    fn scene_path(&self) -> Option<PathBuf> {
        self.path.clone()
    }

    fn assemblies(&self) -> Vec<NodeId> {
        self.roots.clone()
    }

    fn selection(&self) -> Vec<NodeId> {
        self.selection.clone()
    }

    fn set_selection(&mut self, nodes: &[NodeId]) -> SceneResult<()> {
        for node in nodes {
            self.get(*node)?;
        }
        self.selection = nodes.to_vec();
        Ok(())
    }

    fn node_name(&self, node: NodeId) -> SceneResult<String> {
        Ok(self.get(node)?.name.clone())
    }

    fn node_type(&self, node: NodeId) -> SceneResult<NodeType> {
        Ok(self.get(node)?.node_type)
    }

    fn full_path(&self, node: NodeId) -> SceneResult<String> {
        let mut names = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            let n = self.get(id)?;
            names.push(n.name.as_str());
            current = n.parent;
        }
        names.reverse();
        Ok(format!("|{}", names.join("|")))
    }

    fn parent(&self, node: NodeId) -> SceneResult<Option<NodeId>> {
        Ok(self.get(node)?.parent)
    }

    fn children(&self, node: NodeId) -> SceneResult<Vec<NodeId>> {
        Ok(self.get(node)?.children.clone())
    }

    fn descendants_of_type(&self, node: NodeId, node_type: NodeType) -> SceneResult<Vec<NodeId>> {
        self.get(node)?;
        let mut out = Vec::new();
        self.collect_descendants(node, node_type, &mut out);
        Ok(out)
    }

    fn find_node(&self, name_or_path: &str) -> Option<NodeId> {
        let live = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| NodeId(i));

        if name_or_path.starts_with('|') {
            live.into_iter()
                .find(|id| self.full_path(*id).is_ok_and(|p| p == name_or_path))
        } else {
            live.into_iter()
                .find(|id| self.get(*id).is_ok_and(|n| n.name == name_or_path))
        }
    }

    fn get_attr(&self, node: NodeId, attribute: &str) -> SceneResult<String> {
        let n = self.get(node)?;
        n.attributes
            .get(attribute)
            .cloned()
            .ok_or_else(|| SceneError::MissingAttribute {
                node: n.name.clone(),
                attribute: attribute.to_string(),
            })
    }

    fn set_attr(&mut self, node: NodeId, attribute: &str, value: &str) -> SceneResult<()> {
        self.get_mut(node)?
            .attributes
            .insert(attribute.to_string(), value.to_string());
        Ok(())
    }

    fn create_node(&mut self, node_type: NodeType, name: &str, parent: Option<NodeId>) -> SceneResult<NodeId> {
        if let Some(parent) = parent {
            self.get(parent)?;
            return Ok(self.add_node(node_type, name, Some(parent)));
        }

        if node_type.is_shape() {
            let count = self
                .nodes
                .iter()
                .flatten()
                .filter(|n| n.node_type == NodeType::Transform)
                .count();
            let transform = self.add_node(NodeType::Transform, &format!("transform{}", count + 1), None);
            return Ok(self.add_node(node_type, name, Some(transform)));
        }

        Ok(self.add_node(node_type, name, None))
    }

    fn rename(&mut self, node: NodeId, name: &str) -> SceneResult<()> {
        self.get_mut(node)?.name = name.to_string();
        Ok(())
    }

    fn delete(&mut self, node: NodeId) -> SceneResult<()> {
        let parent = self.get(node)?.parent;
        match parent {
            Some(p) => self.get_mut(p)?.children.retain(|c| *c != node),
            None => self.roots.retain(|r| *r != node),
        }
        self.remove_subtree(node);
        let nodes = &self.nodes;
        self.selection
            .retain(|id| nodes.get(id.0).is_some_and(Option::is_some));
        Ok(())
    }

    fn export_alembic(&mut self, job: &AlembicJob) -> SceneResult<()> {
        log::debug!(target: LOG_TARGET, "AbcExport -j \"{}\"", job.job_string());
        let root = self
            .find_node(&job.root)
            .ok_or_else(|| SceneError::NoSuchNode(job.root.clone()))?;
        self.write_export(&[root], "alembic", Some(job.frame_range), &job.file)
    }

    fn export_usd(&mut self, job: &UsdExportJob) -> SceneResult<()> {
        let roots = if job.selection {
            if self.selection.is_empty() {
                let assets = self.asset_assemblies();
                self.set_selection(&assets)?;
            }
            self.selected_roots()
        } else {
            self.asset_assemblies()
        };
        self.write_export(&roots, "usd", Some(job.frame_range), &job.file)
    }

    fn export_native(&mut self, job: &NativeExportJob) -> SceneResult<()> {
        if job.file.exists() && !job.force {
            return Err(SceneError::Io {
                path: job.file.clone(),
                source: std::io::Error::new(std::io::ErrorKind::AlreadyExists, "file exists"),
            });
        }
        let roots = if job.selection_only {
            self.selected_roots()
        } else {
            self.roots.clone()
        };
        self.write_export(&roots, job.file_type.type_name(), None, &job.file)
    }

    fn import_alembic(&mut self, path: &Path) -> SceneResult<Vec<NodeId>> {
        self.read_import(path)
    }

    fn import_usd(&mut self, path: &Path) -> SceneResult<Vec<NodeId>> {
        self.read_import(path)
    }

    fn import_native(&mut self, path: &Path) -> SceneResult<Vec<NodeId>> {
        self.read_import(path)
    }
}
