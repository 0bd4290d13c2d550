use std::path::Path;

use ptx_factory::{ProcessStatus, StatusReport};

use super::{Process, ProcessKind, ProcessParams};
use crate::scene::{HostScene, NodeId, NodeType};

/// Turns a stand-in (or a native scene file) back into editable geometry.
#[derive(Debug)]
pub struct ProxyImporter {
    kind: ProcessKind,
    params: ProcessParams,
    report: StatusReport,
    imported: Vec<NodeId>,
}

impl ProxyImporter {
    pub(crate) fn new(kind: ProcessKind, params: ProcessParams) -> Self {
        Self {
            kind,
            report: StatusReport::new(kind.log_target()),
            params,
            imported: Vec::new(),
        }
    }

    /// Top-level nodes created by the last run.
    pub fn imported(&self) -> &[NodeId] {
        &self.imported
    }

    pub fn proxy_node(&self) -> Option<NodeId> {
        self.params.proxy_node
    }

    /// The stand-in node type this importer consumes, if any.
    pub fn proxy_type(&self) -> Option<NodeType> {
        self.kind.proxy_type()
    }

    /// `node` itself when it has the proxy type, else its first
    /// descendant of that type.
    pub fn find_cached_node(&self, scene: &dyn HostScene, node: NodeId) -> Option<NodeId> {
        let proxy_type = self.kind.proxy_type()?;
        if scene.node_type(node).ok()? == proxy_type {
            return Some(node);
        }
        scene
            .descendants_of_type(node, proxy_type)
            .ok()?
            .into_iter()
            .next()
    }

    fn import_file(&mut self, scene: &mut dyn HostScene) -> ProcessStatus {
        if self.params.import_path.is_empty() {
            return self.report.fail("No import path given");
        }

        let path = Path::new(&self.params.import_path);
        match scene.import_native(path) {
            Ok(nodes) => {
                log::info!(
                    target: self.report.target(),
                    "Imported {} node(s) from {}",
                    nodes.len(),
                    path.display()
                );
                self.imported = nodes;
                self.report.finish()
            }
            Err(e) => self.report.fail(format!("Import of {} failed: {}", path.display(), e)),
        }
    }

    fn import_proxy(&mut self, scene: &mut dyn HostScene, proxy_type: NodeType) -> ProcessStatus {
        let Some(node) = self.params.proxy_node else {
            return self.report.fail("No proxy node given");
        };

        let Some(shape) = self.find_cached_node(scene, node) else {
            let name = scene.node_name(node).unwrap_or_else(|_| node.to_string());
            return self
                .report
                .fail(format!("No {} node found under {}", proxy_type, name));
        };

        let attribute = match self.kind.path_attribute() {
            Some(attribute) => attribute,
            None => return self.report.fail(format!("{:?} has no path attribute", self.kind)),
        };
        let artifact = match scene.get_attr(shape, attribute) {
            Ok(path) if !path.is_empty() => path,
            Ok(_) => return self.report.fail(format!("{} does not point at a file", shape)),
            Err(e) => return self.report.fail(e.to_string()),
        };

        // The stand-in is the transform holding the cache shape.
        let stand_in = match scene.parent(shape) {
            Ok(Some(parent)) => parent,
            Ok(None) => shape,
            Err(e) => return self.report.fail(e.to_string()),
        };

        let path = Path::new(&artifact);
        let result = match self.kind {
            ProcessKind::UsdImporter => scene.import_usd(path),
            _ => scene.import_alembic(path),
        };

        match result {
            Ok(nodes) => {
                // The stand-in goes only once its replacement is in the scene.
                if let Err(e) = scene.delete(stand_in) {
                    self.imported = nodes;
                    return self.report.fail(format!("Cannot remove stand-in {}: {}", stand_in, e));
                }
                log::info!(
                    target: self.report.target(),
                    "Replaced {} with {} node(s) from {}",
                    stand_in,
                    nodes.len(),
                    artifact
                );
                self.imported = nodes;
                self.report.finish()
            }
            Err(e) => self.report.fail(format!("Import of {} failed: {}", artifact, e)),
        }
    }
}

impl Process for ProxyImporter {
    fn kind(&self) -> ProcessKind {
        self.kind
    }

    fn report(&self) -> &StatusReport {
        &self.report
    }

    fn process(&mut self, scene: &mut dyn HostScene) -> ProcessStatus {
        self.report.begin();
        self.imported.clear();

        match self.kind.proxy_type() {
            Some(proxy_type) => self.import_proxy(scene, proxy_type),
            None => self.import_file(scene),
        }
    }
}
