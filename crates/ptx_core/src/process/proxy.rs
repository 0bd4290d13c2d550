use std::path::Path;

use ptx_factory::{ProcessStatus, StatusReport};

use super::{Process, ProcessKind, ProcessParams};
use crate::scene::{HostScene, NodeId};

/// Creates a stand-in node pointing at a cache artifact.
#[derive(Debug)]
pub struct ProxyCreator {
    kind: ProcessKind,
    params: ProcessParams,
    report: StatusReport,
    out_node: Option<NodeId>,
}

impl ProxyCreator {
    pub(crate) fn new(kind: ProcessKind, params: ProcessParams) -> Self {
        Self {
            kind,
            report: StatusReport::new(kind.log_target()),
            params,
            out_node: None,
        }
    }

    pub fn proxy_path(&self) -> &str {
        &self.params.proxy_path
    }

    /// Artifact the next run points the stand-in at.
    pub fn set_proxy_path(&mut self, path: impl Into<String>) {
        self.params.proxy_path = path.into();
    }

    /// The stand-in shape created by the last successful run.
    pub fn out_node(&self) -> Option<NodeId> {
        self.out_node
    }

    fn shape_suffix(&self) -> &'static str {
        match self.kind {
            ProcessKind::UsdStage => "UsdShape",
            _ => "GpuCacheShape",
        }
    }

    fn create(&self, scene: &mut dyn HostScene) -> Result<NodeId, String> {
        let (Some(node_type), Some(attribute)) = (self.kind.proxy_type(), self.kind.path_attribute()) else {
            return Err(format!("{:?} cannot create proxies", self.kind));
        };

        let stem = Path::new(&self.params.proxy_path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("Cannot name a proxy for {}", self.params.proxy_path))?;

        let shape_name = format!("{}{}", stem, self.shape_suffix());
        let shape = scene
            .create_node(node_type, &shape_name, None)
            .map_err(|e| e.to_string())?;
        if let Some(transform) = scene.parent(shape).map_err(|e| e.to_string())? {
            scene.rename(transform, &stem).map_err(|e| e.to_string())?;
        }
        scene
            .set_attr(shape, attribute, &self.params.proxy_path)
            .map_err(|e| e.to_string())?;
        Ok(shape)
    }

    /// Point the existing stand-in at another artifact.
    pub fn reroute(&mut self, scene: &mut dyn HostScene, new_path: &str) -> ProcessStatus {
        self.report.begin();

        let Some(node) = self.out_node else {
            return self.report.fail("No proxy node to reroute; run the proxy process first");
        };
        let Some(attribute) = self.kind.path_attribute() else {
            return self.report.fail(format!("{:?} has no path attribute", self.kind));
        };

        if let Err(e) = scene.set_attr(node, attribute, new_path) {
            return self.report.fail(format!("Cannot reroute {}: {}", node, e));
        }

        log::info!(
            target: self.report.target(),
            "Rerouted proxy {} from {} to {}",
            node,
            self.params.proxy_path,
            new_path
        );
        self.params.proxy_path = new_path.to_string();
        self.report.finish()
    }
}

impl Process for ProxyCreator {
    fn kind(&self) -> ProcessKind {
        self.kind
    }

    fn report(&self) -> &StatusReport {
        &self.report
    }

    fn process(&mut self, scene: &mut dyn HostScene) -> ProcessStatus {
        self.report.begin();

        if self.params.proxy_path.is_empty() {
            return self.report.fail("No proxy path given");
        }

        match self.create(scene) {
            Ok(shape) => {
                log::info!(
                    target: self.report.target(),
                    "Created proxy {} for {}",
                    shape,
                    self.params.proxy_path
                );
                self.out_node = Some(shape);
                self.report.finish()
            }
            Err(message) => self.report.fail(format!("Proxy creation failed: {}", message)),
        }
    }
}
