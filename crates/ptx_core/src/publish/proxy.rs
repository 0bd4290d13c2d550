use ptx_factory::ProcessStatus;

use super::{Publish, PublishArgs, PublishOptions, PublishResult, PublishState, Session};
use crate::asset::AssetInfo;
use crate::process::{Process, ProcessParams};

/// Points a proxy at an existing artifact and drops the nodes it
/// replaces (PRXC).
#[derive(Debug)]
pub struct CreateProxy {
    asset: AssetInfo,
    options: PublishOptions,
    state: PublishState,
}

impl CreateProxy {
    pub fn new(args: PublishArgs) -> Self {
        Self {
            asset: args.asset,
            options: args.options,
            state: PublishState::new(),
        }
    }
}

impl Publish for CreateProxy {
    fn asset(&self) -> &AssetInfo {
        &self.asset
    }

    fn asset_mut(&mut self) -> &mut AssetInfo {
        &mut self.asset
    }

    fn state(&self) -> &PublishState {
        &self.state
    }

    fn publish(&mut self, session: &mut Session<'_>) -> PublishResult<ProcessStatus> {
        self.state.begin();

        let params = ProcessParams::new().proxy_path(self.options.export_path.clone());
        let mut proxy = session.processes.proxy(&self.options.use_process, params)?;
        proxy.process(session.scene);

        let mut statuses = Vec::new();
        let status = self.state.absorb(&proxy, &mut statuses);
        if status == ProcessStatus::Failed {
            return Ok(self.state.conclude(&statuses));
        }

        for node in &self.options.orig_nodes {
            if let Err(e) = session.scene.delete(*node) {
                self.state.report.warn(format!("Cannot remove {}: {}", node, e));
            }
        }

        self.state.out_file = Some(self.options.export_path.clone().into());
        if let Some(node) = proxy.out_node() {
            if let Ok(path) = session.scene.full_path(node) {
                self.state.record("proxy_node", path);
            }
        }

        Ok(self.state.conclude(&statuses))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessRegistry;
    use crate::scene::{HostScene, MemoryScene, NodeType};

    #[test]
    fn test_proxy_replaces_original_nodes() {
        let mut scene = MemoryScene::new();
        let alien = scene.create_node(NodeType::Transform, "Alien", None).unwrap();
        let processes = ProcessRegistry::builtin().unwrap();
        let mut session = Session::new(&mut scene, &processes, "jdoe");

        let args = PublishArgs::new(AssetInfo::new("Alien", "Character", "MDL", "v003")).with_options(
            PublishOptions {
                export_path: "/show/Alien.usd".to_string(),
                use_process: "usd".to_string(),
                orig_nodes: vec![alien],
                ..PublishOptions::default()
            },
        );
        let mut publish = CreateProxy::new(args);

        assert_eq!(publish.publish(&mut session).unwrap(), ProcessStatus::Succeeded);
        assert_eq!(
            publish.state().publish_info["proxy_node"],
            "|Alien|AlienUsdShape"
        );
        assert_eq!(scene.assemblies().len(), 5);
        assert_ne!(scene.find_node("|Alien"), Some(alien));
    }

    #[test]
    fn test_failed_proxy_keeps_original_nodes() {
        let mut scene = MemoryScene::new();
        let alien = scene.create_node(NodeType::Transform, "Alien", None).unwrap();
        let processes = ProcessRegistry::builtin().unwrap();
        let mut session = Session::new(&mut scene, &processes, "jdoe");

        let args = PublishArgs::new(AssetInfo::new("Alien", "Character", "MDL", "v003")).with_options(
            PublishOptions {
                orig_nodes: vec![alien],
                ..PublishOptions::default()
            },
        );
        let mut publish = CreateProxy::new(args);

        assert_eq!(publish.publish(&mut session).unwrap(), ProcessStatus::Failed);
        assert_eq!(scene.find_node("|Alien"), Some(alien));
    }
}
