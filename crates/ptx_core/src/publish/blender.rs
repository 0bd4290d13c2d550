use ptx_factory::ProcessStatus;

use super::{find_model_root, record_geometry, Publish, PublishArgs, PublishOptions, PublishResult, PublishState, Session};
use crate::asset::AssetInfo;
use crate::process::{Process, ProcessParams};

/// Exports a model root and records its meshes (Blender MDLP).
#[derive(Debug)]
pub struct ModelPublish {
    asset: AssetInfo,
    options: PublishOptions,
    state: PublishState,
}

impl ModelPublish {
    pub fn new(args: PublishArgs) -> Self {
        Self {
            asset: args.asset,
            options: args.options,
            state: PublishState::new(),
        }
    }
}

impl Publish for ModelPublish {
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

        let Some(root) = find_model_root(session.scene, &self.asset, &self.options) else {
            self.state.report.fail("No model root found in the scene");
            return Ok(self.state.conclude(&[]));
        };
        record_geometry(session.scene, root, &mut self.asset);

        let params = ProcessParams::new()
            .root_node(root)
            .export_path(self.options.export_path.clone())
            .frame_range(self.options.frame_range);
        let mut exporter = session.processes.exporter(&self.options.use_process, params)?;
        exporter.process(session.scene);

        let mut statuses = Vec::new();
        if self.state.absorb(&exporter, &mut statuses) != ProcessStatus::Failed {
            self.state.out_file = Some(exporter.export_path().into());
            if let Ok(detail) = serde_json::to_value(&self.asset.detail) {
                self.state.record("detail", detail);
            }
        }

        Ok(self.state.conclude(&statuses))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetDetail;
    use crate::process::ProcessRegistry;
    use crate::scene::{HostScene, MemoryScene, NodeType};
    use tempfile::tempdir;

    #[test]
    fn test_model_publish_records_meshes() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("Chair.abc");
        let mut scene = MemoryScene::new();
        let root = scene.create_node(NodeType::Transform, "Chair", None).unwrap();
        scene.create_node(NodeType::Mesh, "seatShape", Some(root)).unwrap();
        scene.create_node(NodeType::Mesh, "legShape", Some(root)).unwrap();
        let processes = ProcessRegistry::builtin().unwrap();
        let mut session = Session::new(&mut scene, &processes, "jdoe");

        let args = PublishArgs::new(AssetInfo::new("Chair", "Prop", "MDL", "v001")).with_options(PublishOptions {
            export_path: out.to_string_lossy().into_owned(),
            ..PublishOptions::default()
        });
        let mut publish = ModelPublish::new(args);

        assert_eq!(publish.publish(&mut session).unwrap(), ProcessStatus::Succeeded);
        assert!(out.exists());
        assert_eq!(
            publish.asset().detail,
            AssetDetail::Model {
                root_node: "Chair".to_string(),
                geom_list: vec!["|Chair|seatShape".to_string(), "|Chair|legShape".to_string()],
            }
        );
        assert_eq!(publish.state().publish_info["detail"]["kind"], "model");
        // The model stays in the scene
        assert_eq!(scene.find_node("|Chair"), Some(root));
    }

    #[test]
    fn test_empty_scene_fails() {
        let mut scene = MemoryScene::new();
        let processes = ProcessRegistry::builtin().unwrap();
        let mut session = Session::new(&mut scene, &processes, "jdoe");

        let mut publish = ModelPublish::new(PublishArgs::new(AssetInfo::new("Chair", "Prop", "MDL", "v001")));
        assert_eq!(publish.publish(&mut session).unwrap(), ProcessStatus::Failed);
    }
}
