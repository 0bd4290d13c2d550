use ptx_factory::ProcessStatus;

use super::{Publish, PublishArgs, PublishOptions, PublishResult, PublishState, Session};
use crate::asset::AssetInfo;
use crate::process::{NativeOptions, Process, ProcessParams};

/// Process table entry of the native exporter.
const NATIVE_PROCESS: &str = "mae";

/// Saves the work scene, or an explicit set of nodes, as a native file (WRKS).
#[derive(Debug)]
pub struct ExportWorkScene {
    asset: AssetInfo,
    options: PublishOptions,
    state: PublishState,
}

impl ExportWorkScene {
    pub fn new(args: PublishArgs) -> Self {
        Self {
            asset: args.asset,
            options: args.options,
            state: PublishState::new(),
        }
    }
}

impl Publish for ExportWorkScene {
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

        let explicit = self
            .options
            .nodes_to_select
            .clone()
            .filter(|nodes| !nodes.is_empty());
        let selection_only = explicit.is_some();

        let root = match &explicit {
            Some(nodes) => {
                if let Err(e) = session.scene.set_selection(nodes) {
                    self.state.report.fail(format!("Cannot select the nodes to export: {}", e));
                    return Ok(self.state.conclude(&[]));
                }
                nodes.first().copied()
            }
            None => session.scene.asset_assemblies().into_iter().next(),
        };
        let Some(root) = root else {
            self.state.report.fail("Nothing to export in the work scene");
            return Ok(self.state.conclude(&[]));
        };

        let native = NativeOptions {
            file_type: self.options.native_file_type,
            force: true,
            selection_only,
            ..NativeOptions::default()
        };
        let params = ProcessParams::new()
            .root_node(root)
            .export_path(self.options.export_path.clone())
            .frame_range(self.options.frame_range)
            .native(native);

        let mut exporter = session.processes.exporter(NATIVE_PROCESS, params)?;
        exporter.process(session.scene);

        let mut statuses = Vec::new();
        if self.state.absorb(&exporter, &mut statuses) != ProcessStatus::Failed {
            self.state.out_file = Some(exporter.export_path().into());
            self.state.record("selection_only", selection_only);
        }

        Ok(self.state.conclude(&statuses))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessRegistry;
    use crate::scene::{HostScene, MemoryScene, NativeFileType, NodeType, SceneSnapshot};
    use tempfile::tempdir;

    fn scene_with_two_assets() -> MemoryScene {
        let mut scene = MemoryScene::new();
        scene.create_node(NodeType::Transform, "Alien", None).unwrap();
        scene.create_node(NodeType::Transform, "Ship", None).unwrap();
        scene
    }

    fn args(options: PublishOptions) -> PublishArgs {
        PublishArgs::new(AssetInfo::new("Alien", "Character", "WRK", "v012")).with_options(options)
    }

    #[test]
    fn test_whole_scene_export() {
        let dir = tempdir().unwrap();
        let mut scene = scene_with_two_assets();
        scene.set_scene_path(dir.path().join("alien_wrk_v012.ma"));
        let processes = ProcessRegistry::builtin().unwrap();
        let mut session = Session::new(&mut scene, &processes, "jdoe");

        let mut publish = ExportWorkScene::new(args(PublishOptions {
            native_file_type: NativeFileType::MayaBinary,
            ..PublishOptions::default()
        }));

        // Derived path
        assert_eq!(publish.publish(&mut session).unwrap(), ProcessStatus::Warning);
        let out = dir.path().join("alien_wrk_v012.mb");
        assert_eq!(publish.state().out_file.as_deref(), Some(out.as_path()));

        let snapshot = SceneSnapshot::read(&out).unwrap();
        assert_eq!(snapshot.format, "mayaBinary");
        assert_eq!(snapshot.roots.len(), 6);
    }

    #[test]
    fn test_explicit_nodes_export_selection_only() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("ship.ma");
        let mut scene = scene_with_two_assets();
        let ship = scene.find_node("Ship").unwrap();
        let processes = ProcessRegistry::builtin().unwrap();
        let mut session = Session::new(&mut scene, &processes, "jdoe");

        let mut publish = ExportWorkScene::new(args(PublishOptions {
            export_path: out.to_string_lossy().into_owned(),
            nodes_to_select: Some(vec![ship]),
            ..PublishOptions::default()
        }));

        assert_eq!(publish.publish(&mut session).unwrap(), ProcessStatus::Succeeded);
        assert_eq!(publish.state().publish_info["selection_only"], true);
        let snapshot = SceneSnapshot::read(&out).unwrap();
        assert_eq!(snapshot.roots.len(), 1);
        assert_eq!(snapshot.roots[0].name, "Ship");
    }

    #[test]
    fn test_empty_scene_fails() {
        let mut scene = MemoryScene::new();
        let processes = ProcessRegistry::builtin().unwrap();
        let mut session = Session::new(&mut scene, &processes, "jdoe");

        let mut publish = ExportWorkScene::new(args(PublishOptions::default()));
        assert_eq!(publish.publish(&mut session).unwrap(), ProcessStatus::Failed);
        assert!(session.scene.selection().is_empty());
    }
}
