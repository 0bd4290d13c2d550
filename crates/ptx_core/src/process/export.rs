use std::path::PathBuf;

use ptx_factory::{ProcessStatus, StatusReport};

use super::{Process, ProcessKind, ProcessParams};
use crate::scene::{derive_scene_path, AlembicJob, HostScene, NativeExportJob, NodeId, UsdExportJob};

/// Writes a cache artifact for one root node.
#[derive(Debug)]
pub struct Exporter {
    kind: ProcessKind,
    params: ProcessParams,
    report: StatusReport,
}

impl Exporter {
    pub(crate) fn new(kind: ProcessKind, params: ProcessParams) -> Self {
        Self {
            kind,
            report: StatusReport::new(kind.log_target()),
            params,
        }
    }

    /// Output path; after a run this is the derived path if none was given.
    pub fn export_path(&self) -> &str {
        &self.params.export_path
    }

    pub fn root_node(&self) -> Option<NodeId> {
        self.params.root_node
    }

    pub fn params(&self) -> &ProcessParams {
        &self.params
    }

    /// Replace the parameters of an exporter resolved ahead of its run.
    pub fn set_params(&mut self, params: ProcessParams) {
        self.params = params;
    }

    /// Extension of the artifact this exporter writes.
    pub fn extension(&self) -> &'static str {
        match self.kind {
            ProcessKind::UsdExporter => "usd",
            ProcessKind::NativeExporter => self.params.native.file_type.extension(),
            _ => "abc",
        }
    }

    fn run_export(&self, scene: &mut dyn HostScene, root: NodeId, file: PathBuf) -> Result<(), String> {
        let params = &self.params;
        let result = match self.kind {
            ProcessKind::UsdExporter => {
                scene
                    .set_selection(&[root])
                    .map_err(|e| format!("Cannot select {}: {}", root, e))?;
                let usd = &params.usd;
                scene.export_usd(&UsdExportJob {
                    file,
                    append: usd.append,
                    convert_materials_to: usd.convert_materials_to.clone(),
                    default_mesh_scheme: usd.default_mesh_scheme.clone(),
                    default_usd_format: usd.default_usd_format.clone(),
                    frame_range: params.frame_range,
                    selection: true,
                })
            }
            ProcessKind::NativeExporter => {
                let native = params.native;
                if native.selection_only && scene.selection().is_empty() {
                    scene
                        .set_selection(&[root])
                        .map_err(|e| format!("Cannot select {}: {}", root, e))?;
                }
                scene.export_native(&NativeExportJob {
                    file,
                    file_type: native.file_type,
                    force: native.force,
                    preserve_references: native.preserve_references,
                    selection_only: native.selection_only,
                })
            }
            _ => {
                let root_path = scene
                    .full_path(root)
                    .map_err(|e| format!("Cannot resolve root node: {}", e))?;
                scene.export_alembic(&AlembicJob {
                    root: root_path,
                    file,
                    frame_range: params.frame_range,
                })
            }
        };
        result.map_err(|e| e.to_string())
    }
}

impl Process for Exporter {
    fn kind(&self) -> ProcessKind {
        self.kind
    }

    fn report(&self) -> &StatusReport {
        &self.report
    }

    fn process(&mut self, scene: &mut dyn HostScene) -> ProcessStatus {
        self.report.begin();

        let Some(root) = self.params.root_node else {
            return self.report.fail("No root node set for export");
        };

        if self.params.export_path.is_empty() {
            match derive_scene_path(scene, self.extension()) {
                Some(path) => {
                    self.params.export_path = path.to_string_lossy().into_owned();
                    self.report.warn(format!(
                        "No export path given, exporting to {}",
                        self.params.export_path
                    ));
                }
                None => {
                    return self
                        .report
                        .fail("No export path given and the scene has never been saved");
                }
            }
        }

        let file = PathBuf::from(&self.params.export_path);
        if let Err(message) = self.run_export(scene, root, file) {
            return self.report.fail(format!(
                "{} export to {} failed: {}",
                self.extension(),
                self.params.export_path,
                message
            ));
        }

        log::info!(
            target: self.report.target(),
            "Exported {} to {}",
            root,
            self.params.export_path
        );
        self.report.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{NativeOptions, ProcessRegistry};
    use crate::scene::{FrameRange, MemoryScene, NativeFileType, NodeType, SceneSnapshot};
    use tempfile::tempdir;

    fn model_scene() -> (MemoryScene, NodeId) {
        let mut scene = MemoryScene::new();
        let root = scene.create_node(NodeType::Transform, "Alien", None).unwrap();
        let geo = scene.create_node(NodeType::Transform, "body_GEO", Some(root)).unwrap();
        scene.create_node(NodeType::Mesh, "body_GEOShape", Some(geo)).unwrap();
        (scene, root)
    }

    #[test]
    fn test_no_root_node_fails() {
        let (mut scene, _) = model_scene();
        let mut exporter = ProcessRegistry::builtin()
            .unwrap()
            .exporter("abc", ProcessParams::new().export_path("/tmp/unused.abc"))
            .unwrap();

        assert_eq!(exporter.process(&mut scene), ProcessStatus::Failed);
        assert_eq!(exporter.report().diagnostics().len(), 1);
    }

    #[test]
    fn test_empty_path_derives_from_scene() {
        let dir = tempdir().unwrap();
        let (mut scene, root) = model_scene();
        scene.set_scene_path(dir.path().join("alien_mdl_v002.ma"));

        let mut exporter = ProcessRegistry::builtin()
            .unwrap()
            .exporter("abc", ProcessParams::new().root_node(root))
            .unwrap();

        assert_eq!(exporter.process(&mut scene), ProcessStatus::Warning);
        let expected = dir.path().join("alien_mdl_v002.abc");
        assert_eq!(exporter.export_path(), expected.to_string_lossy());
        assert!(expected.exists());
    }

    #[test]
    fn test_unsaved_scene_without_path_fails() {
        let (mut scene, root) = model_scene();
        let mut exporter = ProcessRegistry::builtin()
            .unwrap()
            .exporter("usd", ProcessParams::new().root_node(root))
            .unwrap();

        assert_eq!(exporter.process(&mut scene), ProcessStatus::Failed);
        assert!(exporter.export_path().is_empty());
    }

    #[test]
    fn test_alembic_export_writes_frame_range() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("cache").join("Alien.abc");
        let (mut scene, root) = model_scene();

        let mut exporter = ProcessRegistry::builtin()
            .unwrap()
            .exporter(
                "abc",
                ProcessParams::new()
                    .root_node(root)
                    .export_path(file.to_string_lossy())
                    .frame_range(FrameRange::new(1001, 1024)),
            )
            .unwrap();

        assert_eq!(exporter.process(&mut scene), ProcessStatus::Succeeded);
        let snapshot = SceneSnapshot::read(&file).unwrap();
        assert_eq!(snapshot.format, "alembic");
        assert_eq!(snapshot.frame_range, Some(FrameRange::new(1001, 1024)));
        assert_eq!(snapshot.roots[0].name, "Alien");
    }

    #[test]
    fn test_usd_export_selects_root() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("Alien.usd");
        let (mut scene, root) = model_scene();
        scene.create_node(NodeType::Transform, "Prop", None).unwrap();

        let mut exporter = ProcessRegistry::builtin()
            .unwrap()
            .exporter("usd", ProcessParams::new().root_node(root).export_path(file.to_string_lossy()))
            .unwrap();

        assert_eq!(exporter.process(&mut scene), ProcessStatus::Succeeded);
        assert_eq!(scene.selection(), vec![root]);
        assert_eq!(SceneSnapshot::read(&file).unwrap().roots.len(), 1);
    }

    #[test]
    fn test_native_export_refuses_overwrite_without_force() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("work.mb");
        std::fs::write(&file, "{}").unwrap();
        let (mut scene, root) = model_scene();

        let options = NativeOptions {
            file_type: NativeFileType::MayaBinary,
            force: false,
            ..NativeOptions::default()
        };
        let mut exporter = ProcessRegistry::builtin()
            .unwrap()
            .exporter(
                "mae",
                ProcessParams::new()
                    .root_node(root)
                    .export_path(file.to_string_lossy())
                    .native(options),
            )
            .unwrap();

        assert_eq!(exporter.extension(), "mb");
        assert_eq!(exporter.process(&mut scene), ProcessStatus::Failed);
    }
}
