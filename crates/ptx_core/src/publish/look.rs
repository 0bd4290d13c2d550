use std::path::PathBuf;

use ptx_factory::ProcessStatus;
use ptx_usd::{write_looks_info, MaterialInfo};

use super::{Publish, PublishArgs, PublishOptions, PublishResult, PublishState, Session};
use crate::asset::{AssetDetail, AssetInfo};
use crate::scene::HostScene;

/// Writes the shader assignments of a look as a looks-info document (LUKP).
#[derive(Debug)]
pub struct LookPublish {
    asset: AssetInfo,
    options: PublishOptions,
    state: PublishState,
}

impl LookPublish {
    pub fn new(args: PublishArgs) -> Self {
        Self {
            asset: args.asset,
            options: args.options,
            state: PublishState::new(),
        }
    }

    /// `.LUK_<type>_<name>.json` next to the open scene, unless an
    /// export path was given.
    pub fn looks_info_path(&self, scene: &dyn HostScene) -> Option<PathBuf> {
        if !self.options.export_path.is_empty() {
            return Some(PathBuf::from(&self.options.export_path));
        }
        let scene_path = scene.scene_path()?;
        let dir = scene_path.parent()?;
        Some(dir.join(format!(".LUK_{}_{}.json", self.asset.asset_type, self.asset.name)))
    }

    fn materials(&self) -> Vec<MaterialInfo> {
        match &self.asset.detail {
            AssetDetail::Look { shaders } => shaders.iter().map(|s| s.to_material_info()).collect(),
            _ => Vec::new(),
        }
    }
}

impl Publish for LookPublish {
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

        let materials = self.materials();
        if materials.is_empty() {
            self.state
                .report
                .warn(format!("No shaders to publish for {}", self.asset.name));
        }

        let Some(path) = self.looks_info_path(session.scene) else {
            self.state
                .report
                .fail("No export path given and the scene has never been saved");
            return Ok(self.state.conclude(&[]));
        };

        if let Err(e) = write_looks_info(&path, &materials) {
            self.state.report.fail(e.to_string());
            return Ok(self.state.conclude(&[]));
        }

        log::info!(
            target: super::LOG_TARGET,
            "Wrote {} material(s) to {}",
            materials.len(),
            path.display()
        );
        self.state.record("shader_count", materials.len());
        self.state.out_file = Some(path);
        Ok(self.state.conclude(&[]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::ShaderInfo;
    use crate::process::ProcessRegistry;
    use crate::scene::MemoryScene;
    use ptx_usd::{parse_looks_info, ParamValue, ShaderParameter};
    use tempfile::tempdir;

    fn look_asset() -> AssetInfo {
        AssetInfo::new("Alien", "Character", "LUK", "v004").with_detail(AssetDetail::Look {
            shaders: vec![ShaderInfo {
                shader_name: "skin_MTL".to_string(),
                material_type: "aiStandardSurface".to_string(),
                attributes: vec![ShaderParameter {
                    name: "specularRoughness".to_string(),
                    value: ParamValue::Number(0.35),
                    texture: None,
                }],
                assignment: vec!["|Alien|render_GRP|body_GEO".to_string()],
            }],
        })
    }

    #[test]
    fn test_looks_info_next_to_scene() {
        let dir = tempdir().unwrap();
        let mut scene = MemoryScene::new();
        scene.set_scene_path(dir.path().join("alien_luk_v004.ma"));
        let processes = ProcessRegistry::builtin().unwrap();
        let mut session = Session::new(&mut scene, &processes, "jdoe");

        let mut publish = LookPublish::new(PublishArgs::new(look_asset()));
        assert_eq!(publish.publish(&mut session).unwrap(), ProcessStatus::Succeeded);

        let path = dir.path().join(".LUK_Character_Alien.json");
        assert_eq!(publish.state().out_file.as_deref(), Some(path.as_path()));

        let materials = parse_looks_info(&path).unwrap();
        assert_eq!(materials.len(), 1);
        assert_eq!(materials[0].meshes, vec!["|Alien|render_GRP|body_GEO".to_string()]);
    }

    #[test]
    fn test_no_shaders_warns() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("looks.json");
        let mut scene = MemoryScene::new();
        let processes = ProcessRegistry::builtin().unwrap();
        let mut session = Session::new(&mut scene, &processes, "jdoe");

        let args = PublishArgs::new(AssetInfo::new("Alien", "Character", "LUK", "v004")).with_options(
            PublishOptions {
                export_path: out.to_string_lossy().into_owned(),
                ..PublishOptions::default()
            },
        );
        let mut publish = LookPublish::new(args);

        assert_eq!(publish.publish(&mut session).unwrap(), ProcessStatus::Warning);
        assert!(parse_looks_info(&out).unwrap().is_empty());
    }

    #[test]
    fn test_unsaved_scene_fails() {
        let mut scene = MemoryScene::new();
        let processes = ProcessRegistry::builtin().unwrap();
        let mut session = Session::new(&mut scene, &processes, "jdoe");

        let mut publish = LookPublish::new(PublishArgs::new(look_asset()));
        assert_eq!(publish.publish(&mut session).unwrap(), ProcessStatus::Failed);
        assert_eq!(publish.state().out_file, None);
    }
}
