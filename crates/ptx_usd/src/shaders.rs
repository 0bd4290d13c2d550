//! Shader definitions used when composing look files.
//!
//! A host material type (e.g. `aiStandardSurface`) is resolved through the
//! `shaders` category of `usd_defs.json` to a compiled-in `ShaderKind`.
//! Each kind knows its USD shader id, the inputs it exposes and how host
//! parameter names map onto those inputs.

use std::path::Path;

use ptx_factory::{Locator, Registry, RegistryResult};

use crate::types::ValueType;

const BUILTIN_DEFS: &str = include_str!("../config/usd_defs.json");

/// Registry category holding material types.
pub const SHADERS_CATEGORY: &str = "shaders";

/// Compiled-in shader implementations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderKind {
    /// MaterialX `standard_surface`
    StandardMaterialX,
    /// `UsdPreviewSurface`
    PreviewSurface,
}

impl Locator for ShaderKind {
    fn from_locator(locator: &str) -> Option<Self> {
        match locator {
            "standard_matx" => Some(ShaderKind::StandardMaterialX),
            "standard_preview" => Some(ShaderKind::PreviewSurface),
            _ => None,
        }
    }

    fn locator(self) -> &'static str {
        match self {
            ShaderKind::StandardMaterialX => "standard_matx",
            ShaderKind::PreviewSurface => "standard_preview",
        }
    }
}

/// Value kind of a shader input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderParamKind {
    Bool,
    Float,
    Color3,
    Vector3,
}

impl ShaderParamKind {
    /// USD value type the input is authored with.
    pub fn value_type(self) -> ValueType {
        match self {
            ShaderParamKind::Bool => ValueType::Bool,
            ShaderParamKind::Float => ValueType::Float,
            ShaderParamKind::Color3 => ValueType::Color3f,
            ShaderParamKind::Vector3 => ValueType::Normal3f,
        }
    }
}

/// A shader input resolved from a host parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShaderInput {
    pub name: &'static str,
    pub kind: ShaderParamKind,
}

/// Shader ids of the texture reader and its texcoord node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureIds {
    pub texture: &'static str,
    pub texcoord: &'static str,
}

use ShaderParamKind::{Bool, Color3, Float, Vector3};

const MATERIALX_INPUTS: &[(&str, ShaderParamKind)] = &[
    ("base", Float),
    ("base_color", Color3),
    ("diffuse_roughness", Float),
    ("normal", Vector3),
    ("tangent", Vector3),
    ("metalness", Float),
    ("specular", Float),
    ("specular_color", Color3),
    ("specular_roughness", Float),
    ("specular_IOR", Float),
    ("specular_anisotropy", Float),
    ("specular_rotation", Float),
    ("transmission", Float),
    ("transmission_color", Color3),
    ("transmission_depth", Float),
    ("transmission_scatter", Color3),
    ("transmission_scatter_anisotropy", Float),
    ("transmission_dispersion", Float),
    ("transmission_extra_roughness", Float),
    ("subsurface", Float),
    ("subsurface_color", Color3),
    ("subsurface_radius", Color3),
    ("subsurface_scale", Float),
    ("subsurface_anisotropy", Float),
    ("sheen", Float),
    ("sheen_color", Color3),
    ("sheen_roughness", Float),
    ("coat", Float),
    ("coat_color", Color3),
    ("coat_roughness", Float),
    ("coat_anisotropy", Float),
    ("coat_rotation", Float),
    ("coat_IOR", Float),
    ("coat_normal", Vector3),
    ("coat_affect_color", Float),
    ("coat_affect_roughness", Float),
    ("thin_film_thickness", Float),
    ("thin_film_IOR", Float),
    ("emission", Float),
    ("emission_color", Color3),
    ("opacity", Color3),
    ("thin_walled", Bool),
];

/// Host (Arnold) parameter name -> MaterialX input name.
const MATERIALX_WHITELIST: &[(&str, &str)] = &[
    ("base", "base"),
    ("baseColor", "base_color"),
    ("diffuseRoughness", "diffuse_roughness"),
    ("normalColor", "normal"),
    ("tangent", "tangent"),
    ("metalness", "metalness"),
    ("specular", "specular"),
    ("specularColor", "specular_color"),
    ("specularRoughness", "specular_roughness"),
    ("specularIOR", "specular_IOR"),
    ("specularAnisotropy", "specular_anisotropy"),
    ("specularRotation", "specular_rotation"),
    ("transmission", "transmission"),
    ("transmissionColor", "transmission_color"),
    ("transmissionDepth", "transmission_depth"),
    ("transmissionScatter", "transmission_scatter"),
    ("transmissionScatterAnisotropy", "transmission_scatter_anisotropy"),
    ("transmissionDispersion", "transmission_dispersion"),
    ("transmissionExtraRoughness", "transmission_extra_roughness"),
    ("subsurface", "subsurface"),
    ("subsurfaceColor", "subsurface_color"),
    ("subsurfaceRadius", "subsurface_radius"),
    ("subsurfaceScale", "subsurface_scale"),
    ("subsurfaceAnisotropy", "subsurface_anisotropy"),
    ("sheen", "sheen"),
    ("sheenColor", "sheen_color"),
    ("sheenRoughness", "sheen_roughness"),
    ("coat", "coat"),
    ("coatColor", "coat_color"),
    ("coatRoughness", "coat_roughness"),
    ("coatIOR", "coat_IOR"),
    ("coatNormal", "coat_normal"),
    ("coatAnisotropy", "coat_anisotropy"),
    ("coatRotation", "coat_rotation"),
    ("coatAffectColor", "coat_affect_color"),
    ("coatAffectRoughness", "coat_affect_roughness"),
    ("thinFilmThickness", "thin_film_thickness"),
    ("thinFilmIOR", "thin_film_IOR"),
    ("emission", "emission"),
    ("emissionColor", "emission_color"),
    ("opacity", "opacity"),
    ("thinWalled", "thin_walled"),
];

const PREVIEW_INPUTS: &[(&str, ShaderParamKind)] = &[
    ("clearcoat", Float),
    ("clearcoatRoughness", Float),
    ("diffuseColor", Color3),
    ("emissiveColor", Color3),
    ("opacity", Float),
    ("ior", Float),
    ("metallic", Float),
    ("normal", Vector3),
    ("roughness", Float),
    ("specularColor", Color3),
    ("displacement", Float),
    ("occlusion", Float),
];

/// Host parameter name -> preview surface input, for names that differ.
const PREVIEW_RENAMES: &[(&str, &str)] = &[
    ("baseColor", "diffuseColor"),
    ("metalness", "metallic"),
    ("specularRoughness", "roughness"),
    ("emissionColor", "emissiveColor"),
    ("specularIOR", "ior"),
    ("coat", "clearcoat"),
    ("coatRoughness", "clearcoatRoughness"),
    ("normalColor", "normal"),
];

fn lookup<V: Copy>(table: &[(&str, V)], key: &str) -> Option<V> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

impl ShaderKind {
    /// `info:id` of the surface shader.
    pub fn shader_id(self) -> &'static str {
        match self {
            ShaderKind::StandardMaterialX => "ND_standard_surface_surfaceshader",
            ShaderKind::PreviewSurface => "UsdPreviewSurface",
        }
    }

    /// Render context of the material outputs (`outputs:<ctx>:surface`).
    pub fn render_context(self) -> Option<&'static str> {
        match self {
            ShaderKind::StandardMaterialX => Some("mtlx"),
            ShaderKind::PreviewSurface => None,
        }
    }

    /// Class the material prim inherits from, if any.
    pub fn material_class(self) -> Option<&'static str> {
        match self {
            ShaderKind::StandardMaterialX => Some("/__class_mtl__/mtlxmaterial"),
            ShaderKind::PreviewSurface => None,
        }
    }

    pub fn texture_ids(self) -> TextureIds {
        match self {
            ShaderKind::StandardMaterialX => TextureIds {
                texture: "ND_UsdUVTexture",
                texcoord: "ND_texcoord_vector2",
            },
            ShaderKind::PreviewSurface => TextureIds {
                texture: "UsdUVTexture",
                texcoord: "UsdPrimvarReader_float2",
            },
        }
    }

    /// Every input of this shader.
    pub fn inputs(self) -> &'static [(&'static str, ShaderParamKind)] {
        match self {
            ShaderKind::StandardMaterialX => MATERIALX_INPUTS,
            ShaderKind::PreviewSurface => PREVIEW_INPUTS,
        }
    }

    /// Map a host parameter onto an input of this shader.
    ///
    /// Parameters outside the whitelist return `None` and are not authored.
    pub fn input_for(self, host_param: &str) -> Option<ShaderInput> {
        let name = match self {
            ShaderKind::StandardMaterialX => lookup(MATERIALX_WHITELIST, host_param)?,
            ShaderKind::PreviewSurface => lookup(PREVIEW_RENAMES, host_param).or_else(|| {
                PREVIEW_INPUTS
                    .iter()
                    .find(|(n, _)| *n == host_param)
                    .map(|(n, _)| *n)
            })?,
        };
        let kind = lookup(self.inputs(), name)?;
        Some(ShaderInput { name, kind })
    }
}

/// Material type -> shader kind table.
#[derive(Debug)]
pub struct ShaderRegistry {
    registry: Registry<ShaderKind>,
}

impl ShaderRegistry {
    /// The table shipped with the crate.
    pub fn builtin() -> RegistryResult<Self> {
        Self::from_json_str(BUILTIN_DEFS, "usd_defs.json")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> RegistryResult<Self> {
        Ok(Self {
            registry: Registry::load(path)?,
        })
    }

    pub fn from_json_str(content: &str, source: &str) -> RegistryResult<Self> {
        Ok(Self {
            registry: Registry::from_json_str(content, source)?,
        })
    }

    /// Resolve a host material type (e.g. `aiStandardSurface`).
    pub fn shader_for(&self, material_type: &str) -> RegistryResult<ShaderKind> {
        self.registry.lookup(SHADERS_CATEGORY, material_type)
    }

    pub fn material_types(&self) -> RegistryResult<Vec<&str>> {
        Ok(self
            .registry
            .entries(SHADERS_CATEGORY)?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    pub fn registry(&self) -> &Registry<ShaderKind> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptx_factory::RegistryError;

    #[test]
    fn test_builtin_resolves_standard_surface() {
        let shaders = ShaderRegistry::builtin().unwrap();
        assert_eq!(shaders.shader_for("aiStandardSurface").unwrap(), ShaderKind::StandardMaterialX);
        assert_eq!(shaders.shader_for("usdPreviewSurface").unwrap(), ShaderKind::PreviewSurface);
        assert!(matches!(
            shaders.shader_for("lambert"),
            Err(RegistryError::UnknownName { .. })
        ));
    }

    #[test]
    fn test_materialx_whitelist() {
        let kind = ShaderKind::StandardMaterialX;

        let input = kind.input_for("baseColor").unwrap();
        assert_eq!(input.name, "base_color");
        assert_eq!(input.kind, ShaderParamKind::Color3);

        assert_eq!(kind.input_for("normalColor").unwrap().kind, ShaderParamKind::Vector3);
        assert_eq!(kind.input_for("thinWalled").unwrap().kind, ShaderParamKind::Bool);
        assert_eq!(kind.input_for("opacity").unwrap().kind, ShaderParamKind::Color3);
        assert!(kind.input_for("aovId1").is_none());
    }

    #[test]
    fn test_whitelist_targets_exist() {
        for (_, target) in MATERIALX_WHITELIST {
            assert!(lookup(MATERIALX_INPUTS, target).is_some(), "{}", target);
        }
        for (_, target) in PREVIEW_RENAMES {
            assert!(lookup(PREVIEW_INPUTS, target).is_some(), "{}", target);
        }
    }

    #[test]
    fn test_preview_mapping() {
        let kind = ShaderKind::PreviewSurface;
        assert_eq!(kind.input_for("baseColor").unwrap().name, "diffuseColor");
        assert_eq!(kind.input_for("roughness").unwrap().name, "roughness");
        assert_eq!(kind.input_for("opacity").unwrap().kind, ShaderParamKind::Float);
        assert_eq!(kind.shader_id(), "UsdPreviewSurface");
        assert_eq!(kind.render_context(), None);
    }
}
