//! Asset composition.
//!
//! Builds the three layers of a published asset from its looks info and
//! its geometry cache:
//!
//! - `Payload_<type>_<name>.usda`: the root prim referencing the alembic
//! - `GEO_<type>_<name>.usda`: the component model, mesh payloads and
//!   collection-based material bindings
//! - `LUK_<type>_<name>/LUK_<type>_<name>.usda`: the materials
//!
//! Layers that already exist are opened and extended, so composing twice
//! reuses the prims and references authored the first time.

use std::path::PathBuf;

use glam::{Vec3, Vec4};
use ptx_factory::RegistryError;
use thiserror::Error;

use crate::looks::{parse_looks_info, LooksError, MaterialInfo, ShaderParameter};
use crate::shaders::{ShaderInput, ShaderKind, ShaderParamKind, ShaderRegistry};
use crate::stage::{UsdError, UsdStage};
use crate::types::*;

const LOG_TARGET: &str = "ptx::usd";

/// Material type used when a look names one the shader table doesn't know.
pub const FALLBACK_MATERIAL_TYPE: &str = "aiStandardSurface";

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("USD error: {0}")]
    Usd(#[from] UsdError),

    #[error("Looks error: {0}")]
    Looks(#[from] LooksError),

    #[error("Shader registry error: {0}")]
    Registry(#[from] RegistryError),
}

pub type ComposeResult<T> = Result<T, ComposeError>;

/// Inputs of one composition.
#[derive(Clone, Debug)]
pub struct ComposeRequest {
    /// Looks-info JSON written by the look publish
    pub looks_info_path: PathBuf,
    /// Geometry cache referenced by the payload layer
    pub alembic_path: String,
    /// Directory receiving the composed layers
    pub usd_base_location: PathBuf,
    pub asset_type: String,
    pub asset_name: String,
    /// Prim inside the alembic the payload references (usually `/render_GRP`)
    pub base_prim_path: String,
}

impl ComposeRequest {
    fn stem(&self) -> String {
        format!("{}_{}", self.asset_type, self.asset_name)
    }

    pub fn payload_path(&self) -> PathBuf {
        self.usd_base_location.join(format!("Payload_{}.usda", self.stem()))
    }

    pub fn asset_path(&self) -> PathBuf {
        self.usd_base_location.join(format!("GEO_{}.usda", self.stem()))
    }

    pub fn looks_path(&self) -> PathBuf {
        let dir = format!("LUK_{}", self.stem());
        self.usd_base_location.join(&dir).join(format!("{}.usda", dir))
    }

    /// Look layer path relative to the asset layer.
    fn looks_reference(&self) -> String {
        format!("./LUK_{0}/LUK_{0}.usda", self.stem())
    }

    fn payload_reference(&self) -> String {
        format!("./Payload_{}.usda", self.stem())
    }
}

/// Layers written by `compose_asset`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComposedAsset {
    pub payload_path: PathBuf,
    pub asset_path: PathBuf,
    pub looks_path: PathBuf,
    /// Material prim paths authored in the look layer
    pub materials: Vec<String>,
}

/// Meshes bound to one material in the asset layer.
struct Binding {
    material: String,
    material_path: String,
    meshes: Vec<String>,
}

/// Compose the payload, asset and look layers of an asset.
pub fn compose_asset(request: &ComposeRequest, shaders: &ShaderRegistry) -> ComposeResult<ComposedAsset> {
    let name = sanitize_prim_name(&request.asset_name);
    let root_path = format!("/{}", name);

    // Payload layer
    let mut payload = UsdStage::open_or_create(request.payload_path(), UpAxis::Y)?;
    let root = ensure_root(&mut payload, &name, None)?;
    set_asset_info(root, &request.alembic_path, &request.asset_name);
    root.add_reference(SdfReference::new(
        request.alembic_path.as_str(),
        Some(request.base_prim_path.as_str()),
    ));
    payload.save()?;

    // Asset layer
    let mut asset = UsdStage::open_or_create(request.asset_path(), UpAxis::Y)?;
    let root = ensure_root(&mut asset, &name, Some("Xform"))?;
    root.metadata.kind = Some("component".to_string());
    set_asset_info(root, &request.alembic_path, &request.asset_name);

    // Look layer
    let mut looks = UsdStage::open_or_create(request.looks_path(), UpAxis::Y)?;
    looks.define_prim("/Looks", Some("Scope"))?;

    let materials = parse_looks_info(&request.looks_info_path)?;
    let mut bindings = Vec::with_capacity(materials.len());

    for info in &materials {
        let kind = resolve_shader(shaders, &info.material_type)?;
        let material_path = define_material(&mut looks, info, kind)?;

        let mut meshes = Vec::new();
        for mesh in &info.meshes {
            if let Some(mesh_path) = define_mesh_payload(&mut asset, request, &name, mesh)? {
                meshes.push(mesh_path);
            }
        }

        bindings.push(Binding {
            material: sanitize_prim_name(&info.shader_name),
            material_path,
            meshes,
        });
    }

    looks.save()?;

    let looks_scope = asset.define_prim("/Looks", Some("Scope"))?;
    looks_scope.add_reference(SdfReference::new(request.looks_reference(), Some("/Looks")));

    let root = asset
        .prim_mut(&root_path)
        .ok_or_else(|| UsdError::InvalidPath(root_path.clone()))?;
    for binding in &bindings {
        bind_collection(root, &root_path, binding);
    }

    asset.save()?;

    log::info!(
        target: LOG_TARGET,
        "Composed {} with {} materials",
        request.asset_path().display(),
        bindings.len()
    );

    Ok(ComposedAsset {
        payload_path: request.payload_path(),
        asset_path: request.asset_path(),
        looks_path: request.looks_path(),
        materials: bindings.into_iter().map(|b| b.material_path).collect(),
    })
}

fn resolve_shader(shaders: &ShaderRegistry, material_type: &str) -> ComposeResult<ShaderKind> {
    match shaders.shader_for(material_type) {
        Ok(kind) => Ok(kind),
        Err(RegistryError::UnknownName { .. }) => {
            log::warn!(
                target: LOG_TARGET,
                "Unknown material type '{}', using {}",
                material_type,
                FALLBACK_MATERIAL_TYPE
            );
            Ok(shaders.shader_for(FALLBACK_MATERIAL_TYPE)?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Return the root prim `/<name>`, defining it (and making it the default
/// prim) when the layer doesn't have it yet.
fn ensure_root<'a>(
    stage: &'a mut UsdStage,
    name: &str,
    type_name: Option<&str>,
) -> ComposeResult<&'a mut UsdPrimSpec> {
    let path = format!("/{}", name);
    if stage.prim(&path).is_none() {
        stage.define_prim(&path, type_name)?;
        stage.set_default_prim(&path)?;
    }
    Ok(stage.define_prim(&path, type_name)?)
}

fn set_asset_info(prim: &mut UsdPrimSpec, identifier: &str, name: &str) {
    prim.metadata.asset_info = Some(UsdAssetInfo {
        identifier: identifier.to_string(),
        name: name.to_string(),
    });
}

/// How a shader input gets its value.
enum InputSource {
    Value(UsdValue),
    Connection { prim: String, output: &'static str },
}

/// Define the material, its surface and displacement shaders and any
/// texture networks. Returns the material prim path.
fn define_material(stage: &mut UsdStage, info: &MaterialInfo, kind: ShaderKind) -> ComposeResult<String> {
    let mtl = sanitize_prim_name(&info.shader_name);
    let material_path = format!("/Looks/{}", mtl);

    let material = stage.define_prim(&material_path, Some("Material"))?;
    if let Some(class) = kind.material_class() {
        material.add_inherit(class);
    }

    // Texture networks first: the surface shader connects to them.
    let mut inputs = Vec::new();
    for param in &info.parameters {
        let Some(input) = kind.input_for(&param.name) else {
            log::debug!(target: LOG_TARGET, "{}: skipping parameter {}", mtl, param.name);
            continue;
        };
        match input_source(stage, &material_path, &mtl, kind, input, param)? {
            Some(source) => inputs.push((input, source)),
            None => log::warn!(
                target: LOG_TARGET,
                "{}: invalid value for {}, skipping",
                mtl,
                param.name
            ),
        }
    }

    let shader_name = match kind {
        ShaderKind::StandardMaterialX => format!("{}_standard_surface", mtl),
        ShaderKind::PreviewSurface => format!("{}_preview_surface", mtl),
    };
    let shader_path = format!("{}/{}", material_path, shader_name);
    let shader = stage.define_prim(&shader_path, Some("Shader"))?;
    shader.set_shader_id(kind.shader_id());
    for (input, source) in inputs {
        let attr = shader.create_input(input.name, input.kind.value_type());
        match source {
            InputSource::Value(value) => {
                attr.set(value);
            }
            InputSource::Connection { prim, output } => {
                attr.connect_to_source(&prim, output);
            }
        }
    }
    shader.create_output("surface", ValueType::Token);

    let displacement_path = match kind {
        ShaderKind::StandardMaterialX => {
            let path = format!("{}/Displacement", material_path);
            let displacement = stage.define_prim(&path, Some("Shader"))?;
            displacement.set_shader_id("ND_displacement_float");
            displacement.create_output("out", ValueType::Token);
            Some(path)
        }
        ShaderKind::PreviewSurface => None,
    };

    let material = stage
        .prim_mut(&material_path)
        .ok_or_else(|| UsdError::InvalidPath(material_path.clone()))?;
    let output_name = |terminal: &str| match kind.render_context() {
        Some(context) => format!("{}:{}", context, terminal),
        None => terminal.to_string(),
    };
    material
        .create_output(&output_name("surface"), ValueType::Token)
        .connect_to_source(&shader_path, "outputs:surface");
    if let Some(path) = displacement_path {
        material
            .create_output(&output_name("displacement"), ValueType::Token)
            .connect_to_source(&path, "outputs:out");
    }

    Ok(material_path)
}

/// Value or texture connection for one input. `None` when the value
/// doesn't fit the input.
fn input_source(
    stage: &mut UsdStage,
    material_path: &str,
    mtl: &str,
    kind: ShaderKind,
    input: ShaderInput,
    param: &ShaderParameter,
) -> ComposeResult<Option<InputSource>> {
    if let Some(texture) = &param.texture {
        if input.kind != ShaderParamKind::Bool {
            let prim = define_texture(stage, material_path, mtl, kind, input.name, &texture.path)?;
            let output = match input.kind {
                ShaderParamKind::Float => "outputs:r",
                _ => "outputs:rgb",
            };
            return Ok(Some(InputSource::Connection { prim, output }));
        }
    }

    let value = match input.kind {
        ShaderParamKind::Bool => param.value.as_bool().map(UsdValue::Bool),
        ShaderParamKind::Float => param.value.as_float().map(UsdValue::Float),
        ShaderParamKind::Color3 => param.value.as_triple().map(|v| UsdValue::Color3f(Vec3::from(v))),
        ShaderParamKind::Vector3 => param.value.as_triple().map(|v| UsdValue::Normal3f(Vec3::from(v))),
    };
    Ok(value.map(InputSource::Value))
}

/// Define a texture reader and its texcoord node under
/// `<material>/<mtl>Textures`. Returns the texture prim path.
fn define_texture(
    stage: &mut UsdStage,
    material_path: &str,
    mtl: &str,
    kind: ShaderKind,
    input_name: &str,
    texture_path: &str,
) -> ComposeResult<String> {
    let ids = kind.texture_ids();
    let scope_path = format!("{}/{}Textures", material_path, mtl);
    stage.define_prim(&scope_path, Some("Scope"))?;

    let uv_path = format!("{}/{}_UsdUVNode", scope_path, input_name);
    let uv = stage.define_prim(&uv_path, Some("Shader"))?;
    uv.set_shader_id(ids.texcoord);
    let uv_output = match kind {
        ShaderKind::StandardMaterialX => {
            uv.create_input("index", ValueType::Int).set(UsdValue::Int(0));
            uv.create_output("out", ValueType::Float2);
            "outputs:out"
        }
        ShaderKind::PreviewSurface => {
            uv.create_input("varname", ValueType::Token)
                .set(UsdValue::Token("st".to_string()));
            uv.create_output("result", ValueType::Float2);
            "outputs:result"
        }
    };

    let tex_path = format!("{}/{}_UsdUVTex", scope_path, input_name);
    let tex = stage.define_prim(&tex_path, Some("Shader"))?;
    tex.set_shader_id(ids.texture);
    tex.create_input("file", ValueType::Asset)
        .set(UsdValue::Asset(texture_path.to_string()));
    tex.create_input("wrapS", ValueType::Token)
        .set(UsdValue::Token("repeat".to_string()));
    tex.create_input("wrapT", ValueType::Token)
        .set(UsdValue::Token("repeat".to_string()));
    tex.create_output("a", ValueType::Float);

    if input_name.contains("normal") || input_name.contains("tangent") {
        tex.create_input("color_space", ValueType::String)
            .set(UsdValue::String("raw".to_string()));
        tex.create_input("scale", ValueType::Float4)
            .set(UsdValue::Float4(Vec4::new(2.0, 2.0, 2.0, 1.0)));
        tex.create_input("bias", ValueType::Float4)
            .set(UsdValue::Float4(Vec4::new(-1.0, -1.0, -1.0, 0.0)));
        tex.create_output("rgb", ValueType::Normal3f);
    } else {
        tex.create_input("color_space", ValueType::String)
            .set(UsdValue::String("sRGB".to_string()));
        tex.create_input("scale", ValueType::Float4)
            .set(UsdValue::Float4(Vec4::ONE));
        for channel in ["r", "g", "b"] {
            tex.create_output(channel, ValueType::Float);
        }
        tex.create_output("rgb", ValueType::Color3f);
    }

    tex.create_input("st", ValueType::Float2)
        .connect_to_source(&uv_path, uv_output);

    Ok(tex_path)
}

/// Define `/<name>/<mesh>` with a payload to the matching prim of the
/// payload layer. Returns `None` for mesh paths with no usable name.
fn define_mesh_payload(
    asset: &mut UsdStage,
    request: &ComposeRequest,
    name: &str,
    mesh: &str,
) -> ComposeResult<Option<String>> {
    let parts: Vec<&str> = mesh.split('|').collect();
    let Some(leaf) = parts.last().map(|p| sanitize_prim_name(p)).filter(|p| !p.is_empty()) else {
        log::warn!(target: LOG_TARGET, "Skipping mesh with an empty name: '{}'", mesh);
        return Ok(None);
    };

    // `|<root>|<group>...|<mesh>`: keep the groups below the root.
    let groups: Vec<String> = if parts.len() > 3 {
        parts[2..parts.len() - 1]
            .iter()
            .map(|p| sanitize_prim_name(p))
            .collect()
    } else {
        Vec::new()
    };
    let payload_prim = if groups.is_empty() {
        format!("/{}", name)
    } else {
        format!("/{}/{}", name, groups.join("/"))
    };

    let mesh_path = format!("/{}/{}", name, leaf);
    if asset.prim(&mesh_path).is_none() {
        let prim = asset.define_prim(&mesh_path, Some("Mesh"))?;
        prim.add_payload(SdfReference::new(request.payload_reference(), Some(payload_prim.as_str())));
        prim.apply_api_schema("MaterialBindingAPI");
    }
    Ok(Some(mesh_path))
}

/// Bind a material to its meshes through a collection on the root prim.
fn bind_collection(root: &mut UsdPrimSpec, root_path: &str, binding: &Binding) {
    let collection = format!("mat_bind_{}", binding.material);

    root.apply_api_schema("MaterialBindingAPI");
    root.apply_api_schema(&format!("CollectionAPI:{}", collection));

    let includes = format!("collection:{}:includes", collection);
    root.create_relationship(&includes);
    for mesh in &binding.meshes {
        root.add_target(&includes, mesh);
    }

    let rule = root.create_attribute(&format!("collection:{}:expansionRule", collection), ValueType::Token);
    rule.uniform = true;
    rule.set(UsdValue::Token("expandPrims".to_string()));

    let binding_rel = format!("material:binding:collection:{}", collection);
    root.add_target(&binding_rel, &format!("{}.collection:{}", root_path, collection));
    root.add_target(&binding_rel, &binding.material_path);
}

/// Replace characters that are not valid in a prim name.
fn sanitize_prim_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}
