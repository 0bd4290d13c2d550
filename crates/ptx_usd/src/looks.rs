//! Looks-info documents.
//!
//! A look publish records, per material, the host shader type, its
//! parameters (optionally driven by a texture) and the meshes it is
//! assigned to. The document is a JSON array:
//!
//! ```json
//! [
//!     {
//!         "material_type": "aiStandardSurface",
//!         "shader_name": "skin_MTL",
//!         "meshes": ["|Alien|render_GRP|body_GEO"],
//!         "parameters": [
//!             { "name": "baseColor", "value": [0.8, 0.6, 0.5],
//!               "texture": { "path": "tex/skin_base.exr" } },
//!             { "name": "specularRoughness", "value": 0.35 }
//!         ],
//!         "sg_node": "skin_SG"
//!     }
//! ]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reading or writing looks-info documents.
#[derive(Error, Debug)]
pub enum LooksError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed looks info {source_name}: {error}")]
    Malformed {
        source_name: String,
        #[source]
        error: serde_json::Error,
    },
}

pub type LooksResult<T> = Result<T, LooksError>;

/// One material of a look.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialInfo {
    /// Host shader type (e.g. `aiStandardSurface`)
    pub material_type: String,

    pub shader_name: String,

    /// Full DAG paths of the assigned meshes
    #[serde(default)]
    pub meshes: Vec<String>,

    #[serde(default)]
    pub parameters: Vec<ShaderParameter>,

    /// Shading group the material is connected to
    #[serde(default)]
    pub sg_node: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShaderParameter {
    pub name: String,
    pub value: ParamValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<TextureRef>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureRef {
    pub path: String,
}

/// A parameter value as the host reported it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    Triple([f64; 3]),
    Text(String),
}

impl ParamValue {
    /// Booleans, and the strings `"true"`/`"false"`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            ParamValue::Text(t) => match t.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            ParamValue::Number(n) => Some(*n as f32),
            _ => None,
        }
    }

    /// Triples; a scalar is broadcast to all three components.
    pub fn as_triple(&self) -> Option<[f32; 3]> {
        match self {
            ParamValue::Triple([x, y, z]) => Some([*x as f32, *y as f32, *z as f32]),
            ParamValue::Number(n) => Some([*n as f32; 3]),
            _ => None,
        }
    }
}

/// Read a looks-info document from disk.
pub fn parse_looks_info<P: AsRef<Path>>(path: P) -> LooksResult<Vec<MaterialInfo>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| LooksError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_looks_info_str(&content, &path.to_string_lossy())
}

pub fn parse_looks_info_str(content: &str, source: &str) -> LooksResult<Vec<MaterialInfo>> {
    serde_json::from_str(content).map_err(|error| LooksError::Malformed {
        source_name: source.to_string(),
        error,
    })
}

/// Write a looks-info document, creating parent directories.
pub fn write_looks_info<P: AsRef<Path>>(path: P, materials: &[MaterialInfo]) -> LooksResult<()> {
    let path = path.as_ref();
    let io_err = |source| LooksError::Io {
        path: path.to_path_buf(),
        source,
    };

    let content = serde_json::to_string_pretty(materials).map_err(|error| LooksError::Malformed {
        source_name: path.to_string_lossy().into_owned(),
        error,
    })?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    std::fs::write(path, content).map_err(io_err)
}
