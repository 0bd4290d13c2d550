//! Published entity records.

use ptx_usd::{MaterialInfo, ShaderParameter};
use serde::{Deserialize, Serialize};

/// Name, type, process and version of a published asset, plus its lock.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub name: String,
    pub asset_type: String,
    pub process: String,
    pub version: String,

    /// Upper-cased identity of the artist holding the asset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_owner: Option<String>,

    #[serde(default)]
    pub detail: AssetDetail,
}

impl AssetInfo {
    pub fn new(
        name: impl Into<String>,
        asset_type: impl Into<String>,
        process: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            asset_type: asset_type.into(),
            process: process.into(),
            version: version.into(),
            lock_owner: None,
            detail: AssetDetail::Generic,
        }
    }

    pub fn with_lock_owner(mut self, owner: impl Into<String>) -> Self {
        self.lock_owner = Some(owner.into());
        self
    }

    pub fn with_detail(mut self, detail: AssetDetail) -> Self {
        self.detail = detail;
        self
    }

    /// A non-empty lock owner is recorded.
    pub fn is_locked(&self) -> bool {
        self.lock_owner.as_deref().is_some_and(|owner| !owner.is_empty())
    }

    /// Locked, and not by `user` (compared upper-cased).
    pub fn is_locked_by_other(&self, user: &str) -> bool {
        match self.lock_owner.as_deref() {
            Some(owner) if !owner.is_empty() => owner != user.to_uppercase(),
            _ => false,
        }
    }

    /// Root node name of a model asset, when known.
    pub fn root_node(&self) -> Option<&str> {
        match &self.detail {
            AssetDetail::Model { root_node, .. } if !root_node.is_empty() => Some(root_node.as_str()),
            _ => None,
        }
    }
}

/// Extra fields of a publish type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetDetail {
    #[default]
    Generic,

    Model {
        #[serde(default)]
        root_node: String,
        /// Full paths of the exported meshes
        #[serde(default)]
        geom_list: Vec<String>,
    },

    Look {
        #[serde(default)]
        shaders: Vec<ShaderInfo>,
    },
}

/// One shader of a look and the meshes it is assigned to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShaderInfo {
    pub shader_name: String,
    pub material_type: String,
    #[serde(default)]
    pub attributes: Vec<ShaderParameter>,
    #[serde(default)]
    pub assignment: Vec<String>,
}

impl ShaderInfo {
    pub fn to_material_info(&self) -> MaterialInfo {
        MaterialInfo {
            material_type: self.material_type.clone(),
            shader_name: self.shader_name.clone(),
            meshes: self.assignment.clone(),
            parameters: self.attributes.clone(),
            sg_node: String::new(),
        }
    }
}

impl From<MaterialInfo> for ShaderInfo {
    fn from(material: MaterialInfo) -> Self {
        Self {
            shader_name: material.shader_name,
            material_type: material.material_type,
            attributes: material.parameters,
            assignment: material.meshes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptx_usd::ParamValue;

    #[test]
    fn test_lock_rules() {
        let asset = AssetInfo::new("Alien", "Character", "MDL", "v003");
        assert!(!asset.is_locked());
        assert!(!asset.is_locked_by_other("jdoe"));

        let asset = asset.with_lock_owner("JDOE");
        assert!(asset.is_locked());
        assert!(!asset.is_locked_by_other("jdoe"));
        assert!(asset.is_locked_by_other("asmith"));

        let asset = AssetInfo::new("Alien", "Character", "MDL", "v003").with_lock_owner("");
        assert!(!asset.is_locked_by_other("asmith"));
    }

    #[test]
    fn test_detail_serialization() {
        let asset = AssetInfo::new("Alien", "Character", "MDL", "v003").with_detail(AssetDetail::Model {
            root_node: "Alien".to_string(),
            geom_list: vec!["|Alien|body_GEO|body_GEOShape".to_string()],
        });

        let json = serde_json::to_value(&asset).unwrap();
        assert_eq!(json["detail"]["kind"], "model");
        assert_eq!(json.get("lock_owner"), None);

        let back: AssetInfo = serde_json::from_value(json).unwrap();
        assert_eq!(back.root_node(), Some("Alien"));
    }

    #[test]
    fn test_shader_to_material() {
        let shader = ShaderInfo {
            shader_name: "skin_MTL".to_string(),
            material_type: "aiStandardSurface".to_string(),
            attributes: vec![ShaderParameter {
                name: "base".to_string(),
                value: ParamValue::Number(0.8),
                texture: None,
            }],
            assignment: vec!["|Alien|body_GEO".to_string()],
        };

        let material = shader.to_material_info();
        assert_eq!(material.meshes, shader.assignment);
        assert_eq!(material.parameters.len(), 1);
        assert_eq!(ShaderInfo::from(material), shader);
    }
}
