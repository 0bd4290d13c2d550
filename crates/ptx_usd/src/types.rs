//! USD layer types.
//!
//! These types hold the prims, properties and composition metadata of a
//! single layer as it is authored, before serialization to USDA.

use glam::{Vec2, Vec3, Vec4};

/// How a prim spec is introduced in the layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Specifier {
    Def,
    Over,
    Class,
}

impl Specifier {
    pub fn keyword(self) -> &'static str {
        match self {
            Specifier::Def => "def",
            Specifier::Over => "over",
            Specifier::Class => "class",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "def" => Some(Specifier::Def),
            "over" => Some(Specifier::Over),
            "class" => Some(Specifier::Class),
            _ => None,
        }
    }
}

/// Stage up axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpAxis {
    #[default]
    Y,
    Z,
}

impl UpAxis {
    pub fn token(self) -> &'static str {
        match self {
            UpAxis::Y => "Y",
            UpAxis::Z => "Z",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "Y" => Some(UpAxis::Y),
            "Z" => Some(UpAxis::Z),
            _ => None,
        }
    }
}

/// Scalar type of an attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    Bool,
    Int,
    Float,
    Float2,
    Float4,
    Color3f,
    Normal3f,
    Vector3f,
    Token,
    String,
    Asset,
}

impl ValueType {
    /// USDA type name.
    pub fn type_name(self) -> &'static str {
        match self {
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Float2 => "float2",
            ValueType::Float4 => "float4",
            ValueType::Color3f => "color3f",
            ValueType::Normal3f => "normal3f",
            ValueType::Vector3f => "vector3f",
            ValueType::Token => "token",
            ValueType::String => "string",
            ValueType::Asset => "asset",
        }
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "bool" => Some(ValueType::Bool),
            "int" => Some(ValueType::Int),
            "float" => Some(ValueType::Float),
            "float2" => Some(ValueType::Float2),
            "float4" => Some(ValueType::Float4),
            "color3f" => Some(ValueType::Color3f),
            "normal3f" => Some(ValueType::Normal3f),
            "vector3f" => Some(ValueType::Vector3f),
            "token" => Some(ValueType::Token),
            "string" => Some(ValueType::String),
            "asset" => Some(ValueType::Asset),
            _ => None,
        }
    }
}

/// A typed attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum UsdValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Float2(Vec2),
    Float4(Vec4),
    Color3f(Vec3),
    Normal3f(Vec3),
    Vector3f(Vec3),
    Token(String),
    String(String),
    /// Asset path (`@path@`)
    Asset(String),
}

impl UsdValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            UsdValue::Bool(_) => ValueType::Bool,
            UsdValue::Int(_) => ValueType::Int,
            UsdValue::Float(_) => ValueType::Float,
            UsdValue::Float2(_) => ValueType::Float2,
            UsdValue::Float4(_) => ValueType::Float4,
            UsdValue::Color3f(_) => ValueType::Color3f,
            UsdValue::Normal3f(_) => ValueType::Normal3f,
            UsdValue::Vector3f(_) => ValueType::Vector3f,
            UsdValue::Token(_) => ValueType::Token,
            UsdValue::String(_) => ValueType::String,
            UsdValue::Asset(_) => ValueType::Asset,
        }
    }
}

/// An attribute: declaration plus optional default value and connection.
#[derive(Clone, Debug, PartialEq)]
pub struct UsdAttribute {
    /// Full property name (e.g. `inputs:base_color`)
    pub name: String,

    pub value_type: ValueType,

    /// Authored with the `uniform` variability
    pub uniform: bool,

    /// Default value
    pub value: Option<UsdValue>,

    /// Connection source path (e.g. `/Looks/Mat/Tex.outputs:rgb`)
    pub connection: Option<String>,
}

impl UsdAttribute {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            uniform: false,
            value: None,
            connection: None,
        }
    }

    /// Set the default value. The declared type follows the value.
    pub fn set(&mut self, value: UsdValue) -> &mut Self {
        self.value_type = value.value_type();
        self.value = Some(value);
        self
    }

    /// Connect this attribute to `<prim_path>.<output>`.
    pub fn connect_to_source(&mut self, prim_path: &str, output: &str) -> &mut Self {
        self.connection = Some(format!("{}.{}", prim_path, output));
        self
    }
}

/// A relationship with its targets.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UsdRelationship {
    pub name: String,
    pub targets: Vec<String>,
}

/// A reference or payload arc: `@asset@</prim>`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SdfReference {
    /// Layer path (relative or absolute)
    pub asset_path: String,

    /// Optional prim path inside the target layer
    pub prim_path: Option<String>,
}

impl SdfReference {
    pub fn new(asset_path: impl Into<String>, prim_path: Option<&str>) -> Self {
        Self {
            asset_path: asset_path.into(),
            prim_path: prim_path.map(str::to_string),
        }
    }
}

/// The `assetInfo` dictionary of a model prim.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UsdAssetInfo {
    pub identifier: String,
    pub name: String,
}

/// Prim metadata authored in the parenthesised block after `def`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrimMetadata {
    /// Model kind (e.g. `component`)
    pub kind: Option<String>,

    pub asset_info: Option<UsdAssetInfo>,

    /// `prepend references`
    pub references: Vec<SdfReference>,

    /// `prepend payload`
    pub payloads: Vec<SdfReference>,

    /// `prepend inherits`
    pub inherits: Vec<String>,

    /// `prepend apiSchemas`
    pub api_schemas: Vec<String>,
}

impl PrimMetadata {
    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.asset_info.is_none()
            && self.references.is_empty()
            && self.payloads.is_empty()
            && self.inherits.is_empty()
            && self.api_schemas.is_empty()
    }
}

/// A prim spec and its subtree.
#[derive(Clone, Debug, PartialEq)]
pub struct UsdPrimSpec {
    pub specifier: Specifier,

    /// Schema type (e.g. `Xform`, `Material`); `None` for typeless prims
    pub type_name: Option<String>,

    /// Prim name (last component of the path)
    pub name: String,

    pub metadata: PrimMetadata,

    pub attributes: Vec<UsdAttribute>,

    pub relationships: Vec<UsdRelationship>,

    /// Child prims
    pub children: Vec<UsdPrimSpec>,
}

impl UsdPrimSpec {
    pub fn new(specifier: Specifier, type_name: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            specifier,
            type_name: type_name.map(str::to_string),
            name: name.into(),
            metadata: PrimMetadata::default(),
            attributes: Vec::new(),
            relationships: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn child(&self, name: &str) -> Option<&UsdPrimSpec> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut UsdPrimSpec> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&UsdAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Get or create an attribute of the given type.
    pub fn create_attribute(&mut self, name: &str, value_type: ValueType) -> &mut UsdAttribute {
        let index = match self.attributes.iter().position(|a| a.name == name) {
            Some(index) => index,
            None => {
                self.attributes.push(UsdAttribute::new(name, value_type));
                self.attributes.len() - 1
            }
        };
        &mut self.attributes[index]
    }

    /// Author a default value, creating the attribute if needed.
    pub fn set_attribute(&mut self, name: &str, value: UsdValue) -> &mut UsdAttribute {
        let attr = self.create_attribute(name, value.value_type());
        attr.set(value);
        attr
    }

    /// Author a `uniform token info:id` shader identifier.
    pub fn set_shader_id(&mut self, id: &str) {
        let attr = self.set_attribute("info:id", UsdValue::Token(id.to_string()));
        attr.uniform = true;
    }

    /// `inputs:<name>`
    pub fn create_input(&mut self, name: &str, value_type: ValueType) -> &mut UsdAttribute {
        self.create_attribute(&format!("inputs:{}", name), value_type)
    }

    /// `outputs:<name>`
    pub fn create_output(&mut self, name: &str, value_type: ValueType) -> &mut UsdAttribute {
        self.create_attribute(&format!("outputs:{}", name), value_type)
    }

    pub fn relationship(&self, name: &str) -> Option<&UsdRelationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Get or create a relationship.
    pub fn create_relationship(&mut self, name: &str) -> &mut UsdRelationship {
        let index = match self.relationships.iter().position(|r| r.name == name) {
            Some(index) => index,
            None => {
                self.relationships.push(UsdRelationship {
                    name: name.to_string(),
                    targets: Vec::new(),
                });
                self.relationships.len() - 1
            }
        };
        &mut self.relationships[index]
    }

    /// Add a relationship target unless it is already present.
    pub fn add_target(&mut self, relationship: &str, target: &str) {
        let rel = self.create_relationship(relationship);
        if !rel.targets.iter().any(|t| t == target) {
            rel.targets.push(target.to_string());
        }
    }

    pub fn has_authored_references(&self) -> bool {
        !self.metadata.references.is_empty()
    }

    /// Find an existing reference with the same asset and prim path, or
    /// prepend a new one to the front of the list.
    pub fn add_reference(&mut self, reference: SdfReference) -> &SdfReference {
        let index = match self.metadata.references.iter().position(|r| *r == reference) {
            Some(index) => index,
            None => {
                self.metadata.references.insert(0, reference);
                0
            }
        };
        &self.metadata.references[index]
    }

    /// Add a payload arc unless an identical one exists.
    pub fn add_payload(&mut self, payload: SdfReference) {
        if !self.metadata.payloads.contains(&payload) {
            self.metadata.payloads.push(payload);
        }
    }

    pub fn add_inherit(&mut self, path: &str) {
        if !self.metadata.inherits.iter().any(|p| p == path) {
            self.metadata.inherits.push(path.to_string());
        }
    }

    pub fn apply_api_schema(&mut self, schema: &str) {
        if !self.metadata.api_schemas.iter().any(|s| s == schema) {
            self.metadata.api_schemas.push(schema.to_string());
        }
    }

    /// Number of prims in this subtree, including this one.
    pub fn prim_count(&self) -> usize {
        1 + self.children.iter().map(UsdPrimSpec::prim_count).sum::<usize>()
    }
}

/// Layer-level metadata.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerMetadata {
    pub default_prim: Option<String>,
    pub up_axis: Option<UpAxis>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_get_or_create() {
        let mut prim = UsdPrimSpec::new(Specifier::Def, Some("Shader"), "Tex");
        prim.create_input("file", ValueType::Asset);
        prim.create_input("file", ValueType::Asset)
            .set(UsdValue::Asset("tex/base.exr".to_string()));

        assert_eq!(prim.attributes.len(), 1);
        let attr = prim.attribute("inputs:file").unwrap();
        assert_eq!(attr.value, Some(UsdValue::Asset("tex/base.exr".to_string())));
    }

    #[test]
    fn test_references_are_deduplicated_and_prepended() {
        let mut prim = UsdPrimSpec::new(Specifier::Def, None, "Alien");
        prim.add_reference(SdfReference::new("a.abc", Some("/render_GRP")));
        prim.add_reference(SdfReference::new("b.abc", None));
        prim.add_reference(SdfReference::new("a.abc", Some("/render_GRP")));

        assert_eq!(prim.metadata.references.len(), 2);
        assert_eq!(prim.metadata.references[0].asset_path, "b.abc");
        assert!(prim.has_authored_references());
    }

    #[test]
    fn test_relationship_targets_unique() {
        let mut prim = UsdPrimSpec::new(Specifier::Def, Some("Xform"), "Alien");
        prim.add_target("collection:body:includes", "/Alien/body");
        prim.add_target("collection:body:includes", "/Alien/body");
        prim.add_target("collection:body:includes", "/Alien/head");

        let rel = prim.relationship("collection:body:includes").unwrap();
        assert_eq!(rel.targets, vec!["/Alien/body", "/Alien/head"]);
    }

    #[test]
    fn test_value_type_names() {
        for ty in [ValueType::Bool, ValueType::Color3f, ValueType::Float4, ValueType::Asset] {
            assert_eq!(ValueType::from_type_name(ty.type_name()), Some(ty));
        }
        assert_eq!(ValueType::from_type_name("matrix4d"), None);
    }
}
