//! USDA (ASCII) layer parser.
//!
//! Line-by-line parsing of the subset produced by `write_usda`. Enough to
//! reopen a layer this crate authored and add to it.
//!
//! # Supported Syntax
//!
//! - Layer metadata: `defaultPrim`, `upAxis`
//! - `def|over|class [Type] "Name" ( metadata ) { ... }`
//! - Prim metadata: `kind`, `assetInfo`, `apiSchemas`, `inherits`,
//!   `references`, `payload` (with `prepend`/`append` list ops)
//! - Attributes: `[uniform] type name [= value]`, `type name.connect = <path>`
//! - Relationships: `rel name [= <path> | [<path>, ...]]`

use std::collections::VecDeque;

use glam::{Vec2, Vec3, Vec4};
use thiserror::Error;

use crate::types::*;

/// Errors that can occur during USDA parsing.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Unexpected end of file")]
    UnexpectedEof,

    #[error("Invalid number format: {0}")]
    InvalidNumber(String),

    #[error("Unclosed block starting at line {0}")]
    UnclosedBlock(usize),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// A parsed layer: metadata plus root prims.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedLayer {
    pub metadata: LayerMetadata,
    pub prims: Vec<UsdPrimSpec>,
}

/// USDA file parser.
pub struct UsdaParser {
    lines: VecDeque<(usize, String)>,
    current_line: usize,
}

impl UsdaParser {
    /// Create a new parser from file contents.
    pub fn new(content: &str) -> Self {
        let lines: VecDeque<_> = content
            .lines()
            .enumerate()
            .map(|(i, s)| (i + 1, s.to_string()))
            .collect();

        Self {
            lines,
            current_line: 0,
        }
    }

    /// Parse the USDA content.
    pub fn parse(&mut self) -> ParseResult<ParsedLayer> {
        let mut layer = ParsedLayer::default();

        self.skip_blank();
        let has_layer_metadata = self
            .lines
            .front()
            .is_some_and(|(_, line)| line.trim() == "(");
        if has_layer_metadata {
            self.lines.pop_front();
            self.parse_layer_metadata(&mut layer.metadata)?;
        }

        while let Some((line_num, line)) = self.next_statement() {
            let trimmed = line.trim();
            if !is_prim_header(trimmed) {
                return Err(ParseError::Parse {
                    line: line_num,
                    message: format!("Expected prim definition, found: {}", trimmed),
                });
            }
            layer.prims.push(self.parse_prim(trimmed, line_num)?);
        }

        Ok(layer)
    }

    /// Drop blank and comment lines (the `#usda` header included).
    fn skip_blank(&mut self) {
        while let Some((_, line)) = self.lines.front() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                self.lines.pop_front();
            } else {
                break;
            }
        }
    }

    /// Next non-empty, non-comment line.
    fn next_statement(&mut self) -> Option<(usize, String)> {
        self.skip_blank();
        let (num, line) = self.lines.pop_front()?;
        self.current_line = num;
        Some((num, line))
    }

    fn parse_layer_metadata(&mut self, metadata: &mut LayerMetadata) -> ParseResult<()> {
        loop {
            let (_, line) = self.next_statement().ok_or(ParseError::UnexpectedEof)?;
            let trimmed = line.trim();

            if trimmed == ")" {
                return Ok(());
            }

            if let Some(value) = metadata_value(trimmed, "defaultPrim") {
                metadata.default_prim = Some(self.parse_quoted(value)?);
            } else if let Some(value) = metadata_value(trimmed, "upAxis") {
                let token = self.parse_quoted(value)?;
                metadata.up_axis = UpAxis::from_token(&token);
            } else {
                log::debug!("Skipping layer metadata: {}", trimmed);
            }
        }
    }

    /// Parse a prim whose header line has already been consumed.
    fn parse_prim(&mut self, header: &str, start_line: usize) -> ParseResult<UsdPrimSpec> {
        let (specifier, type_name, name, has_metadata) = self.parse_header(header, start_line)?;
        let mut prim = UsdPrimSpec::new(specifier, type_name.as_deref(), name);

        if has_metadata {
            self.parse_prim_metadata(&mut prim.metadata, start_line)?;
        }

        self.expect_opening_brace(start_line)?;

        loop {
            let (line_num, line) = self
                .next_statement()
                .ok_or(ParseError::UnclosedBlock(start_line))?;
            let trimmed = line.trim();

            if trimmed == "}" {
                break;
            }

            if is_prim_header(trimmed) {
                let child = self.parse_prim(trimmed, line_num)?;
                prim.children.push(child);
                continue;
            }

            if let Some(rest) = trimmed.strip_prefix("rel ") {
                self.parse_relationship(&mut prim, rest)?;
                continue;
            }

            self.parse_attribute(&mut prim, trimmed)?;
        }

        Ok(prim)
    }

    /// Split `def Type "Name" (` into its parts.
    fn parse_header(
        &self,
        header: &str,
        line: usize,
    ) -> ParseResult<(Specifier, Option<String>, String, bool)> {
        let keyword = header.split_whitespace().next().unwrap_or("");
        let specifier = Specifier::from_keyword(keyword).ok_or_else(|| ParseError::Parse {
            line,
            message: format!("Unknown specifier: {}", keyword),
        })?;

        let rest = &header[keyword.len()..];
        let quote_start = rest.find('"').ok_or_else(|| ParseError::Parse {
            line,
            message: format!("Missing prim name in: {}", header),
        })?;
        let after_quote = &rest[quote_start + 1..];
        let quote_end = after_quote.find('"').ok_or_else(|| ParseError::Parse {
            line,
            message: format!("Unterminated prim name in: {}", header),
        })?;

        let type_name = rest[..quote_start].trim();
        let type_name = (!type_name.is_empty()).then(|| type_name.to_string());
        let name = after_quote[..quote_end].to_string();
        let tail = after_quote[quote_end + 1..].trim();

        Ok((specifier, type_name, name, tail.starts_with('(') && tail != "()"))
    }

    /// Consume a prim metadata block up to its closing `)`.
    fn parse_prim_metadata(&mut self, metadata: &mut PrimMetadata, start_line: usize) -> ParseResult<()> {
        loop {
            let (_, line) = self
                .next_statement()
                .ok_or(ParseError::UnclosedBlock(start_line))?;
            let trimmed = strip_list_op(line.trim());

            if trimmed == ")" {
                return Ok(());
            }

            if let Some(value) = metadata_value(trimmed, "kind") {
                metadata.kind = Some(self.parse_quoted(value)?);
            } else if trimmed.starts_with("assetInfo") {
                metadata.asset_info = Some(self.parse_asset_info(start_line)?);
            } else if let Some(value) = metadata_value(trimmed, "apiSchemas") {
                metadata.api_schemas = quoted_strings(value);
            } else if let Some(value) = metadata_value(trimmed, "inherits") {
                metadata.inherits = bracketed_paths(value);
            } else if let Some(value) = metadata_value(trimmed, "references") {
                metadata.references = self.parse_arcs(value)?;
            } else if let Some(value) = metadata_value(trimmed, "payload") {
                metadata.payloads = self.parse_arcs(value)?;
            } else {
                log::debug!("Skipping prim metadata: {}", trimmed);
            }
        }
    }

    /// Parse the body of an `assetInfo = {` dictionary.
    fn parse_asset_info(&mut self, start_line: usize) -> ParseResult<UsdAssetInfo> {
        let mut info = UsdAssetInfo::default();

        loop {
            let (_, line) = self
                .next_statement()
                .ok_or(ParseError::UnclosedBlock(start_line))?;
            let trimmed = line.trim();

            if trimmed == "}" {
                return Ok(info);
            }

            if let Some(value) = metadata_value(trimmed, "asset identifier") {
                info.identifier = self
                    .parse_arcs(value)?
                    .into_iter()
                    .next()
                    .map(|arc| arc.asset_path)
                    .unwrap_or_default();
            } else if let Some(value) = metadata_value(trimmed, "string name") {
                info.name = self.parse_quoted(value)?;
            }
        }
    }

    /// Expect and consume an opening brace.
    fn expect_opening_brace(&mut self, start_line: usize) -> ParseResult<()> {
        match self.next_statement() {
            Some((_, line)) if line.trim() == "{" => Ok(()),
            Some((num, line)) => Err(ParseError::Parse {
                line: num,
                message: format!("Expected opening brace, found: {}", line.trim()),
            }),
            None => Err(ParseError::UnclosedBlock(start_line)),
        }
    }

    /// Parse `name [= targets]` after the `rel` keyword.
    fn parse_relationship(&self, prim: &mut UsdPrimSpec, rest: &str) -> ParseResult<()> {
        let (name, value) = split_assignment(rest);
        if name.is_empty() {
            return Err(ParseError::Parse {
                line: self.current_line,
                message: "Relationship without a name".to_string(),
            });
        }

        let rel = prim.create_relationship(name);
        if let Some(value) = value {
            rel.targets = bracketed_paths(value);
        }
        Ok(())
    }

    /// Parse an attribute declaration, default value or connection.
    fn parse_attribute(&self, prim: &mut UsdPrimSpec, line: &str) -> ParseResult<()> {
        let (decl, value) = split_assignment(line);

        let mut words = decl.split_whitespace().peekable();
        let mut uniform = false;
        while let Some(&word) = words.peek() {
            match word {
                "uniform" => uniform = true,
                "custom" | "varying" => {}
                _ => break,
            }
            words.next();
        }

        let type_word = words.next().unwrap_or("");
        let value_type = ValueType::from_type_name(type_word).ok_or_else(|| ParseError::Parse {
            line: self.current_line,
            message: format!("Unsupported attribute type '{}' in: {}", type_word, line),
        })?;

        let name = words.next().ok_or_else(|| ParseError::Parse {
            line: self.current_line,
            message: format!("Attribute without a name: {}", line),
        })?;

        if let Some(base) = name.strip_suffix(".connect") {
            let source = value
                .and_then(|v| bracketed_paths(v).into_iter().next())
                .ok_or_else(|| ParseError::Parse {
                    line: self.current_line,
                    message: format!("Connection without a source: {}", line),
                })?;
            let attr = prim.create_attribute(base, value_type);
            attr.uniform |= uniform;
            attr.connection = Some(source);
            return Ok(());
        }

        let parsed = match value {
            Some(v) => Some(self.parse_value(value_type, v)?),
            None => None,
        };

        let attr = prim.create_attribute(name, value_type);
        attr.uniform |= uniform;
        if let Some(parsed) = parsed {
            attr.set(parsed);
        }
        Ok(())
    }

    /// Parse a value of a known type.
    fn parse_value(&self, value_type: ValueType, text: &str) -> ParseResult<UsdValue> {
        let value = match value_type {
            ValueType::Bool => match text {
                "1" | "true" => UsdValue::Bool(true),
                "0" | "false" => UsdValue::Bool(false),
                other => return Err(ParseError::InvalidNumber(other.to_string())),
            },
            ValueType::Int => UsdValue::Int(
                text.parse::<i32>()
                    .map_err(|_| ParseError::InvalidNumber(text.to_string()))?,
            ),
            ValueType::Float => UsdValue::Float(parse_float(text)?),
            ValueType::Float2 => {
                let v = self.parse_tuple(text, 2)?;
                UsdValue::Float2(Vec2::new(v[0], v[1]))
            }
            ValueType::Float4 => {
                let v = self.parse_tuple(text, 4)?;
                UsdValue::Float4(Vec4::new(v[0], v[1], v[2], v[3]))
            }
            ValueType::Color3f => UsdValue::Color3f(self.parse_vec3(text)?),
            ValueType::Normal3f => UsdValue::Normal3f(self.parse_vec3(text)?),
            ValueType::Vector3f => UsdValue::Vector3f(self.parse_vec3(text)?),
            ValueType::Token => UsdValue::Token(self.parse_quoted(text)?),
            ValueType::String => UsdValue::String(self.parse_quoted(text)?),
            ValueType::Asset => {
                let arc = self.parse_arcs(text)?.into_iter().next().ok_or_else(|| {
                    ParseError::Parse {
                        line: self.current_line,
                        message: format!("Expected @asset@ in: {}", text),
                    }
                })?;
                UsdValue::Asset(arc.asset_path)
            }
        };
        Ok(value)
    }

    fn parse_vec3(&self, text: &str) -> ParseResult<Vec3> {
        let v = self.parse_tuple(text, 3)?;
        Ok(Vec3::new(v[0], v[1], v[2]))
    }

    /// Parse a tuple like `(1, 2, 3)` with exactly `len` components.
    fn parse_tuple(&self, text: &str, len: usize) -> ParseResult<Vec<f32>> {
        let start = text.find('(').ok_or_else(|| ParseError::Parse {
            line: self.current_line,
            message: format!("Expected '(' in: {}", text),
        })?;
        let inner = &text[start + 1..];
        let end = inner.rfind(')').ok_or_else(|| ParseError::Parse {
            line: self.current_line,
            message: format!("Expected ')' after '(' in: {}", text),
        })?;

        let parts = inner[..end]
            .split(',')
            .map(parse_float)
            .collect::<ParseResult<Vec<f32>>>()?;

        if parts.len() != len {
            return Err(ParseError::Parse {
                line: self.current_line,
                message: format!("Expected {} components, got {}", len, parts.len()),
            });
        }
        Ok(parts)
    }

    /// Parse a quoted string `"value"`.
    fn parse_quoted(&self, text: &str) -> ParseResult<String> {
        quoted_strings(text)
            .into_iter()
            .next()
            .ok_or_else(|| ParseError::Parse {
                line: self.current_line,
                message: format!("Expected quoted string in: {}", text),
            })
    }

    /// Parse arcs like `[@a.usda@</Prim>, @b.usda@]`.
    fn parse_arcs(&self, text: &str) -> ParseResult<Vec<SdfReference>> {
        let mut arcs = Vec::new();
        let mut rest = text;

        while let Some(start) = rest.find('@') {
            let after = &rest[start + 1..];
            let end = after.find('@').ok_or_else(|| ParseError::Parse {
                line: self.current_line,
                message: format!("Unterminated asset path in: {}", text),
            })?;
            let asset_path = after[..end].to_string();
            rest = &after[end + 1..];

            let mut prim_path = None;
            let trimmed = rest.trim_start();
            if let Some(inner) = trimmed.strip_prefix('<') {
                if let Some(close) = inner.find('>') {
                    prim_path = Some(inner[..close].to_string());
                    rest = &inner[close + 1..];
                }
            }

            arcs.push(SdfReference {
                asset_path,
                prim_path,
            });
        }

        Ok(arcs)
    }
}

fn is_prim_header(line: &str) -> bool {
    ["def ", "over ", "class "].iter().any(|k| line.starts_with(k))
}

/// Drop a leading list op (`prepend`, `append`, ...).
fn strip_list_op(line: &str) -> &str {
    for op in ["prepend ", "append ", "add ", "delete ", "reorder "] {
        if let Some(rest) = line.strip_prefix(op) {
            return rest;
        }
    }
    line
}

/// Return the right-hand side of `key = value`.
fn metadata_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(key)?.trim_start();
    rest.strip_prefix('=').map(str::trim)
}

/// Split `decl = value` at the first `=`.
fn split_assignment(line: &str) -> (&str, Option<&str>) {
    match line.find('=') {
        Some(i) => (line[..i].trim(), Some(line[i + 1..].trim())),
        None => (line.trim(), None),
    }
}

fn parse_float(text: &str) -> ParseResult<f32> {
    let text = text.trim();
    text.parse::<f32>()
        .map_err(|_| ParseError::InvalidNumber(text.to_string()))
}

/// All `"..."` segments in order.
fn quoted_strings(text: &str) -> Vec<String> {
    text.split('"')
        .skip(1)
        .step_by(2)
        .map(str::to_string)
        .collect()
}

/// All `<...>` segments in order.
fn bracketed_paths(text: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find('<') {
        let after = &rest[start + 1..];
        match after.find('>') {
            Some(end) => {
                if end > 0 {
                    result.push(after[..end].to_string());
                }
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    result
}

/// Parse a USDA string.
pub fn parse_usda(content: &str) -> ParseResult<ParsedLayer> {
    let mut parser = UsdaParser::new(content);
    parser.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::write_usda;

    #[test]
    fn test_parse_layer_metadata() {
        let usda = r#"#usda 1.0
(
    defaultPrim = "Alien"
    upAxis = "Y"
    metersPerUnit = 0.01
)

def Xform "Alien"
{
}
"#;
        let layer = parse_usda(usda).unwrap();
        assert_eq!(layer.metadata.default_prim.as_deref(), Some("Alien"));
        assert_eq!(layer.metadata.up_axis, Some(UpAxis::Y));
        assert_eq!(layer.prims.len(), 1);
        assert_eq!(layer.prims[0].type_name.as_deref(), Some("Xform"));
    }

    #[test]
    fn test_parse_prim_metadata() {
        let usda = r#"#usda 1.0

def "Alien" (
    kind = "component"
    assetInfo = {
        asset identifier = @/show/GEO_Alien.abc@
        string name = "Alien"
    }
    prepend references = [@/show/GEO_Alien.abc@</render_GRP>]
    prepend apiSchemas = ["MaterialBindingAPI", "CollectionAPI:mat_bind_skin"]
)
{
    def Mesh "body" (
        prepend payload = @./Payload.usda@</Alien/grp>
    )
    {
    }
}
"#;
        let layer = parse_usda(usda).unwrap();
        let alien = &layer.prims[0];
        assert_eq!(alien.type_name, None);
        assert_eq!(alien.metadata.kind.as_deref(), Some("component"));

        let info = alien.metadata.asset_info.as_ref().unwrap();
        assert_eq!(info.identifier, "/show/GEO_Alien.abc");
        assert_eq!(info.name, "Alien");

        assert_eq!(
            alien.metadata.references,
            vec![SdfReference::new("/show/GEO_Alien.abc", Some("/render_GRP"))]
        );
        assert_eq!(alien.metadata.api_schemas.len(), 2);

        let body = alien.child("body").unwrap();
        assert_eq!(
            body.metadata.payloads,
            vec![SdfReference::new("./Payload.usda", Some("/Alien/grp"))]
        );
    }

    #[test]
    fn test_parse_attributes_and_relationships() {
        let usda = r#"#usda 1.0

def Shader "Tex"
{
    uniform token info:id = "ND_UsdUVTexture"
    asset inputs:file = @tex/base.exr@
    float4 inputs:scale = (2, 2, 2, 1)
    bool inputs:thin_walled = 1
    float2 inputs:st.connect = </Looks/M/UV.outputs:out>
    color3f outputs:rgb
    rel material:binding = [</Looks/A>, </Looks/B>]
}
"#;
        let layer = parse_usda(usda).unwrap();
        let tex = &layer.prims[0];

        let id = tex.attribute("info:id").unwrap();
        assert!(id.uniform);
        assert_eq!(id.value, Some(UsdValue::Token("ND_UsdUVTexture".to_string())));

        assert_eq!(
            tex.attribute("inputs:file").unwrap().value,
            Some(UsdValue::Asset("tex/base.exr".to_string()))
        );
        assert_eq!(
            tex.attribute("inputs:scale").unwrap().value,
            Some(UsdValue::Float4(Vec4::new(2.0, 2.0, 2.0, 1.0)))
        );
        assert_eq!(
            tex.attribute("inputs:thin_walled").unwrap().value,
            Some(UsdValue::Bool(true))
        );
        assert_eq!(
            tex.attribute("inputs:st").unwrap().connection.as_deref(),
            Some("/Looks/M/UV.outputs:out")
        );
        assert_eq!(tex.attribute("outputs:rgb").unwrap().value, None);
        assert_eq!(
            tex.relationship("material:binding").unwrap().targets,
            vec!["/Looks/A", "/Looks/B"]
        );
    }

    #[test]
    fn test_writer_output_reads_back() {
        let mut root = UsdPrimSpec::new(Specifier::Def, Some("Scope"), "Looks");
        let mut material = UsdPrimSpec::new(Specifier::Def, Some("Material"), "Skin");
        material.add_inherit("/__class_mtl__/mtlxmaterial");
        material
            .create_output("mtlx:surface", ValueType::Token)
            .connect_to_source("/Looks/Skin/Skin_standard_surface", "outputs:surface");
        material.children.push(UsdPrimSpec::new(Specifier::Def, Some("Shader"), "Skin_standard_surface"));
        root.children.push(material);

        let metadata = LayerMetadata {
            default_prim: None,
            up_axis: Some(UpAxis::Y),
        };
        let text = write_usda(&metadata, std::slice::from_ref(&root));
        let layer = parse_usda(&text).unwrap();

        assert_eq!(layer.metadata, metadata);
        assert_eq!(layer.prims, vec![root]);
    }

    #[test]
    fn test_unclosed_block() {
        let usda = "#usda 1.0\n\ndef Xform \"Broken\"\n{\n    float x = 1\n";
        assert!(matches!(parse_usda(usda), Err(ParseError::UnclosedBlock(3))));
    }

    #[test]
    fn test_unsupported_attribute_type() {
        let usda = "#usda 1.0\n\ndef Xform \"A\"\n{\n    matrix4d xformOp:transform = ( (1, 0, 0, 0) )\n}\n";
        assert!(matches!(parse_usda(usda), Err(ParseError::Parse { line: 5, .. })));
    }

    #[test]
    fn test_reversed_tuple_parens() {
        let usda = "def Shader \"S\"\n{\n    float2 inputs:st = )1, 2(\n}\n";
        assert!(matches!(parse_usda(usda), Err(ParseError::Parse { line: 3, .. })));

        let usda = "def Shader \"S\"\n{\n    float2 inputs:st = (1, 2\n}\n";
        assert!(matches!(parse_usda(usda), Err(ParseError::Parse { line: 3, .. })));
    }
}
