//! USDA (ASCII) serialization.
//!
//! Output is one statement per line so that `parse_usda` can read it
//! back. List-valued metadata is always written on a single line.

use std::fmt::Write;

use crate::types::*;

const INDENT: &str = "    ";

/// Serialize layer metadata and root prims to USDA text.
pub fn write_usda(metadata: &LayerMetadata, prims: &[UsdPrimSpec]) -> String {
    let mut out = String::from("#usda 1.0\n");

    if metadata.default_prim.is_some() || metadata.up_axis.is_some() {
        out.push_str("(\n");
        if let Some(default_prim) = &metadata.default_prim {
            let _ = writeln!(out, "{}defaultPrim = \"{}\"", INDENT, default_prim);
        }
        if let Some(up_axis) = metadata.up_axis {
            let _ = writeln!(out, "{}upAxis = \"{}\"", INDENT, up_axis.token());
        }
        out.push_str(")\n");
    }

    for prim in prims {
        out.push('\n');
        write_prim(&mut out, prim, 0);
    }

    out
}

fn write_prim(out: &mut String, prim: &UsdPrimSpec, depth: usize) {
    let pad = INDENT.repeat(depth);
    let inner = INDENT.repeat(depth + 1);

    let _ = write!(out, "{}{} ", pad, prim.specifier.keyword());
    if let Some(type_name) = &prim.type_name {
        let _ = write!(out, "{} ", type_name);
    }
    let _ = write!(out, "\"{}\"", prim.name);

    if prim.metadata.is_empty() {
        out.push('\n');
    } else {
        out.push_str(" (\n");
        write_metadata(out, &prim.metadata, &inner);
        let _ = writeln!(out, "{})", pad);
    }

    let _ = writeln!(out, "{}{{", pad);

    for attr in &prim.attributes {
        write_attribute(out, attr, &inner);
    }

    for rel in &prim.relationships {
        let _ = writeln!(out, "{}rel {}{}", inner, rel.name, format_targets(&rel.targets));
    }

    for (i, child) in prim.children.iter().enumerate() {
        if i > 0 || !prim.attributes.is_empty() || !prim.relationships.is_empty() {
            out.push('\n');
        }
        write_prim(out, child, depth + 1);
    }

    let _ = writeln!(out, "{}}}", pad);
}

fn write_metadata(out: &mut String, metadata: &PrimMetadata, pad: &str) {
    if let Some(kind) = &metadata.kind {
        let _ = writeln!(out, "{}kind = \"{}\"", pad, kind);
    }

    if let Some(info) = &metadata.asset_info {
        let _ = writeln!(out, "{}assetInfo = {{", pad);
        let _ = writeln!(out, "{}{}asset identifier = @{}@", pad, INDENT, info.identifier);
        let _ = writeln!(out, "{}{}string name = \"{}\"", pad, INDENT, info.name);
        let _ = writeln!(out, "{}}}", pad);
    }

    if !metadata.api_schemas.is_empty() {
        let schemas: Vec<String> = metadata
            .api_schemas
            .iter()
            .map(|s| format!("\"{}\"", s))
            .collect();
        let _ = writeln!(out, "{}prepend apiSchemas = [{}]", pad, schemas.join(", "));
    }

    if !metadata.inherits.is_empty() {
        let paths: Vec<String> = metadata.inherits.iter().map(|p| format!("<{}>", p)).collect();
        let _ = writeln!(out, "{}prepend inherits = [{}]", pad, paths.join(", "));
    }

    if !metadata.references.is_empty() {
        let _ = writeln!(
            out,
            "{}prepend references = [{}]",
            pad,
            format_arcs(&metadata.references)
        );
    }

    if !metadata.payloads.is_empty() {
        let _ = writeln!(
            out,
            "{}prepend payload = [{}]",
            pad,
            format_arcs(&metadata.payloads)
        );
    }
}

fn write_attribute(out: &mut String, attr: &UsdAttribute, pad: &str) {
    let variability = if attr.uniform { "uniform " } else { "" };
    let decl = format!("{}{}{} {}", pad, variability, attr.value_type.type_name(), attr.name);

    match (&attr.value, &attr.connection) {
        (None, None) => {
            let _ = writeln!(out, "{}", decl);
        }
        (value, connection) => {
            if let Some(value) = value {
                let _ = writeln!(out, "{} = {}", decl, format_value(value));
            }
            if let Some(source) = connection {
                let _ = writeln!(out, "{}.connect = <{}>", decl, source);
            }
        }
    }
}

fn format_arcs(arcs: &[SdfReference]) -> String {
    arcs.iter()
        .map(|arc| match &arc.prim_path {
            Some(prim_path) => format!("@{}@<{}>", arc.asset_path, prim_path),
            None => format!("@{}@", arc.asset_path),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_targets(targets: &[String]) -> String {
    match targets.len() {
        0 => String::new(),
        1 => format!(" = <{}>", targets[0]),
        _ => {
            let paths: Vec<String> = targets.iter().map(|t| format!("<{}>", t)).collect();
            format!(" = [{}]", paths.join(", "))
        }
    }
}

/// Format a value the way it appears on the right of `=`.
pub fn format_value(value: &UsdValue) -> String {
    match value {
        UsdValue::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
        UsdValue::Int(i) => i.to_string(),
        UsdValue::Float(f) => f.to_string(),
        UsdValue::Float2(v) => format!("({}, {})", v.x, v.y),
        UsdValue::Float4(v) => format!("({}, {}, {}, {})", v.x, v.y, v.z, v.w),
        UsdValue::Color3f(v) | UsdValue::Normal3f(v) | UsdValue::Vector3f(v) => {
            format!("({}, {}, {})", v.x, v.y, v.z)
        }
        UsdValue::Token(s) | UsdValue::String(s) => format!("\"{}\"", s),
        UsdValue::Asset(path) => format!("@{}@", path),
    }
}
