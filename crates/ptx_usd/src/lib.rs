//! PTX USD - USD layer authoring for asset publishes.
//!
//! This crate provides:
//!
//! - **Layer model**: `UsdStage`, `UsdPrimSpec`, typed attribute values
//! - **USDA I/O**: a writer and a line-oriented parser for the authored subset
//! - **Shaders**: MaterialX standard surface and UsdPreviewSurface definitions
//! - **Composition**: payload, geometry and look files for a published asset
//!
//! # Example
//!
//! ```ignore
//! use ptx_usd::{compose_asset, ComposeRequest, ShaderRegistry};
//!
//! let shaders = ShaderRegistry::builtin()?;
//! let request = ComposeRequest {
//!     looks_info_path: ".LUK_Character_Alien.json".into(),
//!     alembic_path: "/show/asset/GEO_Character_Alien.abc".into(),
//!     usd_base_location: "/show/asset".into(),
//!     asset_type: "Character".into(),
//!     asset_name: "Alien".into(),
//!     base_prim_path: "/render_GRP".into(),
//! };
//! let composed = compose_asset(&request, &shaders)?;
//! println!("Wrote {}", composed.asset_path.display());
//! ```

mod composer;
mod looks;
mod parser;
mod shaders;
mod stage;
mod types;
mod writer;

pub use composer::*;
pub use looks::*;
pub use parser::*;
pub use shaders::*;
pub use stage::*;
pub use types::*;
pub use writer::*;
