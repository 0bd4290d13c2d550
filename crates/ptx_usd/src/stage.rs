//! In-memory USD stage backed by a single `.usda` layer.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::parser::{parse_usda, ParseError};
use crate::types::*;
use crate::writer::write_usda;

/// Errors that can occur while authoring a stage.
#[derive(Error, Debug)]
pub enum UsdError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Invalid prim path: {0}")]
    InvalidPath(String),

    #[error("Layer already exists: {0}")]
    AlreadyExists(PathBuf),
}

/// Result type for stage operations.
pub type UsdResult<T> = Result<T, UsdError>;

/// A stage holding one root layer.
#[derive(Clone, Debug)]
pub struct UsdStage {
    path: PathBuf,
    pub metadata: LayerMetadata,
    pub root_prims: Vec<UsdPrimSpec>,
}

impl UsdStage {
    /// Create an empty stage for a layer that does not exist yet.
    pub fn create_new<P: AsRef<Path>>(path: P) -> UsdResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(UsdError::AlreadyExists(path.to_path_buf()));
        }

        Ok(Self {
            path: path.to_path_buf(),
            metadata: LayerMetadata::default(),
            root_prims: Vec::new(),
        })
    }

    /// Open and parse an existing layer.
    pub fn open<P: AsRef<Path>>(path: P) -> UsdResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| UsdError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let layer = parse_usda(&content)?;

        log::debug!(
            target: "ptx::usd",
            "Opened {} ({} root prims)",
            path.display(),
            layer.prims.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            metadata: layer.metadata,
            root_prims: layer.prims,
        })
    }

    /// Open the layer if it exists, otherwise create it with `up_axis`.
    pub fn open_or_create<P: AsRef<Path>>(path: P, up_axis: UpAxis) -> UsdResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::open(path);
        }

        let mut stage = Self::create_new(path)?;
        stage.metadata.up_axis = Some(up_axis);
        Ok(stage)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Find a prim by absolute path (e.g. `/Alien/body`).
    pub fn prim(&self, path: &str) -> Option<&UsdPrimSpec> {
        let mut segments = path_segments(path).ok()?.into_iter();
        let first = segments.next()?;
        let mut prim = self.root_prims.iter().find(|p| p.name == first)?;
        for segment in segments {
            prim = prim.child(segment)?;
        }
        Some(prim)
    }

    pub fn prim_mut(&mut self, path: &str) -> Option<&mut UsdPrimSpec> {
        let mut segments = path_segments(path).ok()?.into_iter();
        let first = segments.next()?;
        let mut prim = self.root_prims.iter_mut().find(|p| p.name == first)?;
        for segment in segments {
            prim = prim.child_mut(segment)?;
        }
        Some(prim)
    }

    /// Define a prim at `path`, creating typeless ancestors as needed.
    ///
    /// An existing prim is returned as-is; its type is only filled in when
    /// it had none.
    pub fn define_prim(&mut self, path: &str, type_name: Option<&str>) -> UsdResult<&mut UsdPrimSpec> {
        let segments = path_segments(path)?;
        let last = segments.len() - 1;

        let mut siblings = &mut self.root_prims;
        for (depth, segment) in segments.iter().enumerate() {
            let index = match siblings.iter().position(|p| p.name == *segment) {
                Some(index) => index,
                None => {
                    let ty = if depth == last { type_name } else { None };
                    siblings.push(UsdPrimSpec::new(Specifier::Def, ty, *segment));
                    siblings.len() - 1
                }
            };

            if depth == last {
                let prim = &mut siblings[index];
                if prim.type_name.is_none() {
                    prim.type_name = type_name.map(str::to_string);
                }
                return Ok(prim);
            }
            siblings = &mut siblings[index].children;
        }

        Err(UsdError::InvalidPath(path.to_string()))
    }

    /// Set `defaultPrim` to the root prim at `path`.
    pub fn set_default_prim(&mut self, path: &str) -> UsdResult<()> {
        let segments = path_segments(path)?;
        if segments.len() != 1 || self.prim(path).is_none() {
            return Err(UsdError::InvalidPath(path.to_string()));
        }
        self.metadata.default_prim = Some(segments[0].to_string());
        Ok(())
    }

    pub fn default_prim(&self) -> Option<&UsdPrimSpec> {
        let name = self.metadata.default_prim.as_deref()?;
        self.root_prims.iter().find(|p| p.name == name)
    }

    pub fn to_usda(&self) -> String {
        write_usda(&self.metadata, &self.root_prims)
    }

    /// Write the layer to its path, creating parent directories.
    pub fn save(&self) -> UsdResult<()> {
        let io_err = |source| UsdError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        std::fs::write(&self.path, self.to_usda()).map_err(io_err)?;

        log::info!(target: "ptx::usd", "Saved {}", self.path.display());
        Ok(())
    }
}

/// Split an absolute prim path into its names.
fn path_segments(path: &str) -> UsdResult<Vec<&str>> {
    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| UsdError::InvalidPath(path.to_string()))?;
    let segments: Vec<&str> = rest.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(UsdError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_define_prim_creates_ancestors() {
        let dir = tempdir().unwrap();
        let mut stage = UsdStage::create_new(dir.path().join("a.usda")).unwrap();

        stage.define_prim("/Looks/Skin/Surface", Some("Shader")).unwrap();

        let looks = stage.prim("/Looks").unwrap();
        assert_eq!(looks.type_name, None);
        assert_eq!(stage.prim("/Looks/Skin/Surface").unwrap().type_name.as_deref(), Some("Shader"));

        // Redefining keeps the existing prim and fills in the missing type.
        stage.define_prim("/Looks", Some("Scope")).unwrap();
        assert_eq!(stage.root_prims.len(), 1);
        assert_eq!(stage.prim("/Looks").unwrap().type_name.as_deref(), Some("Scope"));
        assert_eq!(stage.prim("/Looks").unwrap().prim_count(), 3);
    }

    #[test]
    fn test_invalid_paths() {
        let dir = tempdir().unwrap();
        let mut stage = UsdStage::create_new(dir.path().join("a.usda")).unwrap();

        assert!(matches!(stage.define_prim("Looks", None), Err(UsdError::InvalidPath(_))));
        assert!(matches!(stage.define_prim("/", None), Err(UsdError::InvalidPath(_))));
        assert!(matches!(stage.define_prim("/a//b", None), Err(UsdError::InvalidPath(_))));
        assert!(stage.prim("/missing").is_none());
    }

    #[test]
    fn test_default_prim_must_be_root() {
        let dir = tempdir().unwrap();
        let mut stage = UsdStage::create_new(dir.path().join("a.usda")).unwrap();
        stage.define_prim("/Alien/body", Some("Mesh")).unwrap();

        assert!(stage.set_default_prim("/Alien/body").is_err());
        assert!(stage.set_default_prim("/Ghost").is_err());
        stage.set_default_prim("/Alien").unwrap();
        assert_eq!(stage.default_prim().unwrap().name, "Alien");
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("GEO_Character_Alien.usda");

        let mut stage = UsdStage::open_or_create(&path, UpAxis::Y).unwrap();
        let root = stage.define_prim("/Alien", Some("Xform")).unwrap();
        root.metadata.kind = Some("component".to_string());
        stage.set_default_prim("/Alien").unwrap();
        stage.save().unwrap();

        assert!(matches!(UsdStage::create_new(&path), Err(UsdError::AlreadyExists(_))));

        let reopened = UsdStage::open_or_create(&path, UpAxis::Z).unwrap();
        assert_eq!(reopened.metadata.up_axis, Some(UpAxis::Y));
        assert_eq!(reopened.default_prim().unwrap().metadata.kind.as_deref(), Some("component"));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempdir().unwrap();
        let result = UsdStage::open(dir.path().join("missing.usda"));
        assert!(matches!(result, Err(UsdError::Io { .. })));
    }
}
