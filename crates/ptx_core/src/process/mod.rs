//! Interchange processes.
//!
//! A process is one host operation (export a cache, create a proxy, turn
//! a proxy back into native geometry) that records its outcome in a
//! `StatusReport` instead of returning errors. Which implementation runs
//! for a given `(category, name)` is decided by the process table
//! (`maya_processes.json`), resolved against the compiled-in
//! `ProcessKind`s.

mod export;
mod import;
mod proxy;

pub use export::Exporter;
pub use import::ProxyImporter;
pub use proxy::ProxyCreator;

use std::fmt;
use std::path::Path;

use ptx_factory::{ImplementationLocator, Locator, ProcessStatus, Registry, RegistryError, StatusReport};
use thiserror::Error;

use crate::scene::{FrameRange, HostScene, NativeFileType, NodeId, NodeType};

const BUILTIN_PROCESSES: &str = include_str!("../../config/maya_processes.json");

pub const EXPORTERS: &str = "exporters";
pub const PROXIES: &str = "proxies";
pub const IMPORTERS: &str = "importers";

/// Configuration errors raised while resolving processes.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("process '{name}' is a {found} process, expected {expected}")]
    Capability {
        name: String,
        expected: Capability,
        found: Capability,
    },
}

pub type ProcessResult<T> = Result<T, ProcessError>;

/// What a process can do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    Export,
    Proxy,
    Import,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Export => "export",
            Capability::Proxy => "proxy",
            Capability::Import => "import",
        };
        f.write_str(name)
    }
}

/// Compiled-in process implementations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProcessKind {
    AlembicExporter,
    UsdExporter,
    NativeExporter,
    GpuCache,
    UsdStage,
    GpuCacheImporter,
    UsdImporter,
    NativeImporter,
}

impl ProcessKind {
    pub const ALL: [ProcessKind; 8] = [
        ProcessKind::AlembicExporter,
        ProcessKind::UsdExporter,
        ProcessKind::NativeExporter,
        ProcessKind::GpuCache,
        ProcessKind::UsdStage,
        ProcessKind::GpuCacheImporter,
        ProcessKind::UsdImporter,
        ProcessKind::NativeImporter,
    ];

    pub fn capability(self) -> Capability {
        match self {
            ProcessKind::AlembicExporter | ProcessKind::UsdExporter | ProcessKind::NativeExporter => {
                Capability::Export
            }
            ProcessKind::GpuCache | ProcessKind::UsdStage => Capability::Proxy,
            ProcessKind::GpuCacheImporter | ProcessKind::UsdImporter | ProcessKind::NativeImporter => {
                Capability::Import
            }
        }
    }

    /// Stand-in node type a proxy process creates or an importer consumes.
    pub fn proxy_type(self) -> Option<NodeType> {
        match self {
            ProcessKind::GpuCache | ProcessKind::GpuCacheImporter => Some(NodeType::GpuCache),
            ProcessKind::UsdStage | ProcessKind::UsdImporter => Some(NodeType::UsdProxyShape),
            _ => None,
        }
    }

    /// Attribute of the stand-in node holding the artifact path.
    pub fn path_attribute(self) -> Option<&'static str> {
        match self.proxy_type()? {
            NodeType::GpuCache => Some("cacheFileName"),
            NodeType::UsdProxyShape => Some("filePath"),
            _ => None,
        }
    }

    /// Log target of processes of this kind.
    pub fn log_target(self) -> &'static str {
        match self.capability() {
            Capability::Export => "ptx::export",
            Capability::Proxy => "ptx::proxy",
            Capability::Import => "ptx::import",
        }
    }
}

impl Locator for ProcessKind {
    fn from_locator(locator: &str) -> Option<Self> {
        ProcessKind::ALL.into_iter().find(|k| k.locator() == locator)
    }

    fn locator(self) -> &'static str {
        match self {
            ProcessKind::AlembicExporter => "alembic_exporter",
            ProcessKind::UsdExporter => "usd_exporter",
            ProcessKind::NativeExporter => "native_exporter",
            ProcessKind::GpuCache => "gpu_cache",
            ProcessKind::UsdStage => "usd_stage",
            ProcessKind::GpuCacheImporter => "gpu_cache_importer",
            ProcessKind::UsdImporter => "usd_importer",
            ProcessKind::NativeImporter => "native_importer",
        }
    }
}

/// Options of the native exporter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeOptions {
    pub file_type: NativeFileType,
    pub force: bool,
    pub preserve_references: bool,
    pub selection_only: bool,
}

impl Default for NativeOptions {
    fn default() -> Self {
        Self {
            file_type: NativeFileType::MayaAscii,
            force: true,
            preserve_references: false,
            selection_only: false,
        }
    }
}

/// Options of the USD exporter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UsdOptions {
    pub append: bool,
    pub convert_materials_to: String,
    pub default_mesh_scheme: String,
    pub default_usd_format: String,
    pub selection: bool,
}

impl Default for UsdOptions {
    fn default() -> Self {
        Self {
            append: false,
            convert_materials_to: "UsdPreviewSurface".to_string(),
            default_mesh_scheme: "catmullClark".to_string(),
            default_usd_format: "usda".to_string(),
            selection: false,
        }
    }
}

/// Parameters handed to a process at construction.
///
/// Each kind reads the fields it needs and ignores the rest.
#[derive(Clone, Debug, Default)]
pub struct ProcessParams {
    pub root_node: Option<NodeId>,
    pub export_path: String,
    pub frame_range: FrameRange,
    pub proxy_path: String,
    pub proxy_node: Option<NodeId>,
    pub import_path: String,
    pub native: NativeOptions,
    pub usd: UsdOptions,
}

impl ProcessParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root_node(mut self, node: NodeId) -> Self {
        self.root_node = Some(node);
        self
    }

    pub fn export_path(mut self, path: impl Into<String>) -> Self {
        self.export_path = path.into();
        self
    }

    pub fn frame_range(mut self, range: FrameRange) -> Self {
        self.frame_range = range;
        self
    }

    pub fn proxy_path(mut self, path: impl Into<String>) -> Self {
        self.proxy_path = path.into();
        self
    }

    pub fn proxy_node(mut self, node: NodeId) -> Self {
        self.proxy_node = Some(node);
        self
    }

    pub fn import_path(mut self, path: impl Into<String>) -> Self {
        self.import_path = path.into();
        self
    }

    pub fn native(mut self, options: NativeOptions) -> Self {
        self.native = options;
        self
    }

    pub fn usd(mut self, options: UsdOptions) -> Self {
        self.usd = options;
        self
    }
}

/// A runnable process.
pub trait Process {
    fn kind(&self) -> ProcessKind;

    fn report(&self) -> &StatusReport;

    fn status(&self) -> ProcessStatus {
        self.report().status()
    }

    /// Run against the host scene. Domain failures land in the report.
    fn process(&mut self, scene: &mut dyn HostScene) -> ProcessStatus;
}

/// A process built from the table, by capability.
#[derive(Debug)]
pub enum ProcessHandle {
    Export(Exporter),
    Proxy(ProxyCreator),
    Import(ProxyImporter),
}

impl ProcessHandle {
    pub fn capability(&self) -> Capability {
        self.kind().capability()
    }

    fn as_process(&self) -> &dyn Process {
        match self {
            ProcessHandle::Export(p) => p,
            ProcessHandle::Proxy(p) => p,
            ProcessHandle::Import(p) => p,
        }
    }

    fn as_process_mut(&mut self) -> &mut dyn Process {
        match self {
            ProcessHandle::Export(p) => p,
            ProcessHandle::Proxy(p) => p,
            ProcessHandle::Import(p) => p,
        }
    }
}

impl Process for ProcessHandle {
    fn kind(&self) -> ProcessKind {
        self.as_process().kind()
    }

    fn report(&self) -> &StatusReport {
        self.as_process().report()
    }

    fn process(&mut self, scene: &mut dyn HostScene) -> ProcessStatus {
        self.as_process_mut().process(scene)
    }
}

/// The process table of a host application.
#[derive(Debug, Clone)]
pub struct ProcessRegistry {
    registry: Registry<ProcessKind>,
}

impl ProcessRegistry {
    /// The table shipped with the crate.
    pub fn builtin() -> ProcessResult<Self> {
        Self::from_json_str(BUILTIN_PROCESSES, "maya_processes.json")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> ProcessResult<Self> {
        Ok(Self {
            registry: Registry::load(path)?,
        })
    }

    pub fn from_json_str(content: &str, source: &str) -> ProcessResult<Self> {
        Ok(Self {
            registry: Registry::from_json_str(content, source)?,
        })
    }

    pub fn registry(&self) -> &Registry<ProcessKind> {
        &self.registry
    }

    pub fn resolve(&self, category: &str, name: &str) -> ProcessResult<ImplementationLocator> {
        Ok(self.registry.resolve(category, name)?)
    }

    /// Build a fresh process for `locator`.
    pub fn instantiate(&self, locator: &ImplementationLocator, params: ProcessParams) -> ProcessResult<ProcessHandle> {
        let kind = self.registry.kind(locator)?;
        log::debug!("Instantiating {} process {}", kind.capability(), locator);

        Ok(match kind.capability() {
            Capability::Export => ProcessHandle::Export(Exporter::new(kind, params)),
            Capability::Proxy => ProcessHandle::Proxy(ProxyCreator::new(kind, params)),
            Capability::Import => ProcessHandle::Import(ProxyImporter::new(kind, params)),
        })
    }

    /// `exporters/<name>`
    pub fn exporter(&self, name: &str, params: ProcessParams) -> ProcessResult<Exporter> {
        match self.instantiate(&self.resolve(EXPORTERS, name)?, params)? {
            ProcessHandle::Export(exporter) => Ok(exporter),
            other => Err(capability_error(name, Capability::Export, &other)),
        }
    }

    /// `proxies/<name>`
    pub fn proxy(&self, name: &str, params: ProcessParams) -> ProcessResult<ProxyCreator> {
        match self.instantiate(&self.resolve(PROXIES, name)?, params)? {
            ProcessHandle::Proxy(proxy) => Ok(proxy),
            other => Err(capability_error(name, Capability::Proxy, &other)),
        }
    }

    /// `importers/<name>`
    pub fn importer(&self, name: &str, params: ProcessParams) -> ProcessResult<ProxyImporter> {
        match self.instantiate(&self.resolve(IMPORTERS, name)?, params)? {
            ProcessHandle::Import(importer) => Ok(importer),
            other => Err(capability_error(name, Capability::Import, &other)),
        }
    }
}

fn capability_error(name: &str, expected: Capability, found: &ProcessHandle) -> ProcessError {
    ProcessError::Capability {
        name: name.to_string(),
        expected,
        found: found.capability(),
    }
}
