use std::path::Path;

use ptx_factory::ProcessStatus;

use super::{
    find_model_root, record_geometry, Activate, Passive, Publish, PublishArgs, PublishOptions, PublishResult,
    PublishState, Session,
};
use crate::asset::AssetInfo;
use crate::process::{Process, ProcessParams, ProxyImporter};
use crate::scene::{HostScene, NodeId};

/// Converts the proxy of a model into editable geometry (MDLA).
#[derive(Debug)]
pub struct ModelActivate {
    asset: AssetInfo,
    options: PublishOptions,
    state: PublishState,
    lock_info: String,
}

impl ModelActivate {
    pub fn new(args: PublishArgs) -> Self {
        Self {
            asset: args.asset,
            options: args.options,
            state: PublishState::new(),
            lock_info: String::new(),
        }
    }

    /// The selection first, then the first asset assembly holding a
    /// cached node.
    fn find_proxy(&self, scene: &dyn HostScene, importer: &ProxyImporter) -> Option<NodeId> {
        scene
            .selection()
            .into_iter()
            .chain(scene.asset_assemblies())
            .find(|node| importer.find_cached_node(scene, *node).is_some())
    }
}

impl Publish for ModelActivate {
    fn asset(&self) -> &AssetInfo {
        &self.asset
    }

    fn asset_mut(&mut self) -> &mut AssetInfo {
        &mut self.asset
    }

    fn state(&self) -> &PublishState {
        &self.state
    }

    fn publish(&mut self, session: &mut Session<'_>) -> PublishResult<ProcessStatus> {
        self.make_active(session)
    }
}

impl Activate for ModelActivate {
    fn make_active(&mut self, session: &mut Session<'_>) -> PublishResult<ProcessStatus> {
        self.state.begin();

        if self.is_asset_locked(&session.user) {
            let owner = self.asset.lock_owner.clone().unwrap_or_default();
            self.state
                .report
                .fail(format!("{} is already locked by {}, aborting", self.asset.name, owner));
            return Ok(self.state.conclude(&[]));
        }

        let probe = session
            .processes
            .importer(&self.options.use_process, ProcessParams::new())?;

        let params = match probe.proxy_type() {
            Some(proxy_type) => match self.find_proxy(session.scene, &probe) {
                Some(node) => ProcessParams::new().proxy_node(node),
                None => {
                    self.state
                        .report
                        .warn(format!("Unable to find any {} node for {}", proxy_type, self.asset.name));
                    return Ok(self.state.conclude(&[]));
                }
            },
            None => ProcessParams::new().import_path(self.options.export_path.clone()),
        };

        let mut importer = session.processes.importer(&self.options.use_process, params)?;
        importer.process(session.scene);

        let mut statuses = Vec::new();
        let status = self.state.absorb(&importer, &mut statuses);

        if status.is_success() {
            let owner = self.generate_lock_info(&session.user);
            self.state.record("lock_owner", owner);
            if let Some(root) = importer.imported().first() {
                record_geometry(session.scene, *root, &mut self.asset);
            }
        }

        Ok(self.state.conclude(&statuses))
    }

    fn lock_info(&self) -> &str {
        &self.lock_info
    }

    fn generate_lock_info(&mut self, user: &str) -> String {
        self.lock_info = user.to_uppercase();
        self.asset.lock_owner = Some(self.lock_info.clone());
        self.lock_info.clone()
    }
}

/// Caches a model and replaces it with a proxy (MDLP).
#[derive(Debug)]
pub struct ModelPassive {
    asset: AssetInfo,
    options: PublishOptions,
    state: PublishState,
}

impl ModelPassive {
    pub fn new(args: PublishArgs) -> Self {
        Self {
            asset: args.asset,
            options: args.options,
            state: PublishState::new(),
        }
    }

    fn export_params(&self, root: NodeId, export_path: String) -> ProcessParams {
        ProcessParams::new()
            .root_node(root)
            .export_path(export_path)
            .frame_range(self.options.frame_range)
    }
}

impl Publish for ModelPassive {
    fn asset(&self) -> &AssetInfo {
        &self.asset
    }

    fn asset_mut(&mut self) -> &mut AssetInfo {
        &mut self.asset
    }

    fn state(&self) -> &PublishState {
        &self.state
    }

    fn publish(&mut self, session: &mut Session<'_>) -> PublishResult<ProcessStatus> {
        self.make_passive(session)
    }
}

impl Passive for ModelPassive {
    fn make_passive(&mut self, session: &mut Session<'_>) -> PublishResult<ProcessStatus> {
        self.state.begin();

        if self.asset.is_locked_by_other(&session.user) {
            let owner = self.asset.lock_owner.clone().unwrap_or_default();
            self.state
                .report
                .fail(format!("{} is locked by {}, not {}", self.asset.name, owner, session.user));
            return Ok(self.state.conclude(&[]));
        }

        let Some(root) = find_model_root(session.scene, &self.asset, &self.options) else {
            self.state.report.fail("No model root found in the scene");
            return Ok(self.state.conclude(&[]));
        };

        let use_process = self.options.use_process.clone();

        // Every process is resolved before the scene is touched.
        let mut exporter = session
            .processes
            .exporter(&use_process, self.export_params(root, self.options.export_path.clone()))?;
        let mut proxy = session.processes.proxy(&use_process, ProcessParams::new())?;
        let mut fallback = if self.options.fallback_alembic && use_process != "abc" {
            Some(session.processes.exporter("abc", ProcessParams::new())?)
        } else {
            None
        };

        let mesh_count = record_geometry(session.scene, root, &mut self.asset);
        log::debug!(target: super::LOG_TARGET, "{} mesh(es) under {}", mesh_count, root);

        let mut statuses = Vec::new();
        exporter.process(session.scene);
        let export_status = self.state.absorb(&exporter, &mut statuses);
        let export_path = exporter.export_path().to_string();

        if let Some(fallback) = fallback.as_mut().filter(|_| !export_path.is_empty()) {
            let fallback_path = Path::new(&export_path).with_extension("abc");
            fallback.set_params(self.export_params(root, fallback_path.to_string_lossy().into_owned()));
            fallback.process(session.scene);
            self.state.absorb(&*fallback, &mut statuses);
            self.state.record("fallback_path", fallback.export_path());
        }

        if export_status == ProcessStatus::Failed {
            self.state
                .report
                .fail(format!("Export of {} failed, keeping the native geometry", self.asset.name));
            return Ok(self.state.conclude(&statuses));
        }

        self.state.out_file = Some(export_path.clone().into());
        self.state.record("export_path", export_path.clone());

        proxy.set_proxy_path(export_path);
        proxy.process(session.scene);
        let proxy_status = self.state.absorb(&proxy, &mut statuses);

        if proxy_status != ProcessStatus::Failed {
            if let Err(e) = session.scene.delete(root) {
                self.state.report.warn(format!("Cannot remove {}: {}", root, e));
            }
            if let Some(node) = proxy.out_node() {
                if let Ok(path) = session.scene.full_path(node) {
                    self.state.record("proxy_node", path);
                }
            }
        }

        Ok(self.state.conclude(&statuses))
    }
}
