//! Application registry.
//!
//! Maps `(application, publish type)` to the builder of an orchestrator.
//! Builders are `NodeBuilder`s, so asking twice for the same pair hands
//! back the orchestrator built on the first request.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use ptx_factory::NodeBuilder;
use thiserror::Error;

use crate::publish::{Publish, PublishArgs};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FactoryError {
    #[error("no publish types registered for application '{0}'")]
    UnknownApp(String),

    #[error("publish type '{publish_type}' is not registered for '{app}'")]
    UnknownPublishType { app: String, publish_type: String },
}

pub type FactoryResult<T> = Result<T, FactoryError>;

pub type SharedPublish = Rc<RefCell<dyn Publish>>;

/// Something that hands out an orchestrator.
pub trait PublishBuilder {
    fn build(&mut self, args: PublishArgs) -> SharedPublish;
}

impl<T: Publish + 'static> PublishBuilder for NodeBuilder<T, PublishArgs> {
    fn build(&mut self, args: PublishArgs) -> SharedPublish {
        self.call(args)
    }
}

#[derive(Default)]
pub struct PublishFactory {
    builders: BTreeMap<String, BTreeMap<String, Box<dyn PublishBuilder>>>,
}

impl PublishFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a builder. A later registration of the same pair replaces
    /// the earlier one.
    pub fn register<B>(&mut self, app: &str, publish_type: &str, builder: B)
    where
        B: PublishBuilder + 'static,
    {
        let replaced = self
            .builders
            .entry(app.to_string())
            .or_default()
            .insert(publish_type.to_string(), Box::new(builder));
        if replaced.is_some() {
            log::debug!(target: "ptx::publish", "Replaced builder for {}/{}", app, publish_type);
        }
    }

    /// Build (or reuse) the orchestrator for `(app, publish_type)`.
    pub fn create(&mut self, app: &str, publish_type: &str, args: PublishArgs) -> FactoryResult<SharedPublish> {
        let builders = self
            .builders
            .get_mut(app)
            .ok_or_else(|| FactoryError::UnknownApp(app.to_string()))?;
        let builder = builders
            .get_mut(publish_type)
            .ok_or_else(|| FactoryError::UnknownPublishType {
                app: app.to_string(),
                publish_type: publish_type.to_string(),
            })?;
        Ok(builder.build(args))
    }

    /// Registered `(app, publish type)` pairs, sorted.
    pub fn registered(&self) -> Vec<(&str, &str)> {
        self.builders
            .iter()
            .flat_map(|(app, types)| types.keys().map(move |t| (app.as_str(), t.as_str())))
            .collect()
    }
}

impl std::fmt::Debug for PublishFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishFactory")
            .field("registered", &self.registered())
            .finish()
    }
}
