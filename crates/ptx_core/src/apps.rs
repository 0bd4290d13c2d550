//! Per-application publish registrations.

use ptx_factory::NodeBuilder;

use crate::factory::PublishFactory;
use crate::publish::{
    CreateProxy, ExportWorkScene, LookPublish, ModelActivate, ModelPassive, ModelPublish, CREATE_PROXY,
    LOOK_PUBLISH, MODEL_ACTIVATE, MODEL_PASSIVE, WORK_SCENE,
};

pub const MAYA: &str = "MAYA";
pub const BLENDER: &str = "BLENDER";

/// Register the Maya publish types into `factory`.
pub fn register_maya(factory: &mut PublishFactory) {
    factory.register(MAYA, MODEL_ACTIVATE, NodeBuilder::new(ModelActivate::new));
    factory.register(MAYA, MODEL_PASSIVE, NodeBuilder::new(ModelPassive::new));
    factory.register(MAYA, CREATE_PROXY, NodeBuilder::new(CreateProxy::new));
    factory.register(MAYA, WORK_SCENE, NodeBuilder::new(ExportWorkScene::new));
    factory.register(MAYA, LOOK_PUBLISH, NodeBuilder::new(LookPublish::new));
}

pub fn register_blender(factory: &mut PublishFactory) {
    factory.register(BLENDER, MODEL_PASSIVE, NodeBuilder::new(ModelPublish::new));
}

pub fn maya_factory() -> PublishFactory {
    let mut factory = PublishFactory::new();
    register_maya(&mut factory);
    factory
}

pub fn blender_factory() -> PublishFactory {
    let mut factory = PublishFactory::new();
    register_blender(&mut factory);
    factory
}

/// Every application.
pub fn default_factory() -> PublishFactory {
    let mut factory = PublishFactory::new();
    register_maya(&mut factory);
    register_blender(&mut factory);
    factory
}
