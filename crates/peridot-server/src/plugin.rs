//! The Plugin Registry: named command handlers, auxiliary ports, and
//! periodic timers, discoverable without knowing their names at compile
//! time.
//!
//! Populated by explicit registration calls before the node starts; after
//! that its membership is immutable (individual plugins may still flip
//! their own `enabled` state). This sidesteps the process-wide mutable
//! registry populated by static constructors that the original design
//! relied on.

use serde_json::Value as JsonValue;

/// A registered plugin's view of itself, exposed for status reporting and
/// auxiliary port management.
pub trait Plugin: Send + Sync {
    /// Stable name, matched against the `plugins` configuration option.
    fn name(&self) -> &str;

    /// Whether this plugin's command handling and auxiliary ports are
    /// currently active.
    fn enabled(&self) -> bool;

    /// The per-plugin JSON record embedded in the `status` command's body.
    fn status_json(&self) -> JsonValue {
        serde_json::json!({ "name": self.name(), "enabled": self.enabled() })
    }
}

/// The process-wide, start-time-frozen set of registered plugins.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin. Only valid before the node starts serving.
    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Plugin> {
        self.plugins
            .iter()
            .find(|p| p.name() == name)
            .map(std::convert::AsRef::as_ref)
    }

    pub fn status_json(&self) -> Vec<JsonValue> {
        self.plugins.iter().map(|p| p.status_json()).collect()
    }
}
