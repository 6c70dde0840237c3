use std::sync::{Arc, OnceLock};

/// An opaque surface material reference stored per triangle.
///
/// The actual material registry (friction, restitution, debug colors, …)
/// belongs to the embedding engine; a mesh shape only keeps an ordered table
/// of references and hands them back from queries.
pub trait PhysicsMaterial: Send + Sync {
    /// A debug-friendly name for this material.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// A shared reference to a material.
pub type MaterialRef = Arc<dyn PhysicsMaterial>;

struct DefaultPhysicsMaterial;

impl PhysicsMaterial for DefaultPhysicsMaterial {
    fn name(&self) -> &str {
        "default"
    }
}

/// The material reported by meshes built without a material table.
pub fn default_material() -> MaterialRef {
    static DEFAULT: OnceLock<MaterialRef> = OnceLock::new();
    DEFAULT.get_or_init(|| Arc::new(DefaultPhysicsMaterial)).clone()
}
