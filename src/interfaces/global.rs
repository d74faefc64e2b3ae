//! Process-wide registry and the free-function query surface over it.
use super::registry::InterfaceRegistry;
use crate::config::ConformanceConfig;
use crate::contract::Contract;
use crate::query::Host;
use crate::store::{Scope, TypeExpr};
use crate::validation::ConformanceError;
use std::sync::{Arc, OnceLock};

static GLOBAL: OnceLock<InterfaceRegistry> = OnceLock::new();

/// The shared registry, created with the default config on first use.
pub fn global() -> &'static InterfaceRegistry {
    GLOBAL.get_or_init(InterfaceRegistry::default)
}

/// Installs `config` for the shared registry. Returns `false` if it already exists.
pub fn init_global(config: ConformanceConfig) -> bool {
    GLOBAL.set(InterfaceRegistry::with_config(config)).is_ok()
}

pub fn define_interface(
    identity: &str,
    alias: Option<&str>,
    block: &str,
) -> Result<Arc<Contract>, ConformanceError> {
    global().define_interface(identity, alias, block)
}

pub fn implements<H: Host + ?Sized>(
    host: &H,
    candidate: &TypeExpr,
    interface: &str,
    scopes: Option<&[Scope]>,
) -> bool {
    global().implements(host, candidate, interface, scopes)
}

pub fn assert_implements<H: Host + ?Sized>(
    host: &H,
    candidate: &TypeExpr,
    interface: &str,
) -> Result<(), ConformanceError> {
    global().assert_implements(host, candidate, interface)
}

pub fn is_interface_type(identity: &str) -> bool {
    global().is_interface_type(identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Environment;

    #[test]
    fn test_global_surface() {
        let mut env = Environment::new();
        env.declare_type("Queue", None).unwrap();
        let queue = TypeExpr::named("Queue");
        let main = Scope::new("Main");
        env.define_method(&main, "enqueue!", vec![queue.clone(), TypeExpr::Any], queue.clone());

        // Other tests never touch the shared registry, so this name is free.
        define_interface("GlobalQueueLike", Some("Q"), "enqueue!(q::Q, item)").unwrap();
        assert!(is_interface_type("GlobalQueueLike"));
        assert!(!init_global(ConformanceConfig::default()));

        assert!(implements(&env, &queue, "GlobalQueueLike", None));
        assert_implements(&env, &queue, "GlobalQueueLike").unwrap();
        assert!(global().is_registered(&queue, "GlobalQueueLike"));
    }
}
