//! Live provider implementations and the static registry.

pub mod mock;

use crate::manager::UsagePlugin;

/// The providers compiled into this build, in registration order. Injected
/// into [`crate::manager::Manager::new`] by the embedding application.
pub fn builtin() -> Vec<Box<dyn UsagePlugin>> {
    vec![Box::new(mock::MockPlugin)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_ids_are_unique() {
        let plugins = builtin();
        let mut ids: Vec<&str> = plugins.iter().map(|p| p.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), plugins.len());
    }
}
