// Dispatching commands
pub mod run;

// Cluster inspection
pub mod hosts;

use anyhow::Result;
use dispatch::{CodedError, HostSet, Scope};

use crate::Context;
use crate::cli::{ScopeArg, SelectionArgs};
use crate::config::ClusterConfig;
use crate::exit;

/// Load the cluster file, tagging failures with the config exit code
pub fn load_cluster(ctx: &Context) -> Result<ClusterConfig> {
    ClusterConfig::load(ctx.config.as_deref())
        .map_err(|e| CodedError::wrap(exit::CONFIG_INVALID, e).into())
}

pub fn scope(selection: &SelectionArgs) -> Scope {
    let mut scope = match selection.scope {
        ScopeArg::Segments => Scope::segments(),
        ScopeArg::Hosts => Scope::hosts(),
    };
    if selection.coordinator {
        scope = scope.with_coordinator();
    }
    if selection.mirrors {
        scope = scope.with_mirrors();
    }
    scope
}

/// Resolve a selection against the cluster file
pub fn select(config: &ClusterConfig, selection: &SelectionArgs) -> Result<HostSet> {
    config
        .cluster()
        .select(scope(selection))
        .map_err(|e| CodedError::wrap(exit::CONFIG_INVALID, e).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch::Target;

    #[test]
    fn test_scope_from_selection() {
        let selection = SelectionArgs {
            scope: ScopeArg::Hosts,
            coordinator: true,
            mirrors: false,
        };
        let resolved = scope(&selection);
        assert_eq!(resolved.target, Target::Hosts);
        assert!(resolved.include_coordinator);
        assert!(!resolved.include_mirrors);

        assert_eq!(scope(&SelectionArgs::default()), Scope::segments());
    }
}
