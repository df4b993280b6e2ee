//! Environment variables for a server's startup

use std::collections::BTreeMap;

use crate::client::{Container, Egg};
use crate::resolver::OptionResolver;

/// What a variable falls back to when no option names it
#[derive(Debug, Clone, Copy)]
pub enum EnvironmentBase<'a> {
    /// Egg defaults only (create)
    EggDefaults,
    /// The server's current value first, then the egg default (change package)
    Current(&'a Container),
}

/// Compute the environment map for every variable the egg declares.
///
/// Per variable: option named by the friendly name, else by the env key, else
/// the base. Variables with nothing to fall back to are left out when a
/// current container is given and sent as `""` otherwise.
pub fn build_environment(
    egg: &Egg,
    resolver: &OptionResolver<'_>,
    base: EnvironmentBase<'_>,
) -> BTreeMap<String, String> {
    let mut environment = BTreeMap::new();

    for variable in egg.variables() {
        let value = resolver
            .get(&variable.name)
            .or_else(|| resolver.get(&variable.env_variable));

        let value = match (value, base) {
            (Some(value), _) => Some(value),
            (None, EnvironmentBase::Current(container)) => container
                .env_value(&variable.env_variable)
                .or_else(|| variable.default_value.clone()),
            (None, EnvironmentBase::EggDefaults) => {
                Some(variable.default_value.clone().unwrap_or_default())
            }
        };

        if let Some(value) = value {
            environment.insert(variable.env_variable.clone(), value);
        }
    }

    environment
}
