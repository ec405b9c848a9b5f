use std::path::PathBuf;

pub const LOG_ENV: &str = "TERMBOOKD_LOG";
pub const WORKSPACE_ENV: &str = "TERMBOOKD_WORKSPACE";
const DEFAULT_LOG_FILTER: &str = "termbookd=info";

/// Process configuration. Everything workspace-specific lives in the `settings` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub log_filter: String,
    pub workspace: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let log_filter = lookup(LOG_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        let workspace = lookup(WORKSPACE_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Config {
            log_filter,
            workspace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_unset() {
        let cfg = Config::from_lookup(|_| None);
        assert_eq!(cfg.log_filter, "termbookd=info");
        assert_eq!(cfg.workspace, None);
    }

    #[test]
    fn reads_overrides_and_ignores_blank_values() {
        let vars: HashMap<&str, &str> = [
            (LOG_ENV, "termbookd=debug"),
            (WORKSPACE_ENV, "   "),
        ]
        .into_iter()
        .collect();
        let cfg = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.log_filter, "termbookd=debug");
        assert_eq!(cfg.workspace, None);

        let cfg = Config::from_lookup(|k| (k == WORKSPACE_ENV).then(|| "/tmp/school".to_string()));
        assert_eq!(cfg.workspace, Some(PathBuf::from("/tmp/school")));
    }
}
