use crate::controller::Limits;
use crate::leaderboard::LEADERBOARD_SIZE;
use crate::reports::TOP_DONORS;
use std::env;
use std::path::PathBuf;

/// Runtime settings read from the environment (and `.env` when present).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub export_dir: PathBuf,
    pub limits: Limits,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("data"),
            export_dir: PathBuf::from("."),
            limits: Limits::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or unparsable values keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let size = |key: &str, default: usize| match non_blank(key) {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    tracing::warn!("Ignoring invalid {}={:?}; using {}", key, raw, default);
                    default
                }
            },
            None => default,
        };

        Config {
            data_dir: non_blank("FOODBRIDGE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            export_dir: non_blank("FOODBRIDGE_EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.export_dir),
            limits: Limits {
                top_donors: size("FOODBRIDGE_TOP_DONORS", TOP_DONORS),
                leaderboard: size("FOODBRIDGE_LEADERBOARD_SIZE", LEADERBOARD_SIZE),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(Config::from_lookup(lookup(&[])), Config::default());
    }

    #[test]
    fn reads_overrides_and_rejects_garbage() {
        let cfg = Config::from_lookup(lookup(&[
            ("FOODBRIDGE_DATA_DIR", "/srv/foodbridge"),
            ("FOODBRIDGE_TOP_DONORS", "6"),
            ("FOODBRIDGE_LEADERBOARD_SIZE", "zero"),
        ]));
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/foodbridge"));
        assert_eq!(cfg.limits.top_donors, 6);
        assert_eq!(cfg.limits.leaderboard, LEADERBOARD_SIZE);
    }
}
