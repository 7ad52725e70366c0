use crate::registry::EnrollmentPolicy;
use crate::storage::DurabilityMode;
use std::path::{Path, PathBuf};

/// Store configuration
///
/// Either purely in-memory (the default) or backed by a data directory that
/// holds the write-ahead log and the latest snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Directory for WAL and snapshot files; `None` keeps nothing on disk
    pub data_dir: Option<PathBuf>,

    pub durability: DurabilityMode,

    /// Committed transactions between automatic snapshots
    pub checkpoint_threshold: usize,

    /// How enrollments outside the student's chosen college are treated
    pub enrollment_policy: EnrollmentPolicy,
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self {
            data_dir: None,
            durability: DurabilityMode::None,
            checkpoint_threshold: 1000,
            enrollment_policy: EnrollmentPolicy::default(),
        }
    }

    pub fn persistent(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: Some(data_dir.as_ref().to_path_buf()),
            durability: DurabilityMode::default(),
            ..Self::in_memory()
        }
    }

    pub fn durability(mut self, mode: DurabilityMode) -> Self {
        self.durability = mode;
        self
    }

    pub fn checkpoint_threshold(mut self, threshold: usize) -> Self {
        self.checkpoint_threshold = threshold;
        self
    }

    pub fn enrollment_policy(mut self, policy: EnrollmentPolicy) -> Self {
        self.enrollment_policy = policy;
        self
    }

    pub fn is_persistent(&self) -> bool {
        self.data_dir.is_some() && self.durability != DurabilityMode::None
    }

    /// Parse from connection string
    ///
    /// Format: `campusdb://memory` or
    /// `campusdb:///path/to/dir?durability=sync&checkpoint=500&policy=strict`
    ///
    /// # Examples
    ///
    /// ```
    /// use campusdb::StoreConfig;
    ///
    /// let config = StoreConfig::from_url("campusdb:///var/lib/campus?durability=sync").unwrap();
    /// assert!(config.is_persistent());
    /// ```
    pub fn from_url(url: &str) -> Result<Self, String> {
        let rest = url
            .strip_prefix("campusdb://")
            .ok_or_else(|| "URL must start with 'campusdb://'".to_string())?;

        let (location, query) = match rest.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (rest, None),
        };

        let mut config = match location {
            "memory" | "" => Self::in_memory(),
            path => Self::persistent(path),
        };

        for pair in query.into_iter().flat_map(|q| q.split('&')).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("Invalid query parameter '{}'", pair))?;
            match key {
                "durability" => config.durability = value.parse()?,
                "checkpoint" => {
                    config.checkpoint_threshold = value
                        .parse()
                        .map_err(|_| format!("Invalid checkpoint threshold '{}'", value))?
                }
                "policy" => config.enrollment_policy = value.parse()?,
                other => return Err(format!("Unknown parameter '{}'", other)),
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Convert to connection string
    pub fn to_url(&self) -> String {
        let location = match &self.data_dir {
            Some(dir) => dir.display().to_string(),
            None => "memory".to_string(),
        };
        format!(
            "campusdb://{}?durability={}&checkpoint={}&policy={}",
            location, self.durability, self.checkpoint_threshold, self.enrollment_policy
        )
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.checkpoint_threshold == 0 {
            return Err("checkpoint_threshold must be > 0".to_string());
        }

        if self.data_dir.is_none() && self.durability != DurabilityMode::None {
            return Err(format!(
                "Durability '{}' requires a data directory",
                self.durability
            ));
        }

        if let Some(dir) = &self.data_dir {
            if dir.as_os_str().is_empty() {
                return Err("Data directory cannot be empty".to_string());
            }
        }

        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.data_dir, None);
        assert_eq!(config.durability, DurabilityMode::None);
        assert_eq!(config.enrollment_policy, EnrollmentPolicy::Advisory);
        assert!(!config.is_persistent());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = StoreConfig::persistent("/tmp/campus")
            .durability(DurabilityMode::Sync)
            .checkpoint_threshold(10)
            .enrollment_policy(EnrollmentPolicy::Strict);

        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/campus")));
        assert_eq!(config.durability, DurabilityMode::Sync);
        assert_eq!(config.checkpoint_threshold, 10);
        assert_eq!(config.enrollment_policy, EnrollmentPolicy::Strict);
        assert!(config.is_persistent());
    }

    #[test]
    fn test_from_url() {
        let config =
            StoreConfig::from_url("campusdb:///data/campus?durability=sync&checkpoint=50&policy=strict")
                .unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/data/campus")));
        assert_eq!(config.durability, DurabilityMode::Sync);
        assert_eq!(config.checkpoint_threshold, 50);
        assert_eq!(config.enrollment_policy, EnrollmentPolicy::Strict);

        let memory = StoreConfig::from_url("campusdb://memory").unwrap();
        assert_eq!(memory, StoreConfig::in_memory());
    }

    #[test]
    fn test_invalid_url() {
        assert!(StoreConfig::from_url("postgres://localhost").is_err());
        assert!(StoreConfig::from_url("campusdb:///data?durability=maybe").is_err());
        assert!(StoreConfig::from_url("campusdb:///data?checkpoint=0").is_err());
        assert!(StoreConfig::from_url("campusdb:///data?colour=blue").is_err());
        assert!(StoreConfig::from_url("campusdb://memory?durability=sync").is_err());
    }

    #[test]
    fn test_to_url_round_trips() {
        let config = StoreConfig::persistent("/data/campus").checkpoint_threshold(7);
        assert_eq!(StoreConfig::from_url(&config.to_url()).unwrap(), config);
    }
}
