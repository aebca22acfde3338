//! Job definitions and registry.
//!
//! Workers describe their jobs in TOML, one file per job. A job with a
//! `[job.single_instance]` table runs under the guard; one without it runs
//! unguarded.

use crate::error::{Error, Result};
use crate::guard::GuardedJob;
use crate::model::{Job, SingleInstance};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Top-level TOML wrapper.
#[derive(Debug, Deserialize)]
struct JobFile {
    job: JobDefinition,
}

/// A job's limits and optional single-instance options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    #[serde(default)]
    pub soft_time_limit: Option<u64>,
    #[serde(default)]
    pub hard_time_limit: Option<u64>,
    #[serde(default)]
    pub single_instance: Option<SingleInstance>,
}

impl JobDefinition {
    /// Parse a single job file.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: JobFile =
            toml::from_str(content).map_err(|e| Error::Config(format!("bad job config: {e}")))?;
        Ok(file.job)
    }

    pub fn job(&self) -> Job {
        Job {
            name: self.name.clone(),
            soft_time_limit: self.soft_time_limit,
            hard_time_limit: self.hard_time_limit,
        }
    }

    /// The job bound to its options, if it is single-instance.
    pub fn guarded(&self) -> Option<GuardedJob> {
        self.single_instance
            .clone()
            .map(|options| options.apply(self.job()))
    }
}

/// Registry of job definitions, indexed by name.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: HashMap<String, JobDefinition>,
}

impl JobRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load all `.toml` files from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let mut registry = Self::empty();

        let entries = std::fs::read_dir(dir)
            .map_err(|e| Error::Config(format!("cannot read job dir {}: {e}", dir.display())))?;

        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "toml") {
                let content = std::fs::read_to_string(&path)?;
                let definition = JobDefinition::from_toml_str(&content)
                    .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
                registry.insert(definition)?;
            }
        }

        Ok(registry)
    }

    /// Add a definition. Names must be unique.
    pub fn insert(&mut self, definition: JobDefinition) -> Result<()> {
        if self.jobs.contains_key(&definition.name) {
            return Err(Error::Config(format!(
                "job {} is defined more than once",
                definition.name
            )));
        }
        self.jobs.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&JobDefinition> {
        self.jobs.get(name)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
