use crate::config::CasebookConfig;
use crate::database::Database;
use anyhow::{Context, Result};
use std::fs;

pub struct BootstrapResources {
    pub directories_created: Vec<String>,
    pub database_initialized: bool,
    pub database: Database,
}

pub fn initialize(config: &CasebookConfig) -> Result<BootstrapResources> {
    let mut directories_created = Vec::new();
    create_dir_if_missing(&config.paths.data_dir, &mut directories_created)?;
    create_dir_if_missing(&config.paths.logs_dir, &mut directories_created)?;

    let database = Database::connect(&config.paths)
        .with_context(|| format!("failed to open {}", config.paths.db_path.display()))?;
    let database_initialized = database
        .ensure_migrations()
        .context("failed to apply database migrations")?;

    Ok(BootstrapResources {
        directories_created,
        database_initialized,
        database,
    })
}

fn create_dir_if_missing(path: &std::path::Path, created: &mut Vec<String>) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
        created.push(path.display().to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CasebookPaths;

    #[test]
    fn initialize_creates_layout_once() {
        let temp = tempfile::tempdir().unwrap();
        let config = CasebookConfig::new(0, CasebookPaths::from_base_dir(temp.path()).unwrap());

        let first = initialize(&config).unwrap();
        assert!(first.database_initialized);
        assert_eq!(first.directories_created.len(), 2);
        assert!(config.paths.db_path.exists());
        drop(first);

        let second = initialize(&config).unwrap();
        assert!(!second.database_initialized);
        assert!(second.directories_created.is_empty());
    }
}
