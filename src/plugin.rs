//! Plugin composition root.
//!
//! [`Plugin::load`] is what the host calls at startup. It must return
//! quickly, so store initialization is spawned onto the async runtime and
//! everything else (panels, palette, commands) waits on the shared
//! [`InitializationCoordinator`] when it first needs the stores.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::commands::{Command, CommandResult, PanelHost};
use crate::config::{default_data_dir, load_or_default, SuiteConfig, CONFIG_FILE_NAME};
use crate::coordinator::{InitializationCoordinator, ServiceLoader, Services};
use crate::error::InitError;
use crate::host::UiDispatcher;
use crate::logging;
use crate::palette::MaterialPalette;
use crate::panel::OutlinerPanel;

pub struct Plugin {
    config: SuiteConfig,
    coordinator: Arc<InitializationCoordinator>,
    init_task: Option<JoinHandle<()>>,
}

impl Plugin {
    /// Load with the config file from the default data directory, if any.
    pub fn load_default(runtime: &Handle) -> Result<Self> {
        let config = load_or_default(&default_data_dir().join(CONFIG_FILE_NAME))?;
        Ok(Self::load(config, runtime))
    }

    /// Load with the config file inside `data_dir`, if any.
    pub fn load_from_dir(data_dir: &Path, runtime: &Handle) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE_NAME);
        let mut config = load_or_default(&path)
            .with_context(|| format!("Failed to load plugin config from {}", path.display()))?;
        if !path.exists() {
            config.storage.data_dir = data_dir.to_path_buf();
        }
        Ok(Self::load(config, runtime))
    }

    pub fn load(config: SuiteConfig, runtime: &Handle) -> Self {
        let coordinator = InitializationCoordinator::from_storage(config.storage.clone());
        Self::with_coordinator(config, coordinator, runtime)
    }

    /// Load with a custom store loader.
    pub fn with_loader(
        config: SuiteConfig,
        loader: impl ServiceLoader + 'static,
        runtime: &Handle,
    ) -> Self {
        Self::with_coordinator(config, InitializationCoordinator::new(loader), runtime)
    }

    fn with_coordinator(
        config: SuiteConfig,
        coordinator: InitializationCoordinator,
        runtime: &Handle,
    ) -> Self {
        logging::init(&config.logging);
        let coordinator = Arc::new(coordinator);

        let background = coordinator.clone();
        let init_task = runtime.spawn(async move {
            if let Err(e) = background.ensure_ready().await {
                tracing::error!(error = %e, "plugin services unavailable");
            }
        });

        tracing::info!(data_dir = %config.storage.data_dir.display(), "plugin loaded");
        Self {
            config,
            coordinator,
            init_task: Some(init_task),
        }
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &Arc<InitializationCoordinator> {
        &self.coordinator
    }

    /// Both stores, waiting for initialization if it is still running.
    pub async fn services(&self) -> Result<Services, InitError> {
        self.coordinator.ensure_ready().await
    }

    /// The material palette. Available even when the outliner failed.
    pub async fn palette(&self) -> Option<MaterialPalette> {
        if let Err(e) = self.coordinator.ensure_ready().await {
            tracing::debug!(error = %e, "opening palette without outliner");
        }
        let catalog = self.coordinator.catalog()?;
        Some(MaterialPalette::new(catalog, self.config.palette.clone()))
    }

    pub fn outliner_panel(&self, dispatcher: Arc<dyn UiDispatcher>) -> OutlinerPanel {
        OutlinerPanel::new(self.coordinator.clone(), dispatcher)
    }

    pub fn run_command(&self, command: Command, panels: &mut dyn PanelHost) -> CommandResult {
        tracing::debug!(command = %command, "running command");
        command.run(panels)
    }

    /// Run a command typed by name on the host command line.
    pub fn run_named_command(&self, name: &str, panels: &mut dyn PanelHost) -> CommandResult {
        match Command::from_name(name) {
            Some(command) => self.run_command(command, panels),
            None => {
                tracing::warn!(name, "unknown command");
                CommandResult::Failure
            }
        }
    }

    /// Wait for startup work and write both stores to disk.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(task) = self.init_task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "initialization task did not finish cleanly");
            }
        }

        if let Some(catalog) = self.coordinator.catalog() {
            catalog.save().await.context("Failed to save material catalog")?;
        }
        if let Some(outliner) = self.coordinator.outliner() {
            outliner.save().await.context("Failed to save elements")?;
        }
        tracing::info!("plugin shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{HeadlessPanelHost, PanelId};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_initializes_in_background() {
        let tmp = TempDir::new().unwrap();
        let plugin = Plugin::load(SuiteConfig::with_data_dir(tmp.path()), &Handle::current());

        let services = plugin.services().await.unwrap();
        assert!(!services.catalog.is_empty());
        assert!(plugin.coordinator().is_ready());
        plugin.shutdown().await.unwrap();
        assert!(tmp.path().join("materials.json").exists());
        assert!(tmp.path().join("elements.json").exists());
    }

    #[tokio::test]
    async fn test_load_from_dir_without_config_uses_dir() {
        let tmp = TempDir::new().unwrap();
        let plugin = Plugin::load_from_dir(tmp.path(), &Handle::current()).unwrap();
        assert_eq!(plugin.config().storage.data_dir, tmp.path());
        plugin.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_load_from_dir_reads_config() {
        let tmp = TempDir::new().unwrap();
        let data = tmp.path().join("data");
        std::fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            format!(
                "[storage]\ndata_dir = \"{}\"\n[palette]\nprofile_length_mm = 2400.0\n",
                data.display()
            ),
        )
        .unwrap();

        let plugin = Plugin::load_from_dir(tmp.path(), &Handle::current()).unwrap();
        assert_eq!(plugin.config().palette.profile_length_mm, 2400.0);
        plugin.shutdown().await.unwrap();
        assert!(data.join("elements.json").exists());
    }

    #[tokio::test]
    async fn test_named_commands() {
        let tmp = TempDir::new().unwrap();
        let plugin = Plugin::load(SuiteConfig::with_data_dir(tmp.path()), &Handle::current());
        let mut panels = HeadlessPanelHost::new();

        assert_eq!(
            plugin.run_named_command("CncElementOutliner", &mut panels),
            CommandResult::Success
        );
        assert_eq!(
            plugin.run_named_command("CncNothing", &mut panels),
            CommandResult::Failure
        );
        assert!(panels.is_panel_visible(PanelId::ElementOutliner));
        plugin.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_palette_uses_loaded_catalog() {
        let tmp = TempDir::new().unwrap();
        let plugin = Plugin::load(SuiteConfig::with_data_dir(tmp.path()), &Handle::current());
        let palette = plugin.palette().await.unwrap();
        assert_eq!(palette.materials().len(), plugin.services().await.unwrap().catalog.len());
        plugin.shutdown().await.unwrap();
    }
}
