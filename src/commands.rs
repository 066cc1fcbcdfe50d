//! The two commands the plugin registers with the host.

use std::collections::HashSet;
use std::fmt;

/// Dockable panels owned by the plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelId {
    ElementOutliner,
    MaterialPalette,
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanelId::ElementOutliner => f.write_str("Element Outliner"),
            PanelId::MaterialPalette => f.write_str("Material Palette"),
        }
    }
}

/// Panel hosting provided by the host application.
pub trait PanelHost {
    fn show_panel(&mut self, panel: PanelId);

    /// Show a hidden panel or hide a visible one. Returns the new visibility.
    fn toggle_panel(&mut self, panel: PanelId) -> bool;

    fn is_panel_visible(&self, panel: PanelId) -> bool;
}

/// Tracks panel visibility without a UI.
#[derive(Debug, Default)]
pub struct HeadlessPanelHost {
    visible: HashSet<PanelId>,
}

impl HeadlessPanelHost {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PanelHost for HeadlessPanelHost {
    fn show_panel(&mut self, panel: PanelId) {
        self.visible.insert(panel);
    }

    fn toggle_panel(&mut self, panel: PanelId) -> bool {
        if self.visible.remove(&panel) {
            false
        } else {
            self.visible.insert(panel);
            true
        }
    }

    fn is_panel_visible(&self, panel: PanelId) -> bool {
        self.visible.contains(&panel)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ShowElementOutliner,
    ToggleMaterialPalette,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    Success,
    Failure,
}

impl Command {
    pub const ALL: [Command; 2] = [Command::ShowElementOutliner, Command::ToggleMaterialPalette];

    /// Name typed on the host command line.
    pub fn english_name(self) -> &'static str {
        match self {
            Command::ShowElementOutliner => "CncElementOutliner",
            Command::ToggleMaterialPalette => "CncMaterialPalette",
        }
    }

    /// Case-insensitive lookup by [`english_name`](Command::english_name).
    pub fn from_name(name: &str) -> Option<Command> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.english_name().eq_ignore_ascii_case(name))
    }

    pub fn panel(self) -> PanelId {
        match self {
            Command::ShowElementOutliner => PanelId::ElementOutliner,
            Command::ToggleMaterialPalette => PanelId::MaterialPalette,
        }
    }

    pub fn run(self, panels: &mut dyn PanelHost) -> CommandResult {
        let panel = self.panel();
        match self {
            Command::ShowElementOutliner => {
                panels.show_panel(panel);
                tracing::info!(panel = %panel, "panel shown");
            }
            Command::ToggleMaterialPalette => {
                let visible = panels.toggle_panel(panel);
                tracing::info!(panel = %panel, visible, "panel toggled");
            }
        }
        CommandResult::Success
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.english_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_names() {
        assert_eq!(Command::ShowElementOutliner.english_name(), "CncElementOutliner");
        assert_eq!(Command::ToggleMaterialPalette.to_string(), "CncMaterialPalette");
        assert_eq!(
            Command::from_name("cncmaterialpalette"),
            Some(Command::ToggleMaterialPalette)
        );
        assert_eq!(Command::from_name("CncUnknown"), None);
    }

    #[test]
    fn test_show_outliner_is_idempotent() {
        let mut panels = HeadlessPanelHost::new();
        assert_eq!(Command::ShowElementOutliner.run(&mut panels), CommandResult::Success);
        Command::ShowElementOutliner.run(&mut panels);
        assert!(panels.is_panel_visible(PanelId::ElementOutliner));
    }

    #[test]
    fn test_toggle_palette() {
        let mut panels = HeadlessPanelHost::new();
        Command::ToggleMaterialPalette.run(&mut panels);
        assert!(panels.is_panel_visible(PanelId::MaterialPalette));
        Command::ToggleMaterialPalette.run(&mut panels);
        assert!(!panels.is_panel_visible(PanelId::MaterialPalette));
        assert!(!panels.is_panel_visible(PanelId::ElementOutliner));
    }
}
