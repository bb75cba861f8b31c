//! TUI screen definitions.
//!
//! Screens own their form and view state. Key handling returns an
//! [`Action`] and the app performs it, so screens never touch the network.

pub(crate) mod chat;
pub(crate) mod connect;
pub(crate) mod mapping;
pub(crate) mod metadata;

use std::fmt;

use schemaconsole_core::connect::ConnectForm;
use schemaconsole_core::mapping::MappingOptions;
use schemaconsole_core::navigation::{Page, WorkspaceTab};
use schemaconsole_shared::{DbConfig, OutputFormat};

/// Tabs shown in the tab bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tab {
    Connect,
    Metadata,
    Mapping,
    Chat,
}

impl Tab {
    pub(crate) const ALL: [Tab; 4] = [Self::Connect, Self::Metadata, Self::Mapping, Self::Chat];

    /// Which tab a page belongs to.
    pub(crate) fn of(page: Page) -> Self {
        match page {
            Page::Config => Self::Connect,
            Page::Workspace(WorkspaceTab::Metadata) => Self::Metadata,
            Page::Workspace(WorkspaceTab::Mapping) => Self::Mapping,
            Page::Workspace(WorkspaceTab::Chatbot) | Page::Chat => Self::Chat,
        }
    }

    pub(crate) fn index(self) -> usize {
        Self::ALL.iter().position(|t| *t == self).unwrap_or(0)
    }

    /// Workspace tab behind this tab, if any.
    pub(crate) fn workspace(self) -> Option<WorkspaceTab> {
        match self {
            Self::Connect => None,
            Self::Metadata => Some(WorkspaceTab::Metadata),
            Self::Mapping => Some(WorkspaceTab::Mapping),
            Self::Chat => Some(WorkspaceTab::Chatbot),
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "Connect"),
            Self::Metadata => write!(f, "Metadata"),
            Self::Mapping => write!(f, "Mapping"),
            Self::Chat => write!(f, "Chat"),
        }
    }
}

/// Work a screen asks the app to do.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Action {
    None,
    Status(String),
    Connect(Box<ConnectForm>),
    GenerateMetadata(OutputFormat),
    DownloadMetadata,
    RunMapping {
        target: Box<DbConfig>,
        options: MappingOptions,
    },
    PersistMapping,
    ExportMapping,
    DownloadMapping,
    OpenChat,
    LeaveChat,
    Ask(String),
    NewChat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_of_page() {
        assert_eq!(Tab::of(Page::Config), Tab::Connect);
        assert_eq!(Tab::of(Page::Workspace(WorkspaceTab::Mapping)), Tab::Mapping);
        assert_eq!(Tab::of(Page::Chat), Tab::Chat);
        assert_eq!(Tab::of(Page::Workspace(WorkspaceTab::Chatbot)).index(), 3);
        assert_eq!(Tab::Connect.workspace(), None);
    }
}
