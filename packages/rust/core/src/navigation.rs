//! Page state machine: connect page, workspace tabs, KG chat page.

use std::fmt;

use schemaconsole_shared::{ConsoleError, Result};

use crate::session::ChatGate;

/// Tabs inside the workspace page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WorkspaceTab {
    #[default]
    Metadata,
    Mapping,
    Chatbot,
}

impl WorkspaceTab {
    pub const ALL: [WorkspaceTab; 3] = [Self::Metadata, Self::Mapping, Self::Chatbot];

    pub fn title(self) -> &'static str {
        match self {
            Self::Metadata => "Metadata",
            Self::Mapping => "Mapping",
            Self::Chatbot => "Chatbot",
        }
    }
}

/// Top-level page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Page {
    #[default]
    Config,
    Workspace(WorkspaceTab),
    Chat,
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config => f.write_str("config"),
            Self::Workspace(tab) => write!(f, "workspace/{}", tab.title().to_ascii_lowercase()),
            Self::Chat => f.write_str("chat"),
        }
    }
}

/// Tracks the current page and applies the allowed transitions.
///
/// A rejected transition returns a validation error and leaves the page
/// unchanged.
#[derive(Debug, Clone, Default)]
pub struct Navigator {
    page: Page,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start on a given page (used when a session is resumed).
    pub fn at(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> Page {
        self.page
    }

    /// Connect succeeded: config → workspace (metadata tab).
    pub fn connected(&mut self) -> Result<Page> {
        match self.page {
            Page::Config => self.go(Page::Workspace(WorkspaceTab::Metadata)),
            other => Err(invalid(other, "connect")),
        }
    }

    /// Switch workspace tabs.
    pub fn select_tab(&mut self, tab: WorkspaceTab) -> Result<Page> {
        match self.page {
            Page::Workspace(_) => self.go(Page::Workspace(tab)),
            other => Err(invalid(other, "select a workspace tab")),
        }
    }

    /// Enter the KG chat page. Requires a ready gate.
    pub fn open_chat(&mut self, gate: &ChatGate) -> Result<Page> {
        if !matches!(self.page, Page::Workspace(_)) {
            return Err(invalid(self.page, "open chat"));
        }
        if !gate.is_ready() {
            return Err(ConsoleError::Session(
                "Session Not Initialized: connect and load the knowledge graph first".into(),
            ));
        }
        self.go(Page::Chat)
    }

    /// Back from chat to the workspace chatbot tab.
    pub fn leave_chat(&mut self) -> Result<Page> {
        match self.page {
            Page::Chat => self.go(Page::Workspace(WorkspaceTab::Chatbot)),
            other => Err(invalid(other, "leave chat")),
        }
    }

    /// Exit to the config page. Allowed from anywhere.
    pub fn exit(&mut self) -> Page {
        self.page = Page::Config;
        self.page
    }

    fn go(&mut self, page: Page) -> Result<Page> {
        tracing::debug!(from = %self.page, to = %page, "navigate");
        self.page = page;
        Ok(page)
    }
}

fn invalid(page: Page, action: &str) -> ConsoleError {
    ConsoleError::validation(format!("cannot {action} from the {page} page"))
}
