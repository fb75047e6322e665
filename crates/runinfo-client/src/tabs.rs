//! Output tabs.
//!
//! A tab is the local home of one job: a title, a status, and an
//! append-only output log. Tabs are numbered from 1 and numbers are never
//! reused within a session, so a late frame can never land in a newer tab.

use std::fmt;

/// Tab number, unique per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TabId(u64);

const OUTPUT_PREFIX: &str = "tabContentOutput-";

impl TabId {
    pub fn new(n: u64) -> Self {
        Self(n)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Id of the output log. This is the `context` sent with the request.
    pub fn output_id(self) -> String {
        format!("{OUTPUT_PREFIX}{}", self.0)
    }

    /// Inverse of [`TabId::output_id`].
    pub fn from_output_id(context: &str) -> Option<Self> {
        let digits = context.strip_prefix(OUTPUT_PREFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(Self)
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabStatus {
    /// Request sent, no terminal frame yet.
    Pending,
    /// A download token arrived.
    Done,
    /// The server reported an error.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub id: TabId,
    pub title: String,
    pub output: String,
    pub status: TabStatus,
}

impl Tab {
    /// Output split into lines, without the trailing empty line.
    pub fn lines(&self) -> Vec<&str> {
        self.output.lines().collect()
    }

    fn append_line(&mut self, line: &str) {
        self.output.push_str(line);
        self.output.push('\n');
    }
}

#[derive(Debug, Clone)]
pub struct TabRegistry {
    next: u64,
    tabs: Vec<Tab>,
    active: Option<TabId>,
}

impl Default for TabRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TabRegistry {
    pub fn new() -> Self {
        Self {
            next: 1,
            tabs: Vec::new(),
            active: None,
        }
    }

    /// Create a tab at the end of the strip. The new tab is not shown yet.
    pub fn open(&mut self, title: impl Into<String>) -> TabId {
        let id = TabId(self.next);
        self.next += 1;
        self.tabs.push(Tab {
            id,
            title: title.into(),
            output: String::new(),
            status: TabStatus::Pending,
        });
        id
    }

    /// Make `id` the active tab. Returns false if it does not exist.
    pub fn show(&mut self, id: TabId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.active = Some(id);
        true
    }

    /// Remove a tab. If any tabs remain, the first one becomes active.
    pub fn close(&mut self, id: TabId) -> bool {
        let Some(pos) = self.tabs.iter().position(|t| t.id == id) else {
            return false;
        };
        self.tabs.remove(pos);
        self.active = self.tabs.first().map(|t| t.id);
        true
    }

    pub fn get(&self, id: TabId) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id == id)
    }

    /// Look up a live tab by the `context` of a response.
    pub fn by_context_mut(&mut self, context: &str) -> Option<&mut Tab> {
        let id = TabId::from_output_id(context)?;
        // Exact match only: "tabContentOutput-07" is not tab 7.
        if id.output_id() != context {
            return None;
        }
        self.tabs.iter_mut().find(|t| t.id == id)
    }

    /// Append one line to the tab addressed by `context`.
    ///
    /// Returns the tab id, or `None` if no such tab is open.
    pub fn append(&mut self, context: &str, line: &str) -> Option<TabId> {
        let tab = self.by_context_mut(context)?;
        tab.append_line(line);
        Some(tab.id)
    }

    pub fn set_status(&mut self, id: TabId, status: TabStatus) {
        if let Some(tab) = self.tabs.iter_mut().find(|t| t.id == id) {
            tab.status = status;
        }
    }

    pub fn active(&self) -> Option<TabId> {
        self.active
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }
}
