//! In-memory page history.
//!
//! The current page is never reflected in a shareable URL: game phases only
//! make sense inside a live session. The server moves every client between
//! phases with `navigate`; local code only ever goes back.

use std::fmt;

/// Every page a client can be on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Page {
    #[default]
    Nickname,
    Lobby,
    Before,
    PlayersChoose,
    HostChooses,
    After,
    Scoreboard,
}

impl Page {
    pub const ALL: [Page; 7] = [
        Page::Nickname,
        Page::Lobby,
        Page::Before,
        Page::PlayersChoose,
        Page::HostChooses,
        Page::After,
        Page::Scoreboard,
    ];

    /// Route path without the leading slash.
    pub const fn path(self) -> &'static str {
        match self {
            Page::Nickname => "nickname",
            Page::Lobby => "lobby",
            Page::Before => "before",
            Page::PlayersChoose => "players_choose",
            Page::HostChooses => "host_chooses",
            Page::After => "after",
            Page::Scoreboard => "scoreboard",
        }
    }

    /// Resolve a path as sent by the server. Matching ignores case and an
    /// optional leading `/`.
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.to_lowercase();
        let path = path.strip_prefix('/').unwrap_or(&path);
        Self::ALL.into_iter().find(|page| page.path() == path)
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.path())
    }
}

/// History of visited pages with a cursor, like a browser's memory history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigator {
    entries: Vec<Page>,
    index: usize,
}

impl Default for Navigator {
    fn default() -> Self {
        Self {
            entries: vec![Page::Nickname],
            index: 0,
        }
    }
}

impl Navigator {
    pub fn current(&self) -> Page {
        self.entries.get(self.index).copied().unwrap_or_default()
    }

    /// Visit a page, discarding any forward entries.
    pub fn push(&mut self, page: Page) {
        self.entries.truncate(self.index + 1);
        self.entries.push(page);
        self.index = self.entries.len() - 1;
    }

    /// Visit the page named by a server path. Unknown paths redirect to
    /// [`Page::Nickname`]. Returns the page landed on.
    pub fn push_path(&mut self, path: &str) -> Page {
        let page = Page::from_path(path).unwrap_or_else(|| {
            tracing::warn!(path = %path, "unknown page, redirecting to nickname");
            Page::Nickname
        });
        self.push(page);
        page
    }

    /// Step back one entry. Returns `false` at the start of history.
    pub fn back(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        self.index -= 1;
        true
    }

    /// Step forward one entry. Returns `false` at the end of history.
    pub fn forward(&mut self) -> bool {
        if self.index + 1 >= self.entries.len() {
            return false;
        }
        self.index += 1;
        true
    }

    pub fn can_go_back(&self) -> bool {
        self.index > 0
    }

    /// Number of entries in the history.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn starts_on_nickname() {
        let nav = Navigator::default();
        assert_eq!(nav.current(), Page::Nickname);
        assert!(!nav.can_go_back());
    }

    #[test]
    fn server_paths_are_case_insensitive() {
        assert_eq!(Page::from_path("/LOBBY"), Some(Page::Lobby));
        assert_eq!(Page::from_path("Players_Choose"), Some(Page::PlayersChoose));
        assert_eq!(Page::from_path("/host_chooses"), Some(Page::HostChooses));
        assert_eq!(Page::from_path("/settings"), None);
    }

    #[test]
    fn unknown_path_redirects_to_nickname() {
        let mut nav = Navigator::default();
        nav.push_path("/LOBBY");
        assert_eq!(nav.push_path("/nowhere"), Page::Nickname);
        assert_eq!(nav.current(), Page::Nickname);
    }

    #[test]
    fn back_and_forward_walk_history() {
        let mut nav = Navigator::default();
        nav.push(Page::Lobby);
        nav.push(Page::Before);
        assert!(nav.back());
        assert_eq!(nav.current(), Page::Lobby);
        assert!(nav.forward());
        assert_eq!(nav.current(), Page::Before);
        assert!(!nav.forward());
    }

    #[test]
    fn push_after_back_drops_forward_entries() {
        let mut nav = Navigator::default();
        nav.push(Page::Lobby);
        nav.push(Page::Before);
        nav.back();
        nav.push(Page::Scoreboard);
        assert_eq!(nav.len(), 3);
        assert!(!nav.forward());
        assert!(nav.back());
        assert_eq!(nav.current(), Page::Lobby);
    }

    #[test]
    fn back_at_start_is_refused() {
        let mut nav = Navigator::default();
        assert!(!nav.back());
        assert_eq!(nav.current(), Page::Nickname);
    }

    #[test]
    fn display_includes_leading_slash() {
        assert_eq!(Page::PlayersChoose.to_string(), "/players_choose");
    }
}
