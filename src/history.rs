use std::sync::{Mutex, MutexGuard, PoisonError};

/// Options of a programmatic navigation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigateOptions {
    /// Replace the current entry instead of pushing a new one.
    pub replace: bool,
    /// State attached to the new entry; login redirects carry the original location here.
    pub state: Option<String>,
}

/// Navigator
///
/// The navigation primitive the shell drives when it follows a redirect.
pub trait Navigator: Send + Sync {
    fn current(&self) -> String;
    fn navigate_to(&self, path: &str, options: NavigateOptions);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub path: String,
    pub state: Option<String>,
}

/// MemoryHistory
///
/// A history stack kept in memory. Never empty.
#[derive(Debug)]
pub struct MemoryHistory {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl MemoryHistory {
    pub fn new(initial: &str) -> Self {
        Self {
            entries: Mutex::new(vec![HistoryEntry {
                path: initial.to_string(),
                state: None,
            }]),
        }
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.lock().clone()
    }

    pub fn current_state(&self) -> Option<String> {
        self.lock().last().and_then(|entry| entry.state.clone())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<HistoryEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Navigator for MemoryHistory {
    fn current(&self) -> String {
        self.lock()
            .last()
            .map(|entry| entry.path.clone())
            .unwrap_or_else(|| "/".to_string())
    }

    fn navigate_to(&self, path: &str, options: NavigateOptions) {
        let entry = HistoryEntry {
            path: path.to_string(),
            state: options.state,
        };
        let mut entries = self.lock();
        if options.replace {
            entries.pop();
        }
        entries.push(entry);
    }
}
