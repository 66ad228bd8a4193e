//! # Lifecycle Events
//!
//! The engine does not own the list of lifecycle names. The host hands it an
//! [`EventCatalog`] and the dispatcher rejects anything outside it, except for
//! [`IDLE_PROBE_EVENT`].

use std::collections::BTreeSet;

/// Internal sentinel event.
///
/// Dispatching it opens and closes a run that no plugin implements, which is a
/// cheap way to get a queue-empty notification once everything else has
/// drained.
pub const IDLE_PROBE_EVENT: &str = "IDLE_PROBE";

/// The closed set of lifecycle names known to the host.
#[derive(Debug, Clone, Default)]
pub struct EventCatalog {
    names: BTreeSet<String>,
}

impl EventCatalog {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, event: &str) -> bool {
        self.names.contains(event)
    }

    /// Whether the dispatcher accepts `event`: a catalogue name or the sentinel.
    pub fn accepts(&self, event: &str) -> bool {
        event == IDLE_PROBE_EVENT || self.contains(event)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_is_accepted_but_not_listed() {
        let catalog = EventCatalog::new(["sourceNodes", "createPages"]);
        assert!(catalog.accepts(IDLE_PROBE_EVENT));
        assert!(!catalog.contains(IDLE_PROBE_EVENT));
        assert!(catalog.accepts("createPages"));
        assert!(!catalog.accepts("createPage"));
        assert_eq!(catalog.iter().collect::<Vec<_>>(), ["createPages", "sourceNodes"]);
    }
}
