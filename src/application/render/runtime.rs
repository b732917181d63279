use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;

/// Tracks the newest render started for each page.
///
/// Renders of one page may overlap when input changes quickly. Each render
/// takes a [`RenderTicket`] before it starts; a caller only publishes output
/// whose ticket is still current, so a slow stale render never overwrites the
/// result of a newer one.
#[derive(Default, Clone)]
pub struct RenderGenerations {
    pages: Arc<DashMap<String, Arc<AtomicU64>>>,
}

impl RenderGenerations {
    pub fn new() -> Self {
        Self {
            pages: Arc::new(DashMap::new()),
        }
    }

    /// Start a render for `page_path`, superseding any earlier ticket.
    pub fn begin(&self, page_path: &str) -> RenderTicket {
        let counter = match self.pages.get(page_path) {
            Some(entry) => Arc::clone(entry.value()),
            None => Arc::clone(
                self.pages
                    .entry(page_path.to_string())
                    .or_insert_with(|| Arc::new(AtomicU64::new(0)))
                    .value(),
            ),
        };
        let generation = counter.fetch_add(1, Ordering::AcqRel) + 1;
        RenderTicket {
            generation,
            counter,
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RenderTicket {
    generation: u64,
    counter: Arc<AtomicU64>,
}

impl RenderTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether no newer render of the same page has begun.
    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::Acquire) == self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_ticket_supersedes_older() {
        let generations = RenderGenerations::new();
        let first = generations.begin("/a");
        assert!(first.is_current());

        let second = generations.begin("/a");
        assert!(!first.is_current());
        assert!(second.is_current());
        assert_eq!(second.generation(), first.generation() + 1);
    }

    #[test]
    fn pages_are_tracked_independently() {
        let generations = RenderGenerations::new();
        let a = generations.begin("/a");
        let b = generations.begin("/b");
        generations.begin("/b");

        assert!(a.is_current());
        assert!(!b.is_current());
        assert_eq!(generations.len(), 2);
    }

    #[tokio::test]
    async fn only_the_last_concurrent_ticket_wins() {
        let generations = RenderGenerations::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let generations = generations.clone();
            handles.push(tokio::spawn(async move { generations.begin("/p") }));
        }

        let mut tickets = Vec::new();
        for handle in handles {
            tickets.push(handle.await.expect("task completes"));
        }

        assert_eq!(tickets.iter().filter(|t| t.is_current()).count(), 1);
        let newest = tickets.iter().map(RenderTicket::generation).max();
        assert_eq!(newest, Some(16));
    }
}
