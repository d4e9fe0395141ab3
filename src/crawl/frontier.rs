use std::collections::{HashSet, VecDeque};

use tracing::debug;
use url::Url;

use super::links::extract_same_origin_links;
use crate::normalize::normalize_url;

/// A `(url, depth)` pair waiting to be visited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: String,
    pub depth: u32,
}

/// Breadth-first, depth-bounded, same-origin crawl queue for one snapshot.
#[derive(Debug)]
pub struct CrawlFrontier {
    origin: Url,
    max_depth: u32,
    queue: VecDeque<FrontierEntry>,
    visited: HashSet<String>,
    queued: HashSet<String>,
}

impl CrawlFrontier {
    /// Seed the frontier with the root URL at depth 0.
    #[must_use]
    pub fn new(root: &Url, max_depth: u32) -> Self {
        let root_key = normalize_url(root.as_str());
        let mut queue = VecDeque::new();
        queue.push_back(FrontierEntry {
            url: root_key.clone(),
            depth: 0,
        });
        Self {
            origin: root.clone(),
            max_depth,
            queue,
            visited: HashSet::new(),
            queued: HashSet::from([root_key]),
        }
    }

    /// Pop the next unvisited entry within the depth limit, marking it visited.
    pub fn dequeue(&mut self) -> Option<FrontierEntry> {
        while let Some(entry) = self.queue.pop_front() {
            if entry.depth > self.max_depth || self.visited.contains(&entry.url) {
                continue;
            }
            self.visited.insert(entry.url.clone());
            return Some(entry);
        }
        None
    }

    /// Queue the same-origin links of a captured page at `depth + 1`.
    ///
    /// Pages at the depth limit are not expanded. Returns the number of new
    /// entries queued.
    pub fn enqueue_same_origin_links(&mut self, page_url: &str, html: &str, depth: u32) -> usize {
        if depth >= self.max_depth {
            return 0;
        }
        let Ok(base) = Url::parse(page_url) else {
            return 0;
        };

        let mut added = 0;
        for link in extract_same_origin_links(html, &base, &self.origin) {
            if self.queued.insert(link.clone()) {
                self.queue.push_back(FrontierEntry {
                    url: link,
                    depth: depth + 1,
                });
                added += 1;
            }
        }

        debug!(url = %page_url, depth, added, "Expanded page links");
        added
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[must_use]
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}
