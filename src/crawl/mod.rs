//! Same-origin crawl frontier.

mod frontier;
mod links;

pub use frontier::{CrawlFrontier, FrontierEntry};
pub use links::extract_same_origin_links;
