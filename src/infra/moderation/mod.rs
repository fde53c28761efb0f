// Infrastructure for the moderation pipeline: the HTTP range fetcher and
// the magic-number content sniffer.

pub mod content_sniffer;
pub mod http_fetcher;

pub use content_sniffer::*;
pub use http_fetcher::*;
