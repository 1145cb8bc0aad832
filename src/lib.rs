pub mod api;
pub mod channels;
pub mod config;
pub mod dispatch;
pub mod events;
pub mod extractor; // Exposes MockExtractor for tests
pub mod humanize;
pub mod observability;
pub mod relay;
