pub mod adapters;
pub mod config;
pub mod enrich;
pub mod error;
pub mod http_client;
pub mod merge;
pub mod normalize;
pub mod orchestrator;
pub mod record;
pub mod retry;
pub mod sequencer;
pub mod server;
pub mod stat_parse;
