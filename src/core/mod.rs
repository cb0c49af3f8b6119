pub mod config;
pub mod discovery;
pub mod error;
pub mod graph;
pub mod ledger;
pub mod markdown;
pub mod navigate;
pub mod network;
pub mod node;
pub mod output;
pub mod relationship;
pub mod schemas;
pub mod store;
pub mod time;
pub mod validate;
