//! Persistence layer: Upstash Redis (Vercel KV) over its REST protocol.

pub mod bot_store;
pub mod kv;

pub use bot_store::BotStore;
pub use kv::KvClient;
