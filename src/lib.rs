//! hivecache - A peer-distributed in-process cache
//!
//! Named groups serve keys from a bounded local cache or load them exactly
//! once across concurrent callers, either from the peer that owns the key
//! on a consistent-hash ring or from a local source callback.

pub mod api;
pub mod byteview;
pub mod cache;
pub mod config;
pub mod error;
pub mod group;
pub mod http;
pub mod models;
pub mod peers;
pub mod ring;
pub mod singleflight;

pub use api::AppState;
pub use byteview::ByteView;
pub use config::Config;
pub use error::GroupError;
pub use group::{Getter, GetterFn, Group, Registry};
pub use http::HttpPool;
