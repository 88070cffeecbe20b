//! voxstream: streaming voice answers.
//!
//! One spoken question goes in; one event stream comes out. The clip is
//! transcribed, answered by a CustomGPT.ai project conversation, and the
//! reply is streamed back as text while it is cut into sentence-sized chunks
//! that are synthesized concurrently. Clients fetch each clip by id as its
//! audio reference arrives.
//!
//! # Quick Start
//!
//! ```no_run
//! use voxstream::config::VoiceConfig;
//! use voxstream::server::{self, AppState};
//!
//! # async fn example() -> voxstream::error::Result<()> {
//! let config = VoiceConfig::load(None)?;
//! let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
//! let state = AppState::from_config(config);
//! state.store.start();
//! server::serve(listener, state, async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod chat;
pub mod chunker;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod orchestrator;
pub mod prelude;
pub mod server;
pub mod store;
pub mod util;
