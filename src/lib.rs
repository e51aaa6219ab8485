//! # Fomio
//!
//! Client core for Fomio, a Discourse-backed forum where topics are
//! *Bytes*, subcategories are *Terets* and parent categories are *Hubs*.
//!
//! ## Overview
//!
//! The crate holds the stateful parts of the client that sit between the
//! screens and the Discourse REST API: the composer's draft lifecycle, the
//! comment thread with optimistic submission, like/bookmark toggles, and the
//! plumbing they share (typed API errors, encrypted credentials, auth events,
//! device storage, deep links).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐ ┌─────────────────┐ ┌─────────────────┐
//! │     Compose     │ │      Feed       │ │     Actions     │
//! │                 │ │                 │ │                 │
//! │ • Draft sync    │ │ • Placeholders  │ │ • Like          │
//! │ • Debounce      │ │ • Refetch       │ │ • Bookmark      │
//! │ • Submit gating │ │ • Reply rules   │ │ • Rollback      │
//! └─────────────────┘ └─────────────────┘ └─────────────────┘
//!          │                   │                   │
//!          └───────────────────┼───────────────────┘
//!                              ▼
//! ┌─────────────────┐ ┌─────────────────┐ ┌─────────────────┐
//! │      Store      │ │       API       │ │      Auth       │
//! │                 │ │                 │ │                 │
//! │ • Key-value     │ │ • ForumApi      │ │ • Credentials   │
//! │ • Draft meta    │ │ • Discourse     │ │ • Auth events   │
//! │ • Topic cache   │ │ • Typed errors  │ │                 │
//! └─────────────────┘ └─────────────────┘ └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`actions`] - Optimistic like/bookmark toggles
//! - [`api`] - `ForumApi` trait and the Discourse HTTP client
//! - [`auth`] - Encrypted credentials and auth events
//! - [`compose`] - Draft lifecycle controller
//! - [`config`] - Configuration management
//! - [`error`] - Typed API errors
//! - [`feed`] - Comment thread of a Byte
//! - [`links`] - `fomio://` and universal link routing
//! - [`models`] - Data models (Byte, Comment, Hub, Teret, drafts)
//! - [`store`] - `SQLite` device storage
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fomio::compose::DraftController;
//! use fomio::store::DeviceStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = fomio::Config::load()?;
//!     let api = Arc::new(fomio::api::connect(&config)?);
//!     let store = Arc::new(DeviceStore::open()?);
//!
//!     let composer = DraftController::new(api, store).with_debounce(config.draft_debounce());
//!     composer.hydrate(None).await;
//!     composer.edit_title("Hello Fomio");
//!     composer.save_now().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/fomio/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::if_not_else)]
#![allow(clippy::single_match_else)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::trivially_copy_pass_by_ref)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::use_self)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::similar_names)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::future_not_send)]

pub mod actions;
pub mod api;
pub mod auth;
pub mod compose;
pub mod config;
pub mod error;
pub mod feed;
pub mod links;
pub mod models;
pub mod paths;
pub mod store;

// Re-export main types for convenience
pub use actions::{PostActions, Toggle, ToggleState};
pub use api::{DiscourseClient, ForumApi};
pub use auth::{AuthEvent, AuthEvents};
pub use compose::{DraftController, DraftPhase, SaveOutcome};
pub use config::Config;
pub use error::{ApiError, ApiResult, ErrorKind};
pub use feed::{CommentThread, RecoveryAction};
pub use links::Route;
pub use models::{Byte, Comment, Hub, Teret};
pub use store::DeviceStore;

/// ASCII logo for the application
pub const LOGO: &str = r"
    ____                _
   / __/___  ____ ___  (_)___
  / /_/ __ \/ __ `__ \/ / __ \
 / __/ /_/ / / / / / / / /_/ /
/_/  \____/_/ /_/ /_/_/\____/
";

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
