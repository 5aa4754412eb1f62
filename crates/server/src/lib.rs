// SPDX-License-Identifier: MIT

//! `ashd`: the HTTP control-plane process (§5, §6). Binds together
//! `ash-router`'s session lifecycle, `ash-coordinator`'s runner selection,
//! and (in standalone mode) a local `ash-pool` sandbox host, behind the
//! routes in [`routes`].

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{Config, Mode};
pub use routes::build_router;
pub use state::AppState;
