//! Agora ticketing server: organizers publish events with priced ticket
//! tiers, users buy tickets, and each ticket carries one payment transaction.

pub mod config;
pub mod featured;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod utils;
