//! TicketChain server: event ticket inventory and sales ledger.
//!
//! The ledger in [`ledger`] is usable as a library on its own; the
//! [`routes`]/[`handlers`] modules expose it over HTTP for the UI/wallet
//! collaborator.

pub mod config;
pub mod handlers;
pub mod journal;
pub mod ledger;
pub mod models;
pub mod routes;
pub mod transfer;
pub mod utils;
