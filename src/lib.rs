//! Etsin finder backend: fetches catalog records from Metax, decides what the caller may
//! see and download, and serves the shaped results to the single-page frontend.

pub mod access;
pub mod client;
pub mod config;
pub mod download;
pub mod error;
pub mod identity;
pub mod mail;
pub mod metax;
pub mod record;
pub mod rems;
pub mod server;
pub mod shaping;
