//! IBS Lab Core — domain types, split adjustment, IBS indicator, simulation engine.
//!
//! This crate contains the heart of the backtester:
//! - Domain types (bars, split events, trades, equity points, candles)
//! - Split back-adjustment of raw bars
//! - Internal Bar Strength indicator
//! - Bar-by-bar fold that runs the IBS mean-reversion rule
//!
//! Nothing here performs I/O. Loading, metrics and reporting live in
//! `ibslab-runner`.

pub mod data;
pub mod domain;
pub mod engine;
pub mod indicators;
