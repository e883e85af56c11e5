//! # Svoyak Game Library
//!
//! This library provides the core logic of a quiz-show board game: a grid
//! of categories and point values, a roster of players taking turns, and
//! scores accumulated by answering the questions behind the cells.
//!
//! The [`controller::GameController`] is the entry point. It validates the
//! question bank ([`bank`]), edits the roster ([`roster`]), keeps the
//! [`state::GameState`] persisted after every action ([`persistence`]) and
//! hands a read-only [`view::View`] to a renderer.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::wildcard_imports)]

pub mod bank;
pub mod config;
pub mod constants;
pub mod controller;
pub mod persistence;
pub mod roster;
pub mod state;
pub mod view;
