//! Core engine types: players, arguments, moves, RNG, configuration, errors.
//!
//! This module contains the building blocks shared by flows, actions and the
//! manager. Nothing here knows about a particular game.

pub mod player;
pub mod argument;
pub mod moves;
pub mod rng;
pub mod config;
pub mod error;
pub mod game;

pub use player::PlayerId;
pub use argument::{args, Argument, Args, ElementRef};
pub use moves::{Move, MoveRecord};
pub use rng::{GameRng, GameRngState};
pub use config::FlowConfig;
pub use error::{FlowError, Result};
pub use game::Game;
