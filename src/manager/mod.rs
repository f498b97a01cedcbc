//! Game manager: the activation stack that runs flows, subflows and
//! follow-up actions, and the surface hosts drive a game through.

pub mod registry;
pub mod activation;
pub mod pending;
pub mod game_manager;

pub use registry::{FlowRef, FlowRegistry, MAIN_FLOW};
pub use activation::{Activation, FlowState, GameStatus};
pub use pending::{PendingMoves, CHOOSE, CHOOSE_SELECTION};
pub use game_manager::{GameManager, GameManagerBuilder};
