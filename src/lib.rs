//! Tic-tac-toe against a heuristic opponent, with a Telegram bot that
//! delivers a promo code on a win.
//!
//! The game core (`board`, `opponent`, `promo`, `store`) is pure client
//! logic; `api` is its outbound submission seam. The server side
//! (`server`, `bot`, `chat_map`, `telegram`) receives results, resolves a
//! username to a previously registered chat id, and delivers messages via
//! the Telegram Bot API.

pub mod api;
pub mod board;
pub mod bot;
pub mod chat_map;
pub mod opponent;
pub mod promo;
pub mod server;
pub mod store;
pub mod telegram;

pub use api::{HttpResultSender, Outcome, ResultSender, SendOutcome, SubmissionPayload};
pub use board::{is_draw, winner, Board, Cell, Mark};
pub use chat_map::{ChatStore, InMemoryChatStore};
pub use opponent::pick_ai_move;
pub use promo::{generate_promo_code, generate_promo_code_default};
pub use store::{GameState, GameStatus, GameStore};
