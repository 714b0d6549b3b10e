//! Game state machine.
//!
//! Owns the board, turn alternation, terminal-state detection and the
//! result-submission phase. One store per game session; observers
//! subscribe for change notifications and the result sender is injected
//! so the submission path can be tested without a network.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;

use crate::api::{ResultSender, SendOutcome, SubmissionPayload};
use crate::board::{is_draw, winner, Board, Mark};
use crate::opponent::pick_ai_move;
use crate::promo::generate_promo_code_default;

/// Cosmetic pause before the opponent answers, so its move reads as a turn
/// rather than an instant reaction.
pub const DEFAULT_AI_DELAY: Duration = Duration::from_millis(600);

pub const START_BOT_FIRST_ERROR: &str =
    "Press /start in the bot first so it knows your username.";
pub const GENERIC_SEND_ERROR: &str = "Failed to send the result";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Idle,
    Playing,
    Win,
    Lose,
    Draw,
}

#[derive(Debug, Clone)]
pub struct GameState {
    pub board: Board,
    pub current_player: Mark,
    pub status: GameStatus,
    pub promo_code: Option<String>,
    pub username: Option<String>,
    pub is_sending: bool,
    pub is_submitted: bool,
    pub error: Option<String>,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            board: [None; 9],
            current_player: Mark::X,
            status: GameStatus::Idle,
            promo_code: None,
            username: None,
            is_sending: false,
            is_submitted: false,
            error: None,
        }
    }
}

pub type SubscriptionId = u64;

type Subscriber = Box<dyn Fn() + Send + Sync>;

/// Releases the move-in-flight flag even on early returns.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct GameStore {
    state: Mutex<GameState>,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
    next_subscription: AtomicU64,
    move_in_flight: AtomicBool,
    sender: Arc<dyn ResultSender>,
    ai_delay: Duration,
}

impl GameStore {
    pub fn new(sender: Arc<dyn ResultSender>) -> Self {
        Self {
            state: Mutex::new(GameState::default()),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
            move_in_flight: AtomicBool::new(false),
            sender,
            ai_delay: DEFAULT_AI_DELAY,
        }
    }

    pub fn with_ai_delay(mut self, delay: Duration) -> Self {
        self.ai_delay = delay;
        self
    }

    pub fn snapshot(&self) -> GameState {
        self.state.lock().expect("game state lock poisoned").clone()
    }

    /// Registers a change observer, fired synchronously once per mutating
    /// state write. Keep the id to unsubscribe.
    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .expect("subscriber list lock poisoned")
            .push((id, Box::new(callback)));
        id
    }

    /// Stops further notifications to that observer. Unknown ids are a no-op.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers
            .lock()
            .expect("subscriber list lock poisoned")
            .retain(|(sub_id, _)| *sub_id != id);
    }

    fn notify(&self) {
        let subscribers = self.subscribers.lock().expect("subscriber list lock poisoned");
        for (_, callback) in subscribers.iter() {
            callback();
        }
    }

    /// Applies one mutation under the state lock, then notifies observers.
    fn update(&self, mutate: impl FnOnce(&mut GameState)) {
        {
            let mut state = self.state.lock().expect("game state lock poisoned");
            mutate(&mut state);
        }
        self.notify();
    }

    /// Clears the board and starts a fresh round with X to move.
    pub fn reset(&self) {
        self.update(|state| {
            state.board = [None; 9];
            state.current_player = Mark::X;
            state.status = GameStatus::Playing;
            state.promo_code = None;
            state.error = None;
            state.is_sending = false;
            state.is_submitted = false;
        });
    }

    /// Applies the human move at `index`, then (after a cosmetic delay) the
    /// opponent's answer. Silently ignored when the game is not in play,
    /// the index is out of range, the cell is taken, or another move is
    /// already in flight. Concurrent calls are dropped, never queued.
    pub async fn make_move(&self, index: usize) {
        if self
            .move_in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Acquire)
            .is_err()
        {
            debug!("move at {index} dropped: another move is in flight");
            return;
        }
        let _guard = InFlightGuard(&self.move_in_flight);

        let opponent_to_move = {
            let mut state = self.state.lock().expect("game state lock poisoned");
            if state.status != GameStatus::Playing
                || index >= state.board.len()
                || state.board[index].is_some()
            {
                return;
            }
            state.board[index] = Some(state.current_player);
            if winner(&state.board) == Some(Mark::X) {
                state.status = GameStatus::Win;
                state.promo_code = Some(generate_promo_code_default());
                state.current_player = Mark::O;
                state.is_sending = false;
                state.is_submitted = false;
                state.error = None;
                false
            } else if is_draw(&state.board) {
                state.status = GameStatus::Draw;
                state.current_player = Mark::O;
                false
            } else {
                state.current_player = Mark::O;
                true
            }
        };
        self.notify();

        if !opponent_to_move {
            return;
        }

        tokio::time::sleep(self.ai_delay).await;
        self.apply_opponent_move();
    }

    fn apply_opponent_move(&self) {
        let mutated = {
            let mut state = self.state.lock().expect("game state lock poisoned");
            // The session may have left `playing` while the move was
            // pending; discard it instead of applying a stale mark.
            if state.status != GameStatus::Playing {
                debug!("pending opponent move discarded: game no longer in play");
                false
            } else {
                match pick_ai_move(&state.board, Mark::O, &mut rand::thread_rng()) {
                    Some(index) if state.board[index].is_none() => {
                        state.board[index] = Some(Mark::O);
                        if winner(&state.board) == Some(Mark::O) {
                            state.status = GameStatus::Lose;
                            state.current_player = Mark::X;
                            state.is_sending = false;
                            state.is_submitted = false;
                            state.error = None;
                        } else if is_draw(&state.board) {
                            state.status = GameStatus::Draw;
                            state.current_player = Mark::X;
                        } else {
                            state.current_player = Mark::X;
                        }
                        true
                    }
                    _ => {
                        if is_draw(&state.board) {
                            state.status = GameStatus::Draw;
                            state.current_player = Mark::X;
                            true
                        } else {
                            false
                        }
                    }
                }
            }
        };
        if mutated {
            self.notify();
        }
    }

    /// Declines to submit a won round; the round still counts as handled.
    pub fn skip_win(&self) {
        self.update(|state| {
            state.is_submitted = true;
            state.is_sending = false;
            state.error = None;
        });
    }

    /// Declines to submit a lost round.
    pub fn skip_lose(&self) {
        self.update(|state| {
            state.is_submitted = true;
            state.is_sending = false;
            state.error = None;
        });
    }

    /// Sends the won round with its promo code. A `chat_not_found` verdict
    /// becomes an instruction to start the bot first; any other failure
    /// surfaces the server's error text.
    pub async fn submit_win(&self, username: &str) {
        let payload = {
            let state = self.state.lock().expect("game state lock poisoned");
            if state.status != GameStatus::Win {
                return;
            }
            let Some(code) = state.promo_code.clone() else {
                return;
            };
            SubmissionPayload::win(code, username)
        };

        self.update(|state| {
            state.is_sending = true;
            state.error = None;
            state.username = Some(username.to_string());
        });

        let result = self.sender.send_result(&payload).await;
        self.finish_submission(result, true);
    }

    /// Sends the lost round; the username is optional.
    pub async fn submit_lose(&self, username: Option<&str>) {
        let payload = SubmissionPayload::lose(username.map(str::to_string));

        self.update(|state| {
            state.is_sending = true;
            state.error = None;
            state.username = username.map(str::to_string);
        });

        let result = self.sender.send_result(&payload).await;
        self.finish_submission(result, false);
    }

    fn finish_submission(&self, result: SendOutcome, map_chat_not_found: bool) {
        if !result.ok {
            let message = if map_chat_not_found
                && result.reason.as_deref() == Some("chat_not_found")
            {
                START_BOT_FIRST_ERROR.to_string()
            } else {
                result
                    .error
                    .unwrap_or_else(|| GENERIC_SEND_ERROR.to_string())
            };
            self.update(|state| {
                state.is_sending = false;
                state.error = Some(message);
            });
            return;
        }

        self.update(|state| {
            state.is_sending = false;
            state.is_submitted = true;
            state.error = None;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockResultSender;
    use crate::board::Mark::{O, X};

    fn store_with(sender: MockResultSender) -> GameStore {
        GameStore::new(Arc::new(sender)).with_ai_delay(Duration::ZERO)
    }

    fn quiet_sender() -> MockResultSender {
        MockResultSender::new()
    }

    fn seed_board(store: &GameStore, board: Board, status: GameStatus) {
        let mut state = store.state.lock().unwrap();
        state.board = board;
        state.status = status;
    }

    #[tokio::test]
    async fn starts_idle_and_reset_enters_playing() {
        let store = store_with(quiet_sender());
        assert_eq!(store.snapshot().status, GameStatus::Idle);

        store.reset();
        let state = store.snapshot();
        assert_eq!(state.status, GameStatus::Playing);
        assert!(state.board.iter().all(|c| c.is_none()));
        assert_eq!(state.current_player, X);
    }

    #[tokio::test]
    async fn move_is_ignored_before_reset() {
        let store = store_with(quiet_sender());
        store.make_move(0).await;
        assert!(store.snapshot().board.iter().all(|c| c.is_none()));
    }

    #[tokio::test]
    async fn completing_a_line_wins_and_generates_a_code() {
        let store = store_with(quiet_sender());
        seed_board(
            &store,
            [Some(X), Some(X), None, None, None, None, None, None, None],
            GameStatus::Playing,
        );
        store.make_move(2).await;

        let state = store.snapshot();
        assert_eq!(state.status, GameStatus::Win);
        let code = state.promo_code.expect("win must carry a promo code");
        assert_eq!(code.len(), 5);
        assert!(!state.is_submitted);
    }

    #[tokio::test]
    async fn filling_the_last_cell_draws() {
        let store = store_with(quiet_sender());
        seed_board(
            &store,
            [
                Some(X),
                Some(O),
                Some(X),
                Some(X),
                Some(O),
                Some(O),
                Some(O),
                Some(X),
                None,
            ],
            GameStatus::Playing,
        );
        store.make_move(8).await;
        assert_eq!(store.snapshot().status, GameStatus::Draw);
    }

    #[tokio::test]
    async fn occupied_cell_and_out_of_range_are_ignored() {
        let store = store_with(quiet_sender());
        seed_board(
            &store,
            [Some(X), None, None, None, Some(O), None, None, None, None],
            GameStatus::Playing,
        );
        store.make_move(0).await;
        store.make_move(9).await;
        let state = store.snapshot();
        assert_eq!(state.board[0], Some(X));
        assert_eq!(state.status, GameStatus::Playing);
    }

    #[tokio::test]
    async fn opponent_answers_after_the_first_move() {
        let store = store_with(quiet_sender());
        store.reset();
        store.make_move(0).await;

        let state = store.snapshot();
        assert_eq!(state.board[0], Some(X));
        // Heuristic takes the free center.
        assert_eq!(state.board[4], Some(O));
        assert_eq!(state.current_player, X);
        assert_eq!(state.status, GameStatus::Playing);
    }

    #[tokio::test]
    async fn submit_win_maps_chat_not_found_to_start_instruction() {
        let mut sender = MockResultSender::new();
        sender.expect_send_result().times(1).returning(|_| SendOutcome {
            ok: false,
            error: Some("chat_not_found".to_string()),
            reason: Some("chat_not_found".to_string()),
        });
        let store = store_with(sender);
        seed_board(&store, [None; 9], GameStatus::Win);
        store
            .state
            .lock()
            .unwrap()
            .promo_code = Some("ABCDE".to_string());

        store.submit_win("nouser").await;

        let state = store.snapshot();
        assert_eq!(state.error.as_deref(), Some(START_BOT_FIRST_ERROR));
        assert!(!state.is_sending);
        assert!(!state.is_submitted);
    }

    #[tokio::test]
    async fn submit_win_success_marks_submitted() {
        let mut sender = MockResultSender::new();
        sender
            .expect_send_result()
            .withf(|payload| {
                payload.status == crate::api::Outcome::Win
                    && payload.code.as_deref() == Some("ABCDE")
                    && payload.username.as_deref() == Some("user1")
            })
            .times(1)
            .returning(|_| SendOutcome::success());
        let store = store_with(sender);
        seed_board(&store, [None; 9], GameStatus::Win);
        store
            .state
            .lock()
            .unwrap()
            .promo_code = Some("ABCDE".to_string());

        store.submit_win("user1").await;

        let state = store.snapshot();
        assert!(state.is_submitted);
        assert!(!state.is_sending);
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn submit_win_requires_win_status_and_code() {
        let mut sender = MockResultSender::new();
        sender.expect_send_result().times(0);
        let store = store_with(sender);

        // Not a win at all.
        store.submit_win("user1").await;
        // Win status but the code is missing.
        seed_board(&store, [None; 9], GameStatus::Win);
        store.submit_win("user1").await;

        assert!(!store.snapshot().is_submitted);
    }

    #[tokio::test]
    async fn submit_lose_sends_lose_payload() {
        let mut sender = MockResultSender::new();
        sender
            .expect_send_result()
            .withf(|payload| {
                payload.status == crate::api::Outcome::Lose
                    && payload.code.is_none()
                    && payload.username.as_deref() == Some("user1")
            })
            .times(1)
            .returning(|_| SendOutcome::success());
        let store = store_with(sender);

        store.submit_lose(Some("user1")).await;
        assert!(store.snapshot().is_submitted);
    }

    #[tokio::test]
    async fn submit_lose_failure_surfaces_error_without_start_mapping() {
        let mut sender = MockResultSender::new();
        sender.expect_send_result().times(1).returning(|_| SendOutcome {
            ok: false,
            error: None,
            reason: Some("chat_not_found".to_string()),
        });
        let store = store_with(sender);

        store.submit_lose(None).await;
        let state = store.snapshot();
        assert_eq!(state.error.as_deref(), Some(GENERIC_SEND_ERROR));
        assert!(!state.is_submitted);
    }

    #[tokio::test]
    async fn skip_marks_the_round_submitted() {
        let store = store_with(quiet_sender());
        seed_board(&store, [None; 9], GameStatus::Win);
        store.skip_win();
        let state = store.snapshot();
        assert!(state.is_submitted);
        assert!(!state.is_sending);
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn reset_after_terminal_state_clears_everything() {
        let store = store_with(quiet_sender());
        seed_board(
            &store,
            [Some(X), Some(X), Some(X), None, None, None, None, None, None],
            GameStatus::Win,
        );
        {
            let mut state = store.state.lock().unwrap();
            state.promo_code = Some("ABCDE".to_string());
            state.error = Some("boom".to_string());
            state.is_submitted = true;
        }

        store.reset();

        let state = store.snapshot();
        assert_eq!(state.status, GameStatus::Playing);
        assert!(state.board.iter().all(|c| c.is_none()));
        assert_eq!(state.promo_code, None);
        assert_eq!(state.error, None);
        assert!(!state.is_submitted);
    }
}
