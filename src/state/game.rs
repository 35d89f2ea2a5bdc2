//! A multiplayer game session.
//!
//! The game owns every [`Player`] (and through them every [`Board`]) and the
//! [`Endpoint`] its changes are announced through. Board mutations are
//! routed through the game by board id so the authority rules in
//! [`GameObserver`] see every cell change.
//!
//! # Status
//!
//! ```text
//! ┌───────┐  start_game / all ready  ┌─────────┐           ┌───────┐
//! │ Lobby │─────────────────────────▶│ Playing │──────────▶│ Ended │
//! └───────┘                          └─────────┘           └───────┘
//!                                     ticker runs
//!                                     (authority only)
//! ```

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::board::{Board, BoardObserver, CellChangeOptions, SelectionChange, SelectionOptions};
use super::cell::{CellChange, CellStatus};
use super::input::KeyEvent;
use super::player::{Allow, Player, PlayerChange, PlayerState};
use super::position::Position;
use super::ticker::HealthDrainTicker;
use super::word::WordLetter;
use crate::config::{GameRules, DEFAULT_TICK_INTERVAL_MS};
use crate::error::Error;
use crate::protocol::{Announce, Announcement, Endpoint};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GameStatus {
    #[default]
    Lobby,
    Playing,
    Ended,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lobby => "lobby",
            Self::Playing => "playing",
            Self::Ended => "ended",
        }
    }
}

/// Partial change to a game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<GameStatus>,
}

impl GameChange {
    pub fn status(status: GameStatus) -> Self {
        Self {
            status: Some(status),
        }
    }
}

/// Serialized game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub status: GameStatus,
    pub player_states: Vec<PlayerState>,
}

/// Options for [`Game::change_player`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerChangeOptions {
    pub allow: Allow,
    pub announce: Announce,
    pub call_handlers: bool,
}

impl PlayerChangeOptions {
    pub fn new(allow: Allow, announce: Announce) -> Self {
        Self {
            allow,
            announce,
            call_handlers: true,
        }
    }

    pub fn without_handlers(mut self) -> Self {
        self.call_handlers = false;
        self
    }
}

/// Connects a board to its game while the board is being mutated.
pub struct GameObserver<'a, E: Endpoint> {
    endpoint: &'a mut E,
    rules: &'a GameRules,
}

impl<'a, E: Endpoint> GameObserver<'a, E> {
    /// Authority rule: a word whose letters all match their answers gets
    /// every cell marked `knownCorrect`.
    fn mark_correct_words(&mut self, board: &mut Board, position: Position) -> Result<(), Error> {
        let crossing = board.cell_at(position)?.words().iter().collect::<Vec<_>>();

        for word_id in crossing {
            let Some(word) = board.word(word_id) else {
                continue;
            };

            let mut all_correct = true;
            let mut any_unmarked = false;
            let mut cells = Vec::with_capacity(word.len());
            for (p, expected) in word.positions().zip(word.letters()) {
                let cell = board.cell_at(p)?;
                match expected {
                    WordLetter::Known { letter } => {
                        all_correct &= cell.letter() == Some(*letter);
                    }
                    WordLetter::Unknown => {
                        tracing::debug!(board = board.id(), word = %word_id, "Skipping word with hidden answers");
                        all_correct = false;
                        break;
                    }
                }
                any_unmarked |= cell.status() != CellStatus::KnownCorrect;
                cells.push((p, cell.letter()));
            }

            if all_correct && any_unmarked {
                tracing::debug!(board = board.id(), word = %word_id, "Word solved, marking cells");
                for (p, letter) in cells {
                    let change = CellChange {
                        letter: Some(letter.map(String::from).unwrap_or_default()),
                        status: Some(CellStatus::KnownCorrect),
                    };
                    board.change_cell(
                        p,
                        &change,
                        CellChangeOptions::new(Announce::All).without_handlers(),
                        &mut *self,
                    )?;
                }
            }
        }

        Ok(())
    }
}

impl<'a, E: Endpoint> BoardObserver for GameObserver<'a, E> {
    fn announce(
        &mut self,
        announcement: Announcement,
        except_player_id: Option<&str>,
    ) -> Result<(), Error> {
        self.endpoint.announce(announcement, except_player_id)
    }

    fn cell_changed(&mut self, board: &mut Board, position: Position) -> Result<(), Error> {
        if !self.rules.mark_correct_words_on_fill || !self.endpoint.is_authority() {
            return Ok(());
        }
        self.mark_correct_words(board, position)
    }
}

pub struct Game<E: Endpoint> {
    endpoint: E,
    players: HashMap<String, Player>,
    rules: GameRules,
    status: GameStatus,
    ticker: Option<HealthDrainTicker>,
    tick_interval: TimeDelta,
}

impl<E: Endpoint> Game<E> {
    pub fn new(endpoint: E, rules: GameRules) -> Self {
        Self {
            endpoint,
            players: HashMap::new(),
            rules,
            status: GameStatus::Lobby,
            ticker: None,
            tick_interval: TimeDelta::milliseconds(DEFAULT_TICK_INTERVAL_MS as i64),
        }
    }

    pub fn with_tick_interval(mut self, interval: TimeDelta) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Rebuild a game from a snapshot. The ticker is not restarted.
    pub fn from_game_state(state: GameState, endpoint: E, rules: GameRules) -> Result<Self, Error> {
        let mut game = Self::new(endpoint, rules);
        game.status = state.status;
        for player_state in state.player_states {
            game.add_player(Player::from_player_state(player_state)?);
        }
        Ok(game)
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    pub fn endpoint_mut(&mut self) -> &mut E {
        &mut self.endpoint
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Player ids in a stable order.
    pub fn player_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.players.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn add_player(&mut self, player: Player) {
        tracing::debug!(player = player.id(), "Player added");
        self.players.insert(player.id().to_string(), player);
    }

    pub fn remove_player(&mut self, id: &str) -> Option<Player> {
        let removed = self.players.remove(id);
        if removed.is_some() {
            tracing::debug!(player = id, "Player removed");
        }
        removed
    }

    pub fn board_by_id(&self, board_id: &str) -> Option<&Board> {
        self.players
            .values()
            .filter_map(Player::board)
            .find(|board| board.id() == board_id)
    }

    /// Id of the player holding `board_id`.
    pub fn board_owner(&self, board_id: &str) -> Option<&str> {
        self.board_by_id(board_id).and_then(Board::player_id)
    }

    pub fn game_state(&self, include_answers: bool) -> GameState {
        let mut player_states: Vec<PlayerState> = self
            .players
            .values()
            .map(|player| player.player_state(include_answers))
            .collect();
        player_states.sort_by(|a, b| a.id.cmp(&b.id));
        GameState {
            status: self.status,
            player_states,
        }
    }

    /// Run `f` on a board with this game as its observer.
    fn with_board<T>(
        &mut self,
        board_id: &str,
        f: impl FnOnce(&mut Board, &mut GameObserver<'_, E>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let Game {
            endpoint,
            players,
            rules,
            ..
        } = self;
        let board = players
            .values_mut()
            .filter_map(Player::board_mut)
            .find(|board| board.id() == board_id)
            .ok_or_else(|| Error::UnknownBoard(board_id.to_string()))?;
        let mut observer = GameObserver { endpoint, rules };
        f(board, &mut observer)
    }

    pub fn change_cell(
        &mut self,
        board_id: &str,
        position: Position,
        change: &CellChange,
        options: CellChangeOptions,
    ) -> Result<(), Error> {
        self.with_board(board_id, |board, observer| {
            board.change_cell(position, change, options, observer)
        })
    }

    pub fn change_selection(
        &mut self,
        board_id: &str,
        change: Option<SelectionChange>,
        options: SelectionOptions,
    ) -> Result<bool, Error> {
        self.with_board(board_id, |board, observer| {
            board.change_selection(change, options, observer)
        })
    }

    pub fn handle_key_down(&mut self, board_id: &str, event: &KeyEvent) -> Result<bool, Error> {
        self.with_board(board_id, |board, observer| {
            board.handle_key_down(event, observer)
        })
    }

    pub fn check_board(&mut self, board_id: &str) -> Result<(), Error> {
        self.with_board(board_id, |board, observer| board.check_puzzle(observer))
    }

    pub fn reset_board(&mut self, board_id: &str) -> Result<(), Error> {
        self.with_board(board_id, |board, observer| board.reset(observer))
    }

    /// Apply a player change, announce the fields it set, then run the
    /// game's handler.
    pub fn change_player(
        &mut self,
        player_id: &str,
        change: PlayerChange,
        options: PlayerChangeOptions,
    ) -> Result<(), Error> {
        let player = self
            .players
            .get_mut(player_id)
            .ok_or_else(|| Error::UnknownPlayer(player_id.to_string()))?;

        let announced = options.announce.scope().map(|_| change.to_state());
        let touched_ready = change.ready.is_some();
        player.apply(change, &options.allow)?;

        if let (Some(player_change), Some(except)) = (announced, options.announce.scope()) {
            let announcement = Announcement::PlayerChange {
                player_id: player_id.to_string(),
                player_change,
            };
            self.endpoint.announce(announcement, except)?;
        }

        if options.call_handlers {
            self.on_player_change(touched_ready)?;
        }
        Ok(())
    }

    fn on_player_change(&mut self, touched_ready: bool) -> Result<(), Error> {
        if !self.endpoint.is_authority() || self.status != GameStatus::Lobby || !touched_ready {
            return Ok(());
        }
        if !self.players.is_empty() && self.players.values().all(Player::is_ready) {
            tracing::info!(players = self.players.len(), "All players ready");
            self.start_game()?;
        }
        Ok(())
    }

    /// Give `player_id` a fresh board from the endpoint's puzzle source.
    pub fn assign_board(&mut self, player_id: &str) -> Result<(), Error> {
        let board = self.draw_board(player_id)?;
        self.give_board(player_id, board)
    }

    fn draw_board(&mut self, player_id: &str) -> Result<Board, Error> {
        if !self.players.contains_key(player_id) {
            return Err(Error::UnknownPlayer(player_id.to_string()));
        }
        let puzzle = self.endpoint.assign_puzzle(player_id)?;
        Board::from_puzzle(&puzzle)
    }

    fn give_board(&mut self, player_id: &str, board: Board) -> Result<(), Error> {
        tracing::debug!(player = player_id, board = board.id(), "Assigning board");
        self.change_player(
            player_id,
            PlayerChange::board(Some(board)),
            PlayerChangeOptions::new(Allow::All, Announce::All),
        )
    }

    /// Deal every player a board and move to `playing`. Authority only.
    ///
    /// Every puzzle is drawn before any board is dealt, so a failing
    /// puzzle source leaves the lobby untouched.
    pub fn start_game(&mut self) -> Result<(), Error> {
        if !self.endpoint.is_authority() {
            return Err(Error::NotAuthority);
        }
        if self.status != GameStatus::Lobby {
            return Err(Error::GameNotInLobby);
        }

        let boards = self
            .player_ids()
            .into_iter()
            .map(|player_id| {
                let board = self.draw_board(&player_id)?;
                Ok((player_id, board))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        for (player_id, board) in boards {
            self.give_board(&player_id, board)?;
        }
        self.change(GameChange::status(GameStatus::Playing), Announce::All)
    }

    pub fn change(&mut self, change: GameChange, announce: Announce) -> Result<(), Error> {
        self.change_at(change, announce, Utc::now())
    }

    /// Like [`Game::change`], with an explicit clock for the ticker start.
    pub fn change_at(
        &mut self,
        change: GameChange,
        announce: Announce,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        if let Some(status) = change.status {
            self.set_status(status, now);
        }

        if let Some(except) = announce.scope() {
            self.endpoint
                .announce(Announcement::GameChange { game_change: change }, except)?;
        }
        Ok(())
    }

    fn set_status(&mut self, status: GameStatus, now: DateTime<Utc>) {
        if self.status == status {
            return;
        }
        tracing::info!(from = self.status.as_str(), to = status.as_str(), "Game status changed");
        self.status = status;

        self.ticker = (status == GameStatus::Playing && self.endpoint.is_authority()).then(|| {
            HealthDrainTicker::start(now, self.rules.time_health_drain, self.tick_interval)
        });
    }

    pub fn started_playing_at(&self) -> Option<DateTime<Utc>> {
        self.ticker.as_ref().map(HealthDrainTicker::started_at)
    }

    /// When the host should next call [`Game::tick`]. `None` when idle.
    pub fn next_tick_at(&self) -> Option<DateTime<Utc>> {
        self.ticker.as_ref().map(HealthDrainTicker::next_tick_at)
    }

    /// Advance the health-drain loop. Returns how many drains were applied.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<u32, Error> {
        if self.status != GameStatus::Playing || !self.endpoint.is_authority() {
            return Ok(0);
        }
        let Some(ticker) = self.ticker.as_mut() else {
            return Ok(0);
        };

        let due = ticker.tick(now);
        if due == 0 {
            return Ok(0);
        }

        // Missed periods are folded into a single change per player.
        let amount = self
            .rules
            .time_health_drain
            .amount
            .saturating_mul(i32::try_from(due).unwrap_or(i32::MAX));
        for player_id in self.player_ids() {
            let Some(player) = self.players.get(&player_id) else {
                continue;
            };
            let health = player.health().saturating_sub(amount);
            self.change_player(
                &player_id,
                PlayerChange::health(health),
                PlayerChangeOptions::new(Allow::All, Announce::All),
            )?;
        }
        tracing::debug!(drains = due, amount, "Drained health");
        Ok(due)
    }
}
