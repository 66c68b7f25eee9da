//! Session state machine and its mailbox worker.
//!
//! All state for one session is owned by a single [`SessionWorker`] driven
//! from a command mailbox, so commands for one session are applied strictly
//! one at a time. The worker may await the drawing registry, but drawings
//! never call back into sessions, so there is no lock cycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::config::GameConfig;
use crate::drawing::DrawingRegistry;
use crate::error::GameError;
use crate::event::ServerEvent;
use crate::fabric::BroadcastFabric;
use crate::roster::{PlayerSummary, Roster};
use crate::storage::{ActivityRecord, ProfileSink, SessionRecord, SessionStore};
use crate::types::{ConnectionId, DrawingId, PlayerId, RoomId, SessionId};
use crate::words::random_word;

/// Where a session is in its competition cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "kebab-case")]
pub enum SessionPhase {
    /// Gathering players; settings may change.
    Lobby,
    /// Everyone is drawing the secret word on their own surface.
    Competition,
    /// Drawings are shown one at a time; `ratee`'s is up now.
    Rating { ratee: PlayerId },
    /// Standings are out; the owner may start another round.
    Results,
}

/// Full session state, owned by one worker.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    pub owner_id: PlayerId,
    /// The word everyone draws this round.
    pub word: String,
    pub draw_duration: Duration,
    pub rate_duration: Duration,
    pub phase: SessionPhase,
    pub roster: Roster,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        id: SessionId,
        name: impl Into<String>,
        owner_id: PlayerId,
        capacity: usize,
        config: &GameConfig,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            owner_id,
            word: random_word().to_string(),
            draw_duration: config.default_draw_duration,
            rate_duration: config.default_rate_duration,
            phase: SessionPhase::Lobby,
            roster: Roster::new(capacity),
            created_at: Utc::now(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            owner_id: self.owner_id.clone(),
            word: self.word.clone(),
            draw_secs: self.draw_duration.as_secs(),
            rate_secs: self.rate_duration.as_secs(),
            capacity: self.roster.capacity(),
            phase: self.phase.clone(),
            players: self.roster.summaries(),
        }
    }

    pub fn record(&self) -> SessionRecord {
        SessionRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            owner_id: self.owner_id.clone(),
            capacity: self.roster.capacity(),
            draw_secs: self.draw_duration.as_secs(),
            rate_secs: self.rate_duration.as_secs(),
            created_at: self.created_at,
        }
    }
}

/// Serializable view of a session, sent to joining connections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub name: String,
    pub owner_id: PlayerId,
    pub word: String,
    pub draw_secs: u64,
    pub rate_secs: u64,
    pub capacity: usize,
    pub phase: SessionPhase,
    pub players: Vec<PlayerSummary>,
}

/// One unit of work for a session worker. Every command carries the
/// connection that triggered it so rejections can be reported back.
#[derive(Debug)]
pub enum SessionCommand {
    Join {
        connection: ConnectionId,
        player_id: PlayerId,
    },
    Leave {
        connection: ConnectionId,
    },
    SetReady {
        connection: ConnectionId,
        ready: bool,
    },
    UpdateSettings {
        connection: ConnectionId,
        draw_secs: u64,
        rate_secs: u64,
    },
    StartCompetition {
        connection: ConnectionId,
    },
    StartDrawing {
        connection: ConnectionId,
        drawing_id: DrawingId,
    },
    SendDrawing {
        connection: ConnectionId,
        bitmap: String,
    },
    RateReady {
        connection: ConnectionId,
    },
    SendRating {
        connection: ConnectionId,
        ratee_id: PlayerId,
        score: i64,
    },
    PlayAgain {
        connection: ConnectionId,
    },
    ConnectionLost {
        connection: ConnectionId,
    },
}

impl SessionCommand {
    /// The connection that triggered this command.
    pub fn connection(&self) -> &ConnectionId {
        match self {
            Self::Join { connection, .. }
            | Self::Leave { connection }
            | Self::SetReady { connection, .. }
            | Self::UpdateSettings { connection, .. }
            | Self::StartCompetition { connection }
            | Self::StartDrawing { connection, .. }
            | Self::SendDrawing { connection, .. }
            | Self::RateReady { connection }
            | Self::SendRating { connection, .. }
            | Self::PlayAgain { connection }
            | Self::ConnectionLost { connection } => connection,
        }
    }
}

/// What the worker loop should do after a command.
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The session is gone; stop the worker.
    Teardown,
}

pub struct SessionWorker {
    session: Session,
    config: GameConfig,
    fabric: Arc<BroadcastFabric>,
    drawings: Arc<DrawingRegistry>,
    profile: Arc<dyn ProfileSink>,
    store: Arc<dyn SessionStore>,
    /// Which connection speaks for which roster member.
    members: HashMap<PlayerId, ConnectionId>,
}

impl SessionWorker {
    pub fn new(
        session: Session,
        config: GameConfig,
        fabric: Arc<BroadcastFabric>,
        drawings: Arc<DrawingRegistry>,
        profile: Arc<dyn ProfileSink>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            session,
            config,
            fabric,
            drawings,
            profile,
            store,
            members: HashMap::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn room(&self) -> RoomId {
        RoomId::Session(self.session.id.clone())
    }

    /// The roster member a connection speaks for.
    fn member_of(&self, connection: &ConnectionId) -> Result<PlayerId, GameError> {
        self.members
            .iter()
            .find(|(_, conn)| *conn == connection)
            .map(|(player, _)| player.clone())
            .ok_or_else(|| GameError::ConnectionNotRegistered {
                connection_id: connection.clone(),
            })
    }

    fn require_owner(&self, connection: &ConnectionId) -> Result<(), GameError> {
        let player = self.member_of(connection)?;
        if player != self.session.owner_id {
            return Err(GameError::InvalidTransition {
                reason: "only the session owner may do that".into(),
            });
        }
        Ok(())
    }

    fn require_phase(&self, wanted: &SessionPhase, doing: &str) -> Result<(), GameError> {
        if self.session.phase != *wanted {
            return Err(GameError::InvalidTransition {
                reason: format!("cannot {doing} in phase {:?}", self.session.phase),
            });
        }
        Ok(())
    }

    /// Apply one command. Errors are rejections to report to the triggering
    /// connection; the session stays consistent either way.
    pub async fn handle(&mut self, cmd: SessionCommand) -> Result<Flow, GameError> {
        match cmd {
            SessionCommand::Join {
                connection,
                player_id,
            } => self.join(connection, player_id),
            SessionCommand::Leave { connection } => {
                let player = self.member_of(&connection)?;
                self.player_left(player, connection).await
            }
            SessionCommand::SetReady { connection, ready } => self.set_ready(connection, ready),
            SessionCommand::UpdateSettings {
                connection,
                draw_secs,
                rate_secs,
            } => self.update_settings(connection, draw_secs, rate_secs).await,
            SessionCommand::StartCompetition { connection } => self.start_competition(connection),
            SessionCommand::StartDrawing {
                connection,
                drawing_id,
            } => self.start_drawing(connection, drawing_id).await,
            SessionCommand::SendDrawing { connection, bitmap } => {
                self.send_drawing(connection, bitmap).await
            }
            SessionCommand::RateReady { connection } => self.rate_ready(connection).await,
            SessionCommand::SendRating {
                connection,
                ratee_id,
                score,
            } => self.send_rating(connection, ratee_id, score).await,
            SessionCommand::PlayAgain { connection } => self.play_again(connection),
            SessionCommand::ConnectionLost { connection } => {
                match self.member_of(&connection) {
                    // Not a member here; nothing to reconcile.
                    Err(_) => Ok(Flow::Continue),
                    Ok(player) => self.player_left(player, connection).await,
                }
            }
        }
    }

    fn join(&mut self, connection: ConnectionId, player_id: PlayerId) -> Result<Flow, GameError> {
        let player = self.session.roster.add(player_id.clone())?;
        let summary = PlayerSummary::from(player);
        self.members.insert(player_id, connection.clone());
        self.fabric.join(&connection, self.room());
        self.fabric.emit_to_room_except(
            &self.room(),
            &connection,
            ServerEvent::PlayerAdded { player: summary },
        );
        self.fabric.emit_to(
            &connection,
            ServerEvent::LobbyJoined {
                session: self.session.snapshot(),
            },
        );
        Ok(Flow::Continue)
    }

    async fn player_left(
        &mut self,
        player: PlayerId,
        connection: ConnectionId,
    ) -> Result<Flow, GameError> {
        if player == self.session.owner_id {
            return self.teardown().await;
        }

        self.session.roster.remove(&player)?;
        self.members.remove(&player);
        self.drawings
            .delete_competition_drawing(&self.session.id, &player);
        self.fabric.leave(&connection, &self.room());
        self.fabric.emit_to_room(
            &self.room(),
            ServerEvent::PlayerRemoved {
                player_id: player.clone(),
            },
        );

        // A departure can unblock the round: the current ratee may be gone,
        // the departed player may have been the last rating holdout, or the
        // last player still drawing may have walked out.
        match self.session.phase.clone() {
            SessionPhase::Rating { ratee } => {
                if ratee == player || self.session.roster.rating_complete(&ratee) {
                    self.advance_rating().await?;
                }
            }
            SessionPhase::Competition => {
                if self.session.roster.all_rate_ready() {
                    self.advance_rating().await?;
                }
            }
            _ => {}
        }
        Ok(Flow::Continue)
    }

    /// The owner left or vanished: the whole session goes with them.
    async fn teardown(&mut self) -> Result<Flow, GameError> {
        self.fabric.emit_to_room(
            &self.room(),
            ServerEvent::LobbyClosed {
                session_id: self.session.id.clone(),
            },
        );
        self.drawings.delete_for_session(&self.session.id);
        self.fabric.clear_room(&self.room());
        if let Err(err) = self.store.delete(&self.session.id).await {
            warn!(session_id = %self.session.id, %err, "failed to delete session record");
        }
        Ok(Flow::Teardown)
    }

    fn set_ready(&mut self, connection: ConnectionId, ready: bool) -> Result<Flow, GameError> {
        let player = self.member_of(&connection)?;
        self.require_phase(&SessionPhase::Lobby, "change readiness")?;
        self.session.roster.set_ready(&player, ready)?;
        self.fabric.emit_to_room(
            &self.room(),
            ServerEvent::PlayerReady {
                player_id: player,
                ready,
            },
        );
        Ok(Flow::Continue)
    }

    async fn update_settings(
        &mut self,
        connection: ConnectionId,
        draw_secs: u64,
        rate_secs: u64,
    ) -> Result<Flow, GameError> {
        self.require_owner(&connection)?;
        self.require_phase(&SessionPhase::Lobby, "update settings")?;
        if draw_secs == 0 || rate_secs == 0 {
            return Err(GameError::InvalidTransition {
                reason: "durations must be positive".into(),
            });
        }
        // Persist first; the live session only changes once the directory
        // record is updated.
        let mut record = self.session.record();
        record.draw_secs = draw_secs;
        record.rate_secs = rate_secs;
        self.store.create(&record).await?;
        self.session.draw_duration = Duration::from_secs(draw_secs);
        self.session.rate_duration = Duration::from_secs(rate_secs);
        self.fabric.emit_to_room(
            &self.room(),
            ServerEvent::SettingsUpdated {
                draw_secs,
                rate_secs,
            },
        );
        Ok(Flow::Continue)
    }

    fn start_competition(&mut self, connection: ConnectionId) -> Result<Flow, GameError> {
        self.require_owner(&connection)?;
        self.require_phase(&SessionPhase::Lobby, "start a competition")?;
        if self.session.roster.len() < self.config.min_players_to_start {
            return Err(GameError::InvalidTransition {
                reason: format!(
                    "a competition needs at least {} players, have {}",
                    self.config.min_players_to_start,
                    self.session.roster.len()
                ),
            });
        }
        if !self.session.roster.all_ready() {
            return Err(GameError::InvalidTransition {
                reason: "not every player is ready".into(),
            });
        }

        self.session.phase = SessionPhase::Competition;
        // Every player draws on a private surface; tell each connection
        // which one is theirs.
        for player in self.session.roster.players().to_vec() {
            let drawing_id = self
                .drawings
                .create_competition(&self.session.id, &player.id);
            if let Some(conn) = self.members.get(&player.id) {
                self.fabric.emit_to(
                    conn,
                    ServerEvent::CompetitionStarted {
                        drawing_id,
                        word: self.session.word.clone(),
                    },
                );
            }
        }
        Ok(Flow::Continue)
    }

    async fn start_drawing(
        &mut self,
        connection: ConnectionId,
        drawing_id: DrawingId,
    ) -> Result<Flow, GameError> {
        self.member_of(&connection)?;
        self.require_phase(&SessionPhase::Competition, "start drawing")?;
        let actions = self.drawings.actions(&drawing_id).await?;
        self.fabric
            .join(&connection, RoomId::Drawing(drawing_id.clone()));
        self.fabric.emit_to(
            &connection,
            ServerEvent::DrawingStarted {
                drawing_id,
                actions,
            },
        );
        Ok(Flow::Continue)
    }

    async fn send_drawing(
        &mut self,
        connection: ConnectionId,
        bitmap: String,
    ) -> Result<Flow, GameError> {
        let player = self.member_of(&connection)?;
        self.require_phase(&SessionPhase::Competition, "submit a drawing")?;
        self.drawings
            .set_competition_bitmap(&self.session.id, &player, bitmap)
            .await?;
        // Submitting ends the editing session on the private surface.
        if let Some(drawing_id) = self
            .drawings
            .competition_drawing_of(&self.session.id, &player)
        {
            self.fabric.leave(&connection, &RoomId::Drawing(drawing_id));
        }
        Ok(Flow::Continue)
    }

    async fn rate_ready(&mut self, connection: ConnectionId) -> Result<Flow, GameError> {
        let player = self.member_of(&connection)?;
        self.require_phase(&SessionPhase::Competition, "get ready to rate")?;
        self.session.roster.set_rate_ready(&player)?;
        if self.session.roster.all_rate_ready() {
            self.advance_rating().await?;
        }
        Ok(Flow::Continue)
    }

    async fn send_rating(
        &mut self,
        connection: ConnectionId,
        ratee_id: PlayerId,
        score: i64,
    ) -> Result<Flow, GameError> {
        self.member_of(&connection)?;
        match &self.session.phase {
            SessionPhase::Rating { ratee } if *ratee == ratee_id => {}
            _ => {
                return Err(GameError::InvalidTransition {
                    reason: format!("{ratee_id} is not being rated right now"),
                })
            }
        }

        self.session.roster.add_score(&ratee_id, score)?;

        // Lifetime totals are off the hot path; never block the round on
        // profile storage.
        let profile = Arc::clone(&self.profile);
        let player = ratee_id.clone();
        tokio::spawn(async move {
            if let Err(err) = profile.add_score(&player, score).await {
                warn!(player_id = %player, %err, "failed to record profile score");
            }
        });

        if self.session.roster.rating_complete(&ratee_id) {
            self.advance_rating().await?;
        }
        Ok(Flow::Continue)
    }

    /// Put the next unrated drawing up, or close out the competition when
    /// every drawing has been rated.
    async fn advance_rating(&mut self) -> Result<(), GameError> {
        match self.session.roster.next_unrated().cloned() {
            Some(ratee) => {
                let bitmap = self
                    .drawings
                    .bitmap_of(&self.session.id, &ratee)
                    .await
                    .unwrap_or_default();
                self.session.phase = SessionPhase::Rating {
                    ratee: ratee.clone(),
                };
                self.fabric.emit_to_room(
                    &self.room(),
                    ServerEvent::RateDrawing {
                        ratee_id: ratee,
                        bitmap,
                    },
                );
                Ok(())
            }
            None => self.finish_competition(),
        }
    }

    fn finish_competition(&mut self) -> Result<(), GameError> {
        let standings = self.session.roster.standings();
        for (i, player) in standings.iter().enumerate() {
            let profile = Arc::clone(&self.profile);
            let record = ActivityRecord {
                player_id: player.id.clone(),
                session_name: self.session.name.clone(),
                rank: i + 1,
                recorded_at: Utc::now(),
            };
            tokio::spawn(async move {
                if let Err(err) = profile.record_activity(&record).await {
                    warn!(player_id = %record.player_id, %err, "failed to record activity");
                }
            });
        }
        self.drawings.delete_for_session(&self.session.id);
        self.session.phase = SessionPhase::Results;
        self.fabric.emit_to_room(
            &self.room(),
            ServerEvent::Standings { players: standings },
        );
        Ok(())
    }

    fn play_again(&mut self, connection: ConnectionId) -> Result<Flow, GameError> {
        self.require_owner(&connection)?;
        // Allowed from the results screen and from the lobby, where it acts
        // as a reset before anything has started.
        match self.session.phase {
            SessionPhase::Results | SessionPhase::Lobby => {}
            _ => {
                return Err(GameError::InvalidTransition {
                    reason: format!("cannot restart in phase {:?}", self.session.phase),
                })
            }
        }
        self.session.roster.reset_round();
        self.session.word = random_word().to_string();
        self.session.phase = SessionPhase::Lobby;
        self.fabric.emit_to_room(
            &self.room(),
            ServerEvent::PlayAgain {
                session: self.session.snapshot(),
            },
        );
        Ok(Flow::Continue)
    }
}
