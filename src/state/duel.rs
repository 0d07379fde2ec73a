//! Match record and the transition logic advancing a duel through its phases.
//!
//! A [`MatchRecord`] is the aggregate root of everything about one running
//! duel. All methods validate strictly before mutating, so a rejected action
//! never leaves partial state behind. Callers are responsible for serializing
//! access per match (see [`crate::state::DuelHandle`]).

use std::time::SystemTime;

use thiserror::Error;
use uuid::Uuid;

use crate::{
    catalog::QuestionCatalog,
    config::ScoringConfig,
    state::scoring,
};

/// The stage a duel is currently in. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuelPhase {
    /// Turn-based phase where each player picks questions for the opponent.
    Selection,
    /// Concurrent phase where each player answers their assigned questions.
    Answering,
    /// Terminal phase carrying the resolution.
    Finished,
}

impl DuelPhase {
    /// Lowercase wire label for the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            DuelPhase::Selection => "selection",
            DuelPhase::Answering => "answering",
            DuelPhase::Finished => "finished",
        }
    }
}

/// One recorded answer. Immutable once created.
#[derive(Debug, Clone)]
pub struct Answer {
    /// Question this answer addresses.
    pub question_id: u32,
    /// Option index the player picked.
    pub selected_option: usize,
    /// Whether the picked option matched the catalog's correct option.
    pub is_correct: bool,
    /// Client-reported response time in seconds.
    pub elapsed_seconds: f64,
    /// Points awarded by the scoring rule.
    pub points: i64,
    /// When the answer was recorded.
    pub answered_at: SystemTime,
}

/// Per-participant state embedded in a [`MatchRecord`].
#[derive(Debug, Clone)]
pub struct PlayerDuelState {
    /// Stable identifier of the participant.
    pub user_id: Uuid,
    /// Display name of the participant.
    pub name: String,
    /// Questions this player picked for the opponent to answer, in pick order.
    pub selected_questions: Vec<u32>,
    /// Whether the player has picked their full set.
    pub has_finished_selection: bool,
    /// Questions this player must answer. Fixed at the selection-to-answering
    /// transition to the opponent's picks and never recomputed afterwards.
    pub assigned_questions: Vec<u32>,
    /// Answers recorded so far, one per assigned question at most.
    pub answers: Vec<Answer>,
    /// Whether the player has answered every assigned question.
    pub has_finished_answering: bool,
    /// Running point total.
    pub total_points: i64,
    /// Running count of correct answers.
    pub correct_answers: u32,
}

impl PlayerDuelState {
    fn new(user_id: Uuid, name: String) -> Self {
        Self {
            user_id,
            name,
            selected_questions: Vec::new(),
            has_finished_selection: false,
            assigned_questions: Vec::new(),
            answers: Vec::new(),
            has_finished_answering: false,
            total_points: 0,
            correct_answers: 0,
        }
    }

    /// Whether this player already answered the given question.
    pub fn has_answered(&self, question_id: u32) -> bool {
        self.answers
            .iter()
            .any(|answer| answer.question_id == question_id)
    }
}

/// Validation failures raised by match record operations.
///
/// Every rejection is terminal for that action and leaves the record
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DuelError {
    /// The acting user is not one of the two participants.
    #[error("user `{0}` is not a participant of this match")]
    NotParticipant(Uuid),
    /// The action is not valid in the match's current phase.
    #[error("action requires phase `{expected}` but match is in `{actual}`")]
    WrongPhase {
        /// Phase the action requires.
        expected: &'static str,
        /// Phase the match is actually in.
        actual: &'static str,
    },
    /// A selection arrived from the player whose turn it is not.
    #[error("it is not user `{0}`'s turn to select")]
    NotYourTurn(Uuid),
    /// The acting player already picked their full selection set.
    #[error("selection already complete")]
    SelectionFull,
    /// The question id does not exist in the catalog.
    #[error("unknown question `{0}`")]
    UnknownQuestion(u32),
    /// The acting player already picked this question.
    #[error("question `{0}` already selected")]
    DuplicateSelection(u32),
    /// The question is not part of the acting player's assigned set.
    #[error("question `{0}` is not assigned to this player")]
    NotAssigned(u32),
    /// The acting player already answered this question.
    #[error("question `{0}` already answered")]
    AlreadyAnswered(u32),
}

/// What happened to the selection phase after an accepted pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// Selection continues; the contained id holds the turn next.
    TurnPassed(Uuid),
    /// Both players finished; the caller must enter the answering phase.
    SelectionComplete,
}

/// What happened to the answering phase after an accepted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// At least one player is still answering.
    InProgress,
    /// Both players finished; the caller must finish the match.
    AnsweringComplete,
}

/// Deterministic resolution derived from the final point totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Winner of the duel, if any.
    pub winner_id: Option<Uuid>,
    /// Whether the duel ended with equal totals.
    pub is_draw: bool,
}

/// Aggregate state for one duel from pairing to resolution.
#[derive(Debug, Clone)]
pub struct MatchRecord {
    /// Globally unique match identifier generated at pairing time.
    pub id: Uuid,
    /// Current phase.
    pub phase: DuelPhase,
    /// First participant, in pairing order.
    pub player1: PlayerDuelState,
    /// Second participant, in pairing order.
    pub player2: PlayerDuelState,
    /// Whose turn it is to select. `None` outside the selection phase.
    pub current_turn: Option<Uuid>,
    /// When the match was created and selection started.
    pub created_at: SystemTime,
    /// When the current selection turn started.
    pub turn_started_at: SystemTime,
    /// When the answering phase started, once entered.
    pub answering_started_at: Option<SystemTime>,
    /// Winner of the duel. Populated only once finished.
    pub winner_id: Option<Uuid>,
    /// Whether the duel resolved as a draw. Meaningful only once finished.
    pub is_draw: bool,
}

impl MatchRecord {
    /// Create a record for a freshly paired duel in the selection phase.
    ///
    /// `first_turn` must be one of the two participant ids; the caller decides
    /// it with a coin flip at pairing time.
    pub fn new(
        player1: (Uuid, String),
        player2: (Uuid, String),
        first_turn: Uuid,
    ) -> Self {
        debug_assert!(player1.0 != player2.0, "participants must be distinct");
        debug_assert!(
            first_turn == player1.0 || first_turn == player2.0,
            "first turn must belong to a participant"
        );

        let now = SystemTime::now();
        Self {
            id: Uuid::new_v4(),
            phase: DuelPhase::Selection,
            player1: PlayerDuelState::new(player1.0, player1.1),
            player2: PlayerDuelState::new(player2.0, player2.1),
            current_turn: Some(first_turn),
            created_at: now,
            turn_started_at: now,
            answering_started_at: None,
            winner_id: None,
            is_draw: false,
        }
    }

    /// Borrow the state of the given participant.
    pub fn participant(&self, user_id: Uuid) -> Option<&PlayerDuelState> {
        if self.player1.user_id == user_id {
            Some(&self.player1)
        } else if self.player2.user_id == user_id {
            Some(&self.player2)
        } else {
            None
        }
    }

    /// Borrow the state of the given participant's opponent.
    pub fn opponent_of(&self, user_id: Uuid) -> Option<&PlayerDuelState> {
        if self.player1.user_id == user_id {
            Some(&self.player2)
        } else if self.player2.user_id == user_id {
            Some(&self.player1)
        } else {
            None
        }
    }

    /// Ids of both participants, in pairing order.
    pub fn participant_ids(&self) -> (Uuid, Uuid) {
        (self.player1.user_id, self.player2.user_id)
    }

    /// Apply a validated question selection for `user_id`.
    ///
    /// Enforces the selection-phase protocol: phase gate, turn ownership, the
    /// per-player cap, catalog membership, and the same-player duplicate gate.
    /// Both players picking the same question is allowed; only one player's
    /// own set must stay distinct.
    pub fn select_question(
        &mut self,
        user_id: Uuid,
        question_id: u32,
        catalog: &QuestionCatalog,
        selection_count: usize,
    ) -> Result<SelectionOutcome, DuelError> {
        if self.phase != DuelPhase::Selection {
            return Err(DuelError::WrongPhase {
                expected: DuelPhase::Selection.as_str(),
                actual: self.phase.as_str(),
            });
        }
        if self.participant(user_id).is_none() {
            return Err(DuelError::NotParticipant(user_id));
        }
        if self.current_turn != Some(user_id) {
            return Err(DuelError::NotYourTurn(user_id));
        }

        let acting = self.participant_mut(user_id);
        if acting.selected_questions.len() >= selection_count {
            return Err(DuelError::SelectionFull);
        }
        if !catalog.contains(question_id) {
            return Err(DuelError::UnknownQuestion(question_id));
        }
        if acting.selected_questions.contains(&question_id) {
            return Err(DuelError::DuplicateSelection(question_id));
        }

        acting.selected_questions.push(question_id);
        if acting.selected_questions.len() == selection_count {
            acting.has_finished_selection = true;
        }

        if self.player1.has_finished_selection && self.player2.has_finished_selection {
            return Ok(SelectionOutcome::SelectionComplete);
        }

        // Turn flips to the other player unless that player already finished,
        // in which case the unfinished one keeps picking.
        let opponent = self
            .opponent_of(user_id)
            .expect("participant checked above");
        let next_turn = if opponent.has_finished_selection {
            user_id
        } else {
            opponent.user_id
        };
        self.current_turn = Some(next_turn);
        self.turn_started_at = SystemTime::now();

        Ok(SelectionOutcome::TurnPassed(next_turn))
    }

    /// Enter the answering phase: cross-assign selections and clear the turn.
    ///
    /// Each player is assigned exactly the opponent's picks. The caller must
    /// arm the answering deadline after this returns.
    pub fn begin_answering(&mut self) {
        debug_assert!(self.phase == DuelPhase::Selection);
        debug_assert!(self.player1.has_finished_selection && self.player2.has_finished_selection);

        self.player1.assigned_questions = self.player2.selected_questions.clone();
        self.player2.assigned_questions = self.player1.selected_questions.clone();
        self.phase = DuelPhase::Answering;
        self.current_turn = None;
        self.answering_started_at = Some(SystemTime::now());
    }

    /// Record a validated answer for `user_id` and update its tallies.
    pub fn record_answer(
        &mut self,
        user_id: Uuid,
        question_id: u32,
        selected_option: usize,
        elapsed_seconds: f64,
        catalog: &QuestionCatalog,
        rule: &ScoringConfig,
    ) -> Result<(Answer, AnswerOutcome), DuelError> {
        if self.phase != DuelPhase::Answering {
            return Err(DuelError::WrongPhase {
                expected: DuelPhase::Answering.as_str(),
                actual: self.phase.as_str(),
            });
        }
        if self.participant(user_id).is_none() {
            return Err(DuelError::NotParticipant(user_id));
        }

        let question = catalog
            .get(question_id)
            .ok_or(DuelError::UnknownQuestion(question_id))?;
        let is_correct = selected_option == question.correct_option;
        let points = scoring::points_for(rule, is_correct, elapsed_seconds);

        let acting = self.participant_mut(user_id);
        if !acting.assigned_questions.contains(&question_id) {
            return Err(DuelError::NotAssigned(question_id));
        }
        if acting.has_answered(question_id) {
            return Err(DuelError::AlreadyAnswered(question_id));
        }

        let answer = Answer {
            question_id,
            selected_option,
            is_correct,
            elapsed_seconds,
            points,
            answered_at: SystemTime::now(),
        };

        acting.answers.push(answer.clone());
        acting.total_points += points;
        if is_correct {
            acting.correct_answers += 1;
        }
        if acting.answers.len() == acting.assigned_questions.len() {
            acting.has_finished_answering = true;
        }

        let outcome = if self.player1.has_finished_answering && self.player2.has_finished_answering
        {
            AnswerOutcome::AnsweringComplete
        } else {
            AnswerOutcome::InProgress
        };

        Ok((answer, outcome))
    }

    /// Derive the resolution from the current point totals without mutating.
    ///
    /// Pure comparison: strictly greater wins, equal is a draw. Deriving it
    /// twice from the same record yields the same result.
    pub fn resolve(&self) -> Resolution {
        if self.player1.total_points > self.player2.total_points {
            Resolution {
                winner_id: Some(self.player1.user_id),
                is_draw: false,
            }
        } else if self.player2.total_points > self.player1.total_points {
            Resolution {
                winner_id: Some(self.player2.user_id),
                is_draw: false,
            }
        } else {
            Resolution {
                winner_id: None,
                is_draw: true,
            }
        }
    }

    /// Transition to the terminal phase and stamp the resolution fields.
    ///
    /// Unanswered questions simply contribute zero, so finishing on the
    /// deadline uses whatever totals stand at that instant.
    pub fn finish(&mut self) -> Resolution {
        let resolution = self.resolve();
        self.phase = DuelPhase::Finished;
        self.current_turn = None;
        self.winner_id = resolution.winner_id;
        self.is_draw = resolution.is_draw;
        resolution
    }

    /// Terminate a live match that cannot be completed normally.
    ///
    /// Used when a participant disconnects or leaves: the phase jumps to
    /// `finished` without a resolution, so any action still holding a handle
    /// to this record is rejected by its phase gate.
    pub fn abandon(&mut self) {
        self.phase = DuelPhase::Finished;
        self.current_turn = None;
    }

    fn participant_mut(&mut self, user_id: Uuid) -> &mut PlayerDuelState {
        if self.player1.user_id == user_id {
            &mut self.player1
        } else {
            &mut self.player2
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn catalog() -> QuestionCatalog {
        QuestionCatalog::default()
    }

    fn config() -> AppConfig {
        AppConfig::default()
    }

    fn paired_record() -> (MatchRecord, Uuid, Uuid) {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let record = MatchRecord::new((alice, "Alice".into()), (bob, "Bob".into()), alice);
        (record, alice, bob)
    }

    /// Run both players through a full alternating selection phase:
    /// Alice picks 1..=5, Bob picks 6..=10.
    fn complete_selection(record: &mut MatchRecord, alice: Uuid, bob: Uuid) {
        let catalog = catalog();
        let config = config();
        for round in 0..5 {
            let outcome = record
                .select_question(alice, round + 1, &catalog, config.selection_count)
                .unwrap();
            if round < 4 {
                assert_eq!(outcome, SelectionOutcome::TurnPassed(bob));
            }
            let outcome = record
                .select_question(bob, round + 6, &catalog, config.selection_count)
                .unwrap();
            if round == 4 {
                assert_eq!(outcome, SelectionOutcome::SelectionComplete);
            }
        }
    }

    #[test]
    fn new_record_starts_in_selection_with_given_turn() {
        let (record, alice, _) = paired_record();
        assert_eq!(record.phase, DuelPhase::Selection);
        assert_eq!(record.current_turn, Some(alice));
        assert!(record.winner_id.is_none());
        assert!(!record.is_draw);
    }

    #[test]
    fn out_of_turn_selection_is_rejected() {
        let (mut record, _, bob) = paired_record();
        let err = record
            .select_question(bob, 1, &catalog(), 5)
            .unwrap_err();
        assert_eq!(err, DuelError::NotYourTurn(bob));
        assert!(record.player2.selected_questions.is_empty());
    }

    #[test]
    fn non_participant_is_rejected() {
        let (mut record, _, _) = paired_record();
        let stranger = Uuid::new_v4();
        let err = record
            .select_question(stranger, 1, &catalog(), 5)
            .unwrap_err();
        assert_eq!(err, DuelError::NotParticipant(stranger));
    }

    #[test]
    fn unknown_question_is_rejected_without_turn_change() {
        let (mut record, alice, _) = paired_record();
        let err = record
            .select_question(alice, 9999, &catalog(), 5)
            .unwrap_err();
        assert_eq!(err, DuelError::UnknownQuestion(9999));
        assert_eq!(record.current_turn, Some(alice));
    }

    #[test]
    fn same_player_duplicate_selection_is_rejected() {
        let (mut record, alice, bob) = paired_record();
        record.select_question(alice, 1, &catalog(), 5).unwrap();
        record.select_question(bob, 1, &catalog(), 5).unwrap();

        let err = record.select_question(alice, 1, &catalog(), 5).unwrap_err();
        assert_eq!(err, DuelError::DuplicateSelection(1));
        // Cross-player duplication is allowed: both picked question 1.
        assert_eq!(record.player1.selected_questions, vec![1]);
        assert_eq!(record.player2.selected_questions, vec![1]);
    }

    #[test]
    fn turn_alternates_after_each_accepted_selection() {
        let (mut record, alice, bob) = paired_record();
        let catalog = catalog();

        for pick in 1..=4u32 {
            let outcome = record.select_question(alice, pick, &catalog, 5).unwrap();
            assert_eq!(outcome, SelectionOutcome::TurnPassed(bob));
            let outcome = record.select_question(bob, pick + 5, &catalog, 5).unwrap();
            assert_eq!(outcome, SelectionOutcome::TurnPassed(alice));
        }
    }

    #[test]
    fn turn_stays_with_unfinished_player_when_other_is_done() {
        let (mut record, alice, bob) = paired_record();
        let catalog = catalog();

        // Alternate until Alice has 5 picks and Bob has 4.
        for pick in 1..=4u32 {
            record.select_question(alice, pick, &catalog, 5).unwrap();
            record.select_question(bob, pick + 5, &catalog, 5).unwrap();
        }
        let outcome = record.select_question(alice, 5, &catalog, 5).unwrap();
        assert_eq!(outcome, SelectionOutcome::TurnPassed(bob));
        assert!(record.player1.has_finished_selection);

        // Bob's fifth pick completes the phase.
        let outcome = record.select_question(bob, 10, &catalog, 5).unwrap();
        assert_eq!(outcome, SelectionOutcome::SelectionComplete);
    }

    #[test]
    fn selection_rejected_once_phase_advances() {
        let (mut record, alice, bob) = paired_record();
        let catalog = catalog();
        complete_selection(&mut record, alice, bob);
        record.begin_answering();

        let err = record.select_question(alice, 6, &catalog, 5).unwrap_err();
        assert!(matches!(err, DuelError::WrongPhase { .. }));
    }

    #[test]
    fn cross_assignment_swaps_selections_exactly() {
        let (mut record, alice, bob) = paired_record();
        complete_selection(&mut record, alice, bob);
        record.begin_answering();

        assert_eq!(record.phase, DuelPhase::Answering);
        assert_eq!(record.current_turn, None);
        assert!(record.answering_started_at.is_some());
        assert_eq!(record.player1.assigned_questions, vec![6, 7, 8, 9, 10]);
        assert_eq!(record.player2.assigned_questions, vec![1, 2, 3, 4, 5]);
        assert_eq!(
            record.player1.assigned_questions,
            record.player2.selected_questions
        );
        assert_eq!(
            record.player2.assigned_questions,
            record.player1.selected_questions
        );
    }

    #[test]
    fn answer_outside_assignment_is_rejected() {
        let (mut record, alice, bob) = paired_record();
        complete_selection(&mut record, alice, bob);
        record.begin_answering();

        // Question 1 belongs to Bob's assignment, not Alice's.
        let err = record
            .record_answer(alice, 1, 0, 1.0, &catalog(), &config().scoring)
            .unwrap_err();
        assert_eq!(err, DuelError::NotAssigned(1));
    }

    #[test]
    fn double_answer_is_rejected_and_tallies_unchanged() {
        let (mut record, alice, bob) = paired_record();
        complete_selection(&mut record, alice, bob);
        record.begin_answering();
        let catalog = catalog();
        let rule = config().scoring;

        let correct = catalog.get(6).unwrap().correct_option;
        record
            .record_answer(alice, 6, correct, 2.0, &catalog, &rule)
            .unwrap();
        let points_after_first = record.player1.total_points;

        let err = record
            .record_answer(alice, 6, correct, 2.0, &catalog, &rule)
            .unwrap_err();
        assert_eq!(err, DuelError::AlreadyAnswered(6));
        assert_eq!(record.player1.total_points, points_after_first);
        assert_eq!(record.player1.answers.len(), 1);
    }

    #[test]
    fn answering_before_selection_completes_is_rejected() {
        let (mut record, alice, _) = paired_record();
        let err = record
            .record_answer(alice, 1, 0, 1.0, &catalog(), &config().scoring)
            .unwrap_err();
        assert!(matches!(
            err,
            DuelError::WrongPhase {
                expected: "answering",
                actual: "selection"
            }
        ));
    }

    #[test]
    fn example_scenario_fast_perfect_alice_beats_mixed_bob() {
        let (mut record, alice, bob) = paired_record();
        complete_selection(&mut record, alice, bob);
        record.begin_answering();
        let catalog = catalog();
        let rule = config().scoring;

        // Alice answers all five correctly within two seconds each.
        for id in [6u32, 7, 8, 9, 10] {
            let correct = catalog.get(id).unwrap().correct_option;
            record
                .record_answer(alice, id, correct, 2.0, &catalog, &rule)
                .unwrap();
        }
        assert!(record.player1.has_finished_answering);
        assert_eq!(record.player1.correct_answers, 5);

        // Bob gets three right and two wrong.
        for id in [1u32, 2, 3] {
            let correct = catalog.get(id).unwrap().correct_option;
            record
                .record_answer(bob, id, correct, 2.0, &catalog, &rule)
                .unwrap();
        }
        for id in [4u32, 5] {
            let correct = catalog.get(id).unwrap().correct_option;
            let wrong = (correct + 1) % catalog.get(id).unwrap().options.len();
            let (answer, _) = record
                .record_answer(bob, id, wrong, 2.0, &catalog, &rule)
                .unwrap();
            assert!(!answer.is_correct);
            assert_eq!(answer.points, 0);
        }
        assert!(record.player2.has_finished_answering);

        let resolution = record.finish();
        assert!(record.player1.total_points > record.player2.total_points);
        assert_eq!(resolution.winner_id, Some(alice));
        assert!(!resolution.is_draw);
        assert_eq!(record.phase, DuelPhase::Finished);
    }

    #[test]
    fn deadline_finish_uses_partial_totals() {
        let (mut record, alice, bob) = paired_record();
        complete_selection(&mut record, alice, bob);
        record.begin_answering();
        let catalog = catalog();
        let rule = config().scoring;

        // Only Alice finishes before the deadline fires.
        for id in [6u32, 7, 8, 9, 10] {
            let correct = catalog.get(id).unwrap().correct_option;
            record
                .record_answer(alice, id, correct, 1.0, &catalog, &rule)
                .unwrap();
        }
        assert!(!record.player2.has_finished_answering);

        let resolution = record.finish();
        assert_eq!(resolution.winner_id, Some(alice));
        assert_eq!(record.player2.total_points, 0);
    }

    #[test]
    fn equal_totals_resolve_as_draw() {
        let (mut record, alice, bob) = paired_record();
        complete_selection(&mut record, alice, bob);
        record.begin_answering();

        let resolution = record.finish();
        assert!(resolution.is_draw);
        assert_eq!(resolution.winner_id, None);
        assert!(record.is_draw);
    }

    #[test]
    fn resolution_is_deterministic() {
        let (mut record, alice, bob) = paired_record();
        complete_selection(&mut record, alice, bob);
        record.begin_answering();
        record.player1.total_points = 250;
        record.player2.total_points = 180;

        let first = record.resolve();
        let second = record.resolve();
        assert_eq!(first, second);
        assert_eq!(first.winner_id, Some(alice));
    }

    #[test]
    fn answering_after_finish_is_rejected() {
        let (mut record, alice, bob) = paired_record();
        complete_selection(&mut record, alice, bob);
        record.begin_answering();
        record.finish();

        let err = record
            .record_answer(alice, 6, 0, 1.0, &catalog(), &config().scoring)
            .unwrap_err();
        assert!(matches!(
            err,
            DuelError::WrongPhase {
                expected: "answering",
                actual: "finished"
            }
        ));
    }

    #[test]
    fn all_selected_ids_are_distinct_before_answering() {
        let (mut record, alice, bob) = paired_record();
        complete_selection(&mut record, alice, bob);

        for player in [&record.player1, &record.player2] {
            assert_eq!(player.selected_questions.len(), 5);
            let mut deduped = player.selected_questions.clone();
            deduped.sort_unstable();
            deduped.dedup();
            assert_eq!(deduped.len(), 5);
        }
    }
}
