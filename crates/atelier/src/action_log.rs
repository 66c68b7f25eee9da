//! Ordered edit history for one drawing surface.
//!
//! Every drawing, whether a persistent album drawing or an ephemeral
//! competition surface, is backed by one [`ActionLog`]: an ordered sequence of
//! edit records whose `index` fields always form the dense interval
//! `[0, len)`. Replaying the log in index order reproduces the drawing.
//!
//! `delete` and `move` renumber the whole tail of the log, O(N) per call.
//! N is bounded by a single drawing session's edit count, so the full scan
//! is acceptable; what is not acceptable is running two renumbering
//! mutations concurrently. Callers must serialize all mutations per drawing
//! (the drawing registry holds one async mutex per drawing id). The log
//! re-checks the dense invariant after every renumbering mutation and
//! reports a violation as [`GameError::ConcurrentModification`].

use crate::error::GameError;
use crate::types::{ActionId, DrawingId};
use serde::{Deserialize, Serialize};

/// Opaque edit payload. The core never inspects it; clients interpret it
/// as a stroke, shape, or whatever the drawing tools produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPayload(pub Vec<u8>);

impl ActionPayload {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }
}

/// One edit record in a drawing's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    /// Dense position in `[0, log length)`.
    pub index: usize,
    pub payload: ActionPayload,
    pub selected: bool,
}

/// Dense, reindexed ordered edit history for one drawing.
///
/// Invariant: after every mutation, `actions[i].index == i` for all `i`.
#[derive(Debug, Clone)]
pub struct ActionLog {
    drawing_id: DrawingId,
    actions: Vec<Action>,
}

impl ActionLog {
    pub fn new(drawing_id: DrawingId) -> Self {
        Self {
            drawing_id,
            actions: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Append a new action at the end of the log. The new action's index is
    /// the log length before the append.
    pub fn append(&mut self, payload: ActionPayload) -> Action {
        let action = Action {
            id: ActionId::generate(),
            index: self.actions.len(),
            payload,
            selected: false,
        };
        self.actions.push(action.clone());
        action
    }

    /// Replace the payload and selection of an existing action. Index and
    /// existence are unchanged.
    pub fn update(
        &mut self,
        action_id: &ActionId,
        payload: ActionPayload,
        selected: bool,
    ) -> Result<Action, GameError> {
        let pos = self
            .actions
            .iter()
            .position(|a| a.id == *action_id)
            .ok_or_else(|| self.not_found(action_id))?;
        let action = &mut self.actions[pos];
        action.payload = payload;
        action.selected = selected;
        Ok(action.clone())
    }

    /// Remove an action and close the gap: every remaining action with a
    /// higher index is shifted down by one.
    pub fn delete(&mut self, action_id: &ActionId) -> Result<ActionId, GameError> {
        let pos = self
            .actions
            .iter()
            .position(|a| a.id == *action_id)
            .ok_or_else(|| self.not_found(action_id))?;
        self.actions.remove(pos);
        for action in &mut self.actions[pos..] {
            action.index -= 1;
        }
        self.check_dense()?;
        Ok(action_id.clone())
    }

    /// Move an action to `new_index`, shifting every action strictly between
    /// the old and new position by one. The relative order of all other
    /// actions is preserved. The moved action's selection is cleared.
    ///
    /// `new_index` must lie in `[0, len)`; callers validate this at the
    /// event boundary before reaching the log.
    pub fn move_to(
        &mut self,
        action_id: &ActionId,
        new_index: usize,
    ) -> Result<Vec<Action>, GameError> {
        assert!(
            new_index < self.actions.len(),
            "move target {new_index} out of range for log of length {}",
            self.actions.len()
        );
        let pos = self
            .actions
            .iter()
            .position(|a| a.id == *action_id)
            .ok_or_else(|| self.not_found(action_id))?;
        let mut action = self.actions.remove(pos);
        action.selected = false;
        self.actions.insert(new_index, action);
        for (i, action) in self.actions.iter_mut().enumerate() {
            action.index = i;
        }
        self.check_dense()?;
        Ok(self.list())
    }

    /// All actions in index order.
    pub fn list(&self) -> Vec<Action> {
        self.actions.clone()
    }

    pub fn get(&self, action_id: &ActionId) -> Option<&Action> {
        self.actions.iter().find(|a| a.id == *action_id)
    }

    fn not_found(&self, action_id: &ActionId) -> GameError {
        GameError::ActionNotFound {
            drawing_id: self.drawing_id.clone(),
            action_id: action_id.clone(),
        }
    }

    /// Verify the dense-index invariant. A violation here means a mutation
    /// ran outside the drawing's critical section.
    fn check_dense(&self) -> Result<(), GameError> {
        for (i, action) in self.actions.iter().enumerate() {
            if action.index != i {
                return Err(GameError::ConcurrentModification {
                    drawing_id: self.drawing_id.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn log() -> ActionLog {
        ActionLog::new(DrawingId::new("d-1"))
    }

    fn payload(tag: u8) -> ActionPayload {
        ActionPayload::new(vec![tag])
    }

    fn indices(log: &ActionLog) -> Vec<usize> {
        log.list().iter().map(|a| a.index).collect()
    }

    #[test]
    fn append_assigns_next_index() {
        let mut log = log();
        let a = log.append(payload(0));
        let b = log.append(payload(1));
        let c = log.append(payload(2));
        assert_eq!(a.index, 0);
        assert_eq!(b.index, 1);
        assert_eq!(c.index, 2);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn delete_middle_closes_the_gap() {
        let mut log = log();
        let a = log.append(payload(0));
        let b = log.append(payload(1));
        let c = log.append(payload(2));

        let deleted = log.delete(&b.id).unwrap();
        assert_eq!(deleted, b.id);

        let actions = log.list();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].id, a.id);
        assert_eq!(actions[0].index, 0);
        assert_eq!(actions[1].id, c.id);
        assert_eq!(actions[1].index, 1);
    }

    #[test]
    fn delete_unknown_action_fails() {
        let mut log = log();
        log.append(payload(0));
        let err = log.delete(&ActionId::new("missing")).unwrap_err();
        assert!(matches!(err, GameError::ActionNotFound { .. }));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn update_replaces_payload_in_place() {
        let mut log = log();
        log.append(payload(0));
        let b = log.append(payload(1));
        log.append(payload(2));

        let updated = log.update(&b.id, payload(9), true).unwrap();
        assert_eq!(updated.index, 1);
        assert_eq!(updated.payload, payload(9));
        assert!(updated.selected);
        assert_eq!(indices(&log), vec![0, 1, 2]);
    }

    #[test]
    fn update_unknown_action_fails() {
        let mut log = log();
        let err = log
            .update(&ActionId::new("missing"), payload(0), false)
            .unwrap_err();
        assert!(matches!(err, GameError::ActionNotFound { .. }));
    }

    #[test]
    fn move_backward_shifts_intermediates_up() {
        // A(0) B(1) C(2); move C to 0 => C(0) A(1) B(2)
        let mut log = log();
        let a = log.append(payload(0));
        let b = log.append(payload(1));
        let c = log.append(payload(2));

        let actions = log.move_to(&c.id, 0).unwrap();
        let order: Vec<_> = actions.iter().map(|x| x.id.clone()).collect();
        assert_eq!(order, vec![c.id, a.id, b.id]);
        assert_eq!(indices(&log), vec![0, 1, 2]);
    }

    #[test]
    fn move_forward_shifts_intermediates_down() {
        // A(0) B(1) C(2) D(3); move A to 2 => B C A D
        let mut log = log();
        let a = log.append(payload(0));
        let b = log.append(payload(1));
        let c = log.append(payload(2));
        let d = log.append(payload(3));

        let actions = log.move_to(&a.id, 2).unwrap();
        let order: Vec<_> = actions.iter().map(|x| x.id.clone()).collect();
        assert_eq!(order, vec![b.id, c.id, a.id, d.id]);
        assert_eq!(indices(&log), vec![0, 1, 2, 3]);
    }

    #[test]
    fn move_preserves_relative_order_of_others() {
        let mut log = log();
        let ids: Vec<_> = (0..6).map(|i| log.append(payload(i)).id).collect();

        log.move_to(&ids[4], 1).unwrap();

        let after: Vec<_> = log
            .list()
            .iter()
            .map(|a| a.id.clone())
            .filter(|id| *id != ids[4])
            .collect();
        let expected: Vec<_> = ids.iter().filter(|id| **id != ids[4]).cloned().collect();
        assert_eq!(after, expected);
    }

    #[test]
    fn move_clears_selection() {
        let mut log = log();
        let a = log.append(payload(0));
        log.append(payload(1));
        log.update(&a.id, payload(0), true).unwrap();

        log.move_to(&a.id, 1).unwrap();
        assert!(!log.get(&a.id).unwrap().selected);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn move_out_of_range_is_a_contract_violation() {
        let mut log = log();
        let a = log.append(payload(0));
        let _ = log.move_to(&a.id, 5);
    }

    #[test]
    fn indices_stay_dense_under_mixed_operations() {
        let mut log = log();
        let mut ids = Vec::new();
        for i in 0..8 {
            ids.push(log.append(payload(i)).id);
        }

        log.delete(&ids[3]).unwrap();
        log.delete(&ids[0]).unwrap();
        log.move_to(&ids[7], 0).unwrap();
        log.append(payload(100));
        log.move_to(&ids[1], 4).unwrap();
        log.delete(&ids[6]).unwrap();

        let expected: Vec<usize> = (0..log.len()).collect();
        assert_eq!(indices(&log), expected);
    }
}
