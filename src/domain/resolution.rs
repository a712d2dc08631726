//! Duplicate resolution workflow
//!
//! A pure state machine. It never touches storage: it inspects the current
//! takes, and when a save can go ahead it hands back a [`Changeset`] for the
//! registry to commit. The caller reports the outcome with
//! [`ResolutionWorkflow::mark_committed`] or
//! [`ResolutionWorkflow::abort_resolving`].
//!
//! ```text
//! Idle -> Detecting -> Committed                      (no conflicts)
//! Idle -> Detecting -> AwaitingDecision -> Resolving -> Committed
//!                                      \-> Cancelled
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::duplicate::{detect, ConflictKind, ConflictSet};
use super::id::TakeId;
use super::numbering::MAX_NUMBER;
use super::take::LogSheet;

#[derive(Debug, Error, PartialEq)]
pub enum ResolutionError {
    #[error("Strategy '{0}' is not available for these conflicts")]
    StrategyUnavailable(Strategy),

    #[error("Renumbering found no free numbers after {0}")]
    RenumberExhausted(u32),

    #[error("Strategy '{0}' would leave conflicts behind")]
    Unresolvable(Strategy),

    #[error("Cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: WorkflowState,
    },
}

/// How the caller wants a conflict resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Shift the colliding take and its successors up to make room
    RenumberForward,
    /// Replace the colliding take's content with the candidate's
    Overwrite,
    /// Give the colliding take the edited take's previous slot
    Swap,
    /// Abandon the save
    Cancel,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::RenumberForward => "renumber",
            Strategy::Overwrite => "overwrite",
            Strategy::Swap => "swap",
            Strategy::Cancel => "cancel",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "renumber" | "renumber_forward" | "renumber-forward" => Ok(Strategy::RenumberForward),
            "overwrite" => Ok(Strategy::Overwrite),
            "swap" => Ok(Strategy::Swap),
            "cancel" => Ok(Strategy::Cancel),
            other => Err(format!("Unknown resolution strategy: {}", other)),
        }
    }
}

/// Workflow states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "strategy", rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    Detecting,
    AwaitingDecision,
    Resolving(Strategy),
    Committed,
    Cancelled,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::Idle => f.write_str("idle"),
            WorkflowState::Detecting => f.write_str("detecting"),
            WorkflowState::AwaitingDecision => f.write_str("awaiting decision"),
            WorkflowState::Resolving(s) => write!(f, "resolving ({})", s),
            WorkflowState::Committed => f.write_str("committed"),
            WorkflowState::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// A recorded state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: WorkflowState,
    pub to: WorkflowState,
}

/// Registry mutations that must become visible together
#[derive(Debug, Clone, PartialEq)]
pub struct Changeset {
    /// Records to insert or replace (matched by ID)
    pub upserts: Vec<LogSheet>,
    /// Records to remove
    pub deletes: Vec<TakeId>,
    /// The record the save resulted in
    pub primary: TakeId,
}

impl Changeset {
    /// Changeset that stores the candidate unchanged
    pub fn insert(candidate: LogSheet) -> Self {
        Self {
            primary: candidate.id.clone(),
            upserts: vec![candidate],
            deletes: Vec::new(),
        }
    }

    /// The record set after this changeset, in the input's order
    pub fn apply_to(&self, takes: &[LogSheet]) -> Vec<LogSheet> {
        let mut upserts: BTreeMap<&TakeId, &LogSheet> =
            self.upserts.iter().map(|t| (&t.id, t)).collect();

        let mut result: Vec<LogSheet> = takes
            .iter()
            .filter(|t| !self.deletes.contains(&t.id))
            .map(|t| upserts.remove(&t.id).cloned().unwrap_or_else(|| t.clone()))
            .collect();

        // Remaining upserts are new records
        result.extend(
            self.upserts
                .iter()
                .filter(|t| upserts.contains_key(&t.id))
                .cloned(),
        );
        result
    }

    /// The primary record as stored by this changeset
    pub fn primary_record(&self) -> Option<&LogSheet> {
        self.upserts.iter().find(|t| t.id == self.primary)
    }
}

/// What the caller should do after choosing a strategy
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Commit(Changeset),
    Cancelled,
}

/// One save attempt, from conflict detection to commit or cancel
#[derive(Debug, Clone)]
pub struct ResolutionWorkflow {
    candidate: LogSheet,
    previous: Option<LogSheet>,
    state: WorkflowState,
    conflicts: ConflictSet,
    exhausted: BTreeSet<Strategy>,
    transitions: Vec<Transition>,
}

impl ResolutionWorkflow {
    /// Starts a workflow for `candidate`
    ///
    /// `previous` is the stored version of the take when an existing take is
    /// being edited.
    pub fn new(candidate: LogSheet, previous: Option<LogSheet>) -> Self {
        Self {
            candidate,
            previous,
            state: WorkflowState::Idle,
            conflicts: ConflictSet::default(),
            exhausted: BTreeSet::new(),
            transitions: Vec::new(),
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn candidate(&self) -> &LogSheet {
        &self.candidate
    }

    pub fn conflicts(&self) -> &ConflictSet {
        &self.conflicts
    }

    /// Every state change so far, oldest first
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Strategies the caller may choose from right now
    pub fn strategies(&self) -> Vec<Strategy> {
        let single = self.conflicts.single_target().is_some();
        let mut available = Vec::new();

        if !self.exhausted.contains(&Strategy::RenumberForward) {
            available.push(Strategy::RenumberForward);
        }
        if single {
            available.push(Strategy::Overwrite);
        }
        if single && self.previous.is_some() {
            available.push(Strategy::Swap);
        }
        available.push(Strategy::Cancel);
        available
    }

    fn transition(&mut self, to: WorkflowState) {
        let from = self.state;
        log::debug!("take {}: {} -> {}", self.candidate.id, from, to);
        self.transitions.push(Transition { from, to });
        self.state = to;
    }

    fn require(&self, expected: WorkflowState, action: &'static str) -> Result<(), ResolutionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ResolutionError::InvalidState {
                action,
                state: self.state,
            })
        }
    }

    /// Checks the candidate against `existing`
    ///
    /// Returns the changeset to commit when there is nothing to resolve;
    /// otherwise the workflow waits for [`choose`](Self::choose).
    pub fn detect(&mut self, existing: &[LogSheet]) -> Result<Option<Changeset>, ResolutionError> {
        self.require(WorkflowState::Idle, "detect conflicts")?;
        self.transition(WorkflowState::Detecting);

        self.conflicts = detect(existing, &self.candidate);
        if self.conflicts.is_empty() {
            return Ok(Some(Changeset::insert(self.candidate.clone())));
        }

        self.transition(WorkflowState::AwaitingDecision);
        Ok(None)
    }

    /// Applies the caller's choice against the current takes
    ///
    /// Conflicts are recomputed first, since the registry may have changed
    /// while the decision was pending. A failed renumber leaves the workflow
    /// awaiting a decision with renumbering withdrawn.
    pub fn choose(
        &mut self,
        strategy: Strategy,
        existing: &[LogSheet],
    ) -> Result<Decision, ResolutionError> {
        self.require(WorkflowState::AwaitingDecision, "choose a strategy")?;

        if strategy == Strategy::Cancel {
            self.transition(WorkflowState::Cancelled);
            return Ok(Decision::Cancelled);
        }

        self.conflicts = detect(existing, &self.candidate);
        if self.conflicts.is_empty() {
            self.transition(WorkflowState::Resolving(strategy));
            return Ok(Decision::Commit(Changeset::insert(self.candidate.clone())));
        }

        if !self.strategies().contains(&strategy) {
            return Err(ResolutionError::StrategyUnavailable(strategy));
        }

        let planned = match strategy {
            Strategy::RenumberForward => self.plan_renumber(existing),
            Strategy::Overwrite => self.plan_overwrite(existing),
            Strategy::Swap => self.plan_swap(existing),
            Strategy::Cancel => unreachable!("handled above"),
        };

        match planned {
            Ok(changeset) => {
                self.transition(WorkflowState::Resolving(strategy));
                Ok(Decision::Commit(changeset))
            }
            Err(e @ ResolutionError::RenumberExhausted(_)) => {
                log::warn!("take {}: {}", self.candidate.id, e);
                self.exhausted.insert(Strategy::RenumberForward);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Abandons the workflow before anything was committed
    pub fn cancel(&mut self) -> Result<(), ResolutionError> {
        match self.state {
            WorkflowState::Idle | WorkflowState::AwaitingDecision => {
                self.transition(WorkflowState::Cancelled);
                Ok(())
            }
            state => Err(ResolutionError::InvalidState {
                action: "cancel",
                state,
            }),
        }
    }

    /// Records that the changeset was committed
    pub fn mark_committed(&mut self) -> Result<(), ResolutionError> {
        match self.state {
            WorkflowState::Detecting | WorkflowState::Resolving(_) => {
                self.transition(WorkflowState::Committed);
                Ok(())
            }
            state => Err(ResolutionError::InvalidState {
                action: "commit",
                state,
            }),
        }
    }

    /// Returns to awaiting a decision after a commit could not be persisted
    pub fn abort_resolving(&mut self) -> Result<(), ResolutionError> {
        match self.state {
            WorkflowState::Resolving(_) => {
                self.transition(WorkflowState::AwaitingDecision);
                Ok(())
            }
            state => Err(ResolutionError::InvalidState {
                action: "abort",
                state,
            }),
        }
    }

    fn others<'a>(&'a self, existing: &'a [LogSheet]) -> impl Iterator<Item = &'a LogSheet> {
        existing.iter().filter(move |t| t.id != self.candidate.id)
    }

    fn target<'a>(&self, existing: &'a [LogSheet], strategy: Strategy) -> Result<&'a LogSheet, ResolutionError> {
        let id = self
            .conflicts
            .single_target()
            .ok_or(ResolutionError::StrategyUnavailable(strategy))?;
        existing
            .iter()
            .find(|t| &t.id == id)
            .ok_or(ResolutionError::StrategyUnavailable(strategy))
    }

    /// Deletes the edited take's stored record when it still exists
    fn edited_record_delete(&self, existing: &[LogSheet]) -> Vec<TakeId> {
        existing
            .iter()
            .filter(|t| t.id == self.candidate.id)
            .map(|t| t.id.clone())
            .collect()
    }

    fn plan_overwrite(&self, existing: &[LogSheet]) -> Result<Changeset, ResolutionError> {
        let mut survivor = self.target(existing, Strategy::Overwrite)?.clone();
        survivor.replace_content_from(&self.candidate);

        let changeset = Changeset {
            primary: survivor.id.clone(),
            upserts: vec![survivor],
            deletes: self.edited_record_delete(existing),
        };
        verify(existing, &changeset, Strategy::Overwrite)?;
        Ok(changeset)
    }

    fn plan_swap(&self, existing: &[LogSheet]) -> Result<Changeset, ResolutionError> {
        let previous = self
            .previous
            .as_ref()
            .ok_or(ResolutionError::StrategyUnavailable(Strategy::Swap))?;
        let mut displaced = self.target(existing, Strategy::Swap)?.clone();

        displaced.scene = previous.scene.clone();
        displaced.take_number = previous.take_number;
        displaced.camera = previous.camera;
        if self.conflicts.has_kind(ConflictKind::FileNumber) {
            displaced.file_number = previous.file_number;
        }
        displaced.updated_at = chrono::Utc::now();

        let changeset = Changeset {
            primary: self.candidate.id.clone(),
            upserts: vec![self.candidate.clone(), displaced],
            deletes: Vec::new(),
        };
        verify(existing, &changeset, Strategy::Swap)?;
        Ok(changeset)
    }

    fn plan_renumber(&self, existing: &[LogSheet]) -> Result<Changeset, ResolutionError> {
        let candidate = &self.candidate;
        let mut shifted: BTreeMap<TakeId, LogSheet> = BTreeMap::new();

        if self.conflicts.has_kind(ConflictKind::SceneTake) {
            let mut chain: Vec<&LogSheet> = self
                .others(existing)
                .filter(|t| {
                    t.project_id == candidate.project_id
                        && t.camera == candidate.camera
                        && t.scene == candidate.scene
                        && t.take_number >= candidate.take_number
                })
                .collect();
            chain.sort_by_key(|t| t.take_number);

            let moves = shift_chain(chain.iter().map(|t| t.take_number), candidate.take_number)?;
            for (take, number) in chain.into_iter().zip(moves) {
                shifted
                    .entry(take.id.clone())
                    .or_insert_with(|| take.clone())
                    .take_number = number;
            }
        }

        if self.conflicts.has_kind(ConflictKind::FileNumber) {
            if let Some(file_number) = candidate.file_number {
                let mut chain: Vec<(&LogSheet, u32)> = self
                    .others(existing)
                    .filter(|t| t.project_id == candidate.project_id && t.camera == candidate.camera)
                    .filter_map(|t| t.file_number.filter(|n| *n >= file_number).map(|n| (t, n)))
                    .collect();
                chain.sort_by_key(|(_, n)| *n);

                let moves = shift_chain(chain.iter().map(|(_, n)| *n), file_number)?;
                for ((take, _), number) in chain.into_iter().zip(moves) {
                    shifted
                        .entry(take.id.clone())
                        .or_insert_with(|| take.clone())
                        .file_number = Some(number);
                }
            }
        }

        let now = chrono::Utc::now();
        let mut upserts = vec![candidate.clone()];
        upserts.extend(shifted.into_values().map(|mut t| {
            t.updated_at = now;
            t
        }));

        let changeset = Changeset {
            primary: candidate.id.clone(),
            upserts,
            deletes: Vec::new(),
        };
        verify(existing, &changeset, Strategy::RenumberForward)
            .map_err(|_| ResolutionError::RenumberExhausted(candidate.take_number))?;
        Ok(changeset)
    }
}

/// Minimal forward shift of an ascending chain so that `occupied` is free
///
/// Returns the new numbers of the leading members that have to move; each
/// moves to one past its predecessor and the first gap ends the chain.
fn shift_chain(chain: impl IntoIterator<Item = u32>, occupied: u32) -> Result<Vec<u32>, ResolutionError> {
    let mut moves = Vec::new();
    let mut next = occupied + 1;

    for number in chain {
        if number >= next {
            break;
        }
        if next > MAX_NUMBER {
            return Err(ResolutionError::RenumberExhausted(occupied));
        }
        moves.push(next);
        next += 1;
    }

    Ok(moves)
}

/// Fails if any record touched by `changeset` still collides with another
fn verify(existing: &[LogSheet], changeset: &Changeset, strategy: Strategy) -> Result<(), ResolutionError> {
    let after = changeset.apply_to(existing);
    let residual = changeset
        .upserts
        .iter()
        .any(|changed| !detect(&after, changed).is_empty());

    if residual {
        Err(ResolutionError::Unresolvable(strategy))
    } else {
        Ok(())
    }
}
