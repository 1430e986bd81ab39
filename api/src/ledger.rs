//! The vote ledger: at most one entry per (voter, target), with the cached
//! `vote_count` columns kept as a projection of the ledger rows.

use redline_shared::{TargetKind, VoteDirection, VoteResponse};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::error::{AppError, AppResult};

/// How a repeated vote by the same voter is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VotePolicy {
    /// Presence only: voting again retracts the vote.
    Toggle,
    /// Up/down: the same direction again is a no-op, the opposite direction flips.
    Signed(VoteDirection),
}

/// The ledger entry to keep after a call, and how far the count moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub entry: Option<i32>,
    pub delta: i64,
}

impl VotePolicy {
    pub fn transition(self, existing: Option<i32>) -> Transition {
        match (self, existing) {
            (VotePolicy::Toggle, None) => Transition {
                entry: Some(1),
                delta: 1,
            },
            (VotePolicy::Toggle, Some(old)) => Transition {
                entry: None,
                delta: -i64::from(old),
            },
            (VotePolicy::Signed(direction), None) => Transition {
                entry: Some(direction.value()),
                delta: i64::from(direction.value()),
            },
            (VotePolicy::Signed(direction), Some(old)) if old == direction.value() => Transition {
                entry: Some(old),
                delta: 0,
            },
            (VotePolicy::Signed(direction), Some(old)) => Transition {
                entry: Some(direction.value()),
                delta: i64::from(direction.value() - old),
            },
        }
    }
}

fn table(kind: TargetKind) -> &'static str {
    match kind {
        TargetKind::Comment => "comments",
        TargetKind::Correction => "corrections",
    }
}

fn entry_for(
    conn: &Connection,
    voter_id: i64,
    kind: TargetKind,
    target_id: i64,
) -> rusqlite::Result<Option<i32>> {
    conn.query_row(
        "SELECT value FROM votes
         WHERE voter_id = ?1 AND target_kind = ?2 AND target_id = ?3",
        params![voter_id, kind.as_str(), target_id],
        |row| row.get(0),
    )
    .optional()
}

/// Apply one vote under `policy` and return the resulting count.
///
/// The lookup, the ledger write and the count update share one
/// `BEGIN IMMEDIATE` transaction, so concurrent calls for the same pair
/// serialize on the database write lock.
pub fn toggle_vote(
    conn: &mut Connection,
    voter_id: i64,
    kind: TargetKind,
    target_id: i64,
    policy: VotePolicy,
) -> AppResult<VoteResponse> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let count: i64 = tx
        .query_row(
            &format!("SELECT vote_count FROM {} WHERE id = ?1", table(kind)),
            [target_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(AppError::NotFound)?;

    let existing = entry_for(&tx, voter_id, kind, target_id)?;
    let transition = policy.transition(existing);

    match (existing, transition.entry) {
        (None, Some(value)) => {
            tx.execute(
                "INSERT INTO votes (voter_id, target_kind, target_id, value)
                 VALUES (?1, ?2, ?3, ?4)",
                params![voter_id, kind.as_str(), target_id, value],
            )?;
        }
        (Some(old), Some(value)) if old != value => {
            tx.execute(
                "UPDATE votes SET value = ?4
                 WHERE voter_id = ?1 AND target_kind = ?2 AND target_id = ?3",
                params![voter_id, kind.as_str(), target_id, value],
            )?;
        }
        (Some(_), None) => {
            tx.execute(
                "DELETE FROM votes
                 WHERE voter_id = ?1 AND target_kind = ?2 AND target_id = ?3",
                params![voter_id, kind.as_str(), target_id],
            )?;
        }
        _ => {}
    }

    if transition.delta != 0 {
        tx.execute(
            &format!(
                "UPDATE {} SET vote_count = vote_count + ?1 WHERE id = ?2",
                table(kind)
            ),
            params![transition.delta, target_id],
        )?;
    }

    tx.commit()?;

    tracing::debug!(
        voter_id,
        target_id,
        kind = kind.as_str(),
        delta = transition.delta,
        "vote applied"
    );

    Ok(VoteResponse {
        vote_count: count + transition.delta,
        user_vote: transition.entry,
    })
}

/// Current count for a target, plus the voter's own entry when known.
pub fn current(
    conn: &Connection,
    voter_id: Option<i64>,
    kind: TargetKind,
    target_id: i64,
) -> AppResult<VoteResponse> {
    let vote_count: i64 = conn
        .query_row(
            &format!("SELECT vote_count FROM {} WHERE id = ?1", table(kind)),
            [target_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(AppError::NotFound)?;

    let user_vote = match voter_id {
        Some(voter_id) => entry_for(conn, voter_id, kind, target_id)?,
        None => None,
    };

    Ok(VoteResponse {
        vote_count,
        user_vote,
    })
}

/// Recompute every cached count from the ledger. Returns how many targets
/// had drifted.
pub fn rebuild_counts(conn: &mut Connection) -> AppResult<usize> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut drifted = 0usize;

    for kind in [TargetKind::Comment, TargetKind::Correction] {
        let projected = format!(
            "COALESCE((SELECT SUM(v.value) FROM votes v
                       WHERE v.target_kind = '{kind}' AND v.target_id = {table}.id), 0)",
            kind = kind.as_str(),
            table = table(kind),
        );

        let stale: i64 = tx.query_row(
            &format!(
                "SELECT COUNT(*) FROM {table} WHERE vote_count != {projected}",
                table = table(kind)
            ),
            [],
            |row| row.get(0),
        )?;

        if stale > 0 {
            tx.execute(
                &format!(
                    "UPDATE {table} SET vote_count = {projected}",
                    table = table(kind)
                ),
                [],
            )?;
            drifted += stale as usize;
        }
    }

    tx.commit()?;
    Ok(drifted)
}
