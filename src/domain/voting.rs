use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{InvalidRating, Participant, ParticipantId, PointId, RoutePoint, TripId, Vote};

/// Fewest route points a voting session can be started with.
pub const MIN_CANDIDATE_POINTS: usize = 2;

// ========================
// Aggregation
// ========================

/// One voter's rating as shown in the results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastVote {
    pub voter: ParticipantId,
    pub value: u8,
    pub comment: Option<String>,
}

/// Aggregated outcome for a single route point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointResult {
    pub point_id: PointId,
    pub name: String,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub order: i64,
    pub total_votes: u32,
    pub rating_sum: u32,
    /// 0 when nobody voted
    pub average_rating: f64,
    /// In submission order
    pub votes: Vec<CastVote>,
}

impl PointResult {
    fn from_point(point: &RoutePoint, votes: Vec<CastVote>) -> Self {
        let total_votes = u32::try_from(votes.len()).unwrap_or(u32::MAX);
        let rating_sum = votes
            .iter()
            .fold(0u32, |sum, v| sum.saturating_add(u32::from(v.value)));
        let average_rating = if total_votes > 0 {
            f64::from(rating_sum) / f64::from(total_votes)
        } else {
            0.0
        };

        Self {
            point_id: point.id,
            name: point.name.clone(),
            description: point.description.clone(),
            latitude: point.latitude,
            longitude: point.longitude,
            order: point.order,
            total_votes,
            rating_sum,
            average_rating,
            votes,
        }
    }

    /// Compare averages exactly: a/b vs c/d as a*d vs c*b.
    fn cmp_average(&self, other: &Self) -> Ordering {
        let lhs = u64::from(self.rating_sum) * u64::from(other.total_votes);
        let rhs = u64::from(other.rating_sum) * u64::from(self.total_votes);
        lhs.cmp(&rhs)
    }

    /// Ranking: average desc, vote count desc, ordering index asc.
    fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .cmp_average(self)
            .then_with(|| other.total_votes.cmp(&self.total_votes))
            .then_with(|| self.order.cmp(&other.order))
            .then_with(|| self.point_id.cmp(&other.point_id))
    }
}

/// Group votes by point, compute counts and averages, and rank the points.
/// Every point appears in the result, voted on or not. Votes for unknown
/// points are dropped; a repeated (voter, point) pair keeps the later vote.
pub fn aggregate_votes(points: &[RoutePoint], votes: &[Vote]) -> Vec<PointResult> {
    let mut by_point: HashMap<PointId, Vec<CastVote>> =
        points.iter().map(|p| (p.id, Vec::new())).collect();

    for vote in votes {
        let Some(cast) = by_point.get_mut(&vote.point_id) else {
            debug!(point_id = %vote.point_id, voter = %vote.voter, "Vote for unknown point ignored");
            continue;
        };
        match cast.iter_mut().find(|c| c.voter == vote.voter) {
            Some(existing) => {
                existing.value = vote.value;
                if vote.comment.is_some() {
                    existing.comment = vote.comment.clone();
                }
            }
            None => cast.push(CastVote {
                voter: vote.voter,
                value: vote.value,
                comment: vote.comment.clone(),
            }),
        }
    }

    let mut results: Vec<PointResult> = points
        .iter()
        .map(|point| {
            let cast = by_point.remove(&point.id).unwrap_or_default();
            PointResult::from_point(point, cast)
        })
        .collect();

    results.sort_by(PointResult::rank_cmp);
    results
}

// ========================
// Voting session
// ========================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingState {
    NotStarted,
    Voting,
}

impl VotingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VotingState::NotStarted => "not_started",
            VotingState::Voting => "voting",
        }
    }
}

impl FromStr for VotingState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(VotingState::NotStarted),
            "voting" => Ok(VotingState::Voting),
            other => Err(format!("unknown voting state '{}'", other)),
        }
    }
}

impl std::fmt::Display for VotingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Per-trip voting lifecycle: `NotStarted -> Voting`. Concluding a vote is
/// left to the people involved; there is no closed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingSession {
    pub trip_id: TripId,
    pub state: VotingState,
    pub started_at: Option<DateTime<Utc>>,
    pub started_by: Option<ParticipantId>,
}

impl VotingSession {
    pub fn new(trip_id: TripId) -> Self {
        Self {
            trip_id,
            state: VotingState::NotStarted,
            started_at: None,
            started_by: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == VotingState::Voting
    }

    /// Open voting. Only the trip owner may do this, and only with at least
    /// [`MIN_CANDIDATE_POINTS`] route points. On error nothing changes.
    pub fn start(
        &mut self,
        requester: &Participant,
        candidate_points: usize,
        now: DateTime<Utc>,
    ) -> Result<(), VotingError> {
        if !requester.is_owner() {
            return Err(VotingError::NotOwner(requester.id));
        }
        if self.is_active() {
            return Err(VotingError::AlreadyActive);
        }
        if candidate_points < MIN_CANDIDATE_POINTS {
            return Err(VotingError::InsufficientCandidatePoints {
                found: candidate_points,
            });
        }

        self.state = VotingState::Voting;
        self.started_at = Some(now);
        self.started_by = Some(requester.id);
        Ok(())
    }

    /// Check that `voter` may rate `point` with `value` right now and build
    /// the vote record.
    pub fn cast(
        &self,
        voter: &Participant,
        point: &RoutePoint,
        value: u8,
        comment: Option<String>,
    ) -> Result<Vote, VotingError> {
        if !self.is_active() {
            return Err(VotingError::VotingNotActive);
        }
        if !voter.is_accepted() {
            return Err(VotingError::NotAccepted(voter.id));
        }
        if point.trip_id != self.trip_id {
            return Err(VotingError::PointNotInTrip(point.id));
        }

        let vote = Vote::new(self.trip_id, voter.id, point.id, value)?;
        Ok(match comment {
            Some(c) => vote.with_comment(c),
            None => vote,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VotingError {
    NotOwner(ParticipantId),
    AlreadyActive,
    InsufficientCandidatePoints { found: usize },
    VotingNotActive,
    NotAccepted(ParticipantId),
    PointNotInTrip(PointId),
    InvalidRating(u8),
}

impl From<InvalidRating> for VotingError {
    fn from(err: InvalidRating) -> Self {
        VotingError::InvalidRating(err.0)
    }
}

impl std::fmt::Display for VotingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VotingError::NotOwner(_) => write!(f, "only the trip owner can start voting"),
            VotingError::AlreadyActive => write!(f, "voting is already active"),
            VotingError::InsufficientCandidatePoints { found } => write!(
                f,
                "insufficient candidate points: need at least {}, found {}",
                MIN_CANDIDATE_POINTS, found
            ),
            VotingError::VotingNotActive => write!(f, "voting not active"),
            VotingError::NotAccepted(_) => {
                write!(f, "only accepted participants can vote")
            }
            VotingError::PointNotInTrip(id) => {
                write!(f, "route point {} does not belong to this trip", id)
            }
            VotingError::InvalidRating(v) => write!(f, "{}", InvalidRating(*v)),
        }
    }
}

impl std::error::Error for VotingError {}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::domain::{InvitationStatus, Role};

    fn point(trip: TripId, name: &str, order: i64) -> RoutePoint {
        RoutePoint::new(trip, name, 50.0, 80.0, order).unwrap()
    }

    fn vote(trip: TripId, voter: ParticipantId, point: &RoutePoint, value: u8) -> Vote {
        Vote::new(trip, voter, point.id, value).unwrap()
    }

    fn accepted(trip: TripId, name: &str) -> Participant {
        Participant::new(trip, name).with_status(InvitationStatus::Accepted)
    }

    #[test]
    fn test_ranking_by_average_then_count_then_order() {
        let trip = Uuid::new_v4();
        let p1 = point(trip, "P1", 0);
        let p2 = point(trip, "P2", 1);
        let p3 = point(trip, "P3", 2);
        let (u, v) = (Uuid::new_v4(), Uuid::new_v4());

        let votes = vec![
            vote(trip, u, &p2, 5),
            vote(trip, u, &p1, 5),
            vote(trip, v, &p1, 5),
        ];

        let results = aggregate_votes(&[p3.clone(), p2.clone(), p1.clone()], &votes);
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["P1", "P2", "P3"]);

        assert_eq!(results[0].total_votes, 2);
        assert_eq!(results[0].average_rating, 5.0);
        assert_eq!(results[1].total_votes, 1);
        assert_eq!(results[2].total_votes, 0);
        assert_eq!(results[2].average_rating, 0.0);
        assert!(results[2].votes.is_empty());
    }

    #[test]
    fn test_tie_broken_by_order_regardless_of_submission_order() {
        let trip = Uuid::new_v4();
        let early = point(trip, "Early", 0);
        let late = point(trip, "Late", 7);
        let (u, v) = (Uuid::new_v4(), Uuid::new_v4());

        let forward = vec![vote(trip, u, &early, 4), vote(trip, v, &late, 4)];
        let backward = vec![vote(trip, v, &late, 4), vote(trip, u, &early, 4)];

        for votes in [forward, backward] {
            let results = aggregate_votes(&[late.clone(), early.clone()], &votes);
            assert_eq!(results[0].point_id, early.id);
            assert_eq!(results[1].point_id, late.id);
        }
    }

    #[test]
    fn test_average_comparison_is_exact() {
        let trip = Uuid::new_v4();
        let a = point(trip, "A", 1);
        let b = point(trip, "B", 0);
        let voters: Vec<ParticipantId> = (0..6).map(|_| Uuid::new_v4()).collect();

        // A: (5 + 4 + 4) / 3 = 4.333..., B: (5 + 4) / 2 = 4.5
        let votes = vec![
            vote(trip, voters[0], &a, 5),
            vote(trip, voters[1], &a, 4),
            vote(trip, voters[2], &a, 4),
            vote(trip, voters[3], &b, 5),
            vote(trip, voters[4], &b, 4),
        ];
        let results = aggregate_votes(&[a.clone(), b.clone()], &votes);
        assert_eq!(results[0].point_id, b.id);
        assert_eq!(results[0].average_rating, 4.5);
    }

    #[test]
    fn test_repeated_vote_keeps_latest() {
        let trip = Uuid::new_v4();
        let p = point(trip, "P", 0);
        let voter = Uuid::new_v4();

        let votes = vec![
            vote(trip, voter, &p, 2).with_comment("meh"),
            vote(trip, voter, &p, 5),
        ];
        let results = aggregate_votes(&[p], &votes);

        assert_eq!(results[0].total_votes, 1);
        assert_eq!(results[0].votes[0].value, 5);
        assert_eq!(results[0].votes[0].comment.as_deref(), Some("meh"));
    }

    #[test]
    fn test_votes_for_unknown_points_are_ignored() {
        let trip = Uuid::new_v4();
        let p = point(trip, "P", 0);
        let gone = point(trip, "Gone", 1);
        let votes = vec![vote(trip, Uuid::new_v4(), &gone, 5)];

        let results = aggregate_votes(&[p], &votes);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].total_votes, 0);
    }

    #[test]
    fn test_votes_listed_in_submission_order() {
        let trip = Uuid::new_v4();
        let p = point(trip, "P", 0);
        let voters: Vec<ParticipantId> = (0..3).map(|_| Uuid::new_v4()).collect();
        let votes: Vec<Vote> = voters.iter().map(|v| vote(trip, *v, &p, 3)).collect();

        let results = aggregate_votes(&[p], &votes);
        let listed: Vec<ParticipantId> = results[0].votes.iter().map(|c| c.voter).collect();
        assert_eq!(listed, voters);
    }

    #[test]
    fn test_start_requires_two_points() {
        let trip = Uuid::new_v4();
        let owner = Participant::owner(trip, "Owner");
        let mut session = VotingSession::new(trip);

        let err = session.start(&owner, 1, Utc::now()).unwrap_err();
        assert_eq!(err, VotingError::InsufficientCandidatePoints { found: 1 });
        assert_eq!(session, VotingSession::new(trip));

        session.start(&owner, 2, Utc::now()).unwrap();
        assert!(session.is_active());
        assert_eq!(session.started_by, Some(owner.id));
    }

    #[test]
    fn test_start_requires_owner() {
        let trip = Uuid::new_v4();
        let editor = accepted(trip, "Editor").with_role(Role::Editor);
        let mut session = VotingSession::new(trip);

        assert_eq!(
            session.start(&editor, 3, Utc::now()),
            Err(VotingError::NotOwner(editor.id))
        );
        assert_eq!(session.state, VotingState::NotStarted);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let trip = Uuid::new_v4();
        let owner = Participant::owner(trip, "Owner");
        let mut session = VotingSession::new(trip);
        session.start(&owner, 2, Utc::now()).unwrap();
        let started_at = session.started_at;

        assert_eq!(
            session.start(&owner, 2, Utc::now()),
            Err(VotingError::AlreadyActive)
        );
        assert_eq!(session.started_at, started_at);
    }

    #[test]
    fn test_cast_rejected_before_start() {
        let trip = Uuid::new_v4();
        let voter = accepted(trip, "Voter");
        let p = point(trip, "P", 0);
        let session = VotingSession::new(trip);

        assert_eq!(
            session.cast(&voter, &p, 4, None),
            Err(VotingError::VotingNotActive)
        );
    }

    #[test]
    fn test_cast_checks_voter_point_and_value() {
        let trip = Uuid::new_v4();
        let owner = Participant::owner(trip, "Owner");
        let pending = Participant::new(trip, "Pending");
        let voter = accepted(trip, "Voter");
        let p = point(trip, "P", 0);
        let foreign = point(Uuid::new_v4(), "Elsewhere", 0);

        let mut session = VotingSession::new(trip);
        session.start(&owner, 2, Utc::now()).unwrap();

        assert_eq!(
            session.cast(&pending, &p, 3, None),
            Err(VotingError::NotAccepted(pending.id))
        );
        assert_eq!(
            session.cast(&voter, &foreign, 3, None),
            Err(VotingError::PointNotInTrip(foreign.id))
        );
        assert_eq!(
            session.cast(&voter, &p, 6, None),
            Err(VotingError::InvalidRating(6))
        );

        let vote = session
            .cast(&voter, &p, 4, Some("lovely".to_string()))
            .unwrap();
        assert_eq!(vote.voter, voter.id);
        assert_eq!(vote.value, 4);
        assert_eq!(vote.comment.as_deref(), Some("lovely"));
    }

    #[test]
    fn test_voting_state_roundtrip() {
        for state in [VotingState::NotStarted, VotingState::Voting] {
            assert_eq!(state.as_str().parse::<VotingState>(), Ok(state));
        }
    }
}
