use super::Match;
use crate::tournament::models::{FormatSettings, ParticipantId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row of a round-robin table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingRow {
    /// 1-based position
    pub rank: u32,
    pub participant_id: ParticipantId,
    pub played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub score_for: u64,
    pub score_against: u64,
    pub score_diff: i64,
    pub points: u32,
}

impl StandingRow {
    fn new(participant_id: ParticipantId) -> Self {
        Self {
            rank: 0,
            participant_id,
            played: 0,
            wins: 0,
            draws: 0,
            losses: 0,
            score_for: 0,
            score_against: 0,
            score_diff: 0,
            points: 0,
        }
    }
}

#[derive(Clone, Copy)]
enum MatchResult {
    Win,
    Draw,
    Loss,
}

impl MatchResult {
    fn for_participant(m: &Match, participant: ParticipantId) -> Self {
        match m.winner {
            None => MatchResult::Draw,
            Some(winner) if winner == participant => MatchResult::Win,
            Some(_) => MatchResult::Loss,
        }
    }

    fn points(self, settings: &FormatSettings) -> u32 {
        match self {
            MatchResult::Win => settings.win_points,
            MatchResult::Draw => settings.draw_points,
            MatchResult::Loss => settings.loss_points,
        }
    }
}

/// Completed, contested fixtures as `(a, b, score_a, score_b)`
fn played(matches: &[Match]) -> impl Iterator<Item = (&Match, ParticipantId, ParticipantId, u32, u32)> {
    matches
        .iter()
        .filter(|m| m.is_completed() && !m.is_bye())
        .filter_map(|m| {
            let (a, b) = (m.participant_a?, m.participant_b?);
            let (score_a, score_b) = m.score.as_ref().map_or((0, 0), |s| (s.a, s.b));
            Some((m, a, b, score_a, score_b))
        })
}

/// Points `participant` took from fixtures against `opponent`
fn head_to_head_points(
    matches: &[Match],
    settings: &FormatSettings,
    participant: ParticipantId,
    opponent: ParticipantId,
) -> u32 {
    played(matches)
        .filter(|(m, ..)| m.has_participant(participant) && m.has_participant(opponent))
        .map(|(m, ..)| MatchResult::for_participant(m, participant).points(settings))
        .sum()
}

/// Compute the round-robin table.
///
/// Ordering: points descending; a tie between exactly two participants is
/// broken by their head-to-head points; remaining ties fall back to score
/// difference descending and then participant id ascending. Every
/// participant scheduled in any fixture gets a row, including ones that
/// have not played yet.
pub fn compute_standings(matches: &[Match], settings: &FormatSettings) -> Vec<StandingRow> {
    let mut table: BTreeMap<ParticipantId, StandingRow> = BTreeMap::new();
    for participant in matches
        .iter()
        .flat_map(|m| [m.participant_a, m.participant_b])
        .flatten()
    {
        table
            .entry(participant)
            .or_insert_with(|| StandingRow::new(participant));
    }

    for (m, a, b, score_a, score_b) in played(matches) {
        for (participant, scored, conceded) in [(a, score_a, score_b), (b, score_b, score_a)] {
            let Some(row) = table.get_mut(&participant) else {
                continue;
            };
            let result = MatchResult::for_participant(m, participant);
            row.played += 1;
            row.score_for += u64::from(scored);
            row.score_against += u64::from(conceded);
            row.points += result.points(settings);
            match result {
                MatchResult::Win => row.wins += 1,
                MatchResult::Draw => row.draws += 1,
                MatchResult::Loss => row.losses += 1,
            }
        }
    }

    let mut rows: Vec<StandingRow> = table
        .into_values()
        .map(|mut row| {
            row.score_diff = row.score_for as i64 - row.score_against as i64;
            row
        })
        .collect();

    rows.sort_by(|x, y| {
        y.points
            .cmp(&x.points)
            .then(y.score_diff.cmp(&x.score_diff))
            .then(x.participant_id.cmp(&y.participant_id))
    });

    let mut start = 0;
    while start < rows.len() {
        let points = rows[start].points;
        let end = rows[start..]
            .iter()
            .position(|row| row.points != points)
            .map_or(rows.len(), |len| start + len);

        if end - start == 2 {
            let (first, second) = (rows[start].participant_id, rows[start + 1].participant_id);
            let first_h2h = head_to_head_points(matches, settings, first, second);
            let second_h2h = head_to_head_points(matches, settings, second, first);
            if second_h2h > first_h2h {
                rows.swap(start, start + 1);
            }
        }

        start = end;
    }

    for (position, row) in rows.iter_mut().enumerate() {
        row.rank = position as u32 + 1;
    }

    rows
}
