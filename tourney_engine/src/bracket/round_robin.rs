//! Round-robin fixture generation (circle method).

use super::{Bracket, BracketError, BracketResult, Match, MatchId, MatchStatus};
use crate::tournament::models::{BracketType, FormatSettings, ParticipantId, TournamentId};

/// Rounds in one leg for a field of `participants`
pub fn rounds_per_leg(participants: usize) -> u32 {
    let field = participants + participants % 2;
    field.saturating_sub(1) as u32
}

/// Fixtures for a field of `participants` over `legs` cycles
pub fn fixture_count(participants: usize, legs: u32) -> usize {
    participants * participants.saturating_sub(1) / 2 * legs as usize
}

pub(crate) fn generate(
    tournament_id: TournamentId,
    seeds: &[ParticipantId],
    settings: FormatSettings,
) -> BracketResult<Bracket> {
    if seeds.len() < 2 {
        return Err(BracketError::InsufficientParticipants {
            needed: 2,
            current: seeds.len(),
        });
    }

    // Odd fields get a phantom entry; whoever draws it sits the round out
    let mut ring: Vec<Option<ParticipantId>> = seeds.iter().copied().map(Some).collect();
    if ring.len() % 2 == 1 {
        ring.push(None);
    }

    let size = ring.len();
    let per_leg = rounds_per_leg(seeds.len());
    let legs = settings.legs.max(1);
    let mut matches = Vec::with_capacity(fixture_count(seeds.len(), legs));
    let mut next_id: MatchId = 1;

    for leg in 0..legs {
        let mut order = ring.clone();

        for r in 0..per_leg {
            let round = leg * per_leg + r + 1;
            let mut slot_in_round = 0;

            for i in 0..size / 2 {
                let (Some(x), Some(y)) = (order[i], order[size - 1 - i]) else {
                    continue;
                };
                // return legs swap sides
                let (a, b) = if leg % 2 == 0 { (x, y) } else { (y, x) };

                matches.push(Match {
                    participant_a: Some(a),
                    participant_b: Some(b),
                    status: MatchStatus::Ready,
                    ..Match::pending(next_id, tournament_id, round, slot_in_round)
                });
                next_id += 1;
                slot_in_round += 1;
            }

            order[1..].rotate_right(1);
        }
    }

    Ok(Bracket::new(
        tournament_id,
        BracketType::RoundRobin,
        settings,
        matches,
    ))
}
