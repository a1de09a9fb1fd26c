//! Single-elimination tree generation.
//!
//! The field is padded to the next power of two. Seeds are laid out with the
//! standard bracket order so the top seeds can only meet in late rounds, and
//! empty positions become byes that are resolved immediately.

use super::{Bracket, BracketError, BracketResult, Match, MatchId, MatchStatus, Slot};
use crate::tournament::models::{BracketType, FormatSettings, ParticipantId, TournamentId};

/// Standard seeding layout for a power-of-two field.
///
/// Entry `i` is the 0-based seed placed at bracket position `i`; positions
/// `2k` and `2k + 1` meet in first-round match `k`. For 8 the layout is
/// `[0, 7, 3, 4, 1, 6, 2, 5]`.
pub fn seed_positions(size: usize) -> Vec<usize> {
    let mut order = vec![0];
    while order.len() < size {
        let len = order.len() * 2;
        order = order.iter().flat_map(|&seed| [seed, len - 1 - seed]).collect();
    }
    order
}

/// Number of rounds for a field of `participants`
pub fn round_count(participants: usize) -> u32 {
    participants.max(2).next_power_of_two().trailing_zeros()
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

    let size = seeds.len().next_power_of_two();
    let rounds = round_count(seeds.len());
    let mut matches = Vec::with_capacity(size - 1);

    // Provisional ids run 1..size-1 in round order, so the parent of match k
    // in a round is easy to compute from the next round's offset.
    let mut offset = 0usize;
    for round in 1..=rounds {
        let in_round = size >> round;
        let next_offset = offset + in_round;

        for k in 0..in_round {
            let id = (offset + k + 1) as MatchId;
            let mut m = Match::pending(id, tournament_id, round, k as u32);
            if round < rounds {
                m.next_match_id = Some((next_offset + k / 2 + 1) as MatchId);
                m.next_match_slot = Some(if k % 2 == 0 { Slot::A } else { Slot::B });
            }
            matches.push(m);
        }

        offset = next_offset;
    }

    for (k, pair) in seed_positions(size).chunks(2).enumerate() {
        let m = &mut matches[k];
        m.participant_a = seeds.get(pair[0]).copied();
        m.participant_b = seeds.get(pair[1]).copied();
        if m.participant_a.is_some() && m.participant_b.is_some() {
            m.status = MatchStatus::Ready;
        }
    }

    let mut bracket = Bracket::new(
        tournament_id,
        BracketType::SingleElimination,
        settings,
        matches,
    );

    // First-round matches occupy positions 0..size/2 after sorting
    for position in 0..size / 2 {
        let m = &bracket.matches[position];
        if m.participant_a.is_some() != m.participant_b.is_some() {
            bracket.resolve_bye(position);
        }
    }

    Ok(bracket)
}
