//! Incentive adjustment.
//!
//! Each proposal's rank moves by the adjustment magnitude depending on its
//! owner's quality: a bonus (rank improves) at or above `Q_good`, a penalty
//! (rank worsens) at or below `Q_bad`, nothing in between. Owners without a
//! quality score keep their global rank.

use peerrank_domain::{ParticipantId, ProposalStanding, VotingConfiguration};
use std::collections::BTreeMap;
use tracing::debug;

/// Apply the incentive delta and produce the adjusted ranking.
///
/// The input standings keep their global ranks; the returned vector is
/// ordered by adjusted rank, ties broken by the original global rank, so the
/// output is stable and deterministic. With `adjustment_magnitude == 0` the
/// adjusted ranking equals the global ranking.
pub fn adjust(
    standings: &[ProposalStanding],
    qualities: &BTreeMap<ParticipantId, f64>,
    config: &VotingConfiguration,
) -> Vec<ProposalStanding> {
    let k = standings.len() as i64;
    let magnitude = i64::from(config.adjustment_magnitude);

    let mut adjusted: Vec<ProposalStanding> = standings.to_vec();

    for standing in &mut adjusted {
        let delta = match qualities.get(&standing.author_id) {
            Some(&q) if q >= config.quality_good_threshold => -magnitude,
            Some(&q) if q <= config.quality_bad_threshold => magnitude,
            _ => 0,
        };

        let target = i64::from(standing.global_rank) + delta;
        standing.adjusted_rank = target.clamp(1, k.max(1)) as u32;
    }

    adjusted.sort_by_key(|s| (s.adjusted_rank, s.global_rank));

    debug!(proposals = adjusted.len(), "incentive adjustment applied");

    adjusted
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerrank_domain::{EventId, ProposalId};
    use uuid::Uuid;

    fn standing(rank: u32, author: ParticipantId) -> ProposalStanding {
        ProposalStanding {
            proposal_id: ProposalId::from_uuid(Uuid::from_u128(u128::from(rank))),
            author_id: author,
            filename: format!("p{rank}.pdf"),
            mbc_score: 1.0 / f64::from(rank),
            global_rank: rank,
            adjusted_rank: rank,
            vote_count: 3,
            first_place_votes: 0,
            average_rank: f64::from(rank),
            insufficient_evaluations: false,
        }
    }

    fn config(n: u32) -> VotingConfiguration {
        let mut c = VotingConfiguration::new(EventId::new(), 3);
        c.quality_good_threshold = 0.8;
        c.quality_bad_threshold = 0.2;
        c.adjustment_magnitude = n;
        c
    }

    #[test]
    fn test_reward_and_penalty() {
        let good = ParticipantId::new();
        let bad = ParticipantId::new();
        let mid = ParticipantId::new();
        let standings = vec![standing(1, mid), standing(2, good), standing(3, bad)];
        let qualities = BTreeMap::from([(good, 1.0), (bad, 0.0), (mid, 0.5)]);

        let adjusted = adjust(&standings, &qualities, &config(1));

        let by_author: BTreeMap<ParticipantId, u32> = adjusted
            .iter()
            .map(|s| (s.author_id, s.adjusted_rank))
            .collect();
        assert_eq!(by_author[&good], 1); // 2 − 1
        assert_eq!(by_author[&bad], 3); // 3 + 1, clamped at k
        assert_eq!(by_author[&mid], 1); // unchanged
    }

    #[test]
    fn test_clamping_to_bounds() {
        let top = ParticipantId::new();
        let bottom = ParticipantId::new();
        let standings = vec![standing(1, top), standing(2, bottom)];
        let qualities = BTreeMap::from([(top, 1.0), (bottom, 0.0)]);

        let adjusted = adjust(&standings, &qualities, &config(5));
        let by_author: BTreeMap<ParticipantId, u32> = adjusted
            .iter()
            .map(|s| (s.author_id, s.adjusted_rank))
            .collect();
        assert_eq!(by_author[&top], 1);
        assert_eq!(by_author[&bottom], 2);
    }

    #[test]
    fn test_zero_magnitude_preserves_global_ranking() {
        let authors: Vec<ParticipantId> = (0..4).map(|_| ParticipantId::new()).collect();
        let standings: Vec<ProposalStanding> = authors
            .iter()
            .enumerate()
            .map(|(i, &a)| standing((i + 1) as u32, a))
            .collect();
        let qualities: BTreeMap<ParticipantId, f64> =
            authors.iter().map(|&a| (a, 1.0)).collect();

        let adjusted = adjust(&standings, &qualities, &config(0));
        for (a, b) in standings.iter().zip(adjusted.iter()) {
            assert_eq!(a.proposal_id, b.proposal_id);
            assert_eq!(a.global_rank, b.adjusted_rank);
        }
    }

    #[test]
    fn test_owner_without_quality_keeps_rank() {
        let scored = ParticipantId::new();
        let unscored = ParticipantId::new();
        let standings = vec![standing(1, unscored), standing(2, scored)];
        let qualities = BTreeMap::from([(scored, 0.0)]);

        let adjusted = adjust(&standings, &qualities, &config(1));
        let by_author: BTreeMap<ParticipantId, u32> = adjusted
            .iter()
            .map(|s| (s.author_id, s.adjusted_rank))
            .collect();
        assert_eq!(by_author[&unscored], 1);
        assert_eq!(by_author[&scored], 2); // 2 + 1 clamped at k = 2
    }

    #[test]
    fn test_ties_resolve_by_global_rank() {
        let p1 = ParticipantId::new();
        let p2 = ParticipantId::new();
        // Penalty pushes rank 1 down onto rank 2's position; the tie at
        // adjusted rank 2 resolves by the original global order.
        let standings = vec![standing(1, p1), standing(2, p2)];
        let qualities = BTreeMap::from([(p1, 0.0), (p2, 0.5)]);

        let adjusted = adjust(&standings, &qualities, &config(1));
        assert_eq!(adjusted[0].author_id, p1);
        assert_eq!(adjusted[0].adjusted_rank, 2);
        assert_eq!(adjusted[1].author_id, p2);
        assert_eq!(adjusted[1].adjusted_rank, 2);
    }

    #[test]
    fn test_global_rank_preserved_in_output() {
        let p = ParticipantId::new();
        let standings = vec![standing(1, p)];
        let qualities = BTreeMap::from([(p, 1.0)]);
        let adjusted = adjust(&standings, &qualities, &config(2));
        assert_eq!(adjusted[0].global_rank, 1);
        assert_eq!(adjusted[0].adjusted_rank, 1);
    }
}
