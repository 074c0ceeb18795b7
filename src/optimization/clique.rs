use std::{cmp::Reverse, collections::HashMap};

use rand::{seq::SliceRandom, Rng};

use super::SearchState;
use crate::{
    config::SolverConfig,
    model::{preference::Affinity, session::SessionIndex, Model},
};

// ranking weights, preference dominates professor load
const PREFERRED_BONUS: i64 = 1_000;
const AVOIDED_PENALTY: i64 = -1_000_000;
const PROFESSOR_SESSION_WEIGHT: i64 = 10;

/// higher goes first: preferred slots, then professors that teach a lot
pub fn rank(model: &Model, session: SessionIndex, full_label: &str) -> i64 {
    let professor = &model.session(session).professor;

    let affinity = match model.preferences.affinity(professor, full_label) {
        Affinity::Preferred => PREFERRED_BONUS,
        Affinity::Avoided => AVOIDED_PENALTY,
        Affinity::Neutral => 0,
    };

    affinity + PROFESSOR_SESSION_WEIGHT * model.professor_session_count(professor) as i64
}

/// picks a set of pairwise compatible sessions for one slot
///
/// `eligible` must only hold sessions of the slot's category and duration.
/// candidates are shuffled, then stable-sorted by `rank`, so ties are broken randomly.
/// a candidate is skipped if
/// - its professor would exceed the daily hour cap (including the clique itself)
/// - it conflicts with a clique member or shares its subject
/// - it conflicts with a session already placed in an overlapping slot
/// - its subject was already placed on the same day
pub fn select_clique<R: Rng + ?Sized>(
    model: &Model,
    config: &SolverConfig,
    state: &SearchState,
    slot_index: usize,
    eligible: &[SessionIndex],
    rng: &mut R,
) -> Vec<SessionIndex> {
    let slots = model.timeline.slots();
    let slot = &slots[slot_index];
    let full_label = slot.full_label();

    for &candidate in eligible {
        assert!(
            slot.fits(model.session(candidate)),
            "session {} does not fit slot {}",
            model.session(candidate).id,
            full_label
        );
    }

    let mut candidates = eligible.to_vec();
    candidates.shuffle(rng);
    candidates.sort_by_cached_key(|&candidate| Reverse(rank(model, candidate, &full_label)));

    let placed_today = state.placed_on_day(slot.day_index);
    let overlapping: Vec<SessionIndex> = placed_today
        .iter()
        .filter(|(_, other_slot)| slots[*other_slot].overlaps(slot))
        .map(|(placed, _)| *placed)
        .collect();

    let mut clique: Vec<SessionIndex> = Vec::new();
    let mut clique_load: HashMap<&str, u32> = HashMap::new();

    for candidate in candidates {
        let session = model.session(candidate);
        let professor = session.professor.as_str();

        let load = state.professor_load(professor, slot.day_index)
            + clique_load.get(professor).copied().unwrap_or(0);
        if load + session.duration > config.daily_hour_cap {
            continue;
        }

        if clique.iter().any(|&member| {
            !model.conflicts.compatible(candidate, member)
                || model.conflicts.same_subject(candidate, member)
        }) {
            continue;
        }

        if overlapping
            .iter()
            .any(|&placed| !model.conflicts.compatible(candidate, placed))
        {
            continue;
        }

        if placed_today
            .iter()
            .any(|&(placed, _)| model.conflicts.same_subject(candidate, placed))
        {
            continue;
        }

        clique.push(candidate);
        *clique_load.entry(professor).or_insert(0) += session.duration;
    }

    clique
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::{
        model::{
            fixtures::{elective, mandatory},
            preference::{PreferenceMap, ProfessorPreferences},
        },
        optimization::tests::{build_model, slot_index},
    };

    fn all(model: &Model) -> Vec<SessionIndex> {
        model.session_indices().collect()
    }

    #[test]
    fn electives_on_parallel_tracks_share_a_slot() {
        let config = SolverConfig::default();
        let model = build_model(
            vec![
                elective("a", "CCO", 6, "ML", "P1"),
                elective("b", "CCO", 6, "NLP", "P2"),
            ],
            &config,
        );
        let state = SearchState::new(&model);

        for seed in 0..10 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut clique = select_clique(&model, &config, &state, 0, &all(&model), &mut rng);
            clique.sort();
            assert_eq!(clique, vec![SessionIndex(0), SessionIndex(1)]);
        }
    }

    #[test]
    fn conflicting_sessions_never_share_a_clique() {
        let config = SolverConfig::default();
        let model = build_model(
            vec![
                mandatory("a", "CCO", 1, "CALC", "P1", 2),
                mandatory("b", "CCO", 1, "ALGO", "P1", 2),
            ],
            &config,
        );
        let state = SearchState::new(&model);

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let clique = select_clique(&model, &config, &state, 0, &all(&model), &mut rng);
        assert_eq!(clique.len(), 1);
    }

    #[test]
    fn three_hour_block_respects_placed_two_hour_block() {
        let config = SolverConfig::default();
        let model = build_model(
            vec![
                mandatory("short", "SIN", 2, "OS", "P1", 2),
                mandatory("long", "SIN", 4, "NETS", "P1", 3),
            ],
            &config,
        );
        let mut state = SearchState::new(&model);
        state.commit(&[SessionIndex(0)], slot_index(&model, "SEG_N3_N4"));

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let monday = slot_index(&model, "SEG_N3_N4_N5");
        let clique = select_clique(&model, &config, &state, monday, &[SessionIndex(1)], &mut rng);
        assert!(clique.is_empty());

        // another day is fine
        let tuesday = slot_index(&model, "TER_N3_N4_N5");
        let clique = select_clique(&model, &config, &state, tuesday, &[SessionIndex(1)], &mut rng);
        assert_eq!(clique, vec![SessionIndex(1)]);
    }

    #[test]
    fn daily_hour_cap_limits_a_professor() {
        let mut config = SolverConfig::default();
        config.daily_hour_cap = 3;
        let model = build_model(
            vec![
                mandatory("a", "CCO", 1, "CALC", "P1", 2),
                mandatory("b", "CCO", 3, "ALGO", "P1", 2),
            ],
            &config,
        );
        let mut state = SearchState::new(&model);
        state.commit(&[SessionIndex(0)], slot_index(&model, "SEG_M3_M4"));

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let monday = slot_index(&model, "SEG_M1_M2");
        assert!(select_clique(&model, &config, &state, monday, &[SessionIndex(1)], &mut rng).is_empty());

        let tuesday = slot_index(&model, "TER_M1_M2");
        assert_eq!(
            select_clique(&model, &config, &state, tuesday, &[SessionIndex(1)], &mut rng),
            vec![SessionIndex(1)]
        );
    }

    #[test]
    fn same_subject_is_kept_apart_within_a_day() {
        let config = SolverConfig::default();
        let model = build_model(
            vec![
                mandatory("a", "CCO", 1, "CALC", "P1", 2),
                mandatory("b", "CCO", 3, "CALC", "P2", 2),
            ],
            &config,
        );
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        // not within one clique
        let state = SearchState::new(&model);
        assert_eq!(
            select_clique(&model, &config, &state, 0, &all(&model), &mut rng).len(),
            1
        );

        // not later the same day either
        let mut state = SearchState::new(&model);
        state.commit(&[SessionIndex(0)], slot_index(&model, "SEG_M3_M4"));
        let afternoon = slot_index(&model, "SEG_T1_T2");
        assert!(select_clique(&model, &config, &state, afternoon, &[SessionIndex(1)], &mut rng).is_empty());
    }

    #[test]
    fn avoided_slot_loses_against_neutral_one() {
        let config = SolverConfig::default();
        let sessions = vec![
            mandatory("a", "CCO", 1, "CALC", "P1", 2),
            mandatory("b", "CCO", 1, "ALGO", "P2", 2),
        ];
        let mut preferences = PreferenceMap::default();
        preferences.insert(
            "P1",
            ProfessorPreferences::new(Vec::new(), vec!["SEG_M3_M4".to_string()]),
        );
        let model = Model::new(sessions, preferences, &config).unwrap();
        let state = SearchState::new(&model);

        for seed in 0..10 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let clique = select_clique(&model, &config, &state, 0, &all(&model), &mut rng);
            assert_eq!(clique, vec![SessionIndex(1)]);
        }
    }

    #[test]
    fn busier_professor_is_ranked_first() {
        let config = SolverConfig::default();
        let model = build_model(
            vec![
                mandatory("a", "CCO", 1, "CALC", "P1", 2),
                mandatory("b", "CCO", 1, "ALGO", "P2", 2),
                mandatory("c", "CCO", 3, "DB", "P2", 2),
            ],
            &config,
        );

        assert!(rank(&model, SessionIndex(1), "SEG_M3_M4") > rank(&model, SessionIndex(0), "SEG_M3_M4"));
    }

    #[test]
    #[should_panic]
    fn mismatching_duration_is_a_caller_bug() {
        let config = SolverConfig::default();
        let model = build_model(vec![mandatory("a", "CCO", 1, "CALC", "P1", 3)], &config);
        let state = SearchState::new(&model);

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        select_clique(&model, &config, &state, 0, &all(&model), &mut rng);
    }
}
