//! Integration tests for the tournament lifecycle
//!
//! These tests drive the scheduler, manager, and hub together over the
//! in-memory store, from announcement through registration, play, and
//! completion.

use chrono::{DateTime, Duration, Utc};
use futures_util::sink;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Barrier, mpsc};
use tourney_engine::bracket::{BracketView, Match, MatchStatus, Score, SeedingStrategy};
use tourney_engine::broadcast::{
    BroadcastHub, ClientHandle, InboundFrame, ViewerExit, serve_viewer, snapshot,
};
use tourney_engine::db::MemoryStore;
use tourney_engine::lifecycle::{DEFAULT_LIFECYCLE_LOCK_KEY, LifecycleScheduler};
use tourney_engine::tournament::{
    EngineError, Entrant, Format, FormatSettings, ParticipantId, ParticipantStatus, Tournament,
    TournamentId, TournamentManager, TournamentStatus,
};

const ORGANIZER: i64 = 500;

struct Harness {
    store: Arc<MemoryStore>,
    manager: TournamentManager<MemoryStore>,
    scheduler: LifecycleScheduler<MemoryStore>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let manager = TournamentManager::new(Arc::clone(&store), BroadcastHub::spawn(256));
    let scheduler = LifecycleScheduler::new(
        manager.clone(),
        DEFAULT_LIFECYCLE_LOCK_KEY,
        std::time::Duration::from_secs(10),
    );
    Harness {
        store,
        manager,
        scheduler,
    }
}

fn announced(now: DateTime<Utc>, format: Format, capacity: u32) -> Tournament {
    Tournament {
        id: 0,
        name: "Integration Open".to_string(),
        organizer_id: ORGANIZER,
        status: TournamentStatus::Soon,
        format,
        registration_start: now - Duration::minutes(1),
        registration_end: now + Duration::hours(1),
        start_date: now + Duration::hours(1),
        end_date: now + Duration::days(1),
        capacity,
        champion_id: None,
    }
}

async fn register_confirmed(store: &MemoryStore, id: TournamentId, count: i64) -> Vec<ParticipantId> {
    let mut ids = Vec::new();
    for user in 1..=count {
        ids.push(
            store
                .register(id, Entrant::User(user), ParticipantStatus::Participant)
                .await,
        );
    }
    ids
}

fn score_for(m: &Match, winner: ParticipantId, winning: u32, losing: u32) -> Score {
    if m.participant_a == Some(winner) {
        Score::new(winning, losing)
    } else {
        Score::new(losing, winning)
    }
}

#[tokio::test]
async fn test_five_player_single_elimination_end_to_end() {
    let h = harness();
    let t0 = Utc::now();
    let id = h
        .store
        .create_tournament(announced(t0, Format::single_elimination(1), 8))
        .await;

    // registration opens on the first sweep
    let report = h.scheduler.tick(t0).await.unwrap().into_inner().unwrap();
    assert_eq!(report.opened, vec![id]);

    let entrants = register_confirmed(&h.store, id, 5).await;
    h.store
        .register(id, Entrant::User(99), ParticipantStatus::Withdrawn)
        .await;

    // still open, nothing to do
    let report = h.scheduler.tick(t0).await.unwrap().into_inner().unwrap();
    assert!(report.is_empty());

    // registration deadline passes
    let later = t0 + Duration::hours(2);
    let report = h.scheduler.tick(later).await.unwrap().into_inner().unwrap();
    assert_eq!(report.activated, vec![id]);

    let matches = h.store.matches(id).await;
    assert_eq!(matches.len(), 7);
    assert_eq!(matches.iter().map(|m| m.round).max(), Some(3));
    let byes = matches.iter().filter(|m| m.is_bye()).count();
    assert_eq!(byes, 3);
    let placed: HashSet<_> = matches
        .iter()
        .filter(|m| m.round == 1)
        .flat_map(|m| [m.participant_a, m.participant_b])
        .flatten()
        .collect();
    assert_eq!(placed, entrants.iter().copied().collect());

    // a viewer joins and watches the whole bracket play out
    let (viewer, mut snapshots) = ClientHandle::new(16);
    h.manager.hub().subscribe(id, viewer).await.unwrap();

    let mut real_matches = 0;
    let mut completions = Vec::new();
    loop {
        let ready = h
            .store
            .matches(id)
            .await
            .into_iter()
            .find(|m| m.status == MatchStatus::Ready);
        let Some(m) = ready else { break };

        let winner = m.participant_a.unwrap();
        let outcome = h
            .manager
            .apply_result(m.id, Some(winner), score_for(&m, winner, 3, 1), ORGANIZER)
            .await
            .unwrap();
        real_matches += 1;
        completions.extend(outcome.champion);
    }

    assert_eq!(real_matches, 4);
    assert_eq!(completions, vec![entrants[0]]);

    let stored = h.store.tournament(id).await.unwrap();
    assert_eq!(stored.status, TournamentStatus::Completed);
    assert_eq!(stored.champion_id, Some(entrants[0]));

    let mut last = None;
    for _ in 0..real_matches {
        last = snapshots.recv().await;
    }
    let view: BracketView = serde_json::from_str(last.unwrap().payload()).unwrap();
    assert_eq!(view.status, TournamentStatus::Completed);
    assert_eq!(view.champion_id, Some(entrants[0]));
    assert_eq!(view.rounds.len(), 3);

    // the sweep leaves a finished tournament alone
    let report = h
        .scheduler
        .tick(t0 + Duration::days(3))
        .await
        .unwrap()
        .into_inner()
        .unwrap();
    assert!(report.is_empty());
}

#[tokio::test]
async fn test_round_robin_head_to_head_decides_two_way_tie() {
    let h = harness();
    let t0 = Utc::now();
    let id = h
        .store
        .create_tournament(Tournament {
            status: TournamentStatus::Registration,
            ..announced(t0, Format::round_robin(1, FormatSettings::default()), 8)
        })
        .await;
    let p = register_confirmed(&h.store, id, 4).await;

    let view = h
        .manager
        .start_tournament(id, ORGANIZER, SeedingStrategy::default())
        .await
        .unwrap();
    assert_eq!(view.rounds.len(), 3);
    assert_eq!(h.store.matches(id).await.len(), 6);

    // p0 and p1 finish level on 6 points; p1 has the better difference but lost to p0
    let results = [
        (p[0], p[1], 1, 0),
        (p[2], p[0], 1, 0),
        (p[0], p[3], 1, 0),
        (p[1], p[2], 5, 0),
        (p[1], p[3], 5, 0),
        (p[3], p[2], 1, 0),
    ];

    let mut champion = None;
    for (winner, loser, winning, losing) in results {
        let m = h
            .store
            .matches(id)
            .await
            .into_iter()
            .find(|m| m.has_participant(winner) && m.has_participant(loser))
            .unwrap();
        let outcome = h
            .manager
            .apply_result(m.id, Some(winner), score_for(&m, winner, winning, losing), ORGANIZER)
            .await
            .unwrap();
        if outcome.tournament_complete() {
            assert!(champion.is_none(), "completion signalled twice");
            champion = outcome.champion;
        }
    }

    let standings = h.manager.compute_standings(id).await.unwrap();
    let order: Vec<_> = standings.iter().map(|row| row.participant_id).collect();
    assert_eq!(order, vec![p[0], p[1], p[3], p[2]]);
    assert_eq!(standings[0].points, 6);
    assert_eq!(standings[1].points, 6);
    assert!(standings[1].score_diff > standings[0].score_diff);

    assert_eq!(champion, Some(p[0]));
    assert_eq!(
        h.store.tournament(id).await.unwrap().champion_id,
        Some(p[0])
    );
}

#[tokio::test]
async fn test_round_robin_draw_counts_for_both() {
    let h = harness();
    let t0 = Utc::now();
    let id = h
        .store
        .create_tournament(Tournament {
            status: TournamentStatus::Registration,
            ..announced(t0, Format::round_robin(1, FormatSettings::default()), 8)
        })
        .await;
    let p = register_confirmed(&h.store, id, 2).await;
    h.manager
        .start_tournament(id, ORGANIZER, SeedingStrategy::default())
        .await
        .unwrap();

    let fixture = h.store.matches(id).await.remove(0);
    let outcome = h
        .manager
        .apply_result(fixture.id, None, Score::new(2, 2), ORGANIZER)
        .await
        .unwrap();

    // the only fixture is done; a level table goes to the lower id
    assert_eq!(outcome.champion, Some(p[0]));
    let standings = h.manager.compute_standings(id).await.unwrap();
    assert!(standings.iter().all(|row| row.draws == 1 && row.points == 1));
}

#[tokio::test]
async fn test_timed_out_tournament_completes_without_champion() {
    let h = harness();
    let t0 = Utc::now();
    let id = h
        .store
        .create_tournament(Tournament {
            status: TournamentStatus::Registration,
            ..announced(t0, Format::single_elimination(1), 8)
        })
        .await;
    register_confirmed(&h.store, id, 4).await;
    h.manager
        .start_tournament(id, ORGANIZER, SeedingStrategy::default())
        .await
        .unwrap();

    let report = h
        .scheduler
        .tick(t0 + Duration::days(2))
        .await
        .unwrap()
        .into_inner()
        .unwrap();
    assert_eq!(report.expired, vec![id]);

    let stored = h.store.tournament(id).await.unwrap();
    assert_eq!(stored.status, TournamentStatus::Completed);
    assert_eq!(stored.champion_id, None);

    // late results are rejected once the tournament is closed
    let ready = h
        .store
        .matches(id)
        .await
        .into_iter()
        .find(|m| m.status == MatchStatus::Ready)
        .unwrap();
    let err = h
        .manager
        .apply_result(ready.id, ready.participant_a, Score::new(1, 0), ORGANIZER)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn test_concurrent_replicas_advance_each_tournament_once() {
    let store = Arc::new(MemoryStore::new());
    let t0 = Utc::now();
    let mut expected = HashSet::new();
    for _ in 0..10 {
        expected.insert(
            store
                .create_tournament(announced(t0, Format::single_elimination(1), 8))
                .await,
        );
    }

    let replicas = 4;
    let barrier = Arc::new(Barrier::new(replicas));
    let mut handles = Vec::new();
    for _ in 0..replicas {
        let manager = TournamentManager::new(Arc::clone(&store), BroadcastHub::spawn(64));
        let scheduler = LifecycleScheduler::new(
            manager,
            DEFAULT_LIFECYCLE_LOCK_KEY,
            std::time::Duration::from_secs(10),
        );
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            scheduler.tick(t0).await.unwrap()
        }));
    }

    let mut opened = Vec::new();
    for handle in handles {
        if let Some(report) = handle.await.unwrap().into_inner() {
            opened.extend(report.opened);
        }
    }

    let unique: HashSet<_> = opened.iter().copied().collect();
    assert_eq!(opened.len(), unique.len(), "a tournament was opened twice");
    assert_eq!(unique, expected);
    for id in expected {
        assert_eq!(
            store.tournament(id).await.unwrap().status,
            TournamentStatus::Registration
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_results_leave_viewers_on_committed_state() {
    let h = harness();
    let t0 = Utc::now();
    let id = h
        .store
        .create_tournament(Tournament {
            status: TournamentStatus::Registration,
            ..announced(t0, Format::round_robin(1, FormatSettings::default()), 16)
        })
        .await;
    register_confirmed(&h.store, id, 10).await;
    h.manager
        .start_tournament(id, ORGANIZER, SeedingStrategy::default())
        .await
        .unwrap();

    let (viewer, mut snapshots) = ClientHandle::new(64);
    h.manager.hub().subscribe(id, viewer).await.unwrap();

    let fixtures = h.store.matches(id).await;
    assert_eq!(fixtures.len(), 45);

    let mut handles = Vec::new();
    for m in fixtures {
        let manager = h.manager.clone();
        handles.push(tokio::spawn(async move {
            manager
                .apply_result(m.id, m.participant_a, Score::new(1, 0), ORGANIZER)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // the hub inbox is FIFO, so this returns after every publish was handled
    assert_eq!(h.manager.hub().room_size(id).await, Some(1));

    let mut delivered = Vec::new();
    while let Ok(snapshot) = snapshots.try_recv() {
        delivered.push(snapshot);
    }
    assert!(
        delivered
            .windows(2)
            .all(|pair| pair[0].revision() < pair[1].revision()),
        "viewer saw an older state after a newer one"
    );

    let last: BracketView = serde_json::from_str(delivered.last().unwrap().payload()).unwrap();
    let committed = h.manager.bracket_view(id).await.unwrap();
    assert_eq!(last.status, TournamentStatus::Completed);
    assert_eq!(last, committed);
}

#[tokio::test]
async fn test_viewer_joining_during_a_result_ends_on_that_result() {
    let h = harness();
    let t0 = Utc::now();
    let id = h
        .store
        .create_tournament(Tournament {
            status: TournamentStatus::Registration,
            ..announced(t0, Format::single_elimination(1), 4)
        })
        .await;
    register_confirmed(&h.store, id, 2).await;
    h.manager
        .start_tournament(id, ORGANIZER, SeedingStrategy::default())
        .await
        .unwrap();

    // the viewer's snapshot is read, then the final is decided before it is sent
    let final_match = h.store.matches(id).await.remove(0);
    let champion = final_match.participant_a;
    let manager = h.manager.clone();
    let initial = async move {
        let read = snapshot(&manager.bracket_view(id).await.unwrap()).unwrap();
        manager
            .apply_result(final_match.id, champion, Score::new(1, 0), ORGANIZER)
            .await
            .unwrap();
        Some(read)
    };

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let writer = sink::unfold(out_tx, |out_tx, text: String| async move {
        out_tx.send(text)?;
        Ok::<_, mpsc::error::SendError<String>>(out_tx)
    });
    let (close_tx, close_rx) = tokio::sync::oneshot::channel::<()>();
    let reader = futures_util::stream::once(async move {
        let _ = close_rx.await;
        InboundFrame::Close
    });

    let hub = h.manager.hub().clone();
    let session =
        tokio::spawn(async move { serve_viewer(&hub, id, 8, initial, writer, reader).await });

    let mut views = Vec::new();
    for _ in 0..2 {
        let text = tokio::time::timeout(std::time::Duration::from_secs(5), out_rx.recv())
            .await
            .expect("no snapshot within 5s")
            .unwrap();
        views.push(serde_json::from_str::<BracketView>(&text).unwrap());
    }
    assert_eq!(views[0].status, TournamentStatus::Active);
    assert_eq!(views[1].status, TournamentStatus::Completed);
    assert_eq!(views[1].champion_id, champion);

    close_tx.send(()).unwrap();
    assert_eq!(session.await.unwrap(), ViewerExit::ClientClosed);
}
