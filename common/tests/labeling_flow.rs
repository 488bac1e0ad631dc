//! Full draw, label, upload and aggregate cycles against the in-memory store.

use chrono::Utc;
use labeler_common::batch::BatchSelector;
use labeler_common::consensus;
use labeler_common::error::StoreError;
use labeler_common::session::{Command, Outcome, Session};
use labeler_common::store::{LabelStore, MemoryStore};
use labeler_common::{Label, LabelEntry, Record};
use std::collections::HashSet;

fn create_store(num_records: usize, num_overlap: usize, seed: u64) -> MemoryStore {
    let records = (1..=num_records)
        .map(|i| Record::new(format!("r{i}"), format!("comment {i}"), i <= num_overlap))
        .collect();
    MemoryStore::with_seed(records, seed)
}

fn batch_ids(session: &Session) -> HashSet<String> {
    session.batch().iter().map(|r| r.id.clone()).collect()
}

fn ids(ids: &[&str]) -> HashSet<String> {
    ids.iter().map(|id| (*id).to_string()).collect()
}

/// Walk to the record with `id` and label it.
fn label_record(session: &mut Session, id: &str, label: Label) {
    let target = session
        .batch()
        .iter()
        .position(|r| r.id == id)
        .unwrap_or_else(|| panic!("{id} is not in the batch"));
    while session.position() > target {
        session.apply(Command::Previous).unwrap();
    }
    while session.position() < target {
        session.apply(Command::Next).unwrap();
    }
    assert_eq!(session.apply(Command::Label(label)), Ok(Outcome::Continue));
}

fn entry(record_id: &str, contributor: &str, label: Label) -> LabelEntry {
    LabelEntry {
        record_id: record_id.to_string(),
        contributor: contributor.to_string(),
        label,
        timestamp: Utc::now(),
    }
}

#[test_log::test]
fn test_two_contributors_share_the_overlap_pool() {
    let mut store = create_store(3, 3, 11);

    let mut alice = Session::start(&mut store, BatchSelector::new(10), "alice").unwrap();
    assert_eq!(batch_ids(&alice), ids(&["r1", "r2", "r3"]));

    label_record(&mut alice, "r1", Label::Positive);
    label_record(&mut alice, "r2", Label::Negative);
    let report = alice.upload(&mut store).unwrap();
    assert_eq!(report.uploaded, 2);
    assert_eq!(report.records_with_consensus, 2);

    let r1 = store.record("r1").unwrap();
    assert_eq!((r1.manual_label, r1.num_manual_labels), (Some(1.0), 1));
    let r2 = store.record("r2").unwrap();
    assert_eq!((r2.manual_label, r2.num_manual_labels), (Some(0.0), 1));
    let r3 = store.record("r3").unwrap();
    assert_eq!((r3.manual_label, r3.num_manual_labels), (None, 0));

    // alice only gets back the record she skipped
    assert_eq!(batch_ids(&alice), ids(&["r3"]));
    assert_eq!(alice.newly_labeled(), 0);
    assert_eq!(alice.position(), 0);

    let mut bob = Session::start(&mut store, BatchSelector::new(10), "bob").unwrap();
    assert_eq!(batch_ids(&bob), ids(&["r1", "r2", "r3"]));

    label_record(&mut bob, "r1", Label::Neutral);
    bob.upload(&mut store).unwrap();

    let r1 = store.record("r1").unwrap();
    assert_eq!(r1.num_manual_labels, 2);
    assert!((r1.manual_label.unwrap() - 0.75).abs() < 1e-12);
    assert!(!batch_ids(&bob).contains("r1"));
}

#[test_log::test]
fn test_relabeling_replaces_the_previous_label() {
    let mut store = create_store(2, 2, 4);
    let mut alice = Session::start(&mut store, BatchSelector::new(10), "alice").unwrap();

    label_record(&mut alice, "r1", Label::Negative);
    label_record(&mut alice, "r1", Label::Positive);
    assert_eq!(alice.newly_labeled(), 1);
    alice.upload(&mut store).unwrap();

    store
        .upsert_labels(&[entry("r1", "alice", Label::Neutral)])
        .unwrap();
    consensus::recompute(&mut store).unwrap();

    assert_eq!(store.labels().len(), 1);
    let r1 = store.record("r1").unwrap();
    assert_eq!((r1.manual_label, r1.num_manual_labels), (Some(0.5), 1));
}

#[test_log::test]
fn test_aggregation_is_mean_of_all_rows() {
    let mut store = create_store(4, 0, 1);
    store
        .upsert_labels(&[
            entry("r1", "alice", Label::Positive),
            entry("r1", "bob", Label::Negative),
            entry("r1", "carol", Label::Neutral),
            entry("r2", "alice", Label::Neutral),
            entry("r4", "bob", Label::Positive),
            entry("r4", "carol", Label::Positive),
        ])
        .unwrap();

    assert_eq!(consensus::recompute(&mut store).unwrap(), 3);

    let expected = [
        ("r1", Some(0.5), 3),
        ("r2", Some(0.5), 1),
        ("r3", None, 0),
        ("r4", Some(1.0), 2),
    ];
    for (id, manual_label, num_manual_labels) in expected {
        let record = store.record(id).unwrap();
        assert_eq!(record.manual_label, manual_label, "{id}");
        assert_eq!(record.num_manual_labels, num_manual_labels, "{id}");
    }
}

#[test_log::test]
fn test_aggregation_is_idempotent() {
    let mut store = create_store(5, 2, 9);
    store
        .upsert_labels(&[
            entry("r1", "alice", Label::Positive),
            entry("r3", "bob", Label::Negative),
        ])
        .unwrap();

    consensus::recompute(&mut store).unwrap();
    let first = store.records().to_vec();
    consensus::recompute(&mut store).unwrap();
    assert_eq!(store.records(), first.as_slice());
}

#[test_log::test]
fn test_overlap_records_are_offered_once_per_contributor() {
    for seed in 0..20 {
        let mut store = create_store(12, 4, seed);
        let mut session = Session::start(&mut store, BatchSelector::new(3), "alice").unwrap();
        let mut seen_overlap: HashSet<String> = HashSet::new();

        while !session.batch().is_empty() {
            for record in session.batch().iter() {
                if record.in_overlap {
                    assert!(
                        seen_overlap.insert(record.id.clone()),
                        "seed {seed}: {} offered twice",
                        record.id
                    );
                }
            }
            // overlap records come first in every batch
            let flags: Vec<bool> = session.batch().iter().map(|r| r.in_overlap).collect();
            assert!(flags.windows(2).all(|w| w[0] >= w[1]), "seed {seed}");

            for _ in 0..session.batch().len() {
                session.apply(Command::Label(Label::Positive)).unwrap();
            }
            session.upload(&mut store).unwrap();
        }

        assert_eq!(seen_overlap.len(), 4, "seed {seed}");
        assert_eq!(store.status().unwrap().num_labeled, 12);
    }
}

#[test_log::test]
fn test_batches_never_exceed_batch_size() {
    let mut store = create_store(25, 10, 2);
    for batch_size in [0, 1, 7, 25, 40] {
        let session = Session::start(&mut store, BatchSelector::new(batch_size), "dave").unwrap();
        assert!(session.batch().len() <= batch_size);
        assert_eq!(session.batch().len(), batch_size.min(25));
    }
}

#[test_log::test]
fn test_navigation_stays_in_the_batch() {
    let mut store = create_store(4, 0, 8);
    let mut session = Session::start(&mut store, BatchSelector::new(10), "erin").unwrap();

    for _ in 0..3 {
        session.apply(Command::Previous).unwrap();
        assert_eq!(session.position(), 0);
    }
    for _ in 0..10 {
        session.apply(Command::Next).unwrap();
    }
    assert_eq!(session.position(), 3);
    session.apply(Command::Label(Label::Neutral)).unwrap();
    assert_eq!(session.position(), 3);
}

#[test_log::test]
fn test_failed_upload_keeps_local_labels() {
    let mut store = create_store(3, 3, 6);
    let mut session = Session::start(&mut store, BatchSelector::new(10), "frank").unwrap();
    label_record(&mut session, "r2", Label::Negative);

    store.set_offline(true);
    let err = session.upload(&mut store).unwrap_err();
    assert!(matches!(err, StoreError::Connection(_)));
    assert_eq!(session.pending_entries().len(), 1);
    assert!(store.labels().is_empty());

    store.set_offline(false);
    let report = session.upload(&mut store).unwrap();
    assert_eq!(report.uploaded, 1);
    assert_eq!(store.labels().len(), 1);
}

#[test_log::test]
fn test_quit_discards_nothing_in_the_store() {
    let mut store = create_store(3, 0, 5);
    let mut session = Session::start(&mut store, BatchSelector::new(10), "gina").unwrap();
    session.apply(Command::Label(Label::Positive)).unwrap();

    assert_eq!(session.apply(Command::Quit), Ok(Outcome::QuitRequested));
    drop(session);
    assert!(store.labels().is_empty());
    assert_eq!(store.status().unwrap().num_labeled, 0);
}
