mod common;
use anyhow::Result;
use common::*;

/// The genesis event is seen from a peer, then two local PDUs are composed and confirmed out of order.
#[tokio::test]
async fn test_end_to_end_confirmation_sequence() -> Result<()> {
    for (engine, graph) in all_engines().await? {
        let tracker = graph.tracker();
        let e0 = remote_pdu("E0", &[]);
        tracker.register_remote(e0.clone()).await?;
        assert_eq!(tracker.current_frontier(&room()).await?, refs(&[&e0]), "{engine}");

        let e1 = tracker.register_outgoing(outgoing("E1")).await?;
        assert_eq!(e1.predecessors, vec![e0.pdu_ref()], "{engine}");
        assert_eq!(tracker.current_frontier(&room()).await?, refs(&[&e0, &e1]), "{engine}");

        let e2 = tracker.register_outgoing(outgoing("E2")).await?;
        assert_eq!(refs(&[&e0, &e1]), e2.predecessors.iter().cloned().collect(), "{engine}");
        assert_eq!(tracker.current_frontier(&room()).await?, refs(&[&e0, &e1, &e2]), "{engine}");

        assert_eq!(tracker.confirm_sent(&e1).await?, 1, "{engine}");
        assert_eq!(tracker.current_frontier(&room()).await?, refs(&[&e1, &e2]), "{engine}");

        // E0 is already gone; only E1 is retired
        assert_eq!(tracker.confirm_sent(&e2).await?, 1, "{engine}");
        assert_eq!(tracker.current_frontier(&room()).await?, refs(&[&e2]), "{engine}");
    }
    Ok(())
}

#[tokio::test]
async fn test_remote_merge_replaces_both_parents() -> Result<()> {
    for (engine, graph) in all_engines().await? {
        let tracker = graph.tracker();
        let root = remote_pdu("root", &[]);
        let a = remote_pdu("A", &[root.pdu_ref()]);
        let b = remote_pdu("B", &[root.pdu_ref()]);
        for pdu in [&root, &a, &b] {
            tracker.register_remote(pdu.clone()).await?;
        }
        assert_eq!(tracker.current_frontier(&room()).await?, refs(&[&a, &b]), "{engine}");

        let merge = remote_pdu("P", &[a.pdu_ref(), b.pdu_ref()]);
        let outcome = tracker.register_remote(merge.clone()).await?;
        assert!(outcome.added_extremity, "{engine}");
        assert_eq!(outcome.retired, 2, "{engine}");
        assert_eq!(tracker.current_frontier(&room()).await?, refs(&[&merge]), "{engine}");
    }
    Ok(())
}

#[tokio::test]
async fn test_outgoing_keeps_frontier_until_confirmed() -> Result<()> {
    for (engine, graph) in all_engines().await? {
        let tracker = graph.tracker();
        let a = remote_pdu("A", &[]);
        let b = remote_pdu("B", &[]);
        tracker.register_remote(a.clone()).await?;
        tracker.register_remote(b.clone()).await?;

        let p = tracker.register_outgoing(outgoing("P")).await?;
        assert_eq!(p.predecessors, vec![a.pdu_ref(), b.pdu_ref()], "{engine}");
        assert_eq!(tracker.current_frontier(&room()).await?, refs(&[&a, &b, &p]), "{engine}");

        tracker.confirm_sent(&p).await?;
        assert_eq!(tracker.current_frontier(&room()).await?, refs(&[&p]), "{engine}");
    }
    Ok(())
}

#[tokio::test]
async fn test_confirm_sent_is_idempotent() -> Result<()> {
    for (engine, graph) in all_engines().await? {
        let tracker = graph.tracker();
        let p1 = tracker.register_outgoing(outgoing("p1")).await?;
        let p2 = tracker.register_outgoing(outgoing("p2")).await?;

        assert_eq!(tracker.confirm_sent(&p2).await?, 1, "{engine}");
        let frontier = tracker.current_frontier(&room()).await?;
        assert_eq!(tracker.confirm_sent(&p2).await?, 0, "{engine}");
        assert_eq!(tracker.current_frontier(&room()).await?, frontier, "{engine}");

        // confirming the genesis PDU has nothing to retire
        assert_eq!(tracker.confirm_sent(&p1).await?, 0, "{engine}");
    }
    Ok(())
}

#[tokio::test]
async fn test_out_of_order_predecessor_stays_superseded() -> Result<()> {
    for (engine, graph) in all_engines().await? {
        let tracker = graph.tracker();
        let a = remote_pdu("A", &[]);
        let p = remote_pdu("P", &[a.pdu_ref()]);

        // P references A before A is known; the dangling reference is accepted
        tracker.register_remote(p.clone()).await?;
        assert_eq!(tracker.current_frontier(&room()).await?, refs(&[&p]), "{engine}");

        let outcome = tracker.register_remote(a.clone()).await?;
        assert!(outcome.inserted, "{engine}");
        assert!(!outcome.added_extremity, "{engine}");
        assert_eq!(tracker.current_frontier(&room()).await?, refs(&[&p]), "{engine}");
        assert_eq!(graph.queries().event(&room(), &a.pdu_ref()).await?, Some(a), "{engine}");
    }
    Ok(())
}

#[tokio::test]
async fn test_duplicate_registration_does_not_readd() -> Result<()> {
    for (engine, graph) in all_engines().await? {
        let tracker = graph.tracker();
        let a = remote_pdu("A", &[]);
        let b = remote_pdu("B", &[a.pdu_ref()]);
        tracker.register_remote(a.clone()).await?;
        tracker.register_remote(b.clone()).await?;

        // A re-delivered A already has a successor and must not come back
        let again = tracker.register_remote(a.clone()).await?;
        assert!(!again.inserted, "{engine}");
        assert!(!again.added_extremity, "{engine}");

        let again = tracker.register_remote(b.clone()).await?;
        assert!(!again.inserted, "{engine}");
        assert_eq!(tracker.current_frontier(&room()).await?, refs(&[&b]), "{engine}");
        assert_eq!(graph.queries().events(&room()).await?.len(), 2, "{engine}");
    }
    Ok(())
}

/// The frontier equals the events nobody builds on, plus unconfirmed local PDUs and their unretired parents.
#[tokio::test]
async fn test_frontier_matches_events_without_successors() -> Result<()> {
    for (engine, graph) in all_engines().await? {
        let tracker = graph.tracker();
        let r1 = remote_pdu("r1", &[]);
        let r2 = remote_pdu("r2", &[r1.pdu_ref()]);
        let r3 = remote_pdu("r3", &[r1.pdu_ref()]);
        for pdu in [&r1, &r3, &r2] {
            tracker.register_remote(pdu.clone()).await?;
        }
        let l1 = tracker.register_outgoing(outgoing("l1")).await?;
        let r4 = remote_pdu("r4", &[r2.pdu_ref()]);
        tracker.register_remote(r4.clone()).await?;

        let storage = graph.storage().context(&room()).await?;
        let mut heads = std::collections::BTreeSet::new();
        for pdu in graph.queries().events(&room()).await? {
            if !storage.has_successor(&pdu.pdu_ref()).await? {
                heads.insert(pdu.pdu_ref());
            }
        }
        // l1 is unconfirmed, so r3 stays alongside it; r2 was retired by the remote r4
        assert_eq!(heads, refs(&[&l1, &r4]), "{engine}");
        assert_eq!(tracker.current_frontier(&room()).await?, refs(&[&l1, &r3, &r4]), "{engine}");

        tracker.confirm_sent(&l1).await?;
        assert_eq!(tracker.current_frontier(&room()).await?, heads, "{engine}");
    }
    Ok(())
}

#[tokio::test]
async fn test_contexts_are_independent() -> Result<()> {
    for (engine, graph) in all_engines().await? {
        let tracker = graph.tracker();
        let other: ContextId = "!other".into();
        let p = tracker.register_outgoing(outgoing("p")).await?;
        let q = tracker.register_outgoing(OutgoingPdu::new(other.clone(), LOCAL, "m.message", vec![]).with_id("q")).await?;

        assert!(q.predecessors.is_empty(), "{engine}");
        assert_eq!(tracker.current_frontier(&room()).await?, refs(&[&p]), "{engine}");
        assert_eq!(tracker.current_frontier(&other).await?, refs(&[&q]), "{engine}");
    }
    Ok(())
}
