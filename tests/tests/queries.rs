mod common;
use anyhow::Result;
use common::*;

#[tokio::test]
async fn test_events_after_checkpoint_in_send_order() -> Result<()> {
    for (engine, graph) in all_engines().await? {
        let tracker = graph.tracker();
        let log = graph.deliveries();
        let mut sent = Vec::new();
        for id in ["p1", "p2", "p3", "p4"] {
            let pdu = tracker.register_outgoing(outgoing(id)).await?;
            tracker.confirm_sent(&pdu).await?;
            sent.push(pdu);
        }

        log.record(&Delivery::new(LOCAL, "c1", REMOTE).with_pdus([sent[0].key()])).await?;
        log.record(&Delivery::new(LOCAL, "c2", "c.example").with_pdus([sent[1].key()])).await?;
        log.record(&Delivery::new(LOCAL, "c3", REMOTE).with_pdus([sent[3].key(), sent[2].key()])).await?;

        let after = graph.queries().events_after_checkpoint(&LOCAL.into(), &"c1".into(), &REMOTE.into()).await?;
        assert_eq!(ids(&after), vec!["p4", "p3"], "{engine}");

        // asking twice gives the same answer
        let again = graph.queries().events_after_checkpoint(&LOCAL.into(), &"c1".into(), &REMOTE.into()).await?;
        assert_eq!(after, again, "{engine}");
    }
    Ok(())
}

#[tokio::test]
async fn test_events_after_checkpoint_empty() -> Result<()> {
    for (engine, graph) in all_engines().await? {
        let pdu = graph.tracker().register_outgoing(outgoing("p1")).await?;
        graph.deliveries().record(&Delivery::new(LOCAL, "c1", REMOTE).with_pdus([pdu.key()])).await?;

        // nothing was sent after the latest checkpoint
        let after = graph.queries().events_after_checkpoint(&LOCAL.into(), &"c1".into(), &REMOTE.into()).await?;
        assert!(after.is_empty(), "{engine}");

        // an unknown checkpoint has no position to resume from
        let unknown = graph.queries().events_after_checkpoint(&LOCAL.into(), &"nope".into(), &REMOTE.into()).await?;
        assert!(unknown.is_empty(), "{engine}");
    }
    Ok(())
}

#[tokio::test]
async fn test_events_after_checkpoint_dedups_resent_pdus() -> Result<()> {
    for (engine, graph) in all_engines().await? {
        let tracker = graph.tracker();
        let p1 = tracker.register_outgoing(outgoing("p1")).await?;
        let p2 = tracker.register_outgoing(outgoing("p2")).await?;
        let log = graph.deliveries();

        log.record(&Delivery::new(LOCAL, "c0", REMOTE)).await?;
        log.record(&Delivery::new(LOCAL, "c1", REMOTE).with_pdus([p1.key(), p2.key()])).await?;
        // the retry carried p2 again
        log.record(&Delivery::new(LOCAL, "c2", REMOTE).with_pdus([p2.key()])).await?;

        let after = graph.queries().events_after_checkpoint(&LOCAL.into(), &"c0".into(), &REMOTE.into()).await?;
        assert_eq!(after, vec![p1, p2], "{engine}");
    }
    Ok(())
}

#[tokio::test]
async fn test_events_after_checkpoint_skips_unstored() -> Result<()> {
    for (engine, graph) in all_engines().await? {
        let p1 = graph.tracker().register_outgoing(outgoing("p1")).await?;
        let ghost = PduKey::new(room(), PduRef::new("ghost", LOCAL));
        graph.deliveries().record(&Delivery::new(LOCAL, "c0", REMOTE)).await?;
        graph.deliveries().record(&Delivery::new(LOCAL, "c1", REMOTE).with_pdus([ghost, p1.key()])).await?;

        let after = graph.queries().events_after_checkpoint(&LOCAL.into(), &"c0".into(), &REMOTE.into()).await?;
        assert_eq!(after, vec![p1], "{engine}");
    }
    Ok(())
}

#[tokio::test]
async fn test_events_after_checkpoint_is_scoped_to_origin() -> Result<()> {
    for (engine, graph) in all_engines().await? {
        let tracker = graph.tracker();
        let x1 = tracker.register_outgoing(OutgoingPdu::new(room(), "x.example", "m.message", vec![]).with_id("x1")).await?;
        let y1 = tracker.register_outgoing(OutgoingPdu::new(room(), "y.example", "m.message", vec![]).with_id("y1")).await?;
        let log = graph.deliveries();

        log.record(&Delivery::new("x.example", "c0", "d.example")).await?;
        // another origin sends to the same destination after x's checkpoint
        log.record(&Delivery::new("y.example", "t9", "d.example").with_pdus([y1.key()])).await?;

        let after = graph.queries().events_after_checkpoint(&"x.example".into(), &"c0".into(), &"d.example".into()).await?;
        assert!(after.is_empty(), "{engine}: {after:?}");

        log.record(&Delivery::new("x.example", "c1", "d.example").with_pdus([x1.key()])).await?;
        let after = graph.queries().events_after_checkpoint(&"x.example".into(), &"c0".into(), &"d.example".into()).await?;
        assert_eq!(after, vec![x1], "{engine}");
    }
    Ok(())
}

#[tokio::test]
async fn test_events_after_checkpoint_rejects_empty_arguments() -> Result<()> {
    for (engine, graph) in all_engines().await? {
        let queries = graph.queries();
        let err = queries.events_after_checkpoint(&"".into(), &"c1".into(), &REMOTE.into()).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Validation(ValidationError::MissingOrigin)), "{engine}");
        let err = queries.events_after_checkpoint(&LOCAL.into(), &"".into(), &REMOTE.into()).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Validation(ValidationError::EmptyCheckpoint)), "{engine}");
        let err = queries.events_after_checkpoint(&LOCAL.into(), &"c1".into(), &"".into()).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Validation(ValidationError::EmptyDestination)), "{engine}");
    }
    Ok(())
}

#[tokio::test]
async fn test_state_events_only_and_exactly_once() -> Result<()> {
    for (engine, graph) in all_engines().await? {
        let tracker = graph.tracker();
        let create = remote_state("create", &[]);
        let msg = remote_pdu("msg", &[create.pdu_ref()]);
        let join = remote_state("join", &[msg.pdu_ref()]);
        for pdu in [&create, &msg, &join] {
            tracker.register_remote(pdu.clone()).await?;
        }
        // a duplicate delivery and a local state PDU
        tracker.register_remote(join.clone()).await?;
        let topic = tracker.register_outgoing(outgoing("topic").state()).await?;

        let mut state = ids(&graph.queries().state_events_for_context(&room()).await?);
        state.sort();
        assert_eq!(state, vec!["create", "join", "topic"], "{engine}");
        assert!(topic.is_state, "{engine}");

        let empty = graph.queries().state_events_for_context(&"!elsewhere".into()).await?;
        assert!(empty.is_empty(), "{engine}");
    }
    Ok(())
}
