mod common;
use std::sync::Arc;

use anyhow::Result;
use common::*;
use itertools::Itertools;

const WRITERS: usize = 16;

/// Concurrent composers on one context never stamp the same stale frontier.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_outgoing_is_serialized() -> Result<()> {
    for (engine, graph) in all_engines().await? {
        let graph = Arc::new(graph);
        let handles: Vec<_> = (0..WRITERS)
            .map(|i| {
                let graph = graph.clone();
                tokio::spawn(async move { graph.tracker().register_outgoing(outgoing(&format!("p{i:02}"))).await })
            })
            .collect();

        let mut stamped = Vec::with_capacity(WRITERS);
        for handle in handles {
            stamped.push(handle.await??);
        }

        // nothing was confirmed, so each PDU was stamped with every PDU registered before it
        let chain: Vec<&Pdu> = stamped.iter().sorted_by_key(|p| p.predecessors.len()).collect();
        for (n, pdu) in chain.iter().enumerate() {
            assert_eq!(pdu.predecessors.len(), n, "{engine}");
            let expected: Vec<PduRef> = chain[..n].iter().map(|p| p.pdu_ref()).sorted().collect();
            assert_eq!(pdu.predecessors, expected, "{engine}");
        }

        let frontier = graph.tracker().current_frontier(&room()).await?;
        assert_eq!(frontier.len(), WRITERS, "{engine}");
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_remote_and_outgoing() -> Result<()> {
    for (engine, graph) in all_engines().await? {
        let graph = Arc::new(graph);
        let root = remote_pdu("root", &[]);
        graph.tracker().register_remote(root.clone()).await?;

        let remote = {
            let graph = graph.clone();
            tokio::spawn(async move {
                let mut parent = root.pdu_ref();
                for i in 0..WRITERS {
                    let pdu = remote_pdu(&format!("r{i:02}"), &[parent]);
                    parent = pdu.pdu_ref();
                    graph.tracker().register_remote(pdu).await?;
                }
                Ok::<_, MutationError>(parent)
            })
        };
        let local = {
            let graph = graph.clone();
            tokio::spawn(async move {
                let mut last = None;
                for i in 0..WRITERS {
                    let pdu = graph.tracker().register_outgoing(outgoing(&format!("l{i:02}"))).await?;
                    graph.tracker().confirm_sent(&pdu).await?;
                    last = Some(pdu.pdu_ref());
                }
                Ok::<_, MutationError>(last)
            })
        };

        let remote_head = remote.await??;
        let local_head = local.await??.expect("at least one local PDU");

        // Every intermediate head was superseded; only the two chain tips remain, unless the last
        // local PDU already built on the remote tip.
        let frontier = graph.tracker().current_frontier(&room()).await?;
        assert!(frontier.contains(&local_head), "{engine}");
        assert!(frontier.len() <= 2, "{engine}: {frontier:?}");
        if frontier.len() == 2 {
            assert!(frontier.contains(&remote_head), "{engine}");
        }
    }
    Ok(())
}
