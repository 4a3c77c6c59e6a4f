//! New-message filter.

use std::collections::HashSet;

use crate::ledger::{DeliveryLedger, LedgerResult};
use crate::session::ServerMessageRef;

/// Keep the references whose unique id is not in `delivered`, in server order.
#[must_use]
pub fn select_undelivered(
    all_refs: Vec<ServerMessageRef>,
    delivered: &HashSet<String>,
) -> Vec<ServerMessageRef> {
    all_refs
        .into_iter()
        .filter(|r| !delivered.contains(&r.unique_id))
        .collect()
}

/// Return the messages of a listing that were never delivered for `mailbox`.
///
/// Uses one batched ledger lookup for the whole listing.
///
/// # Errors
///
/// Returns an error if the ledger cannot be queried.
pub async fn filter_new(
    ledger: &dyn DeliveryLedger,
    mailbox: &str,
    all_refs: Vec<ServerMessageRef>,
) -> LedgerResult<Vec<ServerMessageRef>> {
    if all_refs.is_empty() {
        return Ok(all_refs);
    }

    let ids: Vec<String> = all_refs.iter().map(|r| r.unique_id.clone()).collect();
    let delivered = ledger.records_by_ids(mailbox, &ids).await?;
    Ok(select_undelivered(all_refs, &delivered))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::ledger::DocumentLedger;

    fn refs(ids: &[&str]) -> Vec<ServerMessageRef> {
        ids.iter()
            .zip(1..)
            .map(|(id, n)| ServerMessageRef::new(n, *id))
            .collect()
    }

    #[tokio::test]
    async fn test_filter_new_preserves_server_order() {
        let ledger = DocumentLedger::in_memory("processedmessage");
        ledger.add("alice", "B").await.unwrap();
        ledger.add("alice", "D").await.unwrap();
        ledger.add("bob", "A").await.unwrap();

        let new = filter_new(&ledger, "alice", refs(&["A", "B", "C", "D", "E"]))
            .await
            .unwrap();
        let ids: Vec<&str> = new.iter().map(|r| r.unique_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "C", "E"]);
        assert_eq!(new[1].retrieve_id, 3);
    }

    #[tokio::test]
    async fn test_filter_new_empty_listing() {
        let ledger = DocumentLedger::in_memory("processedmessage");
        assert!(filter_new(&ledger, "alice", Vec::new()).await.unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_select_undelivered(
            listing in proptest::collection::vec("[a-f]{1,3}", 0..40),
            delivered in proptest::collection::hash_set("[a-f]{1,3}", 0..20),
        ) {
            let all: Vec<ServerMessageRef> = listing
                .iter()
                .zip(1..)
                .map(|(id, n)| ServerMessageRef::new(n, id.clone()))
                .collect();

            let undelivered = all.iter().filter(|r| !delivered.contains(&r.unique_id)).count();
            let kept = select_undelivered(all, &delivered);

            prop_assert_eq!(kept.len(), undelivered);
            prop_assert!(kept.iter().all(|r| !delivered.contains(&r.unique_id)));
            prop_assert!(kept.windows(2).all(|w| w[0].retrieve_id < w[1].retrieve_id));
        }
    }
}
