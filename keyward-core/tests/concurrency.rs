//! Concurrent readers during policy swaps

use std::sync::Arc;

use keyward_core::{Action, Authorizer, DecisionEngine, Identity, PolicyRule, PolicyStore, RuleSet, Verb};

fn rules(prefix: &str, n: usize) -> RuleSet {
    (0..n)
        .map(|i| PolicyRule::allow().with_users([format!("{prefix}-{i}")]))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_observe_torn_rule_set() {
    let old = rules("old", 3);
    let new = rules("new", 7);
    let store = Arc::new(PolicyStore::new(old.clone()));

    let mut readers = Vec::new();
    for _ in 0..1000 {
        let store = Arc::clone(&store);
        let (old, new) = (old.clone(), new.clone());
        readers.push(tokio::spawn(async move {
            let snapshot = store.current();
            assert!(
                *snapshot == old || *snapshot == new,
                "observed a rule set that is neither the old nor the new one"
            );
            snapshot.len()
        }));
    }

    let writer = {
        let store = Arc::clone(&store);
        let new = new.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            store.swap(new);
        })
    };

    for reader in readers {
        let len = reader.await.unwrap();
        assert!(len == 3 || len == 7);
    }
    writer.await.unwrap();
    assert_eq!(*store.current(), new);
    assert_eq!(store.generation(), 2);
}

#[test]
fn test_threads_authorize_while_swapping() {
    let store = Arc::new(PolicyStore::new(RuleSet::empty()));
    let authorizer = Authorizer::new(Arc::clone(&store), DecisionEngine::default());
    let identity = Identity::new("alice");
    let action = Action::resource(Verb::Get, "pods");

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..500 {
                    let result = authorizer.authorize(&identity, &action);
                    // Either the empty policy (refused) or the allow-all-for-alice policy
                    assert!(
                        result.reason == "no matching policy rule"
                            || result.reason == "allowed by rule 0"
                    );
                }
            });
        }
        scope.spawn(|| {
            for i in 0..100 {
                if i % 2 == 0 {
                    store.swap(RuleSet::new(vec![PolicyRule::allow().with_users(["alice"])]));
                } else {
                    store.swap(RuleSet::empty());
                }
            }
        });
    });

    assert_eq!(store.generation(), 101);
}
