use orbit::{CancelState, CancellationToken};

use proptest::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::task::{Wake, Waker};

#[test]
fn test_trigger_cancels_descendants() {
    let root = CancellationToken::new();
    let child = root.child();
    let grandchild = child.child();

    root.trigger();

    assert_eq!(root.state(), CancelState::CanceledLocally);
    assert_eq!(child.state(), CancelState::CanceledByAncestor);
    assert_eq!(grandchild.state(), CancelState::CanceledByAncestor);
}

#[test]
fn test_trigger_never_reaches_ancestors() {
    let root = CancellationToken::new();
    let child = root.child();
    let sibling = root.child();

    child.trigger();

    assert!(child.is_canceled());
    assert!(!root.is_canceled());
    assert!(!sibling.is_canceled());
}

#[test]
fn test_attach_to_canceled_parent() {
    let parent = CancellationToken::new();
    parent.trigger();

    let child = CancellationToken::new();
    child.attach_to(&parent);

    assert_eq!(child.state(), CancelState::CanceledByAncestor);
}

#[test]
fn test_detached_child_is_not_canceled() {
    let parent = CancellationToken::new();
    let child = parent.child();

    child.detach();
    parent.trigger();

    assert!(!child.is_canceled());
}

#[test]
fn test_dropped_child_is_skipped() {
    let parent = CancellationToken::new();
    drop(parent.child());
    let kept = parent.child();

    parent.trigger();

    assert!(kept.is_canceled());
}

#[test]
#[should_panic(expected = "already attached")]
fn test_attach_twice_is_rejected() {
    let first = CancellationToken::new();
    let second = CancellationToken::new();
    let child = first.child();

    child.attach_to(&second);
}

#[test]
fn test_clones_share_state() {
    let token = CancellationToken::new();
    let clone = token.clone();

    clone.trigger();

    assert!(token.is_canceled());
    assert!(token.same_as(&clone));
    assert!(!token.same_as(&CancellationToken::new()));
}

struct Flag(AtomicBool);

impl Wake for Flag {
    fn wake(self: Arc<Self>) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[test]
fn test_registered_waker_fires_on_cancel() {
    let flag = Arc::new(Flag(AtomicBool::new(false)));
    let waker = Waker::from(flag.clone());

    let parent = CancellationToken::new();
    let child = parent.child();
    child.register_waker(&waker);
    assert!(!flag.0.load(Ordering::SeqCst));

    parent.trigger();
    assert!(flag.0.load(Ordering::SeqCst));
}

#[test]
fn test_deep_hierarchy() {
    let root = CancellationToken::new();
    let mut chain = vec![root.clone()];
    for _ in 0..100_000 {
        let next = chain.last().map(CancellationToken::child).unwrap();
        chain.push(next);
    }

    root.trigger();

    assert!(chain.iter().all(CancellationToken::is_canceled));
}

/// Builds a random tree where `parents[i]` is the parent of node `i + 1`.
#[test]
fn test_attach_racing_trigger_ends_canceled() {
    const ATTACHERS: usize = 4;
    const ROUNDS: usize = 500;

    for _ in 0..ROUNDS {
        let parent = CancellationToken::new();
        let barrier = Barrier::new(ATTACHERS + 1);

        let children = thread::scope(|scope| {
            let attachers = (0..ATTACHERS)
                .map(|_| {
                    scope.spawn(|| {
                        let child = CancellationToken::new();
                        let grandchild = child.child();

                        barrier.wait();
                        child.attach_to(&parent);
                        (child, grandchild)
                    })
                })
                .collect::<Vec<_>>();

            barrier.wait();
            parent.trigger();

            attachers
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect::<Vec<_>>()
        });

        for (child, grandchild) in children {
            assert_eq!(child.state(), CancelState::CanceledByAncestor);
            assert_eq!(grandchild.state(), CancelState::CanceledByAncestor);
        }
    }
}

fn tree(parents: &[usize]) -> Vec<CancellationToken> {
    let mut nodes = vec![CancellationToken::new()];
    for (i, &parent) in parents.iter().enumerate() {
        let parent = parent % (i + 1);
        let child = nodes[parent].child();
        nodes.push(child);
    }
    nodes
}

fn is_descendant(parents: &[usize], mut node: usize, ancestor: usize) -> bool {
    while node != 0 {
        if node == ancestor {
            return true;
        }
        node = parents[node - 1] % node;
    }
    ancestor == 0
}

proptest! {
    #[test]
    fn prop_trigger_cancels_exactly_the_subtree(
        parents in prop::collection::vec(any::<usize>(), 0..40),
        target in any::<usize>(),
    ) {
        let nodes = tree(&parents);
        let target = target % nodes.len();

        nodes[target].trigger();

        for (index, node) in nodes.iter().enumerate() {
            prop_assert_eq!(
                node.is_canceled(),
                is_descendant(&parents, index, target),
                "node {} with target {}", index, target
            );
        }
    }
}
