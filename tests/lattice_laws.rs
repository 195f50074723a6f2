//! Algebraic laws of the verdict lattice.

use proptest::prelude::*;

use puremark::{join_all, Verdict};

fn verdicts() -> impl Strategy<Value = Verdict> {
    prop_oneof![
        Just(Verdict::Pure),
        Just(Verdict::PureExceptReadLocally),
        Just(Verdict::PureExceptLocally),
        Just(Verdict::Impure),
    ]
}

proptest! {
    #[test]
    fn join_is_commutative(a in verdicts(), b in verdicts()) {
        prop_assert_eq!(a.join(b), b.join(a));
    }

    #[test]
    fn join_is_associative(a in verdicts(), b in verdicts(), c in verdicts()) {
        prop_assert_eq!(a.join(b).join(c), a.join(b.join(c)));
    }

    #[test]
    fn join_is_idempotent(a in verdicts()) {
        prop_assert_eq!(a.join(a), a);
    }

    #[test]
    fn join_is_an_upper_bound(a in verdicts(), b in verdicts()) {
        let joined = a.join(b);
        prop_assert!(a.leq(joined));
        prop_assert!(b.leq(joined));
    }

    #[test]
    fn pure_is_the_identity(a in verdicts()) {
        prop_assert_eq!(Verdict::Pure.join(a), a);
    }

    #[test]
    fn impure_is_absorbing(a in verdicts()) {
        prop_assert_eq!(Verdict::Impure.join(a), Verdict::Impure);
    }

    #[test]
    fn join_all_agrees_with_pairwise_folding(v in proptest::collection::vec(verdicts(), 0..8)) {
        let folded = v.iter().copied().fold(Verdict::Pure, Verdict::join);
        prop_assert_eq!(join_all(v), folded);
    }

    #[test]
    fn leq_is_total(a in verdicts(), b in verdicts()) {
        prop_assert!(a.leq(b) || b.leq(a));
    }
}
