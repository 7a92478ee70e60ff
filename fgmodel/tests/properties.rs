use std::collections::HashSet;

use itertools::Itertools;
use proptest::prelude::*;

use fgmodel::{
    Assignment, ConditionalTable, CptGenerator, MultiDimIndex, StateEnumerator, VariableRegistry,
};

fn shape() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..5, 0..5)
}

proptest! {
    #[test]
    fn flatten_is_a_bijection(dims in shape()) {
        let index = MultiDimIndex::build(&dims).unwrap();
        prop_assert_eq!(index.capacity(), dims.iter().product::<usize>());
        let offsets: Vec<usize> = StateEnumerator::new(&dims)
            .map(|s| index.flatten(&s).unwrap())
            .collect();
        // axis 0 fastest: enumeration order is the storage order
        prop_assert_eq!(offsets, (0..index.capacity()).collect::<Vec<_>>());
    }

    #[test]
    fn enumeration_visits_every_state_once(dims in shape()) {
        let states: Vec<_> = StateEnumerator::new(&dims).collect();
        prop_assert_eq!(states.len(), dims.iter().product::<usize>());
        prop_assert_eq!(states.iter().collect::<HashSet<_>>().len(), states.len());
        prop_assert!(states[0].iter().all(|s| *s == 0));
        // same set as the cartesian product, with axis 0 as the innermost counter
        let reference: Vec<Vec<usize>> = dims
            .iter()
            .rev()
            .map(|d| 0..*d)
            .multi_cartesian_product()
            .map(|mut s| {
                s.reverse();
                s
            })
            .collect();
        if !dims.is_empty() {
            prop_assert_eq!(&states, &reference);
        }
        if let Some(d0) = dims.first() {
            for (i, w) in states.windows(2).enumerate() {
                if (i + 1) % d0 != 0 {
                    prop_assert_eq!(w[1][0], w[0][0] + 1);
                }
            }
        }
    }

    #[test]
    fn unflatten_inverts_flatten(dims in shape()) {
        let index = MultiDimIndex::build(&dims).unwrap();
        for offset in 0..index.capacity() {
            let state = index.unflatten(offset).unwrap();
            prop_assert_eq!(index.flatten(&state).unwrap(), offset);
        }
    }

    #[test]
    fn reorder_round_trip(dims in prop::collection::vec(1usize..4, 1..5), seed in any::<u64>()) {
        let mut reg = VariableRegistry::new();
        let vars = dims
            .iter()
            .enumerate()
            .map(|(i, d)| reg.get_or_add(&format!("v{}", i), "node", *d).unwrap())
            .collect_vec();
        let ids = vars.iter().map(|v| v.id()).collect_vec();
        let gen = CptGenerator::new(
            vars,
            move |m: &Assignment| {
                Some(m.iter().fold(seed as f64, |acc, (v, s)| acc * 0.5 + (*v * 7 + *s) as f64))
            },
            "f",
            "cpt",
        );
        let table = gen.generate(None).unwrap();
        prop_assert_eq!(table.project(&ids).unwrap(), table.values());

        let mut permuted = ids.clone();
        permuted.rotate_left(1);
        let linear = table.project(&permuted).unwrap();
        let permuted_dims = permuted.iter().map(|v| dims[*v]).collect_vec();
        let mut other = ConditionalTable::new(permuted.clone(), &permuted_dims).unwrap();
        for (state, value) in StateEnumerator::new(&permuted_dims).zip(linear.iter()) {
            other.set_state(&state, *value).unwrap();
        }
        prop_assert_eq!(other.project(&ids).unwrap(), table.values());
        prop_assert_eq!(other, gen.generate(Some(&permuted)).unwrap());
    }
}

#[test]
fn dedupe_registration() {
    let mut reg = VariableRegistry::new();
    let a = reg.get_or_add("A", "gene", 2).unwrap();
    let b = reg.get_or_add("B", "gene", 3).unwrap();
    assert_eq!((a.id(), b.id()), (0, 1));
    assert_eq!(reg.get_or_add("A", "gene", 4).unwrap().dim(), 2);
    assert_eq!(StateEnumerator::new(&[a.dim(), b.dim()]).len(), 6);
}
