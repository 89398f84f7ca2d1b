//! Property tests over randomly generated decomposable and complete circuits.

use std::collections::HashMap;

use proptest::prelude::*;

use spn_rs::circuit::Circuit;
use spn_rs::reference::NodeId;
use spn_rs::storer::Storer;
use spn_rs::varset::VarSet;

const MAX_VARS: u32 = 4;

/// Deterministic source of choices for the circuit builder.
struct Tape {
    data: Vec<u32>,
    pos: usize,
}

impl Tape {
    fn next(&mut self, n: u32) -> u32 {
        let x = self.data[self.pos % self.data.len()];
        self.pos += 1;
        x % n
    }
}

/// Build a mixture over `vars`. Sub-circuits over the same variables are
/// sometimes reused, so the result is a DAG with shared nodes.
fn build(c: &mut Circuit, vars: &[u32], depth: u32, tape: &mut Tape, shared: &mut HashMap<Vec<u32>, NodeId>) -> NodeId {
    if let Some(&id) = shared.get(vars) {
        if tape.next(2) == 0 {
            return id;
        }
    }

    let sum = c.add_sum();
    let components = 1 + tape.next(3);
    for _ in 0..components {
        let child = if vars.len() == 1 || depth == 0 {
            // Fully factorised component: one binary leaf per variable.
            let p = c.add_product();
            for &v in vars {
                let a = 1 + tape.next(9) as u64;
                let b = 1 + tape.next(9) as u64;
                let total = (a + b) as f64;
                let leaf = c.add_multinomial(v, vec![a as f64 / total, b as f64 / total]);
                c.add_child(p, leaf).unwrap();
            }
            p
        } else {
            let split = 1 + tape.next(vars.len() as u32 - 1) as usize;
            let (left, right) = vars.split_at(split);
            let p = c.add_product();
            let l = build(c, left, depth - 1, tape, shared);
            let r = build(c, right, depth - 1, tape, shared);
            c.add_child(p, l).unwrap();
            c.add_child(p, r).unwrap();
            p
        };
        c.add_weighted_child(sum, child, (1 + tape.next(9)) as f64).unwrap();
    }

    shared.insert(vars.to_vec(), sum);
    sum
}

fn circuit_strategy() -> impl Strategy<Value = (Circuit, NodeId, u32)> {
    (1..=MAX_VARS, 0u32..4, prop::collection::vec(any::<u32>(), 1..64)).prop_map(|(n, depth, data)| {
        let vars: Vec<u32> = (0..n).collect();
        let mut c = Circuit::new();
        let mut tape = Tape { data, pos: 0 };
        let root = build(&mut c, &vars, depth, &mut tape, &mut HashMap::new());
        (c, root, n)
    })
}

fn evidence_strategy() -> impl Strategy<Value = Vec<Option<usize>>> {
    prop::collection::vec(prop::option::of(0usize..2), MAX_VARS as usize)
}

fn to_varset(n: u32, evidence: &[Option<usize>]) -> VarSet {
    (0..n)
        .filter_map(|v| evidence[v as usize].map(|x| (v.into(), x)))
        .collect()
}

proptest! {
    #[test]
    fn generated_circuits_are_valid((c, root, _) in circuit_strategy()) {
        prop_assert!(c.validate(root).is_ok());
        prop_assert!(c.find_cycle(root).is_none());
    }

    #[test]
    fn topological_order_respects_edges((c, root, _) in circuit_strategy()) {
        let order = c.topological_order(root);
        prop_assert_eq!(order.last().copied(), Some(root));
        prop_assert_eq!(order.len(), c.descendants(root).len());
        let pos: HashMap<NodeId, usize> = order.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        for &id in &order {
            for child in c.children(id) {
                prop_assert!(pos[child] < pos[&id]);
            }
        }
    }

    #[test]
    fn normalized_circuit_sums_to_one((mut c, root, n) in circuit_strategy()) {
        c.normalize(root);
        let empty = c.evaluate(root, &VarSet::new()).unwrap();
        prop_assert!(empty.abs() < 1e-9, "log Z = {}", empty);

        let mut total = 0.0;
        for bits in 0..(1usize << n) {
            let e: VarSet = (0..n).map(|v| (v.into(), (bits >> v) & 1)).collect();
            total += c.evaluate(root, &e).unwrap().exp();
        }
        prop_assert!((total - 1.0).abs() < 1e-9, "total = {}", total);
    }

    #[test]
    fn round_trip_is_stable((c, root, n) in circuit_strategy(), evidence in evidence_strategy()) {
        let bytes = c.to_bytes(root).unwrap();
        let (d, droot) = Circuit::from_bytes(&bytes).unwrap();
        prop_assert_eq!(d.to_bytes(droot).unwrap(), bytes);
        prop_assert_eq!(d.count_nodes(droot), c.count_nodes(root));

        let e = to_varset(n, &evidence);
        prop_assert_eq!(d.evaluate(droot, &e).unwrap(), c.evaluate(root, &e).unwrap());
    }

    #[test]
    fn map_value_is_a_lower_bound((mut c, root, n) in circuit_strategy(), evidence in evidence_strategy()) {
        c.normalize(root);
        let e = to_varset(n, &evidence);
        let (assignment, value) = c.evaluate_map(root, &e).unwrap();
        for (var, x) in assignment.iter() {
            if let Some(observed) = e.get(var) {
                prop_assert_eq!(observed, x);
            }
        }
        prop_assert!(value <= c.evaluate(root, &e).unwrap() + 1e-9);
        prop_assert!(value <= c.evaluate(root, &assignment).unwrap() + 1e-9);
    }

    #[test]
    fn weight_gradients_recover_node_values((c, root, n) in circuit_strategy(), evidence in evidence_strategy()) {
        // For every sum n: Σ_i w_i · ∂S/∂w_{n,i} = ∂S/∂n · S_n.
        let e = to_varset(n, &evidence);
        let mut storer = Storer::new();
        let inf = c.store_inference(root, &e, &mut storer, None).unwrap();
        let grads = c.differentiate(root, &mut storer, inf).unwrap();

        for id in c.topological_order(root) {
            let Ok(weights) = c.weights(id) else { continue };
            let lhs: f64 = weights
                .iter()
                .enumerate()
                .map(|(i, w)| w * grads.weight_gradient(&storer, id, i).unwrap().exp())
                .sum();
            let rhs = (grads.node_derivative(&storer, id).unwrap() + storer.single(inf, id).unwrap()).exp();
            prop_assert!((lhs - rhs).abs() <= 1e-9 * rhs.max(1.0), "{}: {} vs {}", id, lhs, rhs);
        }
    }
}
