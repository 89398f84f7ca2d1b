//! # spn-rs: Sum-Product Networks in Rust
//!
//! **`spn-rs`** is an arena-based library for **Sum-Product Networks (SPNs)**:
//! probabilistic circuits built from sum, product and leaf-distribution nodes,
//! supporting exact inference in time linear in the size of the circuit.
//!
//! ## What is an SPN?
//!
//! An SPN is a rooted DAG. Leaves are univariate distributions, products combine
//! children over disjoint sets of variables (*decomposability*), and sums mix
//! children over the same variables with non-negative weights (*completeness*).
//! Under these two conditions the root computes a normalised joint distribution,
//! and both marginals and the most probable explanation can be computed in a
//! single bottom-up pass.
//!
//! ## Key Features
//!
//! - **Arena Model**: All nodes live in a [`Circuit`][crate::circuit::Circuit] and are referenced by
//!   [`NodeId`][crate::reference::NodeId]. A node with several parents is stored once.
//! - **Log Domain**: Every value is a natural logarithm; sums use the max-shift log-sum-exp.
//! - **Explicit Evaluation Context**: Intermediate values go into a [`Storer`][crate::storer::Storer]
//!   owned by the caller, never into the circuit, so a shared `&Circuit` can serve many evaluations.
//! - **Learning Hooks**: Reverse-mode derivatives of the root with respect to every node and weight,
//!   plus gradient-descent and hard-EM weight updates.
//! - **Sharing-Preserving Codec**: A compact binary format that round-trips DAGs without duplicating shared nodes.
//!
//! ## Basic Usage
//!
//! ```rust
//! use spn_rs::circuit::Circuit;
//! use spn_rs::varset::VarSet;
//!
//! // 1. Build a mixture of two product distributions over X0, X1
//! let mut c = Circuit::new();
//! let a0 = c.add_multinomial(0, vec![0.2, 0.8]);
//! let b0 = c.add_multinomial(1, vec![0.5, 0.5]);
//! let a1 = c.add_multinomial(0, vec![0.9, 0.1]);
//! let b1 = c.add_multinomial(1, vec![0.3, 0.7]);
//! let p0 = c.add_product();
//! c.add_child(p0, a0).unwrap();
//! c.add_child(p0, b0).unwrap();
//! let p1 = c.add_product();
//! c.add_child(p1, a1).unwrap();
//! c.add_child(p1, b1).unwrap();
//! let root = c.add_sum();
//! c.add_weighted_child(root, p0, 0.4).unwrap();
//! c.add_weighted_child(root, p1, 0.6).unwrap();
//! c.validate(root).unwrap();
//!
//! // 2. Marginal inference: P(X0 = 0), with X1 summed out
//! let lp = c.evaluate(root, &VarSet::from([(0, 0)])).unwrap();
//! assert!((lp.exp() - (0.4 * 0.2 + 0.6 * 0.9)).abs() < 1e-12);
//!
//! // 3. Most probable explanation
//! let (mpe, _) = c.evaluate_map(root, &VarSet::new()).unwrap();
//! assert_eq!(mpe, VarSet::from([(0, 0), (1, 1)]));
//! ```
//!
//! ## Core Components
//!
//! - **[`circuit`]**: The node arena and construction API.
//! - **[`inference`]**: Marginal and MAP inference.
//! - **[`derive`]** and **[`learn`]**: Derivatives and weight learning.
//! - **[`storer`]**: Ticketed dynamic-programming tables.
//! - **[`serial`]** and **[`dump`]**: Binary and text output.

pub mod circuit;
pub mod derive;
pub mod dump;
pub mod error;
pub mod inference;
pub mod leaf;
pub mod learn;
pub mod node;
pub mod reference;
pub mod search;
pub mod serial;
pub mod stats;
pub mod storer;
pub mod structure;
pub mod topo;
pub mod types;
pub mod utils;
pub mod varset;
