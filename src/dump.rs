//! Human-readable text dump.
//!
//! Every node gets a label made of its kind letter (`S`, `P` or `L`) and a
//! per-kind counter assigned in topological order, so leaves get the smallest
//! numbers and the root the largest of its kind. Blocks are then written
//! breadth-first from the root:
//!
//! ```text
//! S0 [
//!   P0 0.30000
//!   P1 0.70000
//! ]
//! P0 [
//!   L0
//!   L1
//! ]
//! L0 [
//!   0.10000 0.30000
//! ]
//! ```
//!
//! A sum lists each child with its weight, a product lists its children, and a
//! leaf prints its location and scale (mean and standard deviation for
//! multinomials and Gaussians, the value and `0` for indicators).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::debug;

use crate::circuit::Circuit;
use crate::error::Result;
use crate::node::{Node, NodeKind};
use crate::reference::NodeId;
use crate::search::Visit;

/// Configuration for the text dump.
#[derive(Debug, Clone)]
pub struct DumpConfig {
    /// Digits after the decimal point for weights and leaf parameters (default: 5)
    pub precision: usize,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self { precision: 5 }
    }
}

impl Circuit {
    /// Labels `S<n>`, `P<n>` and `L<n>` of every node reachable from `root`.
    pub fn labels(&self, root: NodeId) -> HashMap<NodeId, String> {
        let mut counters = [0usize; 3];
        let mut labels = HashMap::new();
        for id in self.topological_order(root) {
            let (letter, k) = match self.kind(id) {
                NodeKind::Sum => ('S', 0),
                NodeKind::Product => ('P', 1),
                NodeKind::Leaf => ('L', 2),
            };
            labels.insert(id, format!("{}{}", letter, counters[k]));
            counters[k] += 1;
        }
        labels
    }

    pub fn to_text(&self, root: NodeId) -> String {
        self.to_text_with_config(root, &DumpConfig::default())
    }

    pub fn to_text_with_config(&self, root: NodeId, config: &DumpConfig) -> String {
        debug!("to_text(root = {}, precision = {})", root, config.precision);
        let labels = self.labels(root);
        let prec = config.precision;
        let mut out = String::new();

        self.breadth_first(root, |id| {
            out.push_str(&format!("{} [\n", labels[&id]));
            match self.node(id) {
                Node::Sum { children, weights } => {
                    for (c, w) in children.iter().zip(weights) {
                        out.push_str(&format!("  {} {:.*}\n", labels[c], prec, w));
                    }
                }
                Node::Product { children } => {
                    for c in children {
                        out.push_str(&format!("  {}\n", labels[c]));
                    }
                }
                Node::Leaf(leaf) => {
                    let (mu, sigma) = leaf.location_scale();
                    out.push_str(&format!("  {:.*} {:.*}\n", prec, mu, prec, sigma));
                }
            }
            out.push_str("]\n");
            Visit::Continue
        });

        out
    }

    /// Write [`to_text`][Self::to_text] to `path`.
    pub fn save_text<P: AsRef<Path>>(&self, root: NodeId, path: P) -> Result<()> {
        fs::write(path, self.to_text(root))?;
        Ok(())
    }
}
