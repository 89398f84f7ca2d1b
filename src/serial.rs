//! Binary serialization.
//!
//! # Format
//!
//! All integers are little-endian `u32`, all reals little-endian `f64`.
//!
//! ```text
//! u32 node_count
//! node_count × { u32 index; u8 tag; payload }
//! node_count × { u32 num_children; u32 child_index × num_children }
//! ```
//!
//! Nodes are numbered by their position in the topological order, so every
//! child index is smaller than its parent's and the root is `node_count - 1`.
//! Adjacency records appear in index order. Payloads by tag:
//!
//! | tag | node        | payload                                                   |
//! |-----|-------------|-----------------------------------------------------------|
//! | 0   | sum         | `u32 n; f64 weight × n`                                   |
//! | 1   | product     | (none)                                                    |
//! | 2   | multinomial | `u32 var; u32 n; f64 pr × n; u32 k; u32 scope_var × k`    |
//! | 3   | gaussian    | `u32 var; f64 mean; f64 sd`                               |
//! | 4   | indicator   | `u32 var; u32 value`                                      |
//!
//! A node shared by several parents is written once and referenced by index, so
//! decoding rebuilds the same DAG rather than a tree.

use std::fs;
use std::path::Path;

use log::debug;

use crate::circuit::Circuit;
use crate::error::{Error, Result};
use crate::leaf::{Gaussian, Indicator, Leaf, Multinomial};
use crate::node::Node;
use crate::reference::NodeId;
use crate::topo::positions;
use crate::types::Var;

const TAG_SUM: u8 = 0;
const TAG_PRODUCT: u8 = 1;
const TAG_MULTINOMIAL: u8 = 2;
const TAG_GAUSSIAN: u8 = 3;
const TAG_INDICATOR: u8 = 4;

fn desync(msg: impl Into<String>) -> Error {
    Error::SerializationDesync(msg.into())
}

// ─── Encoding ───

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, x: u8) {
        self.buf.push(x);
    }

    fn u32(&mut self, x: u32) {
        self.buf.extend_from_slice(&x.to_le_bytes());
    }

    fn usize(&mut self, x: usize) {
        self.u32(x as u32);
    }

    fn f64(&mut self, x: f64) {
        self.buf.extend_from_slice(&x.to_le_bytes());
    }

    fn leaf(&mut self, leaf: &Leaf) {
        match leaf {
            Leaf::Multinomial(m) => {
                self.u8(TAG_MULTINOMIAL);
                self.u32(m.var().id());
                self.usize(m.pr().len());
                for &p in m.pr() {
                    self.f64(p);
                }
                self.usize(m.scope().len());
                for &v in m.scope() {
                    self.u32(v.id());
                }
            }
            Leaf::Gaussian(g) => {
                self.u8(TAG_GAUSSIAN);
                self.u32(g.var().id());
                self.f64(g.mean());
                self.f64(g.sd());
            }
            Leaf::Indicator(i) => {
                self.u8(TAG_INDICATOR);
                self.u32(i.var().id());
                self.usize(i.value());
            }
        }
    }
}

// ─── Decoding ───

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.data.len()).ok_or_else(|| {
            desync(format!(
                "unexpected end of input reading {} at byte {} ({} bytes total)",
                what,
                self.pos,
                self.data.len()
            ))
        })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let mut b = [0u8; 4];
        b.copy_from_slice(self.take(4, what)?);
        Ok(u32::from_le_bytes(b))
    }

    fn usize(&mut self, what: &str) -> Result<usize> {
        self.u32(what).map(|x| x as usize)
    }

    fn f64(&mut self, what: &str) -> Result<f64> {
        let mut b = [0u8; 8];
        b.copy_from_slice(self.take(8, what)?);
        Ok(f64::from_le_bytes(b))
    }

    /// A length prefix, rejected early if the remaining input cannot hold
    /// `len` items of `item_size` bytes.
    fn len(&mut self, item_size: usize, what: &str) -> Result<usize> {
        let n = self.usize(what)?;
        let remaining = self.data.len() - self.pos;
        if n.saturating_mul(item_size) > remaining {
            return Err(desync(format!("{} = {} exceeds the remaining {} bytes", what, n, remaining)));
        }
        Ok(n)
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

/// A node record before its children are known.
enum Record {
    Sum(Vec<f64>),
    Product,
    Leaf(Leaf),
}

fn read_record(r: &mut Reader<'_>, index: usize) -> Result<Record> {
    let tag = r.u8("tag")?;
    let record = match tag {
        TAG_SUM => {
            let n = r.len(8, "sum weight count")?;
            let weights = (0..n).map(|_| r.f64("sum weight")).collect::<Result<Vec<_>>>()?;
            Record::Sum(weights)
        }
        TAG_PRODUCT => Record::Product,
        TAG_MULTINOMIAL => {
            let var = Var::new(r.u32("multinomial variable")?);
            let n = r.len(8, "multinomial support size")?;
            let pr = (0..n).map(|_| r.f64("multinomial probability")).collect::<Result<Vec<_>>>()?;
            let k = r.len(4, "multinomial scope size")?;
            let mut scope = (0..k)
                .map(|_| r.u32("multinomial scope").map(Var::new))
                .collect::<Result<Vec<_>>>()?;
            scope.sort();
            scope.dedup();
            if !scope.contains(&var) {
                return Err(desync(format!("multinomial {} does not contain its variable {} in its scope", index, var)));
            }
            Record::Leaf(Multinomial::new(var, pr).with_scope(scope).into())
        }
        TAG_GAUSSIAN => {
            let var = Var::new(r.u32("gaussian variable")?);
            let mean = r.f64("gaussian mean")?;
            let sd = r.f64("gaussian sd")?;
            Record::Leaf(Gaussian::new(var, mean, sd).into())
        }
        TAG_INDICATOR => {
            let var = Var::new(r.u32("indicator variable")?);
            let value = r.usize("indicator value")?;
            Record::Leaf(Indicator::new(var, value).into())
        }
        other => return Err(desync(format!("unknown tag {} for node {}", other, index))),
    };
    Ok(record)
}

impl Circuit {
    /// Encode the circuit reachable from `root`.
    pub fn to_bytes(&self, root: NodeId) -> Result<Vec<u8>> {
        debug!("to_bytes(root = {})", root);
        self.check(root)?;
        let order = self.topological_order(root);
        let index = positions(&order);

        let mut w = Writer { buf: Vec::new() };
        w.usize(order.len());
        for (i, &id) in order.iter().enumerate() {
            w.usize(i);
            match self.node(id) {
                Node::Sum { weights, .. } => {
                    w.u8(TAG_SUM);
                    w.usize(weights.len());
                    for &x in weights {
                        w.f64(x);
                    }
                }
                Node::Product { .. } => w.u8(TAG_PRODUCT),
                Node::Leaf(leaf) => w.leaf(leaf),
            }
        }
        for &id in &order {
            let children = self.children(id);
            w.usize(children.len());
            for c in children {
                w.usize(index[c]);
            }
        }

        debug!("to_bytes(root = {}) -> {} nodes, {} bytes", root, order.len(), w.buf.len());
        Ok(w.buf)
    }

    /// Decode a circuit produced by [`to_bytes`][Self::to_bytes], returning it
    /// together with its root.
    ///
    /// Node `i` of the input becomes `NodeId(i)` of the new circuit.
    pub fn from_bytes(data: &[u8]) -> Result<(Circuit, NodeId)> {
        debug!("from_bytes({} bytes)", data.len());
        let mut r = Reader { data, pos: 0 };

        // Each node takes at least five bytes (index and tag).
        let count = r.len(5, "node count")?;
        if count == 0 {
            return Err(desync("empty circuit"));
        }

        let mut records: Vec<Option<Record>> = (0..count).map(|_| None).collect();
        for _ in 0..count {
            let index = r.usize("node index")?;
            if index >= count {
                return Err(desync(format!("node index {} out of range (node count {})", index, count)));
            }
            if records[index].is_some() {
                return Err(desync(format!("duplicate node index {}", index)));
            }
            records[index] = Some(read_record(&mut r, index)?);
        }

        // Every index in 0..count was seen exactly once, so all records are filled.
        let mut circuit = Circuit::with_capacity(count);
        let mut sum_weights: Vec<Option<Vec<f64>>> = Vec::with_capacity(count);
        for record in records.into_iter().flatten() {
            match record {
                Record::Sum(weights) => {
                    circuit.add_sum();
                    sum_weights.push(Some(weights));
                }
                Record::Product => {
                    circuit.add_product();
                    sum_weights.push(None);
                }
                Record::Leaf(leaf) => {
                    circuit.add_leaf(leaf);
                    sum_weights.push(None);
                }
            }
        }

        for (i, weights) in sum_weights.iter().enumerate() {
            let parent = NodeId::new(i as u32);
            let n = r.len(4, "child count")?;
            if let Some(weights) = weights {
                if weights.len() != n {
                    return Err(desync(format!(
                        "sum {} has {} weights but {} children",
                        i,
                        weights.len(),
                        n
                    )));
                }
            } else if n > 0 && circuit.node(parent).is_leaf() {
                return Err(desync(format!("leaf {} has {} children", i, n)));
            }
            for k in 0..n {
                let c = r.usize("child index")?;
                if c >= i {
                    return Err(desync(format!("child index {} of node {} is not below its parent", c, i)));
                }
                let child = NodeId::new(c as u32);
                match weights {
                    Some(weights) => circuit.add_weighted_child(parent, child, weights[k])?,
                    None => circuit.add_child(parent, child)?,
                }
            }
        }

        if r.remaining() > 0 {
            return Err(desync(format!("{} trailing bytes", r.remaining())));
        }

        let root = NodeId::new((count - 1) as u32);
        debug!("from_bytes -> {:?}, root = {}", circuit, root);
        Ok((circuit, root))
    }

    /// Write the circuit reachable from `root` to `path`.
    pub fn save<P: AsRef<Path>>(&self, root: NodeId, path: P) -> Result<()> {
        let bytes = self.to_bytes(root)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Read a circuit written by [`save`][Self::save].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<(Circuit, NodeId)> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}
