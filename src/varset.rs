//! Partial variable instantiations.
//!
//! A [`VarSet`] is used both as *evidence* (the observed variables handed to
//! inference) and as the *decoded assignment* returned by MAP inference.
//! Variables absent from the set are unobserved and get marginalised out.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use crate::types::Var;

/// A partial mapping from variables to category values.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct VarSet {
    values: BTreeMap<Var, usize>,
}

impl VarSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `var = value`, returning the previous value if there was one.
    pub fn insert(&mut self, var: Var, value: usize) -> Option<usize> {
        self.values.insert(var, value)
    }

    pub fn get(&self, var: Var) -> Option<usize> {
        self.values.get(&var).copied()
    }

    pub fn contains(&self, var: Var) -> bool {
        self.values.contains_key(&var)
    }

    pub fn remove(&mut self, var: Var) -> Option<usize> {
        self.values.remove(&var)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(var, value)` pairs in increasing variable order.
    pub fn iter(&self) -> impl Iterator<Item = (Var, usize)> + '_ {
        self.values.iter().map(|(&v, &x)| (v, x))
    }

    pub fn vars(&self) -> impl Iterator<Item = Var> + '_ {
        self.values.keys().copied()
    }

    /// Copy every assignment of `other` into `self`, overwriting on conflict.
    pub fn merge(&mut self, other: &VarSet) {
        self.values.extend(other.iter());
    }

    /// Restrict the set to the given variables.
    pub fn project(&self, vars: &[Var]) -> VarSet {
        vars.iter()
            .filter_map(|&v| self.get(v).map(|x| (v, x)))
            .collect()
    }
}

impl FromIterator<(Var, usize)> for VarSet {
    fn from_iter<I: IntoIterator<Item = (Var, usize)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl<const N: usize> From<[(u32, usize); N]> for VarSet {
    fn from(pairs: [(u32, usize); N]) -> Self {
        pairs.into_iter().map(|(v, x)| (Var::new(v), x)).collect()
    }
}

impl Extend<(Var, usize)> for VarSet {
    fn extend<I: IntoIterator<Item = (Var, usize)>>(&mut self, iter: I) {
        self.values.extend(iter);
    }
}

impl<'a> IntoIterator for &'a VarSet {
    type Item = (&'a Var, &'a usize);
    type IntoIter = btree_map::Iter<'a, Var, usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl fmt::Display for VarSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (var, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", var, value)?;
        }
        write!(f, "}}")
    }
}
