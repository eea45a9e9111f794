//! Dense tensor primitives shared by the model contract.
//!
//! Tensors are row-major f32 buffers with an explicit shape. A rank-0 tensor
//! holds a single scalar. Variables wrap a tensor behind a lock so a model can
//! accumulate metrics through a shared reference without exposing its
//! parameter collections to structural mutation.

use anyhow::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            anyhow::bail!("shape {:?} expects {} elements, got {}", shape, expected, data.len());
        }
        Ok(Self { shape, data })
    }

    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self { shape, data: vec![0.0; len] }
    }

    /// Rank-0 tensor holding one value.
    pub fn scalar(value: f32) -> Self {
        Self { shape: Vec::new(), data: vec![value] }
    }

    pub fn shape(&self) -> &[usize] { &self.shape }
    pub fn data(&self) -> &[f32] { &self.data }
    pub fn rank(&self) -> usize { self.shape.len() }
    pub fn len(&self) -> usize { self.data.len() }
    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    pub fn scalar_value(&self) -> Option<f32> {
        if self.data.len() == 1 { Some(self.data[0]) } else { None }
    }

    pub fn fill(&mut self, value: f32) {
        for v in &mut self.data { *v = value; }
    }

    pub fn data_mut(&mut self) -> &mut [f32] { &mut self.data }
}

/// Static description of one tensor slot in a batch. `None` dimensions are
/// unconstrained (typically the leading batch dimension).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorSpec {
    pub name: String,
    pub shape: Vec<Option<usize>>,
}

impl TensorSpec {
    pub fn new(name: impl Into<String>, shape: Vec<Option<usize>>) -> Self {
        Self { name: name.into(), shape }
    }

    pub fn matches(&self, tensor: &Tensor) -> bool {
        if tensor.rank() != self.shape.len() { return false; }
        self.shape.iter().zip(tensor.shape()).all(|(spec, dim)| match spec {
            Some(d) => d == dim,
            None => true,
        })
    }
}

/// Ordered name -> tensor structure used for batches and aggregated outputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TensorMap {
    entries: Vec<(String, Tensor)>,
}

impl TensorMap {
    pub fn new() -> Self { Self::default() }

    /// Inserts or replaces the entry with this name, preserving order.
    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) {
        let name = name.into();
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = tensor;
        } else {
            self.entries.push((name, tensor));
        }
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.entries.iter().map(|(n, t)| (n.as_str(), t))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

/// A named tensor with interior mutability. Model variable collections are
/// slices of these; values change, the collection never does.
#[derive(Debug)]
pub struct Variable {
    name: String,
    value: RwLock<Tensor>,
}

impl Variable {
    pub fn new(name: impl Into<String>, initial: Tensor) -> Self {
        Self { name: name.into(), value: RwLock::new(initial) }
    }

    pub fn name(&self) -> &str { &self.name }

    /// Snapshot of the current value.
    pub fn value(&self) -> Tensor { self.value.read().clone() }

    pub fn shape(&self) -> Vec<usize> { self.value.read().shape().to_vec() }

    /// Replaces the value; the shape declared at construction is fixed.
    pub fn assign(&self, tensor: Tensor) -> Result<()> {
        let mut guard = self.value.write();
        if guard.shape() != tensor.shape() {
            anyhow::bail!(
                "variable '{}' has shape {:?}, cannot assign {:?}",
                self.name, guard.shape(), tensor.shape()
            );
        }
        *guard = tensor;
        Ok(())
    }

    /// In-place update under the write lock.
    pub fn update<F: FnOnce(&mut Tensor)>(&self, f: F) {
        f(&mut self.value.write());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_shape_data_mismatch() {
        assert!(Tensor::new(vec![2, 3], vec![0.0; 5]).is_err());
        assert!(Tensor::new(vec![2, 3], vec![0.0; 6]).is_ok());
    }

    #[test]
    fn scalar_roundtrip() {
        let t = Tensor::scalar(4.5);
        assert_eq!(t.rank(), 0);
        assert_eq!(t.scalar_value(), Some(4.5));
    }

    #[test]
    fn spec_matching_respects_free_dims() {
        let spec = TensorSpec::new("x", vec![None, Some(3)]);
        assert!(spec.matches(&Tensor::zeros(vec![7, 3])));
        assert!(spec.matches(&Tensor::zeros(vec![1, 3])));
        assert!(!spec.matches(&Tensor::zeros(vec![7, 4])));
        assert!(!spec.matches(&Tensor::zeros(vec![3])));
    }

    #[test]
    fn variable_assign_keeps_shape() {
        let v = Variable::new("w", Tensor::zeros(vec![2]));
        assert!(v.assign(Tensor::new(vec![2], vec![1.0, 2.0]).unwrap()).is_ok());
        assert!(v.assign(Tensor::zeros(vec![3])).is_err());
        assert_eq!(v.value().data(), &[1.0, 2.0]);
    }

    #[test]
    fn tensor_map_iterates_in_insertion_order() {
        let mut m = TensorMap::new();
        m.insert("loss", Tensor::scalar(0.5));
        m.insert("num_examples", Tensor::scalar(8.0));
        let entries: Vec<(&str, f32)> = m
            .iter()
            .map(|(n, t)| (n, t.scalar_value().unwrap()))
            .collect();
        assert_eq!(entries, vec![("loss", 0.5), ("num_examples", 8.0)]);
    }

    #[test]
    fn tensor_map_insert_replaces_in_place() {
        let mut m = TensorMap::new();
        m.insert("a", Tensor::scalar(1.0));
        m.insert("b", Tensor::scalar(2.0));
        m.insert("a", Tensor::scalar(3.0));
        assert_eq!(m.len(), 2);
        assert_eq!(m.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(m.get("a").unwrap().scalar_value(), Some(3.0));
    }
}
