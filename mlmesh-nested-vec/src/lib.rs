use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Debug;
use std::ops::{Index, IndexMut, Range};

/// A sequence of variable-length arrays stored contiguously.
///
/// Array `i` occupies `data[offsets[i] .. offsets[i + 1]]`, so `offsets` always holds
/// `len() + 1` entries and starts with zero.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedVec<T> {
    data: Vec<T>,
    offsets: Vec<usize>,
}

impl<T: Debug> Debug for NestedVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> Default for NestedVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> NestedVec<T> {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            offsets: vec![0],
        }
    }

    pub fn with_capacity(num_arrays: usize, num_elements: usize) -> Self {
        let mut offsets = Vec::with_capacity(num_arrays + 1);
        offsets.push(0);
        Self {
            data: Vec::with_capacity(num_elements),
            offsets,
        }
    }

    /// Starts a new array whose entries are appended one at a time.
    ///
    /// The array is closed when the returned appender is dropped.
    pub fn begin_array(&mut self) -> ArrayAppender<'_, T> {
        let initial_count = self.data.len();
        ArrayAppender {
            initial_count,
            data: &mut self.data,
            offsets: &mut self.offsets,
        }
    }

    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl '_ + ExactSizeIterator<Item = &[T]> {
        (0..self.len()).map(move |i| &self.data[self.range(i)])
    }

    /// Returns an iterator over all entries of all arrays, in storage order.
    pub fn iter_array_elements(&self) -> impl '_ + Iterator<Item = &T> {
        self.data.iter()
    }

    /// Mutable access to all entries of all arrays, in storage order.
    pub fn array_elements_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn total_num_elements(&self) -> usize {
        self.data.len()
    }

    pub fn array_len(&self, index: usize) -> Option<usize> {
        (index < self.len()).then(|| self.offsets[index + 1] - self.offsets[index])
    }

    pub fn get(&self, index: usize) -> Option<&[T]> {
        (index < self.len()).then(|| &self.data[self.range(index)])
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut [T]> {
        if index < self.len() {
            let range = self.range(index);
            Some(&mut self.data[range])
        } else {
            None
        }
    }

    fn range(&self, index: usize) -> Range<usize> {
        self.offsets[index]..self.offsets[index + 1]
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.offsets.truncate(1);
    }

    pub fn shrink_to_fit(&mut self) {
        self.data.shrink_to_fit();
        self.offsets.shrink_to_fit();
    }
}

impl<T: Clone> NestedVec<T> {
    pub fn push(&mut self, array: &[T]) {
        self.data.extend_from_slice(array);
        self.offsets.push(self.data.len());
    }

    /// Returns a copy in which array `i` is stored at position `old_to_new[i]`.
    ///
    /// # Panics
    ///
    /// Panics if `old_to_new` does not have one entry per array, or if it maps two arrays
    /// to the same position.
    pub fn reordered(&self, old_to_new: &[usize]) -> Self {
        assert_eq!(old_to_new.len(), self.len(), "One target index per array is required.");
        let mut new_to_old = vec![usize::MAX; self.len()];
        for (old, &new) in old_to_new.iter().enumerate() {
            assert_eq!(new_to_old[new], usize::MAX, "Target index {new} is used twice.");
            new_to_old[new] = old;
        }

        let mut result = Self::with_capacity(self.len(), self.data.len());
        for old in new_to_old {
            result.push(&self.data[self.range(old)]);
        }
        result
    }
}

impl<T> Index<usize> for NestedVec<T> {
    type Output = [T];

    fn index(&self, index: usize) -> &[T] {
        &self.data[self.range(index)]
    }
}

impl<T> IndexMut<usize> for NestedVec<T> {
    fn index_mut(&mut self, index: usize) -> &mut [T] {
        let range = self.range(index);
        &mut self.data[range]
    }
}

#[derive(Debug)]
pub struct ArrayAppender<'a, T> {
    data: &'a mut Vec<T>,
    offsets: &'a mut Vec<usize>,
    initial_count: usize,
}

impl<'a, T> ArrayAppender<'a, T> {
    pub fn push_single(&mut self, element: T) -> &mut Self {
        self.data.push(element);
        self
    }

    pub fn count(&self) -> usize {
        self.data.len() - self.initial_count
    }
}

impl<'a, T> Drop for ArrayAppender<'a, T> {
    fn drop(&mut self) {
        self.offsets.push(self.data.len());
    }
}

impl<T: Clone> From<&[Vec<T>]> for NestedVec<T> {
    fn from(arrays: &[Vec<T>]) -> Self {
        let mut result = Self::with_capacity(arrays.len(), arrays.iter().map(Vec::len).sum());
        for array in arrays {
            result.push(array);
        }
        result
    }
}

impl<T: Clone> From<Vec<Vec<T>>> for NestedVec<T> {
    fn from(arrays: Vec<Vec<T>>) -> Self {
        Self::from(arrays.as_slice())
    }
}

impl<T: Clone> From<&NestedVec<T>> for Vec<Vec<T>> {
    fn from(nested: &NestedVec<T>) -> Self {
        nested.iter().map(<[T]>::to_vec).collect()
    }
}
