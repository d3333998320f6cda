//! Type-erased named arrays.
//!
//! A [`NamedArray`] owns a contiguous buffer of tuples, each holding the
//! same number of components. Callers that need the elements ask for a
//! typed view with [`NamedArray::view`]; the view only exists when the
//! stored element type matches the requested one exactly.
//!
//! Arrays can be *declared* without storage. Preflight uses this to publish
//! shapes cheaply; [`NamedArray::allocate`] materializes the buffer later.
//!
//! The neighbor-list layout stores a variable-length list per tuple instead
//! of fixed-width records.

use crate::error::{ArrayFlowError, Result};
use crate::types::{Element, ElementType};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// How tuples are laid out in an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ArrayLayout {
    /// Fixed-width records of `component_count` elements.
    #[default]
    Dense,
    /// One variable-length list per tuple.
    NeighborList,
}

/// Typed storage for one array.
#[doc(hidden)]
#[derive(Debug, Clone, PartialEq)]
pub enum Column<T> {
    Dense(Vec<T>),
    Lists(Vec<Vec<T>>),
}

impl<T: Element> Column<T> {
    fn allocate(
        layout: ArrayLayout,
        tuples: usize,
        components: usize,
        fill: T,
    ) -> std::result::Result<Self, String> {
        match layout {
            ArrayLayout::Dense => {
                let len = tuples
                    .checked_mul(components)
                    .filter(|n| n.checked_mul(std::mem::size_of::<T>()).is_some())
                    .ok_or_else(|| {
                        format!("{} tuples x {} components overflows", tuples, components)
                    })?;
                let mut data = Vec::new();
                data.try_reserve_exact(len).map_err(|e| e.to_string())?;
                data.resize(len, fill);
                Ok(Column::Dense(data))
            }
            ArrayLayout::NeighborList => {
                let mut lists = Vec::new();
                lists.try_reserve_exact(tuples).map_err(|e| e.to_string())?;
                lists.resize_with(tuples, Vec::new);
                Ok(Column::Lists(lists))
            }
        }
    }

    fn resize(&mut self, tuples: usize, components: usize) -> std::result::Result<(), String> {
        match self {
            Column::Dense(data) => {
                let len = tuples.checked_mul(components).ok_or_else(|| {
                    format!("{} tuples x {} components overflows", tuples, components)
                })?;
                if len > data.len() {
                    data.try_reserve_exact(len - data.len())
                        .map_err(|e| e.to_string())?;
                }
                data.resize(len, T::default());
            }
            Column::Lists(lists) => {
                if tuples > lists.len() {
                    lists
                        .try_reserve_exact(tuples - lists.len())
                        .map_err(|e| e.to_string())?;
                }
                lists.resize_with(tuples, Vec::new);
            }
        }
        Ok(())
    }

    /// `remove` is sorted, deduplicated and in range.
    fn erase(&mut self, remove: &[usize], components: usize) {
        let mut next = remove.iter().peekable();
        match self {
            Column::Dense(data) => {
                let mut kept = Vec::with_capacity(data.len() - remove.len() * components);
                for (i, tuple) in data.chunks_exact(components.max(1)).enumerate() {
                    if next.peek() == Some(&&i) {
                        next.next();
                    } else {
                        kept.extend_from_slice(tuple);
                    }
                }
                *data = kept;
            }
            Column::Lists(lists) => {
                let mut i = 0;
                lists.retain(|_| {
                    let keep = next.peek() != Some(&&i);
                    if !keep {
                        next.next();
                    }
                    i += 1;
                    keep
                });
            }
        }
    }

    fn copy_tuple(&mut self, from: usize, to: usize, components: usize) {
        match self {
            Column::Dense(data) => {
                let start = from * components;
                data.copy_within(start..start + components, to * components);
            }
            Column::Lists(lists) => {
                lists[to] = lists[from].clone();
            }
        }
    }

    fn zero(&mut self) {
        match self {
            Column::Dense(data) => data.iter_mut().for_each(|v| *v = T::default()),
            Column::Lists(lists) => lists.iter_mut().for_each(Vec::clear),
        }
    }

    fn size_bytes(&self) -> usize {
        let elements = match self {
            Column::Dense(data) => data.len(),
            Column::Lists(lists) => lists.iter().map(Vec::len).sum(),
        };
        elements * std::mem::size_of::<T>()
    }
}

/// Type-erased storage, one variant per [`ElementType`].
#[doc(hidden)]
#[derive(Debug, Clone, PartialEq)]
pub enum Buffer {
    Int8(Column<i8>),
    UInt8(Column<u8>),
    Int16(Column<i16>),
    UInt16(Column<u16>),
    Int32(Column<i32>),
    UInt32(Column<u32>),
    Int64(Column<i64>),
    UInt64(Column<u64>),
    Float32(Column<f32>),
    Float64(Column<f64>),
    Bool(Column<bool>),
}

macro_rules! with_column {
    ($buffer:expr, $col:ident => $body:expr) => {
        match $buffer {
            Buffer::Int8($col) => $body,
            Buffer::UInt8($col) => $body,
            Buffer::Int16($col) => $body,
            Buffer::UInt16($col) => $body,
            Buffer::Int32($col) => $body,
            Buffer::UInt32($col) => $body,
            Buffer::Int64($col) => $body,
            Buffer::UInt64($col) => $body,
            Buffer::Float32($col) => $body,
            Buffer::Float64($col) => $body,
            Buffer::Bool($col) => $body,
        }
    };
}

/// Read-only typed view over a dense array.
#[derive(Debug, Clone, Copy)]
pub struct ArrayView<'a, T> {
    data: &'a [T],
    components: usize,
}

impl<'a, T: Element> ArrayView<'a, T> {
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    pub fn component_count(&self) -> usize {
        self.components
    }

    pub fn tuple_count(&self) -> usize {
        self.data.len() / self.components.max(1)
    }

    /// Components of tuple `index`.
    pub fn tuple(&self, index: usize) -> Option<&'a [T]> {
        let start = index.checked_mul(self.components)?;
        self.data.get(start..start + self.components)
    }

    pub fn value(&self, tuple: usize, component: usize) -> Option<T> {
        if component >= self.components {
            return None;
        }
        self.data.get(tuple * self.components + component).copied()
    }

    pub fn tuples(&self) -> std::slice::ChunksExact<'a, T> {
        self.data.chunks_exact(self.components.max(1))
    }
}

/// Mutable typed view over a dense array.
#[derive(Debug)]
pub struct ArrayViewMut<'a, T> {
    data: &'a mut [T],
    components: usize,
}

impl<'a, T: Element> ArrayViewMut<'a, T> {
    pub fn as_slice(&self) -> &[T] {
        &*self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut *self.data
    }

    /// Consume the view, keeping the borrow of the underlying buffer.
    pub fn into_mut_slice(self) -> &'a mut [T] {
        self.data
    }

    pub fn component_count(&self) -> usize {
        self.components
    }

    pub fn tuple_mut(&mut self, index: usize) -> Option<&mut [T]> {
        let start = index.checked_mul(self.components)?;
        self.data.get_mut(start..start + self.components)
    }

    pub fn set_value(&mut self, tuple: usize, component: usize, value: T) -> bool {
        if component >= self.components {
            return false;
        }
        match self.data.get_mut(tuple * self.components + component) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

/// A named, type-erased, tuple-oriented buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArray {
    name: String,
    element_type: ElementType,
    layout: ArrayLayout,
    tuple_count: usize,
    component_dims: Vec<usize>,
    buffer: Option<Buffer>,
}

impl NamedArray {
    /// Create an allocated dense array filled with `T::default()`.
    pub fn create<T: Element>(
        name: impl Into<String>,
        tuple_count: usize,
        component_dims: &[usize],
    ) -> Result<Self> {
        Self::create_filled(name, tuple_count, component_dims, T::default())
    }

    /// Create an allocated dense array with every element set to `fill`.
    pub fn create_filled<T: Element>(
        name: impl Into<String>,
        tuple_count: usize,
        component_dims: &[usize],
        fill: T,
    ) -> Result<Self> {
        let mut array = Self::declare(T::TYPE, name, tuple_count, component_dims);
        array.allocate(fill)?;
        Ok(array)
    }

    /// Create an allocated dense array whose element type is only known at runtime.
    pub fn create_dyn(
        element_type: ElementType,
        name: impl Into<String>,
        tuple_count: usize,
        component_dims: &[usize],
    ) -> Result<Self> {
        let mut array = Self::declare(element_type, name, tuple_count, component_dims);
        array.allocate_default()?;
        Ok(array)
    }

    /// Create an allocated neighbor-list array with an empty list per tuple.
    pub fn neighbor_list<T: Element>(name: impl Into<String>, tuple_count: usize) -> Result<Self> {
        let mut array = Self::declare_neighbor_list(T::TYPE, name, tuple_count);
        array.allocate_default()?;
        Ok(array)
    }

    /// Describe a dense array without allocating storage.
    ///
    /// Empty `component_dims` is treated as a scalar (`[1]`).
    pub fn declare(
        element_type: ElementType,
        name: impl Into<String>,
        tuple_count: usize,
        component_dims: &[usize],
    ) -> Self {
        let component_dims = if component_dims.is_empty() {
            vec![1]
        } else {
            component_dims.to_vec()
        };
        Self {
            name: name.into(),
            element_type,
            layout: ArrayLayout::Dense,
            tuple_count,
            component_dims,
            buffer: None,
        }
    }

    /// Describe a neighbor-list array without allocating storage.
    pub fn declare_neighbor_list(
        element_type: ElementType,
        name: impl Into<String>,
        tuple_count: usize,
    ) -> Self {
        Self {
            layout: ArrayLayout::NeighborList,
            ..Self::declare(element_type, name, tuple_count, &[1])
        }
    }

    /// Allocate storage with every element set to `fill`.
    ///
    /// Replaces any existing contents. Fails with `ShapeMismatch` if `T`
    /// is not this array's element type.
    pub fn allocate<T: Element>(&mut self, fill: T) -> Result<()> {
        self.check_type::<T>()?;
        let column = Column::allocate(self.layout, self.tuple_count, self.component_count(), fill)
            .map_err(|message| self.allocation_error(message))?;
        self.buffer = Some(T::into_buffer(column));
        Ok(())
    }

    /// Allocate storage filled with the element type's default value.
    pub fn allocate_default(&mut self) -> Result<()> {
        crate::with_element_type!(self.element_type, T => self.allocate(T::default()))
    }

    /// Drop the buffer, keeping the shape.
    pub fn deallocate(&mut self) {
        self.buffer = None;
    }

    pub fn is_allocated(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn layout(&self) -> ArrayLayout {
        self.layout
    }

    pub fn is_neighbor_list(&self) -> bool {
        self.layout == ArrayLayout::NeighborList
    }

    pub fn tuple_count(&self) -> usize {
        self.tuple_count
    }

    pub fn component_dims(&self) -> &[usize] {
        &self.component_dims
    }

    /// Product of the component dimensions.
    pub fn component_count(&self) -> usize {
        self.component_dims.iter().product()
    }

    /// Bytes held by the buffer (zero when unallocated).
    pub fn size_bytes(&self) -> usize {
        self.buffer
            .as_ref()
            .map_or(0, |buffer| with_column!(buffer, col => col.size_bytes()))
    }

    /// Change the tuple count, keeping the first `min(old, new)` tuples.
    ///
    /// New tuples are default-initialized (dense) or empty (neighbor list).
    /// An unallocated array only records the new count.
    pub fn resize(&mut self, tuple_count: usize) -> Result<()> {
        if let Some(buffer) = self.buffer.as_mut() {
            let components: usize = self.component_dims.iter().product();
            let outcome = with_column!(buffer, col => col.resize(tuple_count, components));
            if let Err(message) = outcome {
                return Err(self.allocation_error(message));
            }
        }
        self.tuple_count = tuple_count;
        Ok(())
    }

    /// Remove the given tuples, shifting later tuples down.
    pub fn erase_tuples(&mut self, indices: &[usize]) -> Result<()> {
        let mut sorted = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        if let Some(&last) = sorted.last() {
            if last >= self.tuple_count {
                return Err(self.out_of_range(last));
            }
        }
        if sorted.is_empty() {
            return Ok(());
        }
        let components = self.component_count();
        if let Some(buffer) = self.buffer.as_mut() {
            with_column!(buffer, col => col.erase(&sorted, components));
        }
        self.tuple_count -= sorted.len();
        Ok(())
    }

    /// Overwrite tuple `to` with the contents of tuple `from`.
    pub fn copy_tuple(&mut self, from: usize, to: usize) -> Result<()> {
        for index in [from, to] {
            if index >= self.tuple_count {
                return Err(self.out_of_range(index));
            }
        }
        let components = self.component_count();
        if let Some(buffer) = self.buffer.as_mut() {
            with_column!(buffer, col => col.copy_tuple(from, to, components));
        }
        Ok(())
    }

    /// Reset every element to its default value (lists are cleared).
    pub fn initialize_with_zeros(&mut self) {
        if let Some(buffer) = self.buffer.as_mut() {
            with_column!(buffer, col => col.zero());
        }
    }

    /// Set every element of a dense array to `value`.
    pub fn fill_with<T: Element>(&mut self, value: T) -> Result<()> {
        self.check_type::<T>()?;
        if self.is_neighbor_list() {
            return Err(self.layout_error(ArrayLayout::Dense));
        }
        if !self.is_allocated() {
            return self.allocate(value);
        }
        if let Some(Column::Dense(data)) = self.column_mut::<T>() {
            data.iter_mut().for_each(|v| *v = value);
        }
        Ok(())
    }

    /// Typed read-only view. `None` unless `T` matches exactly and the
    /// array is an allocated dense array.
    pub fn view<T: Element>(&self) -> Option<ArrayView<'_, T>> {
        match T::column(self.buffer.as_ref()?)? {
            Column::Dense(data) => Some(ArrayView {
                data,
                components: self.component_count(),
            }),
            Column::Lists(_) => None,
        }
    }

    /// Typed mutable view, with the same conditions as [`NamedArray::view`].
    pub fn view_mut<T: Element>(&mut self) -> Option<ArrayViewMut<'_, T>> {
        let components = self.component_count();
        match T::column_mut(self.buffer.as_mut()?)? {
            Column::Dense(data) => Some(ArrayViewMut { data, components }),
            Column::Lists(_) => None,
        }
    }

    /// Like [`NamedArray::view`] but fails with `ShapeMismatch` instead of
    /// returning `None`.
    pub fn try_view<T: Element>(&self) -> Result<ArrayView<'_, T>> {
        self.check_type::<T>()?;
        if self.is_neighbor_list() {
            return Err(self.layout_error(ArrayLayout::Dense));
        }
        self.view::<T>().ok_or_else(|| self.unallocated_error())
    }

    pub fn try_view_mut<T: Element>(&mut self) -> Result<ArrayViewMut<'_, T>> {
        self.check_type::<T>()?;
        if self.is_neighbor_list() {
            return Err(self.layout_error(ArrayLayout::Dense));
        }
        if !self.is_allocated() {
            return Err(self.unallocated_error());
        }
        let components = self.component_count();
        match self.buffer.as_mut().and_then(T::column_mut) {
            Some(Column::Dense(data)) => Ok(ArrayViewMut { data, components }),
            _ => Err(ArrayFlowError::StaleReference),
        }
    }

    // --- Neighbor lists ---

    /// All per-tuple lists, when this is an allocated neighbor list of `T`.
    pub fn lists<T: Element>(&self) -> Option<&[Vec<T>]> {
        match T::column(self.buffer.as_ref()?)? {
            Column::Lists(lists) => Some(lists),
            Column::Dense(_) => None,
        }
    }

    /// The list stored for tuple `index`.
    pub fn list<T: Element>(&self, index: usize) -> Option<&[T]> {
        self.lists::<T>()?.get(index).map(Vec::as_slice)
    }

    /// Replace the list stored for tuple `index`.
    pub fn set_list<T: Element>(&mut self, index: usize, values: Vec<T>) -> Result<()> {
        let lists = self.lists_mut::<T>()?;
        let len = lists.len();
        if let Some(slot) = lists.get_mut(index) {
            *slot = values;
            return Ok(());
        }
        Err(self.out_of_range_with(index, len))
    }

    /// Append `value` to the list stored for tuple `index`.
    pub fn push_to_list<T: Element>(&mut self, index: usize, value: T) -> Result<()> {
        let lists = self.lists_mut::<T>()?;
        let len = lists.len();
        if let Some(slot) = lists.get_mut(index) {
            slot.push(value);
            return Ok(());
        }
        Err(self.out_of_range_with(index, len))
    }

    fn lists_mut<T: Element>(&mut self) -> Result<&mut Vec<Vec<T>>> {
        self.check_type::<T>()?;
        if !self.is_neighbor_list() {
            return Err(self.layout_error(ArrayLayout::NeighborList));
        }
        if !self.is_allocated() {
            return Err(self.unallocated_error());
        }
        match self.column_mut::<T>() {
            Some(Column::Lists(lists)) => Ok(lists),
            _ => Err(ArrayFlowError::StaleReference),
        }
    }

    /// Full copy, including the buffer.
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }

    /// Same name, type and shape, without storage.
    pub fn structure_copy(&self) -> Self {
        Self {
            name: self.name.clone(),
            element_type: self.element_type,
            layout: self.layout,
            tuple_count: self.tuple_count,
            component_dims: self.component_dims.clone(),
            buffer: None,
        }
    }

    /// Same element type, layout and component dimensions.
    pub fn same_shape(&self, element_type: ElementType, layout: ArrayLayout, dims: &[usize]) -> bool {
        self.element_type == element_type && self.layout == layout && self.component_dims == dims
    }

    fn column_mut<T: Element>(&mut self) -> Option<&mut Column<T>> {
        T::column_mut(self.buffer.as_mut()?)
    }

    fn check_type<T: Element>(&self) -> Result<()> {
        if T::TYPE == self.element_type {
            Ok(())
        } else {
            Err(ArrayFlowError::ShapeMismatch {
                name: self.name.clone(),
                message: format!("stored type is {}, requested {}", self.element_type, T::TYPE),
            })
        }
    }

    fn layout_error(&self, wanted: ArrayLayout) -> ArrayFlowError {
        ArrayFlowError::ShapeMismatch {
            name: self.name.clone(),
            message: format!("layout is {:?}, requested {:?}", self.layout, wanted),
        }
    }

    fn unallocated_error(&self) -> ArrayFlowError {
        ArrayFlowError::Allocation {
            name: self.name.clone(),
            element_type: self.element_type,
            message: "array is declared but not allocated".to_string(),
        }
    }

    fn allocation_error(&self, message: String) -> ArrayFlowError {
        ArrayFlowError::Allocation {
            name: self.name.clone(),
            element_type: self.element_type,
            message,
        }
    }

    fn out_of_range(&self, index: usize) -> ArrayFlowError {
        self.out_of_range_with(index, self.tuple_count)
    }

    fn out_of_range_with(&self, index: usize, len: usize) -> ArrayFlowError {
        ArrayFlowError::OutOfRange {
            name: self.name.clone(),
            index,
            len,
        }
    }
}

/// Shared ownership of a registry array.
///
/// The attribute matrix holds the only strong handle; resolution hands out
/// weak references (see [`ArrayRef`](crate::store::ArrayRef)).
#[derive(Debug, Clone)]
pub struct SharedArray(Arc<RwLock<NamedArray>>);

impl SharedArray {
    pub fn new(array: NamedArray) -> Self {
        Self(Arc::new(RwLock::new(array)))
    }

    /// Lock for reading. A poisoned lock is recovered; the array itself
    /// stays structurally valid because every mutation is a single call.
    pub fn read(&self) -> RwLockReadGuard<'_, NamedArray> {
        self.0.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, NamedArray> {
        self.0.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn downgrade(&self) -> Weak<RwLock<NamedArray>> {
        Arc::downgrade(&self.0)
    }

    pub(crate) fn from_arc(inner: Arc<RwLock<NamedArray>>) -> Self {
        Self(inner)
    }

    pub fn ptr_eq(&self, other: &SharedArray) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Unshared copy of the array (clones the buffer).
    pub fn deep_copy(&self) -> NamedArray {
        self.read().deep_copy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_view() {
        let array = NamedArray::create::<f32>("Quats", 4, &[4]).unwrap();
        assert_eq!(array.element_type(), ElementType::Float32);
        assert_eq!(array.tuple_count(), 4);
        assert_eq!(array.component_count(), 4);
        assert_eq!(array.size_bytes(), 4 * 4 * 4);

        let view = array.view::<f32>().unwrap();
        assert_eq!(view.as_slice().len(), 16);
        assert!(view.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_view_never_reinterprets() {
        let array = NamedArray::create::<i32>("Ids", 3, &[1]).unwrap();
        assert!(array.view::<u32>().is_none());
        assert!(array.view::<f32>().is_none());
        assert!(array.view::<i32>().is_some());
        assert!(matches!(
            array.try_view::<u32>(),
            Err(ArrayFlowError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_resize_preserves_prefix() {
        let mut array = NamedArray::create_filled::<i32>("a", 3, &[2], 7).unwrap();
        array.view_mut::<i32>().unwrap().set_value(2, 1, 99);

        array.resize(5).unwrap();
        assert_eq!(array.tuple_count(), 5);
        assert_eq!(array.component_count(), 2);
        let view = array.view::<i32>().unwrap();
        assert_eq!(view.tuple(2), Some(&[7, 99][..]));
        assert_eq!(view.tuple(4), Some(&[0, 0][..]));

        array.resize(1).unwrap();
        assert_eq!(array.view::<i32>().unwrap().as_slice(), &[7, 7]);
    }

    #[test]
    fn test_declared_array_is_unallocated() {
        let mut array = NamedArray::declare(ElementType::UInt8, "Mask", 10, &[]);
        assert!(!array.is_allocated());
        assert_eq!(array.component_dims(), &[1]);
        assert_eq!(array.size_bytes(), 0);
        assert!(array.view::<u8>().is_none());

        array.resize(20).unwrap();
        assert_eq!(array.tuple_count(), 20);

        array.allocate(3u8).unwrap();
        assert_eq!(array.view::<u8>().unwrap().as_slice().len(), 20);
        assert!(array.allocate(1.0f64).is_err());
    }

    #[test]
    fn test_allocation_overflow_is_reported() {
        let err = NamedArray::create::<f64>("huge", usize::MAX / 2, &[4]).unwrap_err();
        assert!(matches!(err, ArrayFlowError::Allocation { .. }));
    }

    #[test]
    fn test_erase_tuples() {
        let mut array = NamedArray::create::<u16>("v", 5, &[1]).unwrap();
        array
            .view_mut::<u16>()
            .unwrap()
            .as_mut_slice()
            .copy_from_slice(&[10, 11, 12, 13, 14]);

        array.erase_tuples(&[3, 1, 3]).unwrap();
        assert_eq!(array.tuple_count(), 3);
        assert_eq!(array.view::<u16>().unwrap().as_slice(), &[10, 12, 14]);

        assert!(matches!(
            array.erase_tuples(&[3]),
            Err(ArrayFlowError::OutOfRange { index: 3, len: 3, .. })
        ));
    }

    #[test]
    fn test_copy_tuple() {
        let mut array = NamedArray::create::<i64>("v", 3, &[2]).unwrap();
        array
            .view_mut::<i64>()
            .unwrap()
            .as_mut_slice()
            .copy_from_slice(&[1, 2, 3, 4, 5, 6]);
        array.copy_tuple(2, 0).unwrap();
        assert_eq!(array.view::<i64>().unwrap().as_slice(), &[5, 6, 3, 4, 5, 6]);
        assert!(array.copy_tuple(0, 3).is_err());
    }

    #[test]
    fn test_fill_and_zero() {
        let mut array = NamedArray::create::<f64>("v", 4, &[1]).unwrap();
        array.fill_with(2.5f64).unwrap();
        assert!(array.view::<f64>().unwrap().as_slice().iter().all(|&v| v == 2.5));
        assert!(array.fill_with(1i32).is_err());

        array.initialize_with_zeros();
        assert!(array.view::<f64>().unwrap().as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_neighbor_list() {
        let mut lists = NamedArray::neighbor_list::<i32>("Neighbors", 3).unwrap();
        assert!(lists.is_neighbor_list());
        assert!(lists.view::<i32>().is_none());

        lists.set_list(1, vec![2, 3]).unwrap();
        lists.push_to_list(1, 4).unwrap();
        lists.push_to_list(2, 1).unwrap();
        assert_eq!(lists.list::<i32>(1), Some(&[2, 3, 4][..]));
        assert!(lists.set_list(5, vec![1]).is_err());
        assert!(lists.set_list::<u8>(0, vec![1]).is_err());

        lists.resize(5).unwrap();
        assert_eq!(lists.list::<i32>(1), Some(&[2, 3, 4][..]));
        assert_eq!(lists.list::<i32>(4), Some(&[][..]));

        lists.erase_tuples(&[0]).unwrap();
        assert_eq!(lists.list::<i32>(0), Some(&[2, 3, 4][..]));
        assert_eq!(lists.tuple_count(), 4);
    }

    #[test]
    fn test_structure_copy_drops_buffer() {
        let array = NamedArray::create_dyn(ElementType::Bool, "m", 8, &[1]).unwrap();
        let copy = array.structure_copy();
        assert!(!copy.is_allocated());
        assert!(copy.same_shape(ElementType::Bool, ArrayLayout::Dense, &[1]));
        assert_eq!(copy.tuple_count(), 8);
    }

    #[test]
    fn test_shared_array_weak_observes_drop() {
        let shared = SharedArray::new(NamedArray::create::<u8>("x", 1, &[1]).unwrap());
        let weak = shared.downgrade();
        assert!(weak.upgrade().is_some());
        drop(shared);
        assert!(weak.upgrade().is_none());
    }
}
