//! Per-element attribute buffers.
//!
//! Every element kind with attributes (vertices, faces, regions) owns one
//! [`PropertyContainer`]. A container holds any number of named buffers, all of
//! which have exactly as many entries as there are elements of that kind.
//!
//! The set of value types is closed: `i32`, `f64`, `Vector3<f64>` and
//! `Point3<f64>`, all implementing [`PropertyValue`].

use std::fmt;
use std::marker::PhantomData;

use nalgebra::{Point3, Vector3};

use crate::error::{ElementKind, MeshError, Result};

/// Identifies a property within its container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// Vertex coordinates.
    Position,
    /// Region a face belongs to.
    Region,
    /// Face classification (see [`FaceType`](crate::mesh::FaceType)).
    FaceType,
    /// Burgers vector of a dislocation face or slip vector of a slip facet.
    BurgersVector,
    /// Lattice-space normal of a face.
    CrystallographicNormal,
    /// Crystal phase of a region.
    Phase,
    /// A user-defined property.
    User(String),
}

impl PropertyKey {
    /// Creates a user-defined key.
    pub fn user(name: impl Into<String>) -> Self {
        PropertyKey::User(name.into())
    }

    /// Returns true for the properties every mesh carries.
    pub fn is_standard(&self) -> bool {
        !matches!(self, PropertyKey::User(_))
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Position => f.write_str("Position"),
            PropertyKey::Region => f.write_str("Region"),
            PropertyKey::FaceType => f.write_str("Face Type"),
            PropertyKey::BurgersVector => f.write_str("Burgers Vector"),
            PropertyKey::CrystallographicNormal => f.write_str("Crystallographic Normal"),
            PropertyKey::Phase => f.write_str("Phase"),
            PropertyKey::User(name) => f.write_str(name),
        }
    }
}

/// Storage of one property buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyData {
    /// Integer values.
    Int(Vec<i32>),
    /// Scalar values.
    Float(Vec<f64>),
    /// Vector values.
    Vector(Vec<Vector3<f64>>),
    /// Point values.
    Point(Vec<Point3<f64>>),
}

macro_rules! for_each_buffer {
    ($data:expr, $buf:ident => $body:expr) => {
        match $data {
            PropertyData::Int($buf) => $body,
            PropertyData::Float($buf) => $body,
            PropertyData::Vector($buf) => $body,
            PropertyData::Point($buf) => $body,
        }
    };
}

impl PropertyData {
    /// Number of stored values.
    pub fn len(&self) -> usize {
        for_each_buffer!(self, buf => buf.len())
    }

    /// Returns true if no values are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the stored value type.
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyData::Int(_) => i32::TYPE_NAME,
            PropertyData::Float(_) => f64::TYPE_NAME,
            PropertyData::Vector(_) => Vector3::<f64>::TYPE_NAME,
            PropertyData::Point(_) => Point3::<f64>::TYPE_NAME,
        }
    }

    /// Grows or shrinks the buffer, filling new entries with zero.
    fn resize(&mut self, len: usize) {
        for_each_buffer!(self, buf => buf.resize(len, PropertyValue::zero()))
    }

    /// Duplicates the buffer contents `factor` times, block by block.
    fn replicate(&mut self, factor: usize) {
        for_each_buffer!(self, buf => {
            let block = buf.len();
            buf.reserve(block * factor.saturating_sub(1));
            for _ in 1..factor {
                buf.extend_from_within(..block);
            }
        })
    }

    fn swap_remove(&mut self, index: usize) {
        for_each_buffer!(self, buf => {
            buf.swap_remove(index);
        })
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for i32 {}
    impl Sealed for f64 {}
    impl Sealed for nalgebra::Vector3<f64> {}
    impl Sealed for nalgebra::Point3<f64> {}
}

/// A value type that can be stored in a property buffer.
pub trait PropertyValue: sealed::Sealed + Copy + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Human-readable type name used in error messages.
    const TYPE_NAME: &'static str;

    /// The value new elements are initialised with.
    fn zero() -> Self;

    /// Wraps a buffer of this type.
    fn into_data(values: Vec<Self>) -> PropertyData;

    /// Borrows the buffer if it stores this type.
    fn from_data(data: &PropertyData) -> Option<&[Self]>;

    /// Mutably borrows the buffer if it stores this type.
    fn from_data_mut(data: &mut PropertyData) -> Option<&mut [Self]>;
}

macro_rules! impl_property_value {
    ($ty:ty, $variant:ident, $name:literal, $zero:expr) => {
        impl PropertyValue for $ty {
            const TYPE_NAME: &'static str = $name;

            #[inline]
            fn zero() -> Self {
                $zero
            }

            fn into_data(values: Vec<Self>) -> PropertyData {
                PropertyData::$variant(values)
            }

            fn from_data(data: &PropertyData) -> Option<&[Self]> {
                match data {
                    PropertyData::$variant(buf) => Some(buf.as_slice()),
                    _ => None,
                }
            }

            fn from_data_mut(data: &mut PropertyData) -> Option<&mut [Self]> {
                match data {
                    PropertyData::$variant(buf) => Some(buf.as_mut_slice()),
                    _ => None,
                }
            }
        }
    };
}

impl_property_value!(i32, Int, "i32", 0);
impl_property_value!(f64, Float, "f64", 0.0);
impl_property_value!(Vector3<f64>, Vector, "Vector3<f64>", Vector3::zeros());
impl_property_value!(Point3<f64>, Point, "Point3<f64>", Point3::origin());

/// How a newly created property is initialised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitPolicy<T> {
    /// Fill with the zero value of the type.
    Zeroed,
    /// Fill with the given value.
    Fill(T),
}

impl<T> Default for InitPolicy<T> {
    fn default() -> Self {
        InitPolicy::Zeroed
    }
}

/// A typed reference to a property buffer.
///
/// Handles stay valid as long as the property is not re-created with another type.
pub struct PropertyHandle<T> {
    kind: ElementKind,
    key: PropertyKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PropertyHandle<T> {
    pub(crate) fn new(kind: ElementKind, key: PropertyKey) -> Self {
        Self {
            kind,
            key,
            _marker: PhantomData,
        }
    }

    /// Element kind the property belongs to.
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Key of the property.
    pub fn key(&self) -> &PropertyKey {
        &self.key
    }
}

impl<T> Clone for PropertyHandle<T> {
    fn clone(&self) -> Self {
        Self::new(self.kind, self.key.clone())
    }
}

impl<T> fmt::Debug for PropertyHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyHandle")
            .field("kind", &self.kind)
            .field("key", &self.key)
            .finish()
    }
}

/// The property buffers of one element kind.
#[derive(Debug, Clone)]
pub struct PropertyContainer {
    kind: ElementKind,
    len: usize,
    properties: Vec<(PropertyKey, PropertyData)>,
}

impl PropertyContainer {
    /// Creates an empty container for the given element kind.
    pub fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            len: 0,
            properties: Vec::new(),
        }
    }

    /// Element kind served by this container.
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Number of elements (the length of every buffer).
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns true if a property with the given key exists.
    pub fn contains(&self, key: &PropertyKey) -> bool {
        self.position(key).is_some()
    }

    /// Iterate over the keys of all properties.
    pub fn keys(&self) -> impl Iterator<Item = &PropertyKey> + '_ {
        self.properties.iter().map(|(key, _)| key)
    }

    /// Borrows the raw buffer of a property.
    pub fn data(&self, key: &PropertyKey) -> Option<&PropertyData> {
        self.position(key).map(|i| &self.properties[i].1)
    }

    fn position(&self, key: &PropertyKey) -> Option<usize> {
        self.properties.iter().position(|(k, _)| k == key)
    }

    fn not_found(&self, key: &PropertyKey) -> MeshError {
        MeshError::PropertyNotFound {
            kind: self.kind,
            key: key.to_string(),
        }
    }

    fn type_mismatch<T: PropertyValue>(&self, key: &PropertyKey, data: &PropertyData) -> MeshError {
        MeshError::PropertyTypeMismatch {
            kind: self.kind,
            key: key.to_string(),
            actual: data.type_name(),
            requested: T::TYPE_NAME,
        }
    }

    /// Creates a property, or returns the existing one.
    ///
    /// If a property with this key exists and `keep_existing` is set, its values
    /// are kept and a handle to it is returned. Otherwise the buffer is
    /// (re)initialised according to `init`.
    ///
    /// # Errors
    /// [`MeshError::PropertyTypeMismatch`] if an existing property stores another type
    /// and either `keep_existing` is set or the key is a standard property.
    pub fn create<T: PropertyValue>(
        &mut self,
        key: PropertyKey,
        keep_existing: bool,
        init: InitPolicy<T>,
    ) -> Result<PropertyHandle<T>> {
        let fill = match init {
            InitPolicy::Zeroed => T::zero(),
            InitPolicy::Fill(value) => value,
        };
        let data = T::into_data(vec![fill; self.len]);

        match self.position(&key) {
            Some(i) => {
                let existing = &self.properties[i].1;
                let same_type = T::from_data(existing).is_some();
                if !same_type && (keep_existing || key.is_standard()) {
                    return Err(self.type_mismatch::<T>(&key, existing));
                }
                if !keep_existing {
                    self.properties[i].1 = data;
                }
            }
            None => self.properties.push((key.clone(), data)),
        }
        Ok(PropertyHandle::new(self.kind, key))
    }

    /// Borrows the values of a property.
    pub fn values<T: PropertyValue>(&self, key: &PropertyKey) -> Result<&[T]> {
        let i = self.position(key).ok_or_else(|| self.not_found(key))?;
        let data = &self.properties[i].1;
        T::from_data(data).ok_or_else(|| self.type_mismatch::<T>(key, data))
    }

    /// Mutably borrows the values of a property.
    pub fn values_mut<T: PropertyValue>(&mut self, key: &PropertyKey) -> Result<&mut [T]> {
        let i = self.position(key).ok_or_else(|| self.not_found(key))?;
        if T::from_data(&self.properties[i].1).is_none() {
            return Err(self.type_mismatch::<T>(key, &self.properties[i].1));
        }
        let kind = self.kind;
        T::from_data_mut(&mut self.properties[i].1).ok_or_else(|| MeshError::PropertyNotFound {
            kind,
            key: key.to_string(),
        })
    }

    /// Reads one value.
    pub fn get<T: PropertyValue>(&self, key: &PropertyKey, index: usize) -> Result<T> {
        let values = self.values::<T>(key)?;
        values
            .get(index)
            .copied()
            .ok_or_else(|| MeshError::invalid_index(self.kind, index, self.len))
    }

    /// Writes one value.
    pub fn set<T: PropertyValue>(&mut self, key: &PropertyKey, index: usize, value: T) -> Result<()> {
        let (kind, len) = (self.kind, self.len);
        let slot = self
            .values_mut::<T>(key)?
            .get_mut(index)
            .ok_or_else(|| MeshError::invalid_index(kind, index, len))?;
        *slot = value;
        Ok(())
    }

    /// Changes the element count, zero-filling new entries in every buffer.
    pub(crate) fn resize(&mut self, len: usize) {
        for (_, data) in &mut self.properties {
            data.resize(len);
        }
        self.len = len;
    }

    /// Appends one zero-initialised element and returns its index.
    pub(crate) fn push(&mut self) -> usize {
        let index = self.len;
        self.resize(index + 1);
        index
    }

    /// Duplicates every buffer `factor` times.
    ///
    /// Block `k` holds a copy of the original values in their original order, so
    /// element `i` of block `k` ends up at index `k * len + i`.
    pub(crate) fn replicate(&mut self, factor: usize) {
        for (_, data) in &mut self.properties {
            data.replicate(factor);
        }
        self.len *= factor;
    }

    /// Removes an element by moving the last element into its slot.
    pub(crate) fn swap_remove(&mut self, index: usize) {
        for (_, data) in &mut self.properties {
            data.swap_remove(index);
        }
        self.len -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(len: usize) -> PropertyContainer {
        let mut c = PropertyContainer::new(ElementKind::Face);
        c.resize(len);
        c
    }

    #[test]
    fn test_create_and_access() {
        let mut c = container(3);
        let handle = c
            .create::<f64>(PropertyKey::user("Energy"), false, InitPolicy::Fill(1.5))
            .unwrap();
        assert_eq!(handle.kind(), ElementKind::Face);
        assert_eq!(c.values::<f64>(handle.key()).unwrap(), &[1.5, 1.5, 1.5]);

        c.set(handle.key(), 1, 4.0).unwrap();
        assert_eq!(c.get::<f64>(handle.key(), 1).unwrap(), 4.0);
        assert!(matches!(
            c.get::<f64>(handle.key(), 3),
            Err(MeshError::InvalidIndex { index: 3, count: 3, .. })
        ));
    }

    #[test]
    fn test_values_mut_writes_through() {
        let mut c = container(3);
        let key = PropertyKey::user("Stress");
        c.create::<Vector3<f64>>(key.clone(), false, InitPolicy::Zeroed)
            .unwrap();
        for (i, v) in c.values_mut::<Vector3<f64>>(&key).unwrap().iter_mut().enumerate() {
            *v = Vector3::repeat(i as f64);
        }
        assert_eq!(c.get::<Vector3<f64>>(&key, 2).unwrap(), Vector3::repeat(2.0));
        assert!(matches!(
            c.values_mut::<i32>(&key),
            Err(MeshError::PropertyTypeMismatch { .. })
        ));
        assert!(matches!(
            c.values_mut::<i32>(&PropertyKey::user("Missing")),
            Err(MeshError::PropertyNotFound { .. })
        ));
    }

    #[test]
    fn test_keep_existing() {
        let mut c = container(2);
        let key = PropertyKey::user("Tag");
        c.create::<i32>(key.clone(), false, InitPolicy::Fill(7)).unwrap();
        c.create::<i32>(key.clone(), true, InitPolicy::Zeroed).unwrap();
        assert_eq!(c.values::<i32>(&key).unwrap(), &[7, 7]);

        c.create::<i32>(key.clone(), false, InitPolicy::Zeroed).unwrap();
        assert_eq!(c.values::<i32>(&key).unwrap(), &[0, 0]);
    }

    #[test]
    fn test_type_mismatch() {
        let mut c = container(1);
        c.create::<i32>(PropertyKey::Region, false, InitPolicy::Zeroed)
            .unwrap();
        let err = c.values::<f64>(&PropertyKey::Region).unwrap_err();
        assert_eq!(
            err,
            MeshError::PropertyTypeMismatch {
                kind: ElementKind::Face,
                key: "Region".into(),
                actual: "i32",
                requested: "f64",
            }
        );
        assert!(c
            .create::<f64>(PropertyKey::Region, false, InitPolicy::Zeroed)
            .is_err());

        // User properties may be re-created with another type.
        let key = PropertyKey::user("Scratch");
        c.create::<i32>(key.clone(), false, InitPolicy::Zeroed).unwrap();
        c.create::<f64>(key.clone(), false, InitPolicy::Zeroed).unwrap();
        assert_eq!(c.values::<f64>(&key).unwrap(), &[0.0]);
    }

    #[test]
    fn test_not_found() {
        let c = container(1);
        assert!(matches!(
            c.get::<i32>(&PropertyKey::Phase, 0),
            Err(MeshError::PropertyNotFound { .. })
        ));
    }

    #[test]
    fn test_replicate_preserves_block_order() {
        let mut c = container(0);
        c.create::<i32>(PropertyKey::Region, false, InitPolicy::Zeroed)
            .unwrap();
        for value in [3, 5] {
            let i = c.push();
            c.set(&PropertyKey::Region, i, value).unwrap();
        }
        c.replicate(3);
        assert_eq!(c.len(), 6);
        assert_eq!(
            c.values::<i32>(&PropertyKey::Region).unwrap(),
            &[3, 5, 3, 5, 3, 5]
        );
    }

    #[test]
    fn test_swap_remove() {
        let mut c = container(0);
        c.create::<i32>(PropertyKey::Region, false, InitPolicy::Zeroed)
            .unwrap();
        for value in [1, 2, 3] {
            let i = c.push();
            c.set(&PropertyKey::Region, i, value).unwrap();
        }
        c.swap_remove(0);
        assert_eq!(c.values::<i32>(&PropertyKey::Region).unwrap(), &[3, 2]);
    }
}
