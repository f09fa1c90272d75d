//! Zero-one-many value container used for configuration values.
//!
//! A [`ValueSet`] is absent, a single scalar, or an ordered list of at least
//! two scalars. A one-element list is never observable: it collapses to a
//! scalar on construction and after [`ValueSet::remove`].

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Repr<T> {
    Absent,
    Single(T),
    List(Vec<T>),
}

impl<T> Default for Repr<T> {
    fn default() -> Self {
        Repr::Absent
    }
}

/// Borrowed view of a present [`ValueSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape<'a, T> {
    Single(&'a T),
    List(&'a [T]),
}

/// Absent, one, or many scalar values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSet<T> {
    repr: Repr<T>,
}

impl<T> Default for ValueSet<T> {
    fn default() -> Self {
        Self { repr: Repr::Absent }
    }
}

impl<T> ValueSet<T> {
    /// An absent value.
    pub fn new() -> Self {
        Self::default()
    }

    /// A single scalar value.
    pub fn single(item: T) -> Self {
        Self {
            repr: Repr::Single(item),
        }
    }

    /// Builds from a list, collapsing zero and one element lists.
    pub fn from_vec(mut items: Vec<T>) -> Self {
        let repr = match items.len() {
            0 => Repr::Absent,
            1 => match items.pop() {
                Some(item) => Repr::Single(item),
                None => Repr::Absent,
            },
            _ => Repr::List(items),
        };
        Self { repr }
    }

    /// Current value: `None`, a scalar, or a list of two or more.
    pub fn get(&self) -> Option<Shape<'_, T>> {
        match &self.repr {
            Repr::Absent => None,
            Repr::Single(item) => Some(Shape::Single(item)),
            Repr::List(items) => Some(Shape::List(items)),
        }
    }

    /// The scalar, when exactly one value is present.
    pub fn as_single(&self) -> Option<&T> {
        match &self.repr {
            Repr::Single(item) => Some(item),
            _ => None,
        }
    }

    /// The first value, if any.
    pub fn first(&self) -> Option<&T> {
        self.iter().next()
    }

    /// Adds an item: absent → scalar → list, appending to an existing list.
    pub fn add(&mut self, item: T) {
        self.repr = match std::mem::take(&mut self.repr) {
            Repr::Absent => Repr::Single(item),
            Repr::Single(first) => Repr::List(vec![first, item]),
            Repr::List(mut items) => {
                items.push(item);
                Repr::List(items)
            }
        };
    }

    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Absent => 0,
            Repr::Single(_) => 1,
            Repr::List(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.repr, Repr::Absent)
    }

    /// Boolean coercion: `true` unless absent.
    pub fn is_present(&self) -> bool {
        !self.is_empty()
    }

    /// Iterates values in insertion order. Each call starts a fresh pass.
    pub fn iter(&self) -> Iter<'_, T> {
        let slice: &[T] = match &self.repr {
            Repr::Absent => &[],
            Repr::Single(item) => std::slice::from_ref(item),
            Repr::List(items) => items,
        };
        Iter {
            inner: slice.iter(),
        }
    }

    /// Consumes the set into a plain vector.
    pub fn into_vec(self) -> Vec<T> {
        match self.repr {
            Repr::Absent => Vec::new(),
            Repr::Single(item) => vec![item],
            Repr::List(items) => items,
        }
    }
}

impl<T: PartialEq> ValueSet<T> {
    /// Removes the first item equal to `item`.
    ///
    /// A list left with one element collapses to a scalar. Removing from an
    /// absent set, or a scalar that does not match, does nothing.
    pub fn remove(&mut self, item: &T) {
        let remaining = match std::mem::take(&mut self.repr) {
            Repr::Single(current) if current != *item => vec![current],
            Repr::Single(_) | Repr::Absent => Vec::new(),
            Repr::List(mut items) => {
                if let Some(pos) = items.iter().position(|v| v == item) {
                    items.remove(pos);
                }
                items
            }
        };
        *self = Self::from_vec(remaining);
    }

    pub fn contains(&self, item: &T) -> bool {
        self.iter().any(|v| v == item)
    }
}

/// Iterator over the values of a [`ValueSet`].
#[derive(Debug, Clone)]
pub struct Iter<'a, T> {
    inner: std::slice::Iter<'a, T>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<'a, T> IntoIterator for &'a ValueSet<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> IntoIterator for ValueSet<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_vec().into_iter()
    }
}

impl<T> FromIterator<T> for ValueSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<T> From<Vec<T>> for ValueSet<T> {
    fn from(items: Vec<T>) -> Self {
        Self::from_vec(items)
    }
}

impl<T> From<Option<T>> for ValueSet<T> {
    fn from(item: Option<T>) -> Self {
        match item {
            Some(item) => Self::single(item),
            None => Self::new(),
        }
    }
}

impl<T: fmt::Display> fmt::Display for ValueSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            None => f.write_str("<none>"),
            Some(Shape::Single(item)) => item.fmt(f),
            Some(Shape::List(items)) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt(f)?;
                }
                f.write_str("]")
            }
        }
    }
}
