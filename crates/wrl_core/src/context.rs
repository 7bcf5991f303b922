//! Ordered, mergeable accumulator of handler output.

/// An ordered sequence of contributions produced by handlers.
///
/// [`merge`](Self::merge) appends the other context after this one, so
/// merging is associative (`(a + b) + c == a + (b + c)`) but not
/// commutative, and the empty context is the identity. Merging children in
/// declaration order therefore yields output in document order no matter
/// which thread produced which part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionContext<T> {
    contributions: Vec<T>,
}

impl<T> ConversionContext<T> {
    pub fn new() -> Self {
        Self {
            contributions: Vec::new(),
        }
    }

    /// A context holding exactly one contribution.
    pub fn single(contribution: T) -> Self {
        Self {
            contributions: vec![contribution],
        }
    }

    pub fn push(&mut self, contribution: T) {
        self.contributions.push(contribution);
    }

    /// Append `other`'s contributions after this context's own.
    pub fn merge(&mut self, mut other: ConversionContext<T>) {
        if self.contributions.is_empty() {
            self.contributions = other.contributions;
        } else {
            self.contributions.append(&mut other.contributions);
        }
    }

    /// By-value form of [`merge`](Self::merge).
    pub fn merged(mut self, other: ConversionContext<T>) -> Self {
        self.merge(other);
        self
    }

    pub fn len(&self) -> usize {
        self.contributions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributions.is_empty()
    }

    pub fn contributions(&self) -> &[T] {
        &self.contributions
    }

    /// Mutable access, for handlers that post-process their children's output.
    pub fn contributions_mut(&mut self) -> &mut [T] {
        &mut self.contributions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.contributions.iter()
    }

    pub fn into_contributions(self) -> Vec<T> {
        self.contributions
    }
}

impl<T> Default for ConversionContext<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for ConversionContext<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            contributions: iter.into_iter().collect(),
        }
    }
}

impl<T> Extend<T> for ConversionContext<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.contributions.extend(iter);
    }
}

impl<T> IntoIterator for ConversionContext<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.contributions.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a ConversionContext<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.contributions.iter()
    }
}
