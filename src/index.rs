use std::collections::HashSet;

/// A set of fully qualified class names, used to narrow the candidate
/// classes a pointcut could possibly match before any per-class matching
/// runs.
///
/// The index keeps insertion order until [`sort`](Self::sort) is called;
/// sorting enables range-scan prefix filtering, which filters built from
/// class-name patterns use to discard whole namespaces in one step.
#[derive(Debug, Clone, Default)]
pub struct ClassNameIndex {
    class_names: Vec<String>,
    sorted: bool,
}

impl ClassNameIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an index from an iterator of names, deduplicating while
    /// keeping first-occurrence order.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = Self::new();
        index.set_class_names(names.into_iter().map(Into::into).collect());
        index
    }

    /// Replaces the contents of the index, deduplicating the input.
    pub fn set_class_names(&mut self, names: Vec<String>) {
        let mut seen = HashSet::with_capacity(names.len());
        self.class_names = names
            .into_iter()
            .filter(|name| seen.insert(name.clone()))
            .collect();
        self.sorted = false;
    }

    /// The class names in their current order.
    #[must_use]
    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.class_names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.class_names.is_empty()
    }

    /// Whether the index currently holds the given name.
    #[must_use]
    pub fn contains(&self, class_name: &str) -> bool {
        if self.sorted {
            self.class_names
                .binary_search_by(|n| n.as_str().cmp(class_name))
                .is_ok()
        } else {
            self.class_names.iter().any(|n| n == class_name)
        }
    }

    /// Returns a new index holding the names present in both indexes,
    /// in this index's order.
    #[must_use]
    pub fn intersect(&self, other: &ClassNameIndex) -> ClassNameIndex {
        let other_names: HashSet<&str> = other.class_names.iter().map(String::as_str).collect();
        ClassNameIndex {
            class_names: self
                .class_names
                .iter()
                .filter(|n| other_names.contains(n.as_str()))
                .cloned()
                .collect(),
            // A filtered subsequence of a sorted vector stays sorted
            sorted: self.sorted,
        }
    }

    /// In-place variant of [`intersect`](Self::intersect).
    pub fn apply_intersect(&mut self, other: &ClassNameIndex) {
        *self = self.intersect(other);
    }

    /// Returns a new index holding the names present in either index.
    #[must_use]
    pub fn union(&self, other: &ClassNameIndex) -> ClassNameIndex {
        let own: HashSet<&str> = self.class_names.iter().map(String::as_str).collect();
        let mut class_names = self.class_names.clone();
        class_names.extend(
            other
                .class_names
                .iter()
                .filter(|n| !own.contains(n.as_str()))
                .cloned(),
        );
        ClassNameIndex {
            class_names,
            sorted: false,
        }
    }

    /// In-place variant of [`union`](Self::union).
    pub fn apply_union(&mut self, other: &ClassNameIndex) {
        *self = self.union(other);
    }

    /// Sorts and deduplicates the index, enabling range-scan prefix
    /// filtering.
    pub fn sort(&mut self) {
        self.class_names.sort_unstable();
        self.class_names.dedup();
        self.sorted = true;
    }

    /// All names starting with `prefix`. Uses a binary-search range scan
    /// when the index is sorted and a linear scan otherwise.
    #[must_use]
    pub fn filter_by_prefix(&self, prefix: &str) -> ClassNameIndex {
        if self.sorted {
            let start = self
                .class_names
                .partition_point(|n| n.as_str() < prefix);
            let matching: Vec<String> = self.class_names[start..]
                .iter()
                .take_while(|n| n.starts_with(prefix))
                .cloned()
                .collect();
            ClassNameIndex {
                class_names: matching,
                sorted: true,
            }
        } else {
            ClassNameIndex {
                class_names: self
                    .class_names
                    .iter()
                    .filter(|n| n.starts_with(prefix))
                    .cloned()
                    .collect(),
                sorted: false,
            }
        }
    }
}

/// Set equality: order and sortedness are irrelevant.
impl PartialEq for ClassNameIndex {
    fn eq(&self, other: &Self) -> bool {
        let a: HashSet<&str> = self.class_names.iter().map(String::as_str).collect();
        let b: HashSet<&str> = other.class_names.iter().map(String::as_str).collect();
        a == b
    }
}

impl Eq for ClassNameIndex {}

impl<S: Into<String>> FromIterator<S> for ClassNameIndex {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_names(iter)
    }
}
