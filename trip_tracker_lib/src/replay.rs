use crate::coordinate::Coordinate;

/// Walks a recorded path one point at a time. Exhausted cursors stay exhausted.
#[derive(Debug, Clone)]
pub struct ReplayCursor {
    path: Vec<Coordinate>,
    index: usize,
}

impl ReplayCursor {
    pub fn new(path: Vec<Coordinate>) -> Self {
        Self { path, index: 0 }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.index >= self.path.len()
    }
}

impl Iterator for ReplayCursor {
    type Item = Coordinate;

    fn next(&mut self) -> Option<Self::Item> {
        let position = self.path.get(self.index).copied()?;
        self.index += 1;
        Some(position)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.path.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}
