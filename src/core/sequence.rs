/// Reference bases for one chromosome, uppercased, shared read-only between workers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromosomeSequence {
    name: String,
    bases: Vec<u8>,
}

impl ChromosomeSequence {
    pub fn new(name: impl Into<String>, bases: impl Into<Vec<u8>>) -> Self {
        let mut bases = bases.into();
        bases.make_ascii_uppercase();
        Self {
            name: name.into(),
            bases,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.bases.len() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Base at a 1-based position
    #[must_use]
    pub fn base_at(&self, position: u64) -> Option<u8> {
        let index = usize::try_from(position.checked_sub(1)?).ok()?;
        self.bases.get(index).copied()
    }

    /// Bases over the closed 1-based interval `start..=end`
    #[must_use]
    pub fn slice(&self, start: u64, end: u64) -> Option<&[u8]> {
        if start == 0 || end < start {
            return None;
        }
        let from = usize::try_from(start - 1).ok()?;
        let to = usize::try_from(end).ok()?;
        self.bases.get(from..to)
    }

    /// Trinucleotide centred on a position, padded with `N` at chromosome ends
    #[must_use]
    pub fn trinucleotide(&self, position: u64) -> [u8; 3] {
        let before = position
            .checked_sub(1)
            .and_then(|p| self.base_at(p))
            .unwrap_or(b'N');
        let at = self.base_at(position).unwrap_or(b'N');
        let after = self.base_at(position + 1).unwrap_or(b'N');
        [before, at, after]
    }
}
