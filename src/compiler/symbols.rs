use core::fmt;

use lasso::{Key, Rodeo, Spur};

/// Index of a variable's storage slot. Slots are handed out densely from 0 in the
/// order names are first declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u32);

impl SlotId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Recover a slot id from a raw bytecode cell
    pub fn from_raw(raw: i64) -> Option<Self> {
        u32::try_from(raw).ok().map(Self)
    }

    fn from_key(key: Spur) -> Self {
        // Spur hands out keys densely from zero and never exceeds u32
        Self(key.into_usize() as u32)
    }
}

impl From<SlotId> for i64 {
    fn from(slot: SlotId) -> Self {
        i64::from(slot.0)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("no slot left for variable `{0}`")]
pub struct SymbolLimit(pub Box<str>);

/// Variable names and the slots they were assigned
#[derive(Debug, Default)]
pub struct SymbolTable {
    rodeo: Rodeo,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot for `name`, assigning the next free one if the name is new.
    pub fn declare(&mut self, name: &str) -> Result<SlotId, SymbolLimit> {
        let key = self
            .rodeo
            .try_get_or_intern(name)
            .map_err(|_| SymbolLimit(Box::from(name)))?;
        Ok(SlotId::from_key(key))
    }

    pub fn slot(&self, name: &str) -> Option<SlotId> {
        self.rodeo.get(name).map(SlotId::from_key)
    }

    pub fn len(&self) -> usize {
        self.rodeo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rodeo.is_empty()
    }

    /// Every declared name, in slot order
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &str)> + '_ {
        self.rodeo
            .iter()
            .map(|(key, name)| (SlotId::from_key(key), name))
    }
}
