//! Diff modes.

use bitflags::bitflags;

bitflags! {
    /// What [`diff`](super::diff) is allowed to emit.
    ///
    /// ```rust
    /// use oxide_ddl::migrate::Mode;
    ///
    /// let mode = Mode::CREATE_MISSING | Mode::UPDATE_EXISTING;
    /// assert!(mode.contains(Mode::UPDATE_EXISTING));
    /// assert!(!mode.contains(Mode::DROP_EXTRANEOUS));
    /// assert_eq!(Mode::SYNC.bits(), 7);
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Mode: u8 {
        /// Create entities present in want and absent from got.
        const CREATE_MISSING = 1;
        /// Alter or replace entities that differ.
        const UPDATE_EXISTING = 2;
        /// Drop entities present in got and absent from want.
        const DROP_EXTRANEOUS = 4;
        /// Attach `CASCADE` to drops, where the dialect allows it.
        const DROP_CASCADE = 8;

        /// Create, update and drop.
        const SYNC = Self::CREATE_MISSING.bits()
            | Self::UPDATE_EXISTING.bits()
            | Self::DROP_EXTRANEOUS.bits();
    }
}

impl Default for Mode {
    fn default() -> Self {
        Self::CREATE_MISSING | Self::UPDATE_EXISTING
    }
}

impl Mode {
    pub(crate) fn creates(self) -> bool {
        self.contains(Self::CREATE_MISSING)
    }

    pub(crate) fn updates(self) -> bool {
        self.contains(Self::UPDATE_EXISTING)
    }

    pub(crate) fn drops(self) -> bool {
        self.contains(Self::DROP_EXTRANEOUS)
    }

    pub(crate) fn cascades(self) -> bool {
        self.contains(Self::DROP_CASCADE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_values() {
        assert_eq!(Mode::CREATE_MISSING.bits(), 1);
        assert_eq!(Mode::UPDATE_EXISTING.bits(), 2);
        assert_eq!(Mode::DROP_EXTRANEOUS.bits(), 4);
        assert_eq!(Mode::DROP_CASCADE.bits(), 8);
        assert_eq!(Mode::from_bits(15), Some(Mode::SYNC | Mode::DROP_CASCADE));
        assert_eq!(Mode::from_bits(16), None);
    }

    #[test]
    fn test_default_is_additive() {
        let mode = Mode::default();
        assert!(mode.creates() && mode.updates());
        assert!(!mode.drops() && !mode.cascades());
    }
}
