//! Identifier types for the fabric domain.
//!
//! Ports, inputs, spines, and blocks are deliberately kept as distinct types so the
//! compiler rejects accidental mixing (e.g. passing a spine index where a block index
//! was expected). `0` is a reserved sentinel in the wire format for "disconnected" /
//! "free"; internally that is represented as `Option::None` rather than threaded
//! around as a magic number, with the sentinel re-introduced only at the JSON
//! boundary (see [`crate::json`]).

use std::num::NonZeroU32;

/// A 1-based output (or ingress) port identifier.
///
/// Port `0` is never a valid `PortId`; "unused" is represented by the absence of an
/// entry rather than by this type.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct PortId(NonZeroU32);

impl PortId {
    /// Builds a `PortId` from a 1-based port number, or `None` if `raw` is zero.
    #[must_use]
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// Returns the raw 1-based port number.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// Returns the 0-based block index containing this port, given radix `n`.
    #[must_use]
    pub fn block(self, n: u32) -> BlockId {
        BlockId(((self.get() - 1) / n) as usize)
    }
}

impl std::fmt::Display for PortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// An input identifier.
///
/// Input `0` means "disconnected" in the wire format; that state is represented as
/// `Option<InputId>::None` everywhere in this crate, so `InputId` itself is always a
/// genuine, connected input.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct InputId(NonZeroU32);

impl InputId {
    /// Builds an `InputId` from a raw id, or `None` if `raw` is zero.
    #[must_use]
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// Returns the raw input id.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// Returns the 0-based ingress block this input belongs to, given radix `n`.
    #[must_use]
    pub fn block(self, n: u32) -> BlockId {
        BlockId(((self.get() - 1) / n) as usize)
    }
}

impl std::fmt::Display for InputId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// A 0-based ingress- or egress-block index, in `0..N`.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct BlockId(pub usize);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 0-based spine index, in `0..N`.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SpineId(pub usize);

impl std::fmt::Display for SpineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
