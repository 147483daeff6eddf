//! Per-call codec settings
//!
//! An [`NdrContext`] is the negotiated byte order plus the ceilings a reader
//! enforces on untrusted input. It is `Copy`; every writer and reader keeps
//! its own.

/// Default ceiling on the element count of any single conformant array
pub const DEFAULT_MAX_ELEMENTS: usize = 16 * 1024 * 1024;

/// Default ceiling on pointer nesting (pointer inside a pointed-to body)
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Byte order and decode limits for one stub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdrContext {
    /// Little-endian integers and floats (the NDR default)
    pub little_endian: bool,
    /// Largest element count a reader accepts for one array or string
    pub max_elements: usize,
    /// Deepest chain of pointer bodies a reader follows
    pub max_depth: usize,
}

impl NdrContext {
    /// Little-endian with the default limits
    pub const fn new() -> Self {
        Self {
            little_endian: true,
            max_elements: DEFAULT_MAX_ELEMENTS,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// For peers whose data representation label says big-endian
    pub const fn big_endian() -> Self {
        Self::new().with_byte_order(false)
    }

    pub const fn with_byte_order(mut self, little_endian: bool) -> Self {
        self.little_endian = little_endian;
        self
    }

    /// Set the per-array element ceiling
    pub const fn with_max_elements(mut self, max_elements: usize) -> Self {
        self.max_elements = max_elements;
        self
    }

    /// Set the pointer nesting ceiling
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Zero bytes needed to bring `position` to a multiple of `alignment`
    #[inline]
    pub fn align_padding(position: usize, alignment: usize) -> usize {
        if alignment <= 1 {
            return 0;
        }
        match position % alignment {
            0 => 0,
            remainder => alignment - remainder,
        }
    }
}

impl Default for NdrContext {
    fn default() -> Self {
        Self::new()
    }
}
