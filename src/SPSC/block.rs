// A fixed-size block moving through the pipeline.

/// Owned block of acquired data.
///
/// Not `Clone`: a block is held by exactly one of the acquisition call, the
/// hand-off queue, or the in-flight send, and moves between them by value.
pub struct Buffer {
    data: Box<[u8]>,
}

impl Buffer {
    /// A zero-filled block of `len` bytes.
    pub fn zeroed(len: usize) -> Self {
        Self {
            data: vec![0u8; len].into_boxed_slice(),
        }
    }

    /// A block filled with `marker`, used by synthetic sources and tests.
    pub fn filled(len: usize, marker: u8) -> Self {
        Self {
            data: vec![marker; len].into_boxed_slice(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data.into_vec()
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(v: Vec<u8>) -> Self {
        Self {
            data: v.into_boxed_slice(),
        }
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
