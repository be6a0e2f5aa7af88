use std::ops::RangeBounds;

use bytes::Bytes;

/// A compressed frame handed over by the protocol layer.
///
/// The bytes are never copied: the frame holds a reference on whatever
/// owns the storage (usually the protocol message) and that owner is
/// released exactly once, when the last holder drops its reference.
#[derive(Clone, Debug, Default)]
pub struct CompressedFrame {
    data: Bytes,
}

impl CompressedFrame {
    /// Wraps `owner` without copying. `owner` is dropped once the pipeline
    /// and every caller are done with the frame.
    pub fn from_owner<T>(owner: T) -> Self
    where
        T: AsRef<[u8]> + Send + 'static,
    {
        Self {
            data: Bytes::from_owner(owner),
        }
    }

    pub fn from_static(data: &'static [u8]) -> Self {
        Self {
            data: Bytes::from_static(data),
        }
    }

    /// Restricts the frame to `range` of its bytes, keeping the same owner.
    pub fn slice(&self, range: impl RangeBounds<usize>) -> Self {
        Self {
            data: self.data.slice(range),
        }
    }

    /// Takes another reference on the same storage.
    pub fn retain(&self) -> Self {
        self.clone()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl From<Bytes> for CompressedFrame {
    fn from(data: Bytes) -> Self {
        Self { data }
    }
}

impl From<Vec<u8>> for CompressedFrame {
    fn from(data: Vec<u8>) -> Self {
        Self {
            data: Bytes::from(data),
        }
    }
}
