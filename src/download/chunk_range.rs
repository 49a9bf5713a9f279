use std::collections::Bound;
use std::ops::RangeBounds;
use crate::download::error::DownloadError;

/// Inclusive byte range `start..=end` of the remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub start: u64,
    pub end: u64,
}

impl ChunkRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        (self.end - self.start) + 1
    }

    pub fn from_len(start: u64, len: u64) -> Self {
        Self { start, end: start + len - 1 }
    }

    pub fn to_range_header(&self) -> Result<headers::Range, DownloadError> {
        headers::Range::bytes(self).map_err(|_| DownloadError::InvalidRange(*self))
    }
}

/// 为 ChunkRange 实现范围 trait: start..=end
impl<'a> RangeBounds<u64> for &'a ChunkRange {
    fn start_bound(&self) -> Bound<&u64> {
        Bound::Included(&self.start)
    }

    fn end_bound(&self) -> Bound<&u64> {
        Bound::Included(&self.end)
    }
}

#[cfg(test)]
mod tests {
    use headers::HeaderMapExt;
    use reqwest::header::{HeaderMap, RANGE};
    use super::*;

    #[test]
    fn should_be_inclusive() {
        let range = ChunkRange::from_len(100, 100);
        assert_eq!(range, ChunkRange::new(100, 199));
        assert_eq!(range.len(), 100);
        assert_eq!(ChunkRange::new(7, 7).len(), 1);
    }

    #[test]
    fn should_render_range_header() {
        let mut map = HeaderMap::new();
        map.typed_insert(ChunkRange::new(0, 8191).to_range_header().unwrap());
        assert_eq!(map.get(RANGE).unwrap(), "bytes=0-8191");
    }
}
