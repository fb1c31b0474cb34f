/// A contiguous slice of work, `[offset, offset + chunk_size)`.
///
/// Separate processes given disjoint windows never touch the same rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub chunk_size: u64,
}

impl Window {
    pub fn new(offset: u64, chunk_size: u64) -> Self {
        Self { offset, chunk_size }
    }

    /// Exclusive upper bound.
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.chunk_size)
    }

    pub fn contains(&self, index: u64) -> bool {
        index >= self.offset && index < self.end()
    }

    /// SQL `LIMIT` value.
    pub fn limit(&self) -> i64 {
        i64::try_from(self.chunk_size).unwrap_or(i64::MAX)
    }

    /// SQL `OFFSET` value.
    pub fn sql_offset(&self) -> i64 {
        i64::try_from(self.offset).unwrap_or(i64::MAX)
    }
}

impl Default for Window {
    fn default() -> Self {
        Self::new(0, 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_bounds() {
        let window = Window::new(10, 5);
        assert_eq!(window.end(), 15);
        assert!(!window.contains(9));
        assert!(window.contains(10));
        assert!(window.contains(14));
        assert!(!window.contains(15));
    }

    #[test]
    fn test_window_sql_values_saturate() {
        let window = Window::new(u64::MAX, u64::MAX);
        assert_eq!(window.end(), u64::MAX);
        assert_eq!(window.limit(), i64::MAX);
        assert_eq!(window.sql_offset(), i64::MAX);
    }
}
