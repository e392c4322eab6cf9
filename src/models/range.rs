//! Single byte-range requests (`Range: bytes=...`).

/// A range as requested by the client, before the object size is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=start-` or `bytes=start-end` (inclusive end).
    From { start: u64, end: Option<u64> },
    /// `bytes=-n`: the last `n` bytes.
    Suffix(u64),
}

/// A range clamped against the object's actual size. `end` is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start: u64,
    pub end: u64,
    pub total_size: u64,
}

impl ResolvedRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total_size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeNotSatisfiable {
    pub total_size: u64,
}

impl ByteRange {
    /// Parse a `Range` header value. Multi-range and malformed values yield
    /// `None`, in which case the whole object is served.
    pub fn parse(header: &str) -> Option<Self> {
        let ranges = header.trim().strip_prefix("bytes=")?.trim();
        if ranges.contains(',') {
            return None;
        }
        let (start, end) = ranges.split_once('-')?;
        let (start, end) = (start.trim(), end.trim());

        if start.is_empty() {
            return end.parse().ok().map(Self::Suffix);
        }
        let start = start.parse().ok()?;
        let end = if end.is_empty() {
            None
        } else {
            let end: u64 = end.parse().ok()?;
            if end < start {
                return None;
            }
            Some(end)
        };
        Some(Self::From { start, end })
    }

    pub fn resolve(&self, total_size: u64) -> Result<ResolvedRange, RangeNotSatisfiable> {
        let unsatisfiable = RangeNotSatisfiable { total_size };
        if total_size == 0 {
            return Err(unsatisfiable);
        }
        let last = total_size - 1;
        let (start, end) = match *self {
            Self::From { start, end } => {
                if start > last {
                    return Err(unsatisfiable);
                }
                (start, end.map_or(last, |end| end.min(last)))
            }
            Self::Suffix(0) => return Err(unsatisfiable),
            Self::Suffix(n) => (total_size.saturating_sub(n), last),
        };
        Ok(ResolvedRange {
            start,
            end,
            total_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_three_forms() {
        assert_eq!(
            ByteRange::parse("bytes=0-99"),
            Some(ByteRange::From {
                start: 0,
                end: Some(99)
            })
        );
        assert_eq!(
            ByteRange::parse("bytes=100-"),
            Some(ByteRange::From {
                start: 100,
                end: None
            })
        );
        assert_eq!(ByteRange::parse("bytes=-20"), Some(ByteRange::Suffix(20)));
    }

    #[test]
    fn ignores_what_it_cannot_serve() {
        for header in ["items=0-1", "bytes=0-1,5-6", "bytes=9-2", "bytes=a-b", "bytes="] {
            assert_eq!(ByteRange::parse(header), None, "{header}");
        }
    }

    #[test]
    fn resolve_clamps_to_object_size() {
        let r = ByteRange::parse("bytes=5-1000").unwrap().resolve(10).unwrap();
        assert_eq!((r.start, r.end, r.len()), (5, 9, 5));
        assert_eq!(r.content_range(), "bytes 5-9/10");

        let r = ByteRange::Suffix(30).resolve(10).unwrap();
        assert_eq!((r.start, r.end), (0, 9));
    }

    #[test]
    fn out_of_bounds_is_unsatisfiable() {
        let from = ByteRange::From {
            start: 10,
            end: None,
        };
        assert_eq!(from.resolve(10), Err(RangeNotSatisfiable { total_size: 10 }));
        assert!(ByteRange::Suffix(0).resolve(10).is_err());
        assert!(ByteRange::Suffix(5).resolve(0).is_err());
    }
}
