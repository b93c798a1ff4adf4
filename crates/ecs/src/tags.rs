use std::ops::BitOr;

/// Set of up to 32 marker tags attached to an entity.
///
/// Tags carry no data; they take part in archetype identity and are used by
/// query filters (e.g. "render everything tagged as a cube").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Tags(u32);

impl Tags {
    pub const NONE: Self = Self(0);

    /// Tag with only bit `n` set. Panics at compile time for `n >= 32`.
    pub const fn bit(n: u32) -> Self {
        assert!(n < 32, "at most 32 tags are supported");
        Self(1 << n)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// True when every tag in `other` is present.
    pub const fn contains(&self, other: Tags) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when at least one tag in `other` is present.
    pub const fn intersects(&self, other: Tags) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for Tags {
    type Output = Tags;

    fn bitor(self, rhs: Tags) -> Tags {
        Tags(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Tags = Tags::bit(0);
    const B: Tags = Tags::bit(1);
    const C: Tags = Tags::bit(5);

    #[test]
    fn contains_and_intersects() {
        let ab = A | B;
        assert!(ab.contains(A));
        assert!(ab.contains(A | B));
        assert!(!ab.contains(A | C));
        assert!(ab.intersects(B | C));
        assert!(!ab.intersects(C));
    }

    #[test]
    fn empty_set() {
        assert!(Tags::NONE.is_empty());
        assert!(A.contains(Tags::NONE));
        assert!(!A.intersects(Tags::NONE));
        assert_eq!((A | C).bits(), 0b10_0001);
    }
}
