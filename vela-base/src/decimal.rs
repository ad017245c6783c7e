use std::hash::Hasher;

// This is an f32 that supports Hash and Eq. Generally this is dangerous, but it is only used for
// values that are copied around verbatim (clear colors, depth values in cache keys), never for
// values produced by arithmetic. NaN is not expected.
#[derive(Debug, Copy, Clone, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct DecimalF32(pub f32);

impl From<DecimalF32> for f32 {
    fn from(value: DecimalF32) -> Self {
        value.0
    }
}

impl PartialEq for DecimalF32 {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for DecimalF32 {}

impl std::hash::Hash for DecimalF32 {
    fn hash<H: Hasher>(
        &self,
        state: &mut H,
    ) {
        let bits: u32 = self.0.to_bits();
        bits.hash(state);
    }
}
