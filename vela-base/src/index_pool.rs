/// Hands out small integer indices, recycling freed ones before growing. Indices are dense, so
/// they work well as keys into `Vec`-backed tables.
#[derive(Default, Debug)]
pub struct IndexPool {
    next_index: u32,
    free_list: Vec<u32>,
}

impl IndexPool {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn allocate(&mut self) -> u32 {
        if let Some(index) = self.free_list.pop() {
            index
        } else {
            let index = self.next_index;
            self.next_index += 1;
            index
        }
    }

    pub fn free(
        &mut self,
        index: u32,
    ) {
        assert!(
            index < self.next_index,
            "Freed index {} was never allocated by this pool",
            index
        );
        assert!(
            !self.free_list.contains(&index),
            "Index {} was freed twice",
            index
        );
        self.free_list.push(index);
    }

    /// Number of indices currently handed out
    pub fn allocated_count(&self) -> u32 {
        self.next_index - self.free_list.len() as u32
    }

    /// One past the largest index ever handed out. Useful for sizing tables indexed by this pool.
    pub fn high_water_mark(&self) -> u32 {
        self.next_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_monotonic() {
        let mut pool = IndexPool::new();
        assert_eq!(pool.allocate(), 0);
        assert_eq!(pool.allocate(), 1);
        assert_eq!(pool.allocate(), 2);
        assert_eq!(pool.allocated_count(), 3);
    }

    #[test]
    fn test_free_is_reused() {
        let mut pool = IndexPool::new();
        let a = pool.allocate();
        let b = pool.allocate();
        pool.free(a);
        assert_eq!(pool.allocated_count(), 1);

        // The freed index comes back before the pool grows
        assert_eq!(pool.allocate(), a);
        assert_eq!(pool.allocate(), 2);
        assert_ne!(a, b);
        assert_eq!(pool.high_water_mark(), 3);
    }

    #[test]
    #[should_panic(expected = "was never allocated")]
    fn test_free_unknown_index() {
        let mut pool = IndexPool::new();
        pool.free(5);
    }

    #[test]
    #[should_panic(expected = "freed twice")]
    fn test_double_free() {
        let mut pool = IndexPool::new();
        let index = pool.allocate();
        pool.allocate();
        pool.free(index);
        pool.free(index);
    }
}
