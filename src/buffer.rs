use ndarray::{Array1, Array2};

/// Fixed-capacity cyclic store of the most recent iterates.
///
/// Backed by a features × capacity matrix addressed with a wrapping slot
/// index, so pushing never reallocates. Slots hold garbage until the buffer
/// has been filled once; callers must check [`IterateBuffer::is_full`] before
/// taking a snapshot.
pub struct IterateBuffer {
    slots: Array2<f64>,
    capacity: usize,
    pushes: usize,
}

impl IterateBuffer {
    pub fn new(n_features: usize, capacity: usize) -> Self {
        assert!(capacity > 0, "iterate buffer needs at least one slot");
        Self {
            slots: Array2::zeros((n_features, capacity)),
            capacity,
            pushes: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.pushes >= self.capacity
    }

    /// Stores `iterate` in slot `pushes mod capacity`, overwriting the oldest
    /// entry once the buffer has wrapped.
    pub fn push(&mut self, iterate: &Array1<f64>) {
        let slot = self.pushes % self.capacity;
        self.slots.column_mut(slot).assign(iterate);
        self.pushes += 1;
    }

    /// The stored iterates in temporal order, oldest first.
    pub fn snapshot(&self) -> Array2<f64> {
        debug_assert!(self.is_full(), "snapshot before the buffer wrapped once");
        let mut ordered = Array2::zeros(self.slots.dim());
        for k in 0..self.capacity {
            let source = (self.pushes + k) % self.capacity;
            ordered.column_mut(k).assign(&self.slots.column(source));
        }
        ordered
    }
}
