/// Adaptive schedule for the Frank-Wolfe constraint radius.
///
/// The candidate radius grows as the gradient norm shrinks relative to the
/// Lipschitz estimate, so the L1 bound loosens near the optimum where
/// aggressive extrapolation is safe. The continuation rule keeps the radius
/// frozen while the constraint is inactive: an interior solve means the bound
/// had no effect, and moving it would only make successive solves oscillate.
#[derive(Debug, Clone)]
pub struct RadiusSchedule {
    base: f64,
    adaptive: bool,
    previous: f64,
    on_boundary: bool,
}

impl RadiusSchedule {
    pub fn new(base: f64, adaptive: bool) -> Self {
        Self {
            base,
            adaptive,
            previous: base,
            on_boundary: true,
        }
    }

    /// Radius for the next mixing event at descent step `step`.
    pub fn next_radius(
        &mut self,
        gradient_norm: f64,
        lipschitz: f64,
        step: usize,
        window: usize,
    ) -> f64 {
        let mut candidate = self.base;
        if self.adaptive {
            candidate *= (gradient_norm / lipschitz).powf(-0.49) * (step as f64 / window as f64);
            candidate = candidate.max(self.base);
            if !candidate.is_finite() {
                candidate = self.base;
            }
        }
        if !self.on_boundary {
            self.previous
        } else {
            self.previous = candidate;
            candidate
        }
    }

    /// Record whether the last constrained solve ended on the boundary.
    pub fn record_boundary(&mut self, on_boundary: bool) {
        self.on_boundary = on_boundary;
    }
}
