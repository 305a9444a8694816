// Second-order IIR section (transposed direct form II, a0 = 1)

use rustfft::num_complex::Complex;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Biquad {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
    // state
    z1: f64,
    z2: f64,
}

impl Biquad {
    #[inline]
    pub fn new(b0: f64, b1: f64, b2: f64, a1: f64, a2: f64) -> Self {
        Self { b0, b1, b2, a1, a2, z1: 0.0, z2: 0.0 }
    }

    #[inline]
    pub fn set_state(&mut self, z1: f64, z2: f64) {
        self.z1 = z1;
        self.z2 = z2;
    }

    #[inline]
    pub fn process_sample(&mut self, x: f64) -> f64 {
        // y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }

    pub fn process_in_place(&mut self, x: &mut [f64]) {
        for v in x.iter_mut() {
            *v = self.process_sample(*v);
        }
    }

    /// Gain at DC, `H(1) = sum(b) / sum(a)`.
    pub fn dc_gain(&self) -> f64 {
        let den = 1.0 + self.a1 + self.a2;
        if den.abs() < f64::EPSILON {
            return 0.0;
        }
        (self.b0 + self.b1 + self.b2) / den
    }

    /// State that a unit step input holds constant (scipy `lfilter_zi`).
    pub fn step_state(&self) -> (f64, f64) {
        let g = self.dc_gain();
        let z2 = self.b2 - self.a2 * g;
        let z1 = self.b1 - self.a1 * g + z2;
        (z1, z2)
    }

    /// Complex response at normalized angular frequency `omega` (rad/sample).
    pub fn response(&self, omega: f64) -> Complex<f64> {
        let z1 = Complex::from_polar(1.0, -omega);
        let z2 = z1 * z1;
        let num = Complex::new(self.b0, 0.0) + z1 * self.b1 + z2 * self.b2;
        let den = Complex::new(1.0, 0.0) + z1 * self.a1 + z2 * self.a2;
        num / den
    }
}
