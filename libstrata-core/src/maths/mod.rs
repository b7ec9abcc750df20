pub mod format;

use num_complex::Complex64;

/// One complex entry of the state vector.
pub type Amplitude = Complex64;

/// e^{i theta} = cos(theta) + i sin(theta).
#[inline]
pub fn exp_i(theta: f64) -> Amplitude {
    Complex64::cis(theta)
}

pub const ONE_DIV_ROOT_TWO: f64 = std::f64::consts::FRAC_1_SQRT_2;
