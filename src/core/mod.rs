pub mod bandpass;
pub mod biquad;
pub mod util;
