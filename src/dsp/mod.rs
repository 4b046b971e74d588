//! Per-sample filtering: recursive (Kalman) and FIR (Savitzky-Golay) stages.

mod kalman;
mod savgol;

pub use kalman::{KalmanConfig, KalmanFilter};
pub use savgol::SavitzkyGolay;
