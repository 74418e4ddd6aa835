use serde::{Deserialize, Serialize};

/// One recorded response channel of an epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseStream {
    /// Uniform sampling frequency in Hz
    pub fs: f64,
    /// Samples
    pub data: Vec<f64>,
    /// Precomputed event times (ms), when the source provides them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spike_times: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

impl ResponseStream {
    pub fn new(fs: f64, data: Vec<f64>) -> Self {
        Self {
            fs,
            data,
            spike_times: None,
            units: None,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn duration(&self) -> f64 {
        if self.fs <= 0.0 {
            return 0.0;
        }
        self.data.len() as f64 / self.fs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_uses_sample_rate() {
        let stream = ResponseStream::new(1000.0, vec![0.0; 250]);
        assert!((stream.duration() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn zero_rate_has_no_duration() {
        let stream = ResponseStream::new(0.0, vec![1.0, 2.0]);
        assert_eq!(stream.duration(), 0.0);
    }
}
