use std::fmt;

/// Coarse health classification derived from a server's spectral error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthClass {
    Healthy,
    Warning,
    Critical,
}

impl fmt::Display for HealthClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthClass::Healthy => "healthy",
            HealthClass::Warning => "warning",
            HealthClass::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Classify a spectral error reading: `< 0.2` healthy, `< 0.5` warning,
/// otherwise critical.
pub fn classify(spectral_error: f64) -> HealthClass {
    if spectral_error < 0.2 {
        HealthClass::Healthy
    } else if spectral_error < 0.5 {
        HealthClass::Warning
    } else {
        HealthClass::Critical
    }
}
