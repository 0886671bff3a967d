use egui::Color32;

const EXCELLENT_BELOW_MS: f64 = 50.0;
const GOOD_BELOW_MS: f64 = 100.0;
const FAIR_BELOW_MS: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Quality {
    pub fn from_latency(latency_ms: f64) -> Self {
        match latency_ms {
            ms if ms < EXCELLENT_BELOW_MS => Quality::Excellent,
            ms if ms < GOOD_BELOW_MS => Quality::Good,
            ms if ms < FAIR_BELOW_MS => Quality::Fair,
            _ => Quality::Poor,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Quality::Excellent => "Excellent",
            Quality::Good => "Good",
            Quality::Fair => "Fair",
            Quality::Poor => "Poor",
        }
    }

    pub fn to_color32(self) -> Color32 {
        match self {
            Quality::Excellent => Color32::from_rgb(0x28, 0xA7, 0x45),
            Quality::Good => Color32::from_rgb(0xFF, 0xC1, 0x07),
            Quality::Fair => Color32::from_rgb(0xFD, 0x7E, 0x14),
            Quality::Poor => Color32::from_rgb(0xDC, 0x35, 0x45),
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
