/// Coordinate format written in the %FS (Format Specification) command.
///
/// `%FSLAX46Y46*%` means leading-zero suppression, absolute mode,
/// 4 integer digits + 6 decimal digits for both X and Y.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateFormat {
    pub integer: u8,
    pub decimal: u8,
}

impl Default for CoordinateFormat {
    fn default() -> Self {
        // KiCad's output format: 4.6 in millimetres
        Self {
            integer: 4,
            decimal: 6,
        }
    }
}

/// Converts board millimetres to raw Gerber integer coordinates. Output is
/// always in millimetres.
#[derive(Debug, Clone, Default)]
pub struct CoordinateConverter {
    pub format: CoordinateFormat,
}

impl CoordinateConverter {
    pub fn fs_command(&self) -> String {
        let d = format!("{}{}", self.format.integer, self.format.decimal);
        format!("%FSLAX{d}Y{d}*%")
    }

    pub fn mo_command(&self) -> &'static str {
        "%MOMM*%"
    }

    /// Convert a length in mm to the raw integer written in the file.
    pub fn to_raw(&self, mm: f64) -> i64 {
        (mm * 10f64.powi(self.format.decimal as i32)).round() as i64
    }

    /// `X..Y..` for a board point. Board y grows downwards, Gerber y upwards.
    pub fn xy(&self, p: [f64; 2]) -> String {
        format!("X{}Y{}", self.to_raw(p[0]), self.to_raw(-p[1]))
    }

    /// `I..J..` centre offset for arcs, in Gerber orientation.
    pub fn ij(&self, from: [f64; 2], center: [f64; 2]) -> String {
        format!(
            "I{}J{}",
            self.to_raw(center[0] - from[0]),
            self.to_raw(-(center[1] - from[1]))
        )
    }
}
