use crate::types::{fmt_mm, round_f64};

/// Aperture shape template for an %AD command.
#[derive(Debug, Clone, PartialEq)]
pub enum ApertureTemplate {
    Circle { diameter: f64 },
    Rectangle { x_size: f64, y_size: f64 },
    Obround { x_size: f64, y_size: f64 },
}

impl ApertureTemplate {
    /// Same shape with sizes snapped to the file resolution, so equal
    /// apertures intern to one code.
    fn snapped(&self) -> Self {
        let r = |v: f64| round_f64(v, 6);
        match *self {
            ApertureTemplate::Circle { diameter } => ApertureTemplate::Circle {
                diameter: r(diameter),
            },
            ApertureTemplate::Rectangle { x_size, y_size } => ApertureTemplate::Rectangle {
                x_size: r(x_size),
                y_size: r(y_size),
            },
            ApertureTemplate::Obround { x_size, y_size } => ApertureTemplate::Obround {
                x_size: r(x_size),
                y_size: r(y_size),
            },
        }
    }

    /// `C,0.25` / `R,1.025X1.4` / `O,1.6X2.4`
    fn definition(&self) -> String {
        match self {
            ApertureTemplate::Circle { diameter } => format!("C,{}", fmt_mm(*diameter)),
            ApertureTemplate::Rectangle { x_size, y_size } => {
                format!("R,{}X{}", fmt_mm(*x_size), fmt_mm(*y_size))
            }
            ApertureTemplate::Obround { x_size, y_size } => {
                format!("O,{}X{}", fmt_mm(*x_size), fmt_mm(*y_size))
            }
        }
    }
}

/// First D-code available to user apertures.
pub const FIRST_CODE: u32 = 10;

/// Per-file aperture table. Codes are handed out from D10 in order of first
/// use.
#[derive(Debug, Default)]
pub struct ApertureTable {
    apertures: Vec<ApertureTemplate>,
}

impl ApertureTable {
    /// Code for `template`, defining it if it is new.
    pub fn intern(&mut self, template: ApertureTemplate) -> u32 {
        let template = template.snapped();
        let index = match self.apertures.iter().position(|t| *t == template) {
            Some(i) => i,
            None => {
                self.apertures.push(template);
                self.apertures.len() - 1
            }
        };
        FIRST_CODE + index as u32
    }

    /// `%ADD10C,0.25*%` lines in code order.
    pub fn definitions(&self) -> impl Iterator<Item = String> + '_ {
        self.apertures
            .iter()
            .enumerate()
            .map(|(i, t)| format!("%ADD{}{}*%", FIRST_CODE + i as u32, t.definition()))
    }

    pub(crate) fn len(&self) -> usize {
        self.apertures.len()
    }
}
