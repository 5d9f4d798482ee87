use crate::board::Layer;

/// The seven fabrication layers written for every board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FabLayer {
    CopperTop,
    CopperBottom,
    SilkscreenTop,
    SilkscreenBottom,
    SolderMaskTop,
    SolderMaskBottom,
    BoardOutline,
}

/// Copper, silkscreen, solder mask, outline.
pub const PLOT_ORDER: [FabLayer; 7] = [
    FabLayer::CopperTop,
    FabLayer::CopperBottom,
    FabLayer::SilkscreenTop,
    FabLayer::SilkscreenBottom,
    FabLayer::SolderMaskTop,
    FabLayer::SolderMaskBottom,
    FabLayer::BoardOutline,
];

impl FabLayer {
    /// The board layer plotted into this file.
    pub fn board_layer(&self) -> Layer {
        match self {
            FabLayer::CopperTop => Layer::FCu,
            FabLayer::CopperBottom => Layer::BCu,
            FabLayer::SilkscreenTop => Layer::FSilkS,
            FabLayer::SilkscreenBottom => Layer::BSilkS,
            FabLayer::SolderMaskTop => Layer::FMask,
            FabLayer::SolderMaskBottom => Layer::BMask,
            FabLayer::BoardOutline => Layer::EdgeCuts,
        }
    }

    /// KiCad's file-name suffix, the layer name with `.` replaced by `_`.
    pub fn suffix(&self) -> &'static str {
        match self {
            FabLayer::CopperTop => "F_Cu",
            FabLayer::CopperBottom => "B_Cu",
            FabLayer::SilkscreenTop => "F_SilkS",
            FabLayer::SilkscreenBottom => "B_SilkS",
            FabLayer::SolderMaskTop => "F_Mask",
            FabLayer::SolderMaskBottom => "B_Mask",
            FabLayer::BoardOutline => "Edge_Cuts",
        }
    }

    /// Protel-style extension.
    pub fn extension(&self) -> &'static str {
        match self {
            FabLayer::CopperTop => "gtl",
            FabLayer::CopperBottom => "gbl",
            FabLayer::SilkscreenTop => "gto",
            FabLayer::SilkscreenBottom => "gbo",
            FabLayer::SolderMaskTop => "gts",
            FabLayer::SolderMaskBottom => "gbs",
            FabLayer::BoardOutline => "gm1",
        }
    }

    pub fn file_name(&self, project: &str) -> String {
        format!("{project}-{}.{}", self.suffix(), self.extension())
    }

    /// Gerber X2 `.FileFunction` value. Bottom copper is numbered after the
    /// inner layers.
    pub fn file_function(&self, copper_layers: u8) -> String {
        match self {
            FabLayer::CopperTop => "Copper,L1,Top".to_string(),
            FabLayer::CopperBottom => format!("Copper,L{},Bot", copper_layers.max(2)),
            FabLayer::SilkscreenTop => "Legend,Top".to_string(),
            FabLayer::SilkscreenBottom => "Legend,Bot".to_string(),
            FabLayer::SolderMaskTop => "Soldermask,Top".to_string(),
            FabLayer::SolderMaskBottom => "Soldermask,Bot".to_string(),
            FabLayer::BoardOutline => "Profile,NP".to_string(),
        }
    }

    /// Mask files describe openings, so they are negative.
    pub fn polarity(&self) -> &'static str {
        match self {
            FabLayer::SolderMaskTop | FabLayer::SolderMaskBottom => "Negative",
            _ => "Positive",
        }
    }

    pub fn is_copper(&self) -> bool {
        matches!(self, FabLayer::CopperTop | FabLayer::CopperBottom)
    }

    pub fn is_mask(&self) -> bool {
        matches!(self, FabLayer::SolderMaskTop | FabLayer::SolderMaskBottom)
    }
}
