//! Output writers: the KiCad board file, Gerber plots and the zip bundle.

pub mod bundle;
pub mod gerber;
pub mod kicad_pcb;
