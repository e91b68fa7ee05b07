// MIT License - Copyright (c) 2026 Peter Wright

pub mod chime;
pub mod security_panel;

pub use chime::Chime;
pub use security_panel::{ArmCommand, ArmOutcome, PanelState, SecurityPanel};
