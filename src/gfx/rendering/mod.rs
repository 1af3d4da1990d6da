pub mod present;

pub use present::PresentPass;
