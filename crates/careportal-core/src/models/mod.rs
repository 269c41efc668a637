//! Domain models for the patient portal.

mod appointment;
mod diary;
mod profile;
mod session;
mod settings;

pub use appointment::*;
pub use diary::*;
pub use profile::*;
pub use session::*;
pub use settings::*;
