//! GlobalPlatform command definitions
//!
//! Assemblers for the commands the secure channel and registry queries need.

pub mod external_authenticate;
pub mod get_status;
pub mod initialize_update;

pub use external_authenticate::ExternalAuthenticateCommand;
pub use get_status::{GetStatusCommand, GetStatusScope};
pub use initialize_update::{InitializeUpdateCommand, InitializeUpdateResponse};
