// Analysis session: state machine, regeneration timer, and the driver that
// connects them to the auth gate and the backend.

pub mod controller;
pub mod debounce;
pub mod state;

pub use controller::SessionController;
pub use state::{RequestState, SessionState};
