//! Client-side session view model
//!
//! What a page showing "signed in as ..." needs to know about the gateway:
//! a pure state machine ([`handle_event`]) and a driver ([`SessionView`])
//! that runs its actions over HTTP. The view only ever talks to the
//! gateway's own `/api/me` and `/auth/*` routes, never to the provider.

pub mod error;
pub mod machine;
pub mod profile;
pub mod view;

pub use error::{Error, Result};
pub use machine::{ViewAction, ViewEvent, ViewState, handle_event};
pub use profile::Profile;
pub use view::{Navigator, SessionView};
