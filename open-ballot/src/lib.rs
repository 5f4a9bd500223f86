//! Client of the OpenBallot poll application: poll validation, participation bookkeeping,
//! button permissions, transaction orchestration and the UI session reducer.

pub use crate::buttons::*;
pub use crate::errors::*;
pub use crate::storage::*;

pub mod buttons;
pub mod constants;
pub mod controller;
pub mod dates;
mod errors;
pub mod events;
pub mod ext;
pub mod inputs;
pub mod methods;
pub mod notification;
pub mod participation;
pub mod session;
pub mod settings;
mod storage;
pub mod window;

pub use crate::controller::BallotController;
pub use crate::inputs::{process_poll_inputs, validate_poll_inputs, PollInputs};
pub use crate::methods::{plan_purge, BallotMethodManager, PurgePlan, PurgeReport};
pub use crate::notification::{Notification, NotificationSink};
pub use crate::participation::{derive_participation, fetch_app_snapshot, Participation};
pub use crate::session::{reduce, Section, SessionAction, SessionState};
pub use crate::settings::{Settings, SettingsView};
pub use crate::window::{VotingStatus, VotingWindow};
