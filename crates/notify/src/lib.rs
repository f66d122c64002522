//! Multi-channel SMS dispatch engine.
//!
//! This crate provides:
//! - `ChannelAdapter` trait: one uniform send contract per provider
//! - Twilio, Vonage, OneSignal, SMTP-gateway and AWS SNS adapters
//! - Pacing policy with a swappable clock
//! - Dispatcher that walks enabled channels and recipients sequentially,
//!   isolating each recipient's failure from the rest of the batch

pub mod channels;
pub mod dispatcher;
pub mod onesignal;
pub mod pacing;
pub mod smtp;
pub mod sns;
pub mod traits;
pub mod twilio;
pub mod vonage;

pub use dispatcher::{run_batch, DispatchPlan, Dispatcher, PlannedSend};
pub use pacing::{Clock, Pacing, RecordingClock, TokioClock};
pub use traits::{
    AttemptRecord, BatchReport, ChannelAdapter, NotifyError, SendOutcome, HTTP_TIMEOUT,
};
