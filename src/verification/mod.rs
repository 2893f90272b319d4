pub mod manager;
pub mod timer;
pub mod transaction;
pub mod types;

pub use manager::{
    create_shared_verification_manager, SharedVerificationManager, VerificationManager,
};
pub use timer::CountdownTimer;
pub use transaction::{TransactionSnapshot, VerificationTransaction};
pub use types::{
    mask_destination, RequestOutcome, ResendState, SubmitOutcome, VerificationChannel,
    VerificationState,
};
