//! Infrastructure layer: stores, external collaborators, orchestration
//! services.

pub mod delivery;
pub mod reset;
pub mod session;
pub mod token_store;
pub mod user_directory;

pub use delivery::{DeliveryError, RecordingTokenDelivery, TokenDelivery, TracingTokenDelivery};
pub use reset::{ResetError, ResetTokenService, TokenValidation};
pub use session::{RoleFreshness, SessionAuthority, SessionError};
pub use token_store::{InMemoryResetTokenStore, PostgresResetTokenStore, ResetTokenStore, StoreError};
pub use user_directory::{DirectoryError, InMemoryUserDirectory, UserDirectory, UserRecord};
