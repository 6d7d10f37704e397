pub mod gateway;
pub mod models;
pub mod session;
pub mod store;

pub use gateway::{
    BoxedCompletionProvider, CompletionGateway, CompletionProvider, CompletionRequest,
    FALLBACK_REPLY, ProviderError,
};
pub use models::{Message, Role, Transcript};
pub use session::{ChatSession, EMPTY_REPLY, InteractionState, SubmitError};
pub use store::{SessionSnapshot, SessionStore};
