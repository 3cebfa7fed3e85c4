//! Business logic services for safereads-api

pub mod author_detection;
pub mod book_resolver;
pub mod entitlement;
pub mod google_books_client;
pub mod llm_client;
pub mod open_library_client;
pub mod prompts;
pub mod verdict_engine;
pub mod verdict_parser;

pub use author_detection::{detect_author, AuthorMatch};
pub use book_resolver::{BookResolver, CoverSearch, IdentifiedCover};
pub use entitlement::{AdminAllowList, EntitlementGate, SubscriptionDetails};
pub use google_books_client::{GoogleBooksClient, GoogleBooksError};
pub use llm_client::{LlmError, OpenAiClient, VerdictModel, VisionModel};
pub use open_library_client::{OpenLibraryClient, OpenLibraryError};
pub use verdict_engine::{VerdictEngine, VerdictOutcome, VerdictSource};
