//! Repository layer for data access

pub mod attempts;
pub mod clients;
pub mod mailings;
pub mod messages;
pub mod sessions;
pub mod users;

// Re-export concrete repository implementations with simple names
pub use attempts::DbAttemptRepository as AttemptRepository;
pub use clients::DbClientRepository as ClientRepository;
pub use mailings::DbMailingRepository as MailingRepository;
pub use messages::DbMessageRepository as MessageRepository;
pub use sessions::DbSessionRepository as SessionRepository;
pub use users::DbUserRepository as UserRepository;

// Re-export repository traits
pub use attempts::AttemptRepository as AttemptRepositoryTrait;
pub use clients::ClientRepository as ClientRepositoryTrait;
pub use mailings::MailingRepository as MailingRepositoryTrait;
pub use messages::MessageRepository as MessageRepositoryTrait;
pub use sessions::SessionRepository as SessionRepositoryTrait;
pub use users::UserRepository as UserRepositoryTrait;
