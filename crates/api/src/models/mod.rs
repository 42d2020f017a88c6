//! Domain models returned by repositories and serialized by handlers.

pub mod customer;
pub mod progress;
pub mod question;
pub mod user;

pub use customer::Customer;
pub use progress::Progress;
pub use question::{LearnerQuestion, Question};
pub use user::User;
