pub mod chrome;
pub mod session;
pub mod stealth;

#[cfg(test)]
pub(crate) mod fake;

#[cfg(test)]
mod tests;

pub use chrome::{ChromeSession, ChromeSessionFactory};
pub use session::{BrowserSession, ElementSnapshot, SessionFactory, TabHandle};
pub use stealth::UserAgentGenerator;
