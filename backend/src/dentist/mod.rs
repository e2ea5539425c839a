pub mod locator;
pub mod mock;
pub mod serpapi;

pub use locator::DentistLocator;
pub use mock::{emergency_contacts, specialties};
