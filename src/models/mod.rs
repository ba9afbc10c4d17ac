mod card;

pub use card::{Card, CardInput};
