pub mod goals;
pub mod suggestions;

pub use goals::GoalLinkage;
