//! Document schemas for the fact collections

mod metadata;
mod profile;
mod subscription;

pub use metadata::Metadata;
pub use profile::{ProfileDoc, PROFILE_COLLECTION};
pub use subscription::{select_subscription, SubscriptionDoc, SUBSCRIPTION_COLLECTION};
