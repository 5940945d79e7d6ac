//! Delivery adapters behind the [`courier_routing::Provider`] trait.
//!
//! Each adapter owns its transport client and default sender address; the
//! routing layer stays unaware of provider wire formats.

mod sendgrid;
mod ses;

pub use sendgrid::SendGridProvider;
pub use ses::SesProvider;
