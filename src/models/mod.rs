pub mod endpoint;
pub mod project;
pub mod user;

pub use endpoint::{Endpoint, EndpointMethods, Operation};
pub use project::Project;
pub use user::{QuotaInfo, User};
