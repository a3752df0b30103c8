pub mod routes;
pub mod system;
pub mod whoami;

pub use routes::{company_routes, get_route, list_routes, search_routes};
pub use system::{health, info, no_route};
pub use whoami::whoami;
