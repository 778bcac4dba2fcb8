pub mod check;
pub mod path;
pub mod routes;
