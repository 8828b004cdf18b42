pub mod auth;
pub mod db_request;
pub mod guard;
pub mod notifications;
pub mod parameters;
pub mod registry;
pub mod request;
pub mod requests;
pub mod resource;
pub mod response;
pub mod routes;
pub mod state;
pub mod validation;

#[cfg(test)]
mod test_support;
