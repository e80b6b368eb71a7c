mod json;

pub use json::parse_response;
