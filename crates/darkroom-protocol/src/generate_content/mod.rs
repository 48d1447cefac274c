pub mod request;
pub mod response;
pub mod types;

pub use request::GenerateContentRequestBody;
pub use response::GenerateContentResponse;
pub use types::*;
