pub mod envelope;
pub mod extract;
pub mod locale;
pub mod status;

pub use envelope::Envelope;
pub use extract::ApiJson;
pub use status::ResultCode;
