pub mod policy;
pub mod rate_limit;
pub mod sanitize;

pub use policy::SecurityPolicy;
pub use sanitize::Sanitizer;
