pub mod elapsed;
pub use elapsed::{ElapsedTimer, format_elapsed};
pub mod url_validation;
pub use url_validation::{UrlValidationError, validate_realtime_url};
