//! Data types shared by the fetchers, the frontier and the stores
//!
//! - [`RequestData`]: immutable request built with [`RequestDataBuilder`]
//! - [`ResponseData`]: fetched resource owning its [`ResponseBody`]
//! - [`FrontierEntry`]: pending URL of a crawl session
//! - [`AccessResult`]: record of a processed URL

mod queue;
mod request;
mod response;
mod result;

pub use queue::FrontierEntry;
pub use request::{Method, RequestData, RequestDataBuilder};
pub use response::{BodySpooler, ChildUrls, ResponseBody, ResponseData};
pub use result::{AccessResult, ResultStatus};
